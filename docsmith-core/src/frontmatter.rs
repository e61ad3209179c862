use std::collections::HashMap;

/// A frontmatter scalar or list, parsed from the `---` block at the top of
/// a content file. The set of shapes is closed on purpose: consumers match
/// on the variant instead of guessing at a dynamic value.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontmatterValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    List(Vec<FrontmatterValue>),
}

impl FrontmatterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FrontmatterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FrontmatterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FrontmatterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl serde::Serialize for FrontmatterValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FrontmatterValue::String(s) => serializer.serialize_str(s),
            FrontmatterValue::Number(n) => serializer.serialize_f64(*n),
            FrontmatterValue::Bool(b) => serializer.serialize_bool(*b),
            FrontmatterValue::Null => serializer.serialize_none(),
            FrontmatterValue::List(items) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

pub type Frontmatter = HashMap<String, FrontmatterValue>;

/// Split a document into its frontmatter block and body.
///
/// A frontmatter block is a leading `---` line, `key: value` lines, and a
/// closing `---` line. Documents without one get an empty map and their
/// full text back as the body.
pub fn split_frontmatter(content: &str) -> (Frontmatter, &str) {
    let Some(rest) = content.strip_prefix("---\n") else {
        return (Frontmatter::new(), content);
    };

    let Some(end) = rest.find("\n---") else {
        return (Frontmatter::new(), content);
    };

    // The closing fence must be a whole line.
    let after = &rest[end + 4..];
    if !(after.is_empty() || after.starts_with('\n')) {
        return (Frontmatter::new(), content);
    }

    let body = after.strip_prefix('\n').unwrap_or(after);
    (parse_block(&rest[..end]), body)
}

fn parse_block(block: &str) -> Frontmatter {
    let mut map = Frontmatter::new();

    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        // An empty value means the key is absent, not an error.
        if let Some(parsed) = parse_value(value.trim()) {
            map.insert(key.to_string(), parsed);
        }
    }

    map
}

/// Type a raw scalar. Precedence: quoted string, booleans, null, numbers,
/// `[a, b, c]` lists, and finally the raw string itself.
fn parse_value(raw: &str) -> Option<FrontmatterValue> {
    if raw.is_empty() {
        return None;
    }

    if raw.len() >= 2 {
        let quoted = (raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\''));
        if quoted {
            return Some(FrontmatterValue::String(raw[1..raw.len() - 1].to_string()));
        }
    }

    match raw {
        "true" => return Some(FrontmatterValue::Bool(true)),
        "false" => return Some(FrontmatterValue::Bool(false)),
        "null" | "~" => return Some(FrontmatterValue::Null),
        _ => {}
    }

    if let Ok(n) = raw.parse::<f64>() {
        return Some(FrontmatterValue::Number(n));
    }

    if raw.starts_with('[') && raw.ends_with(']') {
        let items = raw[1..raw.len() - 1]
            .split(',')
            .filter_map(|item| parse_value(item.trim()))
            .collect();
        return Some(FrontmatterValue::List(items));
    }

    Some(FrontmatterValue::String(raw.to_string()))
}
