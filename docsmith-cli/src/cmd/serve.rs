use crate::cmd::build::{add_build_args, make_builder};
use crate::config::CliConfig;
use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use docsmith_dev_server::{DevServer, DevServerOptions};

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Start the development server with live reload")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open the browser automatically")
                .action(clap::ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = CliConfig::load(args)?;
    let build_config = config.build_config();

    let options = DevServerOptions {
        host: build_config.host.clone(),
        port: build_config.port,
        open: build_config.open,
        ..Default::default()
    };

    let mut server = DevServer::new(make_builder(&config)?, options);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.close().await;

    Ok(())
}
