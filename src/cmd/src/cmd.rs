use std::fmt;

use clap::{Parser, Subcommand, ValueEnum};

use tenantd_kubernetes::controller::{config::Config, error::Error, server};
use tenantd_trace::init::TraceConfig;

use crate::controller::ControllerCmd;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cmd {
    #[arg(
        short,
        long,
        global = true,
        required = false,
        default_value = "info",
        help = "Log level(trace, debug, info, warn, error)"
    )]
    pub level: String,

    #[arg(
        value_enum,
        short = 'd',
        long,
        global = true,
        required = false,
        default_value = "plain",
        help = "Log display format"
    )]
    pub format: Format,

    #[arg(short = 'o', long = "log-file", global = true, help = "Log output file path")]
    pub log_file: Option<String>,

    #[clap(subcommand)]
    pub sub: SubCmd,
}

#[derive(Debug, Clone, Parser, ValueEnum, PartialEq, Eq)]
pub enum Format {
    Plain,
    Json,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Plain => write!(f, "plain"),
            Format::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum SubCmd {
    Controller(ControllerCmd),
    Version,
}

pub fn run() -> Result<(), Error> {
    let command = Cmd::parse();

    let trace_conf = TraceConfig {
        level: command.level,
        format: command.format.to_string(),
        file: command.log_file,
    };

    match command.sub {
        SubCmd::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        SubCmd::Controller(c) => server::start(controller_config(c)?, trace_conf),
    }
}

// Flags override values from the config file.
fn controller_config(c: ControllerCmd) -> Result<Config, Error> {
    let mut config = match c.file {
        None => Config::default(),
        Some(file) => Config::load(&file)?,
    };

    if let Some(port) = c.http_port {
        config.http_port = port;
    }
    if let Some(interval) = c.requeue_interval {
        config.requeue_interval = interval;
    }
    if let Some(pool) = c.pool {
        config.network.pool = pool;
    }
    if let Some(prefix_len) = c.prefix_len {
        config.network.prefix_len = prefix_len;
    }

    Ok(config)
}
