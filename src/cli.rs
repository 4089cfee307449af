//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, init, validate, health), and their associated
//! argument structs. Every `run` flag has an environment variable
//! equivalent for container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "portico",
    version,
    about = "HTTP reverse-proxy API gateway",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        portico init                      Create a starter config\n  \
        portico run                       Start with ./portico.toml\n  \
        portico run -c gateway.toml       Start with a specific config"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway (proxy and admin listeners)
    Run(RunArgs),

    /// Generate a starter config file
    Init(InitArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        portico run                                   Use ./portico.toml\n  \
        portico run -c gateway.toml                   Specific config file\n  \
        portico run -c gateway.toml --port 8000 --pretty")]
pub struct RunArgs {
    /// Config file path (.toml, .yaml, .json)
    #[arg(short, long, env = "PORTICO_CONFIG", default_value = "portico.toml")]
    pub config: PathBuf,

    /// Listen address (overrides server.host)
    #[arg(long, env = "PORTICO_HOST")]
    pub host: Option<String>,

    /// Proxy listen port (overrides server.port)
    #[arg(short, long, env = "PORTICO_PORT")]
    pub port: Option<u16>,

    /// Admin listen port (overrides server.admin_port)
    #[arg(long, env = "PORTICO_ADMIN_PORT")]
    pub admin_port: Option<u16>,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    /// Seconds to wait for queued audit entries on shutdown
    #[arg(long, env = "PORTICO_DRAIN_SECS", default_value_t = 10)]
    pub drain_secs: u64,
}

#[derive(Args)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "portico.toml")]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "portico.toml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// Admin URL of the running instance
    #[arg(default_value = "http://localhost:9090")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_override() {
        let cli = Cli::try_parse_from([
            "portico",
            "run",
            "-c",
            "gw.toml",
            "--port",
            "8000",
            "--admin-port",
            "8001",
            "--json",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("gw.toml"));
        assert_eq!(args.port, Some(8000));
        assert_eq!(args.admin_port, Some(8001));
        assert!(args.json);
        assert!(args.host.is_none());
    }

    #[test]
    fn pretty_and_json_conflict() {
        assert!(Cli::try_parse_from(["portico", "run", "--pretty", "--json"]).is_err());
    }
}
