use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use accident_core::services::DatasetConfig;
use accident_core::store::DEFAULT_POOL_SIZE;
use accident_ingest::{BuildOptions, DEFAULT_BATCH_SIZE, DEFAULT_DESCRIPTION_MAX_CHARS};
use accident_mcp::server::McpHttpServerConfig;

const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const MAX_POOL_SIZE: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "accident-mcpd", version, about = "Accident MCP daemon.")]
struct CliArgs {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Load the accidents CSV into an indexed SQLite database.
    BuildDb(BuildDbArgs),
    /// Serve the MCP tools over a built database.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct BuildDbArgs {
    #[arg(long, env = "ACCIDENT_CSV")]
    csv: PathBuf,

    #[arg(long, env = "ACCIDENT_DB")]
    db: PathBuf,

    #[arg(long, env = "ACCIDENT_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    #[arg(
        long,
        env = "ACCIDENT_DESCRIPTION_MAX_CHARS",
        default_value_t = DEFAULT_DESCRIPTION_MAX_CHARS
    )]
    description_max_chars: usize,

    #[arg(long, env = "ACCIDENT_MAX_RECORDS")]
    max_records: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "ACCIDENT_DB")]
    db: PathBuf,

    #[arg(long, env = "ACCIDENT_SEVERITY_MODEL")]
    severity_model: Option<PathBuf>,

    #[arg(long, env = "ACCIDENT_CONGESTION_MODEL")]
    congestion_model: Option<PathBuf>,

    #[arg(long, env = "ACCIDENT_RISK_CONFIG")]
    risk_config: Option<PathBuf>,

    #[arg(long, env = "ACCIDENT_POOL_SIZE", default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,

    #[arg(long, env = "ACCIDENT_TRANSPORT", value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    #[arg(long, env = "ACCIDENT_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    addr: SocketAddr,

    #[arg(
        long,
        env = "ACCIDENT_MCP_STATEFUL",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    stateful: bool,
}

/// Validated settings for `serve`.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub dataset: DatasetConfig,
    pub transport: Transport,
    pub http: McpHttpServerConfig,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub enum DaemonConfig {
    BuildDb(BuildOptions),
    Serve(ServeConfig),
}

#[derive(Debug)]
pub enum ConfigError {
    MissingFile { name: &'static str, path: PathBuf },
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFile { name, path } => {
                write!(f, "{name} does not exist: {}", path.display())
            }
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl DaemonConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn existing_file(name: &'static str, path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(ConfigError::MissingFile { name, path })
    }
}

impl TryFrom<BuildDbArgs> for BuildOptions {
    type Error = ConfigError;

    fn try_from(args: BuildDbArgs) -> Result<Self, Self::Error> {
        if args.batch_size == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "ACCIDENT_BATCH_SIZE",
                value: args.batch_size.to_string(),
            });
        }
        let csv = existing_file("ACCIDENT_CSV", args.csv)?;
        let mut options = Self::new(csv, args.db)
            .with_batch_size(args.batch_size)
            .with_description_max_chars(args.description_max_chars);
        if let Some(max_records) = args.max_records {
            options = options.with_max_records(max_records);
        }
        Ok(options)
    }
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = ConfigError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        if args.pool_size == 0 || args.pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::InvalidSetting {
                name: "ACCIDENT_POOL_SIZE",
                value: args.pool_size.to_string(),
            });
        }
        let mut dataset = DatasetConfig::new(existing_file("ACCIDENT_DB", args.db)?)
            .with_pool_size(args.pool_size);
        if let Some(path) = args.severity_model {
            dataset = dataset.with_severity_model(existing_file("ACCIDENT_SEVERITY_MODEL", path)?);
        }
        if let Some(path) = args.congestion_model {
            dataset =
                dataset.with_congestion_model(existing_file("ACCIDENT_CONGESTION_MODEL", path)?);
        }
        if let Some(path) = args.risk_config {
            dataset = dataset.with_risk_config(existing_file("ACCIDENT_RISK_CONFIG", path)?);
        }
        Ok(Self {
            dataset,
            transport: args.transport,
            http: McpHttpServerConfig::new(args.addr).with_stateful_mode(args.stateful),
        })
    }
}

impl TryFrom<CliArgs> for DaemonConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        match args.command {
            CliCommand::BuildDb(args) => Ok(Self::BuildDb(BuildOptions::try_from(args)?)),
            CliCommand::Serve(args) => Ok(Self::Serve(ServeConfig::try_from(args)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_serve_args(db: PathBuf) -> ServeArgs {
        ServeArgs {
            db,
            severity_model: None,
            congestion_model: None,
            risk_config: None,
            pool_size: DEFAULT_POOL_SIZE,
            transport: Transport::Stdio,
            addr: DEFAULT_MCP_HTTP_ADDR.parse().expect("valid MCP addr"),
            stateful: true,
        }
    }

    #[test]
    fn serve_requires_existing_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ServeConfig::try_from(base_serve_args(dir.path().join("missing.db")))
            .expect_err("missing database");
        assert!(matches!(err, ConfigError::MissingFile { name: "ACCIDENT_DB", .. }));
    }

    #[test]
    fn serve_rejects_zero_pool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("accidents.db");
        std::fs::write(&db, b"").expect("touch db");
        let mut args = base_serve_args(db);
        args.pool_size = 0;
        assert!(matches!(
            ServeConfig::try_from(args),
            Err(ConfigError::InvalidSetting { name: "ACCIDENT_POOL_SIZE", .. })
        ));
    }

    #[test]
    fn serve_collects_optional_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("accidents.db");
        let model = dir.path().join("severity.json");
        std::fs::write(&db, b"").expect("touch db");
        std::fs::write(&model, b"{}").expect("touch model");
        let mut args = base_serve_args(db);
        args.severity_model = Some(model.clone());
        args.transport = Transport::Http;
        args.stateful = false;

        let config = ServeConfig::try_from(args).expect("config should parse");

        assert_eq!(config.dataset.severity_model, Some(model));
        assert_eq!(config.dataset.congestion_model, None);
        assert_eq!(config.transport, Transport::Http);
        assert!(!config.http.stateful_mode);
    }

    #[test]
    fn cli_parses_build_db() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv = dir.path().join("accidents.csv");
        std::fs::write(&csv, b"ID\n").expect("touch csv");
        let args = CliArgs::try_parse_from([
            "accident-mcpd",
            "build-db",
            "--csv",
            csv.to_str().expect("utf-8 path"),
            "--db",
            "out.db",
            "--max-records",
            "10",
        ])
        .expect("cli should parse");

        let config = DaemonConfig::try_from(args).expect("config should parse");

        match config {
            DaemonConfig::BuildDb(options) => {
                assert_eq!(options.max_records, Some(10));
                assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
            }
            DaemonConfig::Serve(_) => panic!("expected build-db"),
        }
    }
}
