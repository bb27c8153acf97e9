use crate::services::pipeline::FailurePolicy;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr};

const ENV_HOST: &str = "FILE_CATALOG_HOST";
const ENV_PORT: &str = "FILE_CATALOG_PORT";
const ENV_STORAGE_DIR: &str = "FILE_CATALOG_STORAGE_DIR";
const ENV_DATABASE_URL: &str = "FILE_CATALOG_DATABASE_URL";
const ENV_FAILURE_POLICY: &str = "FILE_CATALOG_FAILURE_POLICY";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub failure_policy: FailurePolicy,
}

/// What the process should do once configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    /// Apply the catalog schema and exit.
    Migrate,
    /// Ingest one notification batch file and exit.
    IngestFile(PathBuf),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "File catalog ingestion service")]
pub struct Args {
    /// Host to bind to (overrides FILE_CATALOG_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_CATALOG_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store root directory (overrides FILE_CATALOG_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Catalog database URL (overrides FILE_CATALOG_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// `abort` stops a batch at the first failed record, `continue` attempts all
    /// (overrides FILE_CATALOG_FAILURE_POLICY)
    #[arg(long)]
    pub failure_policy: Option<FailurePolicy>,

    /// Run migrations and exit
    #[arg(long, conflicts_with = "event")]
    pub migrate: bool,

    /// Process a notification batch JSON file once and exit
    #[arg(long, value_name = "PATH")]
    pub event: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<(Self, RunMode)> {
        // --- Environment fallback ---
        let env_host = env::var(ENV_HOST).unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse::<u16>(ENV_PORT)?.unwrap_or(3000);
        let env_storage = env::var(ENV_STORAGE_DIR).unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var(ENV_DATABASE_URL)
            .unwrap_or_else(|_| "sqlite://./data/meta/file_catalog.db".into());
        let env_policy = env_parse::<FailurePolicy>(ENV_FAILURE_POLICY)?.unwrap_or_default();

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            failure_policy: args.failure_policy.unwrap_or(env_policy),
        };

        let mode = match (args.migrate, args.event) {
            (true, _) => RunMode::Migrate,
            (false, Some(path)) => RunMode::IngestFile(path),
            (false, None) => RunMode::Serve,
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse an optional environment variable, failing on present-but-invalid values.
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
