use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf};

const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_dir: PathBuf,
    pub max_body_bytes: usize,
    pub cors_permissive: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Favorites backend for the vase editor")]
pub struct Args {
    /// Host to bind to (overrides VASE_FAVORITES_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VASE_FAVORITES_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding favorite documents (overrides VASE_FAVORITES_STORE_DIR)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Largest accepted request body in bytes (overrides VASE_FAVORITES_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,

    /// Allow cross-origin requests from any origin
    #[arg(long)]
    pub cors_permissive: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |key| env::var(key))
    }

    /// Merge parsed CLI args over values looked up through `lookup`.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = lookup("VASE_FAVORITES_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "VASE_FAVORITES_PORT", 5000u16)?;
        let env_store = lookup("VASE_FAVORITES_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./saved_favorites"));
        let env_max_body =
            parse_var(&lookup, "VASE_FAVORITES_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;
        let env_cors = lookup("VASE_FAVORITES_CORS_PERMISSIVE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            store_dir: args.store_dir.unwrap_or(env_store),
            max_body_bytes: args.max_body_bytes.unwrap_or(env_max_body),
            cors_permissive: args.cors_permissive || env_cors,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
