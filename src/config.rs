use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub magick_bin: String,
    pub retention_hours: u64,
    pub sweep_interval_minutes: u64,
    pub max_upload_mb: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Batch image conversion API backed by ImageMagick")]
pub struct Args {
    /// Host to bind to (overrides CONVERTER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Staging directory for uploaded files (overrides CONVERTER_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Root directory holding one folder per batch (overrides CONVERTER_OUTPUT_DIR)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// ImageMagick executable (overrides CONVERTER_MAGICK_BIN)
    #[arg(long)]
    pub magick_bin: Option<String>,

    /// Hours a batch is kept before the janitor removes it
    #[arg(long)]
    pub retention_hours: Option<u64>,

    /// Minutes between janitor sweeps
    #[arg(long)]
    pub sweep_interval_minutes: Option<u64>,

    /// Maximum request body size in megabytes
    #[arg(long)]
    pub max_upload_mb: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |key| env::var(key))
    }

    /// Merge already-parsed CLI args over values produced by `lookup`.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let text = |key: &str, default: &str| -> Result<String> {
            match lookup(key) {
                Ok(value) => Ok(value),
                Err(env::VarError::NotPresent) => Ok(default.to_string()),
                Err(err) => Err(err).with_context(|| format!("reading {}", key)),
            }
        };

        let env_host = text("CONVERTER_HOST", "0.0.0.0")?;
        let env_port = parse_var(&lookup, "PORT", 3000u16)?;
        let env_upload = text("CONVERTER_UPLOAD_DIR", "./uploads")?;
        let env_output = text("CONVERTER_OUTPUT_DIR", "./output")?;
        let env_magick = text("CONVERTER_MAGICK_BIN", "magick")?;
        let env_retention = parse_var(&lookup, "CONVERTER_RETENTION_HOURS", 24u64)?;
        let env_sweep = parse_var(&lookup, "CONVERTER_SWEEP_INTERVAL_MINUTES", 180u64)?;
        let env_max_upload = parse_var(&lookup, "CONVERTER_MAX_UPLOAD_MB", 512usize)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.unwrap_or_else(|| env_upload.into()),
            output_dir: args.output_dir.unwrap_or_else(|| env_output.into()),
            magick_bin: args.magick_bin.unwrap_or(env_magick),
            retention_hours: args.retention_hours.unwrap_or(env_retention),
            sweep_interval_minutes: args.sweep_interval_minutes.unwrap_or(env_sweep),
            max_upload_mb: args.max_upload_mb.unwrap_or(env_max_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(3600))
    }

    pub fn sweep_interval(&self) -> Duration {
        // a zero period would make tokio's interval panic
        Duration::from_secs(self.sweep_interval_minutes.max(1).saturating_mul(60))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
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
