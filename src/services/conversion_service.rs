//! Conversion invoker: turns one staged input plus `ConversionOptions` into a
//! single ImageMagick invocation producing exactly one output file.

use crate::models::options::{ConversionOptions, TargetFormat};
use async_trait::async_trait;
use std::{
    io,
    path::Path,
    process::{ExitStatus, Stdio},
};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Converts one image file into another. The only implementation used in
/// production shells out; tests substitute their own.
#[async_trait]
pub trait ImageConverter: Send + Sync {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
    ) -> Result<(), ConvertError>;
}

/// Runs the ImageMagick CLI (`magick` by default) as a child process.
#[derive(Debug, Clone)]
pub struct MagickConverter {
    program: String,
}

impl MagickConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ImageConverter for MagickConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
    ) -> Result<(), ConvertError> {
        let args = build_args(input, output, options);
        tracing::debug!(program = %self.program, ?args, "running image tool");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ConvertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(ConvertError::Failed {
                program: self.program.clone(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Build the ImageMagick argument vector for one file.
///
/// Order matters: orientation and geometry come before any encoder
/// settings, and the output path is always last.
pub fn build_args(input: &Path, output: &Path, options: &ConversionOptions) -> Vec<String> {
    let mut args = vec![input.to_string_lossy().to_string()];

    args.push("-auto-orient".to_string());
    if let Some(geometry) = &options.resize {
        args.extend(["-resize".to_string(), geometry.clone()]);
    }
    if options.strip {
        args.push("-strip".to_string());
    }
    args.extend(["-colorspace".to_string(), "sRGB".to_string()]);

    let quality = options.quality.to_string();
    match options.target {
        TargetFormat::Webp => {
            if options.lossless {
                args.extend(["-define".to_string(), "webp:lossless=true".to_string()]);
            } else {
                args.extend(["-quality".to_string(), quality]);
                args.extend(["-define".to_string(), "webp:method=6".to_string()]);
            }
        }
        TargetFormat::Jpg => {
            args.extend([
                "-background".to_string(),
                options.background.clone(),
                "-alpha".to_string(),
                "remove".to_string(),
                "-alpha".to_string(),
                "off".to_string(),
            ]);
            args.extend(["-quality".to_string(), quality]);
        }
        TargetFormat::Png => {
            args.extend([
                "-define".to_string(),
                format!("png:compression-level={}", options.png_compression),
            ]);
        }
        TargetFormat::Heic => {
            if options.lossless {
                args.extend(["-define".to_string(), "heic:lossless=true".to_string()]);
            } else {
                args.extend(["-quality".to_string(), quality]);
                args.extend(["-define".to_string(), "heic:speed=1".to_string()]);
            }
        }
    }

    args.push(output.to_string_lossy().to_string());
    args
}
