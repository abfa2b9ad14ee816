use std::path::PathBuf;
use std::time::Duration;

use crate::{
    core::errors::{AppError, AppResult},
    db::default_data_dir,
};

pub const MIN_UPLOAD_MB: usize = 5;
pub const MAX_UPLOAD_MB: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterKind {
    Soffice { binary: PathBuf },
    Gotenberg { base_url: String },
}

/// Whether uploads wait for conversion or return while it runs in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    Sync,
    Async,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub sqlx_debug: bool,
    pub max_upload_bytes: usize,
    pub convert_timeout: Duration,
    pub converter: ConverterKind,
    pub conversion_mode: ConversionMode,
    pub poll_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".docsign"),
            log_level: "info".to_string(),
            sqlx_debug: false,
            max_upload_bytes: 10 * 1024 * 1024,
            convert_timeout: Duration::from_secs(60),
            converter: ConverterKind::Soffice {
                binary: PathBuf::from("soffice"),
            },
            conversion_mode: ConversionMode::Sync,
            poll_interval: Duration::from_millis(2000),
        }
    }
}

fn truthy(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::Validation(format!("{name} must be a number, got {raw:?}")))
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let data_dir = default_data_dir(lookup("DOCSIGN_DATA_DIR").map(PathBuf::from))?;
        let log_level = lookup("DOCSIGN_LOG")
            .unwrap_or(defaults.log_level)
            .to_ascii_lowercase();
        let sqlx_debug = lookup("DOCSIGN_SQLX_DEBUG").map(|v| truthy(&v)).unwrap_or(false);

        let max_upload_bytes = match lookup("DOCSIGN_MAX_UPLOAD_MB") {
            Some(raw) => {
                let mb: usize = parse_number("DOCSIGN_MAX_UPLOAD_MB", &raw)?;
                if !(MIN_UPLOAD_MB..=MAX_UPLOAD_MB).contains(&mb) {
                    return Err(AppError::Validation(format!(
                        "DOCSIGN_MAX_UPLOAD_MB must be between {MIN_UPLOAD_MB} and {MAX_UPLOAD_MB}, got {mb}"
                    )));
                }
                mb * 1024 * 1024
            }
            None => defaults.max_upload_bytes,
        };

        let convert_timeout = match lookup("DOCSIGN_CONVERT_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = parse_number("DOCSIGN_CONVERT_TIMEOUT_SECS", &raw)?;
                if secs == 0 {
                    return Err(AppError::Validation(
                        "DOCSIGN_CONVERT_TIMEOUT_SECS must be positive".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => defaults.convert_timeout,
        };

        let converter = match lookup("DOCSIGN_CONVERTER")
            .unwrap_or_else(|| "soffice".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "soffice" | "libreoffice" => ConverterKind::Soffice {
                binary: PathBuf::from(
                    lookup("DOCSIGN_SOFFICE_BIN").unwrap_or_else(|| "soffice".to_string()),
                ),
            },
            "gotenberg" | "http" => ConverterKind::Gotenberg {
                base_url: lookup("DOCSIGN_GOTENBERG_URL")
                    .unwrap_or_else(|| "http://localhost:3000".to_string()),
            },
            other => {
                return Err(AppError::Validation(format!(
                    "DOCSIGN_CONVERTER must be soffice or gotenberg, got {other:?}"
                )))
            }
        };

        let conversion_mode = match lookup("DOCSIGN_CONVERSION_MODE")
            .unwrap_or_else(|| "sync".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "sync" => ConversionMode::Sync,
            "async" => ConversionMode::Async,
            other => {
                return Err(AppError::Validation(format!(
                    "DOCSIGN_CONVERSION_MODE must be sync or async, got {other:?}"
                )))
            }
        };

        let poll_interval = match lookup("DOCSIGN_POLL_INTERVAL_MS") {
            Some(raw) => {
                let millis: u64 = parse_number("DOCSIGN_POLL_INTERVAL_MS", &raw)?;
                if millis == 0 {
                    return Err(AppError::Validation(
                        "DOCSIGN_POLL_INTERVAL_MS must be positive".to_string(),
                    ));
                }
                Duration::from_millis(millis)
            }
            None => defaults.poll_interval,
        };

        Ok(Self {
            data_dir,
            log_level,
            sqlx_debug,
            max_upload_bytes,
            convert_timeout,
            converter,
            conversion_mode,
            poll_interval,
        })
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }
}
