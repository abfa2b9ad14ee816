pub mod commands;
pub mod config;
pub mod core;
pub mod db;
pub mod intake;
pub mod pdf;
pub mod providers;
pub mod storage;
pub mod workflow;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::{
    config::{AppConfig, ConverterKind},
    core::errors::{AppError, AppResult},
    db::Database,
    providers::{gotenberg::GotenbergConverter, soffice::SofficeConverter, ConversionGateway},
    storage::{BlobStore, FsBlobStore, MetaStore, SqliteMetaStore},
    workflow::{DocumentService, EditingSession, ServiceSettings},
};

/// Everything a command needs: the document service and this session's editing state.
pub struct AppState {
    pub service: DocumentService,
    pub session: Mutex<EditingSession>,
    pub config: AppConfig,
}

impl AppState {
    pub fn with_parts(
        config: AppConfig,
        meta: Arc<dyn MetaStore>,
        blobs: Arc<dyn BlobStore>,
        converter: Arc<dyn ConversionGateway>,
    ) -> Self {
        let settings = ServiceSettings::from_config(&config);
        Self {
            service: DocumentService::new(meta, blobs, converter, settings),
            session: Mutex::new(EditingSession::new()),
            config,
        }
    }

    pub async fn open(config: AppConfig) -> AppResult<Self> {
        let db = Database::new(&config.data_dir).await?;
        let blobs = FsBlobStore::new(config.blobs_dir())?;
        let converter: Arc<dyn ConversionGateway> = match &config.converter {
            ConverterKind::Soffice { binary } => Arc::new(SofficeConverter::new(binary.clone())),
            ConverterKind::Gotenberg { base_url } => {
                Arc::new(GotenbergConverter::new(base_url.clone()).map_err(AppError::from)?)
            }
        };
        tracing::info!(
            data_dir = %config.data_dir.display(),
            converter = converter.name(),
            mode = ?config.conversion_mode,
            "docsign state opened"
        );
        Ok(Self::with_parts(
            config,
            Arc::new(SqliteMetaStore::new(db)),
            Arc::new(blobs),
            converter,
        ))
    }
}

fn init_tracing(config: &AppConfig) {
    let directives = if config.sqlx_debug {
        config.log_level.clone()
    } else {
        format!("{},sqlx::query=warn", config.log_level)
    };
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn serve_stdio(state: AppState) -> AppResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = commands::handle_line(&state, &line).await;
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

pub fn run() -> AppResult<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Internal(err.to_string()))?;
    runtime.block_on(async move {
        let state = AppState::open(config).await?;
        serve_stdio(state).await
    })
}
