//! Receiver pipeline: the HTTP endpoint that lands uploads in the drop
//! directory.
//!
//! Per request: pass key check, method check, multipart parse, file name
//! validation, exclusive create, streamed write, then unpacking when the
//! upload is framed as a directory. Failures map to status codes and never
//! take the server down.

use crate::archive;
use crate::config::ReceiverConfig;
use crate::error::{ConfigError, ServeError, UploadError};
use crate::protocol::{base_name, FileKind, FILE_FIELD, FILE_TYPE_HEADER, PASS_KEY_HEADER, UPLOAD_PATH};
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use storage::{DropDir, Landed, Landing, StorageError};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct ReceiverState {
    config: Arc<ReceiverConfig>,
    drop_dir: DropDir,
}

/// Build the upload router for `config`.
pub fn router(config: ReceiverConfig) -> Result<Router, ConfigError> {
    let drop_dir = DropDir::open(&config.drop_dir)?;
    let state = ReceiverState {
        config: Arc::new(config),
        drop_dir,
    };

    Ok(Router::new()
        .route("/", post(upload))
        .route(UPLOAD_PATH, post(upload))
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn_with_state(state.clone(), require_pass_key))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Bind the listen socket on every interface.
pub async fn bind(config: &ReceiverConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port))).await
}

/// Serve uploads on `listener` until the process ends or the server fails.
pub async fn serve(listener: TcpListener, config: ReceiverConfig) -> Result<(), ServeError> {
    let drop_dir = config.drop_dir.clone();
    let app = router(config)?;
    tracing::info!(
        "Receiver listening on {} (drop dir {})",
        listener.local_addr()?,
        drop_dir.display()
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn require_pass_key(State(state): State<ReceiverState>, request: Request, next: Next) -> Response {
    // Raw bytes: keys may be non-ASCII, which `to_str` refuses.
    let authorized = request
        .headers()
        .get(PASS_KEY_HEADER)
        .is_some_and(|value| state.config.pass_key.matches(value.as_bytes()));

    if authorized {
        next.run(request).await
    } else {
        UploadError::AuthRejected.into_response()
    }
}

async fn upload(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<StatusCode, UploadError> {
    let kind = FileKind::from_header(headers.get(FILE_TYPE_HEADER).and_then(|v| v.to_str().ok()));
    let mut multipart = multipart.map_err(|e| UploadError::InvalidUpload(e.body_text()))?;

    let landed = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::InvalidUpload(e.body_text()))?;
        let Some(mut field) = field else {
            return Err(UploadError::InvalidUpload(format!("missing {FILE_FIELD:?} part")));
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let raw = field.file_name().unwrap_or_default().to_string();
        let name = base_name(&raw)
            .ok_or_else(|| UploadError::InvalidUpload(format!("invalid file name {raw:?}")))?
            .to_string();
        break land(&state.drop_dir, &name, &mut field).await?;
    };
    tracing::info!(
        "Received {} ({} bytes, sha256 {})",
        landed.path.display(),
        landed.bytes,
        landed.sha256
    );

    if kind == FileKind::Directory {
        let archive_path = landed.path.clone();
        let dest = state.drop_dir.root().to_path_buf();
        let summary = tokio::task::spawn_blocking(move || archive::unpack(&archive_path, &dest))
            .await
            .map_err(|e| UploadError::Internal(e.to_string()))??;
        tracing::info!(
            "Unpacked {}: {} dirs, {} files, {} bytes",
            landed.path.display(),
            summary.dirs,
            summary.files,
            summary.bytes
        );
    }

    Ok(StatusCode::OK)
}

async fn land(drop_dir: &DropDir, name: &str, field: &mut Field<'_>) -> Result<Landed, UploadError> {
    let mut landing = drop_dir.create(name).await.map_err(|e| match e {
        StorageError::AlreadyExists(_) => UploadError::NameCollision(name.to_string()),
        other => UploadError::Storage(other),
    })?;
    tracing::debug!("Landing {}", landing.path().display());

    match fill(&mut landing, field).await {
        Ok(()) => Ok(landing.finish()),
        Err(e) => {
            landing.discard().await;
            Err(e)
        }
    }
}

async fn fill(landing: &mut Landing, field: &mut Field<'_>) -> Result<(), UploadError> {
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadError::InvalidUpload(e.body_text()))?
    {
        landing.write(&chunk).await?;
    }
    landing.sync().await?;
    Ok(())
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthRejected => StatusCode::UNAUTHORIZED,
            Self::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            Self::NameCollision(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Extract(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Upload failed: {}", self);
            (status, "Failed to save the file on server").into_response()
        } else {
            tracing::warn!("Upload rejected: {}", self);
            (status, self.to_string()).into_response()
        }
    }
}
