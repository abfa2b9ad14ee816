use std::path::PathBuf;
use std::time::Duration;

use crate::{
    core::{
        errors::{AppError, AppResult},
        geometry::{self, Corner, PageSize, PixelPoint},
        types::{
            ArtifactKind, AttachSignatureResponse, ClearDocumentResponse, DiscardSignatureResponse,
            DocumentStatusResponse, ExportArtifactResponse, PointerMoveResponse, SignatureField,
            WaitForConversionResponse,
        },
    },
    intake,
    workflow::{GestureKind, PollOutcome},
    AppState,
};

fn status_response(document: crate::core::types::DocumentMeta) -> DocumentStatusResponse {
    DocumentStatusResponse { document }
}

pub async fn submit_upload(
    state: &AppState,
    file_path: String,
    display_name: Option<String>,
) -> AppResult<DocumentStatusResponse> {
    let path = PathBuf::from(&file_path);
    if !path.exists() {
        return Err(AppError::NotFound(format!("file {file_path}")));
    }
    let size = std::fs::metadata(&path)
        .map_err(|err| AppError::Validation(err.to_string()))?
        .len();
    intake::ensure_within_limit(size as usize, state.service.settings().max_upload_bytes)?;
    let bytes = std::fs::read(&path).map_err(|err| AppError::Validation(err.to_string()))?;

    let name = display_name.unwrap_or_else(|| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.docx".to_string())
    });

    let previous_id = state.service.status().await?.document_id;
    let result = state.service.submit_upload(&name, bytes).await;
    // A rejected upload leaves the previous document and its session in place.
    let replaced = match &result {
        Ok(_) => true,
        Err(_) => state
            .service
            .status()
            .await
            .map(|meta| meta.document_id != previous_id)
            .unwrap_or(false),
    };
    if replaced {
        state.session.lock().await.reset();
    }
    Ok(status_response(result?))
}

pub async fn get_status(state: &AppState) -> AppResult<DocumentStatusResponse> {
    Ok(status_response(state.service.status().await?))
}

pub async fn wait_for_conversion(state: &AppState, max_wait_ms: Option<u64>) -> AppResult<WaitForConversionResponse> {
    let max_wait = max_wait_ms
        .map(Duration::from_millis)
        .unwrap_or(state.config.convert_timeout);
    let outcome = state
        .service
        .poll_until_settled(state.config.poll_interval, max_wait)
        .await?;
    Ok(WaitForConversionResponse {
        settled: matches!(outcome, PollOutcome::Settled(_)),
        document: outcome.into_meta(),
    })
}

pub async fn place_field(state: &AppState, field: SignatureField) -> AppResult<DocumentStatusResponse> {
    Ok(status_response(state.service.place_field(field).await?))
}

pub async fn sign(
    state: &AppState,
    signature_base64: String,
    field: Option<SignatureField>,
) -> AppResult<DocumentStatusResponse> {
    let png = intake::decode_signature(&signature_base64)?;
    let document = state.service.sign(png, field).await?;
    state.session.lock().await.discard_signature();
    Ok(status_response(document))
}

pub async fn export_artifact(state: &AppState, kind: ArtifactKind) -> AppResult<ExportArtifactResponse> {
    let bytes = state.service.fetch_artifact(kind).await?;
    let document_id = state
        .service
        .status()
        .await?
        .document_id
        .unwrap_or_else(|| "document".to_string());

    let export_dir = state.config.exports_dir();
    std::fs::create_dir_all(&export_dir).map_err(|err| AppError::StorageWrite(err.to_string()))?;
    let file_path = export_dir.join(format!("{document_id}-{}", kind.file_name()));
    std::fs::write(&file_path, &bytes).map_err(|err| AppError::StorageWrite(err.to_string()))?;
    Ok(ExportArtifactResponse {
        kind,
        file_path: file_path.to_string_lossy().to_string(),
        bytes: bytes.len(),
    })
}

pub async fn clear(state: &AppState) -> AppResult<ClearDocumentResponse> {
    state.session.lock().await.reset();
    let document = state.service.clear().await?;
    Ok(ClearDocumentResponse {
        cleared: true,
        document,
    })
}

pub async fn set_page_size(state: &AppState, page: u32, width: f64, height: f64) -> AppResult<DocumentStatusResponse> {
    if page < 1 || !(width > 0.0 && height > 0.0) {
        return Err(AppError::Validation(format!(
            "page {page} size {width}x{height} is not a rendered page"
        )));
    }
    state
        .session
        .lock()
        .await
        .set_page_size(page, PageSize::new(width, height));
    get_status(state).await
}

/// Places a default-sized field at a click; ignored while the page is not rendered.
pub async fn click_page(state: &AppState, page: u32, x: f64, y: f64) -> AppResult<DocumentStatusResponse> {
    let placed = state.session.lock().await.click(page, PixelPoint { x, y });
    match placed {
        Some(field) => place_field(state, field).await,
        None => {
            tracing::debug!(page, "click ignored, page not rendered");
            get_status(state).await
        }
    }
}

pub async fn pointer_down(state: &AppState, handle: Option<Corner>, x: f64, y: f64) -> AppResult<PointerMoveResponse> {
    let document = state.service.status().await?;
    let field = document.signature_field.ok_or_else(|| {
        AppError::StateConflict("no signature field to move".to_string())
    })?;
    let kind = match handle {
        Some(corner) => GestureKind::Resize(corner),
        None => GestureKind::Drag,
    };
    let mut session = state.session.lock().await;
    session.pointer_down(kind, field, PixelPoint { x, y })?;
    let rect = session
        .page_size(field.page)
        .map(|size| geometry::to_pixel_rect(&field, size));
    Ok(PointerMoveResponse {
        field: Some(field),
        rect,
    })
}

pub async fn pointer_move(state: &AppState, x: f64, y: f64) -> AppResult<PointerMoveResponse> {
    let mut session = state.session.lock().await;
    let field = session.pointer_move(PixelPoint { x, y });
    let rect = field.and_then(|field| {
        session
            .page_size(field.page)
            .map(|size| geometry::to_pixel_rect(&field, size))
    });
    Ok(PointerMoveResponse { field, rect })
}

/// Ends the gesture; the only point at which its geometry is persisted.
pub async fn pointer_up(state: &AppState, x: f64, y: f64) -> AppResult<DocumentStatusResponse> {
    let finished = state.session.lock().await.pointer_up(PixelPoint { x, y });
    match finished {
        Some(field) => place_field(state, field).await,
        None => get_status(state).await,
    }
}

pub async fn attach_signature(state: &AppState, signature_base64: String) -> AppResult<AttachSignatureResponse> {
    let png = intake::decode_signature(&signature_base64)?;
    let position = state.service.status().await?.signature_field.ok_or_else(|| {
        AppError::StateConflict("place a signature field before drawing a signature".to_string())
    })?;
    state.session.lock().await.attach_signature(png, position)?;
    Ok(AttachSignatureResponse {
        attached: true,
        position,
    })
}

pub async fn discard_signature(state: &AppState) -> AppResult<DiscardSignatureResponse> {
    let discarded = state.session.lock().await.discard_signature();
    Ok(DiscardSignatureResponse { discarded })
}

pub async fn finalize_signature(state: &AppState) -> AppResult<DocumentStatusResponse> {
    let mut session = state.session.lock().await;
    let document = session.finalize(&state.service).await?;
    Ok(status_response(document))
}
