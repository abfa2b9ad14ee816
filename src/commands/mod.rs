//! Newline-delimited JSON command surface.
//!
//! Each request line is `{"command": "<name>", "args": {...}}`; each reply
//! is `{"ok": true, "data": ...}` or `{"ok": false, "error": {"code", "message"}}`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    core::{
        errors::{AppError, AppResult},
        geometry::Corner,
        types::{ArtifactKind, SignatureField},
    },
    AppState,
};

pub mod documents;

#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "command",
    content = "args",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    SubmitUpload {
        file_path: String,
        display_name: Option<String>,
    },
    GetStatus,
    WaitForConversion {
        max_wait_ms: Option<u64>,
    },
    PlaceField {
        field: SignatureField,
    },
    Sign {
        signature_base64: String,
        field: Option<SignatureField>,
    },
    ExportArtifact {
        kind: ArtifactKind,
    },
    Clear,
    SetPageSize {
        page: u32,
        width: f64,
        height: f64,
    },
    ClickPage {
        page: u32,
        x: f64,
        y: f64,
    },
    PointerDown {
        handle: Option<Corner>,
        x: f64,
        y: f64,
    },
    PointerMove {
        x: f64,
        y: f64,
    },
    PointerUp {
        x: f64,
        y: f64,
    },
    AttachSignature {
        signature_base64: String,
    },
    DiscardSignature,
    FinalizeSignature,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmitUpload { .. } => "submit_upload",
            Self::GetStatus => "get_status",
            Self::WaitForConversion { .. } => "wait_for_conversion",
            Self::PlaceField { .. } => "place_field",
            Self::Sign { .. } => "sign",
            Self::ExportArtifact { .. } => "export_artifact",
            Self::Clear => "clear",
            Self::SetPageSize { .. } => "set_page_size",
            Self::ClickPage { .. } => "click_page",
            Self::PointerDown { .. } => "pointer_down",
            Self::PointerMove { .. } => "pointer_move",
            Self::PointerUp { .. } => "pointer_up",
            Self::AttachSignature { .. } => "attach_signature",
            Self::DiscardSignature => "discard_signature",
            Self::FinalizeSignature => "finalize_signature",
        }
    }
}

pub async fn dispatch(state: &AppState, request: Request) -> AppResult<Value> {
    let value = match request {
        Request::SubmitUpload {
            file_path,
            display_name,
        } => serde_json::to_value(documents::submit_upload(state, file_path, display_name).await?)?,
        Request::GetStatus => serde_json::to_value(documents::get_status(state).await?)?,
        Request::WaitForConversion { max_wait_ms } => {
            serde_json::to_value(documents::wait_for_conversion(state, max_wait_ms).await?)?
        }
        Request::PlaceField { field } => serde_json::to_value(documents::place_field(state, field).await?)?,
        Request::Sign {
            signature_base64,
            field,
        } => serde_json::to_value(documents::sign(state, signature_base64, field).await?)?,
        Request::ExportArtifact { kind } => {
            serde_json::to_value(documents::export_artifact(state, kind).await?)?
        }
        Request::Clear => serde_json::to_value(documents::clear(state).await?)?,
        Request::SetPageSize {
            page,
            width,
            height,
        } => serde_json::to_value(documents::set_page_size(state, page, width, height).await?)?,
        Request::ClickPage { page, x, y } => {
            serde_json::to_value(documents::click_page(state, page, x, y).await?)?
        }
        Request::PointerDown { handle, x, y } => {
            serde_json::to_value(documents::pointer_down(state, handle, x, y).await?)?
        }
        Request::PointerMove { x, y } => serde_json::to_value(documents::pointer_move(state, x, y).await?)?,
        Request::PointerUp { x, y } => serde_json::to_value(documents::pointer_up(state, x, y).await?)?,
        Request::AttachSignature { signature_base64 } => {
            serde_json::to_value(documents::attach_signature(state, signature_base64).await?)?
        }
        Request::DiscardSignature => serde_json::to_value(documents::discard_signature(state).await?)?,
        Request::FinalizeSignature => serde_json::to_value(documents::finalize_signature(state).await?)?,
    };
    Ok(value)
}

/// Handles one request line and renders the reply line.
pub async fn handle_line(state: &AppState, line: &str) -> String {
    let result = match serde_json::from_str::<Request>(line) {
        Ok(request) => {
            let name = request.name();
            let outcome = dispatch(state, request).await;
            if let Err(err) = &outcome {
                tracing::warn!(command = name, code = err.code(), error = %err, "command failed");
            }
            outcome
        }
        Err(err) => Err(AppError::Validation(format!("malformed request: {err}"))),
    };
    let reply = match result {
        Ok(data) => json!({ "ok": true, "data": data }),
        Err(err) => json!({ "ok": false, "error": err }),
    };
    reply.to_string()
}
