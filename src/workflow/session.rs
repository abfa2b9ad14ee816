//! Per-session editing state: rendered page sizes, the in-progress pointer
//! gesture and the temporary signature awaiting finalization.
//!
//! Pointer moves only update the gesture's ephemeral field. The field is
//! written to the document record once, on pointer-up.

use std::collections::HashMap;

use crate::{
    core::{
        errors::{AppError, AppResult},
        geometry::{self, Corner, PageSize, PixelDelta, PixelPoint},
        types::{DocumentMeta, SignatureField, TemporarySignature},
    },
    intake,
    workflow::service::DocumentService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize(Corner),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldGesture {
    kind: GestureKind,
    start: SignatureField,
    origin: PixelPoint,
    page_size: PageSize,
    current: SignatureField,
}

impl FieldGesture {
    pub fn begin(kind: GestureKind, start: SignatureField, origin: PixelPoint, page_size: PageSize) -> Self {
        Self {
            kind,
            start,
            origin,
            page_size,
            current: start,
        }
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn current(&self) -> SignatureField {
        self.current
    }

    /// Recomputes the field from the total pointer travel since pointer-down.
    pub fn update(&mut self, pointer: PixelPoint) -> SignatureField {
        let delta = PixelDelta::between(self.origin, pointer);
        self.current = match self.kind {
            GestureKind::Drag => geometry::drag(self.start, delta, self.page_size),
            GestureKind::Resize(corner) => geometry::resize(self.start, corner, delta, self.page_size),
        };
        self.current
    }

    pub fn finish(mut self, pointer: PixelPoint) -> SignatureField {
        self.update(pointer)
    }
}

#[derive(Debug, Default)]
pub struct EditingSession {
    page_sizes: HashMap<u32, PageSize>,
    gesture: Option<FieldGesture>,
    temporary: Option<TemporarySignature>,
}

impl EditingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything tied to the previous document.
    pub fn reset(&mut self) {
        self.page_sizes.clear();
        self.gesture = None;
        self.temporary = None;
    }

    pub fn set_page_size(&mut self, page: u32, size: PageSize) {
        self.page_sizes.insert(page, size);
    }

    pub fn page_size(&self, page: u32) -> Option<PageSize> {
        self.page_sizes.get(&page).copied()
    }

    pub fn gesture(&self) -> Option<&FieldGesture> {
        self.gesture.as_ref()
    }

    pub fn temporary(&self) -> Option<&TemporarySignature> {
        self.temporary.as_ref()
    }

    /// Field for a click on `page`; `None` until that page has been rendered.
    pub fn click(&mut self, page: u32, point: PixelPoint) -> Option<SignatureField> {
        self.gesture = None;
        let field = geometry::place_field(point, self.page_size(page), page)?;
        if let Some(temporary) = self.temporary.as_mut() {
            temporary.position = field;
        }
        Some(field)
    }

    /// Starts a drag or resize, superseding any gesture still in flight.
    pub fn pointer_down(&mut self, kind: GestureKind, field: SignatureField, point: PixelPoint) -> AppResult<()> {
        let size = self.page_size(field.page).ok_or_else(|| {
            AppError::StateConflict(format!("page {} has not been rendered yet", field.page))
        })?;
        self.gesture = Some(FieldGesture::begin(kind, field, point, size));
        Ok(())
    }

    pub fn pointer_move(&mut self, point: PixelPoint) -> Option<SignatureField> {
        self.gesture.as_mut().map(|gesture| gesture.update(point))
    }

    /// Ends the gesture and returns the field to persist.
    pub fn pointer_up(&mut self, point: PixelPoint) -> Option<SignatureField> {
        let field = self.gesture.take()?.finish(point);
        if let Some(temporary) = self.temporary.as_mut() {
            temporary.position = field;
        }
        Some(field)
    }

    pub fn attach_signature(&mut self, image_data: Vec<u8>, position: SignatureField) -> AppResult<()> {
        intake::ensure_png(&image_data)?;
        geometry::validate_field(&position)?;
        self.temporary = Some(TemporarySignature {
            image_data,
            position,
        });
        Ok(())
    }

    pub fn discard_signature(&mut self) -> bool {
        self.temporary.take().is_some()
    }

    /// Stamps the temporary signature; it is kept if signing fails so the
    /// user can retry after fixing the cause.
    pub async fn finalize(&mut self, service: &DocumentService) -> AppResult<DocumentMeta> {
        let temporary = self.temporary.as_ref().ok_or_else(|| {
            AppError::StateConflict("no signature has been drawn yet".to_string())
        })?;
        let meta = service
            .sign(temporary.image_data.clone(), Some(temporary.position))
            .await?;
        self.temporary = None;
        self.gesture = None;
        Ok(meta)
    }
}
