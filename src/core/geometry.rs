//! Signature field geometry.
//!
//! Three coordinate spaces meet here:
//!   * page pixels, as rendered on screen, origin top-left;
//!   * normalized units, fractions of the rendered page, origin top-left;
//!   * PDF points, origin bottom-left (see [`to_pdf_rect`]).
//!
//! Every function is pure. Interactive edits never fail: out-of-range
//! results are clamped back onto the page.

use serde::{Deserialize, Serialize};

use crate::core::{
    errors::{AppError, AppResult},
    types::SignatureField,
};

/// Default field width, as a fraction of the page width.
pub const DEFAULT_FIELD_WIDTH: f64 = 0.28;
/// Default field height, as a fraction of the page height.
pub const DEFAULT_FIELD_HEIGHT: f64 = 0.10;
/// Smallest size a resize may shrink the field to.
pub const MIN_FIELD_SIZE: f64 = 0.05;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PixelDelta {
    pub dx: f64,
    pub dy: f64,
}

impl PixelDelta {
    pub const ZERO: Self = Self { dx: 0.0, dy: 0.0 };

    pub fn between(from: PixelPoint, to: PixelPoint) -> Self {
        Self {
            dx: to.x - from.x,
            dy: to.y - from.y,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Field rectangle in PDF point space. `x`/`y` is the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Resize handle being dragged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Sign coefficients `(sx, sy)`: positive when dragging toward +x/+y grows the field.
    pub fn signs(&self) -> (f64, f64) {
        match self {
            Self::TopLeft => (-1.0, -1.0),
            Self::TopRight => (1.0, -1.0),
            Self::BottomLeft => (-1.0, 1.0),
            Self::BottomRight => (1.0, 1.0),
        }
    }
}

fn normalized_delta(delta: PixelDelta, page: PageSize) -> (f64, f64) {
    (delta.dx / page.width, delta.dy / page.height)
}

/// Keeps a center coordinate far enough from both edges for the extent to fit.
fn clamp_center(center: f64, extent: f64) -> f64 {
    let half = extent / 2.0;
    if center - half < 0.0 {
        half
    } else if center + half > 1.0 {
        1.0 - half
    } else {
        center
    }
}

fn clamp_to_page(mut field: SignatureField) -> SignatureField {
    field.x_n = clamp_center(field.x_n, field.w_n);
    field.y_n = clamp_center(field.y_n, field.h_n);
    field
}

/// Places a default-sized field centered on a click.
///
/// Returns `None` while the page has not been rendered yet.
pub fn place_field(click: PixelPoint, page_size: Option<PageSize>, page: u32) -> Option<SignatureField> {
    let size = page_size.filter(PageSize::is_usable)?;
    let field = SignatureField {
        page: page.max(1),
        x_n: click.x / size.width,
        y_n: click.y / size.height,
        w_n: DEFAULT_FIELD_WIDTH,
        h_n: DEFAULT_FIELD_HEIGHT,
    };
    Some(clamp_to_page(field))
}

/// Resizes `start` by dragging `handle` by `delta` pixels.
///
/// Left and top handles move the center by the full delta while the size
/// changes by the same amount, so the opposite corner is not anchored: the
/// far edge shifts by half the delta. Right and bottom handles only change
/// the size. The size is clamped to
/// [`MIN_FIELD_SIZE`] before the rectangle is pulled back inside the page.
pub fn resize(start: SignatureField, handle: Corner, delta: PixelDelta, page_size: PageSize) -> SignatureField {
    if !page_size.is_usable() {
        return start;
    }
    let (dx, dy) = normalized_delta(delta, page_size);
    let (sx, sy) = handle.signs();

    let mut field = start;
    field.w_n = start.w_n + sx * dx;
    field.h_n = start.h_n + sy * dy;
    if sx < 0.0 {
        field.x_n = start.x_n + dx;
    }
    if sy < 0.0 {
        field.y_n = start.y_n + dy;
    }

    field.w_n = field.w_n.clamp(MIN_FIELD_SIZE, 1.0);
    field.h_n = field.h_n.clamp(MIN_FIELD_SIZE, 1.0);
    clamp_to_page(field)
}

/// Moves `start` by `delta` pixels without changing its size.
pub fn drag(start: SignatureField, delta: PixelDelta, page_size: PageSize) -> SignatureField {
    if !page_size.is_usable() {
        return start;
    }
    let (dx, dy) = normalized_delta(delta, page_size);
    let mut field = start;
    field.x_n += dx;
    field.y_n += dy;
    clamp_to_page(field)
}

/// Pixel rectangle of a field for overlay rendering.
pub fn to_pixel_rect(field: &SignatureField, page_size: PageSize) -> PixelRect {
    PixelRect {
        left: (field.x_n - field.w_n / 2.0) * page_size.width,
        top: (field.y_n - field.h_n / 2.0) * page_size.height,
        width: field.w_n * page_size.width,
        height: field.h_n * page_size.height,
    }
}

/// Field rectangle in PDF points for a page of `page_width` x `page_height`.
///
/// PDF space grows upward from the bottom-left corner, so the vertical
/// center is flipped before the half extents are subtracted.
pub fn to_pdf_rect(field: &SignatureField, page_width: f64, page_height: f64) -> PdfRect {
    let width = field.w_n * page_width;
    let height = field.h_n * page_height;
    let center_x = field.x_n * page_width;
    let center_y = (1.0 - field.y_n) * page_height;
    PdfRect {
        x: center_x - width / 2.0,
        y: center_y - height / 2.0,
        width,
        height,
    }
}

/// Checks a field submitted from outside the gesture code.
pub fn validate_field(field: &SignatureField) -> AppResult<()> {
    if field.page < 1 {
        return Err(AppError::Validation("page must be 1 or greater".to_string()));
    }
    let values = [field.x_n, field.y_n, field.w_n, field.h_n];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AppError::Validation("field coordinates must be finite numbers".to_string()));
    }
    if !(0.0..=1.0).contains(&field.x_n) || !(0.0..=1.0).contains(&field.y_n) {
        return Err(AppError::Validation(format!(
            "field center ({}, {}) must lie within [0, 1]",
            field.x_n, field.y_n
        )));
    }
    if field.w_n <= 0.0 || field.w_n > 1.0 || field.h_n <= 0.0 || field.h_n > 1.0 {
        return Err(AppError::Validation(format!(
            "field size {} x {} must be within (0, 1]",
            field.w_n, field.h_n
        )));
    }
    let left = field.x_n - field.w_n / 2.0;
    let right = field.x_n + field.w_n / 2.0;
    let top = field.y_n - field.h_n / 2.0;
    let bottom = field.y_n + field.h_n / 2.0;
    if left < -EPSILON || top < -EPSILON || right > 1.0 + EPSILON || bottom > 1.0 + EPSILON {
        return Err(AppError::Validation(
            "field rectangle extends beyond the page".to_string(),
        ));
    }
    Ok(())
}
