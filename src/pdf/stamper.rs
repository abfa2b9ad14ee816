//! Burns a raster signature onto one page of a PDF.
//!
//! The source bytes are parsed into a fresh [`Document`], the image is
//! added as an XObject (RGB samples plus a gray soft mask for alpha), the
//! page's existing content is isolated in `q … Q` and a draw operation is
//! appended. The result is serialized into a new buffer.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;

use crate::core::{
    errors::AppError,
    geometry::{self, PdfRect},
    types::SignatureField,
};

const XOBJECT_PREFIX: &str = "ImSig";

#[derive(Debug, Error)]
pub enum StampError {
    #[error("page {page} is out of range (document has {page_count} pages)")]
    InvalidPage { page: u32, page_count: u32 },
    #[error("malformed PDF: {0}")]
    MalformedPdf(String),
    #[error("malformed signature image: {0}")]
    MalformedImage(String),
    #[error("failed to write PDF: {0}")]
    Serialize(String),
}

impl From<StampError> for AppError {
    fn from(value: StampError) -> Self {
        match value {
            StampError::InvalidPage { .. } => AppError::Validation(value.to_string()),
            other => AppError::Stamping(other.to_string()),
        }
    }
}

/// Where the image ended up on the page, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampPlacement {
    pub page: u32,
    pub rect: PdfRect,
}

#[derive(Debug, Clone)]
pub struct StampOutput {
    pub pdf: Vec<u8>,
    pub placement: StampPlacement,
}

struct PageBox {
    llx: f64,
    lly: f64,
    width: f64,
    height: f64,
}

struct DecodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Vec<u8>,
}

/// Counts the pages of a PDF.
pub fn page_count(pdf: &[u8]) -> Result<u32, StampError> {
    let doc = Document::load_mem(pdf).map_err(|e| StampError::MalformedPdf(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Draw rectangle for `field` on a page with the given box.
fn placement_for(field: &SignatureField, page_box: &PageBox) -> PdfRect {
    let rect = geometry::to_pdf_rect(field, page_box.width, page_box.height);
    PdfRect {
        x: rect.x + page_box.llx,
        y: rect.y + page_box.lly,
        ..rect
    }
}

pub fn stamp(source_pdf: &[u8], field: &SignatureField, signature_png: &[u8]) -> Result<StampOutput, StampError> {
    let mut doc =
        Document::load_mem(source_pdf).map_err(|e| StampError::MalformedPdf(e.to_string()))?;

    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let page_id = *pages
        .get(&field.page)
        .ok_or(StampError::InvalidPage {
            page: field.page,
            page_count,
        })?;

    let page_box = page_box(&doc, page_id)?;
    let image = decode_png(signature_png)?;
    let rect = placement_for(field, &page_box);

    let image_id = add_image(&mut doc, image)?;
    let name = register_xobject(&mut doc, page_id, image_id)?;

    let draw = format!(
        "q {:.4} 0 0 {:.4} {:.4} {:.4} cm /{} Do Q\n",
        rect.width, rect.height, rect.x, rect.y, name
    );
    wrap_contents_and_append(&mut doc, page_id, draw.into_bytes())?;

    let mut pdf = Vec::new();
    doc.save_to(&mut pdf)
        .map_err(|e| StampError::Serialize(e.to_string()))?;

    tracing::debug!(
        page = field.page,
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        "signature stamped"
    );

    Ok(StampOutput {
        pdf,
        placement: StampPlacement {
            page: field.page,
            rect,
        },
    })
}

fn decode_png(bytes: &[u8]) -> Result<DecodedImage, StampError> {
    let format = image::guess_format(bytes).map_err(|e| StampError::MalformedImage(e.to_string()))?;
    if format != image::ImageFormat::Png {
        return Err(StampError::MalformedImage(format!(
            "expected PNG, got {format:?}"
        )));
    }
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
        .map_err(|e| StampError::MalformedImage(e.to_string()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(StampError::MalformedImage("image has no pixels".to_string()));
    }
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in img.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }
    Ok(DecodedImage {
        width,
        height,
        rgb,
        alpha,
    })
}

fn compressed(dict: Dictionary, content: Vec<u8>) -> Result<Stream, StampError> {
    let mut stream = Stream::new(dict, content);
    stream
        .compress()
        .map_err(|e| StampError::Serialize(format!("stream compression failed: {e}")))?;
    Ok(stream)
}

fn add_image(doc: &mut Document, image: DecodedImage) -> Result<ObjectId, StampError> {
    let smask = compressed(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        image.alpha,
    )?;
    let smask_id = doc.add_object(smask);

    let stream = compressed(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => smask_id,
        },
        image.rgb,
    )?;
    Ok(doc.add_object(stream))
}

fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox, StampError> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc
            .get_object(id)
            .and_then(Object::as_dict)
            .map_err(|_| StampError::MalformedPdf("page is not a dictionary".to_string()))?;
        if let Some(found) = media_box(doc, dict) {
            return Ok(found);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Err(StampError::MalformedPdf("page has no MediaBox".to_string()))
}

fn media_box(doc: &Document, dict: &Dictionary) -> Option<PageBox> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = obj_to_f64(&arr[0])?;
    let lly = obj_to_f64(&arr[1])?;
    let urx = obj_to_f64(&arr[2])?;
    let ury = obj_to_f64(&arr[3])?;
    let width = (urx - llx).abs();
    let height = (ury - lly).abs();
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some(PageBox {
        llx: llx.min(urx),
        lly: lly.min(ury),
        width,
        height,
    })
}

fn obj_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

/// Resolves a possibly indirect dictionary entry into an owned dictionary.
fn owned_dict(doc: &Document, obj: Option<&Object>) -> Result<Dictionary, StampError> {
    match obj {
        None => Ok(Dictionary::new()),
        Some(Object::Dictionary(dict)) => Ok(dict.clone()),
        Some(Object::Reference(id)) => doc
            .get_object(*id)
            .and_then(Object::as_dict)
            .cloned()
            .map_err(|_| StampError::MalformedPdf("resource entry is not a dictionary".to_string())),
        Some(_) => Err(StampError::MalformedPdf(
            "resource entry is not a dictionary".to_string(),
        )),
    }
}

/// Resources may be inherited from an ancestor page tree node.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, StampError> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc
            .get_object(id)
            .and_then(Object::as_dict)
            .map_err(|_| StampError::MalformedPdf("page is not a dictionary".to_string()))?;
        if let Ok(resources) = dict.get(b"Resources") {
            return owned_dict(doc, Some(resources));
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(Dictionary::new())
}

/// Adds the image under an unused name to the page's own resources.
fn register_xobject(doc: &mut Document, page_id: ObjectId, image_id: ObjectId) -> Result<String, StampError> {
    let mut resources = inherited_resources(doc, page_id)?;
    let mut xobjects = owned_dict(doc, resources.get(b"XObject").ok())?;

    let mut index = 0;
    let name = loop {
        let candidate = if index == 0 {
            XOBJECT_PREFIX.to_string()
        } else {
            format!("{XOBJECT_PREFIX}{index}")
        };
        if !xobjects.has(candidate.as_bytes()) {
            break candidate;
        }
        index += 1;
    };

    xobjects.set(name.clone(), image_id);
    resources.set("XObject", xobjects);

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| StampError::MalformedPdf("page is not a dictionary".to_string()))?;
    page.set("Resources", resources);
    Ok(name)
}

fn wrap_contents_and_append(doc: &mut Document, page_id: ObjectId, draw: Vec<u8>) -> Result<(), StampError> {
    let existing: Vec<Object> = {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|_| StampError::MalformedPdf("page is not a dictionary".to_string()))?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            Ok(_) => {
                return Err(StampError::MalformedPdf(
                    "page contents are neither a stream nor an array".to_string(),
                ))
            }
            Err(_) => Vec::new(),
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    if !existing.is_empty() {
        let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
    }
    let mut tail = if contents.is_empty() {
        Vec::new()
    } else {
        b"Q\n".to_vec()
    };
    tail.extend_from_slice(&draw);
    let tail_id = doc.add_object(Stream::new(dictionary! {}, tail));
    contents.push(Object::Reference(tail_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| StampError::MalformedPdf("page is not a dictionary".to_string()))?;
    page.set("Contents", contents);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_adds_media_box_origin() {
        let field = SignatureField {
            page: 1,
            x_n: 0.5,
            y_n: 0.5,
            w_n: 0.28,
            h_n: 0.1,
        };
        let rect = placement_for(
            &field,
            &PageBox {
                llx: 10.0,
                lly: 20.0,
                width: 612.0,
                height: 792.0,
            },
        );
        assert!((rect.x - 230.32).abs() < 1e-6);
        assert!((rect.y - 376.4).abs() < 1e-6);
    }

    #[test]
    fn non_png_bytes_are_rejected() {
        let err = decode_png(b"GIF89a not really").err().expect("gif is not accepted");
        assert!(matches!(err, StampError::MalformedImage(_)));
    }
}
