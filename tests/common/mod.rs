#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docsign_lib::{
    config::ConversionMode,
    core::{errors::ConversionErrorKind, retry::RetryPolicy, types::SignatureField},
    providers::{ConversionError, ConversionGateway},
    storage::{MemoryBlobStore, MemoryMetaStore},
    workflow::{DocumentService, ServiceSettings},
};
use futures::{future::BoxFuture, FutureExt};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::FileOptions;

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// PDF with one page per `(width, height)` entry, each carrying its own MediaBox.
pub fn build_pdf(pages: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for (width, height) in pages {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"2 0 0 2 0 0 cm 0 0 1 rg 10 10 50 50 re f".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (*width).into(), (*height).into()],
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save fixture pdf");
    out
}

/// Single page whose MediaBox lives on the parent Pages node.
pub fn build_pdf_with_inherited_media_box(width: i64, height: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save fixture pdf");
    out
}

/// Page tree without any MediaBox: countable, but not stampable.
pub fn build_pdf_without_media_box() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save fixture pdf");
    out
}

pub fn build_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, _| {
        if x % 2 == 0 {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 0, 0])
        }
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// Minimal word-processing package: content types plus `word/document.xml`.
pub fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
    let cursor = Cursor::new(Vec::<u8>::new());
    let mut zip = zip::ZipWriter::new(cursor);
    let options: FileOptions<'_, ()> = FileOptions::default();

    zip.start_file("[Content_Types].xml", options)
        .expect("start content types");
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#,
    )
    .expect("write content types");

    let body: String = paragraphs
        .iter()
        .map(|text| format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>"))
        .collect();
    zip.start_file("word/document.xml", options)
        .expect("start document");
    zip.write_all(
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
        .as_bytes(),
    )
    .expect("write document");

    zip.finish().expect("finish zip").into_inner()
}

pub fn field(page: u32, x_n: f64, y_n: f64) -> SignatureField {
    SignatureField {
        page,
        x_n,
        y_n,
        w_n: 0.28,
        h_n: 0.10,
    }
}

// ── Fake conversion gateway ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum FakeBehavior {
    Pdf(Vec<u8>),
    Fail(ConversionErrorKind),
}

pub struct FakeConverter {
    behavior: FakeBehavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeConverter {
    pub fn pdf(pdf: Vec<u8>) -> Self {
        Self {
            behavior: FakeBehavior::Pdf(pdf),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn letter() -> Self {
        Self::pdf(build_pdf(&[(612, 792), (612, 792)]))
    }

    pub fn failing(kind: ConversionErrorKind) -> Self {
        Self {
            behavior: FakeBehavior::Fail(kind),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConversionGateway for FakeConverter {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn convert<'a>(
        &'a self,
        _docx: &'a [u8],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<u8>, ConversionError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.behavior {
                FakeBehavior::Pdf(bytes) => Ok(bytes.clone()),
                FakeBehavior::Fail(ConversionErrorKind::BadInput) => {
                    Err(ConversionError::bad_input("unreadable document"))
                }
                FakeBehavior::Fail(ConversionErrorKind::Timeout) => {
                    Err(ConversionError::timeout(Duration::from_secs(1)))
                }
                FakeBehavior::Fail(ConversionErrorKind::Internal) => {
                    Err(ConversionError::internal("converter crashed"))
                }
            }
        }
        .boxed()
    }
}

// ── Service harness ───────────────────────────────────────────────────────────

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        jitter: false,
    }
}

pub fn settings(mode: ConversionMode) -> ServiceSettings {
    ServiceSettings {
        max_upload_bytes: 10 * 1024 * 1024,
        convert_timeout: Duration::from_secs(2),
        conversion_mode: mode,
        read_retry: fast_retry(),
    }
}

pub struct Harness {
    pub service: DocumentService,
    pub meta: Arc<MemoryMetaStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub converter: Arc<FakeConverter>,
}

impl Harness {
    pub fn with_settings(converter: FakeConverter, settings: ServiceSettings) -> Self {
        let meta = Arc::new(MemoryMetaStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let converter = Arc::new(converter);
        let service = DocumentService::new(meta.clone(), blobs.clone(), converter.clone(), settings);
        Self {
            service,
            meta,
            blobs,
            converter,
        }
    }

    pub fn new(converter: FakeConverter) -> Self {
        Self::with_settings(converter, settings(ConversionMode::Sync))
    }
}
