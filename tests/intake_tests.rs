mod common;

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use common::{build_docx, build_png};
use docsign_lib::intake;

const LIMIT: usize = 10 * 1024 * 1024;

#[test]
fn minimal_package_is_accepted() {
    let bytes = build_docx(&["First", "Second", "Third"]);
    let info = intake::inspect_docx(&bytes, LIMIT).expect("valid docx");
    assert_eq!(info.paragraphs, 3);
    assert_eq!(info.checksum, intake::checksum_bytes(&bytes));
    assert_eq!(info.checksum.len(), 64);
}

#[test]
fn docx_rs_generated_package_is_accepted() {
    let mut cursor = Cursor::new(Vec::new());
    docx_rs::Docx::new()
        .add_paragraph(docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("Hello")))
        .add_paragraph(docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("World")))
        .build()
        .pack(&mut cursor)
        .expect("pack docx");
    let info = intake::inspect_docx(&cursor.into_inner(), LIMIT).expect("valid docx");
    assert_eq!(info.paragraphs, 2);
}

#[test]
fn non_zip_upload_is_rejected() {
    let err = intake::inspect_docx(b"%PDF-1.7 this is a pdf", LIMIT).expect_err("not a zip");
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[test]
fn zip_without_word_part_is_rejected() {
    use std::io::Write;
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options: zip::write::FileOptions<'_, ()> = zip::write::FileOptions::default();
    zip.start_file("[Content_Types].xml", options).expect("start");
    zip.write_all(
        br#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#,
    )
    .expect("write");
    let bytes = zip.finish().expect("finish").into_inner();

    let err = intake::inspect_docx(&bytes, LIMIT).expect_err("spreadsheet");
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(err.to_string().contains("word-processing"));
}

#[test]
fn oversized_and_empty_uploads_are_rejected() {
    let bytes = build_docx(&["x"]);
    let err = intake::inspect_docx(&bytes, bytes.len() - 1).expect_err("over limit");
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(intake::inspect_docx(&[], LIMIT).is_err());
}

#[test]
fn signature_accepts_data_url_and_raw_base64() {
    let png = build_png(6, 3);
    let encoded = B64.encode(&png);

    let from_url = intake::decode_signature(&format!("data:image/png;base64,{encoded}")).expect("data url");
    assert_eq!(from_url, png);
    let raw = intake::decode_signature(&encoded).expect("raw base64");
    assert_eq!(raw, png);
}

#[test]
fn signature_must_be_png() {
    let err = intake::decode_signature(&B64.encode(b"GIF89a....")).expect_err("gif");
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = intake::decode_signature("data:image/png;base64,@@not-base64@@").expect_err("bad base64");
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[test]
fn highly_compressible_document_part_is_rejected() {
    use std::io::Write;
    const SMALL_LIMIT: usize = 64 * 1024;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options: zip::write::FileOptions<'_, ()> = zip::write::FileOptions::default();
    zip.start_file("[Content_Types].xml", options).expect("start");
    zip.write_all(
        br#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#,
    )
    .expect("write");
    zip.start_file("word/document.xml", options).expect("start");
    zip.write_all(br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#)
        .expect("write");
    let padding = vec![b' '; 64 * 1024];
    for _ in 0..(SMALL_LIMIT * intake::MAX_PART_INFLATION / padding.len() + 1) {
        zip.write_all(&padding).expect("write");
    }
    zip.write_all(b"<w:p/></w:body></w:document>").expect("write");
    let bytes = zip.finish().expect("finish").into_inner();
    assert!(bytes.len() < SMALL_LIMIT, "package itself stays under the limit");

    let err = intake::inspect_docx(&bytes, SMALL_LIMIT).expect_err("inflates too far");
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(err.to_string().contains("expands beyond"));
}
