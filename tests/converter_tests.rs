mod common;

use std::time::Duration;

use common::build_pdf;
use docsign_lib::{
    core::errors::ConversionErrorKind,
    providers::{convert_with_timeout, gotenberg::GotenbergConverter, soffice::SofficeConverter, ConversionGateway},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one canned HTTP response after consuming the request.
async fn serve_once(status_line: &'static str, body: Vec<u8>, delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        read_request(&mut socket).await;
        tokio::time::sleep(delay).await;
        let head = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/pdf\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            body.len()
        );
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(&body).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}")
}

async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let body_len = buf.len() - header_end - 4;
        match head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            Some(expected) if body_len >= expected => return,
            Some(_) => continue,
            None if buf.ends_with(b"--\r\n") || buf.ends_with(b"0\r\n\r\n") => return,
            None => continue,
        }
    }
}

#[tokio::test]
async fn gotenberg_returns_converted_pdf() {
    let pdf = build_pdf(&[(612, 792)]);
    let url = serve_once("200 OK", pdf.clone(), Duration::ZERO).await;
    let converter = GotenbergConverter::new(url).expect("client");

    let bytes = convert_with_timeout(&converter, b"PK\x03\x04docx", Duration::from_secs(5))
        .await
        .expect("converted");
    assert_eq!(bytes, pdf);
}

#[tokio::test]
async fn gotenberg_rejection_is_bad_input() {
    let url = serve_once("400 Bad Request", b"cannot read document".to_vec(), Duration::ZERO).await;
    let converter = GotenbergConverter::new(url).expect("client");
    let err = converter
        .convert(b"PK\x03\x04docx", Duration::from_secs(5))
        .await
        .expect_err("rejected");
    assert_eq!(err.kind, ConversionErrorKind::BadInput);
}

#[tokio::test]
async fn gotenberg_server_error_is_internal() {
    let url = serve_once("503 Service Unavailable", b"busy".to_vec(), Duration::ZERO).await;
    let converter = GotenbergConverter::new(url).expect("client");
    let err = converter
        .convert(b"PK\x03\x04docx", Duration::from_secs(5))
        .await
        .expect_err("unavailable");
    assert_eq!(err.kind, ConversionErrorKind::Internal);
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let url = serve_once("200 OK", build_pdf(&[(612, 792)]), Duration::from_secs(3)).await;
    let converter = GotenbergConverter::new(url).expect("client");
    let err = convert_with_timeout(&converter, b"PK\x03\x04docx", Duration::from_millis(200))
        .await
        .expect_err("too slow");
    assert_eq!(err.kind, ConversionErrorKind::Timeout);
}

#[tokio::test]
async fn non_pdf_body_is_internal() {
    let url = serve_once("200 OK", b"<html>oops</html>".to_vec(), Duration::ZERO).await;
    let converter = GotenbergConverter::new(url).expect("client");
    let err = convert_with_timeout(&converter, b"PK\x03\x04docx", Duration::from_secs(5))
        .await
        .expect_err("not a pdf");
    assert_eq!(err.kind, ConversionErrorKind::Internal);
}

#[tokio::test]
async fn missing_soffice_binary_is_internal() {
    let converter = SofficeConverter::new("/nonexistent/docsign-soffice");
    let err = converter
        .convert(b"PK\x03\x04docx", Duration::from_secs(5))
        .await
        .expect_err("binary missing");
    assert_eq!(err.kind, ConversionErrorKind::Internal);
}
