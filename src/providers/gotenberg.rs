use std::time::Duration;

use futures::{future::BoxFuture, FutureExt};
use reqwest::{multipart, StatusCode};

use super::{ConversionError, ConversionGateway};
use crate::core::types::DOCX_MIME;

/// Converts through a Gotenberg-compatible HTTP conversion service.
#[derive(Debug, Clone)]
pub struct GotenbergConverter {
    http: reqwest::Client,
    base_url: String,
}

impl GotenbergConverter {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConversionError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| ConversionError::internal(err.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/forms/libreoffice/convert", self.base_url)
    }

    async fn request(&self, docx: &[u8], timeout: Duration) -> Result<Vec<u8>, ConversionError> {
        let part = multipart::Part::bytes(docx.to_vec())
            .file_name("document.docx")
            .mime_str(DOCX_MIME)
            .map_err(|err| ConversionError::internal(err.to_string()))?;
        let form = multipart::Form::new().part("files", part);

        let response = self
            .http
            .post(self.endpoint())
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ConversionError::timeout(timeout)
                } else {
                    ConversionError::internal(err.to_string())
                }
            })?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE | StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                return Err(ConversionError::bad_input(format!(
                    "conversion service rejected the document: {body}"
                )));
            }
            StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => {
                return Err(ConversionError::timeout(timeout));
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ConversionError::internal(format!(
                    "status {status} body {body}"
                )));
            }
            _ => {}
        }

        let bytes = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                ConversionError::timeout(timeout)
            } else {
                ConversionError::internal(err.to_string())
            }
        })?;
        Ok(bytes.to_vec())
    }
}

impl ConversionGateway for GotenbergConverter {
    fn name(&self) -> &'static str {
        "gotenberg"
    }

    fn convert<'a>(
        &'a self,
        docx: &'a [u8],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<u8>, ConversionError>> {
        self.request(docx, timeout).boxed()
    }
}
