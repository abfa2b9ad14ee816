use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use futures::{future::BoxFuture, FutureExt};
use tokio::process::Command;

use super::{ConversionError, ConversionGateway};

/// Converts through a headless LibreOffice (`soffice`) subprocess.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    binary: PathBuf,
}

impl SofficeConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, docx: &[u8], timeout: Duration) -> Result<Vec<u8>, ConversionError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| ConversionError::internal(format!("cannot create work dir: {e}")))?;
        let input = workdir.path().join("document.docx");
        let output = workdir.path().join("document.pdf");
        tokio::fs::write(&input, docx)
            .await
            .map_err(|e| ConversionError::internal(format!("cannot stage input: {e}")))?;

        let child = Command::new(&self.binary)
            .arg("--headless")
            .arg("--norestore")
            .arg("--nolockcheck")
            .arg(format!(
                "-env:UserInstallation=file://{}",
                workdir.path().join("profile").to_string_lossy()
            ))
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(workdir.path())
            .arg(&input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConversionError::internal(format!(
                    "cannot start {}: {e}",
                    self.binary.to_string_lossy()
                ))
            })?;

        let finished = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ConversionError::timeout(timeout))?
            .map_err(|e| ConversionError::internal(format!("converter did not finish: {e}")))?;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(ConversionError::internal(format!(
                "soffice exited with {}: {}",
                finished.status,
                stderr.trim()
            )));
        }

        match tokio::fs::read(&output).await {
            Ok(bytes) => Ok(bytes),
            // soffice exits 0 even when it could not load the input.
            Err(_) => Err(ConversionError::bad_input(
                "converter produced no PDF for this document",
            )),
        }
    }
}

impl ConversionGateway for SofficeConverter {
    fn name(&self) -> &'static str {
        "soffice"
    }

    fn convert<'a>(
        &'a self,
        docx: &'a [u8],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<u8>, ConversionError>> {
        self.run(docx, timeout).boxed()
    }
}
