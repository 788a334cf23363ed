//! Content extractor implementations backed by poppler-utils and tesseract.

pub mod pdf_ocr;
pub mod pdf_text;

pub use pdf_ocr::PdfOcrExtractor;
pub use pdf_text::PdfTextExtractor;

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use quizforge_core::{Error, Result};

/// Run a command with a timeout and require a successful exit.
async fn run_cmd(cmd: &mut Command, timeout_secs: u64) -> Result<Output> {
    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!(
                "External command timed out after {}s",
                timeout_secs
            ))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(output)
}

/// Run a command with a timeout, returning stdout as a string.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = run_cmd(cmd, timeout_secs).await?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command that writes its results to files rather than stdout.
pub(crate) async fn run_cmd_status(cmd: &mut Command, timeout_secs: u64) -> Result<()> {
    run_cmd(cmd, timeout_secs).await.map(|_| ())
}

/// Check that `path` exists and starts with the `%PDF` magic bytes.
///
/// Only the header is read.
pub(crate) async fn ensure_pdf(path: &Path) -> Result<()> {
    let unreadable =
        |e: std::io::Error| Error::Extraction(format!("Cannot read {}: {}", path.display(), e));

    let mut file = tokio::fs::File::open(path).await.map_err(unreadable)?;
    let len = file.metadata().await.map_err(unreadable)?.len();
    if len == 0 {
        return Err(Error::Extraction(format!(
            "File '{}' is empty",
            path.display()
        )));
    }

    let mut magic = [0u8; 4];
    let has_header = match file.read_exact(&mut magic).await {
        Ok(_) => &magic == b"%PDF",
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(unreadable(e)),
    };
    if !has_header {
        return Err(Error::Extraction(format!(
            "File '{}' is not a valid PDF (missing %PDF header)",
            path.display()
        )));
    }
    Ok(())
}

/// Whether a probe command exists. Poppler tools exit 99 on `-v` in some versions.
pub(crate) async fn binary_available(program: &str, version_flag: &str) -> bool {
    match Command::new(program).arg(version_flag).output().await {
        Ok(output) => output.status.success() || output.status.code() == Some(99),
        Err(_) => false,
    }
}
