use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Unsupported file type: {0} (only PDF files are accepted)")]
    UnsupportedType(String),
    #[error("Invalid file name: {0}")]
    InvalidName(String),
    #[error("Failed to extract text: {0}")]
    Extraction(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Removes zero-width spaces left behind by some PDF producers and trims the result.
pub fn clean_text(text: &str) -> String {
    text.replace('\u{200b}', "").trim().to_string()
}

/// Reduces an uploaded file name to its base name and checks it is a PDF.
pub fn upload_name(file_name: &str) -> Result<&str, DocumentError> {
    let base_name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| DocumentError::InvalidName(file_name.to_string()))?;

    let is_pdf = Path::new(base_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(DocumentError::UnsupportedType(base_name.to_string()));
    }
    Ok(base_name)
}

/// Writes an uploaded PDF into `dir` under its base name and returns the stored path.
pub async fn save_upload(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, DocumentError> {
    let base_name = upload_name(file_name)?;

    fs::create_dir_all(dir).await?;
    let path = dir.join(base_name);
    fs::write(&path, bytes).await?;

    log::info!("Saved upload {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

pub async fn extract_text_from_pdf(path: &Path) -> Result<String, DocumentError> {
    let bytes = fs::read(path).await?;
    extract_text_from_bytes(bytes).await
}

/// Extracts the text of every page; pages without text are skipped and the rest
/// are separated by a blank line.
pub async fn extract_text_from_bytes(bytes: Vec<u8>) -> Result<String, DocumentError> {
    // pdf-extract is synchronous and may panic on malformed input.
    let pages = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .await
        .map_err(|e| DocumentError::Extraction(format!("PDF parser crashed: {}", e)))?
        .map_err(|e| DocumentError::Extraction(e.to_string()))?;

    let page_count = pages.len();
    let text = join_pages(&pages);
    log::debug!("Extracted {} characters from {} pages", text.chars().count(), page_count);
    Ok(text)
}

fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|page| clean_text(page.as_ref()))
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
