use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use uuid::Uuid;

use crate::error::{Error, Result};

const RESUME_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path under the uploads mount, e.g. `/uploads/resumes/<uuid>.pdf`.
    pub url: String,
    pub original_name: String,
    pub size: usize,
}

/// A file part read from a multipart request, not yet written to disk.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// Checks extension, size and leading bytes of a resume upload and returns
/// the normalized extension.
pub fn check_resume(filename: &str, data: &[u8], max_bytes: usize) -> Result<String> {
    if data.is_empty() {
        return Err(Error::BadRequest("Uploaded file is empty".into()));
    }
    if data.len() > max_bytes {
        return Err(Error::BadRequest(format!(
            "File exceeds the {} byte limit",
            max_bytes
        )));
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !RESUME_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::BadRequest(format!(
            "File type .{} is not allowed; upload a PDF or Word document",
            ext
        )));
    }

    let content_ok = match ext.as_str() {
        "pdf" => data.starts_with(b"%PDF"),
        "docx" => data.starts_with(b"PK\x03\x04"),
        "doc" => data.starts_with(&OLE_MAGIC),
        _ => false,
    };
    if !content_ok {
        return Err(Error::BadRequest(format!(
            "File content does not match the .{} extension",
            ext
        )));
    }

    Ok(ext)
}

pub async fn save_resume(
    uploads_dir: &str,
    filename: &str,
    data: &[u8],
    max_bytes: usize,
) -> Result<StoredFile> {
    let ext = check_resume(filename, data, max_bytes)?;

    let dir: PathBuf = Path::new(uploads_dir).join("resumes");
    fs::create_dir_all(&dir).await?;

    let stored_name = format!("{}.{}", Uuid::new_v4(), ext);
    let file_path = dir.join(&stored_name);
    fs::write(&file_path, data).await.map_err(|e| {
        tracing::error!(path = %file_path.display(), error = %e, "failed to write resume");
        Error::Internal(format!("Failed to save file: {}", e))
    })?;

    Ok(StoredFile {
        url: format!("/uploads/resumes/{}", stored_name),
        original_name: sanitize_name(filename),
        size: data.len(),
    })
}

/// Deletes a file written by [`save_resume`]. Failures are logged, not returned.
pub async fn remove_stored(uploads_dir: &str, url: &str) {
    let Some(name) = url
        .strip_prefix("/uploads/resumes/")
        .filter(|n| !n.is_empty() && !n.contains('/') && !n.contains(".."))
    else {
        tracing::warn!(%url, "refusing to remove a file outside the resume store");
        return;
    };
    let path = Path::new(uploads_dir).join("resumes").join(name);
    if let Err(e) = fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove orphaned resume");
    }
}

/// Keeps only the final path component of a client-supplied name.
fn sanitize_name(filename: &str) -> String {
    Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("resume")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}
