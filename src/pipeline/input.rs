//! Input resolution: turn a path, URL or byte buffer into a local PDF file.
//!
//! pdfium opens documents from the file system, so every input ends up as a
//! path. Downloads and in-memory buffers are written to temporary files that
//! live exactly as long as the [`ResolvedInput`] holding them. The `%PDF`
//! magic is checked up front so callers get [`Layout2MdError::NotAPdf`]
//! instead of an opaque pdfium load error.

use crate::error::Layout2MdError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF on disk, plus whatever keeps a temporary copy alive.
pub enum ResolvedInput {
    /// The caller's own file.
    Local(PathBuf),
    /// Downloaded from a URL into a temporary directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// Written from an in-memory buffer.
    Buffered(NamedTempFile),
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
            ResolvedInput::Buffered(file) => file.path(),
        }
    }
}

/// `http://` or `https://`.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a user-supplied path or URL.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<ResolvedInput, Layout2MdError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Layout2MdError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(trimmed) {
        return download_url(trimmed, timeout_secs).await;
    }
    if let Some(path) = trimmed.strip_prefix("file://") {
        return resolve_local(path);
    }
    if trimmed.contains("://") {
        return Err(Layout2MdError::InvalidInput {
            input: input.to_string(),
        });
    }
    resolve_local(trimmed)
}

/// Write `bytes` to a managed temporary file after checking the magic.
pub fn resolve_bytes(bytes: &[u8]) -> Result<ResolvedInput, Layout2MdError> {
    let mut file = NamedTempFile::new()
        .map_err(|e| Layout2MdError::Internal(format!("tempfile: {e}")))?;
    check_magic(bytes, file.path())?;
    file.write_all(bytes)
        .map_err(|e| Layout2MdError::Internal(format!("tempfile write: {e}")))?;
    debug!("Buffered {} bytes to {}", bytes.len(), file.path().display());
    Ok(ResolvedInput::Buffered(file))
}

fn check_magic(head: &[u8], path: &Path) -> Result<(), Layout2MdError> {
    if head.len() >= 4 && &head[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[..4]);
        return Err(Layout2MdError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, Layout2MdError> {
    let path = PathBuf::from(path_str);
    if !path.is_file() {
        return Err(Layout2MdError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Layout2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Layout2MdError::FileNotFound { path }),
    };
    let mut head = [0u8; 4];
    if file.read_exact(&mut head).is_ok() {
        check_magic(&head, &path)?;
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Layout2MdError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| Layout2MdError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Layout2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = extract_filename(url, response.headers());
    let temp_dir = TempDir::new().map_err(|e| Layout2MdError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            Layout2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;
    check_magic(&bytes, &file_path)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Layout2MdError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// File name from `Content-Disposition`, else the last URL path segment.
fn extract_filename(url: &str, headers: &reqwest::header::HeaderMap) -> String {
    let from_header = headers
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.split(';')
                .map(str::trim)
                .find_map(|part| part.strip_prefix("filename="))
                .map(|name| name.trim_matches('"').to_string())
        });
    let from_url = || {
        reqwest::Url::parse(url).ok().and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
    };

    from_header
        .or_else(from_url)
        .map(|name| sanitise_filename(&name))
        .filter(|name| !name.is_empty() && name.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

fn sanitise_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}
