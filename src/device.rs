//! File transfer between client and host. Payloads travel base64 encoded;
//! folders are pulled as a zip archive.

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::{write::SimpleFileOptions, ZipWriter};

use crate::error::{Result, WebDriverError};

fn require_path(path: Option<&str>) -> Result<&str> {
    match path {
        Some(path) if !path.is_empty() => Ok(path),
        _ => Err(WebDriverError::MissingParameter("path".to_string())),
    }
}

/// Write `data` to `path`, creating missing parent directories and
/// replacing any existing file.
pub async fn push_file(path: Option<&str>, data: Option<&str>) -> Result<()> {
    // empty data is a valid empty file
    let data = data.ok_or_else(|| WebDriverError::MissingParameter("data".to_string()))?;
    let path = require_path(path)?;
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| WebDriverError::InvalidArgument(format!("Data is not valid base64: {}", e)))?;

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let size = bytes.len();
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path))?;
    tracing::info!("Pushed {} bytes to {}", size, path);
    Ok(())
}

pub async fn pull_file(path: Option<&str>) -> Result<String> {
    let path = require_path(path)?;
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => return Err(WebDriverError::FileNotFound(path.to_string())),
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    Ok(STANDARD.encode(bytes))
}

/// Zip the folder's contents, entries named relative to the folder.
pub async fn pull_folder(path: Option<&str>) -> Result<String> {
    let path = require_path(path)?;
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => {}
        _ => return Err(WebDriverError::FileNotFound(path.to_string())),
    }

    let root = PathBuf::from(path);
    let archive = tokio::task::spawn_blocking(move || zip_folder(&root))
        .await
        .map_err(|e| WebDriverError::UnknownError(format!("Archive task failed: {}", e)))??;
    Ok(STANDARD.encode(archive))
}

fn zip_folder(root: &Path) -> anyhow::Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    add_folder(&mut writer, root, "")
        .with_context(|| format!("Failed to archive {}", root.display()))?;
    Ok(writer.finish()?.into_inner())
}

fn add_folder(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    folder: &Path,
    prefix: &str,
) -> anyhow::Result<()> {
    let mut entries = std::fs::read_dir(folder)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = format!("{}{}", prefix, entry.file_name().to_string_lossy());
        if entry.file_type()?.is_dir() {
            let name = format!("{}/", name);
            writer.add_directory(name.clone(), SimpleFileOptions::default())?;
            add_folder(writer, &entry.path(), &name)?;
        } else {
            writer.start_file(name, SimpleFileOptions::default())?;
            writer.write_all(&std::fs::read(entry.path())?)?;
        }
    }
    Ok(())
}
