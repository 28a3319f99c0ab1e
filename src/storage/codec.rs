//! Record encoding: pretty JSON, optionally gzip-compressed

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::path::Path;
use tokio::fs;

use super::error::{StorageError, StorageResult};
use super::layout::is_compressed;

/// Encode a record for writing
pub fn encode<T: Serialize>(record: &T, compress: bool) -> StorageResult<Vec<u8>> {
    let json = serde_json::to_vec_pretty(record)?;
    if !compress {
        return Ok(json);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decode bytes read from `path`; the extension decides whether to gunzip
pub fn decode<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> StorageResult<T> {
    if is_compressed(path) {
        let mut decoder = GzDecoder::new(bytes);
        let mut json = Vec::new();
        decoder.read_to_end(&mut json)?;
        serde_json::from_slice(&json).map_err(StorageError::serialization)
    } else {
        serde_json::from_slice(bytes).map_err(StorageError::serialization)
    }
}

/// Read and decode a record file
pub async fn read_record<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let bytes = fs::read(path).await?;
    decode(path, &bytes)
}

/// Write bytes atomically: write a sibling temp file, then rename over the target
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::configuration(format!("invalid path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
