use crate::error::{Result, RigbyError};
use crate::hashing;
use crate::manifest::Chunk;
use std::path::PathBuf;

/// Resolves encoded chunk bytes local-first, then (unless disabled) from a
/// remote base URL. Shared read-only across workers so the HTTP client can
/// reuse connections.
pub struct ChunkStore {
    local_root: Option<PathBuf>,
    remote_base: Option<String>,
    no_download: bool,
    http: reqwest::blocking::Client,
}

/// Fan-out location of a chunk inside a store: first two hex chars, next
/// two, then the full digest plus a codec-specific extension.
pub fn relative_path(sha256: &str, codec: &str) -> PathBuf {
    let suffix = match codec {
        "zstd" => ".zst",
        "raw" => ".raw",
        _ => ".bin",
    };
    [&sha256[..2], &sha256[2..4], &format!("{sha256}{suffix}")].iter().collect()
}

/// Decode an encoded blob into exactly `expected_length` raw bytes.
pub fn decode(blob: Vec<u8>, codec: &str, expected_length: u64) -> Result<Vec<u8>> {
    match codec {
        "raw" => {
            if blob.len() as u64 != expected_length {
                return Err(RigbyError::codec(
                    codec,
                    format!("length mismatch: got {}, expected {}", blob.len(), expected_length),
                ));
            }
            Ok(blob)
        }
        "zstd" => {
            let raw = zstd::bulk::decompress(&blob, expected_length as usize)
                .map_err(|e| RigbyError::codec(codec, e.to_string()))?;
            if raw.len() as u64 != expected_length {
                return Err(RigbyError::codec(
                    codec,
                    format!("length mismatch: got {}, expected {}", raw.len(), expected_length),
                ));
            }
            Ok(raw)
        }
        other => Err(RigbyError::codec(other, "unsupported codec")),
    }
}

/// True when `data` hashes to the chunk's declared digests.
pub fn chunk_matches(data: &[u8], chunk: &Chunk) -> bool {
    hashing::digest_all(data).matches(&chunk.sha256, &chunk.md5, chunk.blake3.as_deref())
}

pub fn verify(raw: &[u8], chunk: &Chunk, rel: &str) -> Result<()> {
    if !chunk_matches(raw, chunk) {
        return Err(RigbyError::ChunkIntegrity { rel: rel.to_string() });
    }
    Ok(())
}

impl ChunkStore {
    pub fn new(
        local_root: Option<PathBuf>,
        remote_base: Option<String>,
        no_download: bool,
        http: reqwest::blocking::Client,
    ) -> Self {
        Self { local_root, remote_base, no_download, http }
    }

    /// Fetch, decode and verify one chunk; the returned bytes are known to
    /// hash to the chunk's declared digests.
    pub fn fetch_verified(&self, chunk: &Chunk) -> Result<Vec<u8>> {
        let codec = chunk.effective_codec();
        let rel = relative_path(&chunk.sha256, codec);
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        let encoded = self.get_encoded(&rel, &rel_str)?;
        let raw = decode(encoded, codec, chunk.length)?;
        verify(&raw, chunk, &rel_str)?;
        Ok(raw)
    }

    fn get_encoded(&self, rel: &std::path::Path, rel_str: &str) -> Result<Vec<u8>> {
        if let Some(root) = &self.local_root {
            let local = root.join(rel);
            if local.exists() {
                return std::fs::read(&local).map_err(|e| RigbyError::io(local, e));
            }
        }

        if self.no_download {
            return Err(RigbyError::ChunkUnavailable {
                rel: rel_str.to_string(),
                reason: "missing locally and downloads disabled".to_string(),
            });
        }

        let base = self.remote_base.as_deref().ok_or_else(|| RigbyError::ChunkUnavailable {
            rel: rel_str.to_string(),
            reason: "missing locally and no remote base configured".to_string(),
        })?;

        let url = format!("{}/{}", base.trim_end_matches('/'), rel_str);
        self.http
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map(|b| b.to_vec())
            .map_err(|e| RigbyError::ChunkUnavailable {
                rel: rel_str.to_string(),
                reason: format!("download failed from {url}: {e}"),
            })
    }
}
