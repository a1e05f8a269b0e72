use crate::error::{Result, RigbyError};
use crate::FORMAT_VERSION;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;

/// Codec used when a chunk declares none.
pub const DEFAULT_CODEC: &str = "zstd";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Chunk {
    pub sha256: String,
    pub md5: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
    pub length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

impl Chunk {
    /// Declared codec, defaulting to zstd when absent or blank.
    pub fn effective_codec(&self) -> &str {
        match self.codec.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => DEFAULT_CODEC,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
    pub md5: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
    pub chunk_start: usize,
    pub chunk_end: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Manifest {
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    pub chunks: Vec<Chunk>,
    pub files: Vec<FileEntry>,
}

pub fn is_http_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn is_hex_digest(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit())
}

impl Manifest {
    /// Load and validate a manifest from a local path or an http(s) URL.
    pub fn load(source: &str, http: &reqwest::blocking::Client) -> Result<Manifest> {
        let manifest: Manifest = if is_http_url(source) {
            let body = http
                .get(source)
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.bytes())
                .map_err(|e| RigbyError::manifest(source, format!("fetch failed: {e}")))?;
            serde_json::from_slice(&body)
                .map_err(|e| RigbyError::manifest(source, e.to_string()))?
        } else {
            let file = File::open(source).map_err(|e| RigbyError::manifest(source, e.to_string()))?;
            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| RigbyError::manifest(source, e.to_string()))?
        };

        if manifest.format_version != FORMAT_VERSION {
            return Err(RigbyError::UnsupportedFormat {
                source_name: source.to_string(),
                found: manifest.format_version,
                expected: FORMAT_VERSION.to_string(),
            });
        }

        manifest.validate(source)?;
        Ok(manifest)
    }

    /// Structural checks that must hold before any restore I/O:
    /// chunk ranges in bounds and ascending, per-file chunk lengths summing
    /// to the declared size, and no duplicate output paths.
    pub fn validate(&self, source: &str) -> Result<()> {
        for (i, chunk) in self.chunks.iter().enumerate() {
            if !is_hex_digest(&chunk.sha256, 64) || !is_hex_digest(&chunk.md5, 32) {
                return Err(RigbyError::manifest(source, format!("malformed digest on chunk {i}")));
            }
        }
        let mut seen = HashSet::new();
        for fe in &self.files {
            if fe.chunk_start > fe.chunk_end || fe.chunk_end > self.chunks.len() {
                return Err(RigbyError::InvalidChunkRange { path: fe.path.clone() });
            }
            let chunk_total: u64 =
                self.chunks[fe.chunk_start..fe.chunk_end].iter().map(|c| c.length).sum();
            if chunk_total != fe.size {
                return Err(RigbyError::manifest(
                    source,
                    format!(
                        "chunk lengths for {} sum to {} but size is {}",
                        fe.path, chunk_total, fe.size
                    ),
                ));
            }
            if !seen.insert(fe.path.as_str()) {
                return Err(RigbyError::manifest(
                    source,
                    format!("duplicate file path: {}", fe.path),
                ));
            }
        }
        Ok(())
    }
}
