use crate::chunk_store::{self, ChunkStore};
use crate::error::{Result, RigbyError};
use crate::hashing::MultiHasher;
use crate::layout;
use crate::manifest::{Chunk, FileEntry};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const READ_BUF: usize = 1 << 20;
const TMP_SUFFIX: &str = ".rigby.tmp";

/// One file to restore. Holds a view into the manifest's shared chunk list
/// rather than copied chunks; consumed by exactly one worker.
#[derive(Clone)]
pub struct RestoreTask {
    pub output_path: PathBuf,
    pub display_path: String,
    pub file: FileEntry,
    chunks: Arc<[Chunk]>,
}

#[derive(Debug, Clone, Copy)]
pub struct RestoreResult {
    pub repaired: bool,
    pub disk_write_bytes: u64,
    pub reused_bytes: u64,
}

impl RestoreTask {
    pub fn new(
        output_path: PathBuf,
        display_path: String,
        file: FileEntry,
        chunks: Arc<[Chunk]>,
    ) -> Self {
        Self { output_path, display_path, file, chunks }
    }

    fn chunk_range(&self) -> Result<&[Chunk]> {
        self.chunks
            .get(self.file.chunk_start..self.file.chunk_end)
            .ok_or_else(|| RigbyError::InvalidChunkRange { path: self.file.path.clone() })
    }
}

/// Restore one file to its manifest state.
///
/// Already-matching files are verified only; correctly-sized files get
/// mismatched chunks patched in place; everything else is rebuilt into a
/// temporary sibling and committed by rename.
pub fn restore_file(task: &RestoreTask, store: &ChunkStore) -> Result<RestoreResult> {
    // Out-of-range chunk indices are fatal before any I/O for this file.
    let chunks = task.chunk_range()?;

    if is_file_valid(&task.output_path, &task.file)? {
        return Ok(RestoreResult {
            repaired: false,
            disk_write_bytes: 0,
            reused_bytes: task.file.size,
        });
    }

    if file_len(&task.output_path)? == Some(task.file.size) {
        let patched = patch_mismatched_chunks(&task.output_path, chunks, store)?;
        if is_file_valid(&task.output_path, &task.file)? {
            return Ok(RestoreResult {
                repaired: true,
                disk_write_bytes: patched,
                reused_bytes: task.file.size.saturating_sub(patched),
            });
        }
    }

    rebuild_file(&task.output_path, &task.file, chunks, store)?;
    Ok(RestoreResult { repaired: true, disk_write_bytes: task.file.size, reused_bytes: 0 })
}

fn file_len(path: &Path) -> Result<Option<u64>> {
    match std::fs::metadata(path) {
        Ok(md) if md.is_file() => Ok(Some(md.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RigbyError::io(path, e)),
    }
}

/// Stream the existing file through all declared digests; true when size
/// and every declared digest match the manifest entry.
pub fn is_file_valid(path: &Path, file: &FileEntry) -> Result<bool> {
    if file_len(path)? != Some(file.size) {
        return Ok(false);
    }

    let mut f = File::open(path).map_err(|e| RigbyError::io(path, e))?;
    let mut hasher = MultiHasher::new();
    let mut buf = vec![0u8; READ_BUF];
    loop {
        let n = f.read(&mut buf).map_err(|e| RigbyError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().matches(&file.sha256, &file.md5, file.blake3.as_deref()))
}

/// Walk the chunk range in order against the existing correctly-sized file,
/// overwriting only ranges whose bytes no longer hash to the manifest.
/// Each replacement chunk is independently verified before it is written,
/// so a later chunk's failure cannot corrupt earlier patched bytes.
fn patch_mismatched_chunks(path: &Path, chunks: &[Chunk], store: &ChunkStore) -> Result<u64> {
    let mut f = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| RigbyError::io(path, e))?;

    let mut patched = 0u64;
    let mut position = 0u64;
    for chunk in chunks {
        let existing = read_exact_at(&mut f, path, position, chunk.length)?;
        if chunk_store::chunk_matches(&existing, chunk) {
            position += chunk.length;
            continue;
        }

        let raw = store.fetch_verified(chunk)?;
        f.seek(SeekFrom::Start(position)).map_err(|e| RigbyError::io(path, e))?;
        f.write_all(&raw).map_err(|e| RigbyError::io(path, e))?;
        patched += raw.len() as u64;
        position += raw.len() as u64;
    }

    f.flush().map_err(|e| RigbyError::io(path, e))?;
    Ok(patched)
}

fn read_exact_at(f: &mut File, path: &Path, position: u64, length: u64) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; length as usize];
    f.seek(SeekFrom::Start(position)).map_err(|e| RigbyError::io(path, e))?;
    f.read_exact(&mut buf).map_err(|e| RigbyError::io(path, e))?;
    Ok(buf)
}

/// Stream every chunk in order into a temporary sibling, accumulating the
/// file digests as bytes are written, then atomically replace the target.
fn rebuild_file(path: &Path, file: &FileEntry, chunks: &[Chunk], store: &ChunkStore) -> Result<()> {
    layout::ensure_parent(path)?;
    let tmp = tmp_path(path);

    let result = write_rebuilt(&tmp, path, file, chunks, store);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn write_rebuilt(
    tmp: &Path,
    path: &Path,
    file: &FileEntry,
    chunks: &[Chunk],
    store: &ChunkStore,
) -> Result<()> {
    let out = File::create(tmp).map_err(|e| RigbyError::io(tmp, e))?;
    let mut out = BufWriter::new(out);
    let mut hasher = MultiHasher::new();
    let mut written = 0u64;

    for chunk in chunks {
        let raw = store.fetch_verified(chunk)?;
        out.write_all(&raw).map_err(|e| RigbyError::io(tmp, e))?;
        hasher.update(&raw);
        written += raw.len() as u64;
    }

    out.flush().map_err(|e| RigbyError::io(tmp, e))?;
    drop(out);

    if written != file.size {
        return Err(RigbyError::FileIntegrity { path: path.to_path_buf(), what: "size".into() });
    }
    let digests = hasher.finalize();
    if !digests.sha256.eq_ignore_ascii_case(&file.sha256) {
        return Err(RigbyError::FileIntegrity { path: path.to_path_buf(), what: "sha256".into() });
    }
    if !digests.md5.eq_ignore_ascii_case(&file.md5) {
        return Err(RigbyError::FileIntegrity { path: path.to_path_buf(), what: "md5".into() });
    }
    if let Some(b3) = file.blake3.as_deref() {
        if !b3.trim().is_empty() && !digests.blake3.eq_ignore_ascii_case(b3) {
            return Err(RigbyError::FileIntegrity {
                path: path.to_path_buf(),
                what: "blake3".into(),
            });
        }
    }

    // rename replaces any existing target in one step, so the output path
    // never goes missing between the old and new bytes.
    std::fs::rename(tmp, path).map_err(|e| RigbyError::io(path, e))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(TMP_SUFFIX);
    PathBuf::from(os)
}
