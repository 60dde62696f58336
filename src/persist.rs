// File persistence shared by every store.
// Writes: temp file in the target's directory, fsync, rename over the target.
// Reads: absent / present / corrupt are distinct outcomes. A corrupt file is moved aside to
// `<name>.corrupt-<unix ts>` before the store falls back to empty state, so a later write
// never replaces the only copy of damaged data.

use crate::error::{StoreError, StoreResult};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

/// A fully written temp file that has not replaced its target yet.
/// Dropping it without `commit` removes the temp file and leaves the target untouched.
pub struct Staged {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl Staged {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn commit(self) -> StoreResult<()> {
        let Staged { tmp, target } = self;
        tmp.persist(&target)
            .map_err(|e| StoreError::io(&target, e.error))?;
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Write `path`'s new content into a sibling temp file via `write`.
pub fn stage_with<F>(path: &Path, write: F) -> StoreResult<Staged>
where
    F: FnOnce(&mut NamedTempFile) -> std::io::Result<()>,
{
    let dir = parent_dir(path);
    let prefix = format!(
        ".{}.",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| StoreError::io(dir, e))?;
    write(&mut tmp).map_err(|e| StoreError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(path, e))?;
    Ok(Staged {
        tmp,
        target: path.to_path_buf(),
    })
}

fn encode_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> StoreResult<Vec<u8>> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    encoded.map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

pub fn stage_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<Staged> {
    let bytes = encode_json(path, value, true)?;
    stage_with(path, |f| f.write_all(&bytes))
}

pub fn stage_json_gz<T: Serialize>(path: &Path, value: &T) -> StoreResult<Staged> {
    let bytes = encode_json(path, value, false)?;
    stage_with(path, |f| {
        let mut enc = GzEncoder::new(f, Compression::default());
        enc.write_all(&bytes)?;
        enc.finish()?;
        Ok(())
    })
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    stage_json(path, value)?.commit()
}

pub fn write_json_gz_atomic<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    stage_json_gz(path, value)?.commit()
}

pub(crate) fn read_bytes(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

fn decode_json<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let Some(bytes) = read_bytes(path)? else {
        return Ok(None);
    };
    decode_json(path, &bytes).map(Some)
}

pub fn read_json_gz<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let Some(bytes) = read_bytes(path)? else {
        return Ok(None);
    };
    let mut raw = Vec::new();
    GzDecoder::new(bytes.as_slice())
        .read_to_end(&mut raw)
        .map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("gzip: {}", e),
        })?;
    decode_json(path, &raw).map(Some)
}

/// Rename a damaged file out of the way. Returns the new path.
pub fn quarantine(path: &Path) -> StoreResult<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".into());
    let aside = path.with_file_name(format!(
        "{}.corrupt-{}",
        file_name,
        chrono::Utc::now().timestamp()
    ));
    std::fs::rename(path, &aside).map_err(|e| StoreError::io(path, e))?;
    Ok(aside)
}

/// Absent -> default; corrupt -> quarantine, warn, default; io errors propagate.
pub fn load_or_default<T, F>(path: &Path, read: F) -> StoreResult<T>
where
    T: Default,
    F: FnOnce(&Path) -> StoreResult<Option<T>>,
{
    match read(path) {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Ok(T::default()),
        Err(StoreError::Corrupt { path: bad, reason }) => {
            let aside = quarantine(&bad)?;
            warn!(
                file = %bad.display(),
                moved_to = %aside.display(),
                reason = %reason,
                "corrupt state file moved aside; continuing with empty state"
            );
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

/// Create the data directory (owner-only on unix).
pub fn ensure_dir(dir: &Path) -> StoreResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::debug!(error = %e, dir = %dir.display(), "chmod 0700 on data dir failed");
        }
    }
    Ok(())
}
