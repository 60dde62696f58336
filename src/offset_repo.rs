// Long-poll offset: the next update id to request, stored as a single integer.

use crate::error::{StoreError, StoreResult};
use crate::persist;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const OFFSET_FILE: &str = "tg_offset.txt";

fn read_offset(path: &Path) -> StoreResult<Option<Option<i64>>> {
    let Some(bytes) = persist::read_bytes(path)? else {
        return Ok(None);
    };
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim();
    if text.is_empty() {
        return Ok(Some(None));
    }
    text.parse::<i64>()
        .map(|o| Some(Some(o)))
        .map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("offset {:?}: {}", text, e),
        })
}

pub struct OffsetRepo {
    path: PathBuf,
}

impl OffsetRepo {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(OFFSET_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` before the first batch was handled.
    pub fn load(&self) -> StoreResult<Option<i64>> {
        persist::load_or_default(&self.path, read_offset)
    }

    pub fn save(&self, offset: i64) -> StoreResult<()> {
        persist::stage_with(&self.path, |f| write!(f, "{}", offset))?.commit()
    }

    pub fn check(&self) -> StoreResult<()> {
        read_offset(&self.path).map(|_| ())
    }
}
