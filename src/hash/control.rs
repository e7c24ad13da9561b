//! Control file for kept stores
//!
//! Three text lines: bucket capacity, key codec id, value codec id.

use std::fs;
use std::path::Path;

use crate::error::{Result, StoreError};

/// Persisted identity of a kept store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFile {
    pub capacity: u64,
    pub key_codec: String,
    pub value_codec: String,
}

impl ControlFile {
    pub fn new(capacity: u64, key_codec: impl Into<String>, value_codec: impl Into<String>) -> Self {
        Self {
            capacity,
            key_codec: key_codec.into(),
            value_codec: value_codec.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut lines = text.lines().map(str::trim);

        let mut field = |what: &str| {
            lines.next().filter(|l| !l.is_empty()).ok_or_else(|| {
                StoreError::Corruption(format!(
                    "control file {} is missing the {} line",
                    path.display(),
                    what
                ))
            })
        };

        let capacity = field("capacity")?;
        let capacity = capacity.parse::<u64>().map_err(|e| {
            StoreError::Corruption(format!("invalid capacity {:?}: {}", capacity, e))
        })?;
        let key_codec = field("key codec")?.to_string();
        let value_codec = field("value codec")?.to_string();

        Ok(Self {
            capacity,
            key_codec,
            value_codec,
        })
    }

    /// Write via a temporary file and rename, so a crash never leaves a
    /// half-written control file behind
    pub fn write(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("control.tmp");
        fs::write(
            &tmp,
            format!("{}\n{}\n{}\n", self.capacity, self.key_codec, self.value_codec),
        )?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn three_lines_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.control");

        ControlFile::new(23, "u64-le", "utf8").write(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "23\nu64-le\nutf8\n");
        assert_eq!(
            ControlFile::read(&path).unwrap(),
            ControlFile::new(23, "u64-le", "utf8")
        );
    }

    #[test]
    fn short_file_is_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.control");
        fs::write(&path, "23\nu64-le\n").unwrap();

        assert!(matches!(
            ControlFile::read(&path),
            Err(StoreError::Corruption(_))
        ));
    }
}
