//! Working directory for intermediate audio files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TempWorkspace {
    dir: PathBuf,
}

impl TempWorkspace {
    /// Create the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh, unused `.wav` path inside the workspace.
    pub fn new_wav_path(&self) -> PathBuf {
        self.dir.join(format!("{}.wav", Uuid::new_v4()))
    }

    /// Remove every `.wav` in the workspace. Returns how many were removed.
    pub fn clean(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {e}", self.dir.display());
                return 0;
            }
        };

        let mut removed = 0;
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                // Already gone is fine
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {e}", path.display()),
            }
        }
        if removed > 0 {
            debug!("Cleaned {removed} file(s) from {}", self.dir.display());
        }
        removed
    }

    /// Count of `.wav` files currently in the workspace.
    #[cfg(test)]
    pub fn wav_count(&self) -> usize {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("wav"))
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_removes_only_wavs_and_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let tmp = TempWorkspace::open(dir.path().join("tmp")).unwrap();
        std::fs::write(tmp.new_wav_path(), b"x").unwrap();
        std::fs::write(tmp.new_wav_path(), b"y").unwrap();
        std::fs::write(tmp.dir().join("keep.txt"), b"z").unwrap();

        assert_eq!(tmp.wav_count(), 2);
        assert_eq!(tmp.clean(), 2);
        assert_eq!(tmp.clean(), 0);
        assert!(tmp.dir().join("keep.txt").exists());
    }

    #[test]
    fn paths_are_unique() {
        let dir = tempfile::TempDir::new().unwrap();
        let tmp = TempWorkspace::open(dir.path()).unwrap();
        assert_ne!(tmp.new_wav_path(), tmp.new_wav_path());
    }
}
