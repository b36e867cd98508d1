//! Sample library: pre-recorded clips addressable as `[name]`.
//!
//! Scans the sounds directory for `.wav` files and keeps the ones whose
//! format matches what the synthesizer produces, so they can be
//! concatenated with speech without resampling.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hound::WavReader;
use tracing::{info, warn};

use crate::config::LibraryConfig;

#[derive(Debug, Clone, Default)]
pub struct SampleLibrary {
    // "[name]" -> file
    samples: BTreeMap<String, PathBuf>,
}

impl SampleLibrary {
    /// Load and validate every `.wav` in `dir`. A missing directory is an empty library.
    pub fn load(dir: &Path, config: &LibraryConfig) -> Self {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read sounds directory {}: {e}", dir.display());
                return Self::default();
            }
        };

        let mut samples = BTreeMap::new();
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match WavReader::open(&path) {
                Ok(reader) => {
                    let spec = reader.spec();
                    if spec.channels != config.channels || spec.sample_rate != config.sample_rate {
                        warn!(
                            "Skipping {}: {} channel(s) at {} Hz, expected {} at {} Hz",
                            path.display(),
                            spec.channels,
                            spec.sample_rate,
                            config.channels,
                            config.sample_rate
                        );
                        continue;
                    }
                    samples.insert(format!("[{stem}]"), path);
                }
                Err(e) => warn!("Skipping {}: {e}", path.display()),
            }
        }

        info!("Successfully loaded all sounds - {} sounds", samples.len());
        Self { samples }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        Self {
            samples: entries.into_iter().collect(),
        }
    }

    /// Bracketed names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.samples.keys().cloned().collect()
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.samples.contains_key(name)
    }

    pub fn path_of(&self, name: &str) -> Option<&Path> {
        self.samples.get(name).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::tests::write_wav;

    #[test]
    fn keeps_only_matching_wavs() {
        let dir = tempfile::TempDir::new().unwrap();
        write_wav(&dir.path().join("airhorn.wav"), &[1, 2], 22050);
        write_wav(&dir.path().join("hifi.wav"), &[1, 2], 44100);
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        std::fs::write(dir.path().join("broken.wav"), "not a wav").unwrap();

        let library = SampleLibrary::load(dir.path(), &LibraryConfig::default());
        assert_eq!(library.list(), vec!["[airhorn]".to_string()]);
        assert!(library.contains("[airhorn]"));
        assert!(!library.contains("airhorn"));
        assert_eq!(
            library.path_of("[airhorn]"),
            Some(dir.path().join("airhorn.wav").as_path())
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let library = SampleLibrary::load(&dir.path().join("nope"), &LibraryConfig::default());
        assert!(library.is_empty());
    }
}
