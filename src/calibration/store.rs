//! Calibration file discovery and persistence.
//!
//! The calibration file is recognised by two things: its extension and a fixed sentinel
//! on the first line. Line 2 holds the record literal, every other line is left alone.

use super::{CalibrationError, CalibrationRecord, StoredCalibration};
use crate::config::CalibrationSettings;
use std::collections::HashSet;
use std::fs::{self, ReadDir};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Path of a file that passed the sentinel check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationFile {
    path: PathBuf,
}

impl CalibrationFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationStore {
    root: PathBuf,
    extension: String,
    header: String,
}

impl CalibrationStore {
    pub fn new(settings: &CalibrationSettings) -> Self {
        Self {
            root: settings.search_root.clone(),
            extension: settings.extension.clone(),
            header: settings.header.clone(),
        }
    }

    /// Depth-first search for the first calibration file under the configured root.
    ///
    /// Entries are visited in directory-listing order. An entry is checked as a file
    /// before it is descended into, and the walk stops at the first match. Symlinks are
    /// followed; a directory reached twice is only searched once. An unreadable root is an
    /// error, anything unreadable below it is skipped with a warning.
    pub fn locate(&self) -> Result<CalibrationFile, CalibrationError> {
        info!(
            "Searching {} for calibration file (*{})",
            self.root.display(),
            self.extension
        );
        let entries = fs::read_dir(&self.root).map_err(|source| CalibrationError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut visited = HashSet::new();
        if let Ok(canonical) = fs::canonicalize(&self.root) {
            visited.insert(canonical);
        }

        match self.search(entries, &mut visited) {
            Some(path) => {
                info!("Using calibration file {}", path.display());
                Ok(CalibrationFile { path })
            }
            None => {
                error!("No calibration file found under {}", self.root.display());
                Err(CalibrationError::NotFound {
                    root: self.root.clone(),
                    extension: self.extension.clone(),
                    header: self.header.clone(),
                })
            }
        }
    }

    fn search(&self, entries: ReadDir, visited: &mut HashSet<PathBuf>) -> Option<PathBuf> {
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            // follows symlinks, unlike DirEntry::file_type
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let name_matches = entry
                .file_name()
                .to_string_lossy()
                .ends_with(self.extension.as_str());
            if metadata.is_file() && name_matches && self.has_header(&path) {
                return Some(path);
            }

            if metadata.is_dir() {
                if let Some(found) = self.descend(&path, visited) {
                    return Some(found);
                }
            }
        }

        None
    }

    fn descend(&self, dir: &Path, visited: &mut HashSet<PathBuf>) -> Option<PathBuf> {
        match fs::canonicalize(dir) {
            Ok(canonical) => {
                if !visited.insert(canonical) {
                    debug!("Already searched {}, skipping", dir.display());
                    return None;
                }
            }
            Err(e) => {
                warn!("Skipping {}: {}", dir.display(), e);
                return None;
            }
        }

        match fs::read_dir(dir) {
            Ok(entries) => {
                debug!("Descending into {}", dir.display());
                self.search(entries, visited)
            }
            Err(e) => {
                warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                None
            }
        }
    }

    fn has_header(&self, path: &Path) -> bool {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Unable to open candidate {}: {}", path.display(), e);
                return false;
            }
        };
        let mut first_line = String::new();
        match BufReader::new(file).read_line(&mut first_line) {
            Ok(_) => first_line.trim() == self.header,
            Err(e) => {
                debug!("Unable to read candidate {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Reads line 2 of `file`. Line 1 was already validated by [`Self::locate`].
    ///
    /// A file that ends after the header counts as uncalibrated.
    pub fn load(&self, file: &CalibrationFile) -> Result<StoredCalibration, CalibrationError> {
        let content = fs::read_to_string(&file.path).map_err(|source| CalibrationError::Io {
            path: file.path.clone(),
            source,
        })?;

        let Some(line) = content.lines().nth(1) else {
            warn!(
                "{} has no calibration line, treating as uncalibrated",
                file.path.display()
            );
            return Ok(StoredCalibration::Empty);
        };

        let stored = line
            .parse::<StoredCalibration>()
            .map_err(|source| CalibrationError::Corrupted {
                path: file.path.clone(),
                source,
            })?;

        match stored {
            StoredCalibration::Empty => info!("Calibration file is empty, device is uncalibrated"),
            StoredCalibration::Calibrated(_) => debug!("Loaded calibration record: {}", line),
        }
        Ok(stored)
    }

    /// Replaces line 2 of `file` with the literal of `record`.
    ///
    /// A failed write is not retried; the error carries the literal so it can be pasted in
    /// by hand.
    pub fn save(
        &self,
        file: &CalibrationFile,
        record: &CalibrationRecord,
    ) -> Result<(), CalibrationError> {
        let literal = record.to_literal();
        let write_failed = |source| CalibrationError::WriteFailed {
            path: file.path.clone(),
            literal: literal.clone(),
            source,
        };

        let content = fs::read_to_string(&file.path).map_err(write_failed)?;
        let rewritten = replace_second_line(&content, &self.header, &literal);
        fs::write(&file.path, rewritten).map_err(write_failed)?;

        info!("Calibration saved to {}", file.path.display());
        Ok(())
    }
}

/// Swaps the content of line 2, keeping every line terminator as found.
fn replace_second_line(content: &str, header: &str, literal: &str) -> String {
    let segments: Vec<&str> = content.split_inclusive('\n').collect();
    let newline = match segments.first() {
        Some(first) if first.ends_with("\r\n") => "\r\n",
        _ => "\n",
    };

    match segments.as_slice() {
        [] => format!("{header}{newline}{literal}{newline}"),
        [first] => {
            let separator = if first.ends_with('\n') { "" } else { newline };
            format!("{first}{separator}{literal}{newline}")
        }
        [first, second, rest @ ..] => {
            let mut rewritten = String::with_capacity(content.len() + literal.len());
            rewritten.push_str(first);
            rewritten.push_str(literal);
            rewritten.push_str(line_terminator(second));
            for segment in rest {
                rewritten.push_str(segment);
            }
            rewritten
        }
    }
}

fn line_terminator(segment: &str) -> &'static str {
    if segment.ends_with("\r\n") {
        "\r\n"
    } else if segment.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::sample_record;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const HEADER: &str = "# Calibration (will be automatically written)";

    fn store_for(root: &Path) -> CalibrationStore {
        CalibrationStore::new(&CalibrationSettings {
            search_root: root.to_path_buf(),
            ..CalibrationSettings::default()
        })
    }

    fn write(path: PathBuf, content: &str) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_locate_finds_nested_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path().join("notes.cal"), "just a note\n[]\n");
        let expected = write(
            dir.path().join("device/profiles/stick.cal"),
            &format!("{HEADER}\n[]\n"),
        );

        let file = store_for(dir.path()).locate().unwrap();
        assert_eq!(file.path(), expected);
    }

    #[test]
    fn test_locate_requires_extension() {
        let dir = TempDir::new().unwrap();
        write(dir.path().join("stick.txt"), &format!("{HEADER}\n[]\n"));

        let result = store_for(dir.path()).locate();
        assert!(matches!(result, Err(CalibrationError::NotFound { .. })));
    }

    #[test]
    fn test_locate_ignores_directory_named_like_file() {
        let dir = TempDir::new().unwrap();
        let expected = write(
            dir.path().join("archive.cal/inner.cal"),
            &format!("{HEADER}\n[]\n"),
        );

        let file = store_for(dir.path()).locate().unwrap();
        assert_eq!(file.path(), expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_follows_symlinks() {
        let dir = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(target.path().join("profiles/stick.cal"), &format!("{HEADER}\n[]\n"));
        std::os::unix::fs::symlink(target.path().join("profiles"), dir.path().join("linked"))
            .unwrap();

        let file = store_for(dir.path()).locate().unwrap();
        assert_eq!(file.path(), dir.path().join("linked/stick.cal"));

        let linked_file = TempDir::new().unwrap();
        std::os::unix::fs::symlink(
            target.path().join("profiles/stick.cal"),
            linked_file.path().join("stick.cal"),
        )
        .unwrap();
        let file = store_for(linked_file.path()).locate().unwrap();
        assert_eq!(file.path(), linked_file.path().join("stick.cal"));
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_survives_symlink_cycle() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let result = store_for(dir.path()).locate();
        assert!(matches!(result, Err(CalibrationError::NotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_skips_unreadable_directory() {
        let dir = TempDir::new().unwrap();
        // dangling link: metadata fails, the walk moves on
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("a_dangling"))
            .unwrap();
        let expected = write(dir.path().join("z/stick.cal"), &format!("{HEADER}\n[]\n"));

        let file = store_for(dir.path()).locate().unwrap();
        assert_eq!(file.path(), expected);
    }

    #[test]
    fn test_locate_missing_root_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = store_for(&dir.path().join("absent")).locate();
        assert!(matches!(result, Err(CalibrationError::Io { .. })));
    }

    #[test]
    fn test_header_with_trailing_whitespace_matches() {
        let dir = TempDir::new().unwrap();
        let expected = write(dir.path().join("stick.cal"), &format!("{HEADER}  \r\n[]\n"));

        let file = store_for(dir.path()).locate().unwrap();
        assert_eq!(file.path(), expected);
    }

    #[test]
    fn test_load_empty_and_calibrated() {
        let dir = TempDir::new().unwrap();
        let store = store_for(dir.path());

        write(dir.path().join("stick.cal"), &format!("{HEADER}\n[]\n"));
        let file = store.locate().unwrap();
        assert_eq!(store.load(&file).unwrap(), StoredCalibration::Empty);

        let record = sample_record();
        write(
            dir.path().join("stick.cal"),
            &format!("{HEADER}\n{}\n", record.to_literal()),
        );
        assert_eq!(
            store.load(&file).unwrap(),
            StoredCalibration::Calibrated(record)
        );
    }

    #[test]
    fn test_load_header_only_is_empty() {
        let dir = TempDir::new().unwrap();
        write(dir.path().join("stick.cal"), HEADER);
        let store = store_for(dir.path());

        let file = store.locate().unwrap();
        assert_eq!(store.load(&file).unwrap(), StoredCalibration::Empty);
    }

    #[test]
    fn test_load_corrupted_mentions_reset() {
        let dir = TempDir::new().unwrap();
        write(dir.path().join("stick.cal"), &format!("{HEADER}\n[['MIDDLE'\n"));
        let store = store_for(dir.path());

        let file = store.locate().unwrap();
        let err = store.load(&file).unwrap_err();
        assert!(matches!(err, CalibrationError::Corrupted { .. }));
        assert!(err.to_string().contains("Replace the second line with '[]'"));
    }

    #[test]
    fn test_save_preserves_other_lines() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path().join("stick.cal"),
            &format!("{HEADER}\n[]\n# owned by the joystick driver\nkeep me\n"),
        );
        let store = store_for(dir.path());
        let file = store.locate().unwrap();

        let record = sample_record();
        store.save(&file, &record).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            format!(
                "{HEADER}\n{}\n# owned by the joystick driver\nkeep me\n",
                record.to_literal()
            )
        );
        assert_eq!(
            store.load(&file).unwrap(),
            StoredCalibration::Calibrated(record)
        );
    }

    #[test]
    fn test_save_keeps_crlf_line_endings() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path().join("stick.cal"),
            &format!("{HEADER}\r\n[]\r\n# notes\r\nlast line without newline"),
        );
        let store = store_for(dir.path());
        let file = store.locate().unwrap();

        let record = sample_record();
        store.save(&file, &record).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            format!(
                "{HEADER}\r\n{}\r\n# notes\r\nlast line without newline",
                record.to_literal()
            )
        );
        assert_eq!(
            store.load(&file).unwrap(),
            StoredCalibration::Calibrated(record)
        );
    }

    #[test]
    fn test_save_appends_to_header_only_file() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path().join("stick.cal"), HEADER);
        let store = store_for(dir.path());
        let file = store.locate().unwrap();

        store.save(&file, &sample_record()).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            format!("{HEADER}\n{}\n", sample_record().to_literal())
        );
    }

    #[test]
    fn test_save_failure_carries_literal() {
        let dir = TempDir::new().unwrap();
        let store = store_for(dir.path());
        let file = CalibrationFile {
            path: dir.path().join("missing/stick.cal"),
        };

        match store.save(&file, &sample_record()) {
            Err(CalibrationError::WriteFailed { literal, .. }) => {
                assert_eq!(literal, sample_record().to_literal())
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
