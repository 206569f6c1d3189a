//! Lab store: one directory per lab under a configurable root.
//!
//! Names starting with `.` are reserved for internal state such as the
//! `.recycle` archive, and never show up as labs.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::error::{LabError, LabResult};

/// Leading character of internal entries under the store root.
pub const RESERVED_MARKER: char = '.';
/// Archive subtree holding soft-deleted labs.
pub const RECYCLE_DIR: &str = ".recycle";
pub const DATA_DIR: &str = "data";
pub const REPORT_DIR: &str = "report";
/// Presentation subdirectories created under `report/`.
pub const REPORT_SUBDIRS: [&str; 3] = ["images", "figs", "tables"];
/// Suffix format appended to archived lab names.
pub const ARCHIVE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub struct LabStore {
    root: PathBuf,
}

impl LabStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lab_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn recycle_path(&self) -> PathBuf {
        self.root.join(RECYCLE_DIR)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.lab_path(name).is_dir()
    }

    /// Lab names, most recently modified first.
    ///
    /// A missing root is "no labs yet", not an error.
    pub fn list(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                if self.root.exists() {
                    warn!("Unable to read lab dir {}: {e}", self.root.display());
                }
                return Vec::new();
            }
        };

        let mut labs: Vec<(String, SystemTime)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with(RESERVED_MARKER) {
                    return None;
                }
                // Follows symlinks, like the directory check in `exists`.
                let meta = std::fs::metadata(entry.path()).ok()?;
                if !meta.is_dir() {
                    return None;
                }
                let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Some((name, mtime))
            })
            .collect();

        // read_dir order is unspecified; fix it by name so equal mtimes are stable.
        labs.sort_by(|a, b| a.0.cmp(&b.0));
        labs.sort_by(|a, b| b.1.cmp(&a.1));
        labs.into_iter().map(|(name, _)| name).collect()
    }

    /// Create the lab skeleton. Directories created before a failure are
    /// left in place.
    pub fn create(&self, name: &str) -> LabResult<PathBuf> {
        validate_name(name)?;
        let lab_dir = self.lab_path(name);
        let report_dir = lab_dir.join(REPORT_DIR);

        let mut dirs = vec![lab_dir.clone(), report_dir.clone(), lab_dir.join(DATA_DIR)];
        dirs.extend(REPORT_SUBDIRS.iter().map(|sub| report_dir.join(sub)));

        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|e| LabError::io("create", dir, e))?;
        }
        info!("Created lab {}", lab_dir.display());
        Ok(lab_dir)
    }

    /// Move a lab into `.recycle/<name>-<YYYYMMDD_HHMMSS>` using local time.
    pub fn archive(&self, name: &str) -> LabResult<PathBuf> {
        self.archive_at(name, chrono::Local::now().naive_local())
    }

    /// Same as [`archive`](Self::archive) with an explicit timestamp.
    pub fn archive_at(&self, name: &str, when: NaiveDateTime) -> LabResult<PathBuf> {
        if !self.exists(name) {
            return Err(LabError::NotFound(name.to_string()));
        }
        let lab_dir = self.lab_path(name);

        let recycle = self.recycle_path();
        std::fs::create_dir_all(&recycle).map_err(|e| LabError::io("create", &recycle, e))?;

        let target = recycle.join(archived_name(name, when));
        if target.exists() {
            return Err(LabError::io(
                "archive into",
                &target,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "destination exists"),
            ));
        }

        std::fs::rename(&lab_dir, &target).map_err(|e| LabError::io("move", &lab_dir, e))?;
        info!("Archived {} to {}", lab_dir.display(), target.display());
        Ok(target)
    }

    /// Archived entries under `.recycle`, unordered.
    pub fn archived(&self) -> Vec<String> {
        match std::fs::read_dir(self.recycle_path()) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                debug!("No archive yet: {e}");
                Vec::new()
            }
        }
    }
}

/// `<name>-<YYYYMMDD>_<HHMMSS>`.
pub fn archived_name(name: &str, when: NaiveDateTime) -> String {
    format!("{name}-{}", when.format(ARCHIVE_STAMP_FORMAT))
}

pub fn validate_name(name: &str) -> LabResult<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.starts_with(RESERVED_MARKER) {
        Some("name must not start with '.'")
    } else if name.contains('/') || name.contains('\\') {
        Some("name must not contain a path separator")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(LabError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
