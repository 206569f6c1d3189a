//! Seeds a new lab with its notebook and report documents.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{LabError, LabResult, TemplateKind};
use crate::store::{DATA_DIR, REPORT_DIR};

/// Fixed name of the notebook inside `data/`.
pub const NOTEBOOK_FILE: &str = "data.ipynb";
pub const REPORT_EXTENSION: &str = "lyx";
/// Replaced once, by position, in the report template.
pub const TITLE_TOKEN: &[u8] = b"title";

/// `report/<lab>.lyx` inside `lab_dir`.
pub fn report_path(lab_dir: &Path, name: &str) -> PathBuf {
    lab_dir
        .join(REPORT_DIR)
        .join(format!("{name}.{REPORT_EXTENSION}"))
}

pub fn notebook_path(lab_dir: &Path) -> PathBuf {
    lab_dir.join(DATA_DIR).join(NOTEBOOK_FILE)
}

/// Copy both templates into `lab_dir`.
///
/// Both templates are read before anything is written, so a missing or
/// unreadable template leaves the lab untouched. A failed write leaves any
/// file already written in place.
///
/// The report substitution is a raw byte replacement of the first `title`,
/// wherever it appears. It is not a template language.
pub fn populate(
    lab_dir: &Path,
    title: &str,
    notebook_template: &Path,
    report_template: &Path,
) -> LabResult<()> {
    let notebook = read_template(TemplateKind::Notebook, notebook_template)?;
    let report = read_template(TemplateKind::Report, report_template)?;

    let notebook_out = notebook_path(lab_dir);
    std::fs::write(&notebook_out, notebook).map_err(|e| LabError::io("write", &notebook_out, e))?;

    let report_out = report_path(lab_dir, title);
    let report = replace_first(&report, TITLE_TOKEN, title.as_bytes());
    std::fs::write(&report_out, report).map_err(|e| LabError::io("write", &report_out, e))?;

    info!("Populated {} from templates", lab_dir.display());
    Ok(())
}

fn read_template(kind: TemplateKind, path: &Path) -> LabResult<Vec<u8>> {
    let missing = |reason: String| LabError::TemplateMissing {
        kind,
        path: path.to_path_buf(),
        reason,
    };
    if !path.is_file() {
        return Err(missing("no such file".into()));
    }
    std::fs::read(path).map_err(|e| missing(e.to_string()))
}

/// Replace the first occurrence of `needle` in `haystack`.
pub fn replace_first(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let found = if needle.is_empty() {
        None
    } else {
        haystack.windows(needle.len()).position(|w| w == needle)
    };
    match found {
        Some(at) => {
            let mut out = Vec::with_capacity(haystack.len() + replacement.len());
            out.extend_from_slice(&haystack[..at]);
            out.extend_from_slice(replacement);
            out.extend_from_slice(&haystack[at + needle.len()..]);
            out
        }
        None => haystack.to_vec(),
    }
}
