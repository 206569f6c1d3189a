//! "Open with the default handler" boundary for URLs and paths.

use crate::error::{LabError, LabResult};

pub trait Opener: Send + Sync {
    fn open(&self, target: &str) -> LabResult<()>;
}

/// Hands targets to the desktop via the `open` crate.
pub struct SystemOpener;

impl Opener for SystemOpener {
    fn open(&self, target: &str) -> LabResult<()> {
        open::that(target).map_err(|e| LabError::Open {
            target: target.to_string(),
            reason: e.to_string(),
        })
    }
}
