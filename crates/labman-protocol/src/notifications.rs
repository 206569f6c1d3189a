//! Notification name constants.
//!
//! Notifications are server-to-client messages with no response expected.
//! They are the only contract an embedding UI has to implement against.

pub struct Notifications;

impl Notifications {
    // ── Lab ─────────────────────────────────────────────────────────────
    /// Params: `{ "labs": [name, ...] }`, most recently modified first.
    pub const LAB_DID_CHANGE_LIST: &str = "lab/didChangeList";

    // ── Config ──────────────────────────────────────────────────────────
    /// Params: `{ "config": { "labDir", "jupyterTemplate", "lyxTemplate" } }`.
    pub const CONFIG_DID_CHANGE: &str = "config/didChange";

    // ── Notebook server ─────────────────────────────────────────────────
    /// Params: `{ "running": bool }`.
    pub const NOTEBOOK_DID_CHANGE_STATE: &str = "notebook/didChangeState";
}

/// Type alias for notification names.
pub type NotificationName = &'static str;
