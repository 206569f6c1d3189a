//! Method name constants: every JSON-RPC method grouped by namespace.
//!
//! Each constant is the exact string sent over the wire as the `method`
//! field of a JSON-RPC request.

/// All labman method names, grouped by service namespace.
pub struct Methods;

impl Methods {
    // ── Lab ─────────────────────────────────────────────────────────────
    pub const LAB_LIST: &str = "lab/list";
    pub const LAB_CREATE: &str = "lab/create";
    pub const LAB_DELETE: &str = "lab/delete";
    pub const LAB_EXPLORE: &str = "lab/explore";
    pub const LAB_EDIT_REPORT: &str = "lab/editReport";
    pub const LAB_REFRESH: &str = "lab/refresh";

    // ── Config ──────────────────────────────────────────────────────────
    pub const CONFIG_GET: &str = "config/get";
    pub const CONFIG_SET_LAB_DIR: &str = "config/setLabDir";
    pub const CONFIG_SET_NOTEBOOK_TEMPLATE: &str = "config/setNotebookTemplate";
    pub const CONFIG_SET_REPORT_TEMPLATE: &str = "config/setReportTemplate";

    // ── Notebook server ─────────────────────────────────────────────────
    pub const NOTEBOOK_LAUNCH: &str = "notebook/launch";
    pub const NOTEBOOK_KILL: &str = "notebook/kill";
    pub const NOTEBOOK_IS_RUNNING: &str = "notebook/isRunning";
}

/// Returns true if the given string falls in a known namespace.
pub fn is_known_method(method: &str) -> bool {
    matches!(
        method.split('/').next(),
        Some("lab") | Some("config") | Some("notebook")
    )
}

/// Type alias: the method name is always a `&str` at the protocol level.
pub type MethodName = &'static str;
