//! Lab service: JSON-RPC front for the lab manager.
//!
//! Handles the `lab/*`, `config/*` and `notebook/*` namespaces. The
//! router tries every service for namespaces it has no exact match for,
//! so one service covers all three.

use std::path::PathBuf;
use std::sync::Arc;

use labman_protocol::{HandlerResult, Methods, RpcError};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::Service;
use crate::config::LabConfig;
use crate::error::LabResult;
use crate::manager::LabManager;

pub struct LabService {
    manager: Arc<LabManager>,
}

impl LabService {
    pub fn new(manager: Arc<LabManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<LabManager> {
        &self.manager
    }
}

impl Service for LabService {
    fn namespace(&self) -> &str {
        "lab"
    }

    async fn init(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let m = &self.manager;
        m.notifier().publish(crate::notifier::LifecycleEvent::ConfigChanged(m.config()));
        m.refresh();
        Ok(())
    }

    async fn handle(&self, method: &str, params: Option<Value>) -> HandlerResult {
        let m = &self.manager;
        match method {
            // ── Lab ─────────────────────────────────────────────────────
            Methods::LAB_LIST => Ok(json!({ "labs": m.list_labs() })),

            Methods::LAB_REFRESH => Ok(json!({ "labs": m.refresh() })),

            Methods::LAB_CREATE => {
                let p: LabNameParam = parse_params(params)?;
                let path = m.create_lab(&p.name)?;
                Ok(json!({ "path": path.to_string_lossy() }))
            }

            Methods::LAB_DELETE => {
                let p: LabDeleteParams = parse_params(params)?;
                let archived = if p.confirmed {
                    Some(m.archive_lab(&p.name)?)
                } else {
                    m.delete_lab(&p.name)?
                };
                Ok(json!({
                    "deleted": archived.is_some(),
                    "archivedTo": archived.map(|a| a.to_string_lossy().into_owned()),
                }))
            }

            Methods::LAB_EXPLORE => {
                let p: LabNameParam = parse_params(params)?;
                m.explore_lab(&p.name)?;
                Ok(json!({ "success": true }))
            }

            Methods::LAB_EDIT_REPORT => {
                let p: LabNameParam = parse_params(params)?;
                m.edit_report(&p.name)?;
                Ok(json!({ "success": true }))
            }

            // ── Config ──────────────────────────────────────────────────
            Methods::CONFIG_GET => Ok(json!({ "config": m.config() })),

            Methods::CONFIG_SET_LAB_DIR => {
                let p: PathParam = parse_params_optional(params)?;
                config_change(match p.path {
                    Some(path) => m.set_lab_dir(path).map(Some),
                    None => m.change_lab_dir(),
                })
            }

            Methods::CONFIG_SET_NOTEBOOK_TEMPLATE => {
                let p: PathParam = parse_params_optional(params)?;
                config_change(match p.path {
                    Some(path) => m.set_notebook_template(path).map(Some),
                    None => m.change_notebook_template(),
                })
            }

            Methods::CONFIG_SET_REPORT_TEMPLATE => {
                let p: PathParam = parse_params_optional(params)?;
                config_change(match p.path {
                    Some(path) => m.set_report_template(path).map(Some),
                    None => m.change_report_template(),
                })
            }

            // ── Notebook server ─────────────────────────────────────────
            Methods::NOTEBOOK_LAUNCH => {
                let p: LaunchParams = parse_params_optional(params)?;
                m.launch(p.lab.as_deref())?;
                Ok(json!({ "running": m.is_running() }))
            }

            Methods::NOTEBOOK_KILL => {
                m.kill()?;
                Ok(json!({ "success": true }))
            }

            Methods::NOTEBOOK_IS_RUNNING => Ok(json!({ "running": m.is_running() })),

            _ => Err(RpcError::method_not_found(method)),
        }
    }

    async fn shutdown(&self) {
        self.manager.shutdown();
    }
}

fn config_change(result: LabResult<Option<LabConfig>>) -> HandlerResult {
    match result? {
        Some(config) => Ok(json!({ "changed": true, "config": config })),
        None => Ok(json!({ "changed": false })),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LabNameParam {
    #[serde(alias = "lab")]
    name: String,
}

#[derive(Deserialize)]
struct LabDeleteParams {
    #[serde(alias = "lab")]
    name: String,
    #[serde(default)]
    confirmed: bool,
}

#[derive(Deserialize, Default)]
struct PathParam {
    path: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct LaunchParams {
    lab: Option<String>,
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Option<Value>) -> Result<T, RpcError> {
    match params {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| RpcError::invalid_params(format!("Invalid parameters: {e}"))),
        None => Err(RpcError::invalid_params("Parameters required")),
    }
}

/// Absent or `null` params mean "all defaults"; anything else must parse.
fn parse_params_optional<T: for<'de> Deserialize<'de> + Default>(params: Option<Value>) -> Result<T, RpcError> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v)
            .map_err(|e| RpcError::invalid_params(format!("Invalid parameters: {e}"))),
    }
}
