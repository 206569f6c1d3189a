//! Lab manager: ties the store, templates, supervisor and notifier together.
//!
//! Each mutating operation publishes the matching lifecycle event after it
//! succeeds. Failures of user-initiated operations are shown through the
//! dialog boundary and then returned; partial state is never rolled back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::{ConfigStore, LabConfig, home_dir};
use crate::dialog::Dialogs;
use crate::error::{LabError, LabResult};
use crate::notifier::{LifecycleEvent, Notifier};
use crate::opener::Opener;
use crate::store::{LabStore, validate_name};
use crate::supervisor::{Supervisor, SupervisorConfig};
use crate::template;

pub struct LabManager {
    config: ConfigStore,
    notifier: Notifier,
    supervisor: Supervisor,
    opener: Arc<dyn Opener>,
    dialogs: Arc<dyn Dialogs>,
}

impl LabManager {
    pub fn new(
        config: ConfigStore,
        supervisor_config: SupervisorConfig,
        opener: Arc<dyn Opener>,
        dialogs: Arc<dyn Dialogs>,
    ) -> Self {
        let notifier = Notifier::new();
        let supervisor = Supervisor::new(supervisor_config, notifier.clone(), opener.clone());
        Self {
            config,
            notifier,
            supervisor,
            opener,
            dialogs,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn config(&self) -> LabConfig {
        self.config.current()
    }

    pub fn config_path(&self) -> &Path {
        self.config.path()
    }

    pub fn store(&self) -> LabStore {
        LabStore::new(self.config.current().lab_dir)
    }

    fn report<T>(&self, result: LabResult<T>) -> LabResult<T> {
        if let Err(e) = &result {
            self.dialogs.show_error(&e.to_string());
        }
        result
    }

    // ── Labs ────────────────────────────────────────────────────────────

    pub fn list_labs(&self) -> Vec<String> {
        self.store().list()
    }

    /// Publish the current lab list and return it.
    pub fn refresh(&self) -> Vec<String> {
        let labs = self.list_labs();
        self.notifier.publish(LifecycleEvent::LabsChanged(labs.clone()));
        info!("Labs refreshed.");
        labs
    }

    /// Create the lab skeleton and seed it from the configured templates.
    pub fn create_lab(&self, name: &str) -> LabResult<PathBuf> {
        let config = self.config.current();
        let store = LabStore::new(&config.lab_dir);
        let created = store.create(name).and_then(|lab_dir| {
            template::populate(&lab_dir, name, &config.jupyter_template, &config.lyx_template)
                .map(|()| lab_dir)
        });
        let lab_dir = self.report(created)?;
        self.refresh();
        Ok(lab_dir)
    }

    /// Move a lab into the archive without asking.
    pub fn archive_lab(&self, name: &str) -> LabResult<PathBuf> {
        let archived = self.report(self.store().archive(name))?;
        self.refresh();
        Ok(archived)
    }

    /// Ask for confirmation, then archive. `Ok(None)` means the user declined.
    pub fn delete_lab(&self, name: &str) -> LabResult<Option<PathBuf>> {
        if !self
            .dialogs
            .confirm("Confirm Delete", "Are you sure you want to delete?")
        {
            return Ok(None);
        }
        self.archive_lab(name).map(Some)
    }

    pub fn explore_lab(&self, name: &str) -> LabResult<()> {
        validate_name(name)?;
        let path = self.store().lab_path(name);
        self.opener.open(&path.to_string_lossy())
    }

    pub fn edit_report(&self, name: &str) -> LabResult<()> {
        validate_name(name)?;
        let path = template::report_path(&self.store().lab_path(name), name);
        self.opener.open(&path.to_string_lossy())
    }

    // ── Notebook server ─────────────────────────────────────────────────

    /// Start the notebook server in the store root, optionally opening
    /// the browser inside `lab`'s data directory.
    pub fn launch(&self, lab: Option<&str>) -> LabResult<()> {
        let store = self.store();
        let scope = lab.filter(|l| !l.is_empty());
        let result = match scope {
            Some(name) if !store.exists(name) => {
                validate_name(name).and(Err(LabError::NotFound(name.to_string())))
            }
            _ => self.supervisor.launch(store.root(), scope),
        };
        self.report(result)
    }

    pub fn kill(&self) -> LabResult<()> {
        self.report(self.supervisor.kill())
    }

    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    /// Kill a running server on the way out.
    pub fn shutdown(&self) {
        self.supervisor.shutdown();
    }

    // ── Configuration ───────────────────────────────────────────────────

    pub fn set_lab_dir(&self, path: PathBuf) -> LabResult<LabConfig> {
        self.apply_config(|c| c.lab_dir = path)
    }

    pub fn set_notebook_template(&self, path: PathBuf) -> LabResult<LabConfig> {
        self.apply_config(|c| c.jupyter_template = path)
    }

    pub fn set_report_template(&self, path: PathBuf) -> LabResult<LabConfig> {
        self.apply_config(|c| c.lyx_template = path)
    }

    /// Prompt for a new store root. `Ok(None)` means cancelled.
    pub fn change_lab_dir(&self) -> LabResult<Option<LabConfig>> {
        let current = self.config.current().lab_dir;
        let start = if current.exists() { current } else { home_dir() };
        match self.dialogs.pick_directory(&start) {
            Some(dir) => {
                info!("chosen {}", dir.display());
                self.set_lab_dir(dir).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn change_notebook_template(&self) -> LabResult<Option<LabConfig>> {
        let start = template_start_dir(&self.config.current().jupyter_template);
        match self.dialogs.pick_file(&start) {
            Some(file) => self.set_notebook_template(file).map(Some),
            None => Ok(None),
        }
    }

    pub fn change_report_template(&self) -> LabResult<Option<LabConfig>> {
        let start = template_start_dir(&self.config.current().lyx_template);
        match self.dialogs.pick_file(&start) {
            Some(file) => self.set_report_template(file).map(Some),
            None => Ok(None),
        }
    }

    fn apply_config(&self, f: impl FnOnce(&mut LabConfig)) -> LabResult<LabConfig> {
        let config = self.report(self.config.update(f))?;
        self.notifier.publish(LifecycleEvent::ConfigChanged(config.clone()));
        self.refresh();
        Ok(config)
    }
}

fn template_start_dir(template: &Path) -> PathBuf {
    template
        .parent()
        .filter(|dir| dir.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(home_dir)
}
