//! Notebook server supervisor: owns at most one `jupyter-lab` process.
//!
//! The server prints its access URL on stderr after a line ending in
//! `is running at:`. A background task reads stderr line by line, opens
//! that URL once, and keeps draining the stream until it closes. Stream
//! closure, whatever the cause, is what moves the supervisor back to
//! Stopped.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{LabError, LabResult};
use crate::notifier::{LifecycleEvent, Notifier};
use crate::opener::Opener;

/// Suffix of the log line that precedes the URL line.
pub const READY_SIGNAL: &str = "is running at:";

/// Which executable to run and with what arguments.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: "jupyter-lab".into(),
            args: vec!["--no-browser".into()],
        }
    }
}

/// Two-line rule: arm on the ready signal, take the last token of the next
/// line. Fires at most once.
#[derive(Debug)]
pub struct UrlScraper {
    scope: Option<String>,
    armed: bool,
    done: bool,
}

impl UrlScraper {
    pub fn new(scope: Option<String>) -> Self {
        Self {
            scope,
            armed: false,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one line (without its terminator). Returns the URL to open
    /// the first time one is recovered.
    pub fn feed(&mut self, line: &str) -> Option<String> {
        if self.done {
            return None;
        }
        if self.armed {
            self.done = true;
            let url = line.split_whitespace().last()?;
            return Some(scope_url(url, self.scope.as_deref()));
        }
        if line.ends_with(READY_SIGNAL) {
            self.armed = true;
        }
        None
    }
}

/// Route the URL into `<lab>/data` by rewriting the first `?token`.
pub fn scope_url(url: &str, lab: Option<&str>) -> String {
    match lab {
        Some(lab) if !lab.is_empty() => url.replacen("?token", &format!("/tree/{lab}/data?token"), 1),
        _ => url.to_string(),
    }
}

/// Drain `reader` until EOF or a read error, opening the scraped URL once.
/// Returns the URL that was handed to the opener, if any.
///
/// The opener may wait on a desktop launcher, so it runs on the blocking pool.
pub async fn watch_log<R>(mut reader: R, mut scraper: UrlScraper, opener: Arc<dyn Opener>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut opened = None;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Log stream read error: {e}");
                break;
            }
        }
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\r', '\n']);
        if let Some(url) = scraper.feed(line) {
            info!("Opening {url}");
            let opener = opener.clone();
            let target = url.clone();
            match tokio::task::spawn_blocking(move || opener.open(&target)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("{e}"),
                Err(e) => warn!("Opener task failed: {e}"),
            }
            opened = Some(url);
        }
        debug!("Line: {line}");
    }
    opened
}

struct ServerHandle {
    generation: u64,
    child: Child,
}

pub struct Supervisor {
    config: SupervisorConfig,
    slot: Arc<Mutex<Option<ServerHandle>>>,
    generation: AtomicU64,
    notifier: Notifier,
    opener: Arc<dyn Opener>,
    state_tx: Arc<watch::Sender<bool>>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, notifier: Notifier, opener: Arc<dyn Opener>) -> Self {
        let (state_tx, _) = watch::channel(false);
        Self {
            config,
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            notifier,
            opener,
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Observe Running/Stopped transitions.
    pub fn watch_state(&self) -> watch::Receiver<bool> {
        self.state_tx.subscribe()
    }

    /// Resolves once the supervisor is Stopped.
    pub async fn wait_stopped(&self) {
        let mut rx = self.state_tx.subscribe();
        let _ = rx.wait_for(|running| !running).await;
    }

    /// Spawn the server in `working_dir` and start scraping its log.
    ///
    /// Must be called within a Tokio runtime. Running is announced as soon
    /// as the process is spawned, before the server is ready.
    pub fn launch(&self, working_dir: &Path, scope: Option<&str>) -> LabResult<()> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(LabError::AlreadyRunning);
        }
        if !working_dir.is_dir() {
            return Err(LabError::io(
                "launch in",
                working_dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "directory does not exist"),
            ));
        }

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LabError::io("launch", PathBuf::from(&self.config.program), e))?;

        let stderr = child.stderr.take();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            pid = child.id(),
            "Launched {} in {}",
            self.config.program,
            working_dir.display()
        );
        *slot = Some(ServerHandle { generation, child });
        drop(slot);

        self.state_tx.send_replace(true);
        self.notifier.publish(LifecycleEvent::NotebookStateChanged(true));

        let slot = self.slot.clone();
        let notifier = self.notifier.clone();
        let opener = self.opener.clone();
        let state_tx = self.state_tx.clone();
        let scraper = UrlScraper::new(scope.map(str::to_string));
        tokio::spawn(async move {
            if let Some(stderr) = stderr {
                watch_log(BufReader::new(stderr), scraper, opener).await;
            }

            let child = {
                let mut slot = slot.lock();
                if slot.as_ref().is_some_and(|h| h.generation == generation) {
                    slot.take().map(|h| h.child)
                } else {
                    None
                }
            };
            let Some(mut child) = child else {
                return;
            };

            info!("Command end");
            state_tx.send_replace(false);
            notifier.publish(LifecycleEvent::NotebookStateChanged(false));

            match child.wait().await {
                Ok(status) => debug!("Notebook server exited: {status}"),
                Err(e) => warn!("Failed to reap notebook server: {e}"),
            }
        });

        Ok(())
    }

    /// Forcefully terminate the server. Does not wait for the Stopped
    /// transition; the log task performs it once the stream closes.
    pub fn kill(&self) -> LabResult<()> {
        let mut slot = self.slot.lock();
        let handle = slot.as_mut().ok_or(LabError::NotRunning)?;
        info!(pid = handle.child.id(), "Killing notebook server");
        handle
            .child
            .start_kill()
            .map_err(|e| LabError::io("kill", PathBuf::from(&self.config.program), e))
    }

    /// Kill the server if it is running.
    pub fn shutdown(&self) {
        match self.kill() {
            Ok(()) | Err(LabError::NotRunning) => {}
            Err(e) => warn!("{e}"),
        }
    }
}
