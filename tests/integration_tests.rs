//! End-to-end integration tests: full JSON-RPC request/response cycle and
//! notification delivery through the stdio transport, over an in-memory pipe.

use std::sync::Arc;
use std::time::Duration;

use labman_server::LabServer;
use labman_services::dialog::HeadlessDialogs;
use labman_services::opener::Opener;
use labman_services::{ConfigStore, LabConfig, LabManager, LabResult, LabService, SupervisorConfig};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

struct NullOpener;

impl Opener for NullOpener {
    fn open(&self, _target: &str) -> LabResult<()> {
        Ok(())
    }
}

/// Client side of the pipe. Messages that are not what a call is waiting
/// for are parked in `pending` so notifications are never lost.
struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    pending: Vec<Value>,
}

impl Client {
    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn next(&mut self) -> Value {
        let line = timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("Timed out waiting for message")
            .unwrap()
            .expect("Stream closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn response(&mut self, id: Value) -> Value {
        if let Some(pos) = self.pending.iter().position(|m| m.get("id") == Some(&id)) {
            return self.pending.remove(pos);
        }
        loop {
            let msg = self.next().await;
            if msg.get("id") == Some(&id) {
                return msg;
            }
            self.pending.push(msg);
        }
    }

    async fn call(&mut self, id: i64, method: &str, params: Value) -> Value {
        let req = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        self.send_raw(&req.to_string()).await;
        self.response(json!(id)).await
    }

    async fn notification(&mut self, method: &str) -> Value {
        if let Some(pos) = self.pending.iter().position(|m| m["method"] == method) {
            let mut msg = self.pending.remove(pos);
            return msg["params"].take();
        }
        loop {
            let mut msg = self.next().await;
            if msg["method"] == method {
                return msg["params"].take();
            }
            self.pending.push(msg);
        }
    }
}

struct Harness {
    client: Client,
    server: Arc<LabServer>,
    serve: JoinHandle<std::io::Result<()>>,
    tmp: TempDir,
}

/// Start a server over a duplex pipe with a temp store and templates.
async fn start(supervisor: SupervisorConfig) -> Harness {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("Templates");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join("lab-data.ipynb"), r#"{"cells": []}"#).unwrap();
    std::fs::write(templates.join("lab.lyx"), "\\title title").unwrap();

    let config = ConfigStore::new(tmp.path().join("labman.yaml"), LabConfig::with_home(tmp.path()));
    let manager = Arc::new(LabManager::new(
        config,
        supervisor,
        Arc::new(NullOpener),
        Arc::new(HeadlessDialogs),
    ));

    let (notification_tx, _) = broadcast::channel::<String>(256);
    let mut server = LabServer::new();
    server.set_notification_sender(notification_tx.clone());
    server.register_service(LabService::new(manager.clone()));
    server.attach_notifier(manager.notifier());
    let server = Arc::new(server);

    let notifications = notification_tx.subscribe();
    server.initialize().await.unwrap();

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let serve = tokio::spawn(labman_server::serve(
        server.clone(),
        BufReader::new(server_read),
        server_write,
        notifications,
    ));

    let (client_read, client_write) = tokio::io::split(client_io);
    let mut client = Client {
        lines: BufReader::new(client_read).lines(),
        writer: client_write,
        pending: Vec::new(),
    };

    // Initial announcements from service init.
    let config = client.notification("config/didChange").await;
    assert_eq!(config["config"]["labDir"], tmp.path().join("labs").to_string_lossy().into_owned());
    let labs = client.notification("lab/didChangeList").await;
    assert_eq!(labs, json!({ "labs": [] }));

    Harness {
        client,
        server,
        serve,
        tmp,
    }
}

#[tokio::test]
async fn create_list_and_delete_round_trip() {
    let mut h = start(SupervisorConfig::default()).await;

    let created = h.client.call(1, "lab/create", json!({ "name": "exp1" })).await;
    let path = h.tmp.path().join("labs/exp1");
    assert_eq!(created["result"]["path"], path.to_string_lossy().into_owned());
    assert_eq!(h.client.notification("lab/didChangeList").await, json!({ "labs": ["exp1"] }));

    let list = h.client.call(2, "lab/list", json!({})).await;
    assert_eq!(list["result"]["labs"], json!(["exp1"]));

    // Headless dialogs never confirm, so the UI must send `confirmed`.
    let declined = h.client.call(3, "lab/delete", json!({ "name": "exp1" })).await;
    assert_eq!(declined["result"]["deleted"], false);
    assert!(path.is_dir());

    let deleted = h
        .client
        .call(4, "lab/delete", json!({ "name": "exp1", "confirmed": true }))
        .await;
    assert_eq!(deleted["result"]["deleted"], true);
    assert!(!path.exists());
    assert_eq!(h.client.notification("lab/didChangeList").await, json!({ "labs": [] }));
}

#[tokio::test]
async fn domain_errors_carry_lab_codes() {
    let mut h = start(SupervisorConfig::default()).await;

    let missing = h
        .client
        .call(1, "lab/delete", json!({ "name": "ghost", "confirmed": true }))
        .await;
    assert_eq!(missing["error"]["code"], -32010);
    assert_eq!(missing["error"]["message"], "ghost not found!");

    let invalid = h.client.call(2, "lab/create", json!({ "name": ".recycle" })).await;
    assert_eq!(invalid["error"]["code"], -32015);

    let kill = h.client.call(3, "notebook/kill", json!({})).await;
    assert_eq!(kill["error"]["code"], -32013);
    assert_eq!(kill["error"]["message"], "Jupyter Lab is not running.");

    std::fs::remove_file(h.tmp.path().join("Templates/lab-data.ipynb")).unwrap();
    let template = h.client.call(4, "lab/create", json!({ "name": "exp2" })).await;
    assert_eq!(template["error"]["code"], -32011);
    assert!(template["error"]["data"]["path"].as_str().unwrap().ends_with("lab-data.ipynb"));
}

#[tokio::test]
async fn config_change_is_broadcast() {
    let mut h = start(SupervisorConfig::default()).await;
    let other = h.tmp.path().join("elsewhere");
    std::fs::create_dir_all(other.join("old-lab")).unwrap();

    let resp = h.client.call(1, "config/setLabDir", json!({ "path": other })).await;
    assert_eq!(resp["result"]["changed"], true);

    let config = h.client.notification("config/didChange").await;
    assert_eq!(config["config"]["labDir"], other.to_string_lossy().into_owned());
    assert_eq!(h.client.notification("lab/didChangeList").await, json!({ "labs": ["old-lab"] }));

    // No picker in headless mode: nothing changes.
    let cancelled = h.client.call(2, "config/setReportTemplate", json!({})).await;
    assert_eq!(cancelled["result"], json!({ "changed": false }));

    let get = h.client.call(3, "config/get", json!(null)).await;
    assert_eq!(get["result"]["config"]["labDir"], other.to_string_lossy().into_owned());
}

#[tokio::test]
async fn malformed_input_gets_protocol_errors() {
    let mut h = start(SupervisorConfig::default()).await;

    h.client.send_raw("this is not json").await;
    let parse = h.client.response(Value::Null).await;
    assert_eq!(parse["error"]["code"], -32700);

    h.client.send_raw(r#"{"id":7,"method":"lab/list"}"#).await;
    let invalid = h.client.response(json!(7)).await;
    assert_eq!(invalid["error"]["code"], -32600);

    let unknown = h.client.call(8, "labs/list", json!({})).await;
    assert_eq!(unknown["error"]["code"], -32601);
}

#[tokio::test]
async fn requests_without_id_get_no_response() {
    let mut h = start(SupervisorConfig::default()).await;

    h.client.send_raw(r#"{"jsonrpc":"2.0","method":"lab/refresh"}"#).await;
    assert_eq!(h.client.notification("lab/didChangeList").await, json!({ "labs": [] }));

    let list = h.client.call(9, "lab/list", json!({})).await;
    assert!(list["result"].is_object());
    assert!(h.client.pending.iter().all(|m| m.get("id").is_none()));
}

#[tokio::test]
async fn input_eof_ends_session() {
    let h = start(SupervisorConfig::default()).await;
    drop(h.client);

    timeout(Duration::from_secs(5), h.serve)
        .await
        .expect("serve did not finish")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn events_from_last_request_survive_input_eof() {
    let mut h = start(SupervisorConfig::default()).await;

    let req = json!({ "jsonrpc": "2.0", "id": 1, "method": "lab/create", "params": { "name": "exp1" } });
    h.client.send_raw(&req.to_string()).await;
    h.client.writer.shutdown().await.unwrap();

    let mut seen = Vec::new();
    while let Some(line) = timeout(Duration::from_secs(5), h.client.lines.next_line())
        .await
        .expect("Timed out waiting for output")
        .unwrap()
    {
        seen.push(serde_json::from_str::<Value>(&line).unwrap());
    }

    assert!(seen.iter().any(|m| m["id"] == 1 && m["result"].is_object()));
    assert!(
        seen.iter()
            .any(|m| m["method"] == "lab/didChangeList" && m["params"]["labs"] == json!(["exp1"])),
        "{seen:?}"
    );
    timeout(Duration::from_secs(5), h.serve).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_rejects_further_requests() {
    let mut h = start(SupervisorConfig::default()).await;
    h.server.shutdown().await;

    let resp = h.client.call(1, "lab/list", json!({})).await;
    assert_eq!(resp["error"]["code"], -32002);
}

#[tokio::test]
async fn uninitialized_server_rejects_requests() {
    let server = Arc::new(LabServer::new());
    let raw = labman_server::stdio::handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"lab/list"}"#, &server)
        .await
        .unwrap();
    let resp: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(resp["error"]["code"], -32001);
}

#[cfg(unix)]
#[tokio::test]
async fn notebook_lifecycle_is_broadcast() {
    let mut h = start(SupervisorConfig {
        program: "sh".into(),
        args: vec!["-c".into(), "echo starting >&2; exec sleep 30".into()],
    })
    .await;
    h.client.call(1, "lab/create", json!({ "name": "exp1" })).await;

    let launched = h.client.call(2, "notebook/launch", json!({ "lab": "exp1" })).await;
    assert_eq!(launched["result"], json!({ "running": true }));
    assert_eq!(h.client.notification("notebook/didChangeState").await, json!({ "running": true }));

    let again = h.client.call(3, "notebook/launch", json!({})).await;
    assert_eq!(again["error"]["code"], -32014);

    let running = h.client.call(4, "notebook/isRunning", json!({})).await;
    assert_eq!(running["result"], json!({ "running": true }));

    let kill = h.client.call(5, "notebook/kill", json!({})).await;
    assert_eq!(kill["result"], json!({ "success": true }));
    assert_eq!(h.client.notification("notebook/didChangeState").await, json!({ "running": false }));

    let stopped = h.client.call(6, "notebook/isRunning", json!({})).await;
    assert_eq!(stopped["result"], json!({ "running": false }));
}
