//! Multi-node connector
//!
//! Client-side fan-out: one long-running worker per declared target node,
//! each owning a persistent framed TCP session to that node's agent. A
//! layout command is applied to a fresh snapshot per target (via the
//! [`SnapshotProvider`] seam), dispatched to every connected worker in
//! parallel, guarded by a per-target watchdog, and the per-node responses
//! are merged into a single outcome.
//!
//! Only one fan-out operation runs at a time; the worker table lives under
//! the operation lock. Within one worker, request and response are strictly
//! sequential.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ScreenDef;
use crate::error::{Result, UlaError};
use crate::protocol;
use crate::vscreen::VirtualLayer;

/// How long a target may take to answer one command.
pub const RESPONSE_WATCHDOG: Duration = Duration::from_secs(1);

/// Bounded retry window when re-establishing a broken session.
pub const RECONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause between connect attempts inside a retry window.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// A node agent's answer to one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResponse {
    #[serde(rename = "Type", default)]
    pub kind: String,

    #[serde(rename = "Result", default)]
    pub result: i32,

    #[serde(rename = "Data", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<VirtualLayer>>,
}

impl NodeResponse {
    /// The canonical success answer.
    pub fn ok() -> Self {
        Self { kind: "result".to_string(), result: 0, data: None }
    }

    /// The synthesized failure used for timeouts and local errors.
    pub fn failed() -> Self {
        Self { kind: "result".to_string(), result: -1, data: None }
    }
}

/// Produces the per-target payload for a command.
///
/// The connector never touches the virtual screen directly: the provider
/// duplicates the current snapshot, applies the command, derives the
/// node-specific pixel projection, and commits the snapshot on success.
pub trait SnapshotProvider: Send + Sync {
    /// Apply `command` for `node_id` and return the serialized
    /// `ApplyCommandData` payload to put on the wire.
    fn apply_for_node(&self, command: &str, node_id: i32) -> Result<String>;
}

/// One declared fan-out destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub node_id: i32,
    pub addr: String,
}

struct Worker {
    cmd_tx: mpsc::Sender<String>,
    resp_rx: mpsc::Receiver<NodeResponse>,
}

/// The fan-out connector.
pub struct MultiConnector {
    targets: Vec<Target>,
    provider: Arc<dyn SnapshotProvider>,
    force: bool,
    workers: Mutex<Vec<Option<Worker>>>,
}

impl MultiConnector {
    /// Derive the target list from the screen definition (nodes joined with
    /// their framework-node entries) and build an unconnected connector.
    pub fn new(
        def: &ScreenDef,
        provider: Arc<dyn SnapshotProvider>,
        force: bool,
    ) -> Result<Self> {
        let mut targets = Vec::new();
        for node in &def.nodes {
            for fwn in &def.distributed_window_system.framework_node {
                if node.node_id == fwn.node_id {
                    targets.push(Target {
                        node_id: node.node_id,
                        addr: format!("{}:{}", node.ip, fwn.ula.port),
                    });
                }
            }
        }

        if targets.is_empty() {
            return Err(UlaError::config(
                "no target nodes declared; check the screen definition",
            ));
        }

        let workers = Mutex::new((0..targets.len()).map(|_| None).collect());

        Ok(Self { targets, provider, force, workers })
    }

    /// Targets this connector fans out to, in declaration order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Open a session to every target.
    ///
    /// Succeeds when all targets connect, or when at least one connects and
    /// `force` is set. Anything less is a [`UlaError::Connectivity`].
    pub async fn connect(&self) -> Result<()> {
        let mut workers = self.workers.lock().await;
        self.spawn_missing(&mut workers).await;
        self.check_connectivity(&workers)
    }

    fn check_connectivity(&self, workers: &[Option<Worker>]) -> Result<()> {
        let connected = count_connected(workers);
        if connected == 0 {
            return Err(UlaError::connectivity("no target node is reachable"));
        }
        if !self.force && connected < self.targets.len() {
            return Err(UlaError::connectivity(format!(
                "partial connectivity: {} of {} targets reachable",
                connected,
                self.targets.len()
            )));
        }
        Ok(())
    }

    async fn spawn_missing(&self, workers: &mut [Option<Worker>]) {
        for (idx, slot) in workers.iter_mut().enumerate() {
            if let Some(worker) = slot {
                if !worker.cmd_tx.is_closed() {
                    continue;
                }
                *slot = None;
            }

            let target = self.targets[idx].clone();
            match connect_target(&target.addr, Duration::ZERO).await {
                Ok(stream) => {
                    let (cmd_tx, cmd_rx) = mpsc::channel(1);
                    let (resp_tx, resp_rx) = mpsc::channel(1);
                    let provider = Arc::clone(&self.provider);
                    tokio::spawn(worker_loop(stream, target, provider, cmd_rx, resp_tx));
                    *slot = Some(Worker { cmd_tx, resp_rx });
                }
                Err(e) => {
                    warn!(addr = %target.addr, "failed to connect target: {}", e);
                }
            }
        }
    }

    /// Fan a layout command out to every connected target and merge the
    /// responses. Reconnects missing workers first, honoring the `force`
    /// rules.
    pub async fn send_layout_command(&self, command: &str) -> Result<NodeResponse> {
        let mut workers = self.workers.lock().await;

        if count_connected(&workers) < self.targets.len() {
            self.spawn_missing(&mut workers).await;
            self.check_connectivity(&workers)?;
        }

        let responses = self.fan_out(&mut workers, command).await;
        let merged = merge_responses(responses)?;

        match merged.kind.as_str() {
            "result" => {
                if merged.result != 0 {
                    return Err(UlaError::fatal(format!(
                        "layout command failed on at least one node (result {})",
                        merged.result
                    )));
                }
                Ok(merged)
            }
            "data" => Ok(merged),
            other => Err(UlaError::protocol(format!("unknown response type {:?}", other))),
        }
    }

    async fn fan_out(
        &self,
        workers: &mut [Option<Worker>],
        command: &str,
    ) -> Vec<Option<NodeResponse>> {
        let exchanges = workers.iter_mut().enumerate().map(|(idx, slot)| {
            let addr = self.targets[idx].addr.clone();
            async move {
                let worker = slot.as_mut()?;
                if worker.cmd_tx.send(command.to_string()).await.is_err() {
                    *slot = None;
                    return Some(NodeResponse::failed());
                }

                match timeout(RESPONSE_WATCHDOG, worker.resp_rx.recv()).await {
                    Ok(Some(resp)) => Some(resp),
                    Ok(None) => {
                        // worker died mid-command
                        *slot = None;
                        Some(NodeResponse::failed())
                    }
                    Err(_) => {
                        error!(%addr, "command response watchdog fired");
                        Some(NodeResponse::failed())
                    }
                }
            }
        });

        futures::future::join_all(exchanges).await
    }
}

fn count_connected(workers: &[Option<Worker>]) -> usize {
    workers
        .iter()
        .filter(|w| matches!(w, Some(worker) if !worker.cmd_tx.is_closed()))
        .count()
}

/// Merge per-target responses: bitwise OR for `result`, last non-equal
/// payload for `data`. Mixed response types are a protocol error.
fn merge_responses(responses: Vec<Option<NodeResponse>>) -> Result<NodeResponse> {
    let mut merged: Option<NodeResponse> = None;

    for resp in responses.into_iter().flatten() {
        match &mut merged {
            None => merged = Some(resp),
            Some(m) => {
                if m.kind != resp.kind {
                    return Err(UlaError::protocol(format!(
                        "non-uniform response types {:?} and {:?}",
                        m.kind, resp.kind
                    )));
                }
                m.result |= resp.result;
                if m.kind == "data" && resp.data != m.data {
                    m.data = resp.data;
                }
            }
        }
    }

    merged.ok_or_else(|| UlaError::connectivity("no responses to merge"))
}

/// Connect to a target, optionally retrying inside a bounded window.
/// `retry` of zero means one attempt only.
pub async fn connect_target(addr: &str, retry: Duration) -> Result<TcpStream> {
    match TcpStream::connect(addr).await {
        Ok(stream) => {
            info!(%addr, "connected to target");
            return Ok(stream);
        }
        Err(e) if retry.is_zero() => {
            return Err(UlaError::connectivity(format!("cannot connect {}: {}", addr, e)))
        }
        Err(e) => debug!(%addr, "connect failed, retrying: {}", e),
    }

    let attempt_loop = async {
        loop {
            tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            if let Ok(stream) = TcpStream::connect(addr).await {
                return stream;
            }
        }
    };

    match timeout(retry, attempt_loop).await {
        Ok(stream) => {
            info!(%addr, "connected to target after retry");
            Ok(stream)
        }
        Err(_) => Err(UlaError::connectivity(format!("cannot connect {} within {:?}", addr, retry))),
    }
}

async fn worker_loop(
    mut stream: TcpStream,
    target: Target,
    provider: Arc<dyn SnapshotProvider>,
    mut cmd_rx: mpsc::Receiver<String>,
    resp_tx: mpsc::Sender<NodeResponse>,
) {
    while let Some(command) = cmd_rx.recv().await {
        let payload = match provider.apply_for_node(&command, target.node_id) {
            Ok(p) => p,
            Err(e) => {
                error!(node_id = target.node_id, "apply and generate command failed: {}", e);
                let _ = resp_tx.send(NodeResponse::failed()).await;
                continue;
            }
        };

        match exchange(&mut stream, payload.as_bytes()).await {
            Ok(resp) => {
                let _ = resp_tx.send(resp).await;
            }
            Err(UlaError::Io(e)) => {
                warn!(addr = %target.addr, "connection lost ({}), reconnecting", e);
                match connect_target(&target.addr, RECONNECT_TIMEOUT).await {
                    Ok(new_stream) => {
                        stream = new_stream;
                        info!(addr = %target.addr, "reconnected to target");
                        // the in-flight command is not replayed; the
                        // watchdog reports it as failed
                    }
                    Err(_) => {
                        warn!(addr = %target.addr, "reconnection failed, dropping worker");
                        return;
                    }
                }
            }
            Err(e) => {
                error!(addr = %target.addr, "send command failed: {}", e);
                let _ = resp_tx.send(NodeResponse { kind: String::new(), result: -1, data: None })
                    .await;
            }
        }
    }
}

/// One framed request/response exchange on an established session.
async fn exchange(stream: &mut TcpStream, payload: &[u8]) -> Result<NodeResponse> {
    protocol::write_magic(stream).await?;
    protocol::write_frame(stream, payload).await?;

    let body = protocol::read_frame(stream).await?;
    let resp: NodeResponse = serde_json::from_slice(&body)
        .map_err(|e| UlaError::protocol(format!("bad response body: {}", e)))?;
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_resp(result: i32) -> Option<NodeResponse> {
        Some(NodeResponse { kind: "result".to_string(), result, data: None })
    }

    fn data_resp(vids: &[i32]) -> Option<NodeResponse> {
        let data = vids
            .iter()
            .map(|vid| VirtualLayer {
                app_name: "app".to_string(),
                vid: *vid,
                coord: Default::default(),
                vdisplay_id: -1,
                virtual_w: 100,
                virtual_h: 100,
                vsrc_x: 0,
                vsrc_y: 0,
                vsrc_w: 100,
                vsrc_h: 100,
                vdst_x: 0,
                vdst_y: 0,
                vdst_w: 100,
                vdst_h: 100,
                visibility: 1,
                vsurfaces: vec![],
            })
            .collect();
        Some(NodeResponse { kind: "data".to_string(), result: 0, data: Some(data) })
    }

    #[test]
    fn test_merge_or_result_all_ok() {
        let merged = merge_responses(vec![result_resp(0), result_resp(0)]).unwrap();
        assert_eq!(merged.result, 0);
    }

    #[test]
    fn test_merge_or_result_any_failure_wins() {
        let merged = merge_responses(vec![result_resp(0), result_resp(-1), result_resp(0)]).unwrap();
        assert_ne!(merged.result, 0);
    }

    #[test]
    fn test_merge_skips_missing_slots() {
        let merged = merge_responses(vec![None, result_resp(0), None]).unwrap();
        assert_eq!(merged.result, 0);
    }

    #[test]
    fn test_merge_data_last_non_equal_wins() {
        let merged = merge_responses(vec![data_resp(&[1]), data_resp(&[1]), data_resp(&[2])])
            .unwrap();
        assert_eq!(merged.data.unwrap()[0].vid, 2);
    }

    #[test]
    fn test_merge_mixed_types_is_protocol_error() {
        let err = merge_responses(vec![result_resp(0), data_resp(&[1])]).unwrap_err();
        assert!(matches!(err, UlaError::Protocol(_)));
    }

    #[test]
    fn test_merge_empty_is_error() {
        assert!(merge_responses(vec![None, None]).is_err());
    }

    #[test]
    fn test_response_wire_names() {
        let resp: NodeResponse =
            serde_json::from_str(r#"{"Type":"result","Result":-1}"#).unwrap();
        assert_eq!(resp.kind, "result");
        assert_eq!(resp.result, -1);
        assert!(resp.data.is_none());
    }

    #[test]
    fn test_targets_join_nodes_with_framework_nodes() {
        use crate::config::tests::SAMPLE_DEF;

        struct NullProvider;
        impl SnapshotProvider for NullProvider {
            fn apply_for_node(&self, _: &str, _: i32) -> Result<String> {
                Ok(String::new())
            }
        }

        let def = ScreenDef::from_json(SAMPLE_DEF).unwrap();
        let conn = MultiConnector::new(&def, Arc::new(NullProvider), false).unwrap();
        assert_eq!(conn.targets().len(), 2);
        assert_eq!(conn.targets()[0].addr, "127.0.0.1:10200");
        assert_eq!(conn.targets()[1].addr, "127.0.0.2:10201");
    }
}
