//! Command processing
//!
//! A single task consumes decoded payloads from all accept tasks in FIFO
//! order, hands them to the plugin for diffing, submits the resulting
//! batches to the plugin worker one at a time, and keeps the previous
//! pixel projection for the next diff.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::connector::NodeResponse;
use crate::node::CompositorPlugin;
use crate::pixel::{ApplyCommandData, LocalCommandReq, NodePixelScreens};

/// One framed request travelling from an accept task to the processor.
pub struct CommandEnvelope {
    /// Raw JSON payload of the frame
    pub payload: Vec<u8>,

    /// Where the response JSON goes
    pub reply: oneshot::Sender<NodeResponse>,
}

/// The per-node command processor.
pub struct CommandProcessor {
    plugin: Arc<dyn CompositorPlugin>,
    req_tx: mpsc::Sender<LocalCommandReq>,
    resp_rx: mpsc::Receiver<LocalCommandReq>,
    previous: NodePixelScreens,
}

impl CommandProcessor {
    pub fn new(
        node_id: i32,
        plugin: Arc<dyn CompositorPlugin>,
        req_tx: mpsc::Sender<LocalCommandReq>,
        resp_rx: mpsc::Receiver<LocalCommandReq>,
    ) -> Self {
        Self {
            plugin,
            req_tx,
            resp_rx,
            previous: NodePixelScreens::empty(node_id),
        }
    }

    /// Consume envelopes until every accept task is gone.
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<CommandEnvelope>) {
        while let Some(envelope) = cmd_rx.recv().await {
            let response = self.process(&envelope.payload).await;
            let _ = envelope.reply.send(response);
        }
    }

    async fn process(&mut self, payload: &[u8]) -> NodeResponse {
        let acdata: ApplyCommandData = match serde_json::from_slice(payload) {
            Ok(data) => data,
            Err(e) => {
                error!("undecodable command payload: {}", e);
                return NodeResponse::failed();
            }
        };

        debug!(command = %acdata.command, "processing command");

        let reqs = match self.plugin.generate(&acdata, &self.previous) {
            Ok(reqs) => reqs,
            Err(e) => {
                error!(command = %acdata.command, "local command generation failed: {}", e);
                return NodeResponse::failed();
            }
        };

        let ret = self.submit(reqs).await;

        let node_id = self.previous.node_id;
        self.previous = acdata
            .np_screens
            .unwrap_or_else(|| NodePixelScreens::empty(node_id));

        if acdata.command == "get_vlayer" {
            return NodeResponse {
                kind: "data".to_string(),
                result: ret,
                data: Some(acdata.vlayers.unwrap_or_default()),
            };
        }

        NodeResponse { kind: "result".to_string(), result: ret, data: None }
    }

    /// Feed batches to the plugin worker, request/response serialized.
    async fn submit(&mut self, reqs: Vec<LocalCommandReq>) -> i32 {
        let mut ret = 0;
        for req in reqs {
            if self.req_tx.send(req).await.is_err() {
                error!("plugin worker is gone");
                return -1;
            }
            match self.resp_rx.recv().await {
                Some(resp) => ret = resp.ret,
                None => {
                    error!("plugin worker closed the response channel");
                    return -1;
                }
            }
        }
        ret
    }
}
