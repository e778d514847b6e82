//! Node agent server
//!
//! Accepts framed connections from the client manager. Each connection gets
//! its own read task; all tasks feed the single command processor, which
//! serializes execution across connections. Responses travel back over a
//! per-request oneshot and are written as magic-less length-prefixed
//! frames.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::error::{Result, UlaError};
use crate::node::processor::{CommandEnvelope, CommandProcessor};
use crate::node::{CompositorPlugin, PLUGIN_CHANNEL_CAP};
use crate::protocol;

/// Run the node agent on an already-bound listener. Never returns under
/// normal operation.
pub async fn run_node_agent(
    listener: TcpListener,
    plugin: Arc<dyn CompositorPlugin>,
    node_id: i32,
) -> Result<()> {
    let (req_tx, req_rx) = mpsc::channel(PLUGIN_CHANNEL_CAP);
    let (resp_tx, resp_rx) = mpsc::channel(PLUGIN_CHANNEL_CAP);
    tokio::spawn(Arc::clone(&plugin).run(req_rx, resp_tx));

    let (cmd_tx, cmd_rx) = mpsc::channel::<CommandEnvelope>(1);
    let processor = CommandProcessor::new(node_id, plugin, req_tx, resp_rx);
    tokio::spawn(processor.run(cmd_rx));

    info!(node_id, addr = %listener.local_addr()?, "node agent listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("accept error: {}", e);
                continue;
            }
        };
        debug!(%peer, "client connected");
        tokio::spawn(handle_connection(stream, cmd_tx.clone()));
    }
}

async fn handle_connection(mut stream: TcpStream, cmd_tx: mpsc::Sender<CommandEnvelope>) {
    loop {
        let payload = match read_request(&mut stream).await {
            Ok(payload) => payload,
            Err(UlaError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("client closed the connection");
                return;
            }
            Err(e) => {
                error!("command read failed: {}", e);
                return;
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if cmd_tx
            .send(CommandEnvelope { payload, reply: reply_tx })
            .await
            .is_err()
        {
            error!("command processor is gone");
            return;
        }

        let response = match reply_rx.await {
            Ok(resp) => resp,
            Err(_) => return,
        };

        let body = match serde_json::to_vec(&response) {
            Ok(body) => body,
            Err(e) => {
                error!("response marshal failed: {}", e);
                return;
            }
        };

        if let Err(e) = protocol::write_frame(&mut stream, &body).await {
            error!("response write failed: {}", e);
            return;
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<Vec<u8>> {
    protocol::read_magic(stream).await?;
    protocol::read_frame(stream).await
}
