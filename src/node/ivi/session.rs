//! IVI compositor session
//!
//! Owns the unix-domain connection to the IVI window manager. The first
//! connect retries inside a bounded window (the compositor may still be
//! starting); reconnects during command handling are one-shot. Each command
//! is a magic handshake, a framed JSON body, and a 4-byte status word back.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::node::ivi::protocol::{self, UHMI_IVI_WM_SOCK};
use crate::pixel::LocalCommandReq;
use crate::protocol::MAGIC_CODE;

/// Window for the initial connect attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause between attempts inside the window.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

pub(super) struct IviSession {
    stream: Option<UnixStream>,
}

impl IviSession {
    pub(super) fn new() -> Self {
        Self { stream: None }
    }

    /// Connect with the bounded retry loop.
    pub(super) async fn connect_with_retry(&mut self) {
        let attempt_loop = async {
            loop {
                if let Ok(stream) = UnixStream::connect(UHMI_IVI_WM_SOCK).await {
                    return stream;
                }
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
        };

        match timeout(CONNECT_TIMEOUT, attempt_loop).await {
            Ok(stream) => {
                info!("connected to uhmi-ivi-wm");
                self.stream = Some(stream);
            }
            Err(_) => {
                error!("cannot connect to uhmi-ivi-wm");
                self.stream = None;
            }
        }
    }

    /// Single connect attempt, used when a command finds the session down.
    pub(super) async fn connect_once(&mut self) {
        match UnixStream::connect(UHMI_IVI_WM_SOCK).await {
            Ok(stream) => {
                info!("connected to uhmi-ivi-wm");
                self.stream = Some(stream);
            }
            Err(e) => {
                error!("cannot connect to uhmi-ivi-wm: {}", e);
                self.stream = None;
            }
        }
    }

    pub(super) fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Execute one batch. Returns 0 on success, -1 on any failure; a failed
    /// exchange drops the connection for the next command to re-open.
    pub(super) async fn send(&mut self, req: &LocalCommandReq) -> i32 {
        debug!(command = %req.command, "sending to uhmi-ivi-wm");

        let msg = match req.command.as_str() {
            "initial_vscreen" => match protocol::initial_screen_json(req) {
                Ok(msg) => msg,
                Err(e) => {
                    error!("protocol marshal failed: {}", e);
                    return -1;
                }
            },
            other => {
                error!(command = other, "unsupported local command");
                return -1;
            }
        };

        let Some(stream) = self.stream.as_mut() else {
            error!("not connected to uhmi-ivi-wm");
            return -1;
        };

        match exchange(stream, msg.as_bytes()).await {
            Ok(status) => {
                debug!("uhmi-ivi-wm answered status {:#x}", status);
                0
            }
            Err(e) => {
                error!("uhmi-ivi-wm exchange failed: {}", e);
                self.stream = None;
                -1
            }
        }
    }
}

async fn exchange(stream: &mut UnixStream, body: &[u8]) -> crate::error::Result<u32> {
    // handshake: magic out, same four bytes echoed back
    stream.write_all(&MAGIC_CODE).await?;
    let mut echo = [0u8; 4];
    stream.read_exact(&mut echo).await?;
    if echo != MAGIC_CODE {
        return Err(crate::error::UlaError::protocol(format!(
            "magic echo mismatch: {:02x?}",
            echo
        )));
    }

    crate::protocol::write_frame(stream, body).await?;
    crate::protocol::read_status_word(stream).await
}
