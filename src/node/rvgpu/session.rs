//! RVGPU compositor sessions
//!
//! One session per physical display, each behind an abstract unix-domain
//! socket. Initial connects retry inside a bounded window; a command finding
//! a session down attempts one reconnect. The compositor answers each
//! layout with a fixed-length status buffer whose arrival is the success
//! signal.

use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{SocketAddr, UnixStream as StdUnixStream};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{Result, UlaError};
use crate::node::rvgpu::protocol::STATUS_LEN;
use crate::protocol;

/// Window for the initial connect attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause between attempts inside the window.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// One compositor endpoint and its live connection, if any.
pub(super) struct RvgpuSession {
    pub(super) rdisplay_id: i32,
    pub(super) domain: String,
    stream: Option<UnixStream>,
}

impl RvgpuSession {
    pub(super) fn new(rdisplay_id: i32, domain: String) -> Self {
        Self { rdisplay_id, domain, stream: None }
    }

    pub(super) fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connect with the bounded retry loop.
    pub(super) async fn connect_with_retry(&mut self) {
        let domain = self.domain.clone();
        let attempt_loop = async {
            loop {
                if let Ok(stream) = connect_abstract(&domain) {
                    return stream;
                }
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
        };

        match timeout(CONNECT_TIMEOUT, attempt_loop).await {
            Ok(stream) => {
                info!(domain = %self.domain, "connected to rvgpu compositor");
                self.stream = Some(stream);
            }
            Err(_) => {
                warn!(domain = %self.domain, "cannot connect rvgpu compositor");
                self.stream = None;
            }
        }
    }

    /// Single connect attempt for a session found down mid-command.
    pub(super) async fn connect_once(&mut self) {
        match connect_abstract(&self.domain) {
            Ok(stream) => {
                info!(domain = %self.domain, "connected to rvgpu compositor");
                self.stream = Some(stream);
            }
            Err(e) => {
                warn!(domain = %self.domain, "cannot connect rvgpu compositor: {}", e);
                self.stream = None;
            }
        }
    }

    /// Ship one layout body and wait for the status buffer.
    pub(super) async fn send(&mut self, body: &str) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(UlaError::connectivity(format!(
                "rvgpu compositor {} is not connected",
                self.domain
            )));
        };

        debug!(domain = %self.domain, "sending layout");
        let result = exchange(stream, body.as_bytes()).await;
        if result.is_err() {
            self.stream = None;
        }
        result
    }
}

async fn exchange(stream: &mut UnixStream, body: &[u8]) -> Result<()> {
    protocol::write_frame(stream, body).await?;

    let mut status = [0u8; STATUS_LEN];
    stream.read_exact(&mut status).await?;
    debug!(status = %String::from_utf8_lossy(&status), "rvgpu compositor answered");
    Ok(())
}

/// Connect to an abstract-namespace unix socket.
fn connect_abstract(name: &str) -> std::io::Result<UnixStream> {
    let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
    let stream = StdUnixStream::connect_addr(&addr)?;
    stream.set_nonblocking(true)?;
    UnixStream::from_std(stream)
}

/// Log-and-continue wrapper used when several sessions are serviced in one
/// command.
pub(super) async fn send_logging(session: &mut RvgpuSession, body: &str) -> bool {
    match session.send(body).await {
        Ok(()) => true,
        Err(e) => {
            error!(domain = %session.domain, "layout send failed: {}", e);
            false
        }
    }
}
