//! Client-side orchestration
//!
//! Owns the authoritative client copy of the virtual screen and exposes the
//! two high-level entry points: broadcast the merged initial layout, and
//! forward a user-supplied layout command.
//!
//! [`ClientScreen`] is the connector's snapshot provider: every fan-out
//! duplicates the current screen under a read lock, applies the command,
//! derives the target node's pixel projection, and commits the new snapshot
//! under a write lock. No reader ever observes a half-applied command, and
//! the lock is never held across I/O.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::info;

use crate::config::ScreenDef;
use crate::connector::{MultiConnector, SnapshotProvider};
use crate::convert::convert_for_node;
use crate::error::{Result, UlaError};
use crate::layout;
use crate::utils::env_bool;
use crate::vscreen::VirtualScreen;

/// The client's virtual-screen holder.
pub struct ClientScreen {
    vscreen: RwLock<VirtualScreen>,
}

impl ClientScreen {
    pub fn new(def: &ScreenDef) -> Self {
        Self { vscreen: RwLock::new(VirtualScreen::new(def)) }
    }

    /// Read-only view for tests and diagnostics.
    pub fn snapshot(&self) -> VirtualScreen {
        self.vscreen.read().snapshot()
    }
}

impl SnapshotProvider for ClientScreen {
    fn apply_for_node(&self, command: &str, node_id: i32) -> Result<String> {
        let value: Value = serde_json::from_str(command)
            .map_err(|e| UlaError::parse(format!("bad layout command: {}", e)))?;

        let mut snapshot = self.vscreen.read().snapshot();
        let mut acdata = snapshot.apply(&value)?;
        acdata.np_screens = Some(convert_for_node(&snapshot, node_id)?);

        let payload = serde_json::to_string(&acdata)
            .map_err(|e| UlaError::fatal(format!("payload marshal failed: {}", e)))?;

        *self.vscreen.write() = snapshot;
        Ok(payload)
    }
}

/// High-level client over the multi-connector.
pub struct DwmClient {
    connector: MultiConnector,
}

impl DwmClient {
    /// Load the screen definition, build the snapshot provider, and open
    /// sessions to every declared node.
    pub async fn connect(force: bool, vsd_path: Option<&str>) -> Result<Self> {
        let def = ScreenDef::load(vsd_path)?;
        let provider = Arc::new(ClientScreen::new(&def));
        let connector = MultiConnector::new(&def, provider, force)?;
        connector.connect().await?;
        Ok(Self { connector })
    }

    /// `force` resolution used when no explicit flag is given.
    pub fn force_from_env() -> bool {
        env_bool("ULA_FORCE", false)
    }

    /// Merge every app's initial layout and broadcast it as
    /// `initial_vscreen`.
    pub async fn set_system_layout(&self) -> Result<()> {
        let tree = layout::read_layout_tree()?;
        let command = layout::initial_vscreen_command(&tree)?;
        info!(layers = tree.vlayers.len(), "broadcasting initial layout");
        self.connector.send_layout_command(&command).await?;
        Ok(())
    }

    /// Forward a user-supplied layout command to every node.
    pub async fn set_layout_command(&self, command: &str) -> Result<()> {
        // normalize through a JSON value so malformed input fails here
        let value: Value = serde_json::from_str(command)
            .map_err(|e| UlaError::parse(format!("bad layout command: {}", e)))?;
        let normalized = serde_json::to_string(&value)
            .map_err(|e| UlaError::fatal(format!("command marshal failed: {}", e)))?;

        self.connector.send_layout_command(&normalized).await?;
        Ok(())
    }

    pub fn connector(&self) -> &MultiConnector {
        &self.connector
    }
}
