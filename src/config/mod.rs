//! Screen-definition configuration
//!
//! Loads and validates the cluster-wide screen definition: the virtual
//! canvas, the virtual displays carved out of it, the physical panels bound
//! to them, the participating nodes, and the per-node compositor endpoints.
//!
//! The definition is a single JSON file, immutable after load. Its path
//! comes from an explicit argument, `$VSDPATH`, or the packaged default.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, UlaError};
use crate::utils::env_string;

pub mod types;

pub use types::*;

/// Default location of the screen-definition file.
pub const SCREEN_DEF_FILE: &str = "/etc/uhmi-framework/virtual-screen-def.json";

/// Top-level screen definition.
///
/// Field names mirror the JSON schema of `virtual-screen-def.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenDef {
    /// Virtual canvas and the virtual displays laid out on it
    #[serde(rename = "virtual_screen_2d")]
    pub screen_2d: Screen2d,

    /// Physical panels, each bound to one virtual display on one node
    pub real_displays: Vec<RealDisplayDef>,

    /// Cluster membership
    #[serde(rename = "node")]
    pub nodes: Vec<NodeDef>,

    /// Client-manager endpoint and per-node agent endpoints
    pub distributed_window_system: DistributedWindowSystem,

    /// Safety areas in virtual coordinates, shared by every virtual display
    #[serde(default)]
    pub virtual_safety_area: Vec<SafetyAreaDef>,
}

impl ScreenDef {
    /// Load a screen definition from an explicit path, or from `$VSDPATH`,
    /// or from the default location.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let fname = match path {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => env_string("VSDPATH", SCREEN_DEF_FILE),
        };

        debug!("loading screen definition from {}", fname);
        Self::load_file(Path::new(&fname))
    }

    /// Load and validate a screen definition from a concrete file path.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UlaError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Decode and validate a screen definition from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let def: ScreenDef = serde_json::from_str(content)
            .map_err(|e| UlaError::config(format!("screen definition decode error: {}", e)))?;
        def.validate()?;
        Ok(def)
    }

    /// Check the structural invariants of the definition.
    ///
    /// - `(node_id, vdisplay_id)` pairs in `real_displays` are unique
    /// - every vdisplay referenced by a compositor has a real display on
    ///   the same node
    /// - every framework node id appears in the node list
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rd in &self.real_displays {
            if !seen.insert((rd.node_id, rd.vdisplay_id)) {
                return Err(UlaError::config(format!(
                    "duplicate real display binding (node {}, vdisplay {})",
                    rd.node_id, rd.vdisplay_id
                )));
            }
        }

        let node_ids: HashSet<i32> = self.nodes.iter().map(|n| n.node_id).collect();
        for fwn in &self.distributed_window_system.framework_node {
            if !node_ids.contains(&fwn.node_id) {
                return Err(UlaError::config(format!(
                    "framework node {} is not in the node list",
                    fwn.node_id
                )));
            }
            for comp in &fwn.compositor {
                for vdid in &comp.vdisplay_ids {
                    if !self.is_vdisplay_in_node(fwn.node_id, *vdid) {
                        return Err(UlaError::config(format!(
                            "compositor {} references vdisplay {} which has no real \
                             display on node {}",
                            comp.sock_domain_name, vdid, fwn.node_id
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether the given virtual display has a real display on the node.
    pub fn is_vdisplay_in_node(&self, node_id: i32, vdisplay_id: i32) -> bool {
        self.real_displays
            .iter()
            .any(|rd| rd.node_id == node_id && rd.vdisplay_id == vdisplay_id)
    }

    /// Resolve a node id from a hostname.
    pub fn node_id_by_hostname(&self, hostname: &str) -> Result<i32> {
        self.nodes
            .iter()
            .find(|n| n.hostname == hostname)
            .map(|n| n.node_id)
            .ok_or_else(|| {
                UlaError::config(format!("hostname {} not found in screen definition", hostname))
            })
    }

    /// The configured IP address of a node.
    pub fn ip_for_node(&self, node_id: i32) -> Result<&str> {
        self.nodes
            .iter()
            .find(|n| n.node_id == node_id)
            .map(|n| n.ip.as_str())
            .ok_or_else(|| UlaError::config(format!("node {} has no ip entry", node_id)))
    }

    /// The agent listen port of a node, from its framework-node entry.
    pub fn ula_port_for_node(&self, node_id: i32) -> Result<u16> {
        self.distributed_window_system
            .framework_node
            .iter()
            .find(|f| f.node_id == node_id)
            .map(|f| f.ula.port)
            .ok_or_else(|| {
                UlaError::config(format!("node {} has no framework-node entry", node_id))
            })
    }

    /// Compositor declarations for a node, empty when none are declared.
    pub fn compositors_for_node(&self, node_id: i32) -> &[CompositorDef] {
        self.distributed_window_system
            .framework_node
            .iter()
            .find(|f| f.node_id == node_id)
            .map(|f| f.compositor.as_slice())
            .unwrap_or(&[])
    }

    /// Virtual canvas width.
    pub fn virtual_w(&self) -> i32 {
        self.screen_2d.size.virtual_w
    }

    /// Virtual canvas height.
    pub fn virtual_h(&self) -> i32 {
        self.screen_2d.size.virtual_h
    }
}
