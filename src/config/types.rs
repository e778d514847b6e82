//! Screen-definition type definitions

use serde::{Deserialize, Serialize};

/// The virtual canvas and its display regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screen2d {
    /// Total virtual canvas size
    pub size: VirtualSize,

    /// Ordered virtual display regions
    pub virtual_displays: Vec<VirtualDisplayDef>,
}

/// Size of the virtual canvas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VirtualSize {
    pub virtual_w: i32,
    pub virtual_h: i32,
}

/// A named rectangular region of the virtual canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualDisplayDef {
    pub disp_name: String,
    pub vdisplay_id: i32,
    pub virtual_x: i32,
    pub virtual_y: i32,
    pub virtual_w: i32,
    pub virtual_h: i32,
}

/// A physical panel bound to a virtual display on one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealDisplayDef {
    pub node_id: i32,
    pub vdisplay_id: i32,
    pub pixel_w: i32,
    pub pixel_h: i32,
    pub rdisplay_id: i32,
}

/// A cluster member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub node_id: i32,
    pub hostname: String,
    pub ip: String,
}

/// Endpoints of the distributed window system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedWindowSystem {
    pub ula_client_manager: ClientManagerDef,
    pub framework_node: Vec<FrameworkNodeDef>,
}

/// The client-manager endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientManagerDef {
    pub node_id: i32,
    pub port: u16,
}

/// A node agent endpoint plus its local compositors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkNodeDef {
    pub node_id: i32,
    pub ula: UlaEndpointDef,
    #[serde(default)]
    pub compositor: Vec<CompositorDef>,
}

/// Listen parameters of one node agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UlaEndpointDef {
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub debug_port: Option<u16>,
}

/// One local compositor endpoint and the virtual displays it composes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositorDef {
    pub vdisplay_ids: Vec<i32>,
    pub sock_domain_name: String,
}

/// A rectangle of the virtual canvas that must be kept clear.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SafetyAreaDef {
    pub virtual_x: i32,
    pub virtual_y: i32,
    pub virtual_w: i32,
    pub virtual_h: i32,
}
