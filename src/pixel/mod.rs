//! Pixel-space entities and the client→node wire payload
//!
//! Same shape as the virtual entities but with every coordinate expressed
//! in the pixel space of one physical display (`pdst` instead of `vdst`).
//! These types are values: each conversion produces a fresh tree, and the
//! previous tree is kept only for diffing.
//!
//! The serde names are the wire schema of the framed client→node payload,
//! so they use the historical CamelCase keys.

use serde::{Deserialize, Serialize};

use crate::vscreen::VirtualLayer;

/// A physical panel as seen by the pipeline: its node, its virtual display
/// binding, and its pixel resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealDisplay {
    #[serde(rename = "NodeId")]
    pub node_id: i32,
    #[serde(rename = "PixelW")]
    pub pixel_w: i32,
    #[serde(rename = "PixelH")]
    pub pixel_h: i32,
    #[serde(rename = "VDisplayId")]
    pub vdisplay_id: i32,
    #[serde(rename = "RDisplayId")]
    pub rdisplay_id: i32,
}

impl From<&crate::config::RealDisplayDef> for RealDisplay {
    fn from(def: &crate::config::RealDisplayDef) -> Self {
        Self {
            node_id: def.node_id,
            pixel_w: def.pixel_w,
            pixel_h: def.pixel_h,
            vdisplay_id: def.vdisplay_id,
            rdisplay_id: def.rdisplay_id,
        }
    }
}

/// A surface projected into physical pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelSurface {
    #[serde(rename = "AppName", default)]
    pub app_name: String,

    #[serde(skip)]
    pub parent_vid: i32,

    #[serde(rename = "VID")]
    pub vid: i32,

    #[serde(rename = "PixelW")]
    pub pixel_w: i32,
    #[serde(rename = "PixelH")]
    pub pixel_h: i32,

    #[serde(rename = "PsrcX")]
    pub psrc_x: i32,
    #[serde(rename = "PsrcY")]
    pub psrc_y: i32,
    #[serde(rename = "PsrcW")]
    pub psrc_w: i32,
    #[serde(rename = "PsrcH")]
    pub psrc_h: i32,

    #[serde(rename = "PdstX")]
    pub pdst_x: i32,
    #[serde(rename = "PdstY")]
    pub pdst_y: i32,
    #[serde(rename = "PdstW")]
    pub pdst_w: i32,
    #[serde(rename = "PdstH")]
    pub pdst_h: i32,

    #[serde(rename = "Visibility")]
    pub visibility: i32,
}

/// A layer projected into physical pixels, surfaces included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelLayer {
    #[serde(rename = "AppName", default)]
    pub app_name: String,

    #[serde(rename = "VID")]
    pub vid: i32,

    #[serde(rename = "PixelW")]
    pub pixel_w: i32,
    #[serde(rename = "PixelH")]
    pub pixel_h: i32,

    #[serde(rename = "PsrcX")]
    pub psrc_x: i32,
    #[serde(rename = "PsrcY")]
    pub psrc_y: i32,
    #[serde(rename = "PsrcW")]
    pub psrc_w: i32,
    #[serde(rename = "PsrcH")]
    pub psrc_h: i32,

    #[serde(rename = "PdstX")]
    pub pdst_x: i32,
    #[serde(rename = "PdstY")]
    pub pdst_y: i32,
    #[serde(rename = "PdstW")]
    pub pdst_w: i32,
    #[serde(rename = "PdstH")]
    pub pdst_h: i32,

    #[serde(rename = "Visibility")]
    pub visibility: i32,

    #[serde(rename = "Psurfaces", default)]
    pub psurfaces: Vec<PixelSurface>,
}

/// A safety area scaled into physical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelSafetyArea {
    #[serde(rename = "PixelX")]
    pub pixel_x: i32,
    #[serde(rename = "PixelY")]
    pub pixel_y: i32,
    #[serde(rename = "PixelW")]
    pub pixel_w: i32,
    #[serde(rename = "PixelH")]
    pub pixel_h: i32,
}

/// One physical display and the z-ordered pixel layers placed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelScreen {
    #[serde(rename = "Rdisplay")]
    pub rdisplay: RealDisplay,

    #[serde(rename = "Players")]
    pub players: Vec<PixelLayer>,

    #[serde(rename = "PsafetyAreas", default)]
    pub psafety_areas: Vec<PixelSafetyArea>,
}

/// The per-node projection: every pixel screen owned by one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePixelScreens {
    #[serde(rename = "NodeId")]
    pub node_id: i32,

    #[serde(rename = "Pscreens")]
    pub pscreens: Vec<PixelScreen>,
}

impl NodePixelScreens {
    /// An empty projection, the "nothing shown yet" diff baseline.
    pub fn empty(node_id: i32) -> Self {
        Self { node_id, pscreens: Vec::new() }
    }
}

/// Layer/surface id pair flagged by a command. `surface_id` is -1 when only
/// the layer is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPair {
    #[serde(rename = "LayerId")]
    pub layer_id: i32,
    #[serde(rename = "SurfaceId")]
    pub surface_id: i32,
}

/// Result of applying one layout command: the command kind, the ids it
/// touched, an optional layer read-out (`get_vlayer`), and the derived
/// per-node pixel projection filled in by the geometry converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyCommandData {
    #[serde(rename = "Command")]
    pub command: String,

    #[serde(rename = "ChgIds")]
    pub chg_ids: Vec<IdPair>,

    #[serde(rename = "Vlayers", default, skip_serializing_if = "Option::is_none")]
    pub vlayers: Option<Vec<VirtualLayer>>,

    #[serde(rename = "NPScreens", default, skip_serializing_if = "Option::is_none")]
    pub np_screens: Option<NodePixelScreens>,
}

/// Per-display slice of a local compositor command.
#[derive(Debug, Clone, PartialEq)]
pub struct RdisplayCommandData {
    pub rdisplay: RealDisplay,
    pub players: Vec<PixelLayer>,
    pub psafety_areas: Vec<PixelSafetyArea>,
}

/// One batch of work for the local compositor: the command kind, its
/// per-display data, and the numeric result filled in by the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalCommandReq {
    pub command: String,
    pub rd_comms: Vec<RdisplayCommandData>,
    pub ret: i32,
}

impl Default for RdisplayCommandData {
    fn default() -> Self {
        Self {
            rdisplay: RealDisplay {
                node_id: 0,
                pixel_w: 0,
                pixel_h: 0,
                vdisplay_id: 0,
                rdisplay_id: 0,
            },
            players: Vec::new(),
            psafety_areas: Vec::new(),
        }
    }
}
