//! Virtual-coordinate entity types
//!
//! These are the logical entities a layout command manipulates: layers and
//! surfaces positioned on the virtual canvas, the display regions they are
//! projected onto, and the safety areas carried alongside them.
//!
//! Serde names follow the layout-command JSON schema so a decoded layer
//! re-encodes to its canonical command form.

use serde::{Deserialize, Serialize};

use crate::config::{SafetyAreaDef, VirtualDisplayDef};

/// Coordinate space a layer's destination rectangle is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coord {
    /// Relative to the whole virtual canvas
    #[default]
    Global,

    /// Relative to one virtual display
    Vdisplay,
}

/// A rectangular region of the virtual canvas with a logical name and id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDisplay {
    pub disp_name: String,
    pub vdisplay_id: i32,
    pub virtual_x: i32,
    pub virtual_y: i32,
    pub virtual_w: i32,
    pub virtual_h: i32,
}

impl From<&VirtualDisplayDef> for VirtualDisplay {
    fn from(def: &VirtualDisplayDef) -> Self {
        Self {
            disp_name: def.disp_name.clone(),
            vdisplay_id: def.vdisplay_id,
            virtual_x: def.virtual_x,
            virtual_y: def.virtual_y,
            virtual_w: def.virtual_w,
            virtual_h: def.virtual_h,
        }
    }
}

/// An application pixmap positioned inside its parent layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualSurface {
    /// Application that produced the pixmap, inherited from the layer
    #[serde(skip)]
    pub app_name: String,

    /// VID of the owning layer
    #[serde(skip)]
    pub parent_vid: i32,

    #[serde(rename = "VID")]
    pub vid: i32,

    pub pixel_w: i32,
    pub pixel_h: i32,

    pub psrc_x: i32,
    pub psrc_y: i32,
    pub psrc_w: i32,
    pub psrc_h: i32,

    pub vdst_x: i32,
    pub vdst_y: i32,
    pub vdst_w: i32,
    pub vdst_h: i32,

    pub visibility: i32,
}

/// A positioned, scaled rectangle of virtual space holding surfaces.
///
/// Z-order is implied by list position inside the owning display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualLayer {
    #[serde(rename = "appli_name")]
    pub app_name: String,

    #[serde(rename = "VID")]
    pub vid: i32,

    pub coord: Coord,

    /// Only meaningful when `coord` is [`Coord::Vdisplay`]
    pub vdisplay_id: i32,

    pub virtual_w: i32,
    pub virtual_h: i32,

    pub vsrc_x: i32,
    pub vsrc_y: i32,
    pub vsrc_w: i32,
    pub vsrc_h: i32,

    pub vdst_x: i32,
    pub vdst_y: i32,
    pub vdst_w: i32,
    pub vdst_h: i32,

    pub visibility: i32,

    #[serde(rename = "vsurface")]
    pub vsurfaces: Vec<VirtualSurface>,
}

/// A rectangle of virtual space that must be respected by every display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualSafetyArea {
    pub virtual_x: i32,
    pub virtual_y: i32,
    pub virtual_w: i32,
    pub virtual_h: i32,
}

impl From<&SafetyAreaDef> for VirtualSafetyArea {
    fn from(def: &SafetyAreaDef) -> Self {
        Self {
            virtual_x: def.virtual_x,
            virtual_y: def.virtual_y,
            virtual_w: def.virtual_w,
            virtual_h: def.virtual_h,
        }
    }
}
