//! IVI compositor wire schema
//!
//! One compositor per node behind `/tmp/uhmi-ivi-wm_sock`. Every command is
//! preceded by a `ULA0` magic handshake, then a length-prefixed JSON body,
//! answered by a 4-byte big-endian status word.

use serde::Serialize;

use crate::error::Result;
use crate::pixel::{LocalCommandReq, PixelLayer, PixelSurface};

/// Socket path of the IVI window manager.
pub const UHMI_IVI_WM_SOCK: &str = "/tmp/uhmi-ivi-wm_sock";

pub const VERSION: &str = "1.0.0";
pub const OPACITY: f64 = 1.0;

#[derive(Debug, Serialize)]
struct IviSurfaceJson {
    id: i32,
    width: i32,
    height: i32,
    src_x: i32,
    src_y: i32,
    src_w: i32,
    src_h: i32,
    dst_x: i32,
    dst_y: i32,
    dst_w: i32,
    dst_h: i32,
    opacity: f64,
    visibility: i32,
}

#[derive(Debug, Serialize)]
struct IviLayerJson {
    id: i32,
    width: i32,
    height: i32,
    src_x: i32,
    src_y: i32,
    src_w: i32,
    src_h: i32,
    dst_x: i32,
    dst_y: i32,
    dst_w: i32,
    dst_h: i32,
    opacity: f64,
    visibility: i32,
    surfaces: Vec<IviSurfaceJson>,
}

#[derive(Debug, Serialize)]
struct IviScreenJson {
    id: i32,
    layers: Vec<IviLayerJson>,
}

#[derive(Debug, Serialize)]
struct InitialScreenProtocol {
    version: &'static str,
    command: &'static str,
    screens: Vec<IviScreenJson>,
}

fn surface_json(psurf: &PixelSurface) -> IviSurfaceJson {
    IviSurfaceJson {
        id: psurf.vid,
        width: psurf.pixel_w,
        height: psurf.pixel_h,
        src_x: psurf.psrc_x,
        src_y: psurf.psrc_y,
        src_w: psurf.psrc_w,
        src_h: psurf.psrc_h,
        dst_x: psurf.pdst_x,
        dst_y: psurf.pdst_y,
        dst_w: psurf.pdst_w,
        dst_h: psurf.pdst_h,
        opacity: OPACITY,
        visibility: psurf.visibility,
    }
}

fn layer_json(player: &PixelLayer) -> IviLayerJson {
    IviLayerJson {
        id: player.vid,
        width: player.pixel_w,
        height: player.pixel_h,
        src_x: player.psrc_x,
        src_y: player.psrc_y,
        src_w: player.psrc_w,
        src_h: player.psrc_h,
        dst_x: player.pdst_x,
        dst_y: player.pdst_y,
        dst_w: player.pdst_w,
        dst_h: player.pdst_h,
        opacity: OPACITY,
        visibility: player.visibility,
        surfaces: player.psurfaces.iter().map(surface_json).collect(),
    }
}

/// Serialize an `initial_vscreen` batch into the compositor's
/// `initial_screen` body.
pub fn initial_screen_json(req: &LocalCommandReq) -> Result<String> {
    let screens = req
        .rd_comms
        .iter()
        .map(|rdcomm| IviScreenJson {
            id: rdcomm.rdisplay.rdisplay_id,
            layers: rdcomm.players.iter().map(layer_json).collect(),
        })
        .collect();

    let proto = InitialScreenProtocol {
        version: VERSION,
        command: "initial_screen",
        screens,
    };

    Ok(serde_json::to_string(&proto)?)
}
