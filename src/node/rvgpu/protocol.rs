//! RVGPU compositor wire schema
//!
//! One compositor per physical display, each behind an abstract unix socket
//! `uhmi-rvgpu_layout_sock.<domain>`. No handshake; the message is a
//! length-prefixed JSON body and the answer is a fixed-length status
//! buffer.
//!
//! Every surface is shipped with a per-display geometry produced by a
//! second clipping pass: the surface's destination inside the layer is
//! clipped against the layer's source window, and the visible part is
//! mapped back through the surface's own source rectangle.

use serde::Serialize;

use crate::error::Result;
use crate::pixel::{LocalCommandReq, PixelLayer, PixelSurface};

/// Socket name prefix; the compositor's domain name is appended.
pub const UHMI_RVGPU_LAYOUT_SOCK: &str = "uhmi-rvgpu_layout_sock";

/// Length of the "Layout complete" status buffer.
pub const STATUS_LEN: usize = 15;

pub const VERSION: &str = "0.0.0";
pub const OPACITY: f64 = 1.0;

#[derive(Debug, Serialize)]
struct RvgpuSurfaceJson {
    id: i32,
    rvgpu_surface_id: String,
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
struct SafetyAreaJson {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

#[derive(Debug, Serialize)]
struct InitialLayoutProtocol {
    version: &'static str,
    command: &'static str,
    surfaces: Vec<RvgpuSurfaceJson>,
    safety_areas: Vec<SafetyAreaJson>,
}

/// Visible source/destination rectangles of one surface on one display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceView {
    pub src_x: i32,
    pub src_y: i32,
    pub src_w: i32,
    pub src_h: i32,
    pub dst_x: i32,
    pub dst_y: i32,
    pub dst_w: i32,
    pub dst_h: i32,
}

struct AxisClip {
    clip: i32,
    clip_len: i32,
    offset: i32,
}

/// One axis of the surface-against-layer-source clip. `lsrc`/`lsrc_len` is
/// the layer's source window, `sdst`/`sdst_len` the surface destination
/// inside the layer, `ssrc` the surface's own source origin, `limit` the
/// layer pixel extent.
fn clip_surface_axis(
    lsrc: i32,
    lsrc_len: i32,
    sdst: i32,
    sdst_len: i32,
    ssrc: i32,
    limit: i32,
) -> AxisClip {
    let mut clip = 0;
    let mut clip_len = 0;
    let mut offset = 0;

    if lsrc + lsrc_len <= sdst || lsrc >= sdst + sdst_len {
        // surface fully outside the layer source window
    } else if lsrc < sdst {
        clip = ssrc;
        offset = sdst;
        clip_len = if lsrc + lsrc_len > sdst + sdst_len {
            sdst_len
        } else {
            lsrc + lsrc_len - sdst
        };
    } else {
        clip = lsrc;
        clip_len = if lsrc + lsrc_len <= sdst + sdst_len {
            lsrc_len
        } else {
            sdst + sdst_len - lsrc
        };
    }

    if clip + clip_len > limit {
        clip_len = limit - clip;
    }

    AxisClip { clip, clip_len, offset }
}

/// Compute the visible rectangles of a surface on its layer's display.
pub fn calc_surface_view(player: &PixelLayer, psurf: &PixelSurface) -> SurfaceView {
    let x = clip_surface_axis(
        player.psrc_x,
        player.psrc_w,
        psurf.pdst_x,
        psurf.pdst_w,
        psurf.psrc_x,
        player.pixel_w,
    );
    let y = clip_surface_axis(
        player.psrc_y,
        player.psrc_h,
        psurf.pdst_y,
        psurf.pdst_h,
        psurf.psrc_y,
        player.pixel_h,
    );

    let src_x = (x.clip as f64 / psurf.pdst_w as f64 * psurf.psrc_w as f64) as i32 + psurf.psrc_x;
    let src_w = (x.clip_len as f64 / psurf.pdst_w as f64 * psurf.psrc_w as f64) as i32;
    let src_y = (y.clip as f64 / psurf.pdst_h as f64 * psurf.psrc_h as f64) as i32 + psurf.psrc_y;
    let src_h = (y.clip_len as f64 / psurf.pdst_h as f64 * psurf.psrc_h as f64) as i32;

    SurfaceView {
        src_x,
        src_y,
        src_w,
        src_h,
        dst_x: player.pdst_x + x.offset,
        dst_y: player.pdst_y + y.offset,
        dst_w: player.pdst_w,
        dst_h: player.pdst_h,
    }
}

fn surface_json(player: &PixelLayer, psurf: &PixelSurface) -> RvgpuSurfaceJson {
    let view = calc_surface_view(player, psurf);

    RvgpuSurfaceJson {
        id: player.vid,
        rvgpu_surface_id: psurf.app_name.clone(),
        width: psurf.pixel_w,
        height: psurf.pixel_h,
        src_x: view.src_x,
        src_y: view.src_y,
        src_w: view.src_w,
        src_h: view.src_h,
        dst_x: view.dst_x,
        dst_y: view.dst_y,
        dst_w: view.dst_w,
        dst_h: view.dst_h,
        opacity: OPACITY,
        visibility: psurf.visibility,
    }
}

/// Serialize an `initial_vscreen` batch into the `initial_layout` body of
/// the compositor behind `rdisplay_id`.
pub fn initial_layout_json(req: &LocalCommandReq, rdisplay_id: i32) -> Result<String> {
    let mut surfaces = Vec::new();
    let mut safety_areas = Vec::new();

    for rdcomm in &req.rd_comms {
        if rdcomm.rdisplay.rdisplay_id != rdisplay_id {
            continue;
        }

        for player in &rdcomm.players {
            for psurf in &player.psurfaces {
                surfaces.push(surface_json(player, psurf));
            }
        }

        for area in &rdcomm.psafety_areas {
            safety_areas.push(SafetyAreaJson {
                x: area.pixel_x,
                y: area.pixel_y,
                width: area.pixel_w,
                height: area.pixel_h,
            });
        }
    }

    let proto = InitialLayoutProtocol {
        version: VERSION,
        command: "initial_layout",
        surfaces,
        safety_areas,
    };

    Ok(serde_json::to_string(&proto)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{PixelSafetyArea, RdisplayCommandData, RealDisplay};

    fn full_layer() -> PixelLayer {
        PixelLayer {
            vid: 1,
            pixel_w: 1000,
            pixel_h: 1000,
            psrc_x: 0,
            psrc_y: 0,
            psrc_w: 1000,
            psrc_h: 1000,
            pdst_x: 0,
            pdst_y: 0,
            pdst_w: 1000,
            pdst_h: 1000,
            visibility: 1,
            ..Default::default()
        }
    }

    fn surface(dst: (i32, i32, i32, i32)) -> PixelSurface {
        PixelSurface {
            vid: 10,
            app_name: "nav".to_string(),
            pixel_w: 640,
            pixel_h: 480,
            psrc_x: 0,
            psrc_y: 0,
            psrc_w: 640,
            psrc_h: 480,
            pdst_x: dst.0,
            pdst_y: dst.1,
            pdst_w: dst.2,
            pdst_h: dst.3,
            visibility: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_surface_inside_layer_source_keeps_full_source() {
        let view = calc_surface_view(&full_layer(), &surface((100, 100, 400, 400)));
        assert_eq!((view.src_x, view.src_y), (0, 0));
        assert_eq!((view.src_w, view.src_h), (640, 480));
        // destination shifts to the surface's own position in the layer
        assert_eq!((view.dst_x, view.dst_y), (100, 100));
        assert_eq!((view.dst_w, view.dst_h), (1000, 1000));
    }

    #[test]
    fn test_surface_outside_layer_source_is_zero() {
        let mut layer = full_layer();
        layer.psrc_x = 0;
        layer.psrc_w = 100;
        let view = calc_surface_view(&layer, &surface((500, 0, 400, 400)));
        assert_eq!((view.src_w, view.src_h), (0, 480));
    }

    #[test]
    fn test_surface_straddling_source_window_start() {
        // layer source starts at 300 while the surface covers 0..600:
        // the visible strip begins inside the surface
        let mut layer = full_layer();
        layer.psrc_x = 300;
        layer.psrc_w = 700;

        let view = calc_surface_view(&layer, &surface((0, 0, 600, 480)));
        // visible destination strip is 300..600, mapped back through the
        // surface's own 640-wide source
        assert_eq!(view.src_x, 320);
        assert_eq!(view.src_w, 320);
    }

    #[test]
    fn test_initial_layout_shape() {
        let mut layer = full_layer();
        layer.psurfaces.push(surface((0, 0, 1000, 1000)));

        let req = LocalCommandReq {
            command: "initial_vscreen".to_string(),
            rd_comms: vec![RdisplayCommandData {
                rdisplay: RealDisplay {
                    node_id: 0,
                    pixel_w: 1000,
                    pixel_h: 1000,
                    vdisplay_id: 1,
                    rdisplay_id: 4,
                },
                players: vec![layer],
                psafety_areas: vec![PixelSafetyArea {
                    pixel_x: 0,
                    pixel_y: 900,
                    pixel_w: 1000,
                    pixel_h: 100,
                }],
            }],
            ret: 0,
        };

        let json: serde_json::Value =
            serde_json::from_str(&initial_layout_json(&req, 4).unwrap()).unwrap();
        assert_eq!(json["version"], "0.0.0");
        assert_eq!(json["command"], "initial_layout");
        assert_eq!(json["surfaces"][0]["id"], 1);
        assert_eq!(json["surfaces"][0]["rvgpu_surface_id"], "nav");
        assert_eq!(json["safety_areas"][0]["y"], 900);

        // the same batch addressed to another display carries nothing
        let other: serde_json::Value =
            serde_json::from_str(&initial_layout_json(&req, 9).unwrap()).unwrap();
        assert_eq!(other["surfaces"].as_array().unwrap().len(), 0);
    }
}
