//! Virtual-to-real geometry conversion
//!
//! Projects a [`VirtualScreen`] into the per-physical-display pixel layout
//! of one node. Each layer included on a display goes through two stages:
//!
//! 1. clip the destination rectangle to the virtual display and remap the
//!    source rectangle proportionally (global layers only; layers already
//!    in vdisplay coordinates skip this stage),
//! 2. scale the destination rectangle from virtual-display units to the
//!    panel's pixel units with truncating integer math.
//!
//! Safety areas take the same two stages without source remapping. Source
//! fields stay in their clipped virtual units.
//!
//! The per-display output order follows map iteration and is unspecified;
//! within a display the layer order is the input z-order.

use std::collections::HashMap;

use crate::error::{Result, UlaError};
use crate::pixel::{
    NodePixelScreens, PixelLayer, PixelSafetyArea, PixelScreen, PixelSurface, RealDisplay,
};
use crate::vscreen::{Coord, VirtualDisplay, VirtualLayer, VirtualSafetyArea, VirtualScreen};

/// Working record for one virtual display owned by the target node.
#[derive(Debug, Clone)]
struct WorkV2r {
    vdisplay: VirtualDisplay,
    rdisplay: RealDisplay,
    vlayers: Vec<VirtualLayer>,
    vsafety_areas: Vec<VirtualSafetyArea>,
    players: Vec<PixelLayer>,
    psafety_areas: Vec<PixelSafetyArea>,
}

/// Converts one virtual-screen snapshot into a node's pixel projection.
pub struct V2rConverter {
    node_id: i32,
    work: HashMap<i32, WorkV2r>,
}

impl V2rConverter {
    /// Collect the working set: every virtual display with a real display
    /// on `node_id`, its layers filtered to those that land on it.
    pub fn new(vscreen: &VirtualScreen, node_id: i32) -> Result<Self> {
        let mut work = HashMap::new();

        for (vdspid, vdisplay) in &vscreen.virtual_displays {
            if !vscreen.def.is_vdisplay_in_node(node_id, *vdspid) {
                continue;
            }

            let rdisplay = vscreen.real_displays.get(vdspid).copied().ok_or_else(|| {
                UlaError::config(format!("vdisplay {} has no real display entry", vdspid))
            })?;

            let vlayers = vscreen
                .vdisp_vlayers
                .get(vdspid)
                .map(|layers| {
                    layers
                        .iter()
                        .filter(|l| layer_lands_on(l, *vdspid))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            let vsafety_areas = vscreen
                .vdisp_safety_areas
                .get(vdspid)
                .cloned()
                .unwrap_or_default();

            work.insert(
                *vdspid,
                WorkV2r {
                    vdisplay: vdisplay.clone(),
                    rdisplay,
                    vlayers,
                    vsafety_areas,
                    players: Vec::new(),
                    psafety_areas: Vec::new(),
                },
            );
        }

        Ok(Self { node_id, work })
    }

    /// Run both stages for every owned display.
    pub fn convert(&mut self) {
        for work in self.work.values_mut() {
            let clipped = to_vdisplay_coords(&work.vlayers, &work.vdisplay);
            let scaled = to_rdisplay_coords(&clipped, &work.vdisplay, &work.rdisplay);
            work.players = scaled.iter().map(layer_to_pixel).collect();

            let clipped_areas = areas_to_vdisplay_coords(&work.vsafety_areas, &work.vdisplay);
            let scaled_areas =
                areas_to_rdisplay_coords(&clipped_areas, &work.vdisplay, &work.rdisplay);
            work.psafety_areas = scaled_areas.iter().map(area_to_pixel).collect();
        }
    }

    /// The converted projection, one pixel screen per owned display.
    pub fn node_pixel_screens(&self) -> NodePixelScreens {
        let pscreens = self
            .work
            .values()
            .map(|w| PixelScreen {
                rdisplay: w.rdisplay,
                players: w.players.clone(),
                psafety_areas: w.psafety_areas.clone(),
            })
            .collect();

        NodePixelScreens { node_id: self.node_id, pscreens }
    }
}

/// Run the full conversion for one node in one call.
pub fn convert_for_node(vscreen: &VirtualScreen, node_id: i32) -> Result<NodePixelScreens> {
    let mut conv = V2rConverter::new(vscreen, node_id)?;
    conv.convert();
    Ok(conv.node_pixel_screens())
}

fn layer_lands_on(layer: &VirtualLayer, vdisplay_id: i32) -> bool {
    match layer.coord {
        Coord::Global => true,
        Coord::Vdisplay => layer.vdisplay_id == vdisplay_id,
    }
}

/// One-dimensional clip of a layer destination range against a display
/// range, with proportional source remapping.
///
/// Returns `(dst, dst_w, src, src_w)` in display-local coordinates. A layer
/// entirely outside the display yields all zeros.
pub(crate) fn clip_axis(
    disp: i32,
    disp_w: i32,
    dst: i32,
    dst_w: i32,
    src: i32,
    src_w: i32,
) -> (i32, i32, i32, i32) {
    let (new_dst, new_dst_w, partial_src, partial_src_w) =
        if disp <= dst && dst <= disp + disp_w && disp + disp_w <= dst + dst_w {
            // starts inside, extends past the display end
            (dst - disp, disp + disp_w - dst, 0, disp + disp_w - dst)
        } else if dst <= disp && disp + disp_w <= dst + dst_w {
            // spans the whole display
            (0, disp_w, disp - dst, disp_w)
        } else if dst <= disp && disp <= dst + dst_w && dst + dst_w <= disp + disp_w {
            // starts before, ends inside
            (0, dst + dst_w - disp, disp - dst, dst + dst_w - disp)
        } else if disp <= dst && dst + dst_w <= disp + disp_w {
            // fully inside
            (dst - disp, dst_w, 0, dst_w)
        } else {
            // fully outside
            return (0, 0, 0, 0);
        };

    let new_src = partial_src * src_w / dst_w + src;
    let new_src_w = partial_src_w * src_w / dst_w;

    (new_dst, new_dst_w, new_src, new_src_w)
}

fn clip_layer(layer: &VirtualLayer, vdisp: &VirtualDisplay) -> VirtualLayer {
    let mut clipped = layer.clone();

    let (dx, dw, sx, sw) = clip_axis(
        vdisp.virtual_x,
        vdisp.virtual_w,
        layer.vdst_x,
        layer.vdst_w,
        layer.vsrc_x,
        layer.vsrc_w,
    );
    let (dy, dh, sy, sh) = clip_axis(
        vdisp.virtual_y,
        vdisp.virtual_h,
        layer.vdst_y,
        layer.vdst_h,
        layer.vsrc_y,
        layer.vsrc_h,
    );

    clipped.vdst_x = dx;
    clipped.vdst_w = dw;
    clipped.vsrc_x = sx;
    clipped.vsrc_w = sw;
    clipped.vdst_y = dy;
    clipped.vdst_h = dh;
    clipped.vsrc_y = sy;
    clipped.vsrc_h = sh;

    clipped
}

fn to_vdisplay_coords(layers: &[VirtualLayer], vdisp: &VirtualDisplay) -> Vec<VirtualLayer> {
    layers
        .iter()
        .map(|layer| match layer.coord {
            Coord::Vdisplay => layer.clone(),
            Coord::Global => clip_layer(layer, vdisp),
        })
        .collect()
}

fn to_rdisplay_coords(
    layers: &[VirtualLayer],
    vdisp: &VirtualDisplay,
    rdisp: &RealDisplay,
) -> Vec<VirtualLayer> {
    layers
        .iter()
        .map(|layer| {
            let mut scaled = layer.clone();
            scaled.vdst_x = layer.vdst_x * rdisp.pixel_w / vdisp.virtual_w;
            scaled.vdst_w = layer.vdst_w * rdisp.pixel_w / vdisp.virtual_w;
            scaled.vdst_y = layer.vdst_y * rdisp.pixel_h / vdisp.virtual_h;
            scaled.vdst_h = layer.vdst_h * rdisp.pixel_h / vdisp.virtual_h;
            scaled
        })
        .collect()
}

fn clip_area(area: &VirtualSafetyArea, vdisp: &VirtualDisplay) -> VirtualSafetyArea {
    fn clip(disp: i32, disp_w: i32, dst: i32, dst_w: i32) -> (i32, i32) {
        if disp <= dst && dst <= disp + disp_w && disp + disp_w <= dst + dst_w {
            (dst - disp, disp + disp_w - dst)
        } else if dst <= disp && disp + disp_w <= dst + dst_w {
            (0, disp_w)
        } else if dst <= disp && disp <= dst + dst_w && dst + dst_w <= disp + disp_w {
            (0, dst + dst_w - disp)
        } else if disp <= dst && dst + dst_w <= disp + disp_w {
            (dst - disp, dst_w)
        } else {
            (0, 0)
        }
    }

    let (x, w) = clip(vdisp.virtual_x, vdisp.virtual_w, area.virtual_x, area.virtual_w);
    let (y, h) = clip(vdisp.virtual_y, vdisp.virtual_h, area.virtual_y, area.virtual_h);

    VirtualSafetyArea { virtual_x: x, virtual_y: y, virtual_w: w, virtual_h: h }
}

fn areas_to_vdisplay_coords(
    areas: &[VirtualSafetyArea],
    vdisp: &VirtualDisplay,
) -> Vec<VirtualSafetyArea> {
    areas.iter().map(|a| clip_area(a, vdisp)).collect()
}

fn areas_to_rdisplay_coords(
    areas: &[VirtualSafetyArea],
    vdisp: &VirtualDisplay,
    rdisp: &RealDisplay,
) -> Vec<VirtualSafetyArea> {
    areas
        .iter()
        .map(|a| VirtualSafetyArea {
            virtual_x: a.virtual_x * rdisp.pixel_w / vdisp.virtual_w,
            virtual_w: a.virtual_w * rdisp.pixel_w / vdisp.virtual_w,
            virtual_y: a.virtual_y * rdisp.pixel_h / vdisp.virtual_h,
            virtual_h: a.virtual_h * rdisp.pixel_h / vdisp.virtual_h,
        })
        .collect()
}

fn surface_to_pixel(vsurf: &crate::vscreen::VirtualSurface) -> PixelSurface {
    PixelSurface {
        app_name: vsurf.app_name.clone(),
        parent_vid: vsurf.parent_vid,
        vid: vsurf.vid,
        pixel_w: vsurf.pixel_w,
        pixel_h: vsurf.pixel_h,
        psrc_x: vsurf.psrc_x,
        psrc_y: vsurf.psrc_y,
        psrc_w: vsurf.psrc_w,
        psrc_h: vsurf.psrc_h,
        pdst_x: vsurf.vdst_x,
        pdst_y: vsurf.vdst_y,
        pdst_w: vsurf.vdst_w,
        pdst_h: vsurf.vdst_h,
        visibility: vsurf.visibility,
    }
}

fn layer_to_pixel(vlayer: &VirtualLayer) -> PixelLayer {
    PixelLayer {
        app_name: vlayer.app_name.clone(),
        vid: vlayer.vid,
        pixel_w: vlayer.virtual_w,
        pixel_h: vlayer.virtual_h,
        psrc_x: vlayer.vsrc_x,
        psrc_y: vlayer.vsrc_y,
        psrc_w: vlayer.vsrc_w,
        psrc_h: vlayer.vsrc_h,
        pdst_x: vlayer.vdst_x,
        pdst_y: vlayer.vdst_y,
        pdst_w: vlayer.vdst_w,
        pdst_h: vlayer.vdst_h,
        visibility: vlayer.visibility,
        psurfaces: vlayer.vsurfaces.iter().map(surface_to_pixel).collect(),
    }
}

fn area_to_pixel(area: &VirtualSafetyArea) -> PixelSafetyArea {
    PixelSafetyArea {
        pixel_x: area.virtual_x,
        pixel_y: area.virtual_y,
        pixel_w: area.virtual_w,
        pixel_h: area.virtual_h,
    }
}
