//! Initial-layout reading and z-order merge
//!
//! Walks the application directory (one subdirectory per app, each holding
//! `dwm_initial_layout.json`), merges every app's layer fragments into a
//! single list sorted ascending by `z_order` (ties keep insertion order),
//! and renders the merged tree as the `initial_vscreen` layout command.
//!
//! Layers missing `z_order`, with an unknown `coord`, or in `vdisplay`
//! coordinates without a `vdisplay_id` are skipped with a warning.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, UlaError};
use crate::utils::env_string;

/// Default application directory root.
pub const DEF_DWM_DIR: &str = "/var/local/uhmi-app/dwm";

/// Per-app layout file name.
pub const INITIAL_LAYOUT_FILE: &str = "dwm_initial_layout.json";

/// Surface record of a per-app layout file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSurface {
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
    pub visibility: Option<i32>,
}

/// Layer record of a per-app layout file. Optional fields stay optional so
/// missing ones can be diagnosed per layer instead of failing the file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppLayer {
    #[serde(rename = "VID")]
    pub vid: i32,
    pub coord: Option<String>,
    pub vdisplay_id: Option<i32>,
    pub z_order: Option<i32>,
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
    pub visibility: Option<i32>,
    #[serde(default)]
    pub vsurface: Vec<AppSurface>,
}

/// One `dwm_initial_layout.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppInitialLayout {
    pub application_name: String,
    #[serde(default)]
    pub vlayer: Vec<AppLayer>,
}

/// A merged layer, attributed to its application and ordered by z.
#[derive(Debug, Clone)]
pub struct MergedLayer {
    pub app_name: String,
    pub z_order: i32,
    pub coord: String,
    pub vdisplay_id: i32,
    pub layer: AppLayer,
}

/// The cluster-wide merged layer tree.
#[derive(Debug, Clone, Default)]
pub struct LayoutTree {
    pub vlayers: Vec<MergedLayer>,
}

/// Application directories under the configured root (`$DWMPATH` or the
/// default), one per subdirectory.
pub fn app_dirs() -> Vec<PathBuf> {
    let root = env_string("DWMPATH", DEF_DWM_DIR);
    app_dirs_under(Path::new(&root))
}

/// Application directories under an explicit root.
pub fn app_dirs_under(root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return dirs;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }

    dirs.sort();
    dirs
}

fn read_app_layout(fname: &Path) -> Result<AppInitialLayout> {
    let content = std::fs::read_to_string(fname)
        .map_err(|e| UlaError::config(format!("cannot read {}: {}", fname.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| UlaError::config(format!("bad layout file {}: {}", fname.display(), e)))
}

/// Load one app's fragments, dropping layers that cannot participate.
fn load_app_fragments(app_dir: &Path) -> Result<Vec<MergedLayer>> {
    let layout = read_app_layout(&app_dir.join(INITIAL_LAYOUT_FILE))?;
    let app_name = layout.application_name.clone();

    let mut fragments = Vec::new();
    for layer in layout.vlayer {
        let Some(z_order) = layer.z_order else {
            warn!(vid = layer.vid, "layer skipped: z_order is not specified");
            continue;
        };

        let (coord, vdisplay_id) = match layer.coord.as_deref() {
            None | Some("global") => ("global".to_string(), 0),
            Some("vdisplay") => match layer.vdisplay_id {
                Some(id) => ("vdisplay".to_string(), id),
                None => {
                    warn!(vid = layer.vid, "layer skipped: vdisplay_id is not specified");
                    continue;
                }
            },
            Some(other) => {
                warn!(vid = layer.vid, coord = other, "layer skipped: unknown coord");
                continue;
            }
        };

        fragments.push(MergedLayer {
            app_name: app_name.clone(),
            z_order,
            coord,
            vdisplay_id,
            layer,
        });
    }

    Ok(fragments)
}

fn insert_sorted(tree: &mut LayoutTree, fragments: Vec<MergedLayer>) {
    for fragment in fragments {
        let idx = tree
            .vlayers
            .iter()
            .position(|existing| existing.z_order > fragment.z_order)
            .unwrap_or(tree.vlayers.len());
        tree.vlayers.insert(idx, fragment);
    }
}

/// Merge every app's initial layout under the configured root.
pub fn read_layout_tree() -> Result<LayoutTree> {
    let root = env_string("DWMPATH", DEF_DWM_DIR);
    read_layout_tree_under(Path::new(&root))
}

/// Merge every app's initial layout under an explicit root.
pub fn read_layout_tree_under(root: &Path) -> Result<LayoutTree> {
    let mut tree = LayoutTree::default();

    let dirs = app_dirs_under(root);
    debug!(?dirs, "scanning app layout directories");

    for dir in dirs {
        match load_app_fragments(&dir) {
            Ok(fragments) => insert_sorted(&mut tree, fragments),
            Err(e) => warn!(dir = %dir.display(), "skipping app layout: {}", e),
        }
    }

    if tree.vlayers.is_empty() {
        return Err(UlaError::config("cannot read any layout config"));
    }

    Ok(tree)
}

// Command-side rendering of the merged tree.

#[derive(Debug, Serialize)]
struct CommandSurface {
    #[serde(rename = "VID")]
    vid: i32,
    pixel_w: i32,
    pixel_h: i32,
    psrc_x: i32,
    psrc_y: i32,
    psrc_w: i32,
    psrc_h: i32,
    vdst_x: i32,
    vdst_y: i32,
    vdst_w: i32,
    vdst_h: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<i32>,
}

#[derive(Debug, Serialize)]
struct CommandLayer {
    appli_name: String,
    #[serde(rename = "VID")]
    vid: i32,
    coord: String,
    vdisplay_id: i32,
    virtual_w: i32,
    virtual_h: i32,
    vsrc_x: i32,
    vsrc_y: i32,
    vsrc_w: i32,
    vsrc_h: i32,
    vdst_x: i32,
    vdst_y: i32,
    vdst_w: i32,
    vdst_h: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<i32>,
    vsurface: Vec<CommandSurface>,
}

#[derive(Debug, Serialize)]
struct InitialVscreenCommand {
    command: &'static str,
    vlayer: Vec<CommandLayer>,
}

/// Render the merged tree as the `initial_vscreen` layout command.
pub fn initial_vscreen_command(tree: &LayoutTree) -> Result<String> {
    let vlayer = tree
        .vlayers
        .iter()
        .map(|merged| {
            let layer = &merged.layer;
            CommandLayer {
                appli_name: merged.app_name.clone(),
                vid: layer.vid,
                coord: merged.coord.clone(),
                vdisplay_id: merged.vdisplay_id,
                virtual_w: layer.virtual_w,
                virtual_h: layer.virtual_h,
                vsrc_x: layer.vsrc_x,
                vsrc_y: layer.vsrc_y,
                vsrc_w: layer.vsrc_w,
                vsrc_h: layer.vsrc_h,
                vdst_x: layer.vdst_x,
                vdst_y: layer.vdst_y,
                vdst_w: layer.vdst_w,
                vdst_h: layer.vdst_h,
                visibility: layer.visibility,
                vsurface: layer
                    .vsurface
                    .iter()
                    .map(|s| CommandSurface {
                        vid: s.vid,
                        pixel_w: s.pixel_w,
                        pixel_h: s.pixel_h,
                        psrc_x: s.psrc_x,
                        psrc_y: s.psrc_y,
                        psrc_w: s.psrc_w,
                        psrc_h: s.psrc_h,
                        vdst_x: s.vdst_x,
                        vdst_y: s.vdst_y,
                        vdst_w: s.vdst_w,
                        vdst_h: s.vdst_h,
                        visibility: s.visibility,
                    })
                    .collect(),
            }
        })
        .collect();

    let command = InitialVscreenCommand { command: "initial_vscreen", vlayer };
    Ok(serde_json::to_string(&command)?)
}
