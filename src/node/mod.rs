//! Node agent
//!
//! The per-node half of the pipeline: a framed TCP server accepting layout
//! payloads from the client manager, a single command-processor task that
//! diffs successive pixel states, and a compositor plugin that turns the
//! diff into local compositor commands and drives the compositor session.
//!
//! ```text
//! accept task (per conn) ──► command processor ──► plugin worker ──► compositor
//!        ▲                         │
//!        └──── framed response ◄───┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Result, UlaError};
use crate::pixel::{ApplyCommandData, LocalCommandReq, NodePixelScreens, PixelScreen};

pub mod ivi;
pub mod processor;
pub mod rvgpu;
pub mod server;

pub use processor::CommandProcessor;
pub use server::run_node_agent;

/// Capacity of the plugin request/response channels.
pub const PLUGIN_CHANNEL_CAP: usize = 5;

/// Capability set of a compositor back-end.
///
/// `generate` diffs the previous pixel state against the state carried by
/// the command and produces the ordered batch of local commands; `run` is
/// the long-lived worker that owns the compositor session and executes
/// those batches.
#[async_trait]
pub trait CompositorPlugin: Send + Sync {
    /// Diff `old` against the projection in `acdata` and emit local
    /// compositor command batches.
    fn generate(
        &self,
        acdata: &ApplyCommandData,
        old: &NodePixelScreens,
    ) -> Result<Vec<LocalCommandReq>>;

    /// Drive the compositor session: consume requests, execute them, and
    /// report each result on `resp_tx`.
    async fn run(
        self: Arc<Self>,
        req_rx: mpsc::Receiver<LocalCommandReq>,
        resp_tx: mpsc::Sender<LocalCommandReq>,
    );
}

/// Pick the back-end for this node: RVGPU when the definition declares
/// compositors for it, IVI otherwise.
pub fn select_plugin(
    def: &crate::config::ScreenDef,
    node_id: i32,
) -> Arc<dyn CompositorPlugin> {
    match rvgpu::RvgpuPlugin::from_def(def, node_id) {
        Some(plugin) => Arc::new(plugin),
        None => Arc::new(ivi::IviPlugin::new()),
    }
}

/// Index the pixel screens by rdisplay id, checking the structural
/// invariants of the derived state: no duplicate rdisplay id, no duplicate
/// layer VID within a display, no duplicate surface VID within a layer.
pub(crate) fn build_work_map(nps: &NodePixelScreens) -> Result<HashMap<i32, PixelScreen>> {
    let mut map = HashMap::new();

    for pscreen in &nps.pscreens {
        let rdisplay_id = pscreen.rdisplay.rdisplay_id;
        if map.insert(rdisplay_id, pscreen.clone()).is_some() {
            return Err(UlaError::fatal(format!(
                "pixel screens carry duplicate rdisplay id {}",
                rdisplay_id
            )));
        }

        let mut layer_vids = HashSet::new();
        for player in &pscreen.players {
            if !layer_vids.insert(player.vid) {
                return Err(UlaError::fatal(format!(
                    "rdisplay {} carries duplicate layer VID {}",
                    rdisplay_id, player.vid
                )));
            }

            let mut surface_vids = HashSet::new();
            for psurf in &player.psurfaces {
                if !surface_vids.insert(psurf.vid) {
                    return Err(UlaError::fatal(format!(
                        "layer {} carries duplicate surface VID {}",
                        player.vid, psurf.vid
                    )));
                }
            }
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{PixelLayer, PixelSurface, RealDisplay};

    fn screen(rdisplay_id: i32, players: Vec<PixelLayer>) -> PixelScreen {
        PixelScreen {
            rdisplay: RealDisplay {
                node_id: 0,
                pixel_w: 100,
                pixel_h: 100,
                vdisplay_id: rdisplay_id,
                rdisplay_id,
            },
            players,
            psafety_areas: vec![],
        }
    }

    #[test]
    fn test_work_map_accepts_valid_state() {
        let nps = NodePixelScreens {
            node_id: 0,
            pscreens: vec![
                screen(0, vec![PixelLayer { vid: 1, ..Default::default() }]),
                screen(1, vec![PixelLayer { vid: 2, ..Default::default() }]),
            ],
        };
        let map = build_work_map(&nps).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_work_map_rejects_duplicate_rdisplay() {
        let nps = NodePixelScreens {
            node_id: 0,
            pscreens: vec![screen(0, vec![]), screen(0, vec![])],
        };
        assert!(matches!(build_work_map(&nps), Err(UlaError::Fatal(_))));
    }

    #[test]
    fn test_work_map_rejects_duplicate_layer_vid() {
        let nps = NodePixelScreens {
            node_id: 0,
            pscreens: vec![screen(
                0,
                vec![
                    PixelLayer { vid: 1, ..Default::default() },
                    PixelLayer { vid: 1, ..Default::default() },
                ],
            )],
        };
        assert!(matches!(build_work_map(&nps), Err(UlaError::Fatal(_))));
    }

    #[test]
    fn test_work_map_rejects_duplicate_surface_vid() {
        let nps = NodePixelScreens {
            node_id: 0,
            pscreens: vec![screen(
                0,
                vec![PixelLayer {
                    vid: 1,
                    psurfaces: vec![
                        PixelSurface { vid: 5, ..Default::default() },
                        PixelSurface { vid: 5, ..Default::default() },
                    ],
                    ..Default::default()
                }],
            )],
        };
        assert!(matches!(build_work_map(&nps), Err(UlaError::Fatal(_))));
    }
}
