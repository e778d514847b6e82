//! IVI back-end
//!
//! Single compositor per node. Diffing follows the shared rule: a display
//! whose pixel layer list goes from empty to non-empty gets an
//! `initial_vscreen` batch; everything else emits nothing. Duplicated layer
//! VIDs across displays are renamed first (see [`split`]).

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Result;
use crate::node::{build_work_map, CompositorPlugin};
use crate::pixel::{ApplyCommandData, LocalCommandReq, NodePixelScreens, RdisplayCommandData};

pub mod protocol;
pub mod split;

mod session;

use session::IviSession;
use split::{split_layers, SplitIdTable};

/// The IVI compositor plugin. Owns the layer-split id table for the life
/// of the process.
pub struct IviPlugin {
    split_table: Mutex<SplitIdTable>,
}

impl IviPlugin {
    pub fn new() -> Self {
        Self { split_table: Mutex::new(SplitIdTable::new()) }
    }

    fn split(&self, nps: &NodePixelScreens) -> NodePixelScreens {
        let mut split = nps.clone();
        let mut table = self.split_table.lock();
        split_layers(&mut split, &mut table);
        split
    }
}

impl Default for IviPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompositorPlugin for IviPlugin {
    fn generate(
        &self,
        acdata: &ApplyCommandData,
        old: &NodePixelScreens,
    ) -> Result<Vec<LocalCommandReq>> {
        let new_nps = acdata
            .np_screens
            .clone()
            .unwrap_or_else(|| NodePixelScreens::empty(old.node_id));

        let old_split = self.split(old);
        let new_split = self.split(&new_nps);

        let old_map = build_work_map(&old_split)?;
        let new_map = build_work_map(&new_split)?;

        let mut rd_comms = Vec::new();
        for (rdisplay_id, pscreen) in &new_map {
            let was_empty = old_map
                .get(rdisplay_id)
                .map(|old| old.players.is_empty())
                .unwrap_or(true);

            if was_empty && !pscreen.players.is_empty() {
                rd_comms.push(RdisplayCommandData {
                    rdisplay: pscreen.rdisplay,
                    players: pscreen.players.clone(),
                    psafety_areas: Vec::new(),
                });
            }
        }

        if rd_comms.is_empty() {
            debug!(command = %acdata.command, "no initial transition, nothing to emit");
            return Ok(Vec::new());
        }

        Ok(vec![LocalCommandReq {
            command: "initial_vscreen".to_string(),
            rd_comms,
            ret: 0,
        }])
    }

    async fn run(
        self: Arc<Self>,
        mut req_rx: mpsc::Receiver<LocalCommandReq>,
        resp_tx: mpsc::Sender<LocalCommandReq>,
    ) {
        let mut session = IviSession::new();
        session.connect_with_retry().await;

        while let Some(req) = req_rx.recv().await {
            if !session.is_connected() {
                session.connect_once().await;
            }

            let ret = session.send(&req).await;
            let mut resp = LocalCommandReq::default();
            resp.ret = ret;
            if resp_tx.send(resp).await.is_err() {
                return;
            }
        }
    }
}
