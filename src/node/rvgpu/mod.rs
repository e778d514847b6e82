//! RVGPU back-end
//!
//! One compositor per physical display, declared in the screen definition.
//! No layer splitting is needed: each compositor sees only its own display,
//! so the per-display batch keeps the virtual VIDs. Safety areas ride along
//! with the layers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ScreenDef;
use crate::error::Result;
use crate::node::{build_work_map, CompositorPlugin};
use crate::pixel::{ApplyCommandData, LocalCommandReq, NodePixelScreens, RdisplayCommandData};

pub mod protocol;

mod session;

use protocol::UHMI_RVGPU_LAYOUT_SOCK;
use session::{send_logging, RvgpuSession};

/// One declared compositor endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RvgpuEndpoint {
    pub rdisplay_id: i32,
    pub domain: String,
}

/// The RVGPU compositor plugin.
pub struct RvgpuPlugin {
    endpoints: Vec<RvgpuEndpoint>,
}

impl RvgpuPlugin {
    /// Discover the node's compositors from the screen definition. Returns
    /// `None` when the node declares none (the IVI back-end applies then).
    pub fn from_def(def: &ScreenDef, node_id: i32) -> Option<Self> {
        let mut endpoints = Vec::new();

        for comp in def.compositors_for_node(node_id) {
            let Some(first_vdisplay) = comp.vdisplay_ids.first() else {
                warn!(domain = %comp.sock_domain_name, "compositor without vdisplay ids");
                continue;
            };
            for rdisplay in &def.real_displays {
                if rdisplay.vdisplay_id == *first_vdisplay && rdisplay.node_id == node_id {
                    endpoints.push(RvgpuEndpoint {
                        rdisplay_id: rdisplay.rdisplay_id,
                        domain: format!("{}.{}", UHMI_RVGPU_LAYOUT_SOCK, comp.sock_domain_name),
                    });
                }
            }
        }

        if endpoints.is_empty() {
            return None;
        }

        debug!(?endpoints, "rvgpu compositors configured");
        Some(Self { endpoints })
    }

    /// The discovered endpoints, in declaration order.
    pub fn endpoints(&self) -> &[RvgpuEndpoint] {
        &self.endpoints
    }
}

#[async_trait]
impl CompositorPlugin for RvgpuPlugin {
    fn generate(
        &self,
        acdata: &ApplyCommandData,
        old: &NodePixelScreens,
    ) -> Result<Vec<LocalCommandReq>> {
        let new_nps = acdata
            .np_screens
            .clone()
            .unwrap_or_else(|| NodePixelScreens::empty(old.node_id));

        let old_map = build_work_map(old)?;
        let new_map = build_work_map(&new_nps)?;

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
                    psafety_areas: pscreen.psafety_areas.clone(),
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
        let mut sessions: Vec<RvgpuSession> = self
            .endpoints
            .iter()
            .map(|e| RvgpuSession::new(e.rdisplay_id, e.domain.clone()))
            .collect();

        for session in &mut sessions {
            session.connect_with_retry().await;
        }

        while let Some(req) = req_rx.recv().await {
            for session in &mut sessions {
                if !session.is_connected() {
                    session.connect_once().await;
                }
            }

            let mut ret = 0;
            if req.command == "initial_vscreen" {
                for session in &mut sessions {
                    let body = match protocol::initial_layout_json(&req, session.rdisplay_id) {
                        Ok(body) => body,
                        Err(e) => {
                            warn!("protocol marshal failed: {}", e);
                            ret = -1;
                            continue;
                        }
                    };

                    if !session.is_connected() {
                        warn!(domain = %session.domain, "compositor unreachable, skipping");
                        continue;
                    }

                    if !send_logging(session, &body).await {
                        ret = -1;
                    }
                }
            } else {
                warn!(command = %req.command, "unsupported local command");
            }

            let mut resp = LocalCommandReq::default();
            resp.ret = ret;
            if resp_tx.send(resp).await.is_err() {
                return;
            }
        }
    }
}
