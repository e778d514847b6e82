//! Virtual-screen model
//!
//! The authoritative logical state of the cluster: every virtual display,
//! its real-display binding, the per-display layer stacks, and the safety
//! areas. Mutation happens only through [`VirtualScreen::apply`] on a fresh
//! snapshot; the previous snapshot is kept until the command is confirmed.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::config::ScreenDef;
use crate::error::Result;
use crate::pixel::{ApplyCommandData, RealDisplay};

pub mod parser;
pub mod types;

pub use parser::{parse_command, LayerParams, LayoutCommand, SurfaceParams};
pub use types::*;

/// The logical screen state.
///
/// Maps are keyed by vdisplay id. Iteration order over the maps is
/// unspecified; within one display the layer order is the z-order.
#[derive(Debug, Clone)]
pub struct VirtualScreen {
    pub def: ScreenDef,

    pub virtual_width: i32,
    pub virtual_height: i32,

    pub virtual_displays: HashMap<i32, VirtualDisplay>,
    pub real_displays: HashMap<i32, RealDisplay>,
    pub vdisp_vlayers: HashMap<i32, Vec<VirtualLayer>>,
    pub vdisp_safety_areas: HashMap<i32, Vec<VirtualSafetyArea>>,
}

impl VirtualScreen {
    /// Build the initial state from a screen definition: displays populated,
    /// layer lists empty, safety areas identical across all displays.
    pub fn new(def: &ScreenDef) -> Self {
        let mut virtual_displays = HashMap::new();
        let mut vdisp_vlayers = HashMap::new();
        let mut vdisp_safety_areas = HashMap::new();

        let safety_areas: Vec<VirtualSafetyArea> =
            def.virtual_safety_area.iter().map(VirtualSafetyArea::from).collect();

        for vd in &def.screen_2d.virtual_displays {
            virtual_displays.insert(vd.vdisplay_id, VirtualDisplay::from(vd));
            vdisp_vlayers.insert(vd.vdisplay_id, Vec::new());
            vdisp_safety_areas.insert(vd.vdisplay_id, safety_areas.clone());
        }

        let mut real_displays = HashMap::new();
        for rd in &def.real_displays {
            real_displays.insert(rd.vdisplay_id, RealDisplay::from(rd));
        }

        Self {
            def: def.clone(),
            virtual_width: def.virtual_w(),
            virtual_height: def.virtual_h(),
            virtual_displays,
            real_displays,
            vdisp_vlayers,
            vdisp_safety_areas,
        }
    }

    /// Deep copy, layers and surfaces included.
    pub fn snapshot(&self) -> VirtualScreen {
        self.clone()
    }

    /// Decode and apply a layout command to this snapshot.
    ///
    /// `initial_vscreen` replaces every display's layer list with the
    /// decoded layers. `get_vlayer` is read-only and fills the `vlayers`
    /// read-out. Anything else is a no-op with empty change ids.
    pub fn apply(&mut self, command: &Value) -> Result<ApplyCommandData> {
        let parsed = parse_command(command)?;
        let name = parsed.name().to_string();

        let mut vlayers = None;
        match parsed {
            LayoutCommand::InitialVscreen(layers) => {
                for list in self.vdisp_vlayers.values_mut() {
                    *list = layers.clone();
                }
            }
            LayoutCommand::GetVlayer(vids) => {
                let mut found = Vec::new();
                for vdisp in self.virtual_displays.values() {
                    if let Some(layers) = self.vdisp_vlayers.get(&vdisp.vdisplay_id) {
                        for layer in layers {
                            if vids.contains(&layer.vid) {
                                found.push(layer.clone());
                            }
                        }
                    }
                }
                vlayers = Some(found);
            }
            LayoutCommand::Other(_) => {}
        }

        for vdisp in self.virtual_displays.values() {
            let vids: Vec<i32> = self
                .vdisp_vlayers
                .get(&vdisp.vdisplay_id)
                .map(|layers| layers.iter().map(|l| l.vid).collect())
                .unwrap_or_default();
            debug!(command = %name, vdisplay_id = vdisp.vdisplay_id, ?vids, "applied command");
        }

        Ok(ApplyCommandData {
            command: name,
            chg_ids: Vec::new(),
            vlayers,
            np_screens: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::SAMPLE_DEF;
    use serde_json::json;

    fn sample_screen() -> VirtualScreen {
        let def = ScreenDef::from_json(SAMPLE_DEF).unwrap();
        VirtualScreen::new(&def)
    }

    fn initial_command() -> Value {
        json!({
            "command": "initial_vscreen",
            "vlayer": [{
                "appli_name": "nav",
                "VID": 1,
                "virtual_w": 1000, "virtual_h": 1000,
                "vsrc_x": 0, "vsrc_y": 0, "vsrc_w": 1000, "vsrc_h": 1000,
                "vdst_x": 0, "vdst_y": 0, "vdst_w": 1000, "vdst_h": 1000,
                "vsurface": []
            }]
        })
    }

    #[test]
    fn test_new_populates_displays() {
        let screen = sample_screen();
        assert_eq!(screen.virtual_width, 2000);
        assert_eq!(screen.virtual_displays.len(), 2);
        assert_eq!(screen.real_displays.len(), 2);
        assert!(screen.vdisp_vlayers.values().all(Vec::is_empty));
        assert!(screen.vdisp_safety_areas.values().all(|areas| areas.len() == 1));
    }

    #[test]
    fn test_initial_vscreen_replaces_all_layer_lists() {
        let mut screen = sample_screen();
        let acdata = screen.apply(&initial_command()).unwrap();
        assert_eq!(acdata.command, "initial_vscreen");
        assert!(acdata.chg_ids.is_empty());
        for layers in screen.vdisp_vlayers.values() {
            assert_eq!(layers.len(), 1);
            assert_eq!(layers[0].vid, 1);
        }
    }

    #[test]
    fn test_get_vlayer_reads_without_mutating() {
        let mut screen = sample_screen();
        screen.apply(&initial_command()).unwrap();
        let before = screen.snapshot();

        let acdata = screen
            .apply(&json!({ "command": "get_vlayer", "vlayer": [{ "VID": 1 }] }))
            .unwrap();

        // One match per virtual display carrying the layer.
        let found = acdata.vlayers.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|l| l.vid == 1));
        assert_eq!(screen.vdisp_vlayers, before.vdisp_vlayers);
    }

    #[test]
    fn test_unknown_command_is_noop() {
        let mut screen = sample_screen();
        let before = screen.snapshot();
        let acdata = screen.apply(&json!({ "command": "tilt" })).unwrap();
        assert_eq!(acdata.command, "tilt");
        assert!(acdata.chg_ids.is_empty());
        assert_eq!(screen.vdisp_vlayers, before.vdisp_vlayers);
    }

    #[test]
    fn test_apply_does_not_touch_source_snapshot() {
        let mut screen = sample_screen();
        screen.apply(&initial_command()).unwrap();

        // The orchestrator pattern: duplicate, mutate the duplicate.
        let original = screen.snapshot();
        let mut copy = screen.snapshot();
        copy.apply(&json!({
            "command": "initial_vscreen",
            "vlayer": []
        }))
        .unwrap();

        assert_eq!(screen.vdisp_vlayers, original.vdisp_vlayers);
        assert!(copy.vdisp_vlayers.values().all(Vec::is_empty));
    }

    #[test]
    fn test_parse_error_propagates() {
        let mut screen = sample_screen();
        let err = screen
            .apply(&json!({ "command": "initial_vscreen" }))
            .unwrap_err();
        assert!(matches!(err, crate::error::UlaError::Parse(_)));
    }
}
