//! Layout-command decoding
//!
//! Turns an incoming JSON layout command into a typed mutation. Every
//! recognized command kind has its own variant; a missing or mistyped
//! required field surfaces as [`UlaError::Parse`] at decode time.
//!
//! Layer and surface records support a partial-update form: when a baseline
//! layer is supplied, absent fields inherit the baseline value instead of
//! failing.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, UlaError};
use crate::vscreen::types::{Coord, VirtualLayer, VirtualSurface};

/// A decoded layout command.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutCommand {
    /// Replace every virtual display's layer list with the given layers.
    InitialVscreen(Vec<VirtualLayer>),

    /// Read-only: return the existing layers whose VID is listed.
    GetVlayer(Vec<i32>),

    /// Recognized shape but no effect.
    Other(String),
}

impl LayoutCommand {
    /// The command-kind string this variant was decoded from.
    pub fn name(&self) -> &str {
        match self {
            Self::InitialVscreen(_) => "initial_vscreen",
            Self::GetVlayer(_) => "get_vlayer",
            Self::Other(name) => name,
        }
    }
}

/// Raw layer record as found in a command. All fields optional so the
/// baseline-inheritance rules can be applied in [`LayerParams::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerParams {
    pub appli_name: Option<String>,

    #[serde(rename = "VID")]
    pub vid: Option<i32>,

    pub coord: Option<String>,
    pub vdisplay_id: Option<i32>,

    pub virtual_w: Option<i32>,
    pub virtual_h: Option<i32>,

    pub vsrc_x: Option<i32>,
    pub vsrc_y: Option<i32>,
    pub vsrc_w: Option<i32>,
    pub vsrc_h: Option<i32>,

    pub vdst_x: Option<i32>,
    pub vdst_y: Option<i32>,
    pub vdst_w: Option<i32>,
    pub vdst_h: Option<i32>,

    pub visibility: Option<i32>,

    pub vsurface: Option<Vec<SurfaceParams>>,
}

/// Raw surface record as found in a command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurfaceParams {
    #[serde(rename = "VID")]
    pub vid: Option<i32>,

    pub pixel_w: Option<i32>,
    pub pixel_h: Option<i32>,

    pub psrc_x: Option<i32>,
    pub psrc_y: Option<i32>,
    pub psrc_w: Option<i32>,
    pub psrc_h: Option<i32>,

    pub vdst_x: Option<i32>,
    pub vdst_y: Option<i32>,
    pub vdst_w: Option<i32>,
    pub vdst_h: Option<i32>,

    pub visibility: Option<i32>,
}

fn required<T: Copy>(field: Option<T>, baseline: Option<T>, name: &str) -> Result<T> {
    field
        .or(baseline)
        .ok_or_else(|| UlaError::parse(format!("required field {} is missing", name)))
}

fn parse_coord(text: &str) -> Result<Coord> {
    match text {
        "global" => Ok(Coord::Global),
        "vdisplay" => Ok(Coord::Vdisplay),
        other => Err(UlaError::parse(format!("unknown coord {:?}", other))),
    }
}

impl SurfaceParams {
    /// Resolve a surface record into a [`VirtualSurface`], attributing it to
    /// the owning layer.
    pub fn resolve(&self, parent_vid: i32, app_name: &str) -> Result<VirtualSurface> {
        let vid = required(self.vid, None, "vsurface.VID")?;
        let pixel_w = required(self.pixel_w, None, "pixel_w")?;
        let pixel_h = required(self.pixel_h, None, "pixel_h")?;
        let psrc_x = required(self.psrc_x, None, "psrc_x")?;
        let psrc_y = required(self.psrc_y, None, "psrc_y")?;
        let psrc_w = required(self.psrc_w, None, "psrc_w")?;
        let psrc_h = required(self.psrc_h, None, "psrc_h")?;
        let vdst_x = required(self.vdst_x, None, "vdst_x")?;
        let vdst_y = required(self.vdst_y, None, "vdst_y")?;
        let vdst_w = required(self.vdst_w, None, "vdst_w")?;
        let vdst_h = required(self.vdst_h, None, "vdst_h")?;

        if pixel_w < 0 || pixel_h < 0 {
            return Err(UlaError::parse("pixel_w and pixel_h must not be negative"));
        }
        if psrc_x < 0 || psrc_y < 0 || psrc_w < 0 || psrc_h < 0 {
            return Err(UlaError::parse("psrc region must not be negative"));
        }
        if vdst_x < 0 || vdst_y < 0 || vdst_w < 0 || vdst_h < 0 {
            return Err(UlaError::parse("vdst region must not be negative"));
        }
        if vdst_w == 0 || vdst_h == 0 {
            return Err(UlaError::parse("vdst_w and vdst_h must be non-zero"));
        }

        Ok(VirtualSurface {
            app_name: app_name.to_string(),
            parent_vid,
            vid,
            pixel_w,
            pixel_h,
            psrc_x,
            psrc_y,
            psrc_w,
            psrc_h,
            vdst_x,
            vdst_y,
            vdst_w,
            vdst_h,
            visibility: self.visibility.unwrap_or(1),
        })
    }
}

impl LayerParams {
    /// Resolve a layer record into a [`VirtualLayer`].
    ///
    /// When `baseline` is given, absent fields inherit from it instead of
    /// failing; this is the partial-update form. `gen_surfaces` controls
    /// whether the `vsurface` list is required and decoded.
    pub fn resolve(
        &self,
        baseline: Option<&VirtualLayer>,
        gen_surfaces: bool,
    ) -> Result<VirtualLayer> {
        let app_name = match &self.appli_name {
            Some(name) => name.clone(),
            None => baseline
                .map(|b| b.app_name.clone())
                .ok_or_else(|| UlaError::parse("required field appli_name is missing"))?,
        };

        let vid = required(self.vid, baseline.map(|b| b.vid), "VID")?;

        let coord = match &self.coord {
            Some(text) => parse_coord(text)?,
            None => baseline.map(|b| b.coord).unwrap_or_default(),
        };

        let vdisplay_id = if coord == Coord::Vdisplay {
            required(self.vdisplay_id, baseline.map(|b| b.vdisplay_id), "vdisplay_id")?
        } else {
            -1
        };

        let virtual_w = required(self.virtual_w, baseline.map(|b| b.virtual_w), "virtual_w")?;
        let virtual_h = required(self.virtual_h, baseline.map(|b| b.virtual_h), "virtual_h")?;
        let vsrc_x = required(self.vsrc_x, baseline.map(|b| b.vsrc_x), "vsrc_x")?;
        let vsrc_y = required(self.vsrc_y, baseline.map(|b| b.vsrc_y), "vsrc_y")?;
        let vsrc_w = required(self.vsrc_w, baseline.map(|b| b.vsrc_w), "vsrc_w")?;
        let vsrc_h = required(self.vsrc_h, baseline.map(|b| b.vsrc_h), "vsrc_h")?;
        let vdst_x = required(self.vdst_x, baseline.map(|b| b.vdst_x), "vdst_x")?;
        let vdst_y = required(self.vdst_y, baseline.map(|b| b.vdst_y), "vdst_y")?;
        let vdst_w = required(self.vdst_w, baseline.map(|b| b.vdst_w), "vdst_w")?;
        let vdst_h = required(self.vdst_h, baseline.map(|b| b.vdst_h), "vdst_h")?;

        if virtual_w < 0 || virtual_h < 0 {
            return Err(UlaError::parse("virtual_w and virtual_h must not be negative"));
        }
        if vsrc_x < 0 || vsrc_y < 0 || vsrc_w < 0 || vsrc_h < 0 {
            return Err(UlaError::parse("vsrc region must not be negative"));
        }
        if vdst_x < 0 || vdst_y < 0 || vdst_w < 0 || vdst_h < 0 {
            return Err(UlaError::parse("vdst region must not be negative"));
        }
        if vdst_w == 0 || vdst_h == 0 {
            return Err(UlaError::parse("vdst_w and vdst_h must be non-zero"));
        }

        let visibility = self
            .visibility
            .or(baseline.map(|b| b.visibility))
            .unwrap_or(1);

        let mut vsurfaces = Vec::new();
        if gen_surfaces {
            let raw = self
                .vsurface
                .as_ref()
                .ok_or_else(|| UlaError::parse("required field vsurface is missing"))?;
            for surface in raw {
                vsurfaces.push(surface.resolve(vid, &app_name)?);
            }
        }

        Ok(VirtualLayer {
            app_name,
            vid,
            coord,
            vdisplay_id,
            virtual_w,
            virtual_h,
            vsrc_x,
            vsrc_y,
            vsrc_w,
            vsrc_h,
            vdst_x,
            vdst_y,
            vdst_w,
            vdst_h,
            visibility,
            vsurfaces,
        })
    }
}

fn layer_array(value: &Value) -> Result<&Vec<Value>> {
    value
        .get("vlayer")
        .and_then(Value::as_array)
        .ok_or_else(|| UlaError::parse("required field vlayer is missing"))
}

/// Decode a layout command from its JSON object form.
pub fn parse_command(value: &Value) -> Result<LayoutCommand> {
    let command = value
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| UlaError::parse("required field command is missing"))?;

    debug!(command, "decoding layout command");

    match command {
        "initial_vscreen" => {
            let mut layers = Vec::new();
            for raw in layer_array(value)? {
                let params: LayerParams = serde_json::from_value(raw.clone())
                    .map_err(|e| UlaError::parse(format!("bad vlayer entry: {}", e)))?;
                layers.push(params.resolve(None, true)?);
            }
            Ok(LayoutCommand::InitialVscreen(layers))
        }
        "get_vlayer" => {
            let mut vids = Vec::new();
            for raw in layer_array(value)? {
                let vid = raw
                    .get("VID")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| UlaError::parse("get_vlayer entry is missing VID"))?;
                vids.push(vid as i32);
            }
            Ok(LayoutCommand::GetVlayer(vids))
        }
        other => Ok(LayoutCommand::Other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer_json() -> Value {
        json!({
            "appli_name": "nav",
            "VID": 1,
            "virtual_w": 1920, "virtual_h": 1080,
            "vsrc_x": 0, "vsrc_y": 0, "vsrc_w": 1920, "vsrc_h": 1080,
            "vdst_x": 0, "vdst_y": 0, "vdst_w": 1920, "vdst_h": 1080,
            "vsurface": [{
                "VID": 10,
                "pixel_w": 640, "pixel_h": 480,
                "psrc_x": 0, "psrc_y": 0, "psrc_w": 640, "psrc_h": 480,
                "vdst_x": 0, "vdst_y": 0, "vdst_w": 1920, "vdst_h": 1080
            }]
        })
    }

    #[test]
    fn test_initial_vscreen_decodes() {
        let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer_json()] });
        let parsed = parse_command(&cmd).unwrap();
        match parsed {
            LayoutCommand::InitialVscreen(layers) => {
                assert_eq!(layers.len(), 1);
                let layer = &layers[0];
                assert_eq!(layer.vid, 1);
                assert_eq!(layer.coord, Coord::Global);
                assert_eq!(layer.visibility, 1);
                assert_eq!(layer.vsurfaces.len(), 1);
                assert_eq!(layer.vsurfaces[0].parent_vid, 1);
                assert_eq!(layer.vsurfaces[0].app_name, "nav");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_field_fails() {
        let mut layer = layer_json();
        layer.as_object_mut().unwrap().remove("vdst_w");
        let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer] });
        assert!(matches!(parse_command(&cmd), Err(UlaError::Parse(_))));
    }

    #[test]
    fn test_non_numeric_field_fails() {
        let mut layer = layer_json();
        layer["virtual_w"] = json!("wide");
        let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer] });
        assert!(matches!(parse_command(&cmd), Err(UlaError::Parse(_))));
    }

    #[test]
    fn test_vdisplay_coord_requires_id() {
        let mut layer = layer_json();
        layer["coord"] = json!("vdisplay");
        let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer.clone()] });
        assert!(matches!(parse_command(&cmd), Err(UlaError::Parse(_))));

        layer["vdisplay_id"] = json!(2);
        let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer] });
        match parse_command(&cmd).unwrap() {
            LayoutCommand::InitialVscreen(layers) => {
                assert_eq!(layers[0].coord, Coord::Vdisplay);
                assert_eq!(layers[0].vdisplay_id, 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_coord_fails() {
        let mut layer = layer_json();
        layer["coord"] = json!("galaxy");
        let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer] });
        assert!(matches!(parse_command(&cmd), Err(UlaError::Parse(_))));
    }

    #[test]
    fn test_negative_geometry_rejected() {
        let mut layer = layer_json();
        layer["vdst_x"] = json!(-5);
        let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer] });
        assert!(matches!(parse_command(&cmd), Err(UlaError::Parse(_))));
    }

    #[test]
    fn test_zero_vdst_rejected() {
        let mut layer = layer_json();
        layer["vdst_w"] = json!(0);
        let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer] });
        assert!(matches!(parse_command(&cmd), Err(UlaError::Parse(_))));
    }

    #[test]
    fn test_baseline_inheritance() {
        let baseline = {
            let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer_json()] });
            match parse_command(&cmd).unwrap() {
                LayoutCommand::InitialVscreen(mut layers) => layers.remove(0),
                _ => unreachable!(),
            }
        };

        // A sparse update carrying only a new destination origin.
        let params: LayerParams =
            serde_json::from_value(json!({ "vdst_x": 100, "vdst_y": 50 })).unwrap();
        let updated = params.resolve(Some(&baseline), false).unwrap();
        assert_eq!(updated.vid, baseline.vid);
        assert_eq!(updated.app_name, "nav");
        assert_eq!(updated.vdst_x, 100);
        assert_eq!(updated.vdst_y, 50);
        assert_eq!(updated.vdst_w, baseline.vdst_w);
        assert_eq!(updated.visibility, baseline.visibility);
    }

    #[test]
    fn test_get_vlayer_decodes() {
        let cmd = json!({ "command": "get_vlayer", "vlayer": [ {"VID": 4}, {"VID": 9} ] });
        assert_eq!(parse_command(&cmd).unwrap(), LayoutCommand::GetVlayer(vec![4, 9]));
    }

    #[test]
    fn test_unrecognized_command_is_noop() {
        let cmd = json!({ "command": "wave_hands" });
        assert_eq!(
            parse_command(&cmd).unwrap(),
            LayoutCommand::Other("wave_hands".to_string())
        );
    }

    #[test]
    fn test_command_round_trip() {
        // Decoding, re-encoding through the typed layer, and decoding again
        // must agree.
        let cmd = json!({ "command": "initial_vscreen", "vlayer": [layer_json()] });
        let first = match parse_command(&cmd).unwrap() {
            LayoutCommand::InitialVscreen(layers) => layers,
            _ => unreachable!(),
        };

        let canonical = json!({ "command": "initial_vscreen", "vlayer": first });
        let second = match parse_command(&canonical).unwrap() {
            LayoutCommand::InitialVscreen(layers) => layers,
            _ => unreachable!(),
        };

        assert_eq!(first, second);
    }
}
