//! ula-tools - distributed window-layout coordination
//!
//! Coordination core for clustered HMI display setups: several nodes, each
//! driving one or more physical panels through a local compositor, render a
//! single logical "virtual screen" spanning all panels.
//!
//! # Architecture
//!
//! ```text
//! layout command ──► client (snapshot + apply)
//!                        │ per-node geometry conversion
//!                        ▼
//!                  multi-connector ──► node agent ──► compositor plugin
//!                    (TCP fan-out)      (diff)          (IVI / RVGPU)
//! ```
//!
//! The client applies each command to a fresh snapshot of the virtual
//! screen, projects the result into every target node's per-display pixel
//! geometry, and fans the serialized payloads out over persistent framed
//! TCP sessions. Each node agent diffs the new pixel state against the
//! previous one and pushes local commands to its compositor. Per-node
//! results are OR-merged into a single outcome.
//!
//! # Modules
//!
//! - [`config`] - screen-definition file (virtual canvas, displays, nodes)
//! - [`vscreen`] - logical screen state and the layout-command parser
//! - [`pixel`] - pixel-space entities and the client→node wire payload
//! - [`convert`] - virtual-to-real geometry conversion (clip + scale)
//! - [`node`] - node agent: server, command processor, compositor plugins
//! - [`connector`] - client-side multi-node fan-out
//! - [`layout`] - per-app initial layouts and the z-order merge
//! - [`client`] - client orchestration over the connector
//! - [`protocol`] - length-prefixed framing shared by every socket

pub mod client;
pub mod config;
pub mod connector;
pub mod convert;
pub mod error;
pub mod layout;
pub mod node;
pub mod pixel;
pub mod protocol;
pub mod utils;
pub mod vscreen;

pub use error::{Result, UlaError};
