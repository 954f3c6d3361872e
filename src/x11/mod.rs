//! X11 connection state, tray docking and icon painting

mod context;
mod render;
mod tray;

pub use context::{AppContext, CachedAtoms};
pub use render::{IconRenderer, Paint};
pub use tray::{TrayDocker, create_in_dock_order};
