//! Application context and cached X11 state

use anyhow::{Context, Result};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::constants::x11;

/// Application context holding immutable shared state
pub struct AppContext<'a> {
    pub conn: &'a RustConnection,
    pub screen: &'a Screen,
    pub screen_num: usize,
    pub atoms: &'a CachedAtoms,
}

/// Pre-cached X11 atoms to avoid repeated roundtrips
#[derive(Debug)]
pub struct CachedAtoms {
    pub xembed_info: Atom,
    pub net_system_tray_opcode: Atom,
    /// `_NET_SYSTEM_TRAY_S<n>` for the screen we were started on
    pub net_system_tray_selection: Atom,
    pub wm_name: Atom,
    pub wm_class: Atom,
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection, screen_num: usize) -> Result<Self> {
        Ok(Self {
            xembed_info: intern(conn, b"_XEMBED_INFO")?,
            net_system_tray_opcode: intern(conn, b"_NET_SYSTEM_TRAY_OPCODE")?,
            net_system_tray_selection: intern(conn, tray_selection_name(screen_num).as_bytes())?,
            wm_name: AtomEnum::WM_NAME.into(),
            wm_class: AtomEnum::WM_CLASS.into(),
        })
    }
}

fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom> {
    let printable = String::from_utf8_lossy(name);
    Ok(conn
        .intern_atom(false, name)
        .with_context(|| format!("Failed to intern {printable} atom"))?
        .reply()
        .with_context(|| format!("Failed to get reply for {printable} atom"))?
        .atom)
}

/// Selection owned by the system tray manager of a screen
pub fn tray_selection_name(screen_num: usize) -> String {
    format!("{}{}", x11::TRAY_SELECTION_PREFIX, screen_num)
}
