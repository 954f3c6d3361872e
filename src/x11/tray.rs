//! System tray discovery and the XEMBED docking handshake

use anyhow::{Context, Result};
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

use super::AppContext;
use crate::attribute::{AttrState, Attribute};
use crate::config::AttributeConfig;
use crate::constants::x11;

pub struct TrayDocker<'a> {
    ctx: &'a AppContext<'a>,
}

impl<'a> TrayDocker<'a> {
    pub fn new(ctx: &'a AppContext<'a>) -> Self {
        Self { ctx }
    }

    /// Current owner of the tray selection, if a tray is running
    pub fn locate_tray(&self) -> Result<Option<Window>> {
        let owner = self
            .ctx
            .conn
            .get_selection_owner(self.ctx.atoms.net_system_tray_selection)
            .context("Failed to query system tray selection owner")?
            .reply()
            .context("Failed to get reply for system tray selection owner")?
            .owner;
        Ok((owner != x11rb::NONE).then_some(owner))
    }

    /// Creates an icon window for `config`, maps it and asks the tray to
    /// embed it. Without a tray the window stays mapped but undocked.
    pub fn create_and_dock(&self, config: &AttributeConfig) -> Result<Window> {
        let conn = self.ctx.conn;
        let screen = self.ctx.screen;
        let atoms = self.ctx.atoms;

        let window = conn
            .generate_id()
            .context("Failed to generate X11 window ID")?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            0,
            0,
            x11::ICON_SIZE,
            x11::ICON_SIZE,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .background_pixel(screen.black_pixel)
                .border_pixel(screen.black_pixel)
                .event_mask(EventMask::EXPOSURE),
        )
        .context(format!("Failed to create icon window for {}", config.path.display()))?;

        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.xembed_info,
            atoms.xembed_info,
            &[x11::XEMBED_VERSION, x11::XEMBED_FLAGS],
        )
        .context(format!("Failed to set _XEMBED_INFO on window {}", window))?;

        let title = if config.label.is_empty() {
            config.path.display().to_string().into_bytes()
        } else {
            config.label.to_latin1()
        };
        conn.change_property8(
            PropMode::REPLACE,
            window,
            atoms.wm_name,
            AtomEnum::STRING,
            &title,
        )
        .context(format!("Failed to set WM_NAME on window {}", window))?;
        conn.change_property8(
            PropMode::REPLACE,
            window,
            atoms.wm_class,
            AtomEnum::STRING,
            x11::WM_CLASS,
        )
        .context(format!("Failed to set WM_CLASS on window {}", window))?;

        debug!(
            window = window,
            path = %config.path.display(),
            label = config.label.as_str(),
            fg = %config.fg,
            bg_active = %config.bg_active,
            bg_inactive = %config.bg_inactive,
            "Created icon window"
        );

        conn.map_window(window)
            .context(format!("Failed to map icon window {}", window))?;

        self.dock(window)?;
        Ok(window)
    }

    fn dock(&self, window: Window) -> Result<()> {
        let Some(tray) = self.locate_tray()? else {
            debug!(window = window, "No system tray present, icon stays undocked");
            return Ok(());
        };

        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: tray,
            type_: self.ctx.atoms.net_system_tray_opcode,
            data: ClientMessageData::from([
                x11rb::CURRENT_TIME,
                x11::SYSTEM_TRAY_REQUEST_DOCK,
                window,
                0,
                0,
            ]),
        };

        self.ctx
            .conn
            .send_event(false, tray, EventMask::NO_EVENT, event)
            .context(format!(
                "Failed to send SYSTEM_TRAY_REQUEST_DOCK for window {}",
                window
            ))?;
        self.ctx
            .conn
            .flush()
            .context("Failed to flush X11 connection after dock request")?;

        info!(window = window, tray = tray, "Requested tray docking");
        Ok(())
    }
}

/// Builds one attribute per input entry, calling `create` in reverse input
/// order. Trays insert each newly docked icon at the front of their row, so
/// docking the last entry first leaves the row in input order.
///
/// The returned list is in input order.
pub fn create_in_dock_order<F>(
    initial: Vec<(AttributeConfig, AttrState)>,
    mut create: F,
) -> Result<Vec<Attribute>>
where
    F: FnMut(AttributeConfig, AttrState) -> Result<Attribute>,
{
    let mut attributes = Vec::with_capacity(initial.len());
    for (config, state) in initial.into_iter().rev() {
        attributes.push(create(config, state)?);
    }
    attributes.reverse();
    Ok(attributes)
}
