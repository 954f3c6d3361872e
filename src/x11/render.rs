//! Icon painting with a core X11 font

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;

use super::AppContext;
use crate::attribute::Attribute;
use crate::constants::x11;

/// Something that can (re)draw an attribute's icon
pub trait Paint {
    fn paint(&mut self, attribute: &Attribute) -> Result<()>;
}

/// Draws every icon through one graphics context and the `fixed` core font
pub struct IconRenderer<'a> {
    ctx: &'a AppContext<'a>,
    gc: Gcontext,
    font: Font,
}

impl<'a> IconRenderer<'a> {
    pub fn new(ctx: &'a AppContext<'a>) -> Result<Self> {
        let conn = ctx.conn;

        let font = conn.generate_id().context("Failed to generate X11 font ID")?;
        conn.open_font(font, x11::LABEL_FONT)
            .context("Failed to open X11 'fixed' font")?;

        let gc = conn
            .generate_id()
            .context("Failed to generate X11 graphics context ID")?;
        conn.create_gc(gc, ctx.screen.root, &CreateGCAux::new().font(font))
            .context("Failed to create icon graphics context")?;

        Ok(Self { ctx, gc, font })
    }

    /// Fills the icon with the state's background and, when active, draws
    /// the label. Returns after the server has processed the requests.
    pub fn draw(&self, attribute: &Attribute) -> Result<()> {
        let conn = self.ctx.conn;
        let window = attribute.window();
        let background = attribute.background().pixel();

        conn.change_gc(self.gc, &ChangeGCAux::new().foreground(background))
            .context("Failed to set icon background color")?;
        conn.poly_fill_rectangle(
            window,
            self.gc,
            &[Rectangle {
                x: 0,
                y: 0,
                width: x11::ICON_SIZE,
                height: x11::ICON_SIZE,
            }],
        )
        .context(format!("Failed to fill icon window {}", window))?;

        if attribute.shows_label() {
            conn.change_gc(
                self.gc,
                &ChangeGCAux::new()
                    .foreground(attribute.config.fg.pixel())
                    .background(background),
            )
            .context("Failed to set icon label color")?;
            conn.image_text8(
                window,
                self.gc,
                x11::LABEL_X,
                x11::LABEL_Y,
                &attribute.config.label.to_latin1(),
            )
            .context(format!("Failed to draw label on icon window {}", window))?;
        }

        // GetInputFocus round trip, the XSync equivalent
        conn.get_input_focus()
            .context("Failed to sync X11 connection after drawing")?
            .reply()
            .context("Failed to get sync reply after drawing")?;

        tracing::trace!(window = window, state = ?attribute.state, "Painted icon");
        Ok(())
    }

    /// Releases the graphics context and font
    pub fn release(self) -> Result<()> {
        let conn = self.ctx.conn;
        conn.free_gc(self.gc)
            .context("Failed to free icon graphics context")?;
        conn.close_font(self.font)
            .context("Failed to close label font")?;
        conn.flush()
            .context("Failed to flush X11 connection after releasing renderer")?;
        Ok(())
    }
}

impl Paint for IconRenderer<'_> {
    fn paint(&mut self, attribute: &Attribute) -> Result<()> {
        self.draw(attribute)
    }
}
