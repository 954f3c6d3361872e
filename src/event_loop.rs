//! Single-threaded dispatch over the X11 connection and the inotify stream
//!
//! The loop blocks in `poll(2)` on both descriptors. X11 events are always
//! drained before inotify records from the same wake-up.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::inotify::WatchDescriptor;
use std::collections::HashMap;
use std::os::fd::AsFd;
use tracing::{debug, error, info, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::*;

use crate::attribute::Attribute;
use crate::watcher::{AttributeWatcher, refresh};
use crate::x11::{AppContext, IconRenderer, Paint};

/// Readiness flags that mean "go and read"; errors surface on the read
const READY: PollFlags = PollFlags::POLLIN
    .union(PollFlags::POLLHUP)
    .union(PollFlags::POLLERR);

/// Owns every attribute together with the watcher and painter acting on them
pub struct Dispatcher<P: Paint> {
    attributes: Vec<Attribute>,
    by_window: HashMap<Window, usize>,
    by_watch: HashMap<WatchDescriptor, usize>,
    watcher: AttributeWatcher,
    painter: P,
}

impl<P: Paint> Dispatcher<P> {
    /// Registers a watch for every attribute and indexes them by handle
    pub fn new(mut attributes: Vec<Attribute>, watcher: AttributeWatcher, painter: P) -> Self {
        let mut by_window = HashMap::with_capacity(attributes.len());
        let mut by_watch = HashMap::with_capacity(attributes.len());

        for (index, attribute) in attributes.iter_mut().enumerate() {
            by_window.insert(attribute.window(), index);
            watcher.register_watch(attribute);
            if let Some(wd) = attribute.watch() {
                by_watch.insert(wd, index);
            }
        }

        Self {
            attributes,
            by_window,
            by_watch,
            watcher,
            painter,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn watcher(&self) -> &AttributeWatcher {
        &self.watcher
    }

    #[cfg(test)]
    pub fn painter(&self) -> &P {
        &self.painter
    }

    /// Repaints on Expose; everything else is ignored
    pub fn handle_x_event(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Expose(expose) => {
                let Some(&index) = self.by_window.get(&expose.window) else {
                    return Ok(());
                };
                trace!(window = expose.window, "Expose");
                self.painter.paint(&self.attributes[index])
            }
            Event::Error(err) => {
                warn!(error = ?err, "X11 protocol error");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Applies a change record: re-read the source and repaint only when the
    /// value actually changed
    pub fn handle_change(&mut self, wd: WatchDescriptor) -> Result<()> {
        let Some(&index) = self.by_watch.get(&wd) else {
            return Ok(());
        };
        let attribute = &mut self.attributes[index];
        if refresh(attribute) {
            debug!(
                path = %attribute.config.path.display(),
                state = ?attribute.state,
                "Attribute changed"
            );
            self.painter.paint(attribute)?;
        }
        Ok(())
    }

    /// Reads one batch from the notification stream and dispatches each record
    pub fn handle_notifications(&mut self) -> Result<()> {
        for event in self.watcher.read_batch()? {
            self.handle_change(event.wd)?;
        }
        Ok(())
    }

    fn into_parts(self) -> (Vec<Attribute>, AttributeWatcher, P) {
        (self.attributes, self.watcher, self.painter)
    }
}

/// The process main loop
pub struct EventLoop<'a> {
    ctx: &'a AppContext<'a>,
    dispatcher: Dispatcher<IconRenderer<'a>>,
}

impl<'a> EventLoop<'a> {
    pub fn new(ctx: &'a AppContext<'a>, dispatcher: Dispatcher<IconRenderer<'a>>) -> Self {
        Self { ctx, dispatcher }
    }

    /// Runs until the readiness wait fails. A failed wait is logged and
    /// returns `Ok`; losing the X11 connection or the inotify stream while
    /// dispatching returns the error.
    pub fn run(&mut self) -> Result<()> {
        info!(
            attributes = self.dispatcher.attributes().len(),
            "Entering event loop"
        );

        loop {
            // Replies read while painting can leave events queued client-side
            self.drain_x_events()?;

            let (x_ready, notify_ready) = match self.wait() {
                Ok(ready) => ready,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    error!(error = %errno, "Waiting for events failed, stopping");
                    return Ok(());
                }
            };

            if x_ready {
                self.drain_x_events()?;
            }
            if notify_ready {
                self.dispatcher.handle_notifications()?;
            }
        }
    }

    /// Blocks until the X11 socket or the inotify fd is readable
    fn wait(&self) -> Result<(bool, bool), Errno> {
        if let Err(e) = self.ctx.conn.flush() {
            // Surfaces again as a read error on the socket
            debug!(error = %e, "Flush before wait failed");
        }

        let mut fds = [
            PollFd::new(self.ctx.conn.stream().as_fd(), PollFlags::POLLIN),
            PollFd::new(self.dispatcher.watcher().as_fd(), PollFlags::POLLIN),
        ];
        poll(&mut fds, PollTimeout::NONE)?;

        let ready = |fd: &PollFd| fd.revents().is_some_and(|r| r.intersects(READY));
        Ok((ready(&fds[0]), ready(&fds[1])))
    }

    fn drain_x_events(&mut self) -> Result<()> {
        while let Some(event) = self
            .ctx
            .conn
            .poll_for_event()
            .context("Lost connection to the X server")?
        {
            self.dispatcher.handle_x_event(&event)?;
        }
        Ok(())
    }

    /// Removes all watches, destroys the icon windows and releases drawing
    /// resources. `run` has no shutdown transition, so `main` never gets here;
    /// process exit reclaims everything instead.
    #[allow(dead_code)]
    pub fn shutdown(self) -> Result<()> {
        let conn = self.ctx.conn;
        let (mut attributes, watcher, renderer) = self.dispatcher.into_parts();

        for attribute in attributes.iter_mut() {
            watcher.unwatch(attribute);
            conn.destroy_window(attribute.window())
                .context(format!("Failed to destroy icon window {}", attribute.window()))?;
        }
        renderer.release()?;

        info!("Released all tray icons");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttrState, read_state};
    use crate::config::AttributeConfig;
    use std::fs;
    use std::path::{Path, PathBuf};

    /// Records (window, state) for every paint
    #[derive(Default)]
    struct RecordingPainter {
        painted: Vec<(Window, AttrState)>,
    }

    impl Paint for RecordingPainter {
        fn paint(&mut self, attribute: &Attribute) -> Result<()> {
            self.painted.push((attribute.window(), attribute.state));
            Ok(())
        }
    }

    fn attribute(path: &Path, window: Window) -> Attribute {
        let config: AttributeConfig = format!("{}:LBL:0x000000:0xFF0000:0x202020", path.display())
            .parse()
            .unwrap();
        let state = read_state(&config.path);
        Attribute::new(config, state, window)
    }

    fn dispatcher(attributes: Vec<Attribute>) -> Dispatcher<RecordingPainter> {
        Dispatcher::new(
            attributes,
            AttributeWatcher::new().unwrap(),
            RecordingPainter::default(),
        )
    }

    fn source(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn expose(window: Window) -> Event {
        Event::Expose(ExposeEvent {
            response_type: EXPOSE_EVENT,
            sequence: 0,
            window,
            x: 0,
            y: 0,
            width: 24,
            height: 24,
            count: 0,
        })
    }

    #[test]
    fn test_expose_repaints_owning_icon() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a", "1");
        let b = source(&dir, "b", "0");
        let mut dispatcher = dispatcher(vec![attribute(&a, 10), attribute(&b, 20)]);

        dispatcher.handle_x_event(&expose(20)).unwrap();
        dispatcher.handle_x_event(&expose(10)).unwrap();
        dispatcher.handle_x_event(&expose(99)).unwrap();

        assert_eq!(
            dispatcher.painter().painted,
            [(20, AttrState::Inactive), (10, AttrState::Active)]
        );
    }

    #[test]
    fn test_non_expose_events_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a", "1");
        let mut dispatcher = dispatcher(vec![attribute(&a, 10)]);

        let map = Event::MapNotify(MapNotifyEvent {
            response_type: MAP_NOTIFY_EVENT,
            sequence: 0,
            event: 10,
            window: 10,
            override_redirect: false,
        });
        dispatcher.handle_x_event(&map).unwrap();

        assert!(dispatcher.painter().painted.is_empty());
    }

    #[test]
    fn test_each_transition_redraws_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a", "0");
        let mut dispatcher = dispatcher(vec![attribute(&a, 10)]);

        fs::write(&a, "1").unwrap();
        dispatcher.handle_notifications().unwrap();
        fs::write(&a, "0").unwrap();
        dispatcher.handle_notifications().unwrap();

        assert_eq!(
            dispatcher.painter().painted,
            [(10, AttrState::Active), (10, AttrState::Inactive)]
        );
        assert_eq!(dispatcher.attributes()[0].state, AttrState::Inactive);
    }

    #[test]
    fn test_unchanged_value_never_redraws() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a", "1");
        let mut dispatcher = dispatcher(vec![attribute(&a, 10)]);

        for _ in 0..3 {
            fs::write(&a, "1\n").unwrap();
            dispatcher.handle_notifications().unwrap();
        }

        assert!(dispatcher.painter().painted.is_empty());
        assert_eq!(dispatcher.attributes()[0].state, AttrState::Active);
    }

    #[test]
    fn test_unreadable_source_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a", "1");
        let mut dispatcher = dispatcher(vec![attribute(&a, 10)]);

        // Unlinking raises IN_ATTRIB on the watched inode; the re-read fails
        fs::remove_file(&a).unwrap();
        dispatcher.handle_notifications().unwrap();

        assert!(dispatcher.painter().painted.is_empty());
        assert_eq!(dispatcher.attributes()[0].state, AttrState::Active);
    }

    #[test]
    fn test_changes_routed_to_owning_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a", "0");
        let b = source(&dir, "b", "0");
        let mut dispatcher = dispatcher(vec![attribute(&a, 10), attribute(&b, 20)]);

        fs::write(&b, "1").unwrap();
        dispatcher.handle_notifications().unwrap();

        assert_eq!(dispatcher.painter().painted, [(20, AttrState::Active)]);
        assert_eq!(dispatcher.attributes()[0].state, AttrState::Inactive);
        assert_eq!(dispatcher.attributes()[1].state, AttrState::Active);
    }

    #[test]
    fn test_missing_source_is_static() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let mut dispatcher = dispatcher(vec![attribute(&missing, 10)]);

        assert_eq!(dispatcher.attributes()[0].state, AttrState::Unknown);
        assert_eq!(dispatcher.attributes()[0].watch(), None);

        // Appearing later is not noticed: there is no watch to report it
        fs::write(&missing, "1").unwrap();
        dispatcher.handle_notifications().unwrap();
        assert!(dispatcher.painter().painted.is_empty());

        // Still repaints on exposure, as an inactive icon
        dispatcher.handle_x_event(&expose(10)).unwrap();
        assert_eq!(dispatcher.painter().painted, [(10, AttrState::Unknown)]);
        assert_eq!(
            dispatcher.attributes()[0].background(),
            dispatcher.attributes()[0].config.bg_inactive
        );
    }

    #[test]
    fn test_no_pending_records_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a", "1");
        let mut dispatcher = dispatcher(vec![attribute(&a, 10)]);

        dispatcher.handle_notifications().unwrap();
        assert!(dispatcher.painter().painted.is_empty());
    }
}
