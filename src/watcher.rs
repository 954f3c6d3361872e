//! inotify-backed change notification for attribute sources

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, InotifyEvent, WatchDescriptor};
use std::os::fd::{AsFd, BorrowedFd};
use tracing::{debug, warn};

use crate::attribute::{AttrState, Attribute, read_state};
use crate::config::AttributeConfig;

/// Events that can change the value read from a source
const WATCH_MASK: AddWatchFlags = AddWatchFlags::IN_MODIFY
    .union(AddWatchFlags::IN_ATTRIB)
    .union(AddWatchFlags::IN_CLOSE_WRITE);

/// Owns the inotify instance shared by all attributes
pub struct AttributeWatcher {
    inotify: Inotify,
}

impl AttributeWatcher {
    pub fn new() -> Result<Self> {
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)
            .context("Failed to initialize inotify")?;
        Ok(Self { inotify })
    }

    /// Registers the attribute's source. A failure only costs that attribute
    /// its live updates; the icon keeps its last read state.
    pub fn register_watch(&self, attribute: &mut Attribute) -> Option<WatchDescriptor> {
        let path = attribute.config.path.as_path();
        match self.inotify.add_watch(path, WATCH_MASK) {
            Ok(wd) => {
                debug!(path = %path.display(), ?wd, "Watching attribute source");
                attribute.watch = Some(wd);
            }
            Err(errno) => {
                warn!(
                    path = %path.display(),
                    error = %errno,
                    "Cannot watch attribute source, icon will not update"
                );
                attribute.watch = None;
            }
        }
        attribute.watch
    }

    /// Reads one batch of pending records. Empty when nothing is queued.
    pub fn read_batch(&self) -> Result<Vec<InotifyEvent>> {
        match self.inotify.read_events() {
            Ok(events) => Ok(events),
            Err(Errno::EAGAIN | Errno::EINTR) => Ok(Vec::new()),
            Err(errno) => Err(errno).context("Failed to read inotify events"),
        }
    }

    /// Drops the attribute's watch, if any
    pub fn unwatch(&self, attribute: &mut Attribute) {
        if let Some(wd) = attribute.watch.take()
            && let Err(errno) = self.inotify.rm_watch(wd)
        {
            // The kernel drops watches on its own when the source disappears
            debug!(path = %attribute.config.path.display(), error = %errno, "rm_watch failed");
        }
    }
}

impl AsFd for AttributeWatcher {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inotify.as_fd()
    }
}

/// Initial sample of every configured source, in input order
pub fn resolve_states(configs: Vec<AttributeConfig>) -> Vec<(AttributeConfig, AttrState)> {
    configs
        .into_iter()
        .map(|config| {
            let state = read_state(&config.path);
            debug!(path = %config.path.display(), ?state, "Initial attribute state");
            (config, state)
        })
        .collect()
}

/// Re-reads the source after a change notification.
///
/// Returns true when the cached state changed and the icon needs a redraw.
/// An unreadable source keeps the previous state.
pub fn refresh(attribute: &mut Attribute) -> bool {
    let observed = read_state(&attribute.config.path);
    if !observed.is_known() || observed == attribute.state {
        return false;
    }
    attribute.state = observed;
    true
}
