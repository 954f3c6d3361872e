//! Runtime attribute state and source sampling

use nix::sys::inotify::WatchDescriptor;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use x11rb::protocol::xproto::Window;

use crate::config::{AttributeConfig, Rgb};
use crate::constants::attr;

/// Last observed value of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrState {
    Active,
    Inactive,
    /// Source could not be read
    Unknown,
}

impl AttrState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// A configured attribute bound to its icon window
#[derive(Debug)]
pub struct Attribute {
    pub config: AttributeConfig,
    pub state: AttrState,
    window: Window,
    pub(crate) watch: Option<WatchDescriptor>,
}

impl Attribute {
    pub fn new(config: AttributeConfig, state: AttrState, window: Window) -> Self {
        Self {
            config,
            state,
            window,
            watch: None,
        }
    }

    /// Icon window; fixed for the lifetime of the attribute
    pub fn window(&self) -> Window {
        self.window
    }

    pub fn watch(&self) -> Option<WatchDescriptor> {
        self.watch
    }

    /// Background for the current state; unknown paints like inactive
    pub fn background(&self) -> Rgb {
        if self.state.is_active() {
            self.config.bg_active
        } else {
            self.config.bg_inactive
        }
    }

    /// Whether the label is drawn on top of the background
    pub fn shows_label(&self) -> bool {
        self.state.is_active() && !self.config.label.is_empty()
    }
}

/// Samples a source: leading integer nonzero => active, zero => inactive.
/// Open or read failures, and empty reads, give `Unknown`.
pub fn read_state(path: &Path) -> AttrState {
    let mut buf = [0u8; attr::READ_LEN];
    let read = File::open(path).and_then(|mut file| file.read(&mut buf));
    match read {
        Ok(n) if n > 0 => {
            if parse_leading_int(&buf[..n]) != 0 {
                AttrState::Active
            } else {
                AttrState::Inactive
            }
        }
        _ => AttrState::Unknown,
    }
}

/// `atoi` semantics: skip whitespace, optional sign, then digits; anything
/// unparsable reads as zero
pub fn parse_leading_int(bytes: &[u8]) -> i64 {
    let mut rest = bytes
        .iter()
        .copied()
        .skip_while(u8::is_ascii_whitespace)
        .peekable();

    let negative = match rest.peek() {
        Some(b'-') => {
            rest.next();
            true
        }
        Some(b'+') => {
            rest.next();
            false
        }
        _ => false,
    };

    let magnitude = rest
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));

    if negative { -magnitude } else { magnitude }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int(b"1\n"), 1);
        assert_eq!(parse_leading_int(b"0\n"), 0);
        assert_eq!(parse_leading_int(b"  42abc"), 42);
        assert_eq!(parse_leading_int(b"-3"), -3);
        assert_eq!(parse_leading_int(b"+7"), 7);
        assert_eq!(parse_leading_int(b"abc"), 0);
        assert_eq!(parse_leading_int(b""), 0);
        assert_eq!(parse_leading_int(b"99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_read_state_values() {
        assert_eq!(read_state(source(b"1\n").path()), AttrState::Active);
        assert_eq!(read_state(source(b"0\n").path()), AttrState::Inactive);
        assert_eq!(read_state(source(b"255").path()), AttrState::Active);
        assert_eq!(read_state(source(b"off").path()), AttrState::Inactive);
    }

    #[test]
    fn test_read_state_only_reads_prefix() {
        // Digits past the read window are never seen
        assert_eq!(read_state(source(b"0000000001").path()), AttrState::Inactive);
    }

    #[test]
    fn test_read_state_unreadable() {
        assert_eq!(
            read_state(Path::new("/nonexistent/attr-tray/source")),
            AttrState::Unknown
        );
        assert_eq!(read_state(source(b"").path()), AttrState::Unknown);
    }

    #[test]
    fn test_background_follows_state() {
        let config: AttributeConfig = "/tmp/a:FOO:0x000000:0xFF0000:0x202020".parse().unwrap();
        let mut attribute = Attribute::new(config, AttrState::Active, 1);
        assert_eq!(attribute.background(), Rgb::new(0xFF0000));
        assert!(attribute.shows_label());

        attribute.state = AttrState::Inactive;
        assert_eq!(attribute.background(), Rgb::new(0x202020));
        assert!(!attribute.shows_label());

        attribute.state = AttrState::Unknown;
        assert_eq!(attribute.background(), Rgb::new(0x202020));
        assert!(!attribute.shows_label());
    }
}
