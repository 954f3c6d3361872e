//! Attribute descriptors as given on the command line
//!
//! Each positional argument has the form `PATH:LABEL:FG:BG_ACTIVE:BG_INACTIVE`.
//! Only `PATH` is required; empty or missing colors fall back to defaults.

use anyhow::{Context, Result, bail};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::attr;

/// A 24-bit `0xRRGGBB` color, used directly as an X11 pixel value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(u32);

impl Rgb {
    pub const fn new(value: u32) -> Self {
        Self(value & attr::MAX_COLOR)
    }

    pub fn pixel(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

/// Display label, at most [`attr::MAX_LABEL_CHARS`] characters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Label(String);

impl Label {
    /// Builds a label, silently dropping characters past the limit
    pub fn new(text: &str) -> Self {
        Self(text.chars().take(attr::MAX_LABEL_CHARS).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bytes for an 8-bit core font; characters outside Latin-1 become `?`
    pub fn to_latin1(&self) -> Vec<u8> {
        self.0
            .chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect()
    }
}

/// One tracked attribute as configured by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeConfig {
    pub path: PathBuf,
    pub label: Label,
    pub fg: Rgb,
    pub bg_active: Rgb,
    pub bg_inactive: Rgb,
}

impl FromStr for AttributeConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut fields = s.split(':');

        let path = fields.next().unwrap_or_default();
        if path.is_empty() {
            bail!("missing PATH in '{s}' (expected PATH:LABEL:FG:BG_ACTIVE:BG_INACTIVE)");
        }
        let label = Label::new(fields.next().unwrap_or_default());

        let fg = color_field(fields.next(), "FG", attr::DEFAULT_FG)?;
        let bg_active = color_field(fields.next(), "BG_ACTIVE", attr::DEFAULT_BG_ACTIVE)?;
        let bg_inactive = color_field(fields.next(), "BG_INACTIVE", attr::DEFAULT_BG_INACTIVE)?;

        Ok(Self {
            path: PathBuf::from(path),
            label,
            fg,
            bg_active,
            bg_inactive,
        })
    }
}

fn color_field(field: Option<&str>, name: &str, default: u32) -> Result<Rgb> {
    match field {
        None | Some("") => Ok(Rgb::new(default)),
        Some(text) => parse_color(text).with_context(|| format!("invalid {name} color '{text}'")),
    }
}

/// Parses an integer literal with C `strtoul(s, NULL, 0)` base rules:
/// `0x`/`0X` for hex, a leading `0` for octal, decimal otherwise
pub fn parse_color(text: &str) -> Result<Rgb> {
    let text = text.trim();
    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        bail!("not an integer literal");
    }
    let value = u32::from_str_radix(digits, radix).context("not an integer literal")?;
    if value > attr::MAX_COLOR {
        bail!("{value:#x} exceeds 0xFFFFFF");
    }
    Ok(Rgb::new(value))
}
