//! Protocol numbers, sizes and defaults shared across modules

pub mod x11 {
    /// Edge length of a tray icon in pixels (the host tray's slot size)
    pub const ICON_SIZE: u16 = 24;

    /// Label baseline position inside the icon
    pub const LABEL_X: i16 = 3;
    pub const LABEL_Y: i16 = ICON_SIZE as i16 - 8;

    /// Core font used for labels
    pub const LABEL_FONT: &[u8] = b"fixed";

    /// Prefix of the per-screen tray selection, completed with the screen number
    pub const TRAY_SELECTION_PREFIX: &str = "_NET_SYSTEM_TRAY_S";

    /// `_NET_SYSTEM_TRAY_OPCODE` request: dock the window in data[2]
    pub const SYSTEM_TRAY_REQUEST_DOCK: u32 = 0;

    /// `_XEMBED_INFO` contents: protocol version, flags
    pub const XEMBED_VERSION: u32 = 0;
    pub const XEMBED_FLAGS: u32 = 0;

    pub const WM_CLASS: &[u8] = b"attr-tray\0attr-tray\0";
}

pub mod attr {
    /// Labels longer than this are cut, not rejected
    pub const MAX_LABEL_CHARS: usize = 7;

    /// Bytes read from a source per sample; enough for "0\n" / "1\n" and a sign
    pub const READ_LEN: usize = 7;

    pub const DEFAULT_FG: u32 = 0x000000;
    pub const DEFAULT_BG_ACTIVE: u32 = 0xFFFFFF;
    pub const DEFAULT_BG_INACTIVE: u32 = 0x303030;

    /// Largest value accepted for a color field
    pub const MAX_COLOR: u32 = 0xFF_FFFF;
}
