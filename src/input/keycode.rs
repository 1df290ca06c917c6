//! Physical key identifiers shared by keyboards and mice.
//!
//! Keyboard virtual-key codes and the five mouse buttons live in one 8-bit
//! namespace. `0xFF` is never produced by a device and marks "unbound".

use std::fmt;

/// 8-bit physical key or mouse-button code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u8);

impl KeyCode {
    pub const UNBOUND: KeyCode = KeyCode(0xFF);

    pub const MOUSE_LEFT: KeyCode = KeyCode(0x01);
    pub const MOUSE_RIGHT: KeyCode = KeyCode(0x02);
    pub const MOUSE_MIDDLE: KeyCode = KeyCode(0x04);
    pub const MOUSE_X1: KeyCode = KeyCode(0x05);
    pub const MOUSE_X2: KeyCode = KeyCode(0x06);

    pub const SHIFT: KeyCode = KeyCode(0x10);
    pub const CONTROL: KeyCode = KeyCode(0x11);
    pub const MENU: KeyCode = KeyCode(0x12);
    pub const LSHIFT: KeyCode = KeyCode(0xA0);
    pub const RSHIFT: KeyCode = KeyCode(0xA1);
    pub const LCONTROL: KeyCode = KeyCode(0xA2);
    pub const RCONTROL: KeyCode = KeyCode(0xA3);
    pub const LMENU: KeyCode = KeyCode(0xA4);
    pub const RMENU: KeyCode = KeyCode(0xA5);

    pub fn is_bound(self) -> bool {
        self != Self::UNBOUND
    }

    /// Mouse buttons are routed through the mouse channel filter.
    pub fn is_mouse_button(self) -> bool {
        matches!(
            self,
            Self::MOUSE_LEFT | Self::MOUSE_RIGHT | Self::MOUSE_MIDDLE | Self::MOUSE_X1 | Self::MOUSE_X2
        )
    }

    /// Resolves a user-facing key name (case-insensitive, symbol aliases accepted).
    pub fn from_name(name: &str) -> Option<KeyCode> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }

        // Single printable characters: digits, letters and punctuation aliases.
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_digit() || c.is_ascii_alphabetic() {
                return Some(KeyCode(c.to_ascii_uppercase() as u8));
            }
            if let Some(&(_, code)) = SYMBOL_ALIASES.iter().find(|(sym, _)| *sym == c) {
                return Some(KeyCode(code));
            }
        }

        if let Some(n) = parse_function_key(trimmed) {
            return Some(KeyCode(0x6F + n));
        }

        if let Some(digit) = trimmed
            .strip_prefix("Numpad")
            .or_else(|| trimmed.strip_prefix("numpad"))
            .and_then(|rest| rest.parse::<u8>().ok())
            .filter(|d| *d <= 9)
        {
            return Some(KeyCode(0x60 + digit));
        }

        KEY_NAMES
            .iter()
            .find(|(key_name, _)| key_name.eq_ignore_ascii_case(trimmed))
            .map(|&(_, code)| KeyCode(code))
    }

    /// Canonical name, or `None` for codes without one.
    pub fn name(self) -> Option<String> {
        let code = self.0;
        match code {
            0x30..=0x39 | 0x41..=0x5A => Some((code as char).to_string()),
            0x60..=0x69 => Some(format!("Numpad{}", code - 0x60)),
            0x70..=0x87 => Some(format!("F{}", code - 0x6F)),
            _ => KEY_NAMES
                .iter()
                .find(|(_, c)| *c == code)
                .map(|(n, _)| (*n).to_string()),
        }
    }
}

impl Default for KeyCode {
    fn default() -> Self {
        Self::UNBOUND
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None if !self.is_bound() => write!(f, "<unbound>"),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

fn parse_function_key(name: &str) -> Option<u8> {
    let rest = name.strip_prefix('F').or_else(|| name.strip_prefix('f'))?;
    let n = rest.parse::<u8>().ok()?;
    (1..=24).contains(&n).then_some(n)
}

const SYMBOL_ALIASES: &[(char, u8)] = &[
    (';', 0xBA),
    ('=', 0xBB),
    (',', 0xBC),
    ('-', 0xBD),
    ('.', 0xBE),
    ('/', 0xBF),
    ('`', 0xC0),
    ('[', 0xDB),
    ('\\', 0xDC),
    (']', 0xDD),
    ('\'', 0xDE),
];

const KEY_NAMES: &[(&str, u8)] = &[
    ("MouseLeft", 0x01),
    ("MouseRight", 0x02),
    ("MouseMiddle", 0x04),
    ("MouseX1", 0x05),
    ("MouseX2", 0x06),
    ("Backspace", 0x08),
    ("Tab", 0x09),
    ("Enter", 0x0D),
    ("Escape", 0x1B),
    ("Space", 0x20),
    ("PageUp", 0x21),
    ("PageDown", 0x22),
    ("End", 0x23),
    ("Home", 0x24),
    ("LeftArrow", 0x25),
    ("UpArrow", 0x26),
    ("RightArrow", 0x27),
    ("DownArrow", 0x28),
    ("Insert", 0x2D),
    ("Delete", 0x2E),
    ("LWin", 0x5B),
    ("RWin", 0x5C),
    ("Apps", 0x5D),
    ("NumpadMultiply", 0x6A),
    ("NumpadAdd", 0x6B),
    ("Separator", 0x6C),
    ("NumpadSubtract", 0x6D),
    ("NumpadDecimal", 0x6E),
    ("NumpadDivide", 0x6F),
    ("LShift", 0xA0),
    ("RShift", 0xA1),
    ("LCtrl", 0xA2),
    ("RCtrl", 0xA3),
    ("LAlt", 0xA4),
    ("RAlt", 0xA5),
    ("Semicolon", 0xBA),
    ("Equals", 0xBB),
    ("Comma", 0xBC),
    ("Minus", 0xBD),
    ("Period", 0xBE),
    ("ForwardSlash", 0xBF),
    ("Grave", 0xC0),
    ("LeftBracket", 0xDB),
    ("BackSlash", 0xDC),
    ("RightBracket", 0xDD),
    ("Quote", 0xDE),
];
