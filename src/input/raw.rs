//! Raw input packets and their normalization into engine events
//!
//! Keyboard packets carry Windows virtual-key codes with the generic
//! Shift/Ctrl/Alt codes; they are split into left/right variants and
//! auto-repeat is dropped. Mouse packets carry button transition flags and a
//! relative delta.

use super::keycode::KeyCode;
use crate::controller::virtual_pad::DeviceHandle;
use tracing::{trace, warn};

/// `RI_KEY_BREAK`: key released
pub const KEY_BREAK: u16 = 0x01;
/// `RI_KEY_E0`: extended scan code prefix
pub const KEY_E0: u16 = 0x02;

const RSHIFT_MAKE_CODE: u16 = 0x36;

/// `MOUSE_MOVE_ABSOLUTE`
pub const MOUSE_MOVE_ABSOLUTE: u16 = 0x01;

/// `(down flag, up flag, key)` in decoding order
const MOUSE_BUTTON_FLAGS: [(u16, u16, KeyCode); 5] = [
    (0x0001, 0x0002, KeyCode::MOUSE_LEFT),
    (0x0004, 0x0008, KeyCode::MOUSE_RIGHT),
    (0x0010, 0x0020, KeyCode::MOUSE_MIDDLE),
    (0x0040, 0x0080, KeyCode::MOUSE_X1),
    (0x0100, 0x0200, KeyCode::MOUSE_X2),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawKeyboard {
    pub device: DeviceHandle,
    pub vkey: u16,
    pub make_code: u16,
    pub flags: u16,
}

impl RawKeyboard {
    /// Convenience constructor for an already resolved key.
    pub fn key(device: DeviceHandle, key: KeyCode, pressed: bool) -> Self {
        Self {
            device,
            vkey: key.0 as u16,
            make_code: 0,
            flags: if pressed { 0 } else { KEY_BREAK },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawMouse {
    pub device: DeviceHandle,
    pub flags: u16,
    pub button_flags: u16,
    pub last_x: i32,
    pub last_y: i32,
}

/// Normalized engine input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key {
        device: DeviceHandle,
        key: KeyCode,
        pressed: bool,
    },
    Move {
        device: DeviceHandle,
        dx: i32,
        dy: i32,
    },
}

/// Turns raw packets into [`InputEvent`]s, tracking held keys.
#[derive(Debug, Default)]
pub struct InputNormalizer {
    held: [u64; 4],
    absolute_warned: bool,
}

impl InputNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyboard(&mut self, raw: &RawKeyboard) -> Option<InputEvent> {
        // 0xFF marks fake keys inside multi-packet sequences
        if raw.vkey >= 0xFF {
            trace!("Ignoring raw key {:#x}", raw.vkey);
            return None;
        }

        let key = match KeyCode(raw.vkey as u8) {
            KeyCode::SHIFT if raw.make_code == RSHIFT_MAKE_CODE => KeyCode::RSHIFT,
            KeyCode::SHIFT => KeyCode::LSHIFT,
            KeyCode::CONTROL if raw.flags & KEY_E0 != 0 => KeyCode::RCONTROL,
            KeyCode::CONTROL => KeyCode::LCONTROL,
            KeyCode::MENU if raw.flags & KEY_E0 != 0 => KeyCode::RMENU,
            KeyCode::MENU => KeyCode::LMENU,
            other => other,
        };
        let pressed = raw.flags & KEY_BREAK == 0;

        if self.is_held(key) == pressed {
            return None;
        }
        self.set_held(key, pressed);
        Some(InputEvent::Key {
            device: raw.device,
            key,
            pressed,
        })
    }

    /// Button transitions in flag order, followed by the motion if relative.
    pub fn mouse(&mut self, raw: &RawMouse) -> Vec<InputEvent> {
        let mut events = Vec::new();
        for (down, up, key) in MOUSE_BUTTON_FLAGS {
            if raw.button_flags & down != 0 {
                self.set_held(key, true);
                events.push(InputEvent::Key {
                    device: raw.device,
                    key,
                    pressed: true,
                });
            }
            if raw.button_flags & up != 0 {
                self.set_held(key, false);
                events.push(InputEvent::Key {
                    device: raw.device,
                    key,
                    pressed: false,
                });
            }
        }

        if raw.flags & MOUSE_MOVE_ABSOLUTE != 0 {
            if !self.absolute_warned {
                warn!(
                    "Ignoring absolute mouse input from {}, only relative devices are supported",
                    raw.device
                );
                self.absolute_warned = true;
            }
        } else if raw.last_x != 0 || raw.last_y != 0 {
            events.push(InputEvent::Move {
                device: raw.device,
                dx: raw.last_x,
                dy: raw.last_y,
            });
        }
        events
    }

    fn is_held(&self, key: KeyCode) -> bool {
        let index = key.0 as usize;
        self.held[index / 64] & (1u64 << (index % 64)) != 0
    }

    fn set_held(&mut self, key: KeyCode, held: bool) {
        let index = key.0 as usize;
        let bit = 1u64 << (index % 64);
        if held {
            self.held[index / 64] |= bit;
        } else {
            self.held[index / 64] &= !bit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV: DeviceHandle = DeviceHandle(1);

    fn key(vkey: u16, make_code: u16, flags: u16) -> RawKeyboard {
        RawKeyboard {
            device: DEV,
            vkey,
            make_code,
            flags,
        }
    }

    fn pressed_key(event: Option<InputEvent>) -> Option<(KeyCode, bool)> {
        match event? {
            InputEvent::Key { key, pressed, .. } => Some((key, pressed)),
            InputEvent::Move { .. } => None,
        }
    }

    #[test]
    fn auto_repeat_is_dropped() {
        let mut normalizer = InputNormalizer::new();
        assert_eq!(pressed_key(normalizer.keyboard(&key(0x41, 0x1E, 0))), Some((KeyCode(0x41), true)));
        assert_eq!(normalizer.keyboard(&key(0x41, 0x1E, 0)), None);
        assert_eq!(
            pressed_key(normalizer.keyboard(&key(0x41, 0x1E, KEY_BREAK))),
            Some((KeyCode(0x41), false))
        );
        assert_eq!(normalizer.keyboard(&key(0x41, 0x1E, KEY_BREAK)), None);
    }

    #[test]
    fn modifiers_are_split_by_side() {
        let mut normalizer = InputNormalizer::new();
        assert_eq!(pressed_key(normalizer.keyboard(&key(0x10, 0x2A, 0))), Some((KeyCode::LSHIFT, true)));
        assert_eq!(pressed_key(normalizer.keyboard(&key(0x10, 0x36, 0))), Some((KeyCode::RSHIFT, true)));
        assert_eq!(pressed_key(normalizer.keyboard(&key(0x11, 0x1D, KEY_E0))), Some((KeyCode::RCONTROL, true)));
        assert_eq!(pressed_key(normalizer.keyboard(&key(0x11, 0x1D, 0))), Some((KeyCode::LCONTROL, true)));
        assert_eq!(pressed_key(normalizer.keyboard(&key(0x12, 0x38, KEY_E0))), Some((KeyCode::RMENU, true)));
    }

    #[test]
    fn fake_keys_are_ignored() {
        let mut normalizer = InputNormalizer::new();
        assert_eq!(normalizer.keyboard(&key(0xFF, 0, 0)), None);
        assert_eq!(normalizer.keyboard(&key(0x1FF, 0, 0)), None);
    }

    #[test]
    fn mouse_flags_decode_in_order() {
        let mut normalizer = InputNormalizer::new();
        let events = normalizer.mouse(&RawMouse {
            device: DEV,
            flags: 0,
            button_flags: 0x0001 | 0x0200,
            last_x: -3,
            last_y: 7,
        });
        assert_eq!(
            events,
            vec![
                InputEvent::Key { device: DEV, key: KeyCode::MOUSE_LEFT, pressed: true },
                InputEvent::Key { device: DEV, key: KeyCode::MOUSE_X2, pressed: false },
                InputEvent::Move { device: DEV, dx: -3, dy: 7 },
            ]
        );
    }

    #[test]
    fn absolute_motion_is_rejected() {
        let mut normalizer = InputNormalizer::new();
        let events = normalizer.mouse(&RawMouse {
            device: DEV,
            flags: MOUSE_MOVE_ABSOLUTE,
            button_flags: 0x0004,
            last_x: 30000,
            last_y: 30000,
        });
        assert_eq!(
            events,
            vec![InputEvent::Key { device: DEV, key: KeyCode::MOUSE_RIGHT, pressed: true }]
        );
    }

    #[test]
    fn mouse_buttons_share_held_state_with_keys() {
        let mut normalizer = InputNormalizer::new();
        normalizer.mouse(&RawMouse {
            device: DEV,
            flags: 0,
            button_flags: 0x0001,
            last_x: 0,
            last_y: 0,
        });
        assert_eq!(normalizer.keyboard(&RawKeyboard::key(DEV, KeyCode::MOUSE_LEFT, true)), None);
    }
}
