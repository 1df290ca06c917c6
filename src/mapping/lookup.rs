//! Reverse lookup table: `KeyCode -> LogicalButton` per controller slot
//!
//! Profiles store bindings as `button -> key`. Dispatch needs the inverse, so
//! every slot keeps a 255-entry row that is rebuilt from scratch whenever the
//! slot's bindings or stick modes change.

use super::button::{LogicalButton, Stick};
use crate::config::{ConfigGamepad, MAX_GAMEPADS};
use crate::input::keycode::KeyCode;
use tracing::debug;

const ROW_LEN: usize = 255;

type Row = [Option<LogicalButton>; ROW_LEN];

#[derive(Clone, Debug)]
pub struct ButtonLut {
    rows: [Row; MAX_GAMEPADS],
}

impl Default for ButtonLut {
    fn default() -> Self {
        Self {
            rows: [[None; ROW_LEN]; MAX_GAMEPADS],
        }
    }
}

impl ButtonLut {
    /// Rebuilds the row of `slot` from `gamepad`. Out-of-range slots are ignored.
    pub fn populate(&mut self, slot: usize, gamepad: &ConfigGamepad) {
        let Some(row) = self.rows.get_mut(slot) else {
            return;
        };
        row.fill(None);

        let mut entries = 0;
        for button in LogicalButton::ALL {
            if let Some(stick) = stick_of(button) {
                if gamepad.stick(stick).use_mouse {
                    continue;
                }
            }
            let key = gamepad.binding(button);
            if let Some(entry) = row.get_mut(key.0 as usize) {
                *entry = Some(button);
                entries += 1;
            }
        }
        debug!("Rebuilt lookup row {} with {} entries", slot, entries);
    }

    pub fn clear_all(&mut self) {
        for row in self.rows.iter_mut() {
            row.fill(None);
        }
    }

    pub fn lookup(&self, slot: usize, key: KeyCode) -> Option<LogicalButton> {
        self.rows.get(slot)?.get(key.0 as usize).copied().flatten()
    }
}

fn stick_of(button: LogicalButton) -> Option<Stick> {
    if !button.is_stick_direction() {
        return None;
    }
    if LogicalButton::stick_directions(Stick::Left).contains(&button) {
        Some(Stick::Left)
    } else {
        Some(Stick::Right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::button::BUTTON_SLOTS;
    use proptest::prelude::*;

    fn pad_with(binds: &[(LogicalButton, u8)]) -> ConfigGamepad {
        let mut pad = ConfigGamepad::default();
        for (button, key) in binds {
            pad.bind(*button, KeyCode(*key));
        }
        pad
    }

    #[test]
    fn populate_inverts_bindings() {
        let pad = pad_with(&[
            (LogicalButton::A, 0x41),
            (LogicalButton::LeftTrigger, 0x02),
            (LogicalButton::LStickUp, 0x57),
        ]);
        let mut lut = ButtonLut::default();
        lut.populate(0, &pad);
        assert_eq!(lut.lookup(0, KeyCode(0x41)), Some(LogicalButton::A));
        assert_eq!(lut.lookup(0, KeyCode(0x02)), Some(LogicalButton::LeftTrigger));
        assert_eq!(lut.lookup(0, KeyCode(0x57)), Some(LogicalButton::LStickUp));
        assert_eq!(lut.lookup(1, KeyCode(0x41)), None);
    }

    #[test]
    fn mouse_mode_stick_ignores_its_keys() {
        let mut pad = pad_with(&[(LogicalButton::RStickLeft, 0x4A), (LogicalButton::LStickLeft, 0x41)]);
        pad.rstick.use_mouse = true;
        let mut lut = ButtonLut::default();
        lut.populate(2, &pad);
        assert_eq!(lut.lookup(2, KeyCode(0x4A)), None);
        assert_eq!(lut.lookup(2, KeyCode(0x41)), Some(LogicalButton::LStickLeft));
    }

    #[test]
    fn rebuild_drops_stale_entries() {
        let mut pad = pad_with(&[(LogicalButton::A, 0x41)]);
        let mut lut = ButtonLut::default();
        lut.populate(0, &pad);
        pad.bind(LogicalButton::A, KeyCode(0x42));
        lut.populate(0, &pad);
        assert_eq!(lut.lookup(0, KeyCode(0x41)), None);
        assert_eq!(lut.lookup(0, KeyCode(0x42)), Some(LogicalButton::A));
    }

    #[test]
    fn unbound_and_out_of_range_never_resolve() {
        let pad = ConfigGamepad::default();
        let mut lut = ButtonLut::default();
        lut.populate(0, &pad);
        lut.populate(9, &pad);
        assert_eq!(lut.lookup(0, KeyCode::UNBOUND), None);
        assert_eq!(lut.lookup(9, KeyCode(0x41)), None);
    }

    proptest! {
        #[test]
        fn lookup_matches_profile(
            keys in proptest::collection::vec(0u8..=255, BUTTON_SLOTS),
            left_mouse in any::<bool>(),
            right_mouse in any::<bool>(),
        ) {
            let mut pad = ConfigGamepad::default();
            for (ordinal, key) in keys.iter().enumerate() {
                pad.buttons[ordinal] = KeyCode(*key);
            }
            pad.lstick.use_mouse = left_mouse;
            pad.rstick.use_mouse = right_mouse;
            pad.sanitize();

            let mut lut = ButtonLut::default();
            lut.populate(0, &pad);

            for code in 0u8..0xFF {
                let key = KeyCode(code);
                let expected = LogicalButton::ALL.iter().copied().find(|b| {
                    let in_mouse_mode = stick_of(*b).map(|s| pad.stick(s).use_mouse).unwrap_or(false);
                    pad.binding(*b) == key && !in_mouse_mode
                });
                prop_assert_eq!(lut.lookup(0, key), expected);
            }
        }
    }
}
