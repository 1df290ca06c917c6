//! Live controller state and the XUSB wire report
//!
//! [`PadState`] is what the engine mutates; [`XusbReport`] is the bit-exact
//! shape the virtual bus expects. Conversion happens only at submit time.

use crate::mapping::button::{LogicalButton, Stick, Trigger};

pub const TRIGGER_ON: u8 = 0xFF;
pub const TRIGGER_OFF: u8 = 0x00;

/// Digital button state, one bit per direct-mapped button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonMask(u16);

impl ButtonMask {
    pub fn set(&mut self, button: LogicalButton, pressed: bool) {
        if !button.is_direct_mapped() {
            return;
        }
        let bit = 1u16 << button.ordinal();
        if pressed {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn get(&self, button: LogicalButton) -> bool {
        button.is_direct_mapped() && self.0 & (1u16 << button.ordinal()) != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn pressed(&self) -> impl Iterator<Item = LogicalButton> + '_ {
        LogicalButton::ALL
            .into_iter()
            .filter(move |b| self.get(*b))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StickAxes {
    pub x: i16,
    pub y: i16,
}

/// Report state owned by one virtual controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PadState {
    pub buttons: ButtonMask,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub sticks: [StickAxes; 2],
}

impl PadState {
    pub fn set_trigger(&mut self, trigger: Trigger, pressed: bool) {
        let value = if pressed { TRIGGER_ON } else { TRIGGER_OFF };
        match trigger {
            Trigger::Left => self.left_trigger = value,
            Trigger::Right => self.right_trigger = value,
        }
    }

    pub fn stick(&self, stick: Stick) -> StickAxes {
        self.sticks[stick.index()]
    }

    pub fn set_stick(&mut self, stick: Stick, axes: StickAxes) {
        self.sticks[stick.index()] = axes;
    }

    pub fn report(&self) -> XusbReport {
        let [left, right] = self.sticks;
        XusbReport {
            buttons: self.buttons.bits(),
            left_trigger: self.left_trigger,
            right_trigger: self.right_trigger,
            thumb_lx: left.x,
            thumb_ly: left.y,
            thumb_rx: right.x,
            thumb_ry: right.y,
        }
    }
}

/// XUSB_REPORT as submitted to the bus driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct XusbReport {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl XusbReport {
    pub const SIZE: usize = 12;

    /// Little-endian wire layout.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..2].copy_from_slice(&self.buttons.to_le_bytes());
        out[2] = self.left_trigger;
        out[3] = self.right_trigger;
        out[4..6].copy_from_slice(&self.thumb_lx.to_le_bytes());
        out[6..8].copy_from_slice(&self.thumb_ly.to_le_bytes());
        out[8..10].copy_from_slice(&self.thumb_rx.to_le_bytes());
        out[10..12].copy_from_slice(&self.thumb_ry.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_idempotent() {
        let mut mask = ButtonMask::default();
        mask.set(LogicalButton::A, true);
        mask.set(LogicalButton::A, true);
        assert_eq!(mask.bits(), 0x1000);
        mask.set(LogicalButton::A, false);
        mask.set(LogicalButton::A, false);
        assert_eq!(mask.bits(), 0);
    }

    #[test]
    fn non_digital_buttons_never_touch_the_mask() {
        let mut mask = ButtonMask::default();
        mask.set(LogicalButton::LeftTrigger, true);
        mask.set(LogicalButton::RStickUp, true);
        assert_eq!(mask.bits(), 0);
        assert!(!mask.get(LogicalButton::LeftTrigger));
    }

    #[test]
    fn wire_layout_is_little_endian() {
        let report = XusbReport {
            buttons: 0x1001,
            left_trigger: 0xFF,
            right_trigger: 0x00,
            thumb_lx: -1,
            thumb_ly: 0x1234,
            thumb_rx: i16::MIN,
            thumb_ry: i16::MAX,
        };
        assert_eq!(
            report.to_bytes(),
            [0x01, 0x10, 0xFF, 0x00, 0xFF, 0xFF, 0x34, 0x12, 0x00, 0x80, 0xFF, 0x7F]
        );
    }

    #[test]
    fn report_reflects_state() {
        let mut state = PadState::default();
        state.buttons.set(LogicalButton::DPadLeft, true);
        state.set_trigger(Trigger::Right, true);
        state.set_stick(Stick::Right, StickAxes { x: 100, y: -100 });
        let report = state.report();
        assert_eq!(report.buttons, 0x0004);
        assert_eq!(report.right_trigger, TRIGGER_ON);
        assert_eq!(report.left_trigger, TRIGGER_OFF);
        assert_eq!((report.thumb_rx, report.thumb_ry), (100, -100));
        assert_eq!((report.thumb_lx, report.thumb_ly), (0, 0));
        assert_eq!(
            state.buttons.pressed().collect::<Vec<_>>(),
            vec![LogicalButton::DPadLeft]
        );
    }
}
