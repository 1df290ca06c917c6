//! Logical controller buttons and their dispatch categories
//!
//! Ordinals of the direct-mapped buttons equal their bit position in the
//! XUSB `wButtons` mask. Slot 11 is unused by the protocol and stays reserved
//! so the binding table can be indexed by ordinal.
//!
//! ```text
//!  0..=10, 12..=15   digital bits   (DPad, Start, Back, thumbs, shoulders, Guide, A/B/X/Y)
//!  16..=17           triggers       (8-bit pressure)
//!  18..=25           stick directions (combined per stick before sending)
//! ```

use std::fmt;

/// Number of binding slots per gamepad, including the reserved ordinal 11.
pub const BUTTON_SLOTS: usize = 26;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalButton {
    DPadUp = 0,
    DPadDown = 1,
    DPadLeft = 2,
    DPadRight = 3,
    Start = 4,
    Back = 5,
    LeftThumb = 6,
    RightThumb = 7,
    LeftShoulder = 8,
    RightShoulder = 9,
    Guide = 10,
    A = 12,
    B = 13,
    X = 14,
    Y = 15,
    LeftTrigger = 16,
    RightTrigger = 17,
    LStickUp = 18,
    LStickDown = 19,
    LStickLeft = 20,
    LStickRight = 21,
    RStickUp = 22,
    RStickDown = 23,
    RStickLeft = 24,
    RStickRight = 25,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    pub fn index(self) -> usize {
        match self {
            Stick::Left => 0,
            Stick::Right => 1,
        }
    }

    pub fn from_name(name: &str) -> Option<Stick> {
        match name.to_ascii_lowercase().as_str() {
            "left" | "l" | "lstick" => Some(Stick::Left),
            "right" | "r" | "rstick" => Some(Stick::Right),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// How a button reaches the wire report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonKind {
    Digital,
    Trigger(Trigger),
    StickDirection(Stick, Direction),
}

impl LogicalButton {
    pub const ALL: [LogicalButton; 25] = [
        LogicalButton::DPadUp,
        LogicalButton::DPadDown,
        LogicalButton::DPadLeft,
        LogicalButton::DPadRight,
        LogicalButton::Start,
        LogicalButton::Back,
        LogicalButton::LeftThumb,
        LogicalButton::RightThumb,
        LogicalButton::LeftShoulder,
        LogicalButton::RightShoulder,
        LogicalButton::Guide,
        LogicalButton::A,
        LogicalButton::B,
        LogicalButton::X,
        LogicalButton::Y,
        LogicalButton::LeftTrigger,
        LogicalButton::RightTrigger,
        LogicalButton::LStickUp,
        LogicalButton::LStickDown,
        LogicalButton::LStickLeft,
        LogicalButton::LStickRight,
        LogicalButton::RStickUp,
        LogicalButton::RStickDown,
        LogicalButton::RStickLeft,
        LogicalButton::RStickRight,
    ];

    pub fn ordinal(self) -> usize {
        self as u8 as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<LogicalButton> {
        Self::ALL.iter().copied().find(|b| b.ordinal() == ordinal)
    }

    pub fn is_direct_mapped(self) -> bool {
        self.ordinal() <= LogicalButton::Y.ordinal()
    }

    pub fn is_trigger(self) -> bool {
        matches!(self, LogicalButton::LeftTrigger | LogicalButton::RightTrigger)
    }

    pub fn is_stick_direction(self) -> bool {
        self.ordinal() >= LogicalButton::LStickUp.ordinal()
    }

    pub fn kind(self) -> ButtonKind {
        use LogicalButton::*;
        match self {
            LeftTrigger => ButtonKind::Trigger(Trigger::Left),
            RightTrigger => ButtonKind::Trigger(Trigger::Right),
            LStickUp => ButtonKind::StickDirection(Stick::Left, Direction::Up),
            LStickDown => ButtonKind::StickDirection(Stick::Left, Direction::Down),
            LStickLeft => ButtonKind::StickDirection(Stick::Left, Direction::Left),
            LStickRight => ButtonKind::StickDirection(Stick::Left, Direction::Right),
            RStickUp => ButtonKind::StickDirection(Stick::Right, Direction::Up),
            RStickDown => ButtonKind::StickDirection(Stick::Right, Direction::Down),
            RStickLeft => ButtonKind::StickDirection(Stick::Right, Direction::Left),
            RStickRight => ButtonKind::StickDirection(Stick::Right, Direction::Right),
            _ => ButtonKind::Digital,
        }
    }

    /// The four direction buttons that drive `stick` in keyboard mode.
    pub fn stick_directions(stick: Stick) -> [LogicalButton; 4] {
        use LogicalButton::*;
        match stick {
            Stick::Left => [LStickUp, LStickDown, LStickLeft, LStickRight],
            Stick::Right => [RStickUp, RStickDown, RStickLeft, RStickRight],
        }
    }

    pub fn name(self) -> &'static str {
        use LogicalButton::*;
        match self {
            DPadUp => "DPadUp",
            DPadDown => "DPadDown",
            DPadLeft => "DPadLeft",
            DPadRight => "DPadRight",
            Start => "Start",
            Back => "Back",
            LeftThumb => "LStickBtn",
            RightThumb => "RStickBtn",
            LeftShoulder => "LB",
            RightShoulder => "RB",
            Guide => "Guide",
            A => "A",
            B => "B",
            X => "X",
            Y => "Y",
            LeftTrigger => "LT",
            RightTrigger => "RT",
            LStickUp => "LStickUp",
            LStickDown => "LStickDown",
            LStickLeft => "LStickLeft",
            LStickRight => "LStickRight",
            RStickUp => "RStickUp",
            RStickDown => "RStickDown",
            RStickLeft => "RStickLeft",
            RStickRight => "RStickRight",
        }
    }

    pub fn from_name(name: &str) -> Option<LogicalButton> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
