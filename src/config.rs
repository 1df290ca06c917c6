//! In-memory binding configuration consumed by the feeder engine
//!
//! The engine never touches the file system; [`crate::persistence`] turns the
//! on-disk TOML document into a [`Config`] and back.

use crate::input::keycode::KeyCode;
use crate::mapping::button::{LogicalButton, Stick, BUTTON_SLOTS};
use std::collections::BTreeMap;
use tracing::warn;

/// Hard limit imposed by the XUSB bus.
pub const MAX_GAMEPADS: usize = 4;

pub const DEFAULT_MOUSE_CHECK_FREQUENCY_MS: u64 = 75;

/// Per-stick parameters for both keyboard and mouse mode.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigJoystick {
    /// Keyboard mode: fraction of full deflection, [0, 1]
    pub speed: f32,
    /// Mouse mode: counts per tick that reach full deflection
    pub sensitivity: f32,
    /// Mouse mode: response curve exponent
    pub non_linear: f32,
    /// Mouse mode: fraction of `sensitivity` treated as centered, [0, 1]
    pub deadzone: f32,
    pub invert_x: bool,
    pub invert_y: bool,
    pub use_mouse: bool,
}

impl Default for ConfigJoystick {
    fn default() -> Self {
        Self {
            speed: 1.0,
            sensitivity: 50.0,
            non_linear: 0.8,
            deadzone: 0.02,
            invert_x: false,
            invert_y: false,
            use_mouse: false,
        }
    }
}

impl ConfigJoystick {
    /// Clamps user-editable values into their valid ranges.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.speed.is_finite() {
            self.speed = defaults.speed;
        }
        self.speed = self.speed.clamp(0.0, 1.0);
        if !self.deadzone.is_finite() {
            self.deadzone = defaults.deadzone;
        }
        self.deadzone = self.deadzone.clamp(0.0, 1.0);
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            warn!(
                "Invalid stick sensitivity {}, using {}",
                self.sensitivity, defaults.sensitivity
            );
            self.sensitivity = defaults.sensitivity;
        }
        if !(self.non_linear.is_finite() && self.non_linear > 0.0) {
            warn!(
                "Invalid stick curve exponent {}, using {}",
                self.non_linear, defaults.non_linear
            );
            self.non_linear = defaults.non_linear;
        }
    }
}

/// Binding table of one virtual controller slot.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigGamepad {
    /// Indexed by [`LogicalButton::ordinal`]
    pub buttons: [KeyCode; BUTTON_SLOTS],
    pub lstick: ConfigJoystick,
    pub rstick: ConfigJoystick,
}

impl Default for ConfigGamepad {
    fn default() -> Self {
        Self {
            buttons: [KeyCode::UNBOUND; BUTTON_SLOTS],
            lstick: ConfigJoystick::default(),
            rstick: ConfigJoystick::default(),
        }
    }
}

impl ConfigGamepad {
    pub fn binding(&self, button: LogicalButton) -> KeyCode {
        self.buttons[button.ordinal()]
    }

    /// Binds `key` to `button`, unbinding any other button that held `key`.
    ///
    /// Returns the buttons that lost their binding.
    pub fn bind(&mut self, button: LogicalButton, key: KeyCode) -> Vec<LogicalButton> {
        let mut displaced = Vec::new();
        if key.is_bound() {
            for other in LogicalButton::ALL {
                if other != button && self.buttons[other.ordinal()] == key {
                    self.buttons[other.ordinal()] = KeyCode::UNBOUND;
                    displaced.push(other);
                }
            }
        }
        self.buttons[button.ordinal()] = key;
        displaced
    }

    pub fn stick(&self, stick: Stick) -> &ConfigJoystick {
        match stick {
            Stick::Left => &self.lstick,
            Stick::Right => &self.rstick,
        }
    }

    pub fn stick_mut(&mut self, stick: Stick) -> &mut ConfigJoystick {
        match stick {
            Stick::Left => &mut self.lstick,
            Stick::Right => &mut self.rstick,
        }
    }

    pub fn uses_mouse(&self) -> bool {
        self.lstick.use_mouse || self.rstick.use_mouse
    }

    /// Enforces one button per key (lowest ordinal wins) and valid stick ranges.
    pub fn sanitize(&mut self) {
        for (ordinal, key) in self.buttons.iter_mut().enumerate() {
            if key.is_bound() && LogicalButton::from_ordinal(ordinal).is_none() {
                *key = KeyCode::UNBOUND;
            }
        }
        for button in LogicalButton::ALL {
            let key = self.buttons[button.ordinal()];
            if !key.is_bound() {
                continue;
            }
            for later in LogicalButton::ALL
                .iter()
                .filter(|b| b.ordinal() > button.ordinal())
            {
                if self.buttons[later.ordinal()] == key {
                    warn!(
                        "Key {} bound to both {} and {}, keeping {}",
                        key, button, later, button
                    );
                    self.buttons[later.ordinal()] = KeyCode::UNBOUND;
                }
            }
        }
        self.lstick.sanitize();
        self.rstick.sanitize();
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigProfile {
    pub gamepads: Vec<ConfigGamepad>,
}

impl ConfigProfile {
    pub fn sanitize(&mut self, name: &str) {
        if self.gamepads.len() > MAX_GAMEPADS {
            warn!(
                "Profile '{}' declares {} gamepads, dropping all beyond {}",
                name,
                self.gamepads.len(),
                MAX_GAMEPADS
            );
            self.gamepads.truncate(MAX_GAMEPADS);
        }
        for gamepad in &mut self.gamepads {
            gamepad.sanitize();
        }
    }
}

/// Complete configuration handed to the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub profiles: BTreeMap<String, ConfigProfile>,
    /// Analog resolution period
    pub mouse_check_frequency_ms: u64,
    pub hotkey_show_ui: KeyCode,
    pub hotkey_capture_cursor: KeyCode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profiles: BTreeMap::new(),
            mouse_check_frequency_ms: DEFAULT_MOUSE_CHECK_FREQUENCY_MS,
            hotkey_show_ui: KeyCode::UNBOUND,
            hotkey_capture_cursor: KeyCode::UNBOUND,
        }
    }
}

impl Config {
    pub fn sanitize(&mut self) {
        if self.mouse_check_frequency_ms == 0 {
            warn!(
                "Mouse check frequency of 0 ms is invalid, using {} ms",
                DEFAULT_MOUSE_CHECK_FREQUENCY_MS
            );
            self.mouse_check_frequency_ms = DEFAULT_MOUSE_CHECK_FREQUENCY_MS;
        }
        for (name, profile) in self.profiles.iter_mut() {
            profile.sanitize(name);
        }
    }

    /// Config written on first start: WASD on the left stick, mouse on the right.
    pub fn starter() -> Self {
        let mut pad = ConfigGamepad::default();
        let binds: [(LogicalButton, u8); 16] = [
            (LogicalButton::LStickUp, b'W'),
            (LogicalButton::LStickLeft, b'A'),
            (LogicalButton::LStickDown, b'S'),
            (LogicalButton::LStickRight, b'D'),
            (LogicalButton::A, 0x20),
            (LogicalButton::B, b'C'),
            (LogicalButton::X, b'R'),
            (LogicalButton::Y, b'F'),
            (LogicalButton::LeftShoulder, b'Q'),
            (LogicalButton::RightShoulder, b'E'),
            (LogicalButton::LeftTrigger, 0x02),
            (LogicalButton::RightTrigger, 0x01),
            (LogicalButton::LeftThumb, 0xA0),
            (LogicalButton::RightThumb, 0x04),
            (LogicalButton::Start, 0x0D),
            (LogicalButton::Back, 0x09),
        ];
        for (button, key) in binds {
            pad.bind(button, KeyCode(key));
        }
        pad.rstick.use_mouse = true;

        let mut config = Self::default();
        config.profiles.insert(
            "Default".to_string(),
            ConfigProfile {
                gamepads: vec![pad],
            },
        );
        config
    }
}
