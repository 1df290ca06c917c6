//! # Persistence Module
//!
//! Maps the in-memory [`Config`] to the on-disk TOML document and back.
//!
//! ## Document layout
//! ```text
//! AltPath = "other.toml"            # optional redirect, relative to this file
//!
//! [General]
//! MouseCheckFrequency = 75
//!
//! [HotKeys]
//! ShowUI = "F9"
//! CaptureCursor = "F10"
//!
//! [Profiles.Default]
//! XboxCount = 1
//!
//! [[Profiles.Default.Gamepads]]
//! Buttons = { A = "Space", LStickUp = "W" }
//! LStick = { Type = "keyboard", Speed = 1.0 }
//! RStick = { Type = "mouse", Sensitivity = 50.0, NonLinearSensitivity = 0.8, Deadzone = 0.02 }
//! ```
//!
//! Button entries written directly on a gamepad table (`A = "Space"` next to
//! `LStick`) are read too; `Buttons` wins when both name the same button.
//!
//! ## Error Handling Strategy
//! File and syntax errors surface as `color_eyre` reports. Content errors
//! (unknown names, out-of-range values, too many gamepads) never fail a load:
//! they are logged and replaced by something sane, because the file is meant
//! to be edited by hand.

pub mod config_store;

use crate::config::{Config, ConfigGamepad, ConfigJoystick, ConfigProfile, MAX_GAMEPADS};
use crate::input::keycode::KeyCode;
use crate::mapping::button::LogicalButton;
use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

pub use config_store::ConfigStore;

const STICK_KEYBOARD: &str = "keyboard";
const STICK_MOUSE: &str = "mouse";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_path: Option<PathBuf>,
    #[serde(default)]
    pub general: GeneralSection,
    #[serde(default, rename = "HotKeys")]
    pub hotkeys: HotKeySection,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileSection>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GeneralSection {
    #[serde(default = "default_mouse_check_frequency")]
    pub mouse_check_frequency: u64,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            mouse_check_frequency: default_mouse_check_frequency(),
        }
    }
}

fn default_mouse_check_frequency() -> u64 {
    crate::config::DEFAULT_MOUSE_CHECK_FREQUENCY_MS
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct HotKeySection {
    #[serde(default, rename = "ShowUI", skip_serializing_if = "Option::is_none")]
    pub show_ui: Option<String>,
    #[serde(default, rename = "CaptureCursor", skip_serializing_if = "Option::is_none")]
    pub capture_cursor: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xbox_count: Option<usize>,
    #[serde(default)]
    pub gamepads: Vec<GamepadSection>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct GamepadSection {
    #[serde(default, rename = "Buttons")]
    pub buttons: BTreeMap<String, String>,
    #[serde(default, rename = "LStick")]
    pub lstick: StickSection,
    #[serde(default, rename = "RStick")]
    pub rstick: StickSection,
    /// Button names written directly on the gamepad table (older files).
    #[serde(flatten)]
    pub inline_buttons: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StickSection {
    #[serde(default = "default_stick_type", rename = "Type")]
    pub kind: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    #[serde(default = "default_non_linear")]
    pub non_linear_sensitivity: f32,
    #[serde(default = "default_deadzone")]
    pub deadzone: f32,
    #[serde(default)]
    pub invert_x_axis: bool,
    #[serde(default)]
    pub invert_y_axis: bool,
}

fn default_stick_type() -> String {
    STICK_KEYBOARD.to_string()
}

fn default_speed() -> f32 {
    ConfigJoystick::default().speed
}

fn default_sensitivity() -> f32 {
    ConfigJoystick::default().sensitivity
}

fn default_non_linear() -> f32 {
    ConfigJoystick::default().non_linear
}

fn default_deadzone() -> f32 {
    ConfigJoystick::default().deadzone
}

impl Default for StickSection {
    fn default() -> Self {
        StickSection::from_joystick(&ConfigJoystick::default())
    }
}

impl StickSection {
    fn from_joystick(stick: &ConfigJoystick) -> Self {
        Self {
            kind: if stick.use_mouse {
                STICK_MOUSE
            } else {
                STICK_KEYBOARD
            }
            .to_string(),
            speed: stick.speed,
            sensitivity: stick.sensitivity,
            non_linear_sensitivity: stick.non_linear,
            deadzone: stick.deadzone,
            invert_x_axis: stick.invert_x,
            invert_y_axis: stick.invert_y,
        }
    }

    fn to_joystick(&self) -> ConfigJoystick {
        let use_mouse = if self.kind.eq_ignore_ascii_case(STICK_MOUSE) {
            true
        } else {
            if !self.kind.eq_ignore_ascii_case(STICK_KEYBOARD) {
                warn!("Unknown stick type '{}', using keyboard", self.kind);
            }
            false
        };
        ConfigJoystick {
            speed: self.speed,
            sensitivity: self.sensitivity,
            non_linear: self.non_linear_sensitivity,
            deadzone: self.deadzone,
            invert_x: self.invert_x_axis,
            invert_y: self.invert_y_axis,
            use_mouse,
        }
    }
}

impl GamepadSection {
    fn from_gamepad(gamepad: &ConfigGamepad) -> Self {
        let buttons = LogicalButton::ALL
            .iter()
            .filter_map(|button| {
                let key = gamepad.binding(*button);
                let name = key.name()?;
                Some((button.name().to_string(), name))
            })
            .collect();
        Self {
            buttons,
            lstick: StickSection::from_joystick(&gamepad.lstick),
            rstick: StickSection::from_joystick(&gamepad.rstick),
            inline_buttons: BTreeMap::new(),
        }
    }

    fn to_gamepad(&self) -> ConfigGamepad {
        let mut gamepad = ConfigGamepad {
            lstick: self.lstick.to_joystick(),
            rstick: self.rstick.to_joystick(),
            ..ConfigGamepad::default()
        };
        for (name, value) in &self.inline_buttons {
            match value.as_str() {
                Some(key_name) => bind_named(&mut gamepad, name, key_name),
                None => warn!("Ignoring gamepad entry '{}' = {}", name, value),
            }
        }
        // the Buttons table wins over inline entries
        for (button_name, key_name) in &self.buttons {
            bind_named(&mut gamepad, button_name, key_name);
        }
        gamepad.sanitize();
        gamepad
    }
}

fn bind_named(gamepad: &mut ConfigGamepad, button_name: &str, key_name: &str) {
    let Some(button) = LogicalButton::from_name(button_name) else {
        warn!("Ignoring unknown button '{}'", button_name);
        return;
    };
    let Some(key) = KeyCode::from_name(key_name) else {
        warn!("Ignoring unknown key '{}' for {}", key_name, button);
        return;
    };
    gamepad.buttons[button.ordinal()] = key;
}

impl ProfileSection {
    fn to_profile(&self, name: &str) -> ConfigProfile {
        let mut count = self.xbox_count.unwrap_or(self.gamepads.len());
        if count > MAX_GAMEPADS {
            warn!(
                "Profile '{}' asks for {} controllers, limiting to {}",
                name, count, MAX_GAMEPADS
            );
            count = MAX_GAMEPADS;
        }
        let mut gamepads: Vec<ConfigGamepad> = self
            .gamepads
            .iter()
            .take(count)
            .map(GamepadSection::to_gamepad)
            .collect();
        gamepads.resize_with(count, ConfigGamepad::default);
        ConfigProfile { gamepads }
    }
}

fn parse_hotkey(slot: &str, value: Option<&String>) -> KeyCode {
    let Some(name) = value else {
        return KeyCode::UNBOUND;
    };
    KeyCode::from_name(name).unwrap_or_else(|| {
        warn!("Unknown key '{}' for hotkey {}", name, slot);
        KeyCode::UNBOUND
    })
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| eyre!("Failed to parse config: {}", e))
    }

    pub fn render(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }

    pub fn from_config(config: &Config) -> Self {
        let profiles = config
            .profiles
            .iter()
            .map(|(name, profile)| {
                (
                    name.clone(),
                    ProfileSection {
                        xbox_count: Some(profile.gamepads.len()),
                        gamepads: profile
                            .gamepads
                            .iter()
                            .map(GamepadSection::from_gamepad)
                            .collect(),
                    },
                )
            })
            .collect();
        Self {
            alt_path: None,
            general: GeneralSection {
                mouse_check_frequency: config.mouse_check_frequency_ms,
            },
            hotkeys: HotKeySection {
                show_ui: config.hotkey_show_ui.name(),
                capture_cursor: config.hotkey_capture_cursor.name(),
            },
            profiles,
        }
    }

    pub fn to_config(&self) -> Config {
        let profiles = self
            .profiles
            .iter()
            .map(|(name, section)| (name.clone(), section.to_profile(name)))
            .collect();
        let mut config = Config {
            profiles,
            mouse_check_frequency_ms: self.general.mouse_check_frequency,
            hotkey_show_ui: parse_hotkey("ShowUI", self.hotkeys.show_ui.as_ref()),
            hotkey_capture_cursor: parse_hotkey("CaptureCursor", self.hotkeys.capture_cursor.as_ref()),
        };
        config.sanitize();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::button::Stick;

    const SAMPLE: &str = r#"
[General]
MouseCheckFrequency = 60

[HotKeys]
ShowUI = "F9"
CaptureCursor = "NotAKey"

[Profiles.Shooter]
XboxCount = 1

[[Profiles.Shooter.Gamepads]]
Buttons = { A = "Space", LT = "MouseRight", LStickUp = "W", RStickUp = "I", Bogus = "Q", B = "Nope" }
LStick = { Type = "keyboard", Speed = 0.5 }
RStick = { Type = "mouse", Sensitivity = 30.0, Deadzone = 2.0, InvertYAxis = true }
"#;

    #[test]
    fn parses_hand_written_document() {
        let config = ConfigDocument::parse(SAMPLE).unwrap().to_config();
        assert_eq!(config.mouse_check_frequency_ms, 60);
        assert_eq!(config.hotkey_show_ui, KeyCode(0x78));
        assert_eq!(config.hotkey_capture_cursor, KeyCode::UNBOUND);

        let pad = &config.profiles["Shooter"].gamepads[0];
        assert_eq!(pad.binding(LogicalButton::A), KeyCode(0x20));
        assert_eq!(pad.binding(LogicalButton::LeftTrigger), KeyCode::MOUSE_RIGHT);
        assert_eq!(pad.binding(LogicalButton::LStickUp), KeyCode(0x57));
        assert_eq!(pad.binding(LogicalButton::B), KeyCode::UNBOUND);
        assert_eq!(pad.stick(Stick::Left).speed, 0.5);
        assert!(!pad.lstick.use_mouse);

        let rstick = pad.stick(Stick::Right);
        assert!(rstick.use_mouse);
        assert_eq!(rstick.sensitivity, 30.0);
        assert_eq!(rstick.deadzone, 1.0);
        assert!(rstick.invert_y);
        assert_eq!(rstick.non_linear, ConfigJoystick::default().non_linear);
    }

    #[test]
    fn inline_button_entries_are_read() {
        let text = r#"
[Profiles.Old]
XboxCount = 1

[[Profiles.Old.Gamepads]]
A = "Space"
LStickUp = "W"
Start = 5
LStick = { Type = "keyboard", Speed = 0.25 }
RStick = { Type = "mouse" }
"#;
        let config = ConfigDocument::parse(text).unwrap().to_config();
        let pad = &config.profiles["Old"].gamepads[0];
        assert_eq!(pad.binding(LogicalButton::A), KeyCode(0x20));
        assert_eq!(pad.binding(LogicalButton::LStickUp), KeyCode(0x57));
        assert_eq!(pad.binding(LogicalButton::Start), KeyCode::UNBOUND);
        assert_eq!(pad.lstick.speed, 0.25);
        assert!(pad.rstick.use_mouse);
    }

    #[test]
    fn buttons_table_overrides_inline_entries() {
        let text = r#"
[[Profiles.Mixed.Gamepads]]
A = "Space"
Buttons = { A = "Enter" }
"#;
        let config = ConfigDocument::parse(text).unwrap().to_config();
        let pad = &config.profiles["Mixed"].gamepads[0];
        assert_eq!(pad.binding(LogicalButton::A), KeyCode::from_name("Enter").unwrap());
    }

    #[test]
    fn xbox_count_limits_and_pads_gamepads() {
        let text = r#"
[Profiles.Big]
XboxCount = 9
Gamepads = [{}, {}, {}, {}, {}, {}]

[Profiles.Padded]
XboxCount = 2
"#;
        let config = ConfigDocument::parse(text).unwrap().to_config();
        assert_eq!(config.profiles["Big"].gamepads.len(), MAX_GAMEPADS);
        assert_eq!(config.profiles["Padded"].gamepads.len(), 2);
    }

    #[test]
    fn duplicate_keys_in_file_are_resolved() {
        let text = r#"
[[Profiles.P.Gamepads]]
Buttons = { Y = "E", DPadUp = "E" }
"#;
        let config = ConfigDocument::parse(text).unwrap().to_config();
        let pad = &config.profiles["P"].gamepads[0];
        assert_eq!(pad.binding(LogicalButton::DPadUp), KeyCode(0x45));
        assert_eq!(pad.binding(LogicalButton::Y), KeyCode::UNBOUND);
    }

    #[test]
    fn rendered_document_reads_back() {
        let mut config = Config::starter();
        config.hotkey_capture_cursor = KeyCode(0x79);
        let text = ConfigDocument::from_config(&config).render().unwrap();
        assert!(text.contains("MouseCheckFrequency"));
        let parsed = ConfigDocument::parse(&text).unwrap().to_config();
        assert_eq!(parsed, config);
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(ConfigDocument::parse("[General\nMouseCheckFrequency = ").is_err());
    }
}
