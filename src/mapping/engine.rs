//! Feeder engine: keyboard and mouse events in, XUSB reports out
//!
//! # Event flow
//!
//! ```text
//! handle_key_press ──► device filter ──► rebind capture ──► lookup ──► PadState ──► bus.submit
//!                                                                          ▲
//! handle_mouse_movement ──► accumulators ──► update (per tick) ──► stick math
//! ```
//!
//! The engine is a plain synchronous state machine. The host serializes every
//! call onto one task, so nothing in here locks or blocks beyond one bus call
//! per affected controller.

use super::button::{ButtonKind, LogicalButton, Stick};
use super::error::FeederError;
use super::lookup::ButtonLut;
use super::stick::{keyboard_axes, resolve_mouse_stick};
use crate::config::{Config, ConfigGamepad, ConfigJoystick, ConfigProfile, MAX_GAMEPADS};
use crate::controller::bus::VirtualBus;
use crate::controller::virtual_pad::{DeviceFilter, DeviceHandle, InputChannel, VirtualController};
use crate::input::keycode::KeyCode;
use tracing::{debug, error, info, trace, warn};

/// Counters for the periodic statistics log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub key_events: u64,
    pub mouse_events: u64,
    pub ticks: u64,
    pub reports_sent: u64,
    pub submit_failures: u64,
}

pub struct FeederEngine<B: VirtualBus> {
    config: Config,
    current: Option<String>,
    controllers: Vec<VirtualController>,
    lut: ButtonLut,
    bus: B,
    dirty: bool,
    stats: EngineStats,
}

impl<B: VirtualBus> FeederEngine<B> {
    /// Creates the engine and activates the first profile, if any.
    pub fn new(mut config: Config, bus: B) -> Result<Self, FeederError> {
        config.sanitize();
        let first = config.profiles.keys().next().cloned();
        let mut engine = Self {
            config,
            current: None,
            controllers: Vec::new(),
            lut: ButtonLut::default(),
            bus,
            dirty: false,
            stats: EngineStats::default(),
        };
        engine.select_profile(first.as_deref())?;
        Ok(engine)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn current_profile(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn controllers(&self) -> &[VirtualController] {
        &self.controllers
    }

    pub fn controller(&self, slot: usize) -> Option<&VirtualController> {
        self.controllers.get(slot)
    }

    pub fn gamepad(&self, slot: usize) -> Option<&ConfigGamepad> {
        self.current_profile_config()?.gamepads.get(slot)
    }

    pub fn lookup(&self, slot: usize, key: KeyCode) -> Option<LogicalButton> {
        self.lut.lookup(slot, key)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Whether the config changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn current_profile_config(&self) -> Option<&ConfigProfile> {
        self.config.profiles.get(self.current.as_deref()?)
    }

    fn current_profile_config_mut(&mut self) -> Option<&mut ConfigProfile> {
        let name = self.current.as_deref()?;
        self.config.profiles.get_mut(name)
    }

    // ---- profile lifecycle ----

    /// Tears down the active controllers and activates `name`.
    ///
    /// All-or-nothing: if any target fails to plug in, the ones created so far
    /// are released, no profile is current and the bus error is returned.
    pub fn select_profile(&mut self, name: Option<&str>) -> Result<(), FeederError> {
        self.release_all();

        let Some(name) = name else {
            info!("No profile selected");
            return Ok(());
        };
        let Some(profile) = self.config.profiles.get(name) else {
            warn!("Cannot select unknown profile '{}'", name);
            return Err(FeederError::UnknownProfile(name.to_string()));
        };

        let count = profile.gamepads.len().min(MAX_GAMEPADS);
        let mut created = Vec::with_capacity(count);
        for slot in 0..count {
            match self.bus.plug_in() {
                Ok(target) => {
                    debug!("Slot {} plugged in as {}", slot, target);
                    created.push(VirtualController::new(target));
                }
                Err(e) => {
                    error!("Failed to activate slot {} of profile '{}': {}", slot, name, e);
                    for pad in created {
                        if let Err(unplug_err) = self.bus.unplug(pad.target()) {
                            warn!("Rollback of {} failed: {}", pad.target(), unplug_err);
                        }
                    }
                    return Err(e.into());
                }
            }
        }

        for (slot, gamepad) in profile.gamepads.iter().take(count).enumerate() {
            self.lut.populate(slot, gamepad);
        }
        self.controllers = created;
        self.current = Some(name.to_string());
        info!(
            "Selected profile '{}' with {} virtual controller(s)",
            name,
            self.controllers.len()
        );
        Ok(())
    }

    /// Releases every bus target and clears all lookup rows.
    pub fn release_all(&mut self) {
        for pad in self.controllers.drain(..) {
            if let Err(e) = self.bus.unplug(pad.target()) {
                error!("Failed to release {}: {}", pad.target(), e);
            }
        }
        self.lut.clear_all();
        self.current = None;
    }

    pub fn add_profile(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.config.profiles.contains_key(name) {
            warn!("Cannot add profile '{}': empty or already exists", name);
            return false;
        }
        self.config
            .profiles
            .insert(name.to_string(), ConfigProfile::default());
        self.dirty = true;
        info!("Added profile '{}'", name);
        true
    }

    /// Removes `name`; if it was current, the first remaining profile takes over.
    pub fn remove_profile(&mut self, name: &str) -> Result<bool, FeederError> {
        if self.config.profiles.remove(name).is_none() {
            warn!("Cannot remove unknown profile '{}'", name);
            return Ok(false);
        }
        self.dirty = true;
        info!("Removed profile '{}'", name);

        if self.current.as_deref() == Some(name) {
            let next = self.config.profiles.keys().next().cloned();
            self.select_profile(next.as_deref())?;
        }
        Ok(true)
    }

    /// Replaces the configuration and re-selects the active profile if it survived.
    pub fn reload_config(&mut self, mut config: Config) -> Result<(), FeederError> {
        config.sanitize();
        let previous = self.current.clone();
        self.release_all();
        self.config = config;
        self.dirty = false;

        let next = previous
            .filter(|name| self.config.profiles.contains_key(name))
            .or_else(|| self.config.profiles.keys().next().cloned());
        info!("Configuration reloaded");
        self.select_profile(next.as_deref())
    }

    // ---- controller lifecycle ----

    /// Appends a gamepad to the current profile and plugs it in.
    ///
    /// Returns the new slot, or `None` without a current profile or when full.
    pub fn add_virtual_controller(&mut self) -> Result<Option<usize>, FeederError> {
        if self.current.is_none() {
            warn!("Cannot add a virtual controller without a selected profile");
            return Ok(None);
        }
        if self.controllers.len() >= MAX_GAMEPADS {
            warn!("Already at {} virtual controllers", MAX_GAMEPADS);
            return Ok(None);
        }

        let target = self.bus.plug_in()?;
        let gamepad = ConfigGamepad::default();
        let slot = self.controllers.len();
        self.lut.populate(slot, &gamepad);
        if let Some(profile) = self.current_profile_config_mut() {
            profile.gamepads.push(gamepad);
        }
        self.controllers.push(VirtualController::new(target));
        self.dirty = true;
        info!("Added virtual controller in slot {} ({})", slot, target);
        Ok(Some(slot))
    }

    /// Removes slot `slot` from the profile and releases its target.
    pub fn remove_virtual_controller(&mut self, slot: usize) -> Result<bool, FeederError> {
        if slot >= self.controllers.len() {
            warn!("No virtual controller in slot {}", slot);
            return Ok(false);
        }

        let pad = self.controllers.remove(slot);
        if let Some(profile) = self.current_profile_config_mut() {
            if slot < profile.gamepads.len() {
                profile.gamepads.remove(slot);
            }
        }
        self.rebuild_lut();
        self.dirty = true;
        info!("Removed virtual controller in slot {}", slot);

        self.bus.unplug(pad.target())?;
        Ok(true)
    }

    fn rebuild_lut(&mut self) {
        self.lut.clear_all();
        let Some(profile) = self
            .current
            .as_deref()
            .and_then(|name| self.config.profiles.get(name))
        else {
            return;
        };
        for (slot, gamepad) in profile.gamepads.iter().enumerate().take(MAX_GAMEPADS) {
            self.lut.populate(slot, gamepad);
        }
    }

    // ---- rebinding ----

    /// Arms device capture: the next press on `channel` becomes that channel's only source.
    pub fn start_rebind_device(&mut self, slot: usize, channel: InputChannel) -> bool {
        let Some(pad) = self.controllers.get_mut(slot) else {
            return false;
        };
        pad.set_pending_device_rebind(channel, true);
        info!("Slot {} waiting for a {} event to capture its source", slot, channel);
        true
    }

    /// Sets a channel filter directly and disarms a pending capture on it.
    pub fn rebind_device(&mut self, slot: usize, channel: InputChannel, filter: DeviceFilter) -> bool {
        let Some(pad) = self.controllers.get_mut(slot) else {
            return false;
        };
        pad.set_filter(channel, filter);
        pad.set_pending_device_rebind(channel, false);
        info!("Slot {} {} source set to {}", slot, channel, filter);
        true
    }

    /// Arms button capture: the next press rebinds `button` in this slot.
    pub fn start_rebind_button(&mut self, slot: usize, button: LogicalButton) -> bool {
        let Some(pad) = self.controllers.get_mut(slot) else {
            return false;
        };
        pad.pending_rebind_button = Some(button);
        info!("Slot {} waiting for a key to bind to {}", slot, button);
        true
    }

    pub fn cancel_rebind(&mut self, slot: usize) -> bool {
        let Some(pad) = self.controllers.get_mut(slot) else {
            return false;
        };
        pad.pending_rebind_keyboard = false;
        pad.pending_rebind_mouse = false;
        pad.pending_rebind_button = None;
        debug!("Slot {} rebind cancelled", slot);
        true
    }

    fn capture_button(&mut self, slot: usize, button: LogicalButton, key: KeyCode) {
        let Some(gamepad) = self
            .current_profile_config_mut()
            .and_then(|profile| profile.gamepads.get_mut(slot))
        else {
            return;
        };
        let displaced = gamepad.bind(button, key);
        let gamepad = gamepad.clone();
        self.lut.populate(slot, &gamepad);
        self.dirty = true;
        info!("Slot {}: bound {} to {}", slot, key, button);
        for other in &displaced {
            info!("Slot {}: {} lost its binding to {}", slot, other, key);
        }

        // Old keys no longer resolve, so their releases would never arrive.
        let before = self.controllers[slot].state.report();
        for released in std::iter::once(button).chain(displaced) {
            self.apply(slot, released, false);
        }
        if self.controllers[slot].state.report() != before {
            self.submit(slot);
        }
    }

    // ---- stick settings ----

    /// Switches a stick between keyboard and mouse drive.
    pub fn set_stick_mode(&mut self, slot: usize, stick: Stick, use_mouse: bool) -> bool {
        let Some(settings) = self.gamepad(slot).map(|g| g.stick(stick).clone()) else {
            return false;
        };
        self.set_stick_config(
            slot,
            stick,
            ConfigJoystick {
                use_mouse,
                ..settings
            },
        )
    }

    /// Replaces all parameters of one stick.
    pub fn set_stick_config(&mut self, slot: usize, stick: Stick, mut settings: ConfigJoystick) -> bool {
        if slot >= self.controllers.len() {
            return false;
        }
        settings.sanitize();
        let Some(gamepad) = self
            .current_profile_config_mut()
            .and_then(|profile| profile.gamepads.get_mut(slot))
        else {
            return false;
        };

        let mode_changed = gamepad.stick(stick).use_mouse != settings.use_mouse;
        let use_mouse = settings.use_mouse;
        let speed = settings.speed;
        *gamepad.stick_mut(stick) = settings;
        let gamepad = gamepad.clone();
        self.dirty = true;

        if mode_changed {
            self.lut.populate(slot, &gamepad);
            self.controllers[slot].reset_stick(stick);
            info!(
                "Slot {} {:?} stick now driven by {}",
                slot,
                stick,
                if use_mouse { "mouse" } else { "keyboard" }
            );
        } else if !use_mouse {
            let pad = &mut self.controllers[slot];
            let axes = keyboard_axes(pad.stick_keys[stick.index()], speed);
            pad.state.set_stick(stick, axes);
        }
        self.submit(slot);
        true
    }

    // ---- hot path ----

    /// Applies one key or mouse-button transition to every matching controller.
    pub fn handle_key_press(&mut self, device: DeviceHandle, key: KeyCode, pressed: bool) {
        if !key.is_bound() {
            return;
        }
        self.stats.key_events += 1;
        let channel = InputChannel::of_key(key);

        for slot in 0..self.controllers.len() {
            let pad = &mut self.controllers[slot];
            if !pad.filter(channel).accepts(device) {
                continue;
            }

            if pressed && pad.pending_device_rebind(channel) {
                pad.set_filter(channel, DeviceFilter::Only(device));
                pad.set_pending_device_rebind(channel, false);
                info!("Slot {} captured {} as its {} source", slot, device, channel);
            }

            let pending_button = if pressed {
                pad.pending_rebind_button.take()
            } else {
                None
            };
            if let Some(button) = pending_button {
                self.capture_button(slot, button, key);
                continue;
            }

            let Some(button) = self.lut.lookup(slot, key) else {
                continue;
            };
            trace!("Slot {}: {} -> {} ({})", slot, key, button, pressed);
            self.apply(slot, button, pressed);
            self.submit(slot);
        }
    }

    fn apply(&mut self, slot: usize, button: LogicalButton, pressed: bool) {
        match button.kind() {
            ButtonKind::Digital => self.controllers[slot].state.buttons.set(button, pressed),
            ButtonKind::Trigger(trigger) => self.controllers[slot].state.set_trigger(trigger, pressed),
            ButtonKind::StickDirection(stick, direction) => {
                let speed = self
                    .gamepad(slot)
                    .map(|g| g.stick(stick).speed)
                    .unwrap_or(1.0);
                let pad = &mut self.controllers[slot];
                let mask = &mut pad.stick_keys[stick.index()];
                mask.set(direction, pressed);
                let axes = keyboard_axes(*mask, speed);
                pad.state.set_stick(stick, axes);
            }
        }
    }

    /// Accumulates relative motion; resolved on the next [`Self::update`].
    pub fn handle_mouse_movement(&mut self, device: DeviceHandle, dx: i32, dy: i32) {
        self.stats.mouse_events += 1;
        for pad in self
            .controllers
            .iter_mut()
            .filter(|pad| pad.src_mouse.accepts(device))
        {
            pad.accum_mouse_x += dx as f32;
            pad.accum_mouse_y += dy as f32;
        }
    }

    /// Periodic analog tick: turns the accumulated mouse motion into stick positions.
    pub fn update(&mut self) {
        self.stats.ticks += 1;
        for slot in 0..self.controllers.len() {
            let (dx, dy) = self.controllers[slot].take_mouse_delta();
            let Some(gamepad) = self.gamepad(slot) else {
                continue;
            };
            if !gamepad.uses_mouse() {
                continue;
            }

            let resolved = [Stick::Left, Stick::Right].map(|stick| {
                let settings = gamepad.stick(stick);
                settings
                    .use_mouse
                    .then(|| (stick, resolve_mouse_stick(dx, dy, settings)))
            });
            let pad = &mut self.controllers[slot];
            for (stick, axes) in resolved.into_iter().flatten() {
                pad.state.set_stick(stick, axes);
            }
            self.submit(slot);
        }
    }

    fn submit(&mut self, slot: usize) {
        let Some(pad) = self.controllers.get(slot) else {
            return;
        };
        let report = pad.state.report();
        match self.bus.submit(pad.target(), &report) {
            Ok(()) => self.stats.reports_sent += 1,
            Err(e) => {
                self.stats.submit_failures += 1;
                warn!("Dropped report for slot {}: {}", slot, e);
            }
        }
    }
}
