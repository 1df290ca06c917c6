//! Per-slot virtual controller state
//!
//! Owns everything the engine needs for one emulated pad: its bus target,
//! live report state, per-channel device filters, pending rebind captures
//! and the mouse delta accumulated since the last analog tick.

use super::bus::TargetId;
use super::report::PadState;
use crate::input::keycode::KeyCode;
use crate::mapping::button::{LogicalButton, Stick};
use crate::mapping::stick::DirectionMask;
use std::fmt;

/// Opaque raw-input device handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(pub u64);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev:{:#x}", self.0)
    }
}

/// Which devices a channel accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceFilter {
    #[default]
    Any,
    Only(DeviceHandle),
}

impl DeviceFilter {
    pub fn accepts(&self, device: DeviceHandle) -> bool {
        match self {
            DeviceFilter::Any => true,
            DeviceFilter::Only(handle) => *handle == device,
        }
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFilter::Any => write!(f, "any"),
            DeviceFilter::Only(handle) => write!(f, "{}", handle),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputChannel {
    Keyboard,
    Mouse,
}

impl InputChannel {
    /// Mouse buttons travel on the mouse channel, everything else on the keyboard one.
    pub fn of_key(key: KeyCode) -> Self {
        if key.is_mouse_button() {
            InputChannel::Mouse
        } else {
            InputChannel::Keyboard
        }
    }
}

impl fmt::Display for InputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputChannel::Keyboard => write!(f, "keyboard"),
            InputChannel::Mouse => write!(f, "mouse"),
        }
    }
}

#[derive(Debug)]
pub struct VirtualController {
    target: TargetId,
    pub src_keyboard: DeviceFilter,
    pub src_mouse: DeviceFilter,
    pub pending_rebind_keyboard: bool,
    pub pending_rebind_mouse: bool,
    pub pending_rebind_button: Option<LogicalButton>,
    pub(crate) stick_keys: [DirectionMask; 2],
    pub(crate) accum_mouse_x: f32,
    pub(crate) accum_mouse_y: f32,
    pub(crate) state: PadState,
}

impl VirtualController {
    pub fn new(target: TargetId) -> Self {
        Self {
            target,
            src_keyboard: DeviceFilter::Any,
            src_mouse: DeviceFilter::Any,
            pending_rebind_keyboard: false,
            pending_rebind_mouse: false,
            pending_rebind_button: None,
            stick_keys: [DirectionMask::default(); 2],
            accum_mouse_x: 0.0,
            accum_mouse_y: 0.0,
            state: PadState::default(),
        }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn state(&self) -> &PadState {
        &self.state
    }

    pub fn filter(&self, channel: InputChannel) -> DeviceFilter {
        match channel {
            InputChannel::Keyboard => self.src_keyboard,
            InputChannel::Mouse => self.src_mouse,
        }
    }

    pub fn set_filter(&mut self, channel: InputChannel, filter: DeviceFilter) {
        match channel {
            InputChannel::Keyboard => self.src_keyboard = filter,
            InputChannel::Mouse => self.src_mouse = filter,
        }
    }

    pub fn pending_device_rebind(&self, channel: InputChannel) -> bool {
        match channel {
            InputChannel::Keyboard => self.pending_rebind_keyboard,
            InputChannel::Mouse => self.pending_rebind_mouse,
        }
    }

    pub fn set_pending_device_rebind(&mut self, channel: InputChannel, pending: bool) {
        match channel {
            InputChannel::Keyboard => self.pending_rebind_keyboard = pending,
            InputChannel::Mouse => self.pending_rebind_mouse = pending,
        }
    }

    pub fn has_pending_rebind(&self) -> bool {
        self.pending_rebind_keyboard || self.pending_rebind_mouse || self.pending_rebind_button.is_some()
    }

    pub fn accumulated_mouse(&self) -> (f32, f32) {
        (self.accum_mouse_x, self.accum_mouse_y)
    }

    /// Reads and zeroes the mouse accumulator.
    pub(crate) fn take_mouse_delta(&mut self) -> (f32, f32) {
        let delta = (self.accum_mouse_x, self.accum_mouse_y);
        self.accum_mouse_x = 0.0;
        self.accum_mouse_y = 0.0;
        delta
    }

    /// Forgets held keyboard directions and centers the stick.
    pub(crate) fn reset_stick(&mut self, stick: Stick) {
        self.stick_keys[stick.index()].clear();
        self.state.set_stick(stick, Default::default());
    }
}
