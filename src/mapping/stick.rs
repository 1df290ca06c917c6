//! Analog stick synthesis
//!
//! Two sources drive a stick:
//!
//! - **Keyboard mode**: four direction keys form a [`DirectionMask`]; each held
//!   direction contributes `±speed` full scale, opposite directions cancel.
//! - **Mouse mode**: the mouse delta accumulated over one tick is turned into a
//!   polar `(phi, tilt)` pair and projected onto a rounded square.
//!
//! # Rounded square
//!
//! ```text
//!   P3 (-1, 1) ── P2 (0, 1) ── P1 (1, 1)
//!       │                          │
//!   P4 (-1, 0)        ·        P0 (1, 0)      mouse space, y grows downward
//!       │                          │
//!   P5 (-1,-1) ── P6 (0,-1) ── P7 (1,-1)
//! ```
//!
//! Each 45° octant `k` interpolates linearly from `P[k]` to `P[k+1]`, so one
//! axis always sits at its extreme and the curve is continuous at every
//! octant boundary. The mouse y axis is flipped on output: pushing the mouse
//! away from you pushes the stick up.

use super::button::Direction;
use crate::config::ConfigJoystick;
use crate::controller::report::StickAxes;
use std::f32::consts::{FRAC_PI_4, TAU};

pub const AXIS_MAX: f32 = 32767.0;

/// Tilt within this distance of 1.0 snaps to full deflection.
pub const FULL_TILT_SNAP: f32 = 0.005;

const SQUARE: [(f32, f32); 9] = [
    (1.0, 0.0),
    (1.0, 1.0),
    (0.0, 1.0),
    (-1.0, 1.0),
    (-1.0, 0.0),
    (-1.0, -1.0),
    (0.0, -1.0),
    (1.0, -1.0),
    (1.0, 0.0),
];

/// Held stick directions, one bit each.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectionMask(u8);

impl DirectionMask {
    fn bit(direction: Direction) -> u8 {
        match direction {
            Direction::Up => 0b0001,
            Direction::Down => 0b0010,
            Direction::Left => 0b0100,
            Direction::Right => 0b1000,
        }
    }

    pub fn set(&mut self, direction: Direction, held: bool) {
        if held {
            self.0 |= Self::bit(direction);
        } else {
            self.0 &= !Self::bit(direction);
        }
    }

    pub fn is_held(&self, direction: Direction) -> bool {
        self.0 & Self::bit(direction) != 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// Axis pair for a keyboard-driven stick.
pub fn keyboard_axes(mask: DirectionMask, speed: f32) -> StickAxes {
    let magnitude = (AXIS_MAX * speed.clamp(0.0, 1.0)).round() as i32;
    let component = |positive: Direction, negative: Direction| -> i16 {
        let mut value = 0;
        if mask.is_held(positive) {
            value += magnitude;
        }
        if mask.is_held(negative) {
            value -= magnitude;
        }
        value as i16
    };
    StickAxes {
        x: component(Direction::Right, Direction::Left),
        y: component(Direction::Up, Direction::Down),
    }
}

/// Projects a polar input onto the rounded square.
///
/// `phi` is the mouse-space angle in `[0, 2π)`; anything else (including NaN)
/// yields a centered stick.
pub fn calc_joystick_position(phi: f32, tilt: f32, invert_x: bool, invert_y: bool) -> StickAxes {
    if !(0.0..TAU).contains(&phi) {
        return StickAxes::default();
    }

    let mut tilt = if tilt.is_nan() { 0.0 } else { tilt.clamp(0.0, 1.0) };
    if 1.0 - tilt < FULL_TILT_SNAP {
        tilt = 1.0;
    }

    let sector = phi / FRAC_PI_4;
    let octant = (sector.floor() as usize).min(7);
    let fraction = sector - octant as f32;
    let (x0, y0) = SQUARE[octant];
    let (x1, y1) = SQUARE[octant + 1];
    let x = x0 + (x1 - x0) * fraction;
    let mouse_y = y0 + (y1 - y0) * fraction;

    let mut y = -mouse_y;
    let mut x = x;
    if invert_x {
        x = -x;
    }
    if invert_y {
        y = -y;
    }

    StickAxes {
        x: scale(x * tilt),
        y: scale(y * tilt),
    }
}

fn scale(unit: f32) -> i16 {
    (unit * AXIS_MAX).round().clamp(-AXIS_MAX, AXIS_MAX) as i16
}

/// Resolves one tick of accumulated mouse motion for a mouse-mode stick.
///
/// `sensitivity` is the outer radius: a delta of that many counts per tick
/// reaches full deflection. The deadzone is inclusive of its boundary.
pub fn resolve_mouse_stick(dx: f32, dy: f32, settings: &ConfigJoystick) -> StickAxes {
    let r = dx.hypot(dy);
    let outer = settings.sensitivity;
    let inner = settings.deadzone * outer;
    if !r.is_finite() || r <= inner || r == 0.0 {
        return StickAxes::default();
    }

    let span = outer - inner;
    let tilt = if span <= 0.0 {
        1.0
    } else {
        ((r - inner) / span).min(1.0).powf(settings.non_linear)
    };

    let mut phi = dy.atan2(dx);
    if phi < 0.0 {
        phi += TAU;
    }
    if phi >= TAU {
        phi = 0.0;
    }

    calc_joystick_position(phi, tilt, settings.invert_x, settings.invert_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn mouse_stick(sensitivity: f32, deadzone: f32) -> ConfigJoystick {
        ConfigJoystick {
            sensitivity,
            deadzone,
            non_linear: 1.0,
            use_mouse: true,
            ..ConfigJoystick::default()
        }
    }

    #[test]
    fn cardinal_directions() {
        let right = calc_joystick_position(0.0, 1.0, false, false);
        assert_eq!((right.x, right.y), (32767, 0));
        // mouse moving down the screen pulls the stick down
        let down = calc_joystick_position(FRAC_PI_2, 1.0, false, false);
        assert_eq!((down.x, down.y), (0, -32767));
        let left = calc_joystick_position(PI, 1.0, false, false);
        assert_eq!((left.x, left.y), (-32767, 0));
        let up = calc_joystick_position(3.0 * FRAC_PI_2, 1.0, false, false);
        assert_eq!((up.x, up.y), (0, 32767));
    }

    #[test]
    fn diagonals_reach_the_corner() {
        let corner = calc_joystick_position(FRAC_PI_4, 1.0, false, false);
        assert_eq!((corner.x, corner.y), (32767, -32767));
    }

    #[test]
    fn octant_boundaries_are_continuous() {
        let eps = 1e-4;
        for k in 1..8 {
            let boundary = k as f32 * FRAC_PI_4;
            let before = calc_joystick_position(boundary - eps, 1.0, false, false);
            let after = calc_joystick_position(boundary + eps, 1.0, false, false);
            assert!(
                (before.x as i32 - after.x as i32).abs() <= 16
                    && (before.y as i32 - after.y as i32).abs() <= 16,
                "jump at boundary {}: {:?} vs {:?}",
                k,
                before,
                after
            );
        }
        // wrap-around boundary at 0 / 2π
        let before = calc_joystick_position(TAU - eps, 1.0, false, false);
        let after = calc_joystick_position(eps, 1.0, false, false);
        assert!((before.y as i32 - after.y as i32).abs() <= 16);
        assert_eq!(before.x, after.x);
    }

    #[test]
    fn out_of_range_angle_is_centered() {
        assert_eq!(calc_joystick_position(-0.1, 1.0, false, false), StickAxes::default());
        assert_eq!(calc_joystick_position(TAU, 1.0, false, false), StickAxes::default());
        assert_eq!(calc_joystick_position(f32::NAN, 1.0, false, false), StickAxes::default());
    }

    #[test]
    fn near_full_tilt_snaps() {
        let snapped = calc_joystick_position(0.0, 0.996, false, false);
        assert_eq!(snapped.x, 32767);
        let not_snapped = calc_joystick_position(0.0, 0.99, false, false);
        assert!(not_snapped.x < 32767);
    }

    #[test]
    fn invert_flags_flip_each_axis() {
        let normal = calc_joystick_position(FRAC_PI_4, 1.0, false, false);
        let flipped = calc_joystick_position(FRAC_PI_4, 1.0, true, true);
        assert_eq!((flipped.x, flipped.y), (-normal.x, -normal.y));
    }

    #[test]
    fn deadzone_boundary_is_inclusive() {
        let settings = mouse_stick(40.0, 0.25);
        // exactly on the deadzone radius (10 counts)
        assert_eq!(resolve_mouse_stick(10.0, 0.0, &settings), StickAxes::default());
        assert_eq!(resolve_mouse_stick(6.0, 8.0, &settings), StickAxes::default());
        let outside = resolve_mouse_stick(10.01, 0.0, &settings);
        assert!(outside.x > 0);
        assert_eq!(outside.y, 0);
    }

    #[test]
    fn full_radius_saturates() {
        let settings = mouse_stick(40.0, 0.1);
        let axes = resolve_mouse_stick(0.0, -400.0, &settings);
        assert_eq!((axes.x, axes.y), (0, 32767));
    }

    #[test]
    fn degenerate_radius_is_full_tilt() {
        let settings = mouse_stick(20.0, 1.0);
        assert_eq!(resolve_mouse_stick(20.0, 0.0, &settings), StickAxes::default());
        assert_eq!(resolve_mouse_stick(21.0, 0.0, &settings).x, 32767);
    }

    #[test]
    fn opposite_keys_cancel() {
        for speed in [0.0, 0.3, 1.0] {
            let mut mask = DirectionMask::default();
            mask.set(Direction::Left, true);
            mask.set(Direction::Right, true);
            mask.set(Direction::Up, true);
            let axes = keyboard_axes(mask, speed);
            assert_eq!(axes.x, 0);
            assert_eq!(axes.y, (32767.0 * speed).round() as i16);
        }
    }

    #[test]
    fn released_direction_clears_axis() {
        let mut mask = DirectionMask::default();
        mask.set(Direction::Down, true);
        assert_eq!(keyboard_axes(mask, 0.5).y, -16384);
        mask.set(Direction::Down, false);
        assert_eq!(keyboard_axes(mask, 0.5), StickAxes::default());
    }

    proptest! {
        #[test]
        fn one_axis_always_at_tilt(phi in 0.0f32..TAU, tilt in 0.0f32..0.99) {
            let axes = calc_joystick_position(phi, tilt, false, false);
            let extreme = (tilt * AXIS_MAX).round() as i32;
            let reached = (axes.x as i32).abs().max((axes.y as i32).abs());
            prop_assert_eq!(reached, extreme);
        }

        #[test]
        fn mouse_output_stays_in_range(dx in -1000.0f32..1000.0, dy in -1000.0f32..1000.0) {
            let settings = ConfigJoystick { use_mouse: true, ..ConfigJoystick::default() };
            let axes = resolve_mouse_stick(dx, dy, &settings);
            prop_assert!(axes.x > i16::MIN && axes.y > i16::MIN);
        }
    }
}
