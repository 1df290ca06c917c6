//! Physical input side: key codes and raw packet normalization

pub mod keycode;
pub mod raw;

pub use keycode::KeyCode;
pub use raw::{InputEvent, InputNormalizer, RawKeyboard, RawMouse};
