//! Virtual controller side of the feeder
//!
//! 1. [`report`] - live pad state and the XUSB wire report
//! 2. [`virtual_pad`] - per-slot controller with device filters and rebind flags
//! 3. [`bus`] - the bus seam plus an in-memory loopback
//! 4. `vigem` - ViGEmBus backend (Windows with the `vigem` feature)
//!
//! # Architecture
//!
//! ```text
//! FeederEngine ──► VirtualController ──► PadState ──► XusbReport ──► VirtualBus
//!                  (filters, rebinds)                                (ViGEm / loopback)
//! ```

pub mod bus;
pub mod report;
pub mod virtual_pad;
#[cfg(all(windows, feature = "vigem"))]
pub mod vigem;
