//! Virtual bus seam
//!
//! The engine drives every emulated controller through [`VirtualBus`]:
//!
//! ```text
//! plug_in ──► submit* ──► unplug
//! ```
//!
//! [`LoopbackBus`] keeps everything in memory. It backs headless runs and the
//! test suite; the ViGEm backend lives in [`super::vigem`].

use super::report::XusbReport;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, trace};

/// Bus-assigned identity of one plugged-in target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Bus connection error: {0}")]
    Connection(String),

    #[error("Target registration failed: {0}")]
    PlugIn(String),

    #[error("Report submission failed for {0}: {1}")]
    Submit(TargetId, String),

    #[error("Target removal failed for {0}: {1}")]
    Unplug(TargetId, String),

    #[error("Unknown target: {0}")]
    UnknownTarget(TargetId),
}

pub trait VirtualBus {
    /// Registers a new wired Xbox 360 target.
    fn plug_in(&mut self) -> Result<TargetId, BusError>;

    fn submit(&mut self, target: TargetId, report: &XusbReport) -> Result<(), BusError>;

    fn unplug(&mut self, target: TargetId) -> Result<(), BusError>;
}

impl<B: VirtualBus + ?Sized> VirtualBus for Box<B> {
    fn plug_in(&mut self) -> Result<TargetId, BusError> {
        (**self).plug_in()
    }

    fn submit(&mut self, target: TargetId, report: &XusbReport) -> Result<(), BusError> {
        (**self).submit(target, report)
    }

    fn unplug(&mut self, target: TargetId) -> Result<(), BusError> {
        (**self).unplug(target)
    }
}

/// Bus call as seen by [`LoopbackBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusEvent {
    PlugIn(TargetId),
    Submit(TargetId, XusbReport),
    Unplug(TargetId),
}

const DEFAULT_HISTORY: usize = 1024;

/// In-memory bus that records every call.
#[derive(Debug)]
pub struct LoopbackBus {
    next_id: u32,
    plugged: Vec<TargetId>,
    history: VecDeque<BusEvent>,
    history_limit: usize,
    submitted: u64,
    fail_plug_in_after: Option<usize>,
    fail_submit: bool,
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl LoopbackBus {
    pub fn new(history_limit: usize) -> Self {
        info!("Using loopback bus, reports are recorded but not delivered to a driver");
        Self {
            next_id: 1,
            plugged: Vec::new(),
            history: VecDeque::with_capacity(history_limit.min(DEFAULT_HISTORY)),
            history_limit: history_limit.max(1),
            submitted: 0,
            fail_plug_in_after: None,
            fail_submit: false,
        }
    }

    /// Lets `n` more plug-ins succeed, then fails every following one.
    pub fn fail_plug_in_after(&mut self, n: usize) {
        self.fail_plug_in_after = Some(n);
    }

    pub fn fail_submits(&mut self, fail: bool) {
        self.fail_submit = fail;
    }

    pub fn plugged(&self) -> &[TargetId] {
        &self.plugged
    }

    pub fn history(&self) -> impl Iterator<Item = &BusEvent> {
        self.history.iter()
    }

    /// Reports submitted to `target`, oldest first.
    pub fn reports_for(&self, target: TargetId) -> Vec<XusbReport> {
        self.history
            .iter()
            .filter_map(|event| match event {
                BusEvent::Submit(id, report) if *id == target => Some(*report),
                _ => None,
            })
            .collect()
    }

    pub fn last_report(&self, target: TargetId) -> Option<XusbReport> {
        self.history.iter().rev().find_map(|event| match event {
            BusEvent::Submit(id, report) if *id == target => Some(*report),
            _ => None,
        })
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    fn record(&mut self, event: BusEvent) {
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }
}

impl VirtualBus for LoopbackBus {
    fn plug_in(&mut self) -> Result<TargetId, BusError> {
        if let Some(remaining) = self.fail_plug_in_after.as_mut() {
            if *remaining == 0 {
                return Err(BusError::PlugIn("loopback plug-in rejected".to_string()));
            }
            *remaining -= 1;
        }
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.plugged.push(id);
        self.record(BusEvent::PlugIn(id));
        debug!("Loopback plugged in {}", id);
        Ok(id)
    }

    fn submit(&mut self, target: TargetId, report: &XusbReport) -> Result<(), BusError> {
        if !self.plugged.contains(&target) {
            return Err(BusError::UnknownTarget(target));
        }
        if self.fail_submit {
            return Err(BusError::Submit(target, "loopback submit rejected".to_string()));
        }
        trace!("Loopback report for {}: {:?}", target, report);
        self.submitted += 1;
        self.record(BusEvent::Submit(target, *report));
        Ok(())
    }

    fn unplug(&mut self, target: TargetId) -> Result<(), BusError> {
        let position = self
            .plugged
            .iter()
            .position(|id| *id == target)
            .ok_or(BusError::UnknownTarget(target))?;
        self.plugged.remove(position);
        self.record(BusEvent::Unplug(target));
        debug!("Loopback unplugged {}", target);
        Ok(())
    }
}
