//! ViGEmBus backend (Windows, `vigem` feature)
//!
//! One client connection is shared by all wired Xbox 360 targets.

use super::bus::{BusError, TargetId, VirtualBus};
use super::report::XusbReport;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vigem_client::{Client, XButtons, XGamepad, Xbox360Wired};

pub struct ViGEmBus {
    client: Arc<Client>,
    targets: HashMap<TargetId, Xbox360Wired<Arc<Client>>>,
    next_id: u32,
}

impl ViGEmBus {
    pub fn connect() -> Result<Self, BusError> {
        let client = Client::connect().map_err(|e| BusError::Connection(e.to_string()))?;
        info!("Connected to ViGEmBus");
        Ok(Self {
            client: Arc::new(client),
            targets: HashMap::new(),
            next_id: 0,
        })
    }
}

impl VirtualBus for ViGEmBus {
    fn plug_in(&mut self) -> Result<TargetId, BusError> {
        let mut target = Xbox360Wired::new(self.client.clone(), vigem_client::TargetId::XBOX360_WIRED);
        target
            .plugin()
            .map_err(|e| BusError::PlugIn(e.to_string()))?;
        target
            .wait_ready()
            .map_err(|e| BusError::PlugIn(e.to_string()))?;

        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.targets.insert(id, target);
        info!("Plugged in Xbox 360 {}", id);
        Ok(id)
    }

    fn submit(&mut self, target: TargetId, report: &XusbReport) -> Result<(), BusError> {
        let pad = self
            .targets
            .get_mut(&target)
            .ok_or(BusError::UnknownTarget(target))?;
        let gamepad = XGamepad {
            buttons: XButtons {
                raw: report.buttons,
            },
            left_trigger: report.left_trigger,
            right_trigger: report.right_trigger,
            thumb_lx: report.thumb_lx,
            thumb_ly: report.thumb_ly,
            thumb_rx: report.thumb_rx,
            thumb_ry: report.thumb_ry,
        };
        pad.update(&gamepad)
            .map_err(|e| BusError::Submit(target, e.to_string()))
    }

    fn unplug(&mut self, target: TargetId) -> Result<(), BusError> {
        let mut pad = self
            .targets
            .remove(&target)
            .ok_or(BusError::UnknownTarget(target))?;
        pad.unplug()
            .map_err(|e| BusError::Unplug(target, e.to_string()))?;
        debug!("Unplugged {}", target);
        Ok(())
    }
}

impl Drop for ViGEmBus {
    fn drop(&mut self) {
        for (id, mut pad) in self.targets.drain() {
            if let Err(e) = pad.unplug() {
                warn!("Failed to unplug {} on shutdown: {}", id, e);
            }
        }
    }
}
