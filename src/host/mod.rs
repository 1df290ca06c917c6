//! Feeder host: the single task that owns the engine
//!
//! Every engine call is serialized through one `tokio::select!` loop, so the
//! engine itself needs no locking.
//!
//! # State Machine
//!
//! ```text
//! Configured ──► Running ──► Stopped
//!                  │  ▲
//!                  └──┘ commands / analog ticks
//! ```
//!
//! # Architecture
//!
//! ```text
//! raw input ─┐
//! console ───┼──► mpsc<HostCommand> ──► FeederHost ──► FeederEngine ──► VirtualBus
//! UI calls ──┘                              ▲
//!                              interval (MouseCheckFrequency)
//! ```

pub mod console;

use crate::config::{Config, ConfigJoystick};
use crate::controller::bus::{TargetId, VirtualBus};
use crate::controller::report::XusbReport;
use crate::controller::virtual_pad::{DeviceFilter, InputChannel};
use crate::input::keycode::KeyCode;
use crate::input::raw::{InputEvent, InputNormalizer, RawKeyboard, RawMouse};
use crate::mapping::button::{LogicalButton, Stick};
use crate::mapping::engine::{EngineStats, FeederEngine};
use crate::persistence::ConfigStore;
use chrono::{DateTime, Local};
use color_eyre::{eyre::eyre, Result};
use statum::{machine, state};
use std::ops::ControlFlow;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type DynEngine = FeederEngine<Box<dyn VirtualBus>>;

/// Everything the host can be asked to do.
#[derive(Debug)]
pub enum HostCommand {
    Keyboard(RawKeyboard),
    Mouse(RawMouse),
    SelectProfile {
        name: Option<String>,
    },
    AddProfile {
        name: String,
    },
    RemoveProfile {
        name: String,
    },
    AddVirtualController,
    RemoveVirtualController {
        slot: usize,
    },
    StartRebindDevice {
        slot: usize,
        channel: InputChannel,
    },
    RebindDevice {
        slot: usize,
        channel: InputChannel,
        filter: DeviceFilter,
    },
    StartRebindButton {
        slot: usize,
        button: LogicalButton,
    },
    CancelRebind {
        slot: usize,
    },
    SetStickMode {
        slot: usize,
        stick: Stick,
        use_mouse: bool,
    },
    SetStickConfig {
        slot: usize,
        stick: Stick,
        settings: ConfigJoystick,
    },
    ReloadConfig,
    SaveConfig,
    Snapshot {
        response_tx: oneshot::Sender<HostSnapshot>,
    },
    Shutdown,
}

#[derive(Clone, Debug)]
pub struct ControllerSnapshot {
    pub slot: usize,
    pub target: TargetId,
    pub report: XusbReport,
    pub src_keyboard: DeviceFilter,
    pub src_mouse: DeviceFilter,
    pub pending_rebind_keyboard: bool,
    pub pending_rebind_mouse: bool,
    pub pending_rebind_button: Option<LogicalButton>,
}

/// Read-only view for display collaborators.
#[derive(Clone, Debug)]
pub struct HostSnapshot {
    pub profile: Option<String>,
    pub profiles: Vec<String>,
    pub controllers: Vec<ControllerSnapshot>,
    pub ui_visible: bool,
    pub cursor_captured: bool,
    pub stats: EngineStats,
}

#[state]
#[derive(Debug, Clone)]
pub enum HostState {
    Configured,
    Running,
    Stopped,
}

#[machine]
pub struct FeederHost<S: HostState> {
    engine: DynEngine,
    commands: mpsc::Receiver<HostCommand>,
    normalizer: InputNormalizer,
    store: Option<ConfigStore>,
    shutdown: CancellationToken,
    ui_visible: bool,
    cursor_captured: bool,
}

impl<S: HostState> FeederHost<S> {
    pub fn engine(&self) -> &DynEngine {
        &self.engine
    }
}

impl FeederHost<Configured> {
    pub fn create(
        engine: DynEngine,
        commands: mpsc::Receiver<HostCommand>,
        store: Option<ConfigStore>,
        shutdown: CancellationToken,
    ) -> Self {
        info!(
            "Feeder host configured with profile {:?}",
            engine.current_profile()
        );
        Self::new(
            engine,
            commands,
            InputNormalizer::new(),
            store,
            shutdown,
            false, // ui_visible
            false, // cursor_captured
        )
    }

    pub fn start(self) -> FeederHost<Running> {
        info!("Starting feeder host");
        self.transition()
    }
}

impl FeederHost<Running> {
    /// Main loop; returns once shutdown was requested.
    pub async fn run_until_shutdown(mut self) -> FeederHost<Stopped> {
        let mut period = self.engine.config().mouse_check_frequency_ms;
        let mut ticker = analog_ticker(period);
        let shutdown = self.shutdown.clone();
        let mut commands_open = true;

        let stats_interval = chrono::Duration::seconds(30);
        let mut last_stats: DateTime<Local> = Local::now();
        let mut last_counts = self.engine.stats();

        info!("Feeder host running, analog tick every {} ms", period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.engine.update();
                }
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => {
                        if self.handle_command(command).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        info!("Command channel closed, continuing with analog ticks only");
                        commands_open = false;
                    }
                }
            }

            let now = Local::now();
            if now - last_stats > stats_interval {
                let counts = self.engine.stats();
                info!(
                    "Stats since {}: {} key events, {} mouse events, {} reports, {} failed",
                    last_stats.format("%H:%M:%S"),
                    counts.key_events - last_counts.key_events,
                    counts.mouse_events - last_counts.mouse_events,
                    counts.reports_sent - last_counts.reports_sent,
                    counts.submit_failures - last_counts.submit_failures,
                );
                last_stats = now;
                last_counts = counts;
            }

            let configured = self.engine.config().mouse_check_frequency_ms;
            if configured != period {
                info!("Updating analog tick to {} ms", configured);
                period = configured;
                ticker = analog_ticker(period);
            }
        }

        self.transition()
    }

    async fn handle_command(&mut self, command: HostCommand) -> ControlFlow<()> {
        match command {
            HostCommand::Keyboard(raw) => {
                if let Some(event) = self.normalizer.keyboard(&raw) {
                    self.dispatch(event);
                }
            }
            HostCommand::Mouse(raw) => {
                for event in self.normalizer.mouse(&raw) {
                    self.dispatch(event);
                }
            }
            HostCommand::SelectProfile { name } => {
                if let Err(e) = self.engine.select_profile(name.as_deref()) {
                    error!("Failed to select profile {:?}: {}", name, e);
                }
            }
            HostCommand::AddProfile { name } => {
                self.engine.add_profile(&name);
            }
            HostCommand::RemoveProfile { name } => {
                if let Err(e) = self.engine.remove_profile(&name) {
                    error!("Failed to activate a profile after removing '{}': {}", name, e);
                }
            }
            HostCommand::AddVirtualController => match self.engine.add_virtual_controller() {
                Ok(Some(slot)) => debug!("Virtual controller added in slot {}", slot),
                Ok(None) => {}
                Err(e) => error!("Failed to add virtual controller: {}", e),
            },
            HostCommand::RemoveVirtualController { slot } => {
                if let Err(e) = self.engine.remove_virtual_controller(slot) {
                    error!("Failed to release virtual controller {}: {}", slot, e);
                }
            }
            HostCommand::StartRebindDevice { slot, channel } => {
                self.engine.start_rebind_device(slot, channel);
            }
            HostCommand::RebindDevice {
                slot,
                channel,
                filter,
            } => {
                self.engine.rebind_device(slot, channel, filter);
            }
            HostCommand::StartRebindButton { slot, button } => {
                self.engine.start_rebind_button(slot, button);
            }
            HostCommand::CancelRebind { slot } => {
                self.engine.cancel_rebind(slot);
            }
            HostCommand::SetStickMode {
                slot,
                stick,
                use_mouse,
            } => {
                self.engine.set_stick_mode(slot, stick, use_mouse);
            }
            HostCommand::SetStickConfig {
                slot,
                stick,
                settings,
            } => {
                self.engine.set_stick_config(slot, stick, settings);
            }
            HostCommand::ReloadConfig => {
                if let Err(e) = self.reload().await {
                    error!("Failed to reload config: {}", e);
                }
            }
            HostCommand::SaveConfig => {
                if let Err(e) = self.save().await {
                    error!("Failed to save config: {}", e);
                }
            }
            HostCommand::Snapshot { response_tx } => {
                if response_tx.send(self.snapshot()).is_err() {
                    warn!("Snapshot requester went away");
                }
            }
            HostCommand::Shutdown => {
                info!("Shutdown command received");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn dispatch(&mut self, event: InputEvent) {
        match event {
            InputEvent::Key {
                device,
                key,
                pressed,
            } => {
                if self.consume_hotkey(key, pressed) {
                    return;
                }
                self.engine.handle_key_press(device, key, pressed);
            }
            InputEvent::Move { device, dx, dy } => {
                self.engine.handle_mouse_movement(device, dx, dy);
            }
        }
    }

    /// Hotkeys never reach the engine; they act on press.
    fn consume_hotkey(&mut self, key: KeyCode, pressed: bool) -> bool {
        let config: &Config = self.engine.config();
        if key == config.hotkey_show_ui && key.is_bound() {
            if pressed {
                self.ui_visible = !self.ui_visible;
                info!("UI {}", if self.ui_visible { "shown" } else { "hidden" });
            }
            return true;
        }
        if key == config.hotkey_capture_cursor && key.is_bound() {
            if pressed {
                self.cursor_captured = !self.cursor_captured;
                info!(
                    "Cursor {}",
                    if self.cursor_captured { "captured" } else { "released" }
                );
            }
            return true;
        }
        false
    }

    async fn reload(&mut self) -> Result<()> {
        let store = self
            .store
            .as_mut()
            .ok_or_else(|| eyre!("No config file attached"))?;
        let config = store.load().await?;
        self.engine
            .reload_config(config)
            .map_err(|e| eyre!("Failed to activate reloaded config: {}", e))
    }

    async fn save(&mut self) -> Result<()> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| eyre!("No config file attached"))?;
        store.save(self.engine.config()).await?;
        self.engine.take_dirty();
        info!("Config saved to {}", store.effective_path().display());
        Ok(())
    }

    fn snapshot(&self) -> HostSnapshot {
        let controllers = self
            .engine
            .controllers()
            .iter()
            .enumerate()
            .map(|(slot, pad)| ControllerSnapshot {
                slot,
                target: pad.target(),
                report: pad.state().report(),
                src_keyboard: pad.src_keyboard,
                src_mouse: pad.src_mouse,
                pending_rebind_keyboard: pad.pending_rebind_keyboard,
                pending_rebind_mouse: pad.pending_rebind_mouse,
                pending_rebind_button: pad.pending_rebind_button,
            })
            .collect();
        HostSnapshot {
            profile: self.engine.current_profile().map(str::to_string),
            profiles: self.engine.config().profiles.keys().cloned().collect(),
            controllers,
            ui_visible: self.ui_visible,
            cursor_captured: self.cursor_captured,
            stats: self.engine.stats(),
        }
    }
}

impl FeederHost<Stopped> {
    /// Releases every bus target, then persists unsaved changes.
    pub async fn finish(mut self) -> Result<EngineStats> {
        self.engine.release_all();
        let stats = self.engine.stats();
        info!(
            "Feeder host stopped: {} key events, {} mouse events, {} reports sent",
            stats.key_events, stats.mouse_events, stats.reports_sent
        );

        if self.engine.take_dirty() {
            if let Some(store) = &self.store {
                info!("Saving modified config before exit");
                store.save(self.engine.config()).await?;
            }
        }
        Ok(stats)
    }
}

fn analog_ticker(period_ms: u64) -> Interval {
    let mut ticker = tokio::time::interval(Duration::from_millis(period_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigGamepad, ConfigProfile};
    use crate::controller::bus::{BusError, LoopbackBus};
    use crate::controller::virtual_pad::DeviceHandle;
    use std::sync::{Arc, Mutex};

    const DEV: DeviceHandle = DeviceHandle(3);

    fn host_with(config: Config, store: Option<ConfigStore>) -> (FeederHost<Running>, mpsc::Sender<HostCommand>) {
        let bus: Box<dyn VirtualBus> = Box::new(LoopbackBus::default());
        let engine = FeederEngine::new(config, bus).unwrap();
        let (tx, rx) = mpsc::channel(64);
        let host = FeederHost::create(engine, rx, store, CancellationToken::new()).start();
        (host, tx)
    }

    fn config_with_a() -> Config {
        let mut pad = ConfigGamepad::default();
        pad.bind(LogicalButton::A, KeyCode(0x41));
        let mut config = Config::default();
        config.hotkey_show_ui = KeyCode(0x78);
        config
            .profiles
            .insert("main".into(), ConfigProfile { gamepads: vec![pad] });
        config
    }

    async fn snapshot(tx: &mpsc::Sender<HostCommand>) -> HostSnapshot {
        let (response_tx, response_rx) = oneshot::channel();
        tx.send(HostCommand::Snapshot { response_tx }).await.unwrap();
        response_rx.await.unwrap()
    }

    #[tokio::test]
    async fn raw_key_reaches_the_controller() {
        let (host, tx) = host_with(config_with_a(), None);
        let driver = async {
            tx.send(HostCommand::Keyboard(RawKeyboard::key(DEV, KeyCode(0x41), true)))
                .await
                .unwrap();
            let snap = snapshot(&tx).await;
            tx.send(HostCommand::Shutdown).await.unwrap();
            snap
        };
        let (stopped, snap) = tokio::join!(host.run_until_shutdown(), driver);
        assert_eq!(snap.profile.as_deref(), Some("main"));
        assert_eq!(snap.controllers[0].report.buttons, 0x1000);
        let stats = stopped.finish().await.unwrap();
        assert_eq!(stats.key_events, 1);
    }

    #[tokio::test]
    async fn hotkeys_are_consumed() {
        let mut config = config_with_a();
        config.profiles.get_mut("main").unwrap().gamepads[0].bind(LogicalButton::B, KeyCode(0x78));
        let (host, tx) = host_with(config, None);
        let driver = async {
            tx.send(HostCommand::Keyboard(RawKeyboard::key(DEV, KeyCode(0x78), true)))
                .await
                .unwrap();
            let snap = snapshot(&tx).await;
            tx.send(HostCommand::Shutdown).await.unwrap();
            snap
        };
        let (_, snap) = tokio::join!(host.run_until_shutdown(), driver);
        assert!(snap.ui_visible);
        assert_eq!(snap.controllers[0].report.buttons, 0);
        assert_eq!(snap.stats.key_events, 0);
    }

    #[tokio::test]
    async fn ui_commands_mutate_the_engine() {
        let (host, tx) = host_with(config_with_a(), None);
        let driver = async {
            tx.send(HostCommand::AddVirtualController).await.unwrap();
            tx.send(HostCommand::StartRebindButton {
                slot: 1,
                button: LogicalButton::Y,
            })
            .await
            .unwrap();
            tx.send(HostCommand::RemoveVirtualController { slot: 9 }).await.unwrap();
            let snap = snapshot(&tx).await;
            tx.send(HostCommand::Shutdown).await.unwrap();
            snap
        };
        let (_, snap) = tokio::join!(host.run_until_shutdown(), driver);
        assert_eq!(snap.controllers.len(), 2);
        assert_eq!(snap.controllers[1].pending_rebind_button, Some(LogicalButton::Y));
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let bus: Box<dyn VirtualBus> = Box::new(LoopbackBus::default());
        let engine = FeederEngine::new(config_with_a(), bus).unwrap();
        let (_tx, rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let host = FeederHost::create(engine, rx, None, token.clone()).start();
        token.cancel();
        let stopped = host.run_until_shutdown().await;
        assert!(stopped.engine().controllers().len() == 1);
        stopped.finish().await.unwrap();
    }

    struct SharedBus(Arc<Mutex<LoopbackBus>>);

    impl VirtualBus for SharedBus {
        fn plug_in(&mut self) -> Result<TargetId, BusError> {
            self.0.lock().unwrap().plug_in()
        }

        fn submit(&mut self, target: TargetId, report: &XusbReport) -> Result<(), BusError> {
            self.0.lock().unwrap().submit(target, report)
        }

        fn unplug(&mut self, target: TargetId) -> Result<(), BusError> {
            self.0.lock().unwrap().unplug(target)
        }
    }

    #[tokio::test]
    async fn failed_save_still_releases_targets() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, "not a directory").await.unwrap();
        let store = ConfigStore::new(blocker.join("feeder.toml"));

        let shared = Arc::new(Mutex::new(LoopbackBus::default()));
        let bus: Box<dyn VirtualBus> = Box::new(SharedBus(shared.clone()));
        let engine = FeederEngine::new(config_with_a(), bus).unwrap();
        assert_eq!(shared.lock().unwrap().plugged().len(), 1);

        let (tx, rx) = mpsc::channel(4);
        let host = FeederHost::create(engine, rx, Some(store), CancellationToken::new()).start();
        let driver = async {
            tx.send(HostCommand::AddProfile { name: "extra".into() }).await.unwrap();
            tx.send(HostCommand::Shutdown).await.unwrap();
        };
        let (stopped, _) = tokio::join!(host.run_until_shutdown(), driver);
        assert!(stopped.finish().await.is_err());
        assert!(shared.lock().unwrap().plugged().is_empty());
    }

    #[tokio::test]
    async fn dirty_config_is_saved_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("feeder.toml"));
        let (host, tx) = host_with(config_with_a(), Some(store.clone()));
        let driver = async {
            tx.send(HostCommand::AddProfile { name: "extra".into() }).await.unwrap();
            tx.send(HostCommand::Shutdown).await.unwrap();
        };
        let (stopped, _) = tokio::join!(host.run_until_shutdown(), driver);
        stopped.finish().await.unwrap();

        let mut reader = ConfigStore::new(store.path());
        let saved = reader.load().await.unwrap();
        assert!(saved.profiles.contains_key("extra"));
    }
}
