//! Line-based console feeding the host
//!
//! Stands in for the raw-input and UI collaborators when running headless:
//! every line becomes one [`HostCommand`].

use super::{HostCommand, HostSnapshot};
use crate::controller::virtual_pad::{DeviceFilter, DeviceHandle, InputChannel};
use crate::input::keycode::KeyCode;
use crate::input::raw::{RawKeyboard, RawMouse, MOUSE_MOVE_ABSOLUTE};
use crate::mapping::button::{LogicalButton, Stick};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub const HELP: &str = "\
commands:
  key <dev> <Key> down|up            keyboard or mouse-button event
  mouse <dev> <dx> <dy>              relative mouse motion
  click <dev> <button-flags>         raw mouse button flags (hex with 0x)
  abs <dev> <x> <y>                  absolute mouse packet (ignored)
  select <profile>|-                 activate a profile, '-' for none
  add-profile <name> | remove-profile <name>
  add-pad | remove-pad <slot>
  capture-device <slot> keyboard|mouse
  set-device <slot> keyboard|mouse any|<dev>
  bind <slot> <Button>               next key press becomes the binding
  cancel <slot>
  stick <slot> left|right mouse|keyboard
  reload | save | status | quit";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid {what}: {value}")]
    InvalidArgument { what: &'static str, value: String },
}

/// Parsed console line.
#[derive(Debug)]
pub enum ConsoleRequest {
    Command(HostCommand),
    Status,
    Help,
    Empty,
}

struct Args<'a> {
    parts: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn next(&mut self, what: &'static str) -> Result<&'a str, ConsoleError> {
        self.parts.next().ok_or(ConsoleError::MissingArgument(what))
    }

    fn parse<T: std::str::FromStr>(&mut self, what: &'static str) -> Result<T, ConsoleError> {
        let value = self.next(what)?;
        value.parse().map_err(|_| invalid(what, value))
    }

    fn device(&mut self) -> Result<DeviceHandle, ConsoleError> {
        let value = self.next("device")?;
        parse_number(value)
            .map(DeviceHandle)
            .ok_or_else(|| invalid("device", value))
    }

    fn channel(&mut self) -> Result<InputChannel, ConsoleError> {
        match self.next("channel")? {
            "keyboard" | "kb" => Ok(InputChannel::Keyboard),
            "mouse" => Ok(InputChannel::Mouse),
            other => Err(invalid("channel", other)),
        }
    }
}

fn invalid(what: &'static str, value: &str) -> ConsoleError {
    ConsoleError::InvalidArgument {
        what,
        value: value.to_string(),
    }
}

fn parse_number(value: &str) -> Option<u64> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

pub fn parse_line(line: &str) -> Result<ConsoleRequest, ConsoleError> {
    let mut args = Args {
        parts: line.split_whitespace(),
    };
    let Some(verb) = args.parts.next() else {
        return Ok(ConsoleRequest::Empty);
    };

    let command = match verb {
        "help" | "?" => return Ok(ConsoleRequest::Help),
        "status" => return Ok(ConsoleRequest::Status),
        "key" => {
            let device = args.device()?;
            let name = args.next("key")?;
            let key = KeyCode::from_name(name).ok_or_else(|| invalid("key", name))?;
            let pressed = match args.next("down|up")? {
                "down" | "press" => true,
                "up" | "release" => false,
                other => return Err(invalid("key state", other)),
            };
            HostCommand::Keyboard(RawKeyboard::key(device, key, pressed))
        }
        "mouse" => HostCommand::Mouse(RawMouse {
            device: args.device()?,
            flags: 0,
            button_flags: 0,
            last_x: args.parse("dx")?,
            last_y: args.parse("dy")?,
        }),
        "click" => {
            let device = args.device()?;
            let value = args.next("button flags")?;
            let button_flags = parse_number(value)
                .and_then(|n| u16::try_from(n).ok())
                .ok_or_else(|| invalid("button flags", value))?;
            HostCommand::Mouse(RawMouse {
                device,
                flags: 0,
                button_flags,
                last_x: 0,
                last_y: 0,
            })
        }
        "abs" => HostCommand::Mouse(RawMouse {
            device: args.device()?,
            flags: MOUSE_MOVE_ABSOLUTE,
            button_flags: 0,
            last_x: args.parse("x")?,
            last_y: args.parse("y")?,
        }),
        "select" => {
            let name = args.next("profile")?;
            HostCommand::SelectProfile {
                name: (name != "-").then(|| name.to_string()),
            }
        }
        "add-profile" => HostCommand::AddProfile {
            name: args.next("profile")?.to_string(),
        },
        "remove-profile" => HostCommand::RemoveProfile {
            name: args.next("profile")?.to_string(),
        },
        "add-pad" => HostCommand::AddVirtualController,
        "remove-pad" => HostCommand::RemoveVirtualController {
            slot: args.parse("slot")?,
        },
        "capture-device" => HostCommand::StartRebindDevice {
            slot: args.parse("slot")?,
            channel: args.channel()?,
        },
        "set-device" => {
            let slot = args.parse("slot")?;
            let channel = args.channel()?;
            let filter = match args.next("device")? {
                "any" => DeviceFilter::Any,
                other => DeviceFilter::Only(DeviceHandle(
                    parse_number(other).ok_or_else(|| invalid("device", other))?,
                )),
            };
            HostCommand::RebindDevice {
                slot,
                channel,
                filter,
            }
        }
        "bind" => {
            let slot = args.parse("slot")?;
            let name = args.next("button")?;
            let button = LogicalButton::from_name(name).ok_or_else(|| invalid("button", name))?;
            HostCommand::StartRebindButton { slot, button }
        }
        "cancel" => HostCommand::CancelRebind {
            slot: args.parse("slot")?,
        },
        "stick" => {
            let slot = args.parse("slot")?;
            let name = args.next("stick")?;
            let stick = Stick::from_name(name).ok_or_else(|| invalid("stick", name))?;
            let use_mouse = match args.next("mouse|keyboard")? {
                "mouse" => true,
                "keyboard" | "kb" => false,
                other => return Err(invalid("stick mode", other)),
            };
            HostCommand::SetStickMode {
                slot,
                stick,
                use_mouse,
            }
        }
        "reload" => HostCommand::ReloadConfig,
        "save" => HostCommand::SaveConfig,
        "quit" | "exit" => HostCommand::Shutdown,
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };
    Ok(ConsoleRequest::Command(command))
}

/// Reads stdin until EOF or until the host goes away.
pub async fn run_console(commands: mpsc::Sender<HostCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Console ready, type 'help' for commands");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Console input closed");
                return;
            }
            Err(e) => {
                warn!("Failed to read console input: {}", e);
                return;
            }
        };

        let command = match parse_line(&line) {
            Ok(ConsoleRequest::Command(command)) => command,
            Ok(ConsoleRequest::Empty) => continue,
            Ok(ConsoleRequest::Help) => {
                println!("{}", HELP);
                continue;
            }
            Ok(ConsoleRequest::Status) => {
                let (response_tx, response_rx) = oneshot::channel();
                if commands.send(HostCommand::Snapshot { response_tx }).await.is_err() {
                    return;
                }
                match response_rx.await {
                    Ok(snapshot) => print_snapshot(&snapshot),
                    Err(_) => warn!("Host did not answer the status request"),
                }
                continue;
            }
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        let quitting = matches!(command, HostCommand::Shutdown);
        if commands.send(command).await.is_err() || quitting {
            return;
        }
    }
}

fn print_snapshot(snapshot: &HostSnapshot) {
    println!(
        "profile: {} (available: {})",
        snapshot.profile.as_deref().unwrap_or("-"),
        snapshot.profiles.join(", ")
    );
    println!(
        "ui visible: {}, cursor captured: {}",
        snapshot.ui_visible, snapshot.cursor_captured
    );
    for pad in &snapshot.controllers {
        let report = pad.report;
        println!(
            "  [{}] {} buttons={:#06x} lt={} rt={} l=({}, {}) r=({}, {}) kb={} mouse={}",
            pad.slot,
            pad.target,
            report.buttons,
            report.left_trigger,
            report.right_trigger,
            report.thumb_lx,
            report.thumb_ly,
            report.thumb_rx,
            report.thumb_ry,
            pad.src_keyboard,
            pad.src_mouse,
        );
        if let Some(button) = pad.pending_rebind_button {
            println!("      waiting for a key for {}", button);
        }
        if pad.pending_rebind_keyboard || pad.pending_rebind_mouse {
            println!("      waiting to capture a source device");
        }
    }
    println!(
        "stats: {} key events, {} mouse events, {} reports",
        snapshot.stats.key_events, snapshot.stats.mouse_events, snapshot.stats.reports_sent
    );
}
