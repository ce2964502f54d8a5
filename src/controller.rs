use crate::catch::{Catch, LogLevels};
use crate::config::JamstarConfig;
use crate::error::Result;
use crate::hotkey::{self, HotkeyAction, HotkeyBinding, HotkeySink};
use crate::platform::{FirewallProvider, FirewallRule, HotkeyService, NotificationSurface};
use crate::process::{ProcessLocator, TargetProcess};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const HOTKEY_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

const MSG_ALREADY_BLOCKED: &str = "Network already blocked";
const MSG_BLOCKED: &str = "Network blocked successfully";
const MSG_NO_RULE: &str = "No matching firewall rule found";
const MSG_RESTORED: &str = "Network restored successfully";
const MSG_BLOCK_FAILED: &str = "Failed to block network";
const MSG_RESTORE_FAILED: &str = "Failed to restore network";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkState {
    #[default]
    Idle,
    Blocked,
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkState::Idle => f.write_str("idle"),
            NetworkState::Blocked => f.write_str("blocked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    ProcessNotRunning,
    /// The rule was already there, possibly left over from an earlier run.
    AlreadyBlocked,
    Blocked(TargetProcess),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    NoRule,
    Restored,
}

/// Blocks and restores the target's network access and drives interactive mode.
///
/// Every method runs on the thread that owns the notification surface; hotkey
/// presses reach it through the event queue drained by `run_interactive`.
pub struct NetworkController {
    process_names: Vec<String>,
    display_name: String,
    rule: FirewallRule,
    bindings: Vec<HotkeyBinding>,
    firewall: Box<dyn FirewallProvider>,
    processes: Box<dyn ProcessLocator>,
    surface: Box<dyn NotificationSurface>,
    hotkeys: Box<dyn HotkeyService>,
    state: NetworkState,
}

impl NetworkController {
    pub fn new(
        config: &JamstarConfig,
        firewall: Box<dyn FirewallProvider>,
        processes: Box<dyn ProcessLocator>,
        surface: Box<dyn NotificationSurface>,
        hotkeys: Box<dyn HotkeyService>,
    ) -> Result<Self> {
        Ok(Self {
            process_names: config.target.process_names.clone(),
            display_name: config.target.display_name.clone(),
            rule: config.rule.to_block_rule(),
            bindings: config.hotkeys.bindings()?,
            firewall,
            processes,
            surface,
            hotkeys,
            state: NetworkState::Idle,
        })
    }

    pub fn is_blocked(&self) -> bool {
        self.state == NetworkState::Blocked
    }

    pub fn block(&mut self) -> Result<BlockOutcome> {
        let Some(process) = self.processes.find(&self.process_names) else {
            let message = format!("{} is not running", self.display_name);
            warn!("{}", message);
            self.notify(&message);
            return Ok(BlockOutcome::ProcessNotRunning);
        };
        debug!(
            pid = process.pid,
            name = %process.name,
            exe = ?process.exe,
            "Target process found"
        );

        let already_present = {
            let session = self.firewall.open()?;
            if session.rule_exists(&self.rule.name) {
                true
            } else {
                session.create_block_rule(&self.rule)?;
                false
            }
        };

        if already_present {
            info!(rule = %self.rule.name, "Firewall rule already exists");
            self.notify(MSG_ALREADY_BLOCKED);
            return Ok(BlockOutcome::AlreadyBlocked);
        }

        self.state = NetworkState::Blocked;
        info!(outcome = "success", pid = process.pid, "Network access blocked successfully");
        self.notify(MSG_BLOCKED);
        Ok(BlockOutcome::Blocked(process))
    }

    pub fn restore(&mut self) -> Result<RestoreOutcome> {
        let removed = {
            let session = self.firewall.open()?;
            if session.rule_exists(&self.rule.name) {
                session.remove_rule(&self.rule.name)?;
                true
            } else {
                false
            }
        };

        if !removed {
            info!(rule = %self.rule.name, "No matching firewall rule found");
            self.notify(MSG_NO_RULE);
            return Ok(RestoreOutcome::NoRule);
        }

        self.state = NetworkState::Idle;
        info!(outcome = "success", "Network access restored successfully");
        self.notify(MSG_RESTORED);
        Ok(RestoreOutcome::Restored)
    }

    /// Shows the hotkey help, starts the listener and runs the event loop
    /// until `cleanup` ends it.
    pub fn run_interactive(&mut self) -> Result<()> {
        info!("Starting interactive mode");
        let help = hotkey::help_text(&self.bindings);
        self.notify(&help);
        info!(hotkeys = %help.replace('\n', ", "), "Global hotkeys");

        let (events_tx, events) = crossbeam_channel::unbounded();
        let sink = HotkeySink::new(events_tx, self.surface.waker());

        let interrupt = sink.clone();
        if let Err(e) = ctrlc::set_handler(move || interrupt.emit(HotkeyAction::Quit)) {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }

        self.hotkeys.start(&self.bindings, sink)?;

        while let Some(action) = self.surface.wait_event(&events) {
            self.dispatch(action);
        }

        info!("Interactive mode finished");
        Ok(())
    }

    fn dispatch(&mut self, action: HotkeyAction) {
        debug!(?action, "Hotkey action");
        match action {
            HotkeyAction::Block => {
                if let Err(e) = self.block() {
                    error!(error = %e, "Failed to block network access");
                    self.notify(MSG_BLOCK_FAILED);
                }
            }
            HotkeyAction::Restore => {
                if let Err(e) = self.restore() {
                    error!(error = %e, "Failed to restore network access");
                    self.notify(MSG_RESTORE_FAILED);
                }
            }
            HotkeyAction::Quit => self.cleanup(),
        }
    }

    /// Tears interactive mode down. Restores the network first when it is
    /// blocked. The event loop is told to quit even if a step fails.
    pub fn cleanup(&mut self) {
        info!("Cleaning up...");

        let _ = Catch::new("cleanup")
            .field("state", self.state)
            .level(LogLevels::Error)
            .message("Error during cleanup")
            .log_traceback(true)
            .call(|| self.shutdown());

        self.surface.quit();
    }

    fn shutdown(&mut self) -> Result<()> {
        self.hotkeys.unregister_all();
        self.surface.destroy();

        if self.is_blocked() {
            self.restore()?;
        }

        if !self.hotkeys.join(HOTKEY_JOIN_TIMEOUT) {
            warn!("Hotkey listener still running after cleanup");
        }
        Ok(())
    }

    fn notify(&mut self, message: &str) {
        let surface = &mut self.surface;
        let _ = Catch::new("notify")
            .field("message", message)
            .level(LogLevels::Warning)
            .message("Failed to show notification")
            .call(|| surface.show(message));
    }
}
