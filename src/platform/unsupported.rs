// src/platform/unsupported.rs

//! Stand-ins for platforms without Windows Firewall. Every OS side effect
//! reports `Unsupported`; notifications fall back to the console.

use crate::elevation::RelaunchCommand;
use crate::error::{JamstarError, Result};
use crate::hotkey::{HotkeyAction, HotkeyBinding, HotkeySink, Waker};
use crate::platform::{
    FirewallProvider, FirewallSession, HotkeyService, NotificationSurface, PrivilegeHost,
};
use colored::Colorize;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct UnsupportedFirewall;

impl UnsupportedFirewall {
    pub fn new() -> Self {
        UnsupportedFirewall
    }
}

impl FirewallProvider for UnsupportedFirewall {
    fn open(&self) -> Result<Box<dyn FirewallSession + '_>> {
        Err(JamstarError::Unsupported("Windows Firewall"))
    }
}

#[derive(Default)]
pub struct UnsupportedPrivileges;

impl UnsupportedPrivileges {
    pub fn new() -> Self {
        UnsupportedPrivileges
    }
}

impl PrivilegeHost for UnsupportedPrivileges {
    #[cfg(unix)]
    fn is_elevated(&self) -> Result<bool> {
        Ok(unsafe { libc::geteuid() == 0 })
    }

    #[cfg(not(unix))]
    fn is_elevated(&self) -> Result<bool> {
        Ok(false)
    }

    fn launch_elevated(&self, _command: &RelaunchCommand) -> Result<()> {
        Err(JamstarError::Unsupported("Elevated relaunch"))
    }
}

/// Prints notifications instead of drawing a window.
pub struct UnsupportedNotifier {
    quit: bool,
}

impl UnsupportedNotifier {
    pub fn new(_settings: crate::config::NotificationConfig) -> Self {
        Self { quit: false }
    }
}

impl NotificationSurface for UnsupportedNotifier {
    fn show(&mut self, message: &str) -> Result<()> {
        println!("{} {}", "[jamstar]".bright_blue(), message.replace('\n', " | "));
        Ok(())
    }

    fn destroy(&mut self) {}

    fn waker(&self) -> Waker {
        Arc::new(|| {})
    }

    fn wait_event(&mut self, events: &Receiver<HotkeyAction>) -> Option<HotkeyAction> {
        if self.quit {
            return None;
        }
        events.recv().ok()
    }

    fn quit(&mut self) {
        self.quit = true;
    }
}

#[derive(Default)]
pub struct UnsupportedHotkeys;

impl UnsupportedHotkeys {
    pub fn new() -> Self {
        UnsupportedHotkeys
    }
}

impl HotkeyService for UnsupportedHotkeys {
    fn start(&mut self, _bindings: &[HotkeyBinding], _sink: HotkeySink) -> Result<()> {
        Err(JamstarError::Unsupported("Global hotkeys"))
    }

    fn unregister_all(&mut self) {}

    fn join(&mut self, _timeout: Duration) -> bool {
        true
    }
}
