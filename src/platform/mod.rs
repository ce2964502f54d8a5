// src/platform/mod.rs

#[cfg(windows)]
mod win32;

#[cfg(not(windows))]
mod unsupported;

#[cfg(windows)]
pub use win32::{
    WindowsFirewall as Firewall, WindowsHotkeys as Hotkeys, WindowsNotifier as Notifier,
    WindowsPrivileges as Privileges,
};

#[cfg(not(windows))]
pub use unsupported::{
    UnsupportedFirewall as Firewall, UnsupportedHotkeys as Hotkeys,
    UnsupportedNotifier as Notifier, UnsupportedPrivileges as Privileges,
};

use crate::elevation::RelaunchCommand;
use crate::error::Result;
use crate::hotkey::{HotkeyAction, HotkeyBinding, HotkeySink, Waker};
use crossbeam_channel::Receiver;
use std::time::Duration;

/// An enabled rule blocking outbound traffic to `remote_addresses`,
/// identified by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(not(windows), allow(dead_code))]
pub struct FirewallRule {
    pub name: String,
    pub description: String,
    pub remote_addresses: String,
}

impl FirewallRule {
    pub fn block_outbound(name: &str, description: &str, remote_addresses: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            remote_addresses: remote_addresses.to_string(),
        }
    }
}

/// Hands out scoped sessions on the OS firewall policy.
pub trait FirewallProvider {
    /// Acquires the policy handle. It is released when the session is dropped.
    fn open(&self) -> Result<Box<dyn FirewallSession + '_>>;
}

pub trait FirewallSession {
    /// Lookup failures count as "no such rule".
    fn rule_exists(&self, name: &str) -> bool;
    fn create_block_rule(&self, rule: &FirewallRule) -> Result<()>;
    /// Removing a rule that does not exist is a no-op.
    fn remove_rule(&self, name: &str) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait PrivilegeHost {
    fn is_elevated(&self) -> Result<bool>;
    /// Starts `command` with administrator rights. Returns once the launch was handed off.
    fn launch_elevated(&self, command: &RelaunchCommand) -> Result<()>;
}

/// The notification window and the main-thread event loop it lives on.
pub trait NotificationSurface {
    /// Shows `message` and (re)arms the auto-hide timer.
    fn show(&mut self, message: &str) -> Result<()>;
    /// Releases the window. Safe to call when there is none.
    fn destroy(&mut self);
    /// A thread-safe way to wake `wait_event`.
    fn waker(&self) -> Waker;
    /// Runs the event loop until an action is queued or `quit` was called.
    fn wait_event(&mut self, events: &Receiver<HotkeyAction>) -> Option<HotkeyAction>;
    fn quit(&mut self);
}

pub trait HotkeyService {
    /// Registers `bindings` on a listener thread that forwards presses to `sink`.
    fn start(&mut self, bindings: &[HotkeyBinding], sink: HotkeySink) -> Result<()>;
    fn unregister_all(&mut self);
    /// Waits up to `timeout` for the listener thread. Returns false if it is still running.
    fn join(&mut self, timeout: Duration) -> bool;
}
