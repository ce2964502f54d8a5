// src/platform/win32/privileges.rs

use super::to_wide;
use crate::elevation::RelaunchCommand;
use crate::error::{JamstarError, Result};
use crate::platform::PrivilegeHost;
use std::ptr::{null, null_mut};
use tracing::info;
use windows_sys::Win32::UI::Shell::{IsUserAnAdmin, ShellExecuteW};
use windows_sys::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

#[derive(Default)]
pub struct WindowsPrivileges;

impl WindowsPrivileges {
    pub fn new() -> Self {
        WindowsPrivileges
    }
}

impl PrivilegeHost for WindowsPrivileges {
    fn is_elevated(&self) -> Result<bool> {
        Ok(unsafe { IsUserAnAdmin() } != 0)
    }

    fn launch_elevated(&self, command: &RelaunchCommand) -> Result<()> {
        let verb = to_wide("runas");
        let file = to_wide(&command.program);
        let mut parameters = command.parameters();
        parameters.push(0);
        let directory = command.working_dir.as_ref().map(to_wide);

        info!(
            program = %command.program.display(),
            parameters = %command.display_parameters(),
            "Executing with elevated rights"
        );

        let instance = unsafe {
            ShellExecuteW(
                null_mut(),
                verb.as_ptr(),
                file.as_ptr(),
                parameters.as_ptr(),
                directory.as_ref().map_or(null(), |dir| dir.as_ptr()),
                SW_SHOWNORMAL,
            )
        };

        shell_execute_result(instance as isize)
    }
}

/// Values up to 32 are error codes, e.g. 5 when the UAC prompt is dismissed.
fn shell_execute_result(code: isize) -> Result<()> {
    if code <= 32 {
        return Err(JamstarError::AdminRights(format!(
            "ShellExecuteW(runas) failed with code {}",
            code
        )));
    }
    Ok(())
}
