// src/platform/win32/hotkeys.rs

use crate::error::{JamstarError, Result};
use crate::hotkey::{HotkeyBinding, HotkeySink, Key, Modifiers};
use crate::platform::HotkeyService;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::ptr::null_mut;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_ALT, MOD_CONTROL, MOD_NOREPEAT,
    MOD_SHIFT, MOD_WIN, VK_F1,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    GetMessageW, PeekMessageW, PostThreadMessageW, MSG, PM_NOREMOVE, WM_HOTKEY, WM_QUIT, WM_USER,
};

/// `RegisterHotKey` on a dedicated listener thread. Hotkeys belong to the
/// thread that registered them, so that thread also unregisters them.
#[derive(Default)]
pub struct WindowsHotkeys {
    thread_id: Option<u32>,
    handle: Option<JoinHandle<()>>,
    finished: Option<Receiver<()>>,
}

impl WindowsHotkeys {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HotkeyService for WindowsHotkeys {
    fn start(&mut self, bindings: &[HotkeyBinding], sink: HotkeySink) -> Result<()> {
        if self.handle.is_some() {
            return Err(JamstarError::HotkeyError(
                "hotkey listener is already running".into(),
            ));
        }

        let bindings = bindings.to_vec();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        // Never sent on; the listener drops its end when it exits.
        let (finished_tx, finished_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("hotkeys".into())
            .spawn(move || {
                let _finished = finished_tx;
                listen(&bindings, &sink, &ready_tx);
            })?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.thread_id = Some(thread_id);
                self.handle = Some(handle);
                self.finished = Some(finished_rx);
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(JamstarError::HotkeyError(reason))
            }
            Err(_) => {
                let _ = handle.join();
                Err(JamstarError::HotkeyError(
                    "hotkey listener exited during startup".into(),
                ))
            }
        }
    }

    fn unregister_all(&mut self) {
        if let Some(thread_id) = self.thread_id.take() {
            // The listener unregisters everything once its message loop ends.
            let posted = unsafe { PostThreadMessageW(thread_id, WM_QUIT, 0, 0) };
            if posted == 0 {
                warn!(
                    error = %std::io::Error::last_os_error(),
                    "Failed to stop hotkey listener"
                );
            }
        }
    }

    fn join(&mut self, timeout: Duration) -> bool {
        let Some(finished) = self.finished.take() else {
            return true;
        };

        match finished.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "Hotkey listener did not stop in time, detaching");
                self.handle.take();
                false
            }
            _ => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                true
            }
        }
    }
}

impl Drop for WindowsHotkeys {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

fn listen(
    bindings: &[HotkeyBinding],
    sink: &HotkeySink,
    ready: &Sender<std::result::Result<u32, String>>,
) {
    let thread_id = unsafe { GetCurrentThreadId() };
    let mut msg: MSG = unsafe { std::mem::zeroed() };
    // Forces the message queue into existence before the id is published.
    unsafe { PeekMessageW(&mut msg, null_mut(), WM_USER, WM_USER, PM_NOREMOVE) };

    let mut registered = Vec::with_capacity(bindings.len());
    for (index, binding) in bindings.iter().enumerate() {
        let id = index as i32 + 1;
        let ok = unsafe {
            RegisterHotKey(
                null_mut(),
                id,
                modifier_mask(&binding.hotkey.modifiers),
                virtual_key(binding.hotkey.key),
            )
        };
        if ok == 0 {
            let error = std::io::Error::last_os_error();
            unregister(&registered);
            let _ = ready.send(Err(format!(
                "{} ({}): {}",
                binding.hotkey,
                binding.action.describe(),
                error
            )));
            return;
        }
        registered.push(id);
        debug!(hotkey = %binding.hotkey, action = ?binding.action, "Hotkey registered");
    }

    if ready.send(Ok(thread_id)).is_err() {
        unregister(&registered);
        return;
    }

    loop {
        let status = unsafe { GetMessageW(&mut msg, null_mut(), 0, 0) };
        if status == 0 || status == -1 {
            break;
        }
        if msg.message == WM_HOTKEY {
            if let Some(binding) = msg.wParam.checked_sub(1).and_then(|i| bindings.get(i)) {
                debug!(hotkey = %binding.hotkey, "Hotkey pressed");
                sink.emit(binding.action);
            }
        }
    }

    unregister(&registered);
    debug!("Hotkey listener stopped");
}

fn unregister(ids: &[i32]) {
    for &id in ids {
        unsafe { UnregisterHotKey(null_mut(), id) };
    }
}

fn modifier_mask(modifiers: &Modifiers) -> HOT_KEY_MODIFIERS {
    let mut mask = MOD_NOREPEAT;
    if modifiers.ctrl {
        mask |= MOD_CONTROL;
    }
    if modifiers.shift {
        mask |= MOD_SHIFT;
    }
    if modifiers.alt {
        mask |= MOD_ALT;
    }
    if modifiers.win {
        mask |= MOD_WIN;
    }
    mask
}

fn virtual_key(key: Key) -> u32 {
    match key {
        Key::Function(n) => u32::from(VK_F1) + u32::from(n) - 1,
        // Virtual-key codes for 0-9 and A-Z are their ASCII values.
        Key::Char(c) => c as u32,
    }
}
