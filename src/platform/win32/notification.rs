// src/platform/win32/notification.rs

use super::to_wide;
use crate::config::NotificationConfig;
use crate::error::{JamstarError, Result};
use crate::hotkey::{HotkeyAction, Waker};
use crate::platform::NotificationSurface;
use crossbeam_channel::Receiver;
use std::cell::RefCell;
use std::ptr::{null, null_mut};
use std::sync::Arc;
use tracing::{debug, error};
use windows_sys::Win32::Foundation::{
    ERROR_CLASS_ALREADY_EXISTS, HWND, LPARAM, LRESULT, RECT, WPARAM,
};
use windows_sys::Win32::Graphics::Gdi::{
    BeginPaint, DrawTextW, EndPaint, GetDC, GetStockObject, InvalidateRect, ReleaseDC,
    SelectObject, SetBkMode, COLOR_INFOBK, DEFAULT_GUI_FONT, DT_CALCRECT, DT_LEFT, DT_NOPREFIX,
    PAINTSTRUCT, TRANSPARENT,
};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect, GetMessageW,
    IsWindow, KillTimer, LoadCursorW, PeekMessageW, PostQuitMessage, PostThreadMessageW,
    RegisterClassW, SetTimer, SetWindowPos, ShowWindow, TranslateMessage, HWND_TOPMOST,
    IDC_ARROW, MSG, PM_NOREMOVE, SWP_NOACTIVATE, SWP_SHOWWINDOW, SW_HIDE, WM_APP, WM_PAINT,
    WM_TIMER, WM_USER, WNDCLASSW, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_POPUP,
};

const CLASS_NAME: &str = "JamstarNotification";
const HIDE_TIMER_ID: usize = 1;
const WM_APP_WAKE: u32 = WM_APP + 1;
const PADDING: i32 = 8;

std::thread_local! {
    // Text painted by `window_proc`; UTF-16 without terminator.
    static MESSAGE: RefCell<Vec<u16>> = const { RefCell::new(Vec::new()) };
}

/// Borderless, topmost, non-activating popup at a fixed screen position.
///
/// Must be created and used on the thread that runs `wait_event`.
pub struct WindowsNotifier {
    settings: NotificationConfig,
    hwnd: HWND,
    class_registered: bool,
    main_thread: u32,
    quitting: bool,
}

impl WindowsNotifier {
    pub fn new(settings: NotificationConfig) -> Self {
        let mut msg: MSG = unsafe { std::mem::zeroed() };
        // Make sure the thread has a queue for wake-ups posted before the first window exists.
        unsafe { PeekMessageW(&mut msg, null_mut(), WM_USER, WM_USER, PM_NOREMOVE) };

        Self {
            settings,
            hwnd: null_mut(),
            class_registered: false,
            main_thread: unsafe { GetCurrentThreadId() },
            quitting: false,
        }
    }

    fn ensure_window(&mut self) -> Result<HWND> {
        if !self.hwnd.is_null() {
            if unsafe { IsWindow(self.hwnd) } != 0 {
                return Ok(self.hwnd);
            }
            debug!("Notification window handle is stale, recreating");
            self.hwnd = null_mut();
        }

        let instance = unsafe { GetModuleHandleW(null()) };
        if instance.is_null() {
            return Err(JamstarError::WindowError(
                "GetModuleHandleW returned null".into(),
            ));
        }

        let class_name = to_wide(CLASS_NAME);
        if !self.class_registered {
            let window_class = WNDCLASSW {
                lpfnWndProc: Some(window_proc),
                hInstance: instance,
                lpszClassName: class_name.as_ptr(),
                hCursor: unsafe { LoadCursorW(null_mut(), IDC_ARROW) },
                hbrBackground: (COLOR_INFOBK as usize + 1) as *mut std::ffi::c_void,
                ..unsafe { std::mem::zeroed() }
            };
            if unsafe { RegisterClassW(&window_class) } == 0 {
                let error = std::io::Error::last_os_error();
                // Another notifier in this process registered it first.
                if error.raw_os_error() != Some(ERROR_CLASS_ALREADY_EXISTS as i32) {
                    return Err(JamstarError::WindowError(format!(
                        "RegisterClassW failed: {}",
                        error
                    )));
                }
            }
            self.class_registered = true;
        }

        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                class_name.as_ptr(),
                class_name.as_ptr(),
                WS_POPUP,
                self.settings.x,
                self.settings.y,
                1,
                1,
                null_mut(),
                null_mut(),
                instance,
                null(),
            )
        };
        if hwnd.is_null() {
            return Err(JamstarError::WindowError(format!(
                "CreateWindowExW failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        debug!("Notification window created");
        self.hwnd = hwnd;
        Ok(hwnd)
    }
}

impl NotificationSurface for WindowsNotifier {
    fn show(&mut self, message: &str) -> Result<()> {
        let hwnd = self.ensure_window()?;

        let mut text: Vec<u16> = message.encode_utf16().collect();
        let (width, height) = measure(hwnd, &mut text);
        MESSAGE.with(|slot| *slot.borrow_mut() = text);

        unsafe {
            if SetWindowPos(
                hwnd,
                HWND_TOPMOST,
                self.settings.x,
                self.settings.y,
                width,
                height,
                SWP_NOACTIVATE | SWP_SHOWWINDOW,
            ) == 0
            {
                return Err(JamstarError::WindowError(format!(
                    "SetWindowPos failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
            InvalidateRect(hwnd, null(), 1);

            // Re-arming the same timer id drops the previously scheduled hide.
            if SetTimer(hwnd, HIDE_TIMER_ID, self.settings.timeout_ms, None) == 0 {
                return Err(JamstarError::WindowError(format!(
                    "SetTimer failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
        }

        Ok(())
    }

    fn destroy(&mut self) {
        if self.hwnd.is_null() {
            return;
        }
        unsafe {
            if IsWindow(self.hwnd) != 0 {
                DestroyWindow(self.hwnd);
            }
        }
        self.hwnd = null_mut();
        debug!("Notification window destroyed");
    }

    fn waker(&self) -> Waker {
        let thread_id = self.main_thread;
        Arc::new(move || unsafe {
            PostThreadMessageW(thread_id, WM_APP_WAKE, 0, 0);
        })
    }

    fn wait_event(&mut self, events: &Receiver<HotkeyAction>) -> Option<HotkeyAction> {
        let mut msg: MSG = unsafe { std::mem::zeroed() };

        loop {
            if self.quitting {
                return None;
            }
            if let Ok(action) = events.try_recv() {
                return Some(action);
            }

            let status = unsafe { GetMessageW(&mut msg, null_mut(), 0, 0) };
            if status == 0 {
                return None;
            }
            if status == -1 {
                error!(
                    error = %std::io::Error::last_os_error(),
                    "GetMessageW failed, leaving event loop"
                );
                return None;
            }

            if msg.hwnd.is_null() && msg.message == WM_APP_WAKE {
                continue;
            }
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    fn quit(&mut self) {
        self.quitting = true;
        unsafe { PostQuitMessage(0) };
    }
}

impl Drop for WindowsNotifier {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Window size that fits `text` plus padding.
fn measure(hwnd: HWND, text: &mut [u16]) -> (i32, i32) {
    let mut rect = RECT {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };
    unsafe {
        let hdc = GetDC(hwnd);
        let previous = SelectObject(hdc, GetStockObject(DEFAULT_GUI_FONT));
        DrawTextW(
            hdc,
            text.as_mut_ptr(),
            text.len() as i32,
            &mut rect,
            DT_CALCRECT | DT_LEFT | DT_NOPREFIX,
        );
        SelectObject(hdc, previous);
        ReleaseDC(hwnd, hdc);
    }

    (
        rect.right - rect.left + 2 * PADDING,
        rect.bottom - rect.top + 2 * PADDING,
    )
}

fn paint(hwnd: HWND) {
    let mut paint: PAINTSTRUCT = unsafe { std::mem::zeroed() };
    let mut rect = RECT {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    unsafe {
        let hdc = BeginPaint(hwnd, &mut paint);
        GetClientRect(hwnd, &mut rect);
        rect.left += PADDING;
        rect.top += PADDING;

        SelectObject(hdc, GetStockObject(DEFAULT_GUI_FONT));
        SetBkMode(hdc, TRANSPARENT);
        MESSAGE.with(|slot| {
            let mut text = slot.borrow_mut();
            let len = text.len() as i32;
            DrawTextW(hdc, text.as_mut_ptr(), len, &mut rect, DT_LEFT | DT_NOPREFIX);
        });

        EndPaint(hwnd, &paint);
    }
}

extern "system" fn window_proc(
    hwnd: HWND,
    message: u32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    match message {
        WM_TIMER if w_param == HIDE_TIMER_ID => {
            unsafe {
                KillTimer(hwnd, HIDE_TIMER_ID);
                ShowWindow(hwnd, SW_HIDE);
            }
            0
        }
        WM_PAINT => {
            paint(hwnd);
            0
        }
        _ => unsafe { DefWindowProcW(hwnd, message, w_param, l_param) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::HotkeySink;
    use std::time::{Duration, Instant};
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        GetWindowLongW, IsWindowVisible, GWL_EXSTYLE, GWL_STYLE, PM_REMOVE, WS_BORDER, WS_CAPTION,
    };

    fn settings(timeout_ms: u32) -> NotificationConfig {
        NotificationConfig {
            timeout_ms,
            x: 0,
            y: 0,
        }
    }

    /// Dispatches this thread's messages for `duration`.
    fn pump(duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut msg: MSG = unsafe { std::mem::zeroed() };
        while Instant::now() < deadline {
            unsafe {
                while PeekMessageW(&mut msg, null_mut(), 0, 0, PM_REMOVE) != 0 {
                    TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn visible(hwnd: HWND) -> bool {
        unsafe { IsWindowVisible(hwnd) != 0 }
    }

    #[test]
    fn window_is_created_on_first_show() {
        let mut notifier = WindowsNotifier::new(settings(5000));
        assert!(notifier.hwnd.is_null());

        notifier.show("first").unwrap();

        assert!(visible(notifier.hwnd));
        MESSAGE.with(|text| assert_eq!(String::from_utf16_lossy(&text.borrow()), "first"));
    }

    #[test]
    fn popup_is_borderless_and_topmost() {
        let mut notifier = WindowsNotifier::new(settings(5000));
        notifier.show("frame").unwrap();

        let style = unsafe { GetWindowLongW(notifier.hwnd, GWL_STYLE) } as u32;
        let ex_style = unsafe { GetWindowLongW(notifier.hwnd, GWL_EXSTYLE) } as u32;

        assert_eq!(style & WS_POPUP, WS_POPUP);
        assert_eq!(style & (WS_BORDER | WS_CAPTION), 0);
        assert_eq!(ex_style & WS_EX_TOPMOST, WS_EX_TOPMOST);
        assert_eq!(ex_style & WS_EX_NOACTIVATE, WS_EX_NOACTIVATE);
    }

    #[test]
    fn show_after_destroy_recreates_window() {
        let mut notifier = WindowsNotifier::new(settings(5000));
        notifier.show("first").unwrap();
        let first = notifier.hwnd;

        notifier.destroy();
        assert!(notifier.hwnd.is_null());
        assert_eq!(unsafe { IsWindow(first) }, 0);
        notifier.destroy();

        notifier.show("second").unwrap();
        assert!(visible(notifier.hwnd));
    }

    #[test]
    fn stale_handle_is_replaced() {
        let mut notifier = WindowsNotifier::new(settings(5000));
        notifier.show("first").unwrap();
        unsafe { DestroyWindow(notifier.hwnd) };

        notifier.show("again").unwrap();

        assert_ne!(unsafe { IsWindow(notifier.hwnd) }, 0);
        assert!(visible(notifier.hwnd));
    }

    #[test]
    fn window_hides_after_timeout() {
        let mut notifier = WindowsNotifier::new(settings(50));
        notifier.show("short").unwrap();
        let hwnd = notifier.hwnd;

        pump(Duration::from_millis(500));

        assert!(!visible(hwnd));
        assert_ne!(unsafe { IsWindow(hwnd) }, 0);
    }

    #[test]
    fn show_rearms_hide_timer() {
        let mut notifier = WindowsNotifier::new(settings(400));
        notifier.show("one").unwrap();
        pump(Duration::from_millis(250));
        notifier.show("two").unwrap();
        pump(Duration::from_millis(250));

        // 500 ms after the first show, 250 ms after the second.
        assert!(visible(notifier.hwnd));

        pump(Duration::from_millis(600));
        assert!(!visible(notifier.hwnd));
    }

    #[test]
    fn queued_event_returns_immediately() {
        let mut notifier = WindowsNotifier::new(settings(5000));
        let (events_tx, events) = crossbeam_channel::unbounded();
        events_tx.send(HotkeyAction::Block).unwrap();

        assert_eq!(notifier.wait_event(&events), Some(HotkeyAction::Block));
    }

    #[test]
    fn waker_interrupts_wait_from_another_thread() {
        let mut notifier = WindowsNotifier::new(settings(5000));
        let (events_tx, events) = crossbeam_channel::unbounded();
        let sink = HotkeySink::new(events_tx, notifier.waker());

        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            sink.emit(HotkeyAction::Restore);
        });

        assert_eq!(notifier.wait_event(&events), Some(HotkeyAction::Restore));
        producer.join().unwrap();
    }

    #[test]
    fn quit_ends_wait() {
        let mut notifier = WindowsNotifier::new(settings(5000));
        let (_events_tx, events) = crossbeam_channel::unbounded::<HotkeyAction>();

        notifier.quit();

        assert_eq!(notifier.wait_event(&events), None);
    }
}
