// src/platform/win32/mod.rs

mod firewall;
mod hotkeys;
mod notification;
mod privileges;

pub use firewall::WindowsFirewall;
pub use hotkeys::WindowsHotkeys;
pub use notification::WindowsNotifier;
pub use privileges::WindowsPrivileges;

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

/// Null-terminated UTF-16 for Win32 string parameters.
fn to_wide(value: impl AsRef<OsStr>) -> Vec<u16> {
    value
        .as_ref()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;

    #[test]
    fn wide_strings_are_terminated() {
        assert_eq!(to_wide("runas"), [0x72, 0x75, 0x6e, 0x61, 0x73, 0]);
        assert_eq!(to_wide(""), [0]);
    }

    #[test]
    fn wide_strings_keep_unpaired_surrogates() {
        let raw = OsString::from_wide(&[0x43, 0xDC00]);
        assert_eq!(to_wide(&raw), [0x43, 0xDC00, 0]);
    }
}
