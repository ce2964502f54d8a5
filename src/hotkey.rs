use crate::error::{JamstarError, Result};
use crossbeam_channel::Sender;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// What a global hotkey asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    Block,
    Restore,
    Quit,
}

impl HotkeyAction {
    pub fn describe(self) -> &'static str {
        match self {
            HotkeyAction::Block => "block",
            HotkeyAction::Restore => "unblock",
            HotkeyAction::Quit => "exit",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub win: bool,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.shift || self.alt || self.win)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// F1 through F24.
    Function(u8),
    /// An ASCII letter (stored uppercase) or digit.
    Char(char),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Function(n) => write!(f, "F{}", n),
            Key::Char(c) => write!(f, "{}", c),
        }
    }
}

/// A modifier chord such as `ctrl+shift+f1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl FromStr for Hotkey {
    type Err = JamstarError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            JamstarError::ConfigError(format!("invalid hotkey '{}': {}", s, reason))
        };

        let mut modifiers = Modifiers::default();
        let mut key = None;

        for part in s.split('+').map(str::trim) {
            if part.is_empty() {
                return Err(invalid("empty component"));
            }
            let lower = part.to_ascii_lowercase();
            let slot = match lower.as_str() {
                "ctrl" | "control" => &mut modifiers.ctrl,
                "shift" => &mut modifiers.shift,
                "alt" => &mut modifiers.alt,
                "win" | "super" | "windows" => &mut modifiers.win,
                _ => {
                    if key.is_some() {
                        return Err(invalid("more than one key"));
                    }
                    key = Some(parse_key(&lower).ok_or_else(|| invalid("unknown key"))?);
                    continue;
                }
            };
            if *slot {
                return Err(invalid("repeated modifier"));
            }
            *slot = true;
        }

        let key = key.ok_or_else(|| invalid("missing key"))?;
        if modifiers.is_empty() {
            return Err(invalid("at least one modifier is required for a global hotkey"));
        }

        Ok(Self { modifiers, key })
    }
}

fn parse_key(name: &str) -> Option<Key> {
    if let Some(number) = name.strip_prefix('f') {
        if let Ok(n) = number.parse::<u8>() {
            return (1..=24).contains(&n).then_some(Key::Function(n));
        }
    }

    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(Key::Char(c.to_ascii_uppercase())),
        _ => None,
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.modifiers;
        for (on, name) in [(m.ctrl, "Ctrl"), (m.shift, "Shift"), (m.alt, "Alt"), (m.win, "Win")] {
            if on {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub hotkey: Hotkey,
    pub action: HotkeyAction,
}

/// Help text shown when interactive mode starts.
pub fn help_text(bindings: &[HotkeyBinding]) -> String {
    bindings
        .iter()
        .map(|b| format!("{} to {}", b.hotkey, b.action.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wakes the thread that drains hotkey events.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Producer side of the hotkey event queue.
///
/// Actions are queued first and the consumer is woken afterwards, so a wake-up
/// always finds its event.
#[derive(Clone)]
pub struct HotkeySink {
    events: Sender<HotkeyAction>,
    waker: Waker,
}

impl HotkeySink {
    pub fn new(events: Sender<HotkeyAction>, waker: Waker) -> Self {
        Self { events, waker }
    }

    pub fn emit(&self, action: HotkeyAction) {
        if self.events.send(action).is_err() {
            tracing::debug!(?action, "Hotkey event dropped, consumer is gone");
            return;
        }
        (self.waker)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn parses_default_chords() {
        let block: Hotkey = "ctrl+shift+f1".parse().unwrap();
        assert!(block.modifiers.ctrl && block.modifiers.shift);
        assert!(!block.modifiers.alt && !block.modifiers.win);
        assert_eq!(block.key, Key::Function(1));

        let quit: Hotkey = "Ctrl + Shift + q".parse().unwrap();
        assert_eq!(quit.key, Key::Char('Q'));
    }

    #[test]
    fn rejects_malformed_chords() {
        let malformed = [
            "",
            "ctrl+",
            "ctrl+shift",
            "f1",
            "ctrl+f25",
            "ctrl+ctrl+a",
            "ctrl+a+b",
            "ctrl+tab",
        ];
        for bad in malformed {
            assert!(bad.parse::<Hotkey>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_is_canonical() {
        let hotkey: Hotkey = "shift+ctrl+f2".parse().unwrap();
        assert_eq!(hotkey.to_string(), "Ctrl+Shift+F2");
    }

    #[test]
    fn help_text_lists_every_binding() {
        let bindings = [
            HotkeyBinding {
                hotkey: "ctrl+shift+f1".parse().unwrap(),
                action: HotkeyAction::Block,
            },
            HotkeyBinding {
                hotkey: "ctrl+shift+q".parse().unwrap(),
                action: HotkeyAction::Quit,
            },
        ];
        assert_eq!(
            help_text(&bindings),
            "Ctrl+Shift+F1 to block\nCtrl+Shift+Q to exit"
        );
    }

    #[test]
    fn sink_queues_then_wakes() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let sink = HotkeySink::new(
            tx,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        sink.emit(HotkeyAction::Block);
        sink.clone().emit(HotkeyAction::Quit);

        assert_eq!(wakes.load(Ordering::SeqCst), 2);
        assert_eq!(rx.try_recv().unwrap(), HotkeyAction::Block);
        assert_eq!(rx.try_recv().unwrap(), HotkeyAction::Quit);
    }

    #[test]
    fn sink_does_not_wake_without_consumer() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let sink = HotkeySink::new(
            tx,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        sink.emit(HotkeyAction::Restore);
        assert_eq!(wakes.load(Ordering::SeqCst), 0);
    }
}
