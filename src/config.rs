use crate::error::JamstarError;
use crate::hotkey::{Hotkey, HotkeyAction, HotkeyBinding};
use crate::platform::FirewallRule;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JamstarConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub rule: RuleConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
    #[serde(default)]
    pub elevation: ElevationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Executable names matched case-insensitively against the process table.
    pub process_names: Vec<String>,
    /// Name used in notifications.
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub description: String,
    /// Anything the firewall accepts: `*`, addresses, ranges or subnets, comma separated.
    pub remote_addresses: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub timeout_ms: u32,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    pub block: String,
    pub restore: String,
    pub quit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevationConfig {
    /// Binary name used when relaunching elevated.
    pub package: String,
    /// Relaunch the installed binary even when running from a source checkout.
    pub force_installed: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            process_names: vec!["GTA5.exe".to_string(), "GTA5_Enhanced.exe".to_string()],
            display_name: "GTA5".to_string(),
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            name: "Block_GTA5_Network".to_string(),
            description: "Block network access for GTA5".to_string(),
            remote_addresses: "192.81.241.171".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            x: 0,
            y: 0,
        }
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            block: "ctrl+shift+f1".to_string(),
            restore: "ctrl+shift+f2".to_string(),
            quit: "ctrl+shift+q".to_string(),
        }
    }
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            package: env!("CARGO_PKG_NAME").to_string(),
            force_installed: true,
        }
    }
}

impl RuleConfig {
    pub fn to_block_rule(&self) -> FirewallRule {
        FirewallRule::block_outbound(&self.name, &self.description, &self.remote_addresses)
    }
}

impl HotkeyConfig {
    pub fn bindings(&self) -> Result<Vec<HotkeyBinding>, JamstarError> {
        let parse = |chord: &str, action| -> Result<HotkeyBinding, JamstarError> {
            Ok(HotkeyBinding {
                hotkey: chord.parse::<Hotkey>()?,
                action,
            })
        };

        let bindings = vec![
            parse(&self.block, HotkeyAction::Block)?,
            parse(&self.restore, HotkeyAction::Restore)?,
            parse(&self.quit, HotkeyAction::Quit)?,
        ];

        for (i, a) in bindings.iter().enumerate() {
            if bindings[i + 1..].iter().any(|b| b.hotkey == a.hotkey) {
                return Err(JamstarError::ConfigError(format!(
                    "hotkey {} is bound more than once",
                    a.hotkey
                )));
            }
        }

        Ok(bindings)
    }
}

impl JamstarConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Reads `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            Ok(default)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jamstar")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<(), JamstarError> {
        let invalid =
            |msg: String| -> Result<(), JamstarError> { Err(JamstarError::ConfigError(msg)) };

        if self.target.process_names.iter().all(|n| n.trim().is_empty()) {
            return invalid("target.process_names must name at least one executable".into());
        }
        if self.rule.name.trim().is_empty() {
            return invalid("rule.name must not be empty".into());
        }
        if self.notification.timeout_ms == 0 {
            return invalid("notification.timeout_ms must be greater than zero".into());
        }
        if self.elevation.package.trim().is_empty() {
            return invalid("elevation.package must not be empty".into());
        }
        validate_remote_addresses(&self.rule.remote_addresses)?;
        self.hotkeys.bindings()?;

        Ok(())
    }
}

fn validate_remote_addresses(spec: &str) -> Result<(), JamstarError> {
    if spec.trim() == "*" {
        return Ok(());
    }

    for entry in spec.split(',').map(str::trim) {
        let valid = match entry.split_once('-') {
            Some((start, end)) => {
                matches!(
                    (start.trim().parse::<IpAddr>(), end.trim().parse::<IpAddr>()),
                    (Ok(IpAddr::V4(_)), Ok(IpAddr::V4(_))) | (Ok(IpAddr::V6(_)), Ok(IpAddr::V6(_)))
                )
            }
            None => entry.parse::<IpNetwork>().is_ok(),
        };
        if !valid {
            return Err(JamstarError::ConfigError(format!(
                "rule.remote_addresses: '{}' is not an address, range or subnet",
                entry
            )));
        }
    }

    Ok(())
}
