// src/platform/win32/firewall.rs

use crate::catch::{Catch, LogLevels};
use crate::error::{JamstarError, Result};
use crate::platform::{FirewallProvider, FirewallRule, FirewallSession};
use tracing::{debug, info};
use windows::core::BSTR;
use windows::Win32::Foundation::{RPC_E_CHANGED_MODE, VARIANT_TRUE};
use windows::Win32::NetworkManagement::WindowsFirewall::{
    INetFwPolicy2, INetFwRule, NetFwPolicy2, NetFwRule, NET_FW_ACTION_BLOCK, NET_FW_RULE_DIR_OUT,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_INPROC_SERVER,
    COINIT_APARTMENTTHREADED,
};

/// Windows Firewall through the `HNetCfg.FwPolicy2` COM object.
#[derive(Default)]
pub struct WindowsFirewall;

impl WindowsFirewall {
    pub fn new() -> Self {
        WindowsFirewall
    }
}

impl FirewallProvider for WindowsFirewall {
    fn open(&self) -> Result<Box<dyn FirewallSession + '_>> {
        Ok(Box::new(PolicySession::open()?))
    }
}

/// Balances a successful `CoInitializeEx` when dropped.
struct ComApartment {
    initialized: bool,
}

impl ComApartment {
    fn enter() -> Result<Self> {
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            // Already in a multithreaded apartment: usable, but not ours to release.
            return Ok(Self { initialized: false });
        }
        hr.ok()?;
        Ok(Self { initialized: true })
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.initialized {
            unsafe { CoUninitialize() };
        }
    }
}

struct PolicySession {
    // Must drop before `_apartment`.
    policy: INetFwPolicy2,
    _apartment: ComApartment,
}

impl PolicySession {
    fn open() -> Result<Self> {
        let apartment = ComApartment::enter()?;
        let policy: INetFwPolicy2 =
            unsafe { CoCreateInstance(&NetFwPolicy2, None, CLSCTX_INPROC_SERVER) }.map_err(|e| {
                JamstarError::FirewallError(format!("CoCreateInstance(NetFwPolicy2): {}", e))
            })?;
        debug!("Firewall policy acquired");

        Ok(Self {
            policy,
            _apartment: apartment,
        })
    }

    fn lookup(&self, name: &str) -> windows::core::Result<INetFwRule> {
        unsafe { self.policy.Rules()?.Item(&BSTR::from(name)) }
    }
}

impl FirewallSession for PolicySession {
    fn rule_exists(&self, name: &str) -> bool {
        Catch::new("rule_exists")
            .field("name", name)
            .level(LogLevels::SilentExc)
            .message("Firewall rule lookup failed")
            .default(false)
            .call(|| self.lookup(name).map(|_| true))
            .unwrap_or(false)
    }

    fn create_block_rule(&self, rule: &FirewallRule) -> Result<()> {
        let fail = |step: &str, e: windows::core::Error| {
            JamstarError::FirewallError(format!("{}: {}", step, e))
        };

        unsafe {
            let rules = self
                .policy
                .Rules()
                .map_err(|e| fail("INetFwPolicy2::Rules", e))?;
            let fw_rule: INetFwRule = CoCreateInstance(&NetFwRule, None, CLSCTX_INPROC_SERVER)
                .map_err(|e| fail("CoCreateInstance(NetFwRule)", e))?;

            fw_rule
                .SetName(&BSTR::from(rule.name.as_str()))
                .map_err(|e| fail("SetName", e))?;
            fw_rule
                .SetDescription(&BSTR::from(rule.description.as_str()))
                .map_err(|e| fail("SetDescription", e))?;
            fw_rule
                .SetAction(NET_FW_ACTION_BLOCK)
                .map_err(|e| fail("SetAction", e))?;
            fw_rule
                .SetDirection(NET_FW_RULE_DIR_OUT)
                .map_err(|e| fail("SetDirection", e))?;
            fw_rule
                .SetEnabled(VARIANT_TRUE)
                .map_err(|e| fail("SetEnabled", e))?;
            fw_rule
                .SetRemoteAddresses(&BSTR::from(rule.remote_addresses.as_str()))
                .map_err(|e| fail("SetRemoteAddresses", e))?;

            rules.Add(&fw_rule).map_err(|e| fail("Rules.Add", e))?;
        }

        info!(
            rule = %rule.name,
            remote_addresses = %rule.remote_addresses,
            "Firewall rule created"
        );
        Ok(())
    }

    fn remove_rule(&self, name: &str) -> Result<()> {
        if !self.rule_exists(name) {
            return Ok(());
        }

        unsafe {
            self.policy
                .Rules()
                .and_then(|rules| rules.Remove(&BSTR::from(name)))
                .map_err(|e| JamstarError::FirewallError(format!("Rules.Remove: {}", e)))?;
        }

        info!(rule = %name, "Firewall rule removed");
        Ok(())
    }
}
