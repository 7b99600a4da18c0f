//! Process-wide SOCKS redirection for Tor-backed acquisition.
//!
//! The upstream client library does not accept a per-call transport
//! override for Tor, so while a Tor-backed attempt is in flight every
//! client built through [`TransportSwitch::connector`] is routed through
//! the Tor SOCKS endpoint. This is process-wide state: unrelated clients
//! constructed while the switch is enabled are redirected too. Tor-backed
//! acquisition therefore runs behind a single admission slot
//! ([`TransportSwitch::engage`]); concurrent non-Tor traffic while the
//! switch is enabled remains a known limitation rather than something this
//! module pretends to handle.

use std::sync::Mutex;

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info};

/// The pre-redirection connector factory. Captured once per process
/// lifetime, on first enable, so repeated enable/disable cycles can never
/// lose the true original.
type ConnectorFactory = fn() -> reqwest::ClientBuilder;

fn default_connector() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
}

#[derive(Debug)]
struct SwitchState {
    enabled: bool,
    endpoint: Option<(String, u16)>,
    saved: Option<ConnectorFactory>,
}

/// Global toggle redirecting outbound client construction through SOCKS.
#[derive(Debug)]
pub struct TransportSwitch {
    state: Mutex<SwitchState>,
    /// Single admission slot for Tor-backed acquisition.
    tor_slot: Semaphore,
}

impl Default for TransportSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportSwitch {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SwitchState {
                enabled: false,
                endpoint: None,
                saved: None,
            }),
            tor_slot: Semaphore::new(1),
        }
    }

    /// Install the redirect. Idempotent: calling twice keeps one logical
    /// enablement, and a later single `disable` fully restores defaults.
    pub fn enable(&self, host: &str, port: u16) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.saved.is_none() {
            state.saved = Some(default_connector);
        }
        state.enabled = true;
        state.endpoint = Some((host.to_string(), port));
        info!("enabled SOCKS redirect: {}:{}", host, port);
    }

    /// Remove the redirect, restoring the saved connector behavior.
    /// Idempotent: a no-op when not enabled.
    pub fn disable(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.enabled {
            return;
        }
        state.enabled = false;
        state.endpoint = None;
        info!("disabled SOCKS redirect");
    }

    /// Whether the redirect is currently active.
    pub fn is_enabled(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.enabled
    }

    /// The active SOCKS endpoint URL, if any.
    pub fn socks_url(&self) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .endpoint
            .as_ref()
            .filter(|_| state.enabled)
            // socks5h so DNS resolves on the proxy side, not locally
            .map(|(host, port)| format!("socks5h://{}:{}", host, port))
    }

    /// Build a client builder honoring the current redirect state.
    ///
    /// Disabled: the saved (or default) connector factory, untouched.
    /// Enabled: the same factory with the SOCKS proxy applied.
    pub fn connector(&self) -> Result<reqwest::ClientBuilder, reqwest::Error> {
        let (factory, socks) = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let factory = state.saved.unwrap_or(default_connector);
            let socks = state
                .endpoint
                .as_ref()
                .filter(|_| state.enabled)
                .map(|(host, port)| format!("socks5h://{}:{}", host, port));
            (factory, socks)
        };

        let builder = factory();
        match socks {
            Some(url) => {
                debug!(proxy = %url, "routing client through SOCKS redirect");
                Ok(builder.proxy(reqwest::Proxy::all(&url)?))
            }
            None => Ok(builder),
        }
    }

    /// Acquire the Tor admission slot and enable the redirect for the
    /// lifetime of the returned guard. The guard disables the switch on
    /// drop, on every exit path.
    pub async fn engage(&self, host: &str, port: u16) -> TransportGuard<'_> {
        // Semaphore is never closed, so acquire cannot fail.
        let permit = self
            .tor_slot
            .acquire()
            .await
            .expect("tor admission slot closed");
        self.enable(host, port);
        TransportGuard {
            switch: self,
            _permit: permit,
        }
    }
}

/// RAII guard over an engaged transport switch.
pub struct TransportGuard<'a> {
    switch: &'a TransportSwitch,
    _permit: SemaphorePermit<'a>,
}

impl Drop for TransportGuard<'_> {
    fn drop(&mut self) {
        self.switch.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_then_disable_restores_defaults() {
        let switch = TransportSwitch::new();
        assert!(!switch.is_enabled());
        assert!(switch.socks_url().is_none());

        switch.enable("127.0.0.1", 9050);
        assert!(switch.is_enabled());
        assert_eq!(
            switch.socks_url().as_deref(),
            Some("socks5h://127.0.0.1:9050")
        );

        switch.disable();
        assert!(!switch.is_enabled());
        assert!(switch.socks_url().is_none());
    }

    #[test]
    fn repeated_enables_need_only_one_disable() {
        let switch = TransportSwitch::new();
        switch.enable("127.0.0.1", 9050);
        switch.enable("127.0.0.1", 9050);
        switch.enable("127.0.0.1", 9150);

        switch.disable();
        assert!(!switch.is_enabled());
        assert!(switch.socks_url().is_none());
        assert!(switch.connector().is_ok());
    }

    #[test]
    fn disable_when_not_enabled_is_a_noop() {
        let switch = TransportSwitch::new();
        switch.disable();
        switch.disable();
        assert!(!switch.is_enabled());
    }

    #[tokio::test]
    async fn guard_disables_on_drop() {
        let switch = TransportSwitch::new();
        {
            let _guard = switch.engage("127.0.0.1", 9050).await;
            assert!(switch.is_enabled());
        }
        assert!(!switch.is_enabled());
    }

    #[tokio::test]
    async fn engage_serializes_tor_admission() {
        let switch = TransportSwitch::new();
        let guard = switch.engage("127.0.0.1", 9050).await;

        // Second engagement must wait for the first guard to drop.
        assert!(switch.tor_slot.try_acquire().is_err());
        drop(guard);
        assert!(switch.tor_slot.try_acquire().is_ok());
    }
}
