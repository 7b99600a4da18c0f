//! Retry orchestrator: the top-level entry point of the acquisition layer.
//!
//! `Start -> SelectEgress -> (MaybeRenewCircuit) -> Attempt ->
//! {Success | RateLimited | OtherFailure} -> (Backoff) -> SelectEgress | Terminal`
//!
//! One shared [`Acquirer`] serves all in-flight requests; pool rotation
//! and circuit age are process-wide so concurrent acquisitions cooperate
//! on egress selection instead of hammering one identity.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::circuit::CircuitController;
use super::error::AcquireError;
use super::pool::EgressPool;
use super::transport::TransportSwitch;
use crate::catalog::{Catalog, CatalogError, CatalogHandle, ConnectRequest, ProxyDescriptor};
use crate::config::Settings;
use crate::ident;

/// Default number of acquisition attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default initial backoff delay; doubles with each attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Record of one retry iteration, kept only for logging and backoff
/// decisions.
#[derive(Debug)]
struct AttemptOutcome {
    attempt: u32,
    egress: Option<usize>,
    rate_limited: bool,
    delay: Duration,
}

impl AttemptOutcome {
    fn log(&self) {
        debug!(
            attempt = self.attempt,
            egress = ?self.egress,
            rate_limited = self.rate_limited,
            delay_secs = self.delay.as_secs(),
            "attempt failed, backing off"
        );
    }
}

/// Produces validated catalog handles, rotating egress and retrying with
/// exponential backoff on failure.
pub struct Acquirer<C: Catalog> {
    catalog: C,
    pool: EgressPool,
    circuit: CircuitController,
    transport: Arc<TransportSwitch>,
    settings: Settings,
}

impl<C: Catalog> Acquirer<C> {
    /// Build an acquirer from settings. The egress pool is resolved once
    /// here; options are immutable for the life of the process.
    pub fn new(settings: Settings, catalog: C, transport: Arc<TransportSwitch>) -> Self {
        let pool = EgressPool::resolve(&settings);
        let circuit = CircuitController::new(
            settings.tor_control_port,
            settings.max_circuit_age,
            settings.circuit_settle,
        );
        Self {
            catalog,
            pool,
            circuit,
            transport,
            settings,
        }
    }

    /// The shared transport switch, for wiring into catalog construction.
    pub fn transport(&self) -> &Arc<TransportSwitch> {
        &self.transport
    }

    /// Acquire a validated handle with default retry parameters.
    pub async fn acquire(&self, identifier: &str) -> Result<C::Handle, AcquireError> {
        self.acquire_with(identifier, DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY)
            .await
    }

    /// Acquire a validated handle to `identifier`.
    ///
    /// Backoff is attempt-indexed exponential (`initial_delay * 2^attempt`)
    /// with no jitter and no cap; large `max_attempts` means unbounded
    /// total wall-clock delay.
    pub async fn acquire_with(
        &self,
        identifier: &str,
        max_attempts: u32,
        initial_delay: Duration,
    ) -> Result<C::Handle, AcquireError> {
        ident::video_id(identifier)?;

        let using_proxies = !self.pool.is_empty();
        let is_tor = using_proxies && self.pool.is_tor();

        // Holds the single Tor admission slot and keeps the SOCKS redirect
        // enabled for the whole call; dropped (and the switch disabled) on
        // every exit path, success or failure.
        let _guard = if is_tor {
            Some(
                self.transport
                    .engage(&self.settings.tor_proxy_host, self.settings.tor_proxy_port)
                    .await,
            )
        } else {
            None
        };

        let mut last_failure: Option<CatalogError> = None;

        for attempt in 0..max_attempts {
            let mut chosen: Option<usize> = None;
            let mut proxy: Option<ProxyDescriptor> = None;

            if using_proxies {
                // Proactive rotation: bound exposure of any single exit
                // identity to max_circuit_age attempts.
                if is_tor && self.circuit.should_renew() {
                    info!("circuit aged out, renewing for a fresh exit identity");
                    self.circuit.renew().await;
                }

                if let Some((index, option)) = self.pool.next().await {
                    chosen = Some(index);
                    if is_tor {
                        // Routing is global while the switch is engaged; no
                        // per-call descriptor.
                        info!(attempt = attempt + 1, "attempt via tor");
                    } else {
                        proxy = option.descriptor();
                        info!(
                            attempt = attempt + 1,
                            proxy = %option.server,
                            "attempt via static proxy"
                        );
                    }
                }
            }

            match self.try_once(identifier, proxy.as_ref()).await {
                Ok(handle) => {
                    info!(attempt = attempt + 1, "acquired validated catalog handle");
                    return Ok(handle);
                }
                Err(failure) if failure.is_rate_limited() => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts, "rate limited (429) by upstream"
                    );

                    // Reactive rotation: swap identity rather than blindly
                    // retrying on the blocked one.
                    if is_tor {
                        info!("rate limited on tor, renewing circuit");
                        self.circuit.renew().await;
                    } else if using_proxies {
                        if let Some(index) = chosen {
                            self.pool.mark_failed(index).await;
                        }
                    }

                    if attempt + 1 < max_attempts {
                        let delay = backoff_delay(initial_delay, attempt);
                        AttemptOutcome {
                            attempt,
                            egress: chosen,
                            rate_limited: true,
                            delay,
                        }
                        .log();
                        sleep(delay).await;
                        last_failure = Some(failure);
                    } else {
                        error!("rate limit persisted through all attempts");
                        return Err(AcquireError::RateLimited {
                            attempts: max_attempts,
                        });
                    }
                }
                Err(failure) => {
                    error!(attempt = attempt + 1, error = %failure, "attempt failed");

                    if attempt + 1 < max_attempts {
                        // Unknown failures are treated as possibly
                        // egress-related; renewing on every one can
                        // over-rotate when the cause is elsewhere, but a
                        // stale exit is the common case here.
                        if is_tor {
                            self.circuit.renew().await;
                        }

                        let delay = backoff_delay(initial_delay, attempt);
                        AttemptOutcome {
                            attempt,
                            egress: chosen,
                            rate_limited: false,
                            delay,
                        }
                        .log();
                        sleep(delay).await;
                        last_failure = Some(failure);
                    } else {
                        return Err(AcquireError::Exhausted {
                            attempts: max_attempts,
                            source: failure,
                        });
                    }
                }
            }
        }

        // Only reachable with max_attempts == 0.
        Err(AcquireError::Exhausted {
            attempts: max_attempts,
            source: last_failure
                .unwrap_or_else(|| CatalogError::Unavailable("no attempts permitted".to_string())),
        })
    }

    /// One attempt: construct the client handle, then force a property
    /// read. Construction alone is lazy and may not surface failures.
    async fn try_once(
        &self,
        identifier: &str,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<C::Handle, CatalogError> {
        let mut handle = self
            .catalog
            .connect(ConnectRequest {
                identifier,
                auth: self.settings.auth,
                cache_dir: self.settings.auth.then_some(self.settings.cache_dir.as_path()),
                proxy,
            })
            .await?;

        let title = handle.title().await?;
        debug!(title = %title, "remote handshake confirmed");
        Ok(handle)
    }
}

fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    initial * 2u32.saturating_pow(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_attempt_indexed_exponential() {
        let initial = Duration::from_secs(2);
        assert_eq!(backoff_delay(initial, 0), Duration::from_secs(2));
        assert_eq!(backoff_delay(initial, 1), Duration::from_secs(4));
        assert_eq!(backoff_delay(initial, 2), Duration::from_secs(8));
    }
}
