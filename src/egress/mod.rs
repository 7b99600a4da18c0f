//! Resilient egress for upstream acquisition.
//!
//! The upstream platform rate-limits and blocks server IPs aggressively,
//! so the acquisition path never depends on a single egress identity:
//!
//! - **Pool**: ordered egress options (static proxies or Tor) rotated
//!   round-robin, with soft exclusion of failed entries.
//! - **Circuit**: Tor circuit age tracking and renewal over the control
//!   port (`SIGNAL NEWNYM`).
//! - **Transport**: process-wide SOCKS redirect engaged for the duration
//!   of a Tor-backed acquisition, behind a single admission slot.
//! - **Acquire**: the retry orchestrator tying the three together with
//!   exponential backoff.
//!
//! # Configuration
//!
//! Recognized environment options (see [`crate::config::Settings`]):
//! `USE_TOR`, `TOR_PROXY_HOST` / `TOR_PROXY_PORT`, `TOR_CONTROL_PORT`,
//! `PROXIES` (comma-separated URIs), `AUTH`.

mod acquire;
mod circuit;
mod error;
mod pool;
mod transport;

pub use acquire::{Acquirer, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use circuit::CircuitController;
pub use error::AcquireError;
pub use pool::{EgressKind, EgressOption, EgressPool, ProxyCredentials};
pub use transport::{TransportGuard, TransportSwitch};
