//! tubefetch: resilient acquisition layer for video catalog access.
//!
//! Given a watch URL, [`Acquirer::acquire`] produces a validated catalog
//! handle while transparently rotating between anonymizing egress paths
//! (static proxies or a Tor circuit), retrying with exponential backoff on
//! rate limiting, and periodically renewing the Tor circuit to dodge
//! IP-based throttling. Safe to call concurrently from many in-flight
//! requests.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tubefetch::catalog::YoutubeCatalog;
//! use tubefetch::config::Settings;
//! use tubefetch::egress::{Acquirer, TransportSwitch};
//!
//! # async fn run() -> Result<(), tubefetch::egress::AcquireError> {
//! let settings = Settings::load();
//! let transport = Arc::new(TransportSwitch::new());
//! let catalog = YoutubeCatalog::new(transport.clone());
//! let acquirer = Acquirer::new(settings, catalog, transport);
//!
//! let _handle = acquirer
//!     .acquire("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod egress;
pub mod ident;

pub use config::Settings;
pub use egress::{AcquireError, Acquirer, TransportSwitch};
