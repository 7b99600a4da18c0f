//! Terminal errors surfaced by the acquisition layer.
//!
//! Everything below these is handled inside the retry loop: a failed proxy
//! is marked and rotation continues, an unreachable control channel is
//! logged and the renewal skipped. Callers only ever see one terminal
//! error carrying the last concrete failure and the attempt count.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::ident::InvalidIdentifier;

#[derive(Debug, Error)]
pub enum AcquireError {
    /// The identifier is not a recognized video URL. Propagates without
    /// retry; no egress or circuit state is touched.
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    /// Every attempt hit the upstream rate limit, even after egress
    /// rotation and backoff.
    #[error("upstream rate limit exceeded after {attempts} attempts; try again later")]
    RateLimited { attempts: u32 },

    /// All attempts consumed without success; wraps the last underlying
    /// failure.
    #[error("all {attempts} acquisition attempts failed")]
    Exhausted {
        attempts: u32,
        #[source]
        source: CatalogError,
    },
}

impl AcquireError {
    /// Attempt count carried by terminal errors, when applicable.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            AcquireError::InvalidIdentifier(_) => None,
            AcquireError::RateLimited { attempts } => Some(*attempts),
            AcquireError::Exhausted { attempts, .. } => Some(*attempts),
        }
    }
}
