//! forge::retry
//!
//! Bounded exponential backoff for transient forge failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::traits::ForgeError;

/// Maximum number of attempts for a single forge operation.
const MAX_ATTEMPTS: u32 = 4;

/// Initial backoff delay; doubles after each transient failure.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Run a forge operation, retrying transient failures.
///
/// Permanent failures are surfaced immediately. Transient ones (rate limits,
/// network errors, 5xx) are retried up to a small cap with exponential
/// backoff.
///
/// # Example
///
/// ```ignore
/// let pr = with_retry("get_pr", || forge.get_pr(500)).await?;
/// ```
pub async fn with_retry<T, F, Fut>(operation: &str, mut f: F) -> Result<T, ForgeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ForgeError>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                warn!(
                    operation,
                    attempt,
                    error = %e,
                    "transient forge error, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
