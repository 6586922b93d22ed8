//! Per-attempt deadlines.

use std::future::Future;
use std::time::Duration;

use crate::sources::SourceError;

/// Run `fut` with a deadline; expiry becomes [`SourceError::Timeout`].
pub async fn with_timeout<T, F>(deadline: Duration, fut: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(deadline)),
    }
}
