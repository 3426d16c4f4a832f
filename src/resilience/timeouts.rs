//! Timeout enforcement.
//!
//! Wraps a single attempt with a deadline; an elapsed deadline is reported
//! as [`TransportError::Timeout`], distinct from transport failures.

use std::future::Future;
use std::time::Duration;

use crate::dispatch::TransportError;

/// Run `attempt` with a deadline.
pub async fn with_deadline<F>(deadline: Duration, attempt: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    match tokio::time::timeout(deadline, attempt).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_deadline_is_timeout() {
        let result = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result = with_deadline(Duration::from_secs(1), async {
            Err(TransportError::Protocol("bad body".into()))
        })
        .await;
        assert!(matches!(result, Err(TransportError::Protocol(_))));
    }
}
