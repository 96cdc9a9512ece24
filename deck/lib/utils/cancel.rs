use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::{DeckError, DeckResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Runs `future` unless `cancel` fires first.
///
/// A cancelled future is dropped, which kills any engine process it spawned. An already
/// cancelled token never polls the future.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    what: &str,
    future: impl Future<Output = DeckResult<T>>,
) -> DeckResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!("cancelled: {}", what);
            Err(DeckError::Cancelled(what.to_string()))
        }
        result = future => result,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_cancelled_token_never_polls() {
        let polled = AtomicBool::new(false);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = cancellable(&cancel, "stopping app-dev", async {
            polled.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(DeckError::Cancelled(what)) if what == "stopping app-dev"));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_completes_without_cancel() {
        let cancel = CancellationToken::new();
        let value = cancellable(&cancel, "listing", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
