//! Cancellable waits.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless `token` fires first.
///
/// Returns `true` when the full duration elapsed and `false` on
/// cancellation. Cancellation is checked first, so an already-cancelled
/// token never sleeps.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
