use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Bounded, cancellable suspension. Returns `false` if the cancel signal
/// fired before the pause elapsed — callers stop at that checkpoint.
pub(crate) async fn sleep_unless_cancelled(cancel: &CancellationToken, dur: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(dur) => true,
    }
}
