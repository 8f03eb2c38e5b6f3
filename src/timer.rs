//! Retry and poll timer policy. Both timers are deadline-based rather than
//! spawned tasks: `connection.rs` holds an `Option<Instant>` per timer and
//! selects over a helper future that never resolves while the deadline is
//! `None`, which is how a `tokio::select!` loop cancels a timer without an
//! explicit abort handle.

use std::time::Duration;

use tokio::time::Instant;

/// Resolves at `deadline`, or never if `deadline` is `None` — the
/// `tokio::select!` branch for an unarmed timer.
pub async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

/// Retries are resent after `polling_interval + 1` seconds of silence.
pub fn retry_deadline(polling_interval: Duration) -> Instant {
    Instant::now() + polling_interval + Duration::from_secs(1)
}

/// A connection disconnects after this many unanswered retries.
pub const MAX_RETRIES: u8 = 3;
