use std::time::Duration;

use async_trait::async_trait;

/// Injectable delay source so the retry policy and the loading-timeout
/// stay deterministic under paused test time.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper over the tokio timer wheel.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
