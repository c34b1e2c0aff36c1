use std::time::Duration;

use async_trait::async_trait;

/// Pause inserted between consecutive story creations.
///
/// The tracker enforces an undocumented per-second limit on issue creation;
/// a fixed pause keeps the fan-out under it.
#[async_trait]
pub trait StoryDelay: Send + Sync {
    async fn pause(&self);
}

/// Sleep for a constant interval.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl StoryDelay for FixedDelay {
    async fn pause(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// Return immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

#[async_trait]
impl StoryDelay for NoDelay {
    async fn pause(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_fixed_delay_waits_at_least_interval() {
        let started = Instant::now();
        FixedDelay(Duration::from_millis(25)).pause().await;
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_zero_delay_returns_immediately() {
        let started = Instant::now();
        FixedDelay(Duration::ZERO).pause().await;
        NoDelay.pause().await;
        assert!(started.elapsed() < Duration::from_millis(20));
    }
}
