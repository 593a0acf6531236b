//! Infrastructure implementation of the `Sleeper` port.

use std::time::Duration;

use crate::application::ports::Sleeper;

/// Real wall-clock sleeping on the tokio timer.
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
