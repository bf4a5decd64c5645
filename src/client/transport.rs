use std::time::Duration;

use crate::error::{AppError, Result};

/// A byte-oriented settings channel to a paired peripheral.
///
/// One logical write per settings push; the physical link (in production
/// a single GATT characteristic) is flaky, hence the bounded retry in
/// [`send_with_retry`].
pub trait SettingsTransport {
    /// Writes one settings payload to the device channel.
    fn write_settings(
        &mut self,
        payload: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Bounded retry-with-fixed-delay for the device transport path.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts before giving up.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Writes `payload` through the transport, retrying with a fixed delay.
///
/// Succeeds as soon as one attempt does. After `max_attempts` failures
/// the terminal error is `TransportExhausted` naming the attempt count;
/// no further attempts are made. Only the physical-transport path gets
/// this treatment; backend calls are never retried.
pub async fn send_with_retry<T: SettingsTransport>(
    transport: &mut T,
    payload: &[u8],
    policy: RetryPolicy,
) -> Result<()> {
    if policy.max_attempts == 0 {
        return Err(AppError::TransportExhausted(0));
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        match transport.write_settings(payload).await {
            Ok(()) => {
                tracing::debug!(attempt, "Settings payload sent to device");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(attempt, "Device write attempt failed: {}", e);
                if attempt >= policy.max_attempts {
                    return Err(AppError::TransportExhausted(policy.max_attempts));
                }
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
