//! Time bounds for durable store calls.

use serde_json::json;
use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Store access limits shared by the request-path services.
#[derive(Debug, Clone, Copy)]
pub struct StorePolicy {
    /// Bound on a single store call.
    pub timeout: Duration,
    /// Retries of transient failures after the first attempt (redirects only).
    pub retry_attempts: usize,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            retry_attempts: 3,
        }
    }
}

impl StorePolicy {
    /// Awaits `call`, turning an elapsed timeout into [`AppError::Unavailable`].
    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::unavailable(
                "Database timed out",
                json!({
                    "operation": operation,
                    "timeout_ms": self.timeout.as_millis() as u64,
                }),
            )),
        }
    }
}
