//! Blocking front end used on plugin threads.

use std::sync::Arc;
use std::time::Duration;

use super::error::{ApiResult, ErrorCode};
use super::promise::ApiPromise;

/// How long a plugin thread waits for the host before giving up.
pub const API_REQUEST_TIMEOUT: Duration = Duration::from_millis(800);

/// Start an API call through `invoke` and wait for its result, at most
/// [`API_REQUEST_TIMEOUT`].
pub fn call_sync<T>(invoke: impl FnOnce(Arc<ApiPromise<T>>)) -> ApiResult<T> {
    call_sync_within(API_REQUEST_TIMEOUT, invoke)
}

/// [`call_sync`] with an explicit bound.
///
/// On timeout the promise is cancelled. Cancelling waits for an operation
/// that already started, so a result that lands during the cancel is still
/// returned; otherwise the call reports [`ErrorCode::ApiRequestTimeout`] and
/// the queued operation will skip itself.
pub fn call_sync_within<T>(
    timeout: Duration,
    invoke: impl FnOnce(Arc<ApiPromise<T>>),
) -> ApiResult<T> {
    let (promise, future) = ApiPromise::new();
    invoke(Arc::clone(&promise));

    if !future.wait_for(timeout) {
        promise.cancel();
        if !future.wait_for(Duration::ZERO) {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "API request timed out"
            );
            promise.set_value(Err(ErrorCode::ApiRequestTimeout));
        }
    }

    future.get()
}
