use std::future::Future;

use crate::error::ApiError;

/// Run `send` up to `max_attempts` times, calling `recover` between
/// attempts when the previous one was rejected with 401.
///
/// - Success and non-401 errors are returned immediately.
/// - `recover` runs only when another attempt is allowed. If it fails, its
///   error is returned and `send` is not called again.
/// - A 401 on the last attempt is returned unchanged.
///
/// With `max_attempts = 2` this is the "refresh once, retry once" policy.
/// There is no backoff between attempts.
///
/// # Errors
///
/// Returns the error of the last attempt, or the error from `recover`.
pub async fn with_unauthorized_retry<T, S, SF, R, RF>(
    max_attempts: u32,
    mut send: S,
    mut recover: R,
) -> Result<T, ApiError>
where
    S: FnMut() -> SF,
    SF: Future<Output = Result<T, ApiError>>,
    R: FnMut(ApiError) -> RF,
    RF: Future<Output = Result<(), ApiError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match send().await {
            Err(err) if err.is_unauthorized() && attempt < max_attempts => {
                tracing::debug!(attempt, max_attempts, "request unauthorized, attempting recovery");
                recover(err).await?;
                attempt += 1;
            }
            result => return result,
        }
    }
}
