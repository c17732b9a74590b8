//! Helpers for releasing handles on every exit path.

use crate::Result;

/// Runs `release` unconditionally and folds its error into `result`.
///
/// The first error wins: a release failure only surfaces when `result` was
/// `Ok`.
pub(crate) fn check_close<T>(result: Result<T>, release: impl FnOnce() -> Result<()>) -> Result<T> {
    let released = release();
    match (result, released) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
        (Ok(value), Ok(())) => Ok(value),
    }
}
