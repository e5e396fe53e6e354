//! Error handling and recovery for the training loop.
//!
//! - [`save_with_retry`]: retry a failed save once after a short delay
//! - [`find_divergent`] / [`is_divergent`]: detect NaN/Inf weights

use std::time::Duration;

use crate::evaluator::WeightTable;
use crate::learning::LearningError;

/// Delay before retrying a failed save.
pub const SAVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Run `save_fn`, retrying once after [`SAVE_RETRY_DELAY`] on failure.
pub fn save_with_retry<F, T>(save_fn: F) -> Result<T, LearningError>
where
    F: FnMut() -> Result<T, LearningError>,
{
    save_with_retry_after(SAVE_RETRY_DELAY, save_fn)
}

/// [`save_with_retry`] with an explicit delay.
pub fn save_with_retry_after<F, T>(delay: Duration, mut save_fn: F) -> Result<T, LearningError>
where
    F: FnMut() -> Result<T, LearningError>,
{
    match save_fn() {
        Ok(value) => Ok(value),
        Err(first_error) => {
            log::warn!(
                "Save failed, retrying in {:.1}s: {}",
                delay.as_secs_f64(),
                first_error
            );
            std::thread::sleep(delay);

            match save_fn() {
                Ok(value) => {
                    log::info!("Save succeeded on retry");
                    Ok(value)
                }
                Err(second_error) => {
                    log::warn!("Save failed after retry: {}", second_error);
                    Err(second_error)
                }
            }
        }
    }
}

#[inline]
fn is_invalid(value: f64) -> bool {
    !value.is_finite()
}

/// First NaN/Inf weight as `(table, key, value)`.
pub fn find_divergent(tables: &[WeightTable]) -> Option<(usize, i32, f64)> {
    tables.iter().enumerate().find_map(|(t, table)| {
        table
            .iter()
            .find(|&(_, value)| is_invalid(value))
            .map(|(key, value)| (t, key, value))
    })
}

/// Whether any weight is NaN or infinite.
pub fn is_divergent(tables: &[WeightTable]) -> bool {
    find_divergent(tables).is_some()
}

/// `Err(EvaluationDivergence)` naming the first bad weight, if any.
pub fn check_divergence(tables: &[WeightTable]) -> Result<(), LearningError> {
    match find_divergent(tables) {
        Some((table, key, value)) => Err(LearningError::EvaluationDivergence(format!(
            "table {} key {} = {}",
            table, key, value
        ))),
        None => Ok(()),
    }
}
