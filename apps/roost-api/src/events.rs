//! Caller-side retry around the indexing hooks.

use std::time::Duration;

use roost_config::IndexingRetry;
use roost_service::{Error, IndexEvent, IndexingReport, RoostService};

/// Outcome of an event that never applied within the retry budget.
#[derive(Debug)]
pub struct RetryExhausted {
	pub attempts: u32,
	pub entity: String,
	pub last_error: Error,
}

/// Applies `event`, retrying infrastructure failures with exponential backoff.
///
/// Caller errors are returned on the first attempt. After the last attempt fails, an error naming
/// the entity is logged so an operator can force a reindex.
pub async fn apply_with_retry(
	service: &RoostService,
	event: IndexEvent,
	retry: &IndexingRetry,
) -> Result<IndexingReport, RetryExhausted> {
	let mut attempt = 0;

	loop {
		attempt += 1;

		match service.apply_index_event(event).await {
			Ok(report) => return Ok(report),
			Err(err) if err.is_caller_error() || attempt >= retry.max_attempts => {
				if !err.is_caller_error() {
					tracing::error!(
						error = %err,
						event = event.name(),
						entity = %event.entity(),
						attempts = attempt,
						"Index event exhausted retries. Manual reindex required."
					);
				}

				return Err(RetryExhausted { attempts: attempt, entity: event.entity(), last_error: err });
			},
			Err(err) => {
				let delay = backoff(retry, attempt);

				tracing::debug!(
					error = %err,
					event = event.name(),
					attempt,
					delay_ms = delay.as_millis() as u64,
					"Retrying index event."
				);
				tokio::time::sleep(delay).await;
			},
		}
	}
}

/// Delay before attempt `attempt + 1`: base doubled per failed attempt, capped at the maximum.
pub fn backoff(retry: &IndexingRetry, attempt: u32) -> Duration {
	let factor = 1_u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
	let millis = retry.base_backoff_ms.saturating_mul(factor).min(retry.max_backoff_ms);

	Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_until_capped() {
		let retry = IndexingRetry { max_attempts: 8, base_backoff_ms: 100, max_backoff_ms: 1_000 };
		let delays = (1..=6).map(|attempt| backoff(&retry, attempt).as_millis()).collect::<Vec<_>>();

		assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
		assert_eq!(backoff(&retry, 90).as_millis(), 1_000);
	}
}
