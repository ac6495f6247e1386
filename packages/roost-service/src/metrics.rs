//! Sliding-window operation recorder feeding the health monitor.

use std::{
	collections::VecDeque,
	sync::Mutex,
	time::{Duration, Instant},
};

use serde::Serialize;

const MAX_SAMPLES: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
	Indexing,
	Search,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
	at: Instant,
	kind: OperationKind,
	elapsed: Duration,
	failed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
	pub window_seconds: f64,
	pub indexing_ops: u64,
	pub search_ops: u64,
	pub failed_ops: u64,
	/// Indexing operations per second spent indexing. `None` when no indexing happened inside the
	/// window, so a quiet indexer is not mistaken for a slow one.
	pub indexing_ops_per_sec: Option<f64>,
	pub search_ops_per_sec: f64,
	pub error_rate: f64,
	pub avg_response_ms: f64,
	/// Samples discarded because the window was full; rates above undercount by this much.
	pub samples_dropped: u64,
}

#[derive(Default)]
struct Window {
	samples: VecDeque<Sample>,
	dropped: u64,
}

pub struct PerformanceMetrics {
	window: Duration,
	capacity: usize,
	state: Mutex<Window>,
}
impl PerformanceMetrics {
	pub fn new(window: Duration) -> Self {
		Self::with_capacity(window, MAX_SAMPLES)
	}

	pub fn with_capacity(window: Duration, capacity: usize) -> Self {
		Self { window, capacity: capacity.max(1), state: Mutex::new(Window::default()) }
	}

	pub fn record(&self, kind: OperationKind, elapsed: Duration, failed: bool) {
		self.record_at(Instant::now(), kind, elapsed, failed);
	}

	pub fn snapshot(&self) -> MetricsSnapshot {
		self.snapshot_at(Instant::now())
	}

	fn record_at(&self, at: Instant, kind: OperationKind, elapsed: Duration, failed: bool) {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		prune(&mut state, at, self.window);

		if state.samples.len() >= self.capacity {
			state.samples.pop_front();

			if state.dropped == 0 {
				tracing::warn!(
					capacity = self.capacity,
					window_secs = self.window.as_secs(),
					"Metrics window is full. Oldest samples are being dropped."
				);
			}

			state.dropped += 1;
		}

		state.samples.push_back(Sample { at, kind, elapsed, failed });
	}

	fn snapshot_at(&self, now: Instant) -> MetricsSnapshot {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		prune(&mut state, now, self.window);

		let samples = &state.samples;
		let window_seconds = self.window.as_secs_f64().max(f64::EPSILON);
		let total = samples.len() as u64;
		let indexing_ops =
			samples.iter().filter(|sample| sample.kind == OperationKind::Indexing).count() as u64;
		let failed_ops = samples.iter().filter(|sample| sample.failed).count() as u64;
		let total_ms: f64 = samples.iter().map(|sample| sample.elapsed.as_secs_f64() * 1_000.0).sum();
		let indexing_busy_secs: f64 = samples
			.iter()
			.filter(|sample| sample.kind == OperationKind::Indexing)
			.map(|sample| sample.elapsed.as_secs_f64())
			.sum();
		let search_ops = total - indexing_ops;

		MetricsSnapshot {
			window_seconds,
			indexing_ops,
			search_ops,
			failed_ops,
			indexing_ops_per_sec: (indexing_ops > 0)
				.then(|| indexing_ops as f64 / indexing_busy_secs.max(f64::EPSILON)),
			search_ops_per_sec: search_ops as f64 / window_seconds,
			error_rate: if total == 0 { 0.0 } else { failed_ops as f64 / total as f64 },
			avg_response_ms: if total == 0 { 0.0 } else { total_ms / total as f64 },
			samples_dropped: state.dropped,
		}
	}
}

fn prune(state: &mut Window, now: Instant, window: Duration) {
	while let Some(front) = state.samples.front() {
		if now.saturating_duration_since(front.at) <= window {
			break;
		}

		state.samples.pop_front();
	}

	// Samples dropped for capacity have aged out with the rest once the window empties.
	if state.samples.is_empty() {
		state.dropped = 0;
	}
}
