//! Scheduler: a durable min-heap of `{dueAt, actionName, payload, id}` with
//! exactly one OS timer armed for the earliest entry.
//!
//! `tokio::time::sleep` accepts a `Duration`, which on most platforms is
//! bounded well past what we need, but some platforms/runtimes hit the 32-bit
//! timer limit (~24.8 days); `next_sleep_chunk` caps any single sleep so a
//! multi-month alarm is re-armed in segments instead of handed to the runtime
//! as one giant duration.
use rivetkit_protocol::persisted::ScheduleEntry;
use std::time::Duration;

/// ~24.8 days: the largest `u32` milliseconds value, the classic 32-bit timer
/// ceiling this guards against.
pub const MAX_TIMER_DELAY_MS: i64 = i32::MAX as i64;

/// Returns the entry with the smallest `due_at`, if any.
pub fn earliest<'a>(schedule: &'a [ScheduleEntry]) -> Option<&'a ScheduleEntry> {
	schedule.iter().min_by_key(|entry| entry.due_at)
}

/// Entries with `due_at <= now_ms`, in ascending `due_at` order (ties broken
/// by original position, i.e. insertion order).
pub fn due_entries(schedule: &[ScheduleEntry], now_ms: i64) -> Vec<ScheduleEntry> {
	let mut due: Vec<ScheduleEntry> = schedule
		.iter()
		.filter(|entry| entry.due_at <= now_ms)
		.cloned()
		.collect();
	due.sort_by_key(|entry| entry.due_at);
	due
}

/// How long to sleep before the next check, clamped to `MAX_TIMER_DELAY_MS`
/// so a far-future alarm gets re-armed in segments rather than overflowing a
/// single timer.
pub fn next_sleep_chunk(due_at_ms: i64, now_ms: i64) -> Duration {
	let remaining = (due_at_ms - now_ms).max(0);
	Duration::from_millis(remaining.min(MAX_TIMER_DELAY_MS) as u64)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(id: &str, due_at: i64) -> ScheduleEntry {
		ScheduleEntry {
			id: id.to_string(),
			due_at,
			action_name: "tick".to_string(),
			payload: None,
		}
	}

	#[test]
	fn earliest_picks_the_smallest_due_at() {
		let schedule = vec![entry("a", 300), entry("b", 100), entry("c", 200)];
		assert_eq!(earliest(&schedule).unwrap().id, "b");
	}

	#[test]
	fn due_entries_excludes_future_entries_and_sorts_ascending() {
		let schedule = vec![entry("a", 300), entry("b", 100), entry("c", 200)];
		let due = due_entries(&schedule, 200);
		assert_eq!(
			due.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
			vec!["b", "c"]
		);
	}

	#[test]
	fn long_delays_are_chunked_under_the_32_bit_limit() {
		let far_future = 1_000 + MAX_TIMER_DELAY_MS * 3;
		let chunk = next_sleep_chunk(far_future, 1_000);
		assert_eq!(chunk, Duration::from_millis(MAX_TIMER_DELAY_MS as u64));
	}

	#[test]
	fn overdue_entries_sleep_zero() {
		assert_eq!(next_sleep_chunk(500, 1_000), Duration::from_millis(0));
	}
}
