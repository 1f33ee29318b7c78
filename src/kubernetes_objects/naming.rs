use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

static LAST_SUFFIX: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp suffix, strictly increasing within this process.
///
/// Two builds in the same millisecond get consecutive values instead of the
/// same one, so back-to-back runs never collide on the job name.
pub fn unique_suffix() -> String {
    next_suffix(&LAST_SUFFIX, Utc::now().timestamp_millis()).to_string()
}

fn next_suffix(last_suffix: &AtomicI64, now_millis: i64) -> i64 {
    let mut last = last_suffix.load(Ordering::Relaxed);
    loop {
        let candidate = now_millis.max(last + 1);
        match last_suffix.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_strictly_increases() {
        let a: i64 = unique_suffix().parse().unwrap();
        let b: i64 = unique_suffix().parse().unwrap();
        let c: i64 = unique_suffix().parse().unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_suffix_ignores_clock_going_backwards() {
        let last = AtomicI64::new(0);
        let first = next_suffix(&last, 5_000);
        let second = next_suffix(&last, 10);
        assert_eq!(first, 5_000);
        assert_eq!(second, 5_001);
    }

    #[test]
    fn test_suffix_follows_clock_when_ahead() {
        let last = AtomicI64::new(100);
        assert_eq!(next_suffix(&last, 100), 101);
        assert_eq!(next_suffix(&last, 2_000), 2_000);
        assert_eq!(last.load(Ordering::SeqCst), 2_000);
    }
}
