//! Property-Based Tests for the rate limiter.

use proptest::prelude::*;

use crate::cache::SharedCache;
use crate::rate_limit::{RateLimitPolicy, RateLimiter, SlowDownPolicy};

fn limiter(max: u32, window_ms: u64) -> RateLimiter {
    RateLimiter::new(
        SharedCache::default(),
        vec![RateLimitPolicy::new("p", window_ms, max, "limited")],
        SlowDownPolicy::default(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // With max N, the (N+1)-th request inside the window is rejected with a
    // retry hint no longer than the window, and a request one full window
    // after the first is admitted again.
    #[test]
    fn prop_n_plus_one_is_rejected(
        max in 1u32..20,
        window_secs in 1u64..600,
        start in 0u64..1_000_000_000,
        gaps in prop::collection::vec(0u64..50, 20),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let window_ms = window_secs * 1000;

        rt.block_on(async {
            let limiter = limiter(max, window_ms);
            let mut now = start;

            for gap in gaps.iter().take(max as usize) {
                now += gap;
                prop_assert!(limiter.check_and_record_at("p", "client", now).await.admitted);
            }

            let rejected = limiter.check_and_record_at("p", "client", now).await;
            prop_assert!(!rejected.admitted);
            let retry_after = rejected.retry_after.unwrap_or_default();
            prop_assert!(retry_after >= 1 && retry_after <= window_secs);

            let first = start + gaps[0];
            prop_assert!(limiter.check_and_record_at("p", "client", first + window_ms).await.admitted);
            Ok(())
        })?;
    }

    // Remaining never exceeds the limit and decreases by one per admission.
    #[test]
    fn prop_remaining_is_monotonic(max in 1u32..30, requests in 1usize..40) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let limiter = limiter(max, 60_000);
            let mut previous = max;

            for i in 0..requests {
                let decision = limiter.check_and_record_at("p", "c", i as u64).await;
                prop_assert!(decision.remaining <= max);
                if decision.admitted {
                    prop_assert_eq!(decision.remaining, previous - 1);
                    previous = decision.remaining;
                } else {
                    prop_assert_eq!(decision.remaining, 0);
                    prop_assert!(i >= max as usize);
                }
            }
            Ok(())
        })?;
    }
}
