use std::time::SystemTime;

// token bucket based rate limit
// should be Send+Sync
#[derive(Debug)]
pub(crate) struct TokenBucket {
    tokens_per_sec: f64,
    available: f64,
    capacity: f64,
    last_time: SystemTime,
}

impl TokenBucket {
    pub(crate) fn new(capacity: f64, tokens_per_sec: f64) -> TokenBucket {
        TokenBucket {
            tokens_per_sec,
            available: capacity,
            capacity,
            last_time: SystemTime::now(),
        }
    }

    /// Change capacity and refill rate, carrying the current token level
    /// over (clamped to the new capacity). The bucket is never refilled by
    /// a reconfiguration.
    pub(crate) fn reconfigure(&mut self, capacity: f64, tokens_per_sec: f64) {
        self.capacity = capacity;
        self.tokens_per_sec = tokens_per_sec;
        self.available = f64::min(self.available, capacity);
    }

    /// Withdraw one token, refilling proportionally to the time elapsed
    /// since the last refill. The level saturates at `capacity` and never
    /// goes negative.
    pub(crate) fn try_consume<F>(&mut self, now: F) -> bool
    where
        F: Fn() -> SystemTime,
    {
        if self.available >= 1.0 {
            self.available -= 1.0;
            return true;
        }

        let cur_time = now();
        match cur_time.duration_since(self.last_time) {
            Ok(elapsed) => {
                self.last_time = cur_time;
                self.available = f64::min(
                    elapsed.as_secs_f64() * self.tokens_per_sec + self.available,
                    self.capacity,
                );

                if self.available >= 1.0 {
                    self.available -= 1.0;
                    true
                } else {
                    false
                }
            }
            Err(_) => {
                // Rewound clock. Permit the request rather than stalling the
                // bucket until the clock catches up.
                tracing::warn!(
                    name: "TokenBucket.ClockRewind",
                    "system clock moved backwards; permitting request"
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::{Add, Sub};
    use std::time::Duration;

    #[test]
    fn bucket_refills_and_saturates() {
        // maximum bucket size 2, add 1 token every 10 seconds
        let mut bucket = TokenBucket::new(2.0, 0.1);
        let current_time = SystemTime::now();
        bucket.last_time = current_time;

        let test_cases = vec![
            (0, vec![true, true, false]),
            (1, vec![false]),
            (5, vec![false]),
            (10, vec![true, false]),
            (60, vec![true, true, false]), // level is capped at 2
        ];

        for (elapsed_sec, cases) in test_cases.into_iter() {
            for should_pass in cases {
                assert_eq!(
                    should_pass,
                    bucket.try_consume(|| current_time.add(Duration::from_secs(elapsed_sec)))
                )
            }
        }
    }

    #[test]
    fn refill_counts_fractional_seconds() {
        // half a token per second
        let mut bucket = TokenBucket::new(2.0, 0.5);
        let current_time = SystemTime::now();
        bucket.last_time = current_time;
        bucket.available = 0.0;

        // 1.2s * 0.5 = 0.6 tokens: not enough yet
        assert!(!bucket.try_consume(|| current_time.add(Duration::from_millis(1200))));
        // another 2.2s adds 1.1 tokens on top of the 0.6 carried over
        assert!(bucket.try_consume(|| current_time.add(Duration::from_millis(3400))));
        assert!(!bucket.try_consume(|| current_time.add(Duration::from_millis(3400))));
    }

    #[test]
    fn reconfigure_clamps_but_never_refills() {
        let mut bucket = TokenBucket::new(4.0, 0.0);
        let current_time = SystemTime::now();
        bucket.last_time = current_time;

        assert!(bucket.try_consume(|| current_time));
        bucket.reconfigure(1.0, 0.0);
        // 3 tokens were left; the new capacity caps them at 1
        assert!(bucket.try_consume(|| current_time));
        assert!(!bucket.try_consume(|| current_time));

        // growing capacity does not mint tokens either
        bucket.reconfigure(8.0, 0.0);
        assert!(!bucket.try_consume(|| current_time));
    }

    #[test]
    fn zero_rate_never_refills() {
        let mut bucket = TokenBucket::new(1.0, 0.0);
        let current_time = SystemTime::now();
        bucket.last_time = current_time;

        assert!(bucket.try_consume(|| current_time.add(Duration::from_secs(1))));
        assert!(!bucket.try_consume(|| current_time.add(Duration::from_secs(3600))));
    }

    #[test]
    fn rewound_clock_should_pass() {
        let mut bucket = TokenBucket::new(2.0, 0.1);
        let current_time = SystemTime::now();
        bucket.last_time = current_time;
        bucket.available = 0.0;

        assert!(bucket.try_consume(|| current_time.sub(Duration::from_secs(10))));
    }
}
