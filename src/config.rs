//! Configuration surface consumed from an external settings collaborator.

/// Sampling-gate settings with independently optional fields.
///
/// Unset fields leave the gate's current values untouched. Values outside
/// their allowed range are reported as processed but not applied; they are
/// never fatal.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct GateConfig {
    /// Token-bucket capacity, in tokens.
    pub token_bucket_capacity: Option<f64>,
    /// Token-bucket refill rate, in tokens per second.
    pub token_bucket_rate: Option<f64>,
    /// Sample rate out of [`MAX_SAMPLE_RATE`](crate::sampling::MAX_SAMPLE_RATE).
    pub sample_rate: Option<u32>,
    /// Default timeout for readiness checks, in milliseconds.
    pub readiness_timeout_ms: Option<u64>,
}

impl GateConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        GateConfig::default()
    }

    /// Set the token-bucket capacity.
    pub fn with_token_bucket_capacity(mut self, capacity: f64) -> Self {
        self.token_bucket_capacity = Some(capacity);
        self
    }

    /// Set the token-bucket refill rate.
    pub fn with_token_bucket_rate(mut self, rate: f64) -> Self {
        self.token_bucket_rate = Some(rate);
        self
    }

    /// Set the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Set the default readiness timeout.
    pub fn with_readiness_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.readiness_timeout_ms = Some(timeout_ms);
        self
    }
}

/// Which config fields were recognized vs actually taken into effect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConfigReport {
    /// Fields that were present and recognized.
    pub processed: Vec<&'static str>,
    /// The subset of processed fields whose values were in range and applied.
    pub applied: Vec<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{SamplingGate, MAX_SAMPLE_RATE};
    use std::time::SystemTime;

    #[test]
    fn applied_is_subset_of_processed() {
        let gate = SamplingGate::new();
        let config = GateConfig::new()
            .with_token_bucket_capacity(4.0)
            .with_token_bucket_rate(-1.0) // out of range
            .with_sample_rate(MAX_SAMPLE_RATE + 1); // out of range

        let report = gate.apply_config(&config);
        assert_eq!(
            report.processed,
            vec!["token_bucket_capacity", "token_bucket_rate", "sample_rate"]
        );
        assert_eq!(report.applied, vec!["token_bucket_capacity"]);
    }

    #[test]
    fn empty_config_configures_defaults() {
        let gate = SamplingGate::new();
        let report = gate.apply_config(&GateConfig::new());
        assert!(report.processed.is_empty());
        assert!(report.applied.is_empty());
        // the gate is now configured and usable
        let decision = gate.decide(SystemTime::now());
        assert!(decision.sampled || decision.rate_limited);
    }

    #[test]
    fn nan_capacity_is_ignored() {
        let gate = SamplingGate::new();
        let report = gate.apply_config(&GateConfig::new().with_token_bucket_capacity(f64::NAN));
        assert_eq!(report.processed, vec!["token_bucket_capacity"]);
        assert!(report.applied.is_empty());
    }

    #[test]
    fn readiness_timeout_is_applied() {
        let gate = SamplingGate::new();
        let report = gate.apply_config(&GateConfig::new().with_readiness_timeout_ms(1));
        assert_eq!(report.applied, vec!["readiness_timeout_ms"]);
        // with a 1ms default timeout this returns almost immediately
        let status = gate.is_ready_default();
        assert_eq!(status, crate::sampling::ReadinessStatus::Unknown);
    }
}
