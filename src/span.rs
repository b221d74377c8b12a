//! Normalized span records for metrics aggregation.
//!
//! A [`SpanRecord`] summarizes one completed unit of work, independent of
//! the event graph. Finalizing bounds every string field to the wire
//! ceiling without splitting multi-byte characters, and validates the
//! duration against the safe-integer envelope.

use crate::error::SpanError;

/// Ceiling, in bytes, for every transmissible span string field.
pub const TRANSACTION_NAME_MAX_LEN: usize = 255;

/// Largest duration, in microseconds, that survives the host numeric type.
const MAX_SAFE_DURATION: i64 = (1 << 53) - 1;

/// Name used when no transaction name was supplied.
const UNKNOWN_TRANSACTION: &str = "unknown";

/// Raw inputs for one completed unit of work.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanInput {
    transaction: String,
    url: String,
    domain: String,
    method: String,
    service: String,
    duration_us: i64,
    status: i32,
    has_error: bool,
}

impl SpanInput {
    /// Start an input for a transaction that took `duration_us`
    /// microseconds.
    pub fn new(transaction: impl Into<String>, duration_us: i64) -> Self {
        SpanInput {
            transaction: transaction.into(),
            duration_us,
            ..Default::default()
        }
    }

    /// Set the request URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the request domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the service name.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Set the status code (HTTP-like, 0 if absent).
    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    /// Mark the unit of work as errored.
    pub fn with_error(mut self, has_error: bool) -> Self {
        self.has_error = has_error;
        self
    }

    /// Validate and normalize into an immutable [`SpanRecord`].
    ///
    /// Durations outside `0..=2^53−1` microseconds are rejected rather than
    /// clamped. Every string field is truncated to
    /// [`TRANSACTION_NAME_MAX_LEN`] bytes on a character boundary; an empty
    /// transaction name becomes `"unknown"`.
    pub fn finalize(self) -> Result<SpanRecord, SpanError> {
        if self.duration_us < 0 || self.duration_us > MAX_SAFE_DURATION {
            return Err(SpanError::DurationOutOfRange(self.duration_us));
        }

        let transaction = if self.transaction.is_empty() {
            UNKNOWN_TRANSACTION.to_owned()
        } else {
            truncate_on_char_boundary(self.transaction, TRANSACTION_NAME_MAX_LEN)
        };

        Ok(SpanRecord {
            transaction_name: transaction,
            url: truncate_on_char_boundary(self.url, TRANSACTION_NAME_MAX_LEN),
            domain: truncate_on_char_boundary(self.domain, TRANSACTION_NAME_MAX_LEN),
            method: truncate_on_char_boundary(self.method, TRANSACTION_NAME_MAX_LEN),
            service: truncate_on_char_boundary(self.service, TRANSACTION_NAME_MAX_LEN),
            duration_us: self.duration_us as u64,
            status: self.status,
            has_error: self.has_error,
        })
    }
}

/// An immutable, normalized span summary ready for reporting.
///
/// Created once per completed unit of work and discarded after being
/// handed to the report channel.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanRecord {
    transaction_name: String,
    url: String,
    domain: String,
    method: String,
    service: String,
    duration_us: u64,
    status: i32,
    has_error: bool,
}

impl SpanRecord {
    /// The transaction name actually used, post-truncation.
    ///
    /// Callers should use this canonical name when correlating aggregation
    /// buckets.
    pub fn transaction_name(&self) -> &str {
        &self.transaction_name
    }

    /// The normalized URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The normalized domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The normalized HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The normalized service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Duration in microseconds.
    pub fn duration_us(&self) -> u64 {
        self.duration_us
    }

    /// Status code, 0 if absent.
    pub fn status(&self) -> i32 {
        self.status
    }

    /// Whether the unit of work errored.
    pub fn has_error(&self) -> bool {
        self.has_error
    }
}

/// Truncate `s` to at most `max` bytes without splitting a multi-byte
/// character.
fn truncate_on_char_boundary(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn finalize_passes_fields_through() {
        let record = SpanInput::new("GET /users", 1500)
            .with_url("/users?id=1")
            .with_domain("api.example.com")
            .with_method("GET")
            .with_service("users")
            .with_status(200)
            .with_error(false)
            .finalize()
            .unwrap();

        assert_eq!(record.transaction_name(), "GET /users");
        assert_eq!(record.url(), "/users?id=1");
        assert_eq!(record.domain(), "api.example.com");
        assert_eq!(record.method(), "GET");
        assert_eq!(record.service(), "users");
        assert_eq!(record.duration_us(), 1500);
        assert_eq!(record.status(), 200);
        assert!(!record.has_error());
    }

    #[rstest]
    #[case(-1)]
    #[case(i64::MIN)]
    #[case(1 << 53)]
    #[case(i64::MAX)]
    fn finalize_rejects_out_of_range_durations(#[case] duration_us: i64) {
        let err = SpanInput::new("tx", duration_us).finalize().unwrap_err();
        assert_eq!(err, SpanError::DurationOutOfRange(duration_us));
    }

    #[test]
    fn finalize_accepts_boundary_durations() {
        assert!(SpanInput::new("tx", 0).finalize().is_ok());
        assert!(SpanInput::new("tx", (1 << 53) - 1).finalize().is_ok());
    }

    #[test]
    fn empty_transaction_falls_back_to_unknown() {
        let record = SpanInput::new("", 1).finalize().unwrap();
        assert_eq!(record.transaction_name(), "unknown");
    }

    #[rstest]
    #[case("a".repeat(300), 255)]
    #[case("a".repeat(255), 255)]
    #[case("a".repeat(10), 10)]
    // 'é' is two bytes; 254 ASCII bytes + 'é' would split at 255.
    #[case(format!("{}é", "a".repeat(254)), 254)]
    // '你' is three bytes: 85 chars × 3 = 255 fits exactly.
    #[case("你".repeat(85), 255)]
    #[case("你".repeat(86), 255)]
    fn truncation_respects_char_boundaries(#[case] name: String, #[case] expected_len: usize) {
        let record = SpanInput::new(name, 1).finalize().unwrap();
        let truncated = record.transaction_name();
        assert_eq!(truncated.len(), expected_len);
        assert!(truncated.len() <= TRANSACTION_NAME_MAX_LEN);
        // a clean truncation is still valid UTF-8 end to end
        assert!(truncated.is_char_boundary(truncated.len()));
    }

    #[test]
    fn all_string_fields_are_bounded() {
        let long = "x".repeat(1000);
        let record = SpanInput::new(long.clone(), 1)
            .with_url(long.clone())
            .with_domain(long.clone())
            .with_method(long.clone())
            .with_service(long)
            .finalize()
            .unwrap();

        for field in [
            record.transaction_name(),
            record.url(),
            record.domain(),
            record.method(),
            record.service(),
        ] {
            assert_eq!(field.len(), TRANSACTION_NAME_MAX_LEN);
        }
    }
}
