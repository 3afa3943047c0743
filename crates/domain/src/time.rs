//! Clock access for the registry.

/// Instant at which a record changed. Always UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Wall-clock time stamped on entity updates and events.
#[must_use]
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
