/// All timestamps produced on the client side are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Monotonic identifier of one transport connection attempt.
pub type ConnectionId = u64;
