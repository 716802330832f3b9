/// All user/account primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Generation jobs are keyed by UUID v4, assigned at creation.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
