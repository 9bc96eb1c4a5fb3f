use thiserror::Error;

/// Main error type for aclshard operations
#[derive(Error, Debug)]
pub enum AclShardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot parse routing key '{value}': {reason}")]
    Parse { value: String, reason: String },

    #[error("Segment read error in segment {segment}: {reason}")]
    SegmentRead { segment: usize, reason: String },

    #[error("Ordinal {ordinal} out of range (upper bound {upper_bound})")]
    OrdinalOutOfRange { ordinal: u64, upper_bound: u64 },

    #[error("Filter built for {index} generation {expected} used against generation {actual}")]
    StaleFilter {
        index: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for aclshard operations
pub type Result<T> = std::result::Result<T, AclShardError>;

impl AclShardError {
    pub fn config(msg: impl Into<String>) -> Self {
        AclShardError::Configuration(msg.into())
    }

    pub fn segment_read(segment: usize, reason: impl Into<String>) -> Self {
        AclShardError::SegmentRead {
            segment,
            reason: reason.into(),
        }
    }

    /// Errors that abort a security filter build.
    ///
    /// None of these may be turned into an empty or permissive filter.
    pub fn is_fail_closed(&self) -> bool {
        matches!(
            self,
            AclShardError::SegmentRead { .. }
                | AclShardError::OrdinalOutOfRange { .. }
                | AclShardError::StaleFilter { .. }
        )
    }
}
