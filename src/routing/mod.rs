//! Shard routing
//!
//! A router decides, for a given `(shard_count, shard_index)`, whether a
//! security descriptor or content record belongs on that shard.
//!
//! Every strategy is partition-exact for content: for a fixed shard count
//! and record, exactly one shard index accepts it. This holds structurally
//! because `route_content` compares against the single shard computed by
//! `content_shard`. Descriptors are broadcast to every shard, so each shard
//! can evaluate security filters locally.

pub mod date_bucket;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{RouterStrategy, RoutingConfig};
use crate::segment::DescriptorId;
use crate::{AclShardError, Result};

pub use date_bucket::{bucket_shard, month_bucket, parse_year_month};

/// Months per bucket of the legacy quarterly router
pub const QUARTER_MONTHS: u32 = 3;

/// Routable view of a security descriptor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub id: DescriptorId,
}

/// Routable view of a content record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: u64,
    pub descriptor_id: DescriptorId,
    /// Routing-relevant properties, e.g. `created -> 2014-05-15T10:00:00Z`
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ContentRecord {
    pub fn new(id: u64, descriptor_id: DescriptorId) -> Self {
        Self {
            id,
            descriptor_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Closed set of routing strategies
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShardRouter {
    /// Date bucket of `months_per_bucket` months, keyed on `field`
    DateMonth { months_per_bucket: u32, field: String },
    /// Date bucket fixed at one quarter. Deprecated: only for indices that
    /// were sharded with it; new deployments use `DateMonth`.
    Quarterly { field: String },
    /// Record id modulo shard count
    DbIdModulo,
}

impl ShardRouter {
    pub fn date_month(months_per_bucket: u32, field: impl Into<String>) -> Result<Self> {
        if months_per_bucket == 0 {
            return Err(AclShardError::config("months_per_bucket must be positive"));
        }
        Ok(ShardRouter::DateMonth {
            months_per_bucket,
            field: field.into(),
        })
    }

    pub fn quarterly(field: impl Into<String>) -> Self {
        ShardRouter::Quarterly {
            field: field.into(),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Result<Self> {
        config.validate()?;
        let router = match config.strategy {
            RouterStrategy::DateMonth => {
                Self::date_month(config.granularity_months, config.date_field.as_str())?
            }
            RouterStrategy::Quarterly => Self::quarterly(config.date_field.as_str()),
            RouterStrategy::DbIdModulo => ShardRouter::DbIdModulo,
        };
        info!(router = router.name(), "configured shard router");
        Ok(router)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShardRouter::DateMonth { .. } => "date_month",
            ShardRouter::Quarterly { .. } => "quarterly",
            ShardRouter::DbIdModulo => "db_id_modulo",
        }
    }

    /// Whether the descriptor belongs on the shard. Always true for a valid
    /// shard: descriptors are replicated everywhere.
    pub fn route_descriptor(
        &self,
        shard_count: u32,
        shard_index: u32,
        _descriptor: &DescriptorRecord,
    ) -> Result<bool> {
        check_shard(shard_count, shard_index)?;
        Ok(true)
    }

    /// Whether the content record belongs on the shard
    pub fn route_content(
        &self,
        shard_count: u32,
        shard_index: u32,
        record: &ContentRecord,
    ) -> Result<bool> {
        check_shard(shard_count, shard_index)?;
        Ok(self.content_shard(shard_count, record)? == shard_index)
    }

    /// The single shard owning a content record
    pub fn content_shard(&self, shard_count: u32, record: &ContentRecord) -> Result<u32> {
        if shard_count == 0 {
            return Err(AclShardError::config("shard_count must be positive"));
        }
        match self {
            ShardRouter::DateMonth {
                months_per_bucket,
                field,
            } => date_shard(record, field, *months_per_bucket, shard_count),
            ShardRouter::Quarterly { field } => {
                date_shard(record, field, QUARTER_MONTHS, shard_count)
            }
            ShardRouter::DbIdModulo => Ok((record.id % shard_count as u64) as u32),
        }
    }
}

fn check_shard(shard_count: u32, shard_index: u32) -> Result<()> {
    if shard_count == 0 {
        return Err(AclShardError::config("shard_count must be positive"));
    }
    if shard_index >= shard_count {
        return Err(AclShardError::config(format!(
            "shard_index {} out of range for {} shards",
            shard_index, shard_count
        )));
    }
    Ok(())
}

fn date_shard(record: &ContentRecord, field: &str, months: u32, shard_count: u32) -> Result<u32> {
    let value = record.field(field).ok_or_else(|| AclShardError::Parse {
        value: String::new(),
        reason: format!("record {} has no '{}' field", record.id, field),
    })?;
    let (year, month) = parse_year_month(value)?;
    Ok(bucket_shard(month_bucket(year, month, months), shard_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(id: u64, created: &str) -> ContentRecord {
        ContentRecord::new(id, 1).with_field("created", created)
    }

    #[test]
    fn test_quarterly_scenario() {
        let router = ShardRouter::quarterly("created");
        let record = dated(1, "2014-05-15");
        assert_eq!(router.content_shard(4, &record).unwrap(), 1);
        assert!(router.route_content(4, 1, &record).unwrap());
        for other in [0, 2, 3] {
            assert!(!router.route_content(4, other, &record).unwrap());
        }
    }

    #[test]
    fn test_quarterly_matches_date_month_of_three() {
        let quarterly = ShardRouter::quarterly("created");
        let general = ShardRouter::date_month(3, "created").unwrap();
        for created in ["2001-01-31", "2014-05-15", "2019-11-02T08:00:00Z"] {
            let record = dated(9, created);
            assert_eq!(
                quarterly.content_shard(7, &record).unwrap(),
                general.content_shard(7, &record).unwrap()
            );
        }
    }

    #[test]
    fn test_single_shard_accepts_everything() {
        let routers = [
            ShardRouter::date_month(1, "created").unwrap(),
            ShardRouter::quarterly("created"),
            ShardRouter::DbIdModulo,
        ];
        for router in &routers {
            assert!(router.route_content(1, 0, &dated(77, "1999-09-09")).unwrap());
            assert!(router
                .route_descriptor(1, 0, &DescriptorRecord { id: 77 })
                .unwrap());
        }
    }

    #[test]
    fn test_malformed_timestamp_is_an_error() {
        let router = ShardRouter::date_month(1, "created").unwrap();
        let record = dated(3, "not-a-date");
        for index in 0..3 {
            assert!(matches!(
                router.route_content(3, index, &record),
                Err(AclShardError::Parse { .. })
            ));
        }

        let missing = ContentRecord::new(4, 1);
        assert!(matches!(
            router.route_content(3, 0, &missing),
            Err(AclShardError::Parse { .. })
        ));
    }

    #[test]
    fn test_db_id_modulo() {
        let router = ShardRouter::DbIdModulo;
        let record = ContentRecord::new(10, 5);
        assert_eq!(router.content_shard(4, &record).unwrap(), 2);
        assert!(router.route_content(4, 2, &record).unwrap());
    }

    #[test]
    fn test_invalid_shards_rejected() {
        let router = ShardRouter::DbIdModulo;
        let record = ContentRecord::new(1, 1);
        assert!(matches!(
            router.route_content(0, 0, &record),
            Err(AclShardError::Configuration(_))
        ));
        assert!(matches!(
            router.route_content(2, 2, &record),
            Err(AclShardError::Configuration(_))
        ));
        assert!(router
            .route_descriptor(0, 0, &DescriptorRecord { id: 1 })
            .is_err());
        assert!(ShardRouter::date_month(0, "created").is_err());
    }

    #[test]
    fn test_from_config() {
        let config = RoutingConfig::new(RouterStrategy::DateMonth)
            .with_granularity(6)
            .with_date_field("modified");
        assert_eq!(
            ShardRouter::from_config(&config).unwrap(),
            ShardRouter::DateMonth {
                months_per_bucket: 6,
                field: "modified".to_string()
            }
        );

        let config = RoutingConfig::new(RouterStrategy::Quarterly);
        assert_eq!(ShardRouter::from_config(&config).unwrap().name(), "quarterly");

        let config = RoutingConfig::new(RouterStrategy::DateMonth).with_granularity(0);
        assert!(ShardRouter::from_config(&config).is_err());
    }
}
