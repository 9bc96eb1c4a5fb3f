use serde::{Deserialize, Serialize};

use crate::error::{AclShardError, Result};

/// Largest accepted `universe_upper_bound`: every u32 id, a 512 MiB bitmask
pub const MAX_UNIVERSE_UPPER_BOUND: u64 = 1 << 32;

/// Security filter configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Exclusive upper bound of descriptor ids held in the dense form.
    /// The dense bitmask never exceeds `ceil(universe_upper_bound / 8)` bytes.
    pub universe_upper_bound: u64,
    /// Cardinality at which an `IdentifierSet` switches from the sorted
    /// sparse form to the dense bitmask.
    pub dense_threshold: usize,
    /// Numeric doc value holding a descriptor's id (descriptor index)
    pub descriptor_id_field: String,
    /// Multivalued term field listing the authorities of a descriptor
    pub descriptor_authority_field: String,
    /// Numeric doc value holding a content record's descriptor id
    pub content_descriptor_field: String,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            universe_upper_bound: 1 << 26, // 64M ids, 8 MiB dense
            dense_threshold: 1024,
            descriptor_id_field: "acl_id".to_string(),
            descriptor_authority_field: "authority".to_string(),
            content_descriptor_field: "acl_id".to_string(),
        }
    }
}

impl FilterSettings {
    pub fn with_universe_upper_bound(mut self, bound: u64) -> Self {
        self.universe_upper_bound = bound;
        self
    }

    pub fn with_dense_threshold(mut self, threshold: usize) -> Self {
        self.dense_threshold = threshold;
        self
    }

    pub fn with_content_descriptor_field(mut self, field: impl Into<String>) -> Self {
        self.content_descriptor_field = field.into();
        self
    }

    /// Maximum number of bytes the dense form may occupy
    pub fn dense_bytes_bound(&self) -> u64 {
        self.universe_upper_bound.div_ceil(8)
    }

    pub fn validate(&self) -> Result<()> {
        if self.universe_upper_bound == 0 {
            return Err(AclShardError::config("universe_upper_bound must be positive"));
        }
        if self.universe_upper_bound > MAX_UNIVERSE_UPPER_BOUND
            || usize::try_from(self.universe_upper_bound).is_err()
        {
            return Err(AclShardError::config(format!(
                "universe_upper_bound {} exceeds {}",
                self.universe_upper_bound, MAX_UNIVERSE_UPPER_BOUND
            )));
        }
        if self.dense_threshold == 0 {
            return Err(AclShardError::config("dense_threshold must be positive"));
        }
        for (name, value) in [
            ("descriptor_id_field", &self.descriptor_id_field),
            ("descriptor_authority_field", &self.descriptor_authority_field),
            ("content_descriptor_field", &self.content_descriptor_field),
        ] {
            if value.is_empty() {
                return Err(AclShardError::config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }
}

/// Content routing strategies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterStrategy {
    /// Date bucket with configurable months per bucket
    #[default]
    DateMonth,
    /// Date bucket fixed at three months. Kept for indices sharded before
    /// granularity became configurable.
    Quarterly,
    /// Record id modulo shard count
    DbIdModulo,
}

impl RouterStrategy {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "date_month" | "date-month" | "date" => Ok(RouterStrategy::DateMonth),
            "quarterly" | "quarter" => Ok(RouterStrategy::Quarterly),
            "db_id_modulo" | "db-id-modulo" | "dbid" => Ok(RouterStrategy::DbIdModulo),
            other => Err(AclShardError::config(format!(
                "unknown router strategy '{}'",
                other
            ))),
        }
    }
}

/// Shard routing configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub strategy: RouterStrategy,
    /// Months per bucket for `DateMonth`
    pub granularity_months: u32,
    /// Record field holding the ISO-8601 routing timestamp
    pub date_field: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: RouterStrategy::DateMonth,
            granularity_months: 1,
            date_field: "created".to_string(),
        }
    }
}

impl RoutingConfig {
    pub fn new(strategy: RouterStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn with_granularity(mut self, months: u32) -> Self {
        self.granularity_months = months;
        self
    }

    pub fn with_date_field(mut self, field: impl Into<String>) -> Self {
        self.date_field = field.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        match self.strategy {
            RouterStrategy::DateMonth | RouterStrategy::Quarterly => {
                if self.strategy == RouterStrategy::DateMonth && self.granularity_months == 0 {
                    return Err(AclShardError::config("granularity_months must be positive"));
                }
                if self.date_field.is_empty() {
                    return Err(AclShardError::config("date_field must not be empty"));
                }
                Ok(())
            }
            RouterStrategy::DbIdModulo => Ok(()),
        }
    }
}

/// Top-level settings document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub filter: FilterSettings,
    pub routing: RoutingConfig,
}

impl Settings {
    /// Parse and validate a JSON settings document
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.routing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.filter.dense_bytes_bound(), 8 * 1024 * 1024);
    }

    #[test]
    fn test_zero_granularity_rejected() {
        let config = RoutingConfig::new(RouterStrategy::DateMonth).with_granularity(0);
        assert!(matches!(
            config.validate(),
            Err(AclShardError::Configuration(_))
        ));

        // Quarterly ignores the granularity field
        let config = RoutingConfig::new(RouterStrategy::Quarterly).with_granularity(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_filter_settings_validation() {
        assert!(FilterSettings::default()
            .with_dense_threshold(0)
            .validate()
            .is_err());
        assert!(FilterSettings::default()
            .with_universe_upper_bound(0)
            .validate()
            .is_err());
        assert!(FilterSettings::default()
            .with_content_descriptor_field("")
            .validate()
            .is_err());
    }

    #[test]
    fn test_universe_bound_is_capped() {
        assert!(FilterSettings::default()
            .with_universe_upper_bound(MAX_UNIVERSE_UPPER_BOUND)
            .validate()
            .is_ok());
        for bound in [MAX_UNIVERSE_UPPER_BOUND + 1, u64::MAX] {
            assert!(matches!(
                FilterSettings::default().with_universe_upper_bound(bound).validate(),
                Err(AclShardError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_dense_bytes_bound_rounds_up() {
        let settings = FilterSettings::default().with_universe_upper_bound(9);
        assert_eq!(settings.dense_bytes_bound(), 2);
    }

    #[test]
    fn test_settings_from_json() {
        let json = r#"{
            "filter": { "dense_threshold": 16 },
            "routing": { "strategy": "date_month", "granularity_months": 6 }
        }"#;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.filter.dense_threshold, 16);
        assert_eq!(settings.filter.universe_upper_bound, 1 << 26);
        assert_eq!(settings.routing.granularity_months, 6);
        assert_eq!(settings.routing.date_field, "created");

        let bad = r#"{ "routing": { "granularity_months": 0 } }"#;
        assert!(matches!(
            Settings::from_json(bad),
            Err(AclShardError::Configuration(_))
        ));
        assert!(matches!(
            Settings::from_json("{ not json"),
            Err(AclShardError::Serialization(_))
        ));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(RouterStrategy::parse("Quarterly").unwrap(), RouterStrategy::Quarterly);
        assert_eq!(RouterStrategy::parse("dbid").unwrap(), RouterStrategy::DbIdModulo);
        assert!(RouterStrategy::parse("murmur").is_err());
    }
}
