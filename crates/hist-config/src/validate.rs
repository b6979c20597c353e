//! Semantic validation of a loaded configuration.

use crate::config::HistorianConfig;

/// Outcome of validating a configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn is_identifier_fragment(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check the invariants serde cannot express.
pub fn validate(config: &HistorianConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.query.default_count == 0 {
        errors.push("query.default_count must be greater than 0".to_string());
    }
    if let Some(max) = config.query.max_count {
        if max < config.query.default_count {
            errors.push(format!(
                "query.max_count ({max}) must be >= query.default_count ({})",
                config.query.default_count
            ));
        }
    }

    // Interpolated into table names.
    if !is_identifier_fragment(&config.tables.prefix) {
        errors.push(format!(
            "tables.prefix {:?} may only contain ASCII letters, digits and '_'",
            config.tables.prefix
        ));
    }

    for (idx, rule) in config.ingest.topic_replace_list.iter().enumerate() {
        if rule.from.is_empty() {
            errors.push(format!("ingest.topic_replace_list[{idx}].from must not be empty"));
        }
    }

    ValidationResult { errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicReplacement;

    #[test]
    fn test_default_is_valid() {
        assert!(validate(&HistorianConfig::default()).is_valid());
    }

    #[test]
    fn test_zero_default_count() {
        let mut config = HistorianConfig::default();
        config.query.default_count = 0;
        let result = validate(&config);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("default_count"));
    }

    #[test]
    fn test_max_below_default() {
        let mut config = HistorianConfig::default();
        config.query.max_count = Some(5);
        assert!(!validate(&config).is_valid());
    }

    #[test]
    fn test_prefix_characters() {
        let mut config = HistorianConfig::default();
        config.tables.prefix = "hist_01".into();
        assert!(validate(&config).is_valid());
        config.tables.prefix = "bad-prefix;".into();
        assert!(!validate(&config).is_valid());
    }

    #[test]
    fn test_empty_replacement_source() {
        let mut config = HistorianConfig::default();
        config.ingest.topic_replace_list.push(TopicReplacement {
            from: String::new(),
            to: "x".into(),
        });
        let result = validate(&config);
        assert!(result.errors[0].contains("topic_replace_list[0]"));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = HistorianConfig::default();
        config.query.default_count = 0;
        config.tables.prefix = "a b".into();
        assert_eq!(validate(&config).errors.len(), 2);
    }
}
