//! Measurement categories and their storage partitions.
//!
//! Every stored point belongs to exactly one category, and each category has
//! its own data table. The same topic-name normalization is used when points
//! are written and when a query resolves its topic, so the two paths can never
//! disagree about how a name was stored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed set of recognized measurement classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Device scrapes (driver publishes).
    Device,
    /// Results computed by analysis agents.
    Analysis,
    /// Raw logger output.
    Datalogger,
    /// Generic records.
    Record,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Device,
        Category::Analysis,
        Category::Datalogger,
        Category::Record,
    ];

    /// Canonical lowercase name, also the unprefixed data table name.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Device => "device",
            Category::Analysis => "analysis",
            Category::Datalogger => "datalogger",
            Category::Record => "record",
        }
    }

    /// Map an ingestion-time source tag to a category.
    ///
    /// Accepts the canonical names plus the aliases publishers use
    /// (`scrape` for device data, `log` for datalogger data).
    pub fn from_source(tag: &str) -> Option<Self> {
        match tag {
            "scrape" => Some(Category::Device),
            "log" => Some(Category::Datalogger),
            other => Self::from_name(other),
        }
    }

    /// Parse a canonical category name (the leading segment of a query topic).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "device" => Some(Category::Device),
            "analysis" => Some(Category::Analysis),
            "datalogger" => Some(Category::Datalogger),
            "record" => Some(Category::Record),
            _ => None,
        }
    }

    /// Whether topic names in this category are stored without the category prefix.
    pub fn is_prefix_free(self) -> bool {
        matches!(self, Category::Device | Category::Analysis)
    }

    /// The name a topic is stored under for this category.
    ///
    /// Prefix-free categories drop a leading `<category>/`; the others make
    /// sure it is present. Applied on both the write and the read path.
    pub fn storage_name(self, topic: &str) -> String {
        let prefix = self.as_str();
        let stripped = topic
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'));
        match (self.is_prefix_free(), stripped) {
            (true, Some(rest)) => rest.to_string(),
            (true, None) => topic.to_string(),
            (false, Some(_)) => topic.to_string(),
            (false, None) => format!("{prefix}/{topic}"),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a query topic into its category and the name it is stored under.
///
/// Returns `None` when the leading segment is not a recognized category.
pub fn split_query_topic(topic: &str) -> Option<(Category, String)> {
    let head = topic.split('/').next().unwrap_or_default();
    let category = Category::from_name(head)?;
    Some((category, category.storage_name(topic)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_aliases() {
        assert_eq!(Category::from_source("scrape"), Some(Category::Device));
        assert_eq!(Category::from_source("log"), Some(Category::Datalogger));
        assert_eq!(Category::from_source("analysis"), Some(Category::Analysis));
        assert_eq!(Category::from_source("record"), Some(Category::Record));
        assert_eq!(Category::from_source("bogus"), None);
    }

    #[test]
    fn test_aliases_are_not_query_prefixes() {
        assert_eq!(Category::from_name("scrape"), None);
        assert_eq!(Category::from_name("log"), None);
    }

    #[test]
    fn test_storage_name_strips_prefix_free_categories() {
        assert_eq!(
            Category::Device.storage_name("device/building/ahu1/temp"),
            "building/ahu1/temp"
        );
        assert_eq!(
            Category::Device.storage_name("building/ahu1/temp"),
            "building/ahu1/temp"
        );
        assert_eq!(Category::Analysis.storage_name("analysis/x/y"), "x/y");
    }

    #[test]
    fn test_storage_name_keeps_prefixed_categories() {
        assert_eq!(Category::Record.storage_name("record/alarm"), "record/alarm");
        assert_eq!(Category::Record.storage_name("alarm"), "record/alarm");
        assert_eq!(
            Category::Datalogger.storage_name("datalogger/site/power"),
            "datalogger/site/power"
        );
    }

    #[test]
    fn test_storage_name_requires_segment_boundary() {
        // "devices/..." is not the "device" prefix.
        assert_eq!(Category::Device.storage_name("devices/x"), "devices/x");
        assert_eq!(Category::Record.storage_name("recorder"), "record/recorder");
    }

    #[test]
    fn test_split_query_topic() {
        assert_eq!(
            split_query_topic("device/building/ahu1/temp"),
            Some((Category::Device, "building/ahu1/temp".to_string()))
        );
        assert_eq!(
            split_query_topic("record/alarm"),
            Some((Category::Record, "record/alarm".to_string()))
        );
        assert_eq!(split_query_topic("bogus/x"), None);
        assert_eq!(split_query_topic(""), None);
    }

    #[test]
    fn test_write_and_read_paths_agree() {
        for category in Category::ALL {
            let written = category.storage_name("site/meter");
            let query = format!("{category}/site/meter");
            let (parsed, read) = split_query_topic(&query).unwrap();
            assert_eq!(parsed, category);
            assert_eq!(read, written, "category {category}");
        }
    }
}
