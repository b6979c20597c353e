//! Table naming.

use hist_common::Category;

/// Physical table names, optionally sharing a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLayout {
    prefix: String,
}

impl TableLayout {
    /// The prefix must already be validated as `[A-Za-z0-9_]*`; it is spliced
    /// into SQL text.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn topic_table(&self) -> String {
        format!("{}topic", self.prefix)
    }

    pub fn meta_table(&self) -> String {
        format!("{}meta", self.prefix)
    }

    pub fn data_table(&self, category: Category) -> String {
        format!("{}{}", self.prefix, category.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let layout = TableLayout::default();
        assert_eq!(layout.topic_table(), "topic");
        assert_eq!(layout.meta_table(), "meta");
        assert_eq!(layout.data_table(Category::Datalogger), "datalogger");
    }

    #[test]
    fn test_prefixed_names() {
        let layout = TableLayout::with_prefix("hist_");
        assert_eq!(layout.topic_table(), "hist_topic");
        assert_eq!(layout.data_table(Category::Device), "hist_device");
    }
}
