//! Property-based tests for topic identity and name normalization.

use hist_common::{split_query_topic, Category, TopicId, TopicKey};
use proptest::prelude::*;

fn topic_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z0-9_]{1,8}", 1..5).prop_map(|parts| parts.join("/"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn id_ignores_case(topic in topic_strategy()) {
        let upper = topic.to_uppercase();
        let lower = topic.to_lowercase();
        prop_assert_eq!(TopicId::for_name(&topic), TopicId::for_name(&upper));
        prop_assert_eq!(TopicId::for_name(&topic), TopicId::for_name(&lower));
    }

    #[test]
    fn id_matches_key(topic in topic_strategy()) {
        prop_assert_eq!(TopicId::for_name(&topic), TopicId::for_key(&TopicKey::new(&topic)));
    }

    #[test]
    fn id_hex_parses_back(topic in topic_strategy()) {
        let id = TopicId::for_name(&topic);
        prop_assert_eq!(id.to_hex().parse::<TopicId>().unwrap(), id);
    }

    #[test]
    fn storage_name_is_idempotent(topic in topic_strategy()) {
        for category in Category::ALL {
            let once = category.storage_name(&topic);
            prop_assert_eq!(category.storage_name(&once), once.clone());
        }
    }

    #[test]
    fn query_resolves_to_ingested_name(topic in topic_strategy()) {
        for category in Category::ALL {
            let stored = category.storage_name(&topic);
            let query = format!("{}/{}", category, topic);
            let (parsed, resolved) = split_query_topic(&query).unwrap();
            prop_assert_eq!(parsed, category);
            // A topic that already begins with its own category segment is
            // stored once, so the query resolves to the same name.
            prop_assert_eq!(resolved, category.storage_name(&query));
            if !topic.starts_with(&format!("{}/", category)) {
                prop_assert_eq!(category.storage_name(&query), stored);
            }
        }
    }
}
