//! Topic tag extraction from memory content.
//!
//! Tags come from a fixed vocabulary: each tag carries a list of trigger
//! phrases, and the tag is emitted when any trigger occurs as a substring
//! of the lowercased content. The rule table is data so it can be tested
//! (and eventually extended) independently of any I/O.

use std::collections::BTreeSet;

/// Tag → trigger phrases. A tag applies if any trigger matches.
const TAG_TRIGGERS: &[(&str, &[&str])] = &[
    ("ai", &["ai", "artificial intelligence", "machine learning"]),
    ("memory", &["memory", "remember", "forget"]),
    ("collaboration", &["collaboration", "partnership", "team"]),
    ("sqlite", &["sqlite", "database"]),
    ("compression", &["compress", "curation", "importance"]),
    ("evolution", &["evolve", "evolution", "progress"]),
    ("thinking", &["think", "reflection", "insight"]),
    ("project", &["project", "implementation", "phase"]),
    ("cron", &["cron", "schedule", "job"]),
];

/// Extract the set of topic tags present in `content`.
///
/// The result is a set: no duplicates, deterministic membership, and a
/// stable (sorted) iteration order for serialization.
pub fn extract_tags(content: &str) -> BTreeSet<String> {
    let content_lower = content.to_lowercase();

    TAG_TRIGGERS
        .iter()
        .filter(|(_, triggers)| triggers.iter().any(|t| content_lower.contains(t)))
        .map(|(tag, _)| (*tag).to_string())
        .collect()
}
