//! Importance classification and lexical kind/category detection.
//!
//! All classification here is deterministic keyword matching over rule
//! tables — no model calls, no I/O. Scores are clamped to the 1–5
//! importance scale only after every boost has been applied.

// ── Rule tables ──────────────────────────────────────────────────

/// Importance floor and ceiling.
pub const IMPORTANCE_MIN: u8 = 1;
pub const IMPORTANCE_MAX: u8 = 5;

/// Base score before any boost.
const BASE_SCORE: i32 = 2;

/// Per-kind score boosts. Unlisted kinds get no boost.
const KIND_BOOSTS: &[(&str, i32)] = &[
    ("memory", 3),
    ("thought", 2),
    ("insight", 2),
    ("decision", 2),
    ("project", 1),
    ("system", 1),
    ("document", 0),
    ("journal", 0),
];

/// Keywords that mark content as critical. Bonus applies at most once.
const CRITICAL_KEYWORDS: &[&str] = &["critical", "essential", "core", "principle", "framework"];
const CRITICAL_BONUS: i32 = 2;

/// Secondary importance markers. Bonus applies at most once.
const IMPORTANT_KEYWORDS: &[&str] = &["important", "key", "decision", "insight", "learn"];
const IMPORTANT_BONUS: i32 = 1;

/// Critical markers for the file-oriented classifier (+1, at most once).
const FILE_CRITICAL_KEYWORDS: &[&str] = &["critical", "essential", "core", "principle"];

/// Failure markers that drag file importance down (noisy log-like content).
const FAILURE_KEYWORDS: &[&str] = &["error", "failed", "warning"];

/// Filename fragment → record kind, first match wins.
const FILENAME_KINDS: &[(&str, &str)] = &[
    ("thought", "thought"),
    ("idea", "idea"),
    ("memory", "memory"),
    ("journal", "journal"),
    ("log", "log"),
    ("specification", "specification"),
    ("design", "specification"),
];

/// Fallback kind when no filename fragment matches.
const DEFAULT_KIND: &str = "document";

/// Filename fragment → base importance for the file-oriented classifier.
const FILENAME_IMPORTANCE: &[(&str, i32)] = &[
    ("memory", 5),
    ("thought", 4),
    ("idea", 4),
    ("specification", 4),
    ("design", 4),
    ("journal", 3),
    ("log", 1),
];

/// Content keyword → category, first match wins.
const CATEGORY_RULES: &[(&str, &[&str])] = &[
    ("technology", &["sqlite", "database", "python", "code"]),
    ("relationship", &["partnership", "collaboration"]),
    ("evolution", &["thinking", "reflection"]),
    ("ai-evolution", &["ai", "assistant", "evolution"]),
    ("project", &["project", "implementation", "phase"]),
];

/// Fallback category when no keyword matches.
pub const DEFAULT_CATEGORY: &str = "general";

// ── Helpers ──────────────────────────────────────────────────────

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn clamp_score(score: i32) -> u8 {
    score.clamp(i32::from(IMPORTANCE_MIN), i32::from(IMPORTANCE_MAX)) as u8
}

// ── Classifiers ──────────────────────────────────────────────────

/// Rate the importance of stored content on the 1–5 scale.
///
/// Starts from a base of 2, adds the kind boost, then a critical-keyword
/// bonus (+2, at most once) and a secondary-keyword bonus (+1, at most
/// once). The result is clamped to [1,5] at the end only. The category is
/// part of the classification contract but carries no boost today.
pub fn classify(content: &str, kind: &str, _category: &str) -> u8 {
    let mut score = BASE_SCORE;

    score += KIND_BOOSTS
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(0, |(_, boost)| *boost);

    let content_lower = content.to_lowercase();
    if contains_any(&content_lower, CRITICAL_KEYWORDS) {
        score += CRITICAL_BONUS;
    }
    if contains_any(&content_lower, IMPORTANT_KEYWORDS) {
        score += IMPORTANT_BONUS;
    }

    clamp_score(score)
}

/// Rate the importance of a file being compacted.
///
/// Unlike [`classify`], the base score comes from the filename, and
/// failure-indicating keywords subtract a point so that log-like content
/// ranks lower even when it also says "critical".
pub fn classify_file(filename: &str, content: &str) -> u8 {
    let name_lower = filename.to_lowercase();
    let mut score = FILENAME_IMPORTANCE
        .iter()
        .find(|(fragment, _)| name_lower.contains(fragment))
        .map_or(BASE_SCORE, |(_, base)| *base);

    let content_lower = content.to_lowercase();
    if contains_any(&content_lower, FILE_CRITICAL_KEYWORDS) {
        score += 1;
    }
    if contains_any(&content_lower, FAILURE_KEYWORDS) {
        score -= 1;
    }

    clamp_score(score)
}

/// Derive a record kind from a filename.
pub fn kind_for_filename(filename: &str) -> &'static str {
    let name_lower = filename.to_lowercase();
    FILENAME_KINDS
        .iter()
        .find(|(fragment, _)| name_lower.contains(fragment))
        .map_or(DEFAULT_KIND, |(_, kind)| kind)
}

/// Derive a coarse topical category from content.
pub fn category_for_content(content: &str) -> &'static str {
    let content_lower = content.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, keywords)| contains_any(&content_lower, keywords))
        .map_or(DEFAULT_CATEGORY, |(category, _)| category)
}
