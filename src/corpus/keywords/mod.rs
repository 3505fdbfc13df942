//! Domain vocabulary used to enrich record search text


use fancy_regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Heritage and tourism terms matched as lowercase substrings of a description
pub const DOMAIN_KEYWORDS: &[&str] = &[
    // Architectural
    "castle",
    "cathedral",
    "temple",
    "monastery",
    "palace",
    "church",
    "mosque",
    "fort",
    "fortress",
    "citadel",
    "tower",
    "bridge",
    "architecture",
    // Historical periods
    "ancient",
    "medieval",
    "prehistoric",
    "roman",
    "byzantine",
    "gothic",
    "renaissance",
    "baroque",
    "neolithic",
    "bronze age",
    // Natural features
    "national park",
    "wildlife",
    "ecosystem",
    "biodiversity",
    "forest",
    "mountain",
    "volcano",
    "lake",
    "river",
    "cave",
    "coral reef",
    "rainforest",
    "desert",
    "wetland",
    "marine",
    // Archaeological
    "archaeological",
    "excavation",
    "ruins",
    "settlement",
    "burial",
    "artifacts",
    "inscription",
    "petroglyph",
    "fossil",
    // Cultural
    "cultural landscape",
    "traditional",
    "indigenous",
    "historic",
    "pilgrimage",
    "sacred",
    "religious",
    "ceremonial",
    // Religious
    "christ",
    "jesus",
    "muhammed",
    "moses",
    "muslim",
    "buddhist",
];

/// Vocabulary terms contained in `description`, in vocabulary order
#[inline]
pub fn extract_keywords(description: &str) -> Vec<String> {
    let lowered = description.to_lowercase();
    DOMAIN_KEYWORDS
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .map(|keyword| (*keyword).to_string())
        .collect()
}

/// Collapse whitespace runs to single spaces and trim the ends
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}
