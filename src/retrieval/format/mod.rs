
use itertools::Itertools;

use super::SearchResult;
use crate::corpus::Record;

/// Rendered when there is nothing to put in the context
pub const NO_RESULTS_MESSAGE: &str = "No matching places were found for this request.";

const DESCRIPTION_LIMIT: usize = 250;
const SPECIALTY_LIMIT: usize = 3;
const ENTRY_SEPARATOR: &str = "\n\n";

/// Render results as a context block for a language model.
///
/// Entries appear in rank order separated by a blank line. Rendering stops
/// before the first entry that would push the output past `max_chars`
/// characters, so entries are never cut in half.
#[inline]
pub fn format_for_context(results: &[SearchResult<'_>], max_chars: usize) -> String {
    if results.is_empty() {
        return NO_RESULTS_MESSAGE.to_string();
    }

    let mut entries = Vec::with_capacity(results.len());
    let mut used = 0;

    for result in results {
        let entry = render_entry(result);
        let separator = if entries.is_empty() {
            0
        } else {
            ENTRY_SEPARATOR.len()
        };
        let cost = separator + entry.chars().count();

        if used + cost > max_chars {
            break;
        }
        used += cost;
        entries.push(entry);
    }

    entries.iter().join(ENTRY_SEPARATOR)
}

fn render_entry(result: &SearchResult<'_>) -> String {
    let record = result.record;

    let heading = match record.location_label() {
        Some(location) => format!(
            "{}. {} **{}** ({})",
            result.rank,
            category_icon(record.category.as_deref()),
            record.name,
            location
        ),
        None => format!(
            "{}. {} **{}**",
            result.rank,
            category_icon(record.category.as_deref()),
            record.name
        ),
    };

    let description = record
        .description
        .as_deref()
        .map_or_else(|| "N/A".to_string(), |text| text.chars().take(DESCRIPTION_LIMIT).collect());

    let mut lines = vec![
        heading,
        format!("   📖 {}", description),
        format!("   🏷️ {}", record.category.as_deref().unwrap_or("N/A")),
    ];
    lines.extend(category_extra(record));
    lines.push(format!("   🔎 Similarity: {:.1}%", result.similarity * 100.0));

    lines.join("\n")
}

fn category_extra(record: &Record) -> Option<String> {
    match record.category.as_deref()? {
        "food_drinks" => record
            .price_range
            .as_deref()
            .map(|price| format!("   💰 Price: {}", price)),
        "restaurants" if !record.specialties.is_empty() => Some(format!(
            "   🍽️ Specialties: {}",
            record.specialties.iter().take(SPECIALTY_LIMIT).join(", ")
        )),
        "accommodation" => record
            .star_rating
            .as_deref()
            .map(|stars| format!("   ⭐ {} stars", stars)),
        _ => None,
    }
}

/// Display icon for a category, with a generic pin for anything unrecognized
#[inline]
pub fn category_icon(category: Option<&str>) -> &'static str {
    match category {
        Some("historic_places" | "museums" | "Cultural") => "🏛️",
        Some("religious_sites") => "🕌",
        Some("shopping") => "🛍️",
        Some("food_drinks") => "🍽️",
        Some("restaurants") => "🏪",
        Some("accommodation") => "🏨",
        Some("local_products") => "🎁",
        Some("festivals") => "🎉",
        Some("nature_parks" | "Natural") => "🌳",
        Some("Mixed") => "🗺️",
        _ => "📍",
    }
}
