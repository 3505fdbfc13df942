
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DataLoadError;
use super::keywords::{extract_keywords, normalize_whitespace};

/// A place or heritage site entry from the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specialties: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_text: Option<String>,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

/// Where a place is, either as free text or as a structured address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Text(String),
    Address {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        district: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },
}

/// Derived fields carried through for display; retrieval never reads them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_row: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Build a record from one raw corpus entry.
    ///
    /// Fields of an unexpected type are treated as absent, except `name`
    /// which is required. `position` is the zero-based index in the corpus
    /// and is used to synthesize an id when the entry has none.
    #[inline]
    pub fn from_value(
        position: usize,
        value: &Value,
        id_prefix: &str,
    ) -> Result<Self, DataLoadError> {
        let object = value
            .as_object()
            .ok_or(DataLoadError::NotAMapping { position })?;

        let name = text_field(object, "name").ok_or(DataLoadError::MissingName { position })?;
        let id = text_field(object, "id")
            .unwrap_or_else(|| format!("{}_{:04}", id_prefix, position + 1));

        Ok(Self {
            id,
            name,
            description: text_field(object, "description"),
            category: text_field(object, "category"),
            subcategory: text_field(object, "subcategory"),
            country: text_field(object, "country"),
            region: text_field(object, "region"),
            year: year_field(object),
            location: location_field(object),
            features: list_field(object, "features"),
            ingredients: list_field(object, "ingredients"),
            main_ingredients: list_field(object, "main_ingredients"),
            specialties: list_field(object, "specialties"),
            amenities: list_field(object, "amenities"),
            highlights: list_field(object, "highlights"),
            price_range: text_field(object, "price_range"),
            star_rating: text_field(object, "star_rating"),
            search_text: text_field(object, "search_text"),
            metadata: metadata_field(object),
        })
    }

    /// Text handed to the embedding provider for this record.
    ///
    /// A non-blank `search_text` is used verbatim, otherwise one is synthesized.
    #[inline]
    pub fn document_text(&self) -> String {
        match self.search_text.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => self.build_search_text(),
        }
    }

    /// Lowercase, whitespace-normalized concatenation of the salient fields
    /// followed by the record's domain keywords
    #[inline]
    pub fn build_search_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.push(&self.name);

        for field in [
            &self.country,
            &self.description,
            &self.category,
            &self.subcategory,
            &self.region,
        ] {
            if let Some(value) = field.as_deref() {
                parts.push(value);
            }
        }

        match &self.location {
            Some(Location::Text(text)) => parts.push(text),
            Some(Location::Address { district, address }) => {
                parts.extend(district.as_deref());
                parts.extend(address.as_deref());
            }
            None => {}
        }

        for list in [
            &self.features,
            &self.ingredients,
            &self.main_ingredients,
            &self.specialties,
            &self.amenities,
            &self.highlights,
        ] {
            parts.extend(list.iter().map(String::as_str));
        }

        parts.extend(self.price_range.as_deref());

        let keywords = self.keywords();
        parts.extend(keywords.iter().map(String::as_str));

        let joined = parts
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        normalize_whitespace(&joined.to_lowercase())
    }

    /// Keywords from metadata, or extracted from the description when metadata has none
    #[inline]
    pub fn keywords(&self) -> Vec<String> {
        if !self.metadata.keywords.is_empty() {
            return self.metadata.keywords.clone();
        }
        self.description
            .as_deref()
            .map(extract_keywords)
            .unwrap_or_default()
    }

    #[inline]
    pub fn has_category(&self, category: &str) -> bool {
        self.category.as_deref() == Some(category)
    }

    /// Short human-readable locality: district, free-text location, region, then country
    #[inline]
    pub fn location_label(&self) -> Option<&str> {
        match &self.location {
            Some(Location::Address {
                district: Some(district),
                ..
            }) => Some(district),
            Some(Location::Text(text)) => Some(text),
            _ => self.region.as_deref().or(self.country.as_deref()),
        }
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn year_field(object: &Map<String, Value>) -> Option<i32> {
    match object.get("year")? {
        Value::Number(number) => number.as_i64().and_then(|year| i32::try_from(year).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn list_field(object: &Map<String, Value>, key: &str) -> Vec<String> {
    let Some(Value::Array(items)) = object.get(key) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn location_field(object: &Map<String, Value>) -> Option<Location> {
    match object.get("location")? {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| Location::Text(trimmed.to_string()))
        }
        Value::Object(inner) => {
            let district = text_field(inner, "district");
            let address = text_field(inner, "address");
            if district.is_none() && address.is_none() {
                None
            } else {
                Some(Location::Address { district, address })
            }
        }
        _ => None,
    }
}

fn metadata_field(object: &Map<String, Value>) -> RecordMetadata {
    let Some(Value::Object(raw)) = object.get("metadata") else {
        return RecordMetadata::default();
    };

    let mut extra = raw.clone();
    let word_count = extra.remove("word_count").and_then(|value| value.as_u64());
    let source_row = extra.remove("source_row").and_then(|value| value.as_u64());
    let keywords = match extra.remove("keywords") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    RecordMetadata {
        word_count,
        keywords,
        source_row,
        extra,
    }
}
