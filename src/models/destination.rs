use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

fn deserialize_optional_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(f64),
        Null,
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                f64::from_str(trimmed)
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
        }
        StringOrNumber::Number(n) => Ok(Some(n)),
        StringOrNumber::Null => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub travel_type: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub nearby_attractions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_time_to_visit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usp: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_price",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Destination {
    /// Descriptive text fed to the embedding model for this destination.
    ///
    /// The live ranking path and the offline builder must produce the same
    /// text, otherwise precomputed and on-demand vectors drift apart.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![format!("{}, {}.", self.city, self.country)];

        if !self.tagline.trim().is_empty() {
            parts.push(self.tagline.trim().to_string());
        }
        if let Some(description) = non_empty(&self.description) {
            parts.push(description.to_string());
        }
        if !self.activities.is_empty() {
            parts.push(format!(
                "Activities you can enjoy: {}.",
                self.activities.join(", ")
            ));
        }
        if !self.travel_type.is_empty() {
            parts.push(format!(
                "Perfect for: {} travelers.",
                self.travel_type.join(", ")
            ));
        }
        parts.push(format!(
            "Budget category: {}.",
            non_empty(&self.budget_category).unwrap_or("Moderate")
        ));
        if let Some(best_time) = non_empty(&self.best_time_to_visit) {
            parts.push(format!("Best time to visit: {}.", best_time));
        }
        if !self.keywords.is_empty() {
            parts.push(format!("Keywords: {}.", self.keywords.join(", ")));
        }
        if !self.nearby_attractions.is_empty() {
            parts.push(format!(
                "Nearby attractions: {}.",
                self.nearby_attractions.join(", ")
            ));
        }
        if let Some(usp) = non_empty(&self.usp) {
            parts.push(format!("What makes it special: {}", usp));
        }

        parts.join(" ")
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A destination paired with its similarity to the user's query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredDestination {
    #[serde(flatten)]
    pub destination: Destination,
    pub similarity: f32,
    pub match_percentage: i32,
}

impl ScoredDestination {
    pub fn new(destination: Destination, similarity: f32) -> Self {
        Self {
            destination,
            similarity,
            match_percentage: (similarity * 100.0).round() as i32,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_destination(id: &str, city: &str) -> Destination {
    Destination {
        id: id.to_string(),
        city: city.to_string(),
        country: "Testland".to_string(),
        tagline: format!("Visit {}", city),
        description: None,
        activities: Vec::new(),
        travel_type: Vec::new(),
        keywords: Vec::new(),
        nearby_attractions: Vec::new(),
        budget_category: None,
        best_time_to_visit: None,
        usp: None,
        featured: false,
        price: None,
        image: None,
    }
}
