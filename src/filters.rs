use serde::{Deserialize, Serialize};

/// Query sent when no field constrains the search, so the first load is never empty.
pub const DEFAULT_QUERY: &str = "the";

/// Raw filter fields as the user typed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub title: String,
    pub year: String,
    pub language: String,
}

impl FilterState {
    pub fn new(
        title: impl Into<String>,
        year: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            year: year.into(),
            language: language.into(),
        }
    }

    pub fn effective(&self) -> EffectiveFilter {
        EffectiveFilter {
            title: normalize(&self.title),
            year: normalize(&self.year),
            language: normalize(&self.language),
        }
    }
}

/// Trimmed filter actually used to build a query. Blank fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectiveFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl EffectiveFilter {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.year.is_none() && self.language.is_none()
    }

    /// Builds the query parameters for this filter. Absent fields are omitted;
    /// an empty filter yields `None`.
    pub fn to_query(&self) -> Option<SearchQuery> {
        if self.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        if let Some(title) = &self.title {
            params.push(("title", title.clone()));
        }
        if let Some(year) = &self.year {
            params.push(("first_publish_year", year.clone()));
        }
        if let Some(language) = &self.language {
            params.push(("language", language.clone()));
        }
        Some(SearchQuery { params })
    }

    /// Like [`EffectiveFilter::to_query`], but an empty filter falls back to
    /// the default broad query.
    pub fn to_query_or_default(&self) -> SearchQuery {
        self.to_query().unwrap_or_else(SearchQuery::default_broad)
    }
}

/// Ordered `(name, value)` pairs for the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    params: Vec<(&'static str, String)>,
}

impl SearchQuery {
    pub fn default_broad() -> Self {
        Self {
            params: vec![("q", DEFAULT_QUERY.to_owned())],
        }
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
