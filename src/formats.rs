use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::{EffectiveFilter, FilterState};

/// Response body of the search endpoint. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default, rename = "numFound", alias = "num_found")]
    pub num_found: Option<u64>,
    #[serde(default)]
    pub docs: Vec<SearchDoc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchDoc {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Option<Vec<String>>,
    #[serde(default)]
    pub first_publish_year: Option<i32>,
    #[serde(default)]
    pub language: Option<Vec<String>>,
    #[serde(default)]
    pub cover_i: Option<i64>,
}

/// One search hit as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSummary {
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_publish_year: Option<i32>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_id: Option<i64>,
}

impl From<SearchDoc> for BookSummary {
    fn from(doc: SearchDoc) -> Self {
        Self {
            key: doc.key.unwrap_or_default(),
            title: doc.title.unwrap_or_default(),
            author_name: doc
                .author_name
                .and_then(|names| names.into_iter().next()),
            first_publish_year: doc.first_publish_year,
            languages: doc.language.unwrap_or_default(),
            cover_id: doc.cover_i,
        }
    }
}

/// Books returned for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub books: Vec<BookSummary>,
    pub total_matches: Option<u64>,
}

impl From<SearchResponse> for SearchPage {
    fn from(response: SearchResponse) -> Self {
        Self {
            books: response.docs.into_iter().map(BookSummary::from).collect(),
            total_matches: response.num_found,
        }
    }
}

/// Last query and its results, persisted so a restart restores the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSnapshot {
    pub filters: FilterState,
    pub results: Vec<BookSummary>,
    /// Filter the results were fetched for. The raw `filters` may have moved on
    /// since, e.g. a title edit still waiting out its debounce.
    pub fetched_for: Option<EffectiveFilter>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SearchSnapshot {
    pub fn result_count(&self) -> usize {
        self.results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_absent() -> anyhow::Result<()> {
        let response: SearchResponse = serde_json::from_str(
            r#"{"numFound": 2, "docs": [
                {"key": "/works/OL1W", "title": "Dune", "author_name": ["Frank Herbert"],
                 "first_publish_year": 1965, "language": ["eng", "fre"], "cover_i": 42},
                {"key": "/works/OL2W"}
            ]}"#,
        )?;
        let page = SearchPage::from(response);

        assert_eq!(page.total_matches, Some(2));
        assert_eq!(page.books.len(), 2);
        assert_eq!(page.books[0].author_name.as_deref(), Some("Frank Herbert"));
        assert_eq!(page.books[0].languages, vec!["eng", "fre"]);
        assert_eq!(page.books[0].cover_id, Some(42));

        let bare = &page.books[1];
        assert_eq!(bare.title, "");
        assert_eq!(bare.author_name, None);
        assert_eq!(bare.first_publish_year, None);
        assert!(bare.languages.is_empty());
        assert_eq!(bare.cover_id, None);
        Ok(())
    }

    #[test]
    fn missing_docs_is_an_empty_page() -> anyhow::Result<()> {
        let response: SearchResponse = serde_json::from_str(r#"{"start": 0}"#)?;
        let page = SearchPage::from(response);
        assert!(page.books.is_empty());
        assert_eq!(page.total_matches, None);
        Ok(())
    }

    #[test]
    fn first_listed_author_wins() {
        let doc = SearchDoc {
            author_name: Some(vec!["Frank Herbert".to_owned(), "Brian Herbert".to_owned()]),
            ..SearchDoc::default()
        };
        let book = BookSummary::from(doc);
        assert_eq!(book.author_name.as_deref(), Some("Frank Herbert"));

        let empty = SearchDoc {
            author_name: Some(Vec::new()),
            ..SearchDoc::default()
        };
        assert_eq!(BookSummary::from(empty).author_name, None);
    }
}
