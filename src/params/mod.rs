//! Canonical request parameters and the query-string DSL that produces them.

pub mod filter;
pub mod query;
pub mod smart;

use serde::de::{Deserialize, Deserializer, Error as _};
use serde::ser::{Serialize, Serializer};

pub use filter::{between_filter, FilterLogic, FilterOperator, RestFilter};
pub use query::parse_query;
pub use smart::{SmartFilter, SmartRange};

/// Sort direction, `"Ascending"` / `"Descending"` on the wire
/// (case-insensitive on input).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "Ascending",
            Self::Descending => "Descending",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("ascending") {
            Some(Self::Ascending)
        } else if text.eq_ignore_ascii_case("descending") {
            Some(Self::Descending)
        } else {
            None
        }
    }
}

impl Serialize for SortDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| D::Error::custom(format!("unknown sort direction '{text}'")))
    }
}

/// One `{field, direction}` sort entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestSortField {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Ordered sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestSort {
    #[serde(default)]
    pub fields: Vec<RestSortField>,
}

impl RestSort {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Canonical parameter record for one fetch request. Constructed fresh per
/// request, never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RestParameters {
    /// Row limit; 0 means unlimited.
    pub take: usize,
    /// Row offset.
    pub skip: usize,
    pub sort: Option<RestSort>,
    pub filter: Option<RestFilter>,
    pub smart_filter: Option<SmartFilter>,
    /// When set, the backend also evaluates the filtered-but-unpaginated
    /// row count. Opt-in because the extra pass is backend-dependent cost.
    pub with_count: bool,
}

impl RestParameters {
    #[must_use]
    pub fn has_sort(&self) -> bool {
        self.sort.as_ref().is_some_and(|s| !s.is_empty())
    }
}
