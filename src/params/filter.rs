//! The recursive filter tree shared by every filter compiler.
//!
//! A node is a *composite* (a logic plus child filters) exactly when its
//! child list is non-empty; otherwise it is a *leaf* comparing one field to
//! one value with one operator. Leaf properties on a composite node are
//! ignored, mirroring the wire grammar where both sets of keys live on the
//! same JSON object.

use serde::de::{Deserialize, Deserializer, Error as _};
use serde::ser::{Serialize, Serializer};

/// Logic joining the direct children of a composite filter. Governs only the
/// direct children, not descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

impl FilterLogic {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if text.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }
}

/// The 14 leaf operators of the query contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    IsEqual,
    IsNotEqual,
    IsNull,
    IsNotNull,
    IsLessThan,
    IsLessThanOrEqual,
    IsGreaterThan,
    IsGreaterThanOrEqual,
    StartsWith,
    EndsWith,
    Contains,
    DoesNotContain,
    IsEmpty,
    IsNotEmpty,
}

impl FilterOperator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsEqual => "eq",
            Self::IsNotEqual => "neq",
            Self::IsNull => "isnull",
            Self::IsNotNull => "isnotnull",
            Self::IsLessThan => "lt",
            Self::IsLessThanOrEqual => "lte",
            Self::IsGreaterThan => "gt",
            Self::IsGreaterThanOrEqual => "gte",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Contains => "contains",
            Self::DoesNotContain => "doesnotcontain",
            Self::IsEmpty => "isempty",
            Self::IsNotEmpty => "isnotempty",
        }
    }

    /// Case-insensitive operator token lookup.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        const ALL: &[FilterOperator] = &[
            FilterOperator::IsEqual,
            FilterOperator::IsNotEqual,
            FilterOperator::IsNull,
            FilterOperator::IsNotNull,
            FilterOperator::IsLessThan,
            FilterOperator::IsLessThanOrEqual,
            FilterOperator::IsGreaterThan,
            FilterOperator::IsGreaterThanOrEqual,
            FilterOperator::StartsWith,
            FilterOperator::EndsWith,
            FilterOperator::Contains,
            FilterOperator::DoesNotContain,
            FilterOperator::IsEmpty,
            FilterOperator::IsNotEmpty,
        ];
        ALL.iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(text))
    }

    /// Operators that compare against a value. The remaining four test the
    /// field alone (null/empty checks).
    #[must_use]
    pub fn takes_value(self) -> bool {
        !matches!(
            self,
            Self::IsNull | Self::IsNotNull | Self::IsEmpty | Self::IsNotEmpty
        )
    }
}

impl Serialize for FilterLogic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FilterLogic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).ok_or_else(|| D::Error::custom(format!("unknown filter logic '{text}'")))
    }
}

impl Serialize for FilterOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FilterOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| D::Error::custom(format!("unknown filter operator '{text}'")))
    }
}

/// One filter-tree node, leaf or composite.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestFilter {
    /// Child filters; non-empty marks this node as composite.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<RestFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<FilterLogic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<FilterOperator>,
    /// Raw comparison value; coerced against field metadata at compile time.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_case: bool,
}

impl RestFilter {
    #[must_use]
    pub fn leaf(field: impl Into<String>, operator: FilterOperator, value: serde_json::Value) -> Self {
        Self {
            field: Some(field.into()),
            operator: Some(operator),
            value,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn leaf_ignore_case(
        field: impl Into<String>,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            ignore_case: true,
            ..Self::leaf(field, operator, value)
        }
    }

    #[must_use]
    pub fn composite(logic: FilterLogic, filters: Vec<RestFilter>) -> Self {
        Self {
            logic: Some(logic),
            filters,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_composite(&self) -> bool {
        !self.filters.is_empty()
    }
}

/// Builds the inclusive range `and(field >= from, field <= to)`.
#[must_use]
pub fn between_filter(field: &str, from: serde_json::Value, to: serde_json::Value) -> RestFilter {
    RestFilter::composite(
        FilterLogic::And,
        vec![
            RestFilter::leaf(field, FilterOperator::IsGreaterThanOrEqual, from),
            RestFilter::leaf(field, FilterOperator::IsLessThanOrEqual, to),
        ],
    )
}
