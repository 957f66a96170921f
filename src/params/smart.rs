//! Smart filter: one free-text token heuristically expanded into an
//! `or`-combined filter across an entity's fields.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::metadata::{FieldDataType, FieldMetadata};
use crate::params::filter::{between_filter, FilterLogic, FilterOperator, RestFilter};
use crate::value::parse_date_time;

/// Range separator. The spaces are part of the token: `"10-20"` is a plain
/// string, `"10 - 20"` is a numeric range.
const RANGE_SEPARATOR: &str = " - ";

/// Free-text smart filter value, as received on the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartFilter {
    pub value: String,
}

impl SmartFilter {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    /// Expand the token into a filter fragment scoped to `fields`.
    ///
    /// String fields get a case-insensitive `contains` on the raw text;
    /// numeric and date fields get a between/equals when the text parses as
    /// a range or single value of their kind; time and byte fields never
    /// match. Returns `None` for empty text or when no field produced a
    /// fragment.
    #[must_use]
    pub fn compose_filter(&self, fields: &[FieldMetadata]) -> Option<RestFilter> {
        if self.value.is_empty() || fields.is_empty() {
            return None;
        }

        let range = SmartRange::parse(&self.value);
        let mut fragments = Vec::new();
        for field in fields {
            match field.field_type {
                FieldDataType::String => {
                    fragments.push(RestFilter::leaf_ignore_case(
                        &field.name,
                        FilterOperator::Contains,
                        serde_json::Value::String(self.value.clone()),
                    ));
                }
                FieldDataType::Numeric => {
                    if let Some(min) = range.min_num {
                        if let Some(max) = range.max_num {
                            fragments.push(between_filter(
                                &field.name,
                                number_value(min),
                                number_value(max),
                            ));
                        } else {
                            fragments.push(RestFilter::leaf(
                                &field.name,
                                FilterOperator::IsEqual,
                                number_value(min),
                            ));
                        }
                    }
                }
                FieldDataType::Date | FieldDataType::DateTime => {
                    if let Some(min) = range.min_date {
                        if let Some(max) = range.max_date {
                            fragments.push(between_filter(
                                &field.name,
                                date_value(min),
                                date_value(max),
                            ));
                        } else {
                            fragments.push(RestFilter::leaf(
                                &field.name,
                                FilterOperator::IsEqual,
                                date_value(min),
                            ));
                        }
                    }
                }
                FieldDataType::Time | FieldDataType::ByteArray => {}
            }
        }

        match fragments.len() {
            0 => None,
            1 => fragments.pop(),
            _ => Some(RestFilter::composite(FilterLogic::Or, fragments)),
        }
    }
}

/// Numeric or date interval inferred from one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmartRange {
    pub min_num: Option<Decimal>,
    pub max_num: Option<Decimal>,
    pub min_date: Option<NaiveDateTime>,
    pub max_date: Option<NaiveDateTime>,
}

impl SmartRange {
    /// Parse a token into its numeric/date interpretation.
    ///
    /// Numeric ranges are normalized to min ≤ max. Date ranges keep the
    /// literal left → min, right → max assignment, so a "high - low" date
    /// token stays unswapped (long-standing observable behavior; see
    /// DESIGN.md).
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut range = Self::default();
        if text.is_empty() {
            return range;
        }

        let parts: Vec<&str> = text.split(RANGE_SEPARATOR).collect();
        if parts.len() == 2 {
            let left = parts[0].trim();
            let right = parts[1].trim();

            if let (Some(left_date), Some(right_date)) =
                (parse_date_time(left), parse_date_time(right))
            {
                range.min_date = Some(left_date);
                range.max_date = Some(right_date);
                return range;
            }

            if let (Ok(left_num), Ok(right_num)) =
                (left.parse::<Decimal>(), right.parse::<Decimal>())
            {
                range.min_num = Some(left_num.min(right_num));
                range.max_num = Some(left_num.max(right_num));
                return range;
            }
        }

        if let Some(date) = parse_date_time(text.trim()) {
            range.min_date = Some(date);
            return range;
        }
        if let Ok(num) = text.trim().parse::<Decimal>() {
            range.min_num = Some(num);
        }
        range
    }
}

fn number_value(d: Decimal) -> serde_json::Value {
    // Decimal text form; the coercion layer parses it back against the
    // target field's scale.
    serde_json::Value::String(d.to_string())
}

fn date_value(dt: NaiveDateTime) -> serde_json::Value {
    serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldMetadata;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn bare_number_is_single_value() {
        let range = SmartRange::parse("42");
        assert_eq!(range.min_num, Some(dec("42")));
        assert_eq!(range.max_num, None);
        assert_eq!(range.min_date, None);
    }

    #[test]
    fn spaced_separator_makes_numeric_range() {
        let range = SmartRange::parse("10 - 20");
        assert_eq!(range.min_num, Some(dec("10")));
        assert_eq!(range.max_num, Some(dec("20")));
    }

    #[test]
    fn numeric_range_is_order_normalized() {
        let range = SmartRange::parse("20 - 10");
        assert_eq!(range.min_num, Some(dec("10")));
        assert_eq!(range.max_num, Some(dec("20")));
    }

    #[test]
    fn unspaced_dash_is_not_a_range() {
        let range = SmartRange::parse("10-20");
        assert_eq!(range.min_num, None);
        assert_eq!(range.max_num, None);
    }

    #[test]
    fn date_range_parses() {
        let range = SmartRange::parse("2024-01-01 - 2024-01-31");
        assert_eq!(
            range.min_date.map(|d| d.date().to_string()),
            Some("2024-01-01".to_owned())
        );
        assert_eq!(
            range.max_date.map(|d| d.date().to_string()),
            Some("2024-01-31".to_owned())
        );
    }

    #[test]
    fn reversed_date_range_stays_literal() {
        // Left goes to min and right to max regardless of order.
        let range = SmartRange::parse("2024-12-31 - 2024-01-01");
        assert_eq!(
            range.min_date.map(|d| d.date().to_string()),
            Some("2024-12-31".to_owned())
        );
        assert_eq!(
            range.max_date.map(|d| d.date().to_string()),
            Some("2024-01-01".to_owned())
        );
    }

    fn employee_fields() -> Vec<FieldMetadata> {
        vec![
            FieldMetadata::new("Id", FieldDataType::Numeric).primary_key(),
            FieldMetadata::new("Name", FieldDataType::String),
            FieldMetadata::new("HireDate", FieldDataType::Date),
            FieldMetadata::new("Photo", FieldDataType::ByteArray),
        ]
    }

    #[test]
    fn text_token_matches_string_fields_only() {
        let filter = SmartFilter::new("smith")
            .compose_filter(&employee_fields())
            .expect("one fragment");
        // Single fragment comes back unwrapped.
        assert!(!filter.is_composite());
        assert_eq!(filter.field.as_deref(), Some("Name"));
        assert_eq!(filter.operator, Some(FilterOperator::Contains));
        assert!(filter.ignore_case);
    }

    #[test]
    fn numeric_token_fans_out_with_or() {
        let filter = SmartFilter::new("42")
            .compose_filter(&employee_fields())
            .expect("fragments");
        assert!(filter.is_composite());
        assert_eq!(filter.logic, Some(FilterLogic::Or));
        // Id gets an equality leaf, Name a contains leaf; HireDate and Photo
        // contribute nothing for a non-date token.
        assert_eq!(filter.filters.len(), 2);
    }

    #[test]
    fn empty_text_or_no_fields_yield_nothing() {
        assert!(SmartFilter::new("").compose_filter(&employee_fields()).is_none());
        assert!(SmartFilter::new("x").compose_filter(&[]).is_none());
    }

    #[test]
    fn byte_and_time_fields_never_match() {
        let fields = vec![
            FieldMetadata::new("Photo", FieldDataType::ByteArray),
            FieldMetadata::new("Shift", FieldDataType::Time),
        ];
        assert!(SmartFilter::new("10 - 20").compose_filter(&fields).is_none());
    }
}
