//! Compilation of filter trees into parameterized SQL fragments.
//!
//! Every comparison value travels as a bind parameter; the only identifiers
//! interpolated into the statement text are column names validated against
//! the entity metadata, quoted for the target dialect.

use crate::manager::StoreError;
use crate::metadata::{EntityMetadata, FieldDataType, FieldMetadata};
use crate::params::{FilterLogic, FilterOperator, RestFilter, RestParameters, SortDirection};
use crate::value::FieldValue;
use std::fmt::Write as _;

/// Target SQL flavor. Decides identifier quoting, bind-parameter syntax and
/// the pagination clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
    MySql,
}

impl SqlDialect {
    #[must_use]
    pub fn quote(self, ident: &str) -> String {
        match self {
            Self::Sqlite | Self::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    /// Bind marker for the parameter at 1-based position `index`.
    fn placeholder(self, index: usize) -> String {
        match self {
            Self::Sqlite | Self::MySql => "?".to_owned(),
            Self::Postgres => format!("${index}"),
        }
    }
}

/// A statement fragment plus its bind parameters in positional order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<FieldValue>,
}

/// Builds SELECT and COUNT statements for one entity.
pub struct SqlQueryBuilder<'a> {
    dialect: SqlDialect,
    metadata: &'a EntityMetadata,
}

impl<'a> SqlQueryBuilder<'a> {
    #[must_use]
    pub fn new(dialect: SqlDialect, metadata: &'a EntityMetadata) -> Self {
        Self { dialect, metadata }
    }

    /// Full SELECT with WHERE, ORDER BY and pagination applied.
    pub fn select(&self, parameters: &RestParameters) -> Result<SqlFragment, StoreError> {
        let filter = crate::filtering::compose_filter(parameters, &self.metadata.fields);
        let mut fragment = self.filtered_select(filter.as_ref())?;

        fragment.sql.push(' ');
        fragment.sql.push_str(&self.order_by(parameters)?);
        if let Some(paging) = self.pagination(parameters) {
            fragment.sql.push(' ');
            fragment.sql.push_str(&paging);
        }
        Ok(fragment)
    }

    /// COUNT over the filtered rows, ignoring sort and pagination.
    pub fn count(&self, parameters: &RestParameters) -> Result<SqlFragment, StoreError> {
        let filter = crate::filtering::compose_filter(parameters, &self.metadata.fields);
        let inner = self.filtered_select(filter.as_ref())?;
        Ok(SqlFragment {
            sql: format!("SELECT COUNT(*) AS cnt FROM ({}) AS sel", inner.sql),
            params: inner.params,
        })
    }

    fn filtered_select(&self, filter: Option<&RestFilter>) -> Result<SqlFragment, StoreError> {
        let columns = self
            .metadata
            .fields
            .iter()
            .map(|f| self.dialect.quote(&f.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "SELECT {columns} FROM {}",
            self.dialect.quote(&self.metadata.name)
        );
        let mut params = Vec::new();
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            self.render(filter, &mut sql, &mut params)?;
        }
        Ok(SqlFragment { sql, params })
    }

    /// `ORDER BY` over the requested sort fields. An unsorted query still
    /// gets `ORDER BY 1` so pagination windows stay deterministic.
    fn order_by(&self, parameters: &RestParameters) -> Result<String, StoreError> {
        let fields = parameters
            .sort
            .as_ref()
            .map(|s| s.fields.as_slice())
            .unwrap_or_default();
        if fields.is_empty() {
            return Ok("ORDER BY 1".to_owned());
        }
        let mut clause = String::from("ORDER BY ");
        for (index, sort_field) in fields.iter().enumerate() {
            let meta = self.field(&sort_field.field)?;
            if index > 0 {
                clause.push_str(", ");
            }
            clause.push_str(&self.dialect.quote(&meta.name));
            clause.push_str(match sort_field.direction {
                SortDirection::Ascending => " ASC",
                SortDirection::Descending => " DESC",
            });
        }
        Ok(clause)
    }

    fn pagination(&self, parameters: &RestParameters) -> Option<String> {
        let (take, skip) = (parameters.take, parameters.skip);
        if take == 0 && skip == 0 {
            return None;
        }
        let clause = match self.dialect {
            SqlDialect::Postgres => {
                let mut c = String::new();
                if take > 0 {
                    let _ = write!(c, "LIMIT {take}");
                }
                if skip > 0 {
                    if !c.is_empty() {
                        c.push(' ');
                    }
                    let _ = write!(c, "OFFSET {skip}");
                }
                c
            }
            // sqlite and mysql require a LIMIT before OFFSET; -1 and the
            // documented max value mean "no limit" respectively.
            SqlDialect::Sqlite if take == 0 => format!("LIMIT -1 OFFSET {skip}"),
            SqlDialect::MySql if take == 0 => {
                format!("LIMIT 18446744073709551615 OFFSET {skip}")
            }
            SqlDialect::Sqlite | SqlDialect::MySql => {
                if skip > 0 {
                    format!("LIMIT {take} OFFSET {skip}")
                } else {
                    format!("LIMIT {take}")
                }
            }
        };
        Some(clause)
    }

    fn render(
        &self,
        filter: &RestFilter,
        sql: &mut String,
        params: &mut Vec<FieldValue>,
    ) -> Result<(), StoreError> {
        if filter.is_composite() {
            let joiner = match filter.logic.unwrap_or(FilterLogic::And) {
                FilterLogic::And => " AND ",
                FilterLogic::Or => " OR ",
            };
            for (index, child) in filter.filters.iter().enumerate() {
                if index > 0 {
                    sql.push_str(joiner);
                }
                sql.push('(');
                self.render(child, sql, params)?;
                sql.push(')');
            }
            return Ok(());
        }

        let (Some(field), Some(operator)) = (filter.field.as_deref(), filter.operator) else {
            return Err(StoreError::Backend(
                "filter node is missing a field or operator".to_owned(),
            ));
        };
        let meta = self.field(field)?;
        let column = self.dialect.quote(&meta.name);
        let fold_case = filter.ignore_case && meta.field_type == FieldDataType::String;

        match operator {
            FilterOperator::IsNull => {
                let _ = write!(sql, "{column} IS NULL");
            }
            FilterOperator::IsNotNull => {
                let _ = write!(sql, "{column} IS NOT NULL");
            }
            FilterOperator::IsEmpty => {
                let _ = write!(sql, "{column} = ''");
            }
            // Null is distinct from the empty string, so it passes the
            // not-empty check; plain `<> ''` would drop null rows.
            FilterOperator::IsNotEmpty => {
                let _ = write!(sql, "({column} IS NULL OR {column} <> '')");
            }
            FilterOperator::IsEqual
            | FilterOperator::IsNotEqual
            | FilterOperator::IsLessThan
            | FilterOperator::IsLessThanOrEqual
            | FilterOperator::IsGreaterThan
            | FilterOperator::IsGreaterThanOrEqual => {
                let op = match operator {
                    FilterOperator::IsEqual => "=",
                    FilterOperator::IsNotEqual => "<>",
                    FilterOperator::IsLessThan => "<",
                    FilterOperator::IsLessThanOrEqual => "<=",
                    FilterOperator::IsGreaterThan => ">",
                    FilterOperator::IsGreaterThanOrEqual => ">=",
                    _ => unreachable!(),
                };
                params.push(FieldValue::coerce(&filter.value, meta).unwrap_or(FieldValue::Null));
                let marker = self.dialect.placeholder(params.len());
                if fold_case {
                    let _ = write!(sql, "LOWER({column}) {op} LOWER({marker})");
                } else {
                    let _ = write!(sql, "{column} {op} {marker}");
                }
            }
            FilterOperator::StartsWith
            | FilterOperator::EndsWith
            | FilterOperator::Contains
            | FilterOperator::DoesNotContain => {
                let text = match &filter.value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                let pattern = match operator {
                    FilterOperator::StartsWith => format!("{}%", escape_like(&text)),
                    FilterOperator::EndsWith => format!("%{}", escape_like(&text)),
                    _ => format!("%{}%", escape_like(&text)),
                };
                params.push(FieldValue::String(pattern));
                let marker = self.dialect.placeholder(params.len());
                let keyword = if operator == FilterOperator::DoesNotContain {
                    "NOT LIKE"
                } else {
                    "LIKE"
                };
                // Null reads as the empty string for pattern operators, the
                // same convention the in-memory predicate follows.
                let subject = format!("COALESCE({column}, '')");
                if fold_case {
                    let _ =
                        write!(sql, "LOWER({subject}) {keyword} LOWER({marker}) ESCAPE '\\'");
                } else {
                    let _ = write!(sql, "{subject} {keyword} {marker} ESCAPE '\\'");
                }
            }
        }
        Ok(())
    }

    fn field(&self, name: &str) -> Result<&FieldMetadata, StoreError> {
        self.metadata
            .field(name)
            .ok_or_else(|| StoreError::UnknownField {
                entity: self.metadata.name.clone(),
                field: name.to_owned(),
            })
    }
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
