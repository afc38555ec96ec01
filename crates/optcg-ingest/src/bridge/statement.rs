//! Parameterized statements rendered to literal SQL
//!
//! The bridge has no native parameter binding, so positional `?`
//! placeholders are substituted client-side: text is single-quoted with
//! embedded quotes doubled, absent values become `NULL`, integers are
//! written as-is.

use serde::Serialize;

/// Separator between statements submitted in one bridge call
pub const STATEMENT_SEPARATOR: &str = ";\n";

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
}

impl SqlValue {
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Integer(n) => n.to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// SQL text with positional `?` placeholders and their bound values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind the next positional parameter
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Substitute every placeholder with its bound value.
    ///
    /// Placeholders without a bound value render as `NULL`.
    pub fn render(&self) -> String {
        let mut rendered = String::with_capacity(self.sql.len() + self.params.len() * 16);
        let mut params = self.params.iter();

        for ch in self.sql.chars() {
            if ch == '?' {
                match params.next() {
                    Some(value) => rendered.push_str(&value.to_sql_literal()),
                    None => rendered.push_str("NULL"),
                }
            } else {
                rendered.push(ch);
            }
        }

        rendered
    }
}

/// Render several statements into the text of a single bridge invocation
pub fn render_batch(statements: &[Statement]) -> String {
    statements
        .iter()
        .map(Statement::render)
        .collect::<Vec<_>>()
        .join(STATEMENT_SEPARATOR)
}
