use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{MySql, QueryBuilder};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlValue {
    Text(String),
    U64(u64),
    U32(u32),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Null,
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::U32(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

pub(crate) fn push_value(qb: &mut QueryBuilder<'_, MySql>, value: SqlValue) {
    match value {
        SqlValue::Text(v) => qb.push_bind(v),
        SqlValue::U64(v) => qb.push_bind(v),
        SqlValue::U32(v) => qb.push_bind(v),
        SqlValue::F64(v) => qb.push_bind(v),
        SqlValue::Bool(v) => qb.push_bind(v),
        SqlValue::Date(v) => qb.push_bind(v),
        SqlValue::Timestamp(v) => qb.push_bind(v),
        SqlValue::Null => qb.push_bind(None::<String>),
    };
}

#[derive(Debug, Clone)]
enum Condition {
    Eq(&'static str, SqlValue),
    /// Any of the columns contains the term
    Contains(&'static [&'static str], String),
    Raw(&'static str),
}

/// ===============================
/// Dynamic WHERE clause
/// ===============================
/// Column names are always code-owned; only values are bound.
#[derive(Debug, Clone, Default)]
pub(crate) struct Conditions {
    parts: Vec<Condition>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        self.parts.push(Condition::Eq(column, value.into()));
        self
    }

    pub fn eq_opt<T: Into<SqlValue>>(
        &mut self,
        column: &'static str,
        value: Option<T>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.eq(column, value);
        }
        self
    }

    pub fn contains(&mut self, columns: &'static [&'static str], term: Option<&str>) -> &mut Self {
        if let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) {
            self.parts.push(Condition::Contains(columns, term.to_string()));
        }
        self
    }

    pub fn raw(&mut self, sql: &'static str) -> &mut Self {
        self.parts.push(Condition::Raw(sql));
        self
    }

    pub fn push_to(&self, qb: &mut QueryBuilder<'_, MySql>) {
        for (i, condition) in self.parts.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match condition {
                Condition::Eq(column, value) => {
                    qb.push(*column).push(" = ");
                    push_value(qb, value.clone());
                }
                Condition::Contains(columns, term) => {
                    let pattern = format!("%{}%", escape_like(term));
                    qb.push("(");
                    for (j, column) in columns.iter().enumerate() {
                        if j > 0 {
                            qb.push(" OR ");
                        }
                        qb.push(*column).push(" LIKE ");
                        qb.push_bind(pattern.clone());
                    }
                    qb.push(")");
                }
                Condition::Raw(sql) => {
                    qb.push(*sql);
                }
            }
        }
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// ===============================
/// Dynamic UPDATE ... SET
/// ===============================
#[derive(Debug, Clone, Default)]
pub(crate) struct Assignments {
    columns: Vec<(&'static str, SqlValue)>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        self.columns.push((column, value.into()));
        self
    }

    pub fn set_opt<T: Into<SqlValue>>(
        &mut self,
        column: &'static str,
        value: Option<T>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Starts `UPDATE <table> SET a = ?, b = ?`; the caller appends the WHERE clause.
    pub fn into_update(self, table: &'static str) -> QueryBuilder<'static, MySql> {
        let mut qb = QueryBuilder::new("UPDATE ");
        qb.push(table).push(" SET ");
        for (i, (column, value)) in self.columns.into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(column).push(" = ");
            push_value(&mut qb, value);
        }
        qb
    }
}
