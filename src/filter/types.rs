use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// A bound query parameter. Typed so Postgres never has to guess a cast.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Uuid(Uuid),
    Bool(bool),
    Int(i64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<Uuid> for SqlParam {
    fn from(v: Uuid) -> Self {
        SqlParam::Uuid(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(v: NaiveDate) -> Self {
        SqlParam::Date(v)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(v: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    ILike,
}

impl FilterOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Neq => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::ILike => "ILIKE",
        }
    }
}

/// WHERE tree. Leaves compare a column with a parameter or with another column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Field { column: String, op: FilterOp, value: SqlParam },
    Columns { left: String, op: FilterOp, right: String },
    In { column: String, values: Vec<SqlParam> },
    /// `column @> value` on a jsonb column
    JsonContains { column: String, value: serde_json::Value },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn field(column: &str, op: FilterOp, value: impl Into<SqlParam>) -> Self {
        Condition::Field {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: &str, value: impl Into<SqlParam>) -> Self {
        Self::field(column, FilterOp::Eq, value)
    }

    pub fn neq(column: &str, value: impl Into<SqlParam>) -> Self {
        Self::field(column, FilterOp::Neq, value)
    }

    pub fn columns(left: &str, op: FilterOp, right: &str) -> Self {
        Condition::Columns {
            left: left.to_string(),
            op,
            right: right.to_string(),
        }
    }

    /// Case-insensitive substring match; LIKE metacharacters in `term` match literally.
    pub fn contains(column: &str, term: &str) -> Self {
        Self::field(column, FilterOp::ILike, format!("%{}%", escape_like(term)))
    }

    pub fn is_in(column: &str, values: Vec<SqlParam>) -> Self {
        Condition::In {
            column: column.to_string(),
            values,
        }
    }
}

pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct FilterData {
    pub where_clause: Option<Condition>,
    pub order: Vec<FilterOrderInfo>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub options: FilterWhereOptions,
}

#[derive(Debug, Clone, Default)]
pub struct FilterWhereOptions {
    /// When false (the default) `"is_active" = true` is ANDed into the clause.
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

impl FilterOrderInfo {
    pub fn new(column: &str, sort: SortDirection) -> Self {
        Self {
            column: column.to_string(),
            sort,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}
