//! Shared list contract: page/limit/search/filters in, one page of populated
//! records plus `{page, limit, total, pages}` out.

pub mod populate;

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::CONFIG;
use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::{Condition, FilterData, FilterError, FilterOp, FilterOrderInfo, FilterWhereOptions, SortDirection};
use crate::models::Entity;

pub use populate::Populate;

/// How one entity is searched, filtered and ordered.
pub struct ListSpec {
    pub search: &'static [&'static str],
    pub filters: &'static [ParamFilter],
    pub date_range: Option<DateRange>,
    pub order: &'static [(&'static str, SortDirection)],
    /// Overrides `list.default_limit` from config
    pub default_limit: Option<i64>,
}

pub struct ParamFilter {
    pub param: &'static str,
    pub kind: ParamKind,
}

pub enum ParamKind {
    Text(&'static str),
    Uuid(&'static str),
    /// Boolean query flag mapped to a predicate (e.g. `lowStock=true`)
    Derived(fn(bool) -> Condition),
    /// Raw value mapped to a predicate
    Custom(fn(&str) -> Result<Condition, FilterError>),
}

#[derive(Clone, Copy)]
pub struct DateRange {
    pub column: &'static str,
    pub kind: DateColumn,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum DateColumn {
    Date,
    Timestamp,
}

impl ParamFilter {
    pub const fn text(param: &'static str, column: &'static str) -> Self {
        Self { param, kind: ParamKind::Text(column) }
    }

    pub const fn uuid(param: &'static str, column: &'static str) -> Self {
        Self { param, kind: ParamKind::Uuid(column) }
    }

    pub const fn derived(param: &'static str, f: fn(bool) -> Condition) -> Self {
        Self { param, kind: ParamKind::Derived(f) }
    }

    pub const fn custom(param: &'static str, f: fn(&str) -> Result<Condition, FilterError>) -> Self {
        Self { param, kind: ParamKind::Custom(f) }
    }
}

/// Parsed list request
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub params: HashMap<String, String>,
}

impl ListQuery {
    pub fn from_params(params: HashMap<String, String>, default_limit: i64, max_limit: i64) -> Self {
        let page = parse_positive(params.get("page"), 1);
        let limit = parse_positive(params.get("limit"), default_limit).min(max_limit.max(1));
        let search = params
            .get("search")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self { page, limit, search, params }
    }

    pub fn skip(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Present and non-empty parameter value
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}

/// Positive integer or the default
fn parse_positive(raw: Option<&String>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if total <= 0 || limit <= 0 { 0 } else { (total + limit - 1) / limit };
        Self { page, limit, total, pages }
    }
}

/// Builds the WHERE tree and paging for a list request. `isActive = true` is added by the renderer.
pub fn build_filter(spec: &ListSpec, query: &ListQuery) -> Result<FilterData, FilterError> {
    let mut conditions = Vec::new();

    if let Some(term) = &query.search {
        if !spec.search.is_empty() {
            conditions.push(Condition::Or(
                spec.search.iter().map(|column| Condition::contains(column, term)).collect(),
            ));
        }
    }

    for filter in spec.filters {
        let Some(raw) = query.param(filter.param) else { continue };
        let condition = match &filter.kind {
            ParamKind::Text(column) => Condition::eq(column, raw),
            ParamKind::Uuid(column) => Condition::eq(column, parse_uuid(filter.param, raw)?),
            ParamKind::Derived(f) => f(parse_bool(filter.param, raw)?),
            ParamKind::Custom(f) => f(raw)?,
        };
        conditions.push(condition);
    }

    if let Some(range) = spec.date_range {
        conditions.extend(date_range_conditions(range, query)?);
    }

    let where_clause = match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(Condition::And(conditions)),
    };

    Ok(FilterData {
        where_clause,
        order: spec
            .order
            .iter()
            .map(|(column, sort)| FilterOrderInfo::new(column, *sort))
            .collect(),
        limit: Some(query.limit),
        offset: Some(query.skip()),
        options: FilterWhereOptions::default(),
    })
}

/// `startDate` / `endDate` bounds on the designated date column; either may be absent.
pub fn date_range_conditions(range: DateRange, query: &ListQuery) -> Result<Vec<Condition>, FilterError> {
    let mut conditions = Vec::new();
    if let Some(raw) = query.param("startDate") {
        conditions.push(lower_bound(range, parse_date_bound("startDate", raw)?));
    }
    if let Some(raw) = query.param("endDate") {
        conditions.push(upper_bound(range, parse_date_bound("endDate", raw)?));
    }
    Ok(conditions)
}

pub fn parse_uuid(param: &str, raw: &str) -> Result<Uuid, FilterError> {
    Uuid::parse_str(raw).map_err(|_| FilterError::parameter(param, "expected a UUID"))
}

pub fn parse_bool(param: &str, raw: &str) -> Result<bool, FilterError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(FilterError::parameter(param, "expected true or false")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DateBound {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

pub fn parse_date_bound(param: &str, raw: &str) -> Result<DateBound, FilterError> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(DateBound::Day(day));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| DateBound::Instant(dt.with_timezone(&Utc)))
        .map_err(|_| FilterError::parameter(param, "expected YYYY-MM-DD or an RFC 3339 timestamp"))
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn lower_bound(range: DateRange, bound: DateBound) -> Condition {
    match (range.kind, bound) {
        (DateColumn::Date, DateBound::Day(d)) => Condition::field(range.column, FilterOp::Gte, d),
        (DateColumn::Date, DateBound::Instant(t)) => Condition::field(range.column, FilterOp::Gte, t.date_naive()),
        (DateColumn::Timestamp, DateBound::Day(d)) => Condition::field(range.column, FilterOp::Gte, start_of_day(d)),
        (DateColumn::Timestamp, DateBound::Instant(t)) => Condition::field(range.column, FilterOp::Gte, t),
    }
}

/// Inclusive upper bound; a bare day on a timestamp column covers that whole day.
fn upper_bound(range: DateRange, bound: DateBound) -> Condition {
    match (range.kind, bound) {
        (DateColumn::Date, DateBound::Day(d)) => Condition::field(range.column, FilterOp::Lte, d),
        (DateColumn::Date, DateBound::Instant(t)) => Condition::field(range.column, FilterOp::Lte, t.date_naive()),
        (DateColumn::Timestamp, DateBound::Day(d)) => {
            Condition::field(range.column, FilterOp::Lt, start_of_day(d) + Duration::days(1))
        }
        (DateColumn::Timestamp, DateBound::Instant(t)) => Condition::field(range.column, FilterOp::Lte, t),
    }
}

/// One page of an entity listing
#[derive(Debug, Serialize)]
pub struct ListPage {
    pub data: Vec<Value>,
    pub pagination: Pagination,
}

pub async fn list_entities<E: Entity>(pool: &PgPool, params: HashMap<String, String>) -> Result<ListPage, crate::error::ApiError> {
    let spec = E::list_spec();
    let default_limit = spec.default_limit.unwrap_or(CONFIG.list.default_limit);
    let query = ListQuery::from_params(params, default_limit, CONFIG.list.max_limit);
    let filter = build_filter(spec, &query)?;

    let mut conn = pool.acquire().await.map_err(DatabaseError::from)?;
    let total = QueryBuilder::<E>::new(E::TABLE)?
        .filter(FilterData { limit: None, offset: None, ..filter.clone() })?
        .count(&mut conn)
        .await?;
    let rows = QueryBuilder::<E>::new(E::TABLE)?
        .filter(filter)?
        .select_all(&mut conn)
        .await?;
    drop(conn);

    let mut data: Vec<Value> = rows.iter().map(|r| r.to_api_value()).collect();
    populate::populate_all(pool, E::populate(), &mut data).await?;

    Ok(ListPage {
        data,
        pagination: Pagination::new(query.page, query.limit, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_where::FilterWhere;
    use crate::filter::SqlParam;

    fn low_stock(flag: bool) -> Condition {
        let c = Condition::columns("current_stock", FilterOp::Lte, "min_stock");
        if flag { c } else { Condition::Not(Box::new(c)) }
    }

    static SPEC: ListSpec = ListSpec {
        search: &["name", "sku"],
        filters: &[
            ParamFilter::text("category", "category"),
            ParamFilter::uuid("supplier", "supplier"),
            ParamFilter::derived("lowStock", low_stock),
        ],
        date_range: Some(DateRange { column: "created_at", kind: DateColumn::Timestamp }),
        order: &[("name", SortDirection::Asc)],
        default_limit: None,
    };

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn where_sql(pairs: &[(&str, &str)]) -> (String, Vec<SqlParam>) {
        let query = ListQuery::from_params(params(pairs), 10, 100);
        let filter = build_filter(&SPEC, &query).unwrap();
        FilterWhere::generate(filter.where_clause.as_ref(), 0, &filter.options).unwrap()
    }

    #[test]
    fn page_and_limit_fall_back_to_defaults() {
        let q = ListQuery::from_params(params(&[("page", "abc"), ("limit", "-4")]), 10, 100);
        assert_eq!((q.page, q.limit), (1, 10));
        let q = ListQuery::from_params(params(&[("page", "0"), ("limit", "0")]), 50, 100);
        assert_eq!((q.page, q.limit), (1, 50));
        let q = ListQuery::from_params(params(&[]), 10, 100);
        assert_eq!((q.page, q.limit, q.skip()), (1, 10, 0));
    }

    #[test]
    fn skip_and_limit_cap() {
        let q = ListQuery::from_params(params(&[("page", "3"), ("limit", "25")]), 10, 100);
        assert_eq!(q.skip(), 50);
        let q = ListQuery::from_params(params(&[("limit", "5000")]), 10, 100);
        assert_eq!(q.limit, 100);
    }

    #[test]
    fn pages_is_ceiling_of_total_over_limit() {
        assert_eq!(Pagination::new(1, 10, 0).pages, 0);
        assert_eq!(Pagination::new(1, 10, 1).pages, 1);
        assert_eq!(Pagination::new(1, 10, 10).pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).pages, 2);
        assert_eq!(Pagination::new(2, 3, 10).pages, 4);
    }

    #[test]
    fn no_filters_only_restricts_to_active() {
        let (sql, params) = where_sql(&[]);
        assert_eq!(sql, "\"is_active\" = true");
        assert!(params.is_empty());
    }

    #[test]
    fn search_is_or_of_contains_over_search_columns() {
        let (sql, params) = where_sql(&[("search", "  bolt ")]);
        assert_eq!(sql, "\"is_active\" = true AND ((\"name\" ILIKE $1) OR (\"sku\" ILIKE $2))");
        assert_eq!(params[0], SqlParam::Text("%bolt%".into()));
    }

    #[test]
    fn empty_params_impose_no_constraint() {
        let (sql, _) = where_sql(&[("category", ""), ("search", "   ")]);
        assert_eq!(sql, "\"is_active\" = true");
    }

    #[test]
    fn equality_and_derived_filters_are_anded() {
        let (sql, params) = where_sql(&[("category", "fasteners"), ("lowStock", "true")]);
        assert_eq!(
            sql,
            "\"is_active\" = true AND ((\"category\" = $1) AND (\"current_stock\" <= \"min_stock\"))"
        );
        assert_eq!(params, vec![SqlParam::Text("fasteners".into())]);
    }

    #[test]
    fn malformed_uuid_filter_is_rejected() {
        let query = ListQuery::from_params(params(&[("supplier", "not-a-uuid")]), 10, 100);
        assert!(matches!(build_filter(&SPEC, &query), Err(FilterError::InvalidParameter { .. })));
    }

    #[test]
    fn date_range_is_inclusive_and_independent() {
        let (sql, params) = where_sql(&[("endDate", "2024-03-31")]);
        assert_eq!(sql, "\"is_active\" = true AND \"created_at\" < $1");
        let expected = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap().and_time(NaiveTime::MIN).and_utc();
        assert_eq!(params, vec![SqlParam::Timestamp(expected)]);

        let (sql, _) = where_sql(&[("startDate", "2024-03-01"), ("endDate", "2024-03-31")]);
        assert!(sql.contains("\"created_at\" >= $1"));
        assert!(sql.contains("\"created_at\" < $2"));
    }

    #[test]
    fn date_column_bounds_use_dates() {
        let range = DateRange { column: "date", kind: DateColumn::Date };
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(upper_bound(range, DateBound::Day(day)), Condition::field("date", FilterOp::Lte, day));
        assert!(parse_date_bound("startDate", "15/01/2024").is_err());
        assert!(matches!(
            parse_date_bound("startDate", "2024-01-15T08:00:00Z"),
            Ok(DateBound::Instant(_))
        ));
    }
}
