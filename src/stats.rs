//! Aggregate statistics over the active rows of each entity, recomputed per call.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool};

use crate::database::manager::DatabaseError;
use crate::database::query_builder::bind_sql_param;
use crate::error::ApiError;
use crate::filter::filter_where::{quote_column, FilterWhere};
use crate::filter::{Condition, FilterOp, FilterWhereOptions, SqlParam, SqlResult};
use crate::listing::populate::populate_all;
use crate::listing::{date_range_conditions, DateColumn, DateRange, ListQuery, Populate};
use crate::models::{
    Account, Attendance, Customer, Entity, Product, SalesOutlet, ServiceTemplate, Supplier, SupportTicket,
    Transaction, User,
};

/// Bucket label for rows whose grouping column is null
const UNSPECIFIED: &str = "unspecified";

/// One `GROUP BY` bucket
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: String,
    pub count: i64,
    pub total: Decimal,
}

/// Active rows of one table, optionally narrowed by extra conditions.
#[derive(Debug, Clone)]
pub struct Scope {
    table: &'static str,
    conditions: Vec<Condition>,
}

impl Scope {
    pub fn new(table: &'static str) -> Self {
        Self { table, conditions: Vec::new() }
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    fn where_clause(&self, extra: Option<Condition>) -> Result<(String, Vec<SqlParam>), DatabaseError> {
        let mut all = self.conditions.clone();
        all.extend(extra);
        let condition = match all.len() {
            0 => None,
            1 => all.pop(),
            _ => Some(Condition::And(all)),
        };
        Ok(FilterWhere::generate(condition.as_ref(), 0, &FilterWhereOptions::default())?)
    }

    /// `COUNT(*)` and `SUM(expr)` per distinct value of `column`. `expr` is trusted SQL.
    pub fn group_sql(&self, column: &str, sum: Option<&'static str>) -> Result<SqlResult, DatabaseError> {
        let column = quote_column(column)?;
        let (where_sql, params) = self.where_clause(None)?;
        let total = sum
            .map(|expr| format!("COALESCE(SUM({}), 0)::numeric", expr))
            .unwrap_or_else(|| "0::numeric".to_string());
        Ok(SqlResult {
            query: format!(
                "SELECT {col}::text AS key, COUNT(*) AS count, {total} AS total FROM \"{table}\" WHERE {where_sql} \
                 GROUP BY {col} ORDER BY 1",
                col = column,
                total = total,
                table = self.table,
                where_sql = where_sql
            ),
            params,
        })
    }

    pub fn scalar_sql(&self, select: &str, extra: Option<Condition>) -> Result<SqlResult, DatabaseError> {
        let (where_sql, params) = self.where_clause(extra)?;
        Ok(SqlResult {
            query: format!("SELECT {} FROM \"{}\" WHERE {}", select, self.table, where_sql),
            params,
        })
    }

    pub async fn group(
        &self,
        conn: &mut PgConnection,
        column: &str,
        sum: Option<&'static str>,
    ) -> Result<Vec<Group>, DatabaseError> {
        let sql = self.group_sql(column, sum)?;
        let mut q = sqlx::query_as::<_, (Option<String>, i64, Decimal)>(&sql.query);
        for p in sql.params.iter() {
            q = bind_sql_param!(q, p);
        }
        let rows = q.fetch_all(&mut *conn).await?;
        Ok(rows
            .into_iter()
            .map(|(key, count, total)| Group {
                key: key.unwrap_or_else(|| UNSPECIFIED.to_string()),
                count,
                total,
            })
            .collect())
    }

    pub async fn count(&self, conn: &mut PgConnection, extra: Option<Condition>) -> Result<i64, DatabaseError> {
        let sql = self.scalar_sql("COUNT(*)", extra)?;
        let mut q = sqlx::query_scalar::<_, i64>(&sql.query);
        for p in sql.params.iter() {
            q = bind_sql_param!(q, p);
        }
        Ok(q.fetch_one(&mut *conn).await?)
    }

    pub async fn sum(&self, conn: &mut PgConnection, expr: &'static str) -> Result<Decimal, DatabaseError> {
        let sql = self.scalar_sql(&format!("COALESCE(SUM({}), 0)::numeric", expr), None)?;
        let mut q = sqlx::query_scalar::<_, Decimal>(&sql.query);
        for p in sql.params.iter() {
            q = bind_sql_param!(q, p);
        }
        Ok(q.fetch_one(&mut *conn).await?)
    }

    /// `None` when no row has a value
    pub async fn avg(&self, conn: &mut PgConnection, expr: &'static str) -> Result<Option<Decimal>, DatabaseError> {
        let sql = self.scalar_sql(&format!("ROUND(AVG({})::numeric, 2)", expr), None)?;
        let mut q = sqlx::query_scalar::<_, Option<Decimal>>(&sql.query);
        for p in sql.params.iter() {
            q = bind_sql_param!(q, p);
        }
        Ok(q.fetch_one(&mut *conn).await?)
    }
}

/// `{ key: count }`
pub fn counts(groups: &[Group]) -> Value {
    Value::Object(groups.iter().map(|g| (g.key.clone(), json!(g.count))).collect())
}

/// `{ key: total }`
pub fn totals(groups: &[Group]) -> Value {
    Value::Object(groups.iter().map(|g| (g.key.clone(), json!(g.total))).collect())
}

fn total_count(groups: &[Group]) -> i64 {
    groups.iter().map(|g| g.count).sum()
}

/// Scope narrowed by `startDate`/`endDate` query parameters
fn dated(table: &'static str, range: DateRange, params: HashMap<String, String>) -> Result<Scope, ApiError> {
    let query = ListQuery::from_params(params, 1, 1);
    let conditions = date_range_conditions(range, &query)?;
    Ok(conditions.into_iter().fold(Scope::new(table), Scope::with))
}

async fn conn(pool: &PgPool) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, ApiError> {
    Ok(pool.acquire().await.map_err(DatabaseError::from)?)
}

pub async fn accounts(pool: &PgPool) -> Result<Value, ApiError> {
    let mut conn = conn(pool).await?;
    let by_type = Scope::new(Account::TABLE).group(&mut conn, "type", Some("\"balance\"")).await?;
    let detail: Map<String, Value> = by_type
        .iter()
        .map(|g| (g.key.clone(), json!({ "count": g.count, "balance": g.total })))
        .collect();
    Ok(json!({
        "total": total_count(&by_type),
        "byType": detail,
    }))
}

pub async fn transactions(pool: &PgPool, params: HashMap<String, String>) -> Result<Value, ApiError> {
    let scope = dated(
        Transaction::TABLE,
        DateRange { column: "date", kind: DateColumn::Date },
        params,
    )?;
    let mut conn = conn(pool).await?;
    let by_status = scope.group(&mut conn, "status", None).await?;
    let by_type = scope.group(&mut conn, "type", Some("\"total_amount\"")).await?;
    let pending = scope.count(&mut conn, Some(Condition::eq("status", "draft"))).await?;
    Ok(json!({
        "total": total_count(&by_status),
        "byStatus": counts(&by_status),
        "amountByType": totals(&by_type),
        "pendingApproval": pending,
    }))
}

pub async fn customers(pool: &PgPool) -> Result<Value, ApiError> {
    let scope = Scope::new(Customer::TABLE);
    let mut conn = conn(pool).await?;
    let by_tier = scope.group(&mut conn, "tier", None).await?;
    let by_status = scope.group(&mut conn, "status", None).await?;
    let purchases = scope.sum(&mut conn, "\"total_purchases\"").await?;
    let month_start = first_of_month(Utc::now().date_naive()).and_time(NaiveTime::MIN).and_utc();
    let new_this_month = scope
        .count(&mut conn, Some(Condition::field("created_at", FilterOp::Gte, month_start)))
        .await?;
    Ok(json!({
        "total": total_count(&by_tier),
        "byTier": counts(&by_tier),
        "byStatus": counts(&by_status),
        "totalPurchases": purchases,
        "newThisMonth": new_this_month,
    }))
}

pub async fn suppliers(pool: &PgPool) -> Result<Value, ApiError> {
    let scope = Scope::new(Supplier::TABLE);
    let mut conn = conn(pool).await?;
    let by_category = scope.group(&mut conn, "category", None).await?;
    let by_status = scope.group(&mut conn, "status", None).await?;
    let purchases = scope.sum(&mut conn, "\"total_purchases\"").await?;
    Ok(json!({
        "total": total_count(&by_status),
        "byCategory": counts(&by_category),
        "byStatus": counts(&by_status),
        "totalPurchases": purchases,
    }))
}

pub async fn products(pool: &PgPool) -> Result<Value, ApiError> {
    let scope = Scope::new(Product::TABLE);
    let mut conn = conn(pool).await?;
    let by_category = scope.group(&mut conn, "category", None).await?;
    let value = scope.sum(&mut conn, "\"current_stock\" * \"cost_price\"").await?;
    let low = scope
        .count(&mut conn, Some(Condition::columns("current_stock", FilterOp::Lte, "min_stock")))
        .await?;
    let out = scope
        .count(&mut conn, Some(Condition::field("current_stock", FilterOp::Lte, 0i64)))
        .await?;
    Ok(json!({
        "total": total_count(&by_category),
        "byCategory": counts(&by_category),
        "inventoryValue": value,
        "lowStock": low,
        "outOfStock": out,
    }))
}

/// Machines, tools and workstations share the booking columns.
pub async fn resources(pool: &PgPool, table: &'static str) -> Result<Value, ApiError> {
    let scope = Scope::new(table);
    let now = Utc::now();
    let mut conn = conn(pool).await?;
    let by_status = scope.group(&mut conn, "status", None).await?;
    let overdue_maintenance = scope
        .count(&mut conn, Some(Condition::field("next_maintenance_date", FilterOp::Lt, now)))
        .await?;
    let overdue_bookings = scope
        .count(
            &mut conn,
            Some(Condition::And(vec![
                Condition::eq("status", "booked"),
                Condition::field("booked_until", FilterOp::Lt, now),
            ])),
        )
        .await?;
    Ok(json!({
        "total": total_count(&by_status),
        "byStatus": counts(&by_status),
        "overdueMaintenance": overdue_maintenance,
        "overdueBookings": overdue_bookings,
    }))
}

static EMPLOYEE: [Populate; 1] = [Populate::field("employee", "users", &["name", "email", "department"])];

pub async fn attendance(pool: &PgPool, params: HashMap<String, String>) -> Result<Value, ApiError> {
    let scope = dated(
        Attendance::TABLE,
        DateRange { column: "date", kind: DateColumn::Date },
        params,
    )?;
    let mut conn = conn(pool).await?;
    let by_status = scope.group(&mut conn, "status", None).await?;
    let minutes = scope.group(&mut conn, "employee", Some("\"work_minutes\"")).await?;
    drop(conn);

    let mut per_employee: Vec<Value> = minutes
        .iter()
        .map(|g| {
            json!({
                "employee": g.key,
                "days": g.count,
                "hours": (g.total / Decimal::from(60)).round_dp(2),
            })
        })
        .collect();
    populate_all(pool, &EMPLOYEE, &mut per_employee).await?;

    Ok(json!({
        "total": total_count(&by_status),
        "byStatus": counts(&by_status),
        "hoursByEmployee": per_employee,
    }))
}

pub async fn tickets(pool: &PgPool) -> Result<Value, ApiError> {
    let scope = Scope::new(SupportTicket::TABLE);
    let mut conn = conn(pool).await?;
    let by_status = scope.group(&mut conn, "status", None).await?;
    let by_priority = scope.group(&mut conn, "priority", None).await?;
    let overdue = scope
        .count(
            &mut conn,
            Some(Condition::And(vec![
                Condition::field("due_date", FilterOp::Lt, Utc::now()),
                Condition::Not(Box::new(Condition::is_in(
                    "status",
                    vec!["resolved".into(), "closed".into()],
                ))),
            ])),
        )
        .await?;
    let rating = scope.avg(&mut conn, "\"satisfaction_rating\"").await?;
    Ok(json!({
        "total": total_count(&by_status),
        "byStatus": counts(&by_status),
        "byPriority": counts(&by_priority),
        "overdue": overdue,
        "averageRating": rating,
    }))
}

pub async fn users(pool: &PgPool) -> Result<Value, ApiError> {
    let scope = Scope::new(User::TABLE);
    let mut conn = conn(pool).await?;
    let by_role = scope.group(&mut conn, "role", None).await?;
    let by_department = scope.group(&mut conn, "department", None).await?;
    Ok(json!({
        "total": total_count(&by_role),
        "byRole": counts(&by_role),
        "byDepartment": counts(&by_department),
    }))
}

pub async fn sales_outlets(pool: &PgPool) -> Result<Value, ApiError> {
    let scope = Scope::new(SalesOutlet::TABLE);
    let mut conn = conn(pool).await?;
    let by_type = scope.group(&mut conn, "type", None).await?;
    let by_status = scope.group(&mut conn, "status", None).await?;
    Ok(json!({
        "total": total_count(&by_status),
        "byType": counts(&by_type),
        "byStatus": counts(&by_status),
    }))
}

pub async fn service_templates(pool: &PgPool) -> Result<Value, ApiError> {
    let scope = Scope::new(ServiceTemplate::TABLE);
    let mut conn = conn(pool).await?;
    let by_category = scope.group(&mut conn, "category", None).await?;
    let average = scope.avg(&mut conn, "\"default_price\"").await?;
    Ok(json!({
        "total": total_count(&by_category),
        "byCategory": counts(&by_category),
        "averagePrice": average,
    }))
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}
