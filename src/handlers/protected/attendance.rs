// handlers/protected/attendance.rs - POST /api/hrm/attendance/{checkin,checkout,break/start,break/end}

use axum::extract::State;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::repository::{insert_record, lock_active_404, save_record, select_one};
use crate::error::ApiError;
use crate::filter::{Condition, FilterData};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, OptionalJson};
use crate::models::attendance::{BreakRequest, CheckInRequest};
use crate::models::{Attendance, Entity, Reference};
use crate::state::AppState;
use crate::workflow::attendance::{arrival_status, check_out, end_break, start_break};

use super::crud::{check_references, duplicate, present};

/// The acting employee, or another one when a manager records on their behalf
fn subject(user: &AuthUser, employee: Option<Uuid>) -> Result<Uuid, ApiError> {
    match employee {
        Some(other) if other != user.user_id => {
            if !user.is_manager() {
                return Err(ApiError::forbidden("Insufficient permissions"));
            }
            Ok(other)
        }
        _ => Ok(user.user_id),
    }
}

async fn find_day(conn: &mut PgConnection, employee: Uuid, day: NaiveDate) -> Result<Option<Attendance>, DatabaseError> {
    select_one::<Attendance>(
        conn,
        FilterData {
            where_clause: Some(Condition::And(vec![
                Condition::eq("employee", employee),
                Condition::eq("date", day),
            ])),
            ..Default::default()
        },
    )
    .await
}

/// POST /api/hrm/attendance/checkin
pub async fn checkin_post(
    State(state): State<AppState>,
    user: AuthUser,
    OptionalJson(body): OptionalJson<CheckInRequest>,
) -> ApiResult<Value> {
    let employee = subject(&user, body.employee)?;
    let now = Utc::now();

    let mut conn = state.pool.acquire().await.map_err(DatabaseError::from)?;
    check_references(&mut conn, &[Reference::new("users", "Employee", employee)]).await?;
    if find_day(&mut conn, employee, now.date_naive()).await?.is_some() {
        return Err(ApiError::invalid_state("Already checked in today"));
    }

    let settings = state.settings.get().await?;
    let status = arrival_status(now, settings.work_start(), settings.late_grace_minutes);
    let record = Attendance::check_in(employee, now, status, body.notes, user.user_id);

    // A concurrent check-in loses on the (employee, date) index
    let saved = insert_record(&mut conn, &record).await.map_err(|e| match e {
        DatabaseError::UniqueViolation(_) => ApiError::invalid_state("Already checked in today"),
        other => duplicate::<Attendance>(other),
    })?;
    drop(conn);

    tracing::info!(employee = %employee, status = ?saved.status, "Checked in");
    Ok(ApiResponse::created(present(&state.pool, &saved).await?))
}

/// Applies `change` to today's record of the subject employee.
async fn with_today<F>(state: &AppState, user: &AuthUser, employee: Option<Uuid>, change: F) -> ApiResult<Value>
where
    F: FnOnce(&mut Attendance) -> Result<(), ApiError> + Send,
{
    let employee = subject(user, employee)?;
    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    let day = find_day(&mut *tx, employee, Utc::now().date_naive())
        .await?
        .ok_or_else(|| ApiError::not_found("No check-in record found for today"))?;
    let mut record = match lock_active_404::<Attendance>(&mut *tx, day.id).await {
        Ok(record) => record,
        Err(DatabaseError::NotFound(_)) => return Err(ApiError::not_found("No check-in record found for today")),
        Err(e) => return Err(e.into()),
    };

    change(&mut record)?;
    record.audit_mut().touch(user.user_id);
    let saved = save_record(&mut *tx, &record).await?;
    tx.commit().await.map_err(DatabaseError::from)?;

    Ok(ApiResponse::success(present(&state.pool, &saved).await?))
}

/// POST /api/hrm/attendance/checkout
pub async fn checkout_post(
    State(state): State<AppState>,
    user: AuthUser,
    OptionalJson(body): OptionalJson<CheckInRequest>,
) -> ApiResult<Value> {
    with_today(&state, &user, body.employee, move |record| {
        check_out(record, Utc::now())?;
        if body.notes.is_some() {
            record.notes = body.notes;
        }
        Ok(())
    })
    .await
}

/// POST /api/hrm/attendance/break/start
pub async fn break_start_post(
    State(state): State<AppState>,
    user: AuthUser,
    OptionalJson(body): OptionalJson<BreakRequest>,
) -> ApiResult<Value> {
    with_today(&state, &user, body.employee, move |record| start_break(record, Utc::now(), body.reason)).await
}

/// POST /api/hrm/attendance/break/end
pub async fn break_end_post(
    State(state): State<AppState>,
    user: AuthUser,
    OptionalJson(body): OptionalJson<BreakRequest>,
) -> ApiResult<Value> {
    with_today(&state, &user, body.employee, |record| end_break(record, Utc::now())).await
}
