use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::error::ApiError;
use crate::models::attendance::{Attendance, AttendanceStatus, BreakEntry};

/// `late` once the check-in falls after the work start plus the grace period.
pub fn arrival_status(check_in: DateTime<Utc>, work_start: NaiveTime, grace_minutes: i64) -> AttendanceStatus {
    let deadline = check_in.date_naive().and_time(work_start).and_utc() + Duration::minutes(grace_minutes.max(0));
    if check_in > deadline {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Fills `durationMinutes` on closed breaks and rejects breaks that end before they start.
pub fn normalize_breaks(breaks: &mut [BreakEntry]) -> Result<(), ApiError> {
    for entry in breaks.iter_mut() {
        match entry.end {
            Some(end) if end < entry.start => {
                return Err(ApiError::invalid_field("Break end must be after its start"));
            }
            Some(end) => entry.duration_minutes = Some((end - entry.start).num_minutes()),
            None => entry.duration_minutes = None,
        }
    }
    Ok(())
}

/// Minutes between check-in and check-out, less closed breaks. Never negative.
pub fn worked_minutes(check_in: DateTime<Utc>, check_out: DateTime<Utc>, breaks: &[BreakEntry]) -> i64 {
    let gross = (check_out - check_in).num_minutes();
    let paused: i64 = breaks.iter().filter_map(|b| b.duration_minutes).sum();
    (gross - paused).max(0)
}

fn ensure_open_day(record: &Attendance) -> Result<(), ApiError> {
    if record.check_out.is_some() {
        return Err(ApiError::invalid_state("Already checked out today"));
    }
    Ok(())
}

/// Closes the day; an open break ends at check-out.
pub fn check_out(record: &mut Attendance, at: DateTime<Utc>) -> Result<(), ApiError> {
    ensure_open_day(record)?;
    if let Some(open) = record.breaks.0.iter_mut().find(|b| b.is_open()) {
        open.end = Some(at);
    }
    normalize_breaks(&mut record.breaks.0)?;
    record.check_out = Some(at);
    record.work_minutes = record
        .check_in
        .map(|start| worked_minutes(start, at, &record.breaks.0));
    Ok(())
}

pub fn start_break(record: &mut Attendance, at: DateTime<Utc>, reason: Option<String>) -> Result<(), ApiError> {
    ensure_open_day(record)?;
    if record.breaks.0.iter().any(BreakEntry::is_open) {
        return Err(ApiError::invalid_state("A break is already in progress"));
    }
    record.breaks.0.push(BreakEntry {
        start: at,
        end: None,
        duration_minutes: None,
        reason,
    });
    Ok(())
}

pub fn end_break(record: &mut Attendance, at: DateTime<Utc>) -> Result<(), ApiError> {
    ensure_open_day(record)?;
    let open = record
        .breaks
        .0
        .iter_mut()
        .find(|b| b.is_open())
        .ok_or_else(|| ApiError::invalid_state("No break in progress"))?;
    open.end = Some(at);
    normalize_breaks(&mut record.breaks.0)
}
