/*!
Dashboard and per-student report.

Both load raw records and hand them to `stats`; nothing computed here is
stored.
*/
use axum::extract::Path;
use axum::Extension;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::attendance;
use crate::auth::{AuthContext, PageAuth};
use crate::flash::Incoming;
use crate::models::{AttendanceRecord, Student};
use crate::roster;
use crate::stats::{
    self, DailySummary, FlaggedStudent, MonthlySummary, Standing, Tally,
    LOW_ATTENDANCE_THRESHOLD, ROLLUP_WINDOW_DAYS,
};
use crate::views::PageResult;
use crate::{AppState, Error};

/// Aggregate attendance for every student on the teacher's roster.
pub async fn standings_for(pg: &SqlitePool, teacher_id: Uuid) -> Result<Vec<Standing>, Error> {
    let students = roster::list(pg, teacher_id).await?;
    let entries = attendance::ledger(pg, teacher_id, None, None).await?;
    Ok(stats::standings(
        &students,
        entries.iter().map(|e| (e.student_id, e.status)),
    ))
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub students: Vec<Student>,
    pub daily_stats: Vec<DailySummary>,
    pub low_attendance: Vec<FlaggedStudent>,
}

pub async fn build_dashboard(
    pg: &SqlitePool,
    ctx: &AuthContext,
    today: NaiveDate,
) -> Result<Dashboard, Error> {
    let window_start = today - Duration::days(i64::from(ROLLUP_WINDOW_DAYS) - 1);
    let recent = attendance::ledger(pg, ctx.teacher_id, Some(window_start), Some(today)).await?;
    let standings = standings_for(pg, ctx.teacher_id).await?;

    Ok(Dashboard {
        daily_stats: stats::daily_rollup(&recent, today, ROLLUP_WINDOW_DAYS),
        low_attendance: stats::low_attendance(&standings),
        students: standings.into_iter().map(|s| s.student).collect(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub student: Student,
    pub records: Vec<AttendanceRecord>,
    pub totals: Tally,
    pub attendance_percentage: f64,
    pub monthly: Vec<MonthlySummary>,
}

pub async fn build_student_report(
    pg: &SqlitePool,
    ctx: &AuthContext,
    id: Uuid,
) -> Result<StudentReport, Error> {
    let student = roster::owned(pg, ctx, id).await?;
    let records = attendance::history(pg, id).await?;
    let totals: Tally = records.iter().map(|r| r.status).collect();

    Ok(StudentReport {
        student,
        attendance_percentage: totals.present_percent(),
        monthly: stats::monthly_rollup(&records),
        totals,
        records,
    })
}

pub async fn dashboard(
    PageAuth(ctx): PageAuth,
    Extension(state): Extension<AppState>,
    incoming: Incoming,
) -> PageResult {
    let dashboard = build_dashboard(&state.pool, &ctx, Utc::now().date_naive()).await?;
    Ok(state.views.page(
        "dashboard",
        json!({
            "teacher_name": ctx.teacher_name,
            "threshold": LOW_ATTENDANCE_THRESHOLD,
            "window_days": ROLLUP_WINDOW_DAYS,
            "student_count": dashboard.students.len(),
            "students": dashboard.students,
            "daily_stats": dashboard.daily_stats,
            "low_attendance": dashboard.low_attendance,
        }),
        incoming,
    )?)
}

pub async fn student_report(
    PageAuth(ctx): PageAuth,
    Path(id): Path<Uuid>,
    Extension(state): Extension<AppState>,
    incoming: Incoming,
) -> PageResult {
    let report = build_student_report(&state.pool, &ctx, id).await?;
    let chart_data = serde_json::to_string(&report.monthly).map_err(|e| Error::InternalError {
        kind: "SerializationError",
        message: e.to_string(),
    })?;

    Ok(state.views.page(
        "student_report",
        json!({
            "teacher_name": ctx.teacher_name,
            "low": report.attendance_percentage < LOW_ATTENDANCE_THRESHOLD,
            "chart_data": chart_data,
            "student": report.student,
            "records": report.records,
            "totals": report.totals,
            "attendance_percentage": report.attendance_percentage,
            "monthly": report.monthly,
        }),
        incoming,
    )?)
}
