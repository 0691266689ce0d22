/*!
The attendance ledger: marking, per-date lookups, and the JSON read API.
*/
use std::collections::{HashMap, HashSet};

use axum::extract::Query;
use axum::{Extension, Form};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::alerts::{self, Notifier};
use crate::auth::{AuthContext, PageAuth};
use crate::flash::{self, Flash, Incoming};
use crate::models::{
    parse_date, parse_optional_date, AttendanceRecord, LedgerEntry, Status, Student,
};
use crate::stats::FlaggedStudent;
use crate::views::PageResult;
use crate::{proceeds, roster, AppState, Error, Payload};

/// One student's entry in a marking request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub student_id: Uuid,
    pub status: Status,
    pub remark: Option<String>,
}

impl Submission {
    pub fn new(student_id: Uuid, status: Status, remark: Option<&str>) -> Self {
        Self {
            student_id,
            status,
            remark: normalize_remark(remark),
        }
    }
}

fn normalize_remark(remark: Option<&str>) -> Option<String> {
    remark
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_owned)
}

/// Picks `status_<id>` / `remark_<id>` fields for the roster's students out
/// of a submitted form. Students without a status field are left out.
pub fn submissions_from_form(
    roster: &[Student],
    form: &HashMap<String, String>,
) -> Result<Vec<Submission>, Error> {
    let mut submissions = Vec::new();
    for student in roster {
        let status = match form.get(&format!("status_{}", student.id)) {
            Some(status) => status.parse::<Status>()?,
            None => continue,
        };
        let remark = form.get(&format!("remark_{}", student.id));
        submissions.push(Submission::new(
            student.id,
            status,
            remark.map(String::as_str),
        ));
    }
    Ok(submissions)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub flagged: Vec<FlaggedStudent>,
}

/// Upserts one record per submission for `date`, then runs the alert
/// evaluation once. Nothing is written if any submission names a student
/// outside the teacher's roster.
pub async fn mark(
    pg: &SqlitePool,
    notifier: &dyn Notifier,
    ctx: &AuthContext,
    date: NaiveDate,
    submissions: &[Submission],
) -> Result<MarkOutcome, Error> {
    let roster: HashSet<Uuid> = roster::list(pg, ctx.teacher_id)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    if let Some(stranger) = submissions.iter().find(|s| !roster.contains(&s.student_id)) {
        log::warn!(
            "Teacher {} tried to mark student {} outside their roster.",
            ctx.teacher_id,
            stranger.student_id
        );
        return Err(Error::Forbidden {
            message: "Unauthorized access".to_string(),
        });
    }

    let mut outcome = MarkOutcome::default();
    let mut tx = pg.begin().await?;
    for submission in submissions {
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM attendance WHERE student_id = ? AND date = ? LIMIT 1",
        )
        .bind(submission.student_id)
        .bind(date)
        .fetch_optional(&mut tx)
        .await?;

        match existing {
            Some(id) => {
                sqlx::query("UPDATE attendance SET status = ?, remark = ? WHERE id = ?")
                    .bind(submission.status)
                    .bind(&submission.remark)
                    .bind(id)
                    .execute(&mut tx)
                    .await?;
                outcome.updated += 1;
            }
            None => {
                sqlx::query(
                    "INSERT INTO attendance (id, date, status, student_id, remark)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4())
                .bind(date)
                .bind(submission.status)
                .bind(submission.student_id)
                .bind(&submission.remark)
                .execute(&mut tx)
                .await?;
                outcome.inserted += 1;
            }
        }
    }
    tx.commit().await?;

    log::info!(
        "Teacher {} marked {}: {} new, {} updated.",
        ctx.teacher_id,
        date,
        outcome.inserted,
        outcome.updated
    );

    outcome.flagged = alerts::evaluate(pg, ctx, notifier).await?;
    Ok(outcome)
}

/// The teacher's records on one date.
pub async fn records_on(
    pg: &SqlitePool,
    teacher_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, Error> {
    let records = sqlx::query_as::<_, AttendanceRecord>(
        "SELECT a.id, a.date, a.status, a.student_id, a.remark
         FROM attendance a JOIN students s ON s.id = a.student_id
         WHERE s.teacher_id = ? AND a.date = ?",
    )
    .bind(teacher_id)
    .bind(date)
    .fetch_all(pg)
    .await?;
    Ok(records)
}

/// One student's full history, newest first.
pub async fn history(pg: &SqlitePool, student_id: Uuid) -> Result<Vec<AttendanceRecord>, Error> {
    let records = sqlx::query_as::<_, AttendanceRecord>(
        "SELECT id, date, status, student_id, remark FROM attendance
         WHERE student_id = ? ORDER BY date DESC",
    )
    .bind(student_id)
    .fetch_all(pg)
    .await?;
    Ok(records)
}

/// All of a teacher's records, optionally bounded by inclusive dates.
pub async fn ledger(
    pg: &SqlitePool,
    teacher_id: Uuid,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<LedgerEntry>, Error> {
    let mut sql = String::from(
        "SELECT a.id, a.date, a.student_id, s.name AS student_name, s.roll_number,
                a.status, a.remark
         FROM attendance a JOIN students s ON s.id = a.student_id
         WHERE s.teacher_id = ?",
    );
    if start.is_some() {
        sql.push_str(" AND a.date >= ?");
    }
    if end.is_some() {
        sql.push_str(" AND a.date <= ?");
    }
    sql.push_str(" ORDER BY a.date, s.roll_number");

    let mut query = sqlx::query_as::<_, LedgerEntry>(&sql).bind(teacher_id);
    if let Some(start) = start {
        query = query.bind(start);
    }
    if let Some(end) = end {
        query = query.bind(end);
    }
    Ok(query.fetch_all(pg).await?)
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
struct MarkingRow<'a> {
    student: &'a Student,
    present: bool,
    absent: bool,
    late: bool,
    remark: &'a str,
}

pub async fn attendance_page(
    PageAuth(ctx): PageAuth,
    Query(query): Query<DateQuery>,
    Extension(state): Extension<AppState>,
    incoming: Incoming,
) -> PageResult {
    let today = Utc::now().date_naive();
    let selected = match parse_optional_date(query.date.as_deref()) {
        Ok(date) => date.unwrap_or(today),
        Err(_) => {
            log::debug!("Bad date {:?} on attendance page, using today.", query.date);
            today
        }
    };

    let students = roster::list(&state.pool, ctx.teacher_id).await?;
    let existing: HashMap<Uuid, AttendanceRecord> =
        records_on(&state.pool, ctx.teacher_id, selected)
            .await?
            .into_iter()
            .map(|r| (r.student_id, r))
            .collect();

    let rows: Vec<MarkingRow> = students
        .iter()
        .map(|student| {
            let record = existing.get(&student.id);
            let status = record.map(|r| r.status);
            MarkingRow {
                student,
                present: status == Some(Status::Present),
                absent: status == Some(Status::Absent),
                late: status == Some(Status::Late),
                remark: record.and_then(|r| r.remark.as_deref()).unwrap_or(""),
            }
        })
        .collect();

    Ok(state.views.page(
        "attendance",
        json!({
            "teacher_name": ctx.teacher_name,
            "selected_date": selected,
            "rows": rows,
        }),
        incoming,
    )?)
}

pub async fn mark_attendance(
    PageAuth(ctx): PageAuth,
    Extension(state): Extension<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> PageResult {
    let date = match form.get("date").map(|d| parse_date(d)) {
        Some(Ok(date)) => date,
        Some(Err(err)) => {
            return Ok(flash::redirect("/attendance", Flash::danger(err.message())));
        }
        None => {
            return Ok(flash::redirect(
                "/attendance",
                Flash::danger(Error::invalid_date().message()),
            ));
        }
    };
    let back = format!("/attendance?date={}", date);

    let students = roster::list(&state.pool, ctx.teacher_id).await?;
    let submissions = match submissions_from_form(&students, &form) {
        Ok(submissions) => submissions,
        Err(err) => return Ok(flash::redirect(&back, Flash::danger(err.message()))),
    };

    mark(
        &state.pool,
        state.notifier.as_ref(),
        &ctx,
        date,
        &submissions,
    )
    .await?;

    Ok(flash::redirect(
        &back,
        Flash::success("Attendance marked successfully!"),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttendanceList {
    pub records: Vec<LedgerEntry>,
}

pub async fn api_attendance(
    ctx: AuthContext,
    Query(range): Query<RangeQuery>,
    Extension(state): Extension<AppState>,
) -> Payload<AttendanceList> {
    let start = parse_optional_date(range.start_date.as_deref())?;
    let end = parse_optional_date(range.end_date.as_deref())?;
    let records = ledger(&state.pool, ctx.teacher_id, start, end).await?;
    proceeds(AttendanceList { records })
}
