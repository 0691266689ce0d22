//! Downloadable per-student attendance summaries.

use std::str::FromStr;

use axum::extract::Query;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Extension;
use serde::Deserialize;

use crate::auth::PageAuth;
use crate::flash::{self, Flash};
use crate::reports;
use crate::stats::Standing;
use crate::views::PageResult;
use crate::{AppState, Error};

pub const CSV_HEADER: &str =
    "Student Name,Roll Number,Email,Total Days,Present,Absent,Late,Attendance %\n";

pub const CSV_FILENAME: &str = "attendance_report.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "csv" => Ok(Format::Csv),
            other => Err(Error::UnsupportedFormat {
                message: format!("{} export is not available", other.to_uppercase()),
            }),
        }
    }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// One row per student, in the order given.
pub fn to_csv(standings: &[Standing]) -> String {
    let mut csv = String::from(CSV_HEADER);
    for standing in standings {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{:?}\n",
            csv_quote(&standing.student.name),
            csv_quote(&standing.student.roll_number),
            csv_quote(&standing.student.email),
            standing.tally.total,
            standing.tally.present,
            standing.tally.absent,
            standing.tally.late,
            standing.percentage
        ));
    }
    csv
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

pub async fn export_attendance(
    PageAuth(ctx): PageAuth,
    Query(query): Query<ExportQuery>,
    Extension(state): Extension<AppState>,
) -> PageResult {
    let format = match query.format.as_deref().unwrap_or("csv").parse::<Format>() {
        Ok(format) => format,
        Err(err) => {
            log::debug!("Rejected export format {:?}.", query.format);
            return Ok(flash::redirect("/dashboard", Flash::warning(err.message())));
        }
    };

    let standings = reports::standings_for(&state.pool, ctx.teacher_id).await?;
    log::info!(
        "Teacher {} exported {} students as {:?}.",
        ctx.teacher_id,
        standings.len(),
        format
    );

    match format {
        Format::Csv => Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", CSV_FILENAME),
                ),
            ],
            to_csv(&standings),
        )
            .into_response()),
    }
}
