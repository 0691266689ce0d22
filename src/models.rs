use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Teacher {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub roll_number: String,
    pub email: String,
    pub teacher_id: Uuid,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(rename_all = "PascalCase")]
pub enum Status {
    Present,
    Absent,
    Late,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "Present",
            Status::Absent => "Absent",
            Status::Late => "Late",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Present" => Ok(Status::Present),
            "Absent" => Ok(Status::Absent),
            "Late" => Ok(Status::Late),
            other => Err(Error::InvalidPayload {
                message: format!("Unknown attendance status `{}`", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub status: Status,
    pub student_id: Uuid,
    pub remark: Option<String>,
}

/// An attendance record joined with the student it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub student_id: Uuid,
    pub student_name: String,
    pub roll_number: String,
    pub status: Status,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeacherSession {
    pub ssid: String,
    pub belongs_to: Uuid,
    pub teacher_name: String,
    pub expires_at: DateTime<Utc>,
}

pub const DATE_FMT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` date. Callers decide whether a failure falls back
/// to some default or is reported.
pub fn parse_date(s: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(s.trim(), DATE_FMT).map_err(|_| Error::invalid_date())
}

/// `None` for a missing or blank parameter, otherwise the parsed date.
pub fn parse_optional_date(s: Option<&str>) -> Result<Option<NaiveDate>, Error> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s).map(Some),
    }
}
