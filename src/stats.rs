//! Attendance aggregation.
//!
//! Everything here works on records that were already loaded from the
//! ledger. Nothing is cached and nothing is written back; empty input gives
//! zeroed statistics.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{AttendanceRecord, LedgerEntry, Status, Student};

/// Students strictly below this percentage are flagged.
pub const LOW_ATTENDANCE_THRESHOLD: f64 = 75.0;

/// Length of the dashboard's trailing window, today included.
pub const ROLLUP_WINDOW_DAYS: u32 = 7;

/// Two decimals, exact halves going to the even neighbour.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// `part / total * 100` to two decimals, or `0` when there is nothing to
/// divide by.
pub fn percent(part: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(f64::from(part) / f64::from(total) * 100.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: u32,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
}

impl Tally {
    pub fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Present => self.present += 1,
            Status::Absent => self.absent += 1,
            Status::Late => self.late += 1,
        }
    }

    pub fn present_percent(&self) -> f64 {
        percent(self.present, self.total)
    }

    pub fn absent_percent(&self) -> f64 {
        percent(self.absent, self.total)
    }

    pub fn late_percent(&self) -> f64 {
        percent(self.late, self.total)
    }
}

impl FromIterator<Status> for Tally {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        let mut tally = Tally::default();
        for status in iter {
            tally.record(status);
        }
        tally
    }
}

/// Anything carrying a date and a status can be rolled up.
pub trait Dated {
    fn date(&self) -> NaiveDate;
    fn status(&self) -> Status;
}

impl Dated for AttendanceRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn status(&self) -> Status {
        self.status
    }
}

impl Dated for LedgerEntry {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn status(&self) -> Status {
        self.status
    }
}

impl Dated for (NaiveDate, Status) {
    fn date(&self) -> NaiveDate {
        self.0
    }

    fn status(&self) -> Status {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub tally: Tally,
    pub present_percent: f64,
}

/// One summary per day of the window ending at `today`, most recent first.
/// Records outside the window are ignored.
pub fn daily_rollup<'a, R, I>(records: I, today: NaiveDate, days: u32) -> Vec<DailySummary>
where
    R: Dated + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut per_day: HashMap<NaiveDate, Tally> = HashMap::new();
    for record in records {
        per_day.entry(record.date()).or_default().record(record.status());
    }

    (0..days)
        .map(|offset| {
            let date = today - Duration::days(i64::from(offset));
            let tally = per_day.get(&date).copied().unwrap_or_default();
            DailySummary {
                date,
                present_percent: tally.present_percent(),
                tally,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// `YYYY-MM`
    pub month: String,
    #[serde(flatten)]
    pub tally: Tally,
    pub present_percent: f64,
    pub absent_percent: f64,
    pub late_percent: f64,
}

/// Groups records by calendar month, oldest month first.
pub fn monthly_rollup<'a, R, I>(records: I) -> Vec<MonthlySummary>
where
    R: Dated + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut per_month: BTreeMap<(i32, u32), Tally> = BTreeMap::new();
    for record in records {
        let date = record.date();
        per_month
            .entry((date.year(), date.month()))
            .or_default()
            .record(record.status());
    }

    per_month
        .into_iter()
        .map(|((year, month), tally)| MonthlySummary {
            month: format!("{:04}-{:02}", year, month),
            present_percent: tally.present_percent(),
            absent_percent: tally.absent_percent(),
            late_percent: tally.late_percent(),
            tally,
        })
        .collect()
}

/// A student together with their aggregate attendance.
#[derive(Debug, Clone, Serialize)]
pub struct Standing {
    pub student: Student,
    #[serde(flatten)]
    pub tally: Tally,
    pub percentage: f64,
}

impl Standing {
    pub fn is_low(&self) -> bool {
        self.percentage < LOW_ATTENDANCE_THRESHOLD
    }
}

/// Computes one standing per student, in roster order. Records belonging to
/// students not on the roster are ignored.
pub fn standings<I>(roster: &[Student], records: I) -> Vec<Standing>
where
    I: IntoIterator<Item = (Uuid, Status)>,
{
    let mut per_student: HashMap<Uuid, Tally> = HashMap::new();
    for (student_id, status) in records {
        per_student.entry(student_id).or_default().record(status);
    }

    roster
        .iter()
        .map(|student| {
            let tally = per_student.get(&student.id).copied().unwrap_or_default();
            Standing {
                student: student.clone(),
                percentage: tally.present_percent(),
                tally,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedStudent {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub percentage: f64,
}

pub fn low_attendance(standings: &[Standing]) -> Vec<FlaggedStudent> {
    standings
        .iter()
        .filter(|s| s.is_low())
        .map(|s| FlaggedStudent {
            id: s.student.id,
            name: s.student.name.clone(),
            email: s.student.email.clone(),
            percentage: s.percentage,
        })
        .collect()
}
