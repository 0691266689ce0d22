//! Low-attendance alerts.

use sqlx::SqlitePool;

use crate::auth::AuthContext;
use crate::reports;
use crate::stats::{self, FlaggedStudent, LOW_ATTENDANCE_THRESHOLD};
use crate::Error;

/// Receives the students flagged for a teacher. Delivery is entirely up to
/// the implementation.
pub trait Notifier: Send + Sync {
    fn notify(&self, teacher: &AuthContext, flagged: &[FlaggedStudent]);
}

/// Writes alerts to the log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, teacher: &AuthContext, flagged: &[FlaggedStudent]) {
        log::warn!(
            "Alert for {}: {} students have attendance below {}%",
            teacher.teacher_name,
            flagged.len(),
            LOW_ATTENDANCE_THRESHOLD
        );
        for student in flagged {
            log::warn!(
                "Student: {}, Email: {}, Attendance: {}%",
                student.name,
                student.email,
                student.percentage
            );
        }
    }
}

/// Recomputes the teacher's low-attendance list and passes it on when it
/// isn't empty.
pub async fn evaluate(
    pg: &SqlitePool,
    ctx: &AuthContext,
    notifier: &dyn Notifier,
) -> Result<Vec<FlaggedStudent>, Error> {
    let standings = reports::standings_for(pg, ctx.teacher_id).await?;
    let flagged = stats::low_attendance(&standings);
    if !flagged.is_empty() {
        notifier.notify(ctx, &flagged);
    }
    Ok(flagged)
}
