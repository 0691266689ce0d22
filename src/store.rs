/*!
Database connection and schema.

```sql
CREATE TABLE teachers (
    id            BLOB PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE students (
    id          BLOB PRIMARY KEY,
    name        TEXT NOT NULL,
    roll_number TEXT NOT NULL,
    email       TEXT NOT NULL,
    teacher_id  BLOB NOT NULL REFERENCES teachers(id)
);

CREATE TABLE attendance (
    id         BLOB PRIMARY KEY,
    date       TEXT NOT NULL,     /* YYYY-MM-DD */
    status     TEXT NOT NULL,     /* Present, Absent, Late */
    student_id BLOB NOT NULL REFERENCES students(id),
    remark     TEXT
);
```

`attendance (student_id, date)` has no unique constraint. Marking keeps one
row per pair itself.
*/
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

static SCHEMA: &[(&str, &str)] = &[
    (
        "teachers",
        "CREATE TABLE IF NOT EXISTS teachers (
            id            BLOB PRIMARY KEY,
            name          TEXT NOT NULL,
            email         TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at    TEXT NOT NULL
        )",
    ),
    (
        "teacher_sessions",
        "CREATE TABLE IF NOT EXISTS teacher_sessions (
            ssid       TEXT PRIMARY KEY,
            belongs_to BLOB NOT NULL REFERENCES teachers(id),
            expires_at TEXT NOT NULL
        )",
    ),
    (
        "students",
        "CREATE TABLE IF NOT EXISTS students (
            id          BLOB PRIMARY KEY,
            name        TEXT NOT NULL,
            roll_number TEXT NOT NULL,
            email       TEXT NOT NULL,
            teacher_id  BLOB NOT NULL REFERENCES teachers(id)
        )",
    ),
    (
        "attendance",
        "CREATE TABLE IF NOT EXISTS attendance (
            id         BLOB PRIMARY KEY,
            date       TEXT NOT NULL,
            status     TEXT NOT NULL,
            student_id BLOB NOT NULL REFERENCES students(id),
            remark     TEXT
        )",
    ),
    (
        "attendance_student_date",
        "CREATE INDEX IF NOT EXISTS attendance_student_date
            ON attendance (student_id, date)",
    ),
    (
        "students_teacher",
        "CREATE INDEX IF NOT EXISTS students_teacher ON students (teacher_id)",
    ),
];

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// A private database living as long as the returned pool. Pinned to a single
/// connection that never idles out, otherwise the data would vanish.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Creates every table and index that doesn't exist yet.
pub async fn ensure_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    for (name, statement) in SCHEMA {
        log::trace!("Ensuring {} exists...", name);
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            anyhow::anyhow!("Unable to ensure {} in database: {}", name, e)
        })?;
    }
    log::debug!("Database schema OK ({} objects).", SCHEMA.len());
    Ok(())
}
