/*!
A teacher's students.

Every lookup goes through the acting teacher, so a student owned by someone
else is reported as `Forbidden` rather than handed out.
*/
use axum::extract::Path;
use axum::{Extension, Form};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::{AuthContext, PageAuth};
use crate::flash::{self, Flash, Incoming};
use crate::models::Student;
use crate::views::PageResult;
use crate::{AppState, Error};

pub async fn list(pg: &SqlitePool, teacher_id: Uuid) -> Result<Vec<Student>, Error> {
    let students = sqlx::query_as::<_, Student>(
        "SELECT * FROM students WHERE teacher_id = ? ORDER BY roll_number, name",
    )
    .bind(teacher_id)
    .fetch_all(pg)
    .await?;
    Ok(students)
}

/// The student with `id`, provided it belongs to the acting teacher.
pub async fn owned(pg: &SqlitePool, ctx: &AuthContext, id: Uuid) -> Result<Student, Error> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pg)
        .await?
        .ok_or_else(|| Error::NotFound {
            message: format!("Student `{}` does not exist!", id),
        })?;

    if student.teacher_id != ctx.teacher_id {
        log::warn!(
            "Teacher {} tried to access student {} owned by {}.",
            ctx.teacher_id,
            id,
            student.teacher_id
        );
        return Err(Error::Forbidden {
            message: "Unauthorized access".to_string(),
        });
    }
    Ok(student)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentForm {
    pub name: String,
    pub roll_number: String,
    pub email: String,
}

impl StudentForm {
    fn validated(self) -> Result<StudentForm, Error> {
        let form = StudentForm {
            name: self.name.trim().to_string(),
            roll_number: self.roll_number.trim().to_string(),
            email: self.email.trim().to_string(),
        };
        if form.name.is_empty() || form.roll_number.is_empty() || form.email.is_empty() {
            return Err(Error::InvalidPayload {
                message: "Name, roll number and email are required".to_string(),
            });
        }
        Ok(form)
    }
}

pub async fn add(pg: &SqlitePool, ctx: &AuthContext, form: StudentForm) -> Result<Student, Error> {
    let form = form.validated()?;
    let student = Student {
        id: Uuid::new_v4(),
        name: form.name,
        roll_number: form.roll_number,
        email: form.email,
        teacher_id: ctx.teacher_id,
    };

    sqlx::query(
        "INSERT INTO students (id, name, roll_number, email, teacher_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(student.id)
    .bind(&student.name)
    .bind(&student.roll_number)
    .bind(&student.email)
    .bind(student.teacher_id)
    .execute(pg)
    .await?;

    log::info!("Teacher {} added student {}.", ctx.teacher_id, student.id);
    Ok(student)
}

/// Updates the profile fields. The owning teacher never changes.
pub async fn update(
    pg: &SqlitePool,
    ctx: &AuthContext,
    id: Uuid,
    form: StudentForm,
) -> Result<Student, Error> {
    let mut student = owned(pg, ctx, id).await?;
    let form = form.validated()?;

    sqlx::query("UPDATE students SET name = ?, roll_number = ?, email = ? WHERE id = ?")
        .bind(&form.name)
        .bind(&form.roll_number)
        .bind(&form.email)
        .bind(id)
        .execute(pg)
        .await?;

    student.name = form.name;
    student.roll_number = form.roll_number;
    student.email = form.email;
    Ok(student)
}

/// Deletes the student and every attendance record they own, in one
/// transaction. Returns how many attendance records went with them.
pub async fn delete(pg: &SqlitePool, ctx: &AuthContext, id: Uuid) -> Result<u64, Error> {
    owned(pg, ctx, id).await?;

    let mut tx = pg.begin().await?;
    let records = sqlx::query("DELETE FROM attendance WHERE student_id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM students WHERE id = ? AND teacher_id = ?")
        .bind(id)
        .bind(ctx.teacher_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;

    log::info!(
        "Teacher {} deleted student {} with {} attendance records.",
        ctx.teacher_id,
        id,
        records
    );
    Ok(records)
}

pub async fn students_page(
    PageAuth(ctx): PageAuth,
    Extension(state): Extension<AppState>,
    incoming: Incoming,
) -> PageResult {
    let students = list(&state.pool, ctx.teacher_id).await?;
    Ok(state.views.page(
        "students",
        json!({
            "teacher_name": ctx.teacher_name,
            "students": students,
        }),
        incoming,
    )?)
}

pub async fn add_student_page(
    PageAuth(ctx): PageAuth,
    Extension(state): Extension<AppState>,
    incoming: Incoming,
) -> PageResult {
    Ok(state.views.page(
        "student_form",
        json!({
            "teacher_name": ctx.teacher_name,
            "heading": "Add student",
            "action": "/add_student",
            "student": StudentForm::default(),
        }),
        incoming,
    )?)
}

pub async fn add_student(
    PageAuth(ctx): PageAuth,
    Extension(state): Extension<AppState>,
    Form(form): Form<StudentForm>,
) -> PageResult {
    match add(&state.pool, &ctx, form).await {
        Ok(_) => Ok(flash::redirect(
            "/students",
            Flash::success("Student added successfully!"),
        )),
        Err(err @ Error::InvalidPayload { .. }) => {
            Ok(flash::redirect("/add_student", Flash::danger(err.message())))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn edit_student_page(
    PageAuth(ctx): PageAuth,
    Path(id): Path<Uuid>,
    Extension(state): Extension<AppState>,
    incoming: Incoming,
) -> PageResult {
    let student = owned(&state.pool, &ctx, id).await?;
    Ok(state.views.page(
        "student_form",
        json!({
            "teacher_name": ctx.teacher_name,
            "heading": "Edit student",
            "action": format!("/edit_student/{}", id),
            "student": student,
        }),
        incoming,
    )?)
}

pub async fn edit_student(
    PageAuth(ctx): PageAuth,
    Path(id): Path<Uuid>,
    Extension(state): Extension<AppState>,
    Form(form): Form<StudentForm>,
) -> PageResult {
    match update(&state.pool, &ctx, id, form).await {
        Ok(_) => Ok(flash::redirect(
            "/students",
            Flash::success("Student updated successfully!"),
        )),
        Err(err @ Error::InvalidPayload { .. }) => Ok(flash::redirect(
            &format!("/edit_student/{}", id),
            Flash::danger(err.message()),
        )),
        Err(err) => Err(err.into()),
    }
}

pub async fn delete_student(
    PageAuth(ctx): PageAuth,
    Path(id): Path<Uuid>,
    Extension(state): Extension<AppState>,
) -> PageResult {
    delete(&state.pool, &ctx, id).await?;
    Ok(flash::redirect(
        "/students",
        Flash::success("Student deleted successfully!"),
    ))
}
