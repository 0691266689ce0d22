pub mod alerts;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod err;
pub mod export;
pub mod flash;
pub mod models;
pub mod reports;
pub mod roster;
pub mod stats;
pub mod store;
pub mod views;

use std::sync::Arc;

use axum::handler::Handler;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Duration;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::alerts::Notifier;
use crate::err::{Fine, Success};
use crate::views::Views;

pub use crate::err::Error;

pub type Payload<T> = axum::response::Result<Json<Success<T>>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(Fine(value)))
}

/// Everything a request handler may need, handed out through an
/// `axum::Extension`.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub views: Arc<Views>,
    pub notifier: Arc<dyn Notifier>,
    pub session_lifetime: Duration,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        views: Views,
        notifier: Arc<dyn Notifier>,
        session_lifetime: Duration,
    ) -> Self {
        Self {
            pool,
            views: Arc::new(views),
            notifier,
            session_lifetime,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(auth::index))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout))
        .route("/dashboard", get(reports::dashboard))
        .route("/students", get(roster::students_page))
        .route(
            "/add_student",
            get(roster::add_student_page).post(roster::add_student),
        )
        .route(
            "/edit_student/:id",
            get(roster::edit_student_page).post(roster::edit_student),
        )
        .route("/delete_student/:id", post(roster::delete_student))
        .route("/attendance", get(attendance::attendance_page))
        .route("/mark_attendance", post(attendance::mark_attendance))
        .route("/student_report/:id", get(reports::student_report))
        .route("/api/attendance", get(attendance::api_attendance))
        .route("/export_attendance", get(export::export_attendance))
        .fallback(err::handler404.into_service())
        .layer(Extension(state))
}
