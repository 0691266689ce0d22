#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use attendance_server::alerts::Notifier;
use attendance_server::auth::{self, AuthContext, CreateTeacher};
use attendance_server::models::Student;
use attendance_server::roster::{self, StudentForm};
use attendance_server::stats::FlaggedStudent;
use attendance_server::views::Views;
use attendance_server::{router, store, AppState};
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use chrono::{Duration, NaiveDate};
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery staple";

pub async fn pool() -> SqlitePool {
    let pool = store::connect_in_memory().await.expect("open in-memory db");
    store::ensure_schema(&pool).await.expect("create schema");
    pool
}

pub fn email_for(name: &str) -> String {
    format!("{}@school.test", name.to_lowercase())
}

pub async fn teacher(pool: &SqlitePool, name: &str) -> AuthContext {
    let teacher = auth::create_teacher(
        pool,
        CreateTeacher {
            name: name.to_string(),
            email: email_for(name),
            password: PASSWORD.to_string(),
        },
    )
    .await
    .expect("create teacher");
    AuthContext {
        teacher_id: teacher.id,
        teacher_name: teacher.name,
    }
}

pub async fn student(pool: &SqlitePool, ctx: &AuthContext, name: &str, roll: &str) -> Student {
    roster::add(
        pool,
        ctx,
        StudentForm {
            name: name.to_string(),
            roll_number: roll.to_string(),
            email: email_for(name),
        },
    )
    .await
    .expect("add student")
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Keeps every batch of alerts it is handed.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<Vec<FlaggedStudent>>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<Vec<FlaggedStudent>> {
        self.calls.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _teacher: &AuthContext, flagged: &[FlaggedStudent]) {
        self.calls
            .lock()
            .expect("notifier lock")
            .push(flagged.to_vec());
    }
}

pub fn app(pool: &SqlitePool, notifier: Arc<dyn Notifier>) -> Router {
    let state = AppState::new(
        pool.clone(),
        Views::new().expect("compile templates"),
        notifier,
        Duration::days(5),
    );
    router(state)
}

pub async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("router is infallible")
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("build request")
}

pub fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub async fn body_string(response: Response) -> String {
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).expect("json body")
}

/// `name=value` of the first `Set-Cookie` header for `name`.
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .and_then(|v| v.split(';').next())
        .map(str::to_owned)
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
