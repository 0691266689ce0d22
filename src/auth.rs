use axum::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::headers::Cookie;
use axum::response::{IntoResponse, Redirect};
use axum::{Extension, Form, TypedHeader};
use chrono::{Duration, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::flash::{self, AddCookies, Flash, Incoming};
use crate::models::{Teacher, TeacherSession};
use crate::views::{HtmlError, PageResult};
use crate::{AppState, Error};

pub const SESSION_COOKIE: &str = "ssid";

/// Who is making the request. Every handler that touches a roster gets one
/// of these instead of looking at any shared session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub teacher_id: Uuid,
    pub teacher_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Success(AuthContext),
    SessionExpired,
    InvalidSession,
}

async fn session_cookie<B: Send>(req: &mut RequestParts<B>) -> Option<String> {
    TypedHeader::<Cookie>::from_request(req)
        .await
        .ok()
        .and_then(|TypedHeader(cookies)| cookies.get(SESSION_COOKIE).map(str::to_owned))
}

async fn app_state<B: Send>(req: &mut RequestParts<B>) -> Result<AppState, Error> {
    let Extension(state) = Extension::<AppState>::from_request(req)
        .await
        .map_err(|err| Error::InternalError {
            kind: "ExtensionError",
            message: format!("{:?}", err),
        })?;
    Ok(state)
}

#[async_trait]
impl<B> FromRequest<B> for AuthContext
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let state = app_state(req).await?;
        let ssid = session_cookie(req).await;
        match ensure_authenticated(ssid.as_deref(), &state.pool).await? {
            AuthResult::Success(ctx) => Ok(ctx),
            AuthResult::SessionExpired | AuthResult::InvalidSession => {
                Err(Error::unauthorized())
            }
        }
    }
}

/// `AuthContext` for HTML handlers: a missing session sends the browser to
/// the login page instead of answering with JSON.
#[derive(Debug, Clone)]
pub struct PageAuth(pub AuthContext);

#[async_trait]
impl<B> FromRequest<B> for PageAuth
where
    B: Send,
{
    type Rejection = HtmlError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        AuthContext::from_request(req)
            .await
            .map(PageAuth)
            .map_err(HtmlError)
    }
}

pub async fn ensure_authenticated(
    session_id: Option<&str>,
    pg: &SqlitePool,
) -> Result<AuthResult, Error> {
    let ssid = match session_id {
        Some(ssid) if !ssid.is_empty() => ssid,
        _ => return Ok(AuthResult::InvalidSession),
    };

    let session = sqlx::query_as::<_, TeacherSession>(
        "SELECT s.ssid, s.belongs_to, t.name AS teacher_name, s.expires_at
         FROM teacher_sessions s JOIN teachers t ON t.id = s.belongs_to
         WHERE s.ssid = ? LIMIT 1",
    )
    .bind(ssid)
    .fetch_optional(pg)
    .await?;

    let session = match session {
        Some(session) => session,
        None => return Ok(AuthResult::InvalidSession),
    };

    if Utc::now() > session.expires_at {
        sqlx::query("DELETE FROM teacher_sessions WHERE ssid = ?")
            .bind(ssid)
            .execute(pg)
            .await?;
        log::debug!("Session for teacher {} expired.", session.belongs_to);
        return Ok(AuthResult::SessionExpired);
    }

    Ok(AuthResult::Success(AuthContext {
        teacher_id: session.belongs_to,
        teacher_name: session.teacher_name,
    }))
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeacher {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn create_teacher(pg: &SqlitePool, teacher: CreateTeacher) -> Result<Teacher, Error> {
    let name = teacher.name.trim();
    let email = teacher.email.trim();
    if name.is_empty() || email.is_empty() {
        return Err(Error::InvalidPayload {
            message: "Name and email are required".to_string(),
        });
    }
    if teacher.password.is_empty() {
        return Err(Error::MissingCredentials {
            message: "Provided password was empty!".to_string(),
        });
    }

    let existing = sqlx::query_as::<_, Teacher>("SELECT * FROM teachers WHERE email = ? LIMIT 1")
        .bind(email)
        .fetch_optional(pg)
        .await?;
    if existing.is_some() {
        return Err(Error::UserAlreadyExists {
            message: "Email already registered".to_string(),
        });
    }

    let teacher = Teacher {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: hash_password(&teacher.password)?,
        created_at: Utc::now(),
    };

    let res = sqlx::query(
        "INSERT INTO teachers (id, name, email, password_hash, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(teacher.id)
    .bind(&teacher.name)
    .bind(&teacher.email)
    .bind(&teacher.password_hash)
    .bind(teacher.created_at)
    .execute(pg)
    .await?;

    if res.rows_affected() < 1 {
        return Err(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not save data to database!".to_string(),
        });
    }

    log::info!("Registered teacher {} <{}>.", teacher.id, teacher.email);
    Ok(teacher)
}

/// Looks the teacher up by email and checks the password. Both failures give
/// the same answer.
pub async fn verify_credentials(
    pg: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Teacher, Error> {
    let failure = || Error::AuthenticationFailure {
        message: "Invalid email or password".to_string(),
    };

    let teacher = sqlx::query_as::<_, Teacher>("SELECT * FROM teachers WHERE email = ? LIMIT 1")
        .bind(email.trim())
        .fetch_optional(pg)
        .await?
        .ok_or_else(failure)?;

    let hash = PasswordHash::new(&teacher.password_hash)?;
    if Pbkdf2.verify_password(password.as_bytes(), &hash).is_err() {
        return Err(failure());
    }
    Ok(teacher)
}

fn new_session_id() -> String {
    let ssid_bytes: [u8; 32] = thread_rng().gen();

    let mut hasher: Sha256 = Digest::new();
    hasher.update(ssid_bytes);
    hex::encode(hasher.finalize())
}

/// Returns the teacher's live session if there is one, otherwise starts a
/// new one lasting `lifetime`.
pub async fn open_session(
    pg: &SqlitePool,
    teacher: &Teacher,
    lifetime: Duration,
) -> Result<TeacherSession, Error> {
    let now = Utc::now();

    sqlx::query("DELETE FROM teacher_sessions WHERE belongs_to = ? AND expires_at < ?")
        .bind(teacher.id)
        .bind(now)
        .execute(pg)
        .await?;

    let existing = sqlx::query_as::<_, TeacherSession>(
        "SELECT s.ssid, s.belongs_to, t.name AS teacher_name, s.expires_at
         FROM teacher_sessions s JOIN teachers t ON t.id = s.belongs_to
         WHERE s.belongs_to = ? LIMIT 1",
    )
    .bind(teacher.id)
    .fetch_optional(pg)
    .await?;

    if let Some(existing) = existing {
        // already authenticated elsewhere
        return Ok(existing);
    }

    let session = TeacherSession {
        ssid: new_session_id(),
        belongs_to: teacher.id,
        teacher_name: teacher.name.clone(),
        expires_at: now + lifetime,
    };
    sqlx::query("INSERT INTO teacher_sessions (ssid, belongs_to, expires_at) VALUES (?, ?, ?)")
        .bind(&session.ssid)
        .bind(session.belongs_to)
        .bind(session.expires_at)
        .execute(pg)
        .await?;

    Ok(session)
}

pub async fn drop_session(pg: &SqlitePool, ssid: &str) -> Result<bool, Error> {
    let affected = sqlx::query("DELETE FROM teacher_sessions WHERE ssid = ?")
        .bind(ssid)
        .execute(pg)
        .await?;
    Ok(affected.rows_affected() >= 1)
}

fn set_session_cookie(session: &TeacherSession) -> String {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session.ssid, max_age
    )
}

fn clear_session_cookie() -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", SESSION_COOKIE)
}

pub async fn index(
    auth: Option<AuthContext>,
    Extension(state): Extension<AppState>,
    incoming: Incoming,
) -> PageResult {
    if auth.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    Ok(state.views.page("login", json!({}), incoming)?)
}

pub async fn login_page(
    Extension(state): Extension<AppState>,
    incoming: Incoming,
) -> PageResult {
    Ok(state.views.page("login", json!({}), incoming)?)
}

pub async fn register_page(
    Extension(state): Extension<AppState>,
    incoming: Incoming,
) -> PageResult {
    Ok(state.views.page("register", json!({}), incoming)?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

pub async fn login(
    Extension(state): Extension<AppState>,
    Form(form): Form<LoginForm>,
) -> PageResult {
    let teacher = match verify_credentials(&state.pool, &form.email, &form.password).await {
        Ok(teacher) => teacher,
        Err(err @ Error::AuthenticationFailure { .. }) => {
            log::debug!("Failed login for {:?}.", form.email);
            return Ok(flash::redirect("/login", Flash::danger(err.message())));
        }
        Err(err) => return Err(err.into()),
    };

    let session = open_session(&state.pool, &teacher, state.session_lifetime).await?;
    log::info!("Teacher {} logged in.", teacher.id);

    Ok(Redirect::to("/dashboard").add_cookies([
        set_session_cookie(&session),
        Flash::success("Login successful!").set_cookie(),
    ]))
}

pub async fn register(
    Extension(state): Extension<AppState>,
    Form(form): Form<CreateTeacher>,
) -> PageResult {
    match create_teacher(&state.pool, form).await {
        Ok(_) => Ok(flash::redirect(
            "/login",
            Flash::success("Registration successful! Please login."),
        )),
        Err(
            err @ (Error::UserAlreadyExists { .. }
            | Error::MissingCredentials { .. }
            | Error::InvalidPayload { .. }),
        ) => Ok(flash::redirect("/register", Flash::danger(err.message()))),
        Err(err) => Err(err.into()),
    }
}

pub async fn logout(
    Extension(state): Extension<AppState>,
    cookies: Option<TypedHeader<Cookie>>,
) -> PageResult {
    if let Some(ssid) = cookies.as_ref().and_then(|c| c.get(SESSION_COOKIE)) {
        if drop_session(&state.pool, ssid).await? {
            log::info!("Session dropped on logout.");
        }
    }

    Ok(Redirect::to("/login").add_cookies([
        clear_session_cookie(),
        Flash::info("You have been logged out").set_cookie(),
    ]))
}
