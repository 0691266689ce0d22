mod common;

use std::sync::Arc;

use attendance_server::alerts::LogNotifier;
use attendance_server::attendance::{self, Submission};
use attendance_server::auth;
use attendance_server::flash::{Flash, FLASH_COOKIE};
use attendance_server::models::Status;
use axum::http::{header, StatusCode};
use chrono::Duration;
use common::*;

async fn logged_in(app: &axum::Router, name: &str) -> String {
    let response = send(
        app,
        post_form(
            "/login",
            &format!(
                "email={}&password={}",
                email_for(name).replace('@', "%40"),
                PASSWORD.replace(' ', "+")
            ),
            None,
        ),
    )
    .await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/dashboard");
    set_cookie(&response, auth::SESSION_COOKIE).expect("session cookie")
}

#[tokio::test]
async fn api_without_session_is_unauthorized_json() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));

    let response = send(&app, get("/api/attendance", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unauthorized");

    let response = send(&app, get("/api/attendance", Some("ssid=deadbeef"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pages_without_session_redirect_to_login_with_a_message() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));

    for uri in ["/dashboard", "/students", "/attendance", "/export_attendance"] {
        let response = send(&app, get(uri, None)).await;
        assert!(response.status().is_redirection(), "{}", uri);
        assert_eq!(location(&response), "/login", "{}", uri);
        let flash = set_cookie(&response, FLASH_COOKIE).expect("flash cookie");
        let value = flash.trim_start_matches("flash=");
        assert_eq!(
            Flash::decode(value),
            Some(Flash::danger("Please login first"))
        );
    }
}

#[tokio::test]
async fn register_then_login_then_read_records_through_the_api() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));

    let response = send(
        &app,
        post_form(
            "/register",
            "name=Grace+Hopper&email=hopper%40school.test&password=correct+horse+battery+staple",
            None,
        ),
    )
    .await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/login");

    let again = send(
        &app,
        post_form(
            "/register",
            "name=Impostor&email=hopper%40school.test&password=x",
            None,
        ),
    )
    .await;
    assert_eq!(location(&again), "/register");

    let cookie = logged_in(&app, "Hopper").await;
    let teacher = auth::verify_credentials(&pool, "hopper@school.test", PASSWORD)
        .await
        .expect("registered teacher");
    let ctx = auth::AuthContext {
        teacher_id: teacher.id,
        teacher_name: teacher.name.clone(),
    };
    let ada = student(&pool, &ctx, "Ada", "01").await;
    for (d, status) in [(1, Status::Present), (2, Status::Late), (3, Status::Absent)] {
        attendance::mark(
            &pool,
            &LogNotifier,
            &ctx,
            day(2024, 9, d),
            &[Submission::new(ada.id, status, Some("note"))],
        )
        .await
        .expect("mark");
    }

    let response = send(&app, get("/api/attendance", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["records"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["records"][0]["date"], "2024-09-01");
    assert_eq!(body["records"][0]["student_name"], "Ada");
    assert_eq!(body["records"][0]["roll_number"], "01");
    assert_eq!(body["records"][0]["status"], "Present");
    assert_eq!(body["records"][0]["remark"], "note");

    let response = send(
        &app,
        get(
            "/api/attendance?start_date=2024-09-02&end_date=2024-09-02",
            Some(&cookie),
        ),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["records"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["records"][0]["status"], "Late");

    let response = send(&app, get("/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("Grace Hopper"));
    assert!(html.contains("Ada"));
}

#[tokio::test]
async fn wrong_password_does_not_open_a_session() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));
    teacher(&pool, "Hopper").await;

    let response = send(
        &app,
        post_form(
            "/login",
            "email=hopper%40school.test&password=guess",
            None,
        ),
    )
    .await;
    assert_eq!(location(&response), "/login");
    assert!(set_cookie(&response, auth::SESSION_COOKIE).is_none());

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teacher_sessions")
        .fetch_one(&pool)
        .await
        .expect("count sessions");
    assert_eq!(sessions, 0);
}

#[tokio::test]
async fn api_rejects_malformed_dates_with_a_structured_error() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));
    teacher(&pool, "Hopper").await;
    let cookie = logged_in(&app, "Hopper").await;

    let response = send(
        &app,
        get("/api/attendance?start_date=09/01/2024", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "InvalidDate");
    assert_eq!(body["message"], "Invalid date format. Use YYYY-MM-DD");
}

#[tokio::test]
async fn attendance_page_falls_back_to_today_on_a_bad_date() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));
    teacher(&pool, "Hopper").await;
    let cookie = logged_in(&app, "Hopper").await;

    let response = send(&app, get("/attendance?date=not-a-date", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    let today = chrono::Utc::now().date_naive().to_string();
    assert!(html.contains(&today));
}

#[tokio::test]
async fn marking_form_upserts_and_redirects_back_to_the_date() {
    let pool = pool().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let app = app(&pool, notifier.clone());
    let ctx = teacher(&pool, "Hopper").await;
    let ada = student(&pool, &ctx, "Ada", "01").await;
    let cookie = logged_in(&app, "Hopper").await;

    for status in ["Absent", "Present"] {
        let response = send(
            &app,
            post_form(
                "/mark_attendance",
                &format!("date=2024-03-04&status_{}={}&remark_{}=", ada.id, status, ada.id),
                Some(&cookie),
            ),
        )
        .await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/attendance?date=2024-03-04");
    }

    let records = attendance::records_on(&pool, ctx.teacher_id, day(2024, 3, 4))
        .await
        .expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, Status::Present);
    assert_eq!(records[0].remark, None);

    // first submission flags Ada at 0%, the second brings her to 100%
    assert_eq!(notifier.calls().len(), 1);

    let response = send(
        &app,
        post_form(
            "/mark_attendance",
            &format!("date=2024-03-04&status_{}=Sick", ada.id),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&response), "/attendance?date=2024-03-04");
    let records = attendance::records_on(&pool, ctx.teacher_id, day(2024, 3, 4))
        .await
        .expect("records");
    assert_eq!(records[0].status, Status::Present);
}

#[tokio::test]
async fn csv_export_downloads_and_other_formats_warn() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));
    let ctx = teacher(&pool, "Hopper").await;
    student(&pool, &ctx, "Ada", "01").await;
    let cookie = logged_in(&app, "Hopper").await;

    let response = send(&app, get("/export_attendance?format=csv", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("attendance_report.csv"));
    let csv = body_string(response).await;
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.starts_with("Student Name,Roll Number"));

    let response = send(&app, get("/export_attendance?format=pdf", Some(&cookie))).await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/dashboard");
    let flash = set_cookie(&response, FLASH_COOKIE).expect("flash cookie");
    assert_eq!(
        Flash::decode(flash.trim_start_matches("flash=")),
        Some(Flash::warning("PDF export is not available"))
    );
}

#[tokio::test]
async fn someone_elses_student_pages_redirect_to_the_roster() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));
    let lamport = teacher(&pool, "Lamport").await;
    let eve = student(&pool, &lamport, "Eve", "01").await;
    teacher(&pool, "Hopper").await;
    let cookie = logged_in(&app, "Hopper").await;

    let response = send(&app, get(&format!("/student_report/{}", eve.id), Some(&cookie))).await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/students");

    let response = send(
        &app,
        post_form(&format!("/delete_student/{}", eve.id), "", Some(&cookie)),
    )
    .await;
    assert_eq!(location(&response), "/students");

    let response = send(
        &app,
        get(&format!("/student_report/{}", uuid::Uuid::new_v4()), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_sessions_are_rejected_and_removed() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));
    teacher(&pool, "Hopper").await;
    let teacher = auth::verify_credentials(&pool, "hopper@school.test", PASSWORD)
        .await
        .expect("teacher");

    let session = auth::open_session(&pool, &teacher, Duration::seconds(-5))
        .await
        .expect("session");
    let result = auth::ensure_authenticated(Some(&session.ssid), &pool)
        .await
        .expect("lookup");
    assert_eq!(result, auth::AuthResult::SessionExpired);

    let response = send(
        &app,
        get("/api/attendance", Some(&format!("ssid={}", session.ssid))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teacher_sessions")
        .fetch_one(&pool)
        .await
        .expect("count sessions");
    assert_eq!(left, 0);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));
    teacher(&pool, "Hopper").await;
    let cookie = logged_in(&app, "Hopper").await;

    let response = send(&app, get("/logout", Some(&cookie))).await;
    assert_eq!(location(&response), "/login");
    assert_eq!(
        set_cookie(&response, auth::SESSION_COOKIE).as_deref(),
        Some("ssid=")
    );

    let response = send(&app, get("/api/attendance", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_paths_are_json_not_found() {
    let pool = pool().await;
    let app = app(&pool, Arc::new(LogNotifier));

    let response = send(&app, get("/nowhere", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "NotFound");
}
