/*!
HTML rendering.

Templates are compiled into the binary and registered once at startup; the
resulting `Views` is shared by every request.
*/
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use handlebars::Handlebars;
use serde_json::Value;

use crate::flash::{self, AddCookies, Flash, Incoming};
use crate::Error;

static PARTIALS: &[(&str, &str)] = &[
    ("header", include_str!("../templates/header.hbs")),
    ("footer", include_str!("../templates/footer.hbs")),
];

static TEMPLATES: &[(&str, &str)] = &[
    ("login", include_str!("../templates/login.hbs")),
    ("register", include_str!("../templates/register.hbs")),
    ("dashboard", include_str!("../templates/dashboard.hbs")),
    ("students", include_str!("../templates/students.hbs")),
    ("student_form", include_str!("../templates/student_form.hbs")),
    ("attendance", include_str!("../templates/attendance.hbs")),
    ("student_report", include_str!("../templates/student_report.hbs")),
];

static HTML_404: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Attendance | Not Found</title>
</head>
<body>
<h1>Not Found</h1>
<p>(Error 404)</p>
<p><a href="/dashboard">Back to the dashboard</a></p>
</body>
</html>"#;

static HTML_400: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Attendance | Bad Request</title>
</head>
<body>
<h1>Bad Request</h1>
<p>(Error 400)</p>
<p>The submitted data could not be understood.</p>
</body>
</html>"#;

static HTML_500: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Attendance | Error</title>
</head>
<body>
<h1>Internal Server Error</h1>
<p>(Error 500)</p>
<p>Something went wrong on our end. No further or more
helpful information is available about the problem.</p>
</body>
</html>"#;

pub struct Views {
    templates: Handlebars<'static>,
}

impl std::fmt::Debug for Views {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Views")
            .field("templates", &self.templates.get_templates().len())
            .finish()
    }
}

impl Views {
    pub fn new() -> Result<Self, handlebars::TemplateError> {
        let mut h = Handlebars::new();
        for (name, source) in PARTIALS {
            h.register_partial(name, *source)?;
        }
        for (name, source) in TEMPLATES {
            h.register_template_string(name, *source)?;
        }
        log::debug!("Registered {} templates.", TEMPLATES.len());
        Ok(Self { templates: h })
    }

    pub fn render(&self, template_name: &str, data: &Value) -> Result<String, Error> {
        log::trace!("Views::render( {:?}, ... ) called.", template_name);
        Ok(self.templates.render(template_name, data)?)
    }

    /// Renders a full page. Any incoming flash message is shown and its
    /// cookie cleared.
    pub fn page(
        &self,
        template_name: &str,
        mut data: Value,
        incoming: Incoming,
    ) -> Result<Response, Error> {
        let shown = incoming.0.is_some();
        if let Value::Object(map) = &mut data {
            map.insert(
                "flash".to_owned(),
                serde_json::to_value(&incoming.0).unwrap_or(Value::Null),
            );
        }
        let body = self.render(template_name, &data)?;
        let response = (StatusCode::OK, Html(body));
        if shown {
            Ok(response.add_cookies([flash::clear_cookie()]))
        } else {
            Ok(response.into_response())
        }
    }
}

/// An error raised while serving an HTML page.
#[derive(Debug)]
pub struct HtmlError(pub Error);

impl From<Error> for HtmlError {
    fn from(err: Error) -> Self {
        HtmlError(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::Unauthorized { .. } => {
                flash::redirect("/login", Flash::danger("Please login first"))
            }
            Error::Forbidden { message } => flash::redirect("/students", Flash::danger(message)),
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, Html(HTML_404)).into_response(),
            err if err.status().is_client_error() => {
                log::debug!("Rejecting page request: {:?}", err);
                (err.status(), Html(HTML_400)).into_response()
            }
            err => {
                log::error!("Error serving page: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, Html(HTML_500)).into_response()
            }
        }
    }
}

pub type PageResult = Result<Response, HtmlError>;
