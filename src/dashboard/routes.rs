use std::io::Cursor;

use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::dashboard::sse;
use crate::dashboard::state::{lock, SharedState};

const PAGE: &str = include_str!("assets/dashboard.html");

type Body = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn header(name: &str, value: &str) -> Header {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("static header is valid ascii")
}

fn bytes_response(status: u16, content_type: &str, bytes: Vec<u8>) -> Body {
    let len = bytes.len();
    Response::new(
        StatusCode(status),
        vec![header("Content-Type", content_type), header("Cache-Control", "no-cache")],
        Cursor::new(bytes),
        Some(len),
        None,
    )
}

pub fn html_response(body: &str) -> Body {
    bytes_response(200, "text/html; charset=utf-8", body.as_bytes().to_vec())
}

pub fn json_response(body: String) -> Body {
    bytes_response(200, "application/json", body.into_bytes())
}

pub fn png_response(bytes: Vec<u8>) -> Body {
    bytes_response(200, "image/png", bytes)
}

pub fn not_found() -> Body {
    bytes_response(404, "text/plain", b"404 Not Found".to_vec())
}

fn server_error(msg: &str) -> Body {
    bytes_response(500, "text/plain", msg.as_bytes().to_vec())
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Routes one request. The SSE handler takes ownership of the request to
/// stream on the raw socket; everything else is answered here.
pub fn dispatch(request: Request, state: SharedState) {
    let method = request.method().clone();
    let path = request.url().split('?').next().unwrap_or("").to_owned();
    log::debug!("{:?} {}", method, path);

    if method == Method::Get && path == "/events" {
        sse::handle(request, state);
        return;
    }

    let response = match (method, path.as_str()) {
        (Method::Get, "/") => html_response(PAGE),
        (Method::Get, "/state") => {
            let snapshot = lock(&state).snapshot();
            match serde_json::to_string(&snapshot) {
                Ok(json) => json_response(json),
                Err(e) => server_error(&e.to_string()),
            }
        }
        (Method::Get, p) if p.starts_with("/images/") => image(p, &state),
        _ => not_found(),
    };

    if let Err(e) = request.respond(response) {
        log::debug!("dashboard response failed: {}", e);
    }
}

/// `GET /images/<id>.png`
fn image(path: &str, state: &SharedState) -> Body {
    let id = path
        .strip_prefix("/images/")
        .and_then(|s| s.strip_suffix(".png"))
        .and_then(|s| s.parse::<usize>().ok());
    let png = id.and_then(|id| lock(state).image_png(id).map(<[u8]>::to_vec));
    match png {
        Some(bytes) => png_response(bytes),
        None => not_found(),
    }
}
