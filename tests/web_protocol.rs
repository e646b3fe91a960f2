//! Integration tests for the emulated printer HTTP API

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use fake_select_mini::config::{ThermalConfig, UploadConfig};
use fake_select_mini::web::api::{AppStateInner, create_router};
use fake_select_mini::{Printer, Scheduler};
use http_body_util::BodyExt; // for .collect().await
use tokio::time::{Instant, sleep};
use tower::util::ServiceExt; // for `oneshot`

const FLOOR: i32 = 22;

fn test_app() -> (Router, Printer) {
    let printer = Printer::with_seed(ThermalConfig::default(), 42);
    let (scheduler, _task) = Scheduler::spawn(printer.clone(), Duration::from_secs(2));
    let upload = UploadConfig { chunk_size: 1024, chunk_delay_ms: 5 };
    let app = create_router(AppStateInner::new(printer.clone(), scheduler, upload));
    (app, printer)
}

async fn send(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, String) {
    let request = Request::builder().method(method).uri(uri).body(body).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    send(app, "GET", uri, Body::empty()).await
}

#[derive(Debug)]
struct Inquiry {
    hotend: i32,
    target_hotend: i32,
    bed: i32,
    target_bed: i32,
    progress: u8,
    flag: char,
}

/// Parse `T\d+/\d+P\d+/\d+/\d+[IP]`, panicking on anything else.
fn parse_inquiry(body: &str) -> Inquiry {
    let rest = body.strip_prefix('T').unwrap_or_else(|| panic!("bad inquiry {body:?}"));
    let flag = rest.chars().last().unwrap();
    assert!(flag == 'I' || flag == 'P', "bad flag in {body:?}");
    let rest = &rest[..rest.len() - 1];
    let (hotend_part, bed_part) = rest.split_once('P').unwrap();
    let (hotend, target_hotend) = hotend_part.split_once('/').unwrap();
    let bed_fields: Vec<&str> = bed_part.split('/').collect();
    assert_eq!(bed_fields.len(), 3, "bad bed section in {body:?}");
    let number = |s: &str| -> i64 {
        assert!(!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()), "not digits: {s:?} in {body:?}");
        s.parse().unwrap()
    };
    Inquiry {
        hotend: number(hotend) as i32,
        target_hotend: number(target_hotend) as i32,
        bed: number(bed_fields[0]) as i32,
        target_bed: number(bed_fields[1]) as i32,
        progress: number(bed_fields[2]) as u8,
        flag,
    }
}

async fn inquiry(app: &Router) -> Inquiry {
    let (status, body) = get(app, "/inquiry").await;
    assert_eq!(status, StatusCode::OK);
    parse_inquiry(&body)
}

#[tokio::test(start_paused = true)]
async fn test_initial_inquiry() {
    let (app, _printer) = test_app();
    let state = inquiry(&app).await;
    assert!((24..=26).contains(&state.hotend));
    assert!((24..=26).contains(&state.bed));
    assert_eq!(state.target_hotend, 0);
    assert_eq!(state.target_bed, 0);
    assert_eq!(state.progress, 0);
    assert_eq!(state.flag, 'I');
}

#[tokio::test(start_paused = true)]
async fn test_print_and_cancel_flags() {
    let (app, _printer) = test_app();
    let (status, body) = get(&app, "/set?cmd=%7BP:M%7D").await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "OK"));

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(inquiry(&app).await.flag, 'I');
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(inquiry(&app).await.flag, 'P');

    let (_, body) = get(&app, "/set?cmd=%7BP:X%7D").await;
    assert_eq!(body, "OK");
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(inquiry(&app).await.flag, 'P');
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(inquiry(&app).await.flag, 'I');
}

#[tokio::test(start_paused = true)]
async fn test_hotend_target_and_trend() {
    let (app, printer) = test_app();
    let (_, body) = get(&app, "/set?cmd=%7BC:T0200%7D").await;
    assert_eq!(body, "OK");
    assert_eq!(inquiry(&app).await.target_hotend, 0);

    sleep(Duration::from_millis(2500)).await;
    let first = inquiry(&app).await;
    assert_eq!(first.target_hotend, 200);

    let mut last = first.hotend;
    for _ in 0..40 {
        sleep(Duration::from_millis(500)).await;
        let state = inquiry(&app).await;
        assert_eq!(state.target_hotend, 200);
        assert!(state.hotend >= FLOOR);
        last = state.hotend;
    }
    assert!(last > first.hotend + 30, "hotend went from {} to {}", first.hotend, last);
    printer.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_bed_target() {
    let (app, printer) = test_app();
    get(&app, "/set?cmd=%7BC:P060%7D").await;
    sleep(Duration::from_millis(2100)).await;
    let state = inquiry(&app).await;
    assert_eq!(state.target_bed, 60);
    assert_eq!(state.target_hotend, 0);
    printer.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_targets_acknowledged_and_ignored() {
    let (app, _printer) = test_app();
    for uri in [
        "/set?cmd=%7BC:T020%7D",
        "/set?cmd=%7BC:T02000%7D",
        "/set?cmd=%7BC:T0abc%7D",
        "/set?cmd=%7BC:P06%7D",
        "/set?cmd=%7BC:P0600%7D",
        "/set?cmd=%7BC:T1200%7D",
        "/set?cmd=%7BC:T%7D",
        "/set?cmd=%7BC:P160%7D",
    ] {
        let (status, body) = get(&app, uri).await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "OK"), "{uri}");
    }
    sleep(Duration::from_secs(3)).await;
    let state = inquiry(&app).await;
    assert_eq!(state.target_hotend, 0);
    assert_eq!(state.target_bed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_inert_commands() {
    let (app, _printer) = test_app();
    for uri in ["/set?cmd=%7BP:P%7D", "/set?cmd=%7BP:R%7D", "/set?code=G28%20X%20Y"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "OK"), "{uri}");
    }
    sleep(Duration::from_secs(3)).await;
    let state = inquiry(&app).await;
    assert_eq!(state.flag, 'I');
    assert_eq!((state.target_hotend, state.target_bed), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_get_serves_help() {
    let (app, _printer) = test_app();
    for uri in ["/", "/status", "/set", "/set?cmd=%7BZ:Z%7D", "/upload"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(body.contains("Select Mini V2"), "{uri}");
        assert!(body.contains("/inquiry"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_upload_drains_at_throttled_rate() {
    let (app, _printer) = test_app();
    let start = Instant::now();
    let (status, body) = send(&app, "POST", "/upload", Body::from(vec![0u8; 5000])).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "OK"));
    // 5 chunks of 1024 bytes at 5 ms each.
    assert_eq!(start.elapsed(), Duration::from_millis(25));

    let start = Instant::now();
    let (status, body) = send(&app, "POST", "/upload", Body::empty()).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "OK"));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_other_methods_not_found() {
    let (app, _printer) = test_app();
    for (method, uri) in [
        ("POST", "/inquiry"),
        ("POST", "/set?cmd=%7BP:M%7D"),
        ("POST", "/"),
        ("PUT", "/upload"),
        ("DELETE", "/inquiry"),
    ] {
        let (status, body) = send(&app, method, uri, Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(body, "Not Found");
    }
    sleep(Duration::from_secs(3)).await;
    assert_eq!(inquiry(&app).await.flag, 'I');
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inquiries_are_consistent() {
    let (app, printer) = test_app();
    printer.set_target_hotend(200).await;
    printer.set_target_bed(60).await;

    let requests = (0..64).map(|_| {
        let app = app.clone();
        tokio::spawn(async move { inquiry(&app).await })
    });
    for state in futures_util::future::join_all(requests).await {
        let state = state.unwrap();
        assert_eq!((state.target_hotend, state.target_bed), (200, 60));
        assert!(state.hotend >= FLOOR && state.bed >= FLOOR, "{state:?}");
    }
    printer.shutdown().await;
}
