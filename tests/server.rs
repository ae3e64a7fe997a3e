use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, Rgba, RgbaImage};
use mindcheck::config::StorageKeys;
use mindcheck::games::kohs;
use mindcheck::server::{AppState, Evaluation, create_router};
use mindcheck::session::{QuestionResult, SessionRecord};
use mindcheck::shape;
use mindcheck::store::{MemoryStore, SessionStore};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

fn app(dir: &TempDir, store: MemoryStore) -> Router
{
    let state = AppState::new(
        store,
        StorageKeys::default(),
        dir.path().join("reference.png"),
        dir.path().join("submissions"),
    );
    create_router(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value)
{
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body>
{
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body>
{
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn square() -> DynamicImage
{
    let mut image = RgbaImage::from_pixel(120, 120, Rgba([255, 255, 255, 255]));
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if (30..90).contains(&x) && (30..90).contains(&y) {
            *pixel = Rgba([0, 0, 0, 255]);
        }
    }
    DynamicImage::ImageRgba8(image)
}

fn data_url(image: &DynamicImage) -> String
{
    let png = shape::encode_png(image).unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

fn form_encode(value: &str) -> String
{
    value
        .chars()
        .map(|ch| match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' => ch.to_string(),
            other => format!("%{:02X}", other as u32),
        })
        .collect()
}

#[tokio::test]
async fn test_health()
{
    let dir = TempDir::new().unwrap();
    let (status, body) = send(app(&dir, MemoryStore::new()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "OK" }));
}

#[tokio::test]
async fn test_evaluate_kohs_matching_grid()
{
    let dir = TempDir::new().unwrap();
    let pattern = kohs::pattern_by_id(1).unwrap();
    let grid: Vec<Vec<&str>> = pattern
        .grid
        .iter()
        .map(|row| row.iter().map(|color| color.as_str()).collect())
        .collect();

    let request = post_json(
        "/evaluate/kohs",
        json!({ "patternId": 1, "grid": grid, "elapsedSeconds": 12.0 }),
    );
    let (status, body) = send(app(&dir, MemoryStore::new()), request).await;

    assert_eq!(status, StatusCode::OK);
    let evaluation: Evaluation = serde_json::from_value(body).unwrap();
    assert_eq!(evaluation, Evaluation { is_correct: true, score: 129.0 });
}

#[tokio::test]
async fn test_evaluate_kohs_unknown_pattern()
{
    let dir = TempDir::new().unwrap();
    let request = post_json("/evaluate/kohs", json!({ "patternId": 99, "grid": [] }));
    let (status, body) = send(app(&dir, MemoryStore::new()), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("99"));
}

#[tokio::test]
async fn test_evaluate_trace_reference_points_pass()
{
    let dir = TempDir::new().unwrap();
    let points = json!([
        { "x": 200.0, "y": 50.0 },
        { "x": 250.0, "y": 150.0 },
        { "x": 150.0, "y": 150.0 },
        { "x": 200.0, "y": 50.0 }
    ]);
    let request = post_json("/evaluate/trace", json!({ "patternId": 1, "points": points }));
    let (status, body) = send(app(&dir, MemoryStore::new()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "isCorrect": true, "score": 100.0 }));
}

#[tokio::test]
async fn test_evaluate_puzzle_rejects_bad_tiles()
{
    let dir = TempDir::new().unwrap();
    let request = post_json(
        "/evaluate/puzzle",
        json!({ "variant": "slide", "level": 1, "tiles": [1, 1, 2, null] }),
    );
    let (status, body) = send(app(&dir, MemoryStore::new()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_evaluate_puzzle_solved_board()
{
    let dir = TempDir::new().unwrap();
    let request = post_json(
        "/evaluate/puzzle",
        json!({ "variant": "slide", "level": 1, "tiles": [1, 2, 3, null], "elapsedSeconds": 10.0 }),
    );
    let (status, body) = send(app(&dir, MemoryStore::new()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isCorrect"], json!(true));
}

#[tokio::test]
async fn test_evaluate_digit_span_reverse()
{
    let dir = TempDir::new().unwrap();
    let request = post_json(
        "/evaluate/digit-span",
        json!({ "sequence": "1234", "mode": "reverse", "answer": "4 3 2 1" }),
    );
    let (status, body) = send(app(&dir, MemoryStore::new()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "isCorrect": true, "score": 1.0 }));
}

#[tokio::test]
async fn test_sessions_lookup()
{
    let dir = TempDir::new().unwrap();
    let mut record = SessionRecord::new("KohsTest");
    record.upsert(QuestionResult {
        question_id: 1,
        is_correct: true,
        response_time: 8.0,
        score: 127.0,
        answer: None,
    });
    let mut store = MemoryStore::new();
    store.set("KohsTest", &serde_json::to_string(&record).unwrap()).unwrap();

    let router = app(&dir, store);
    let (status, body) = send(router.clone(), get("/sessions/KohsTest")).await;
    assert_eq!(status, StatusCode::OK);
    let stored: SessionRecord = serde_json::from_value(body).unwrap();
    assert_eq!(stored, record);

    let (status, _) = send(router, get("/sessions/MemoryTest")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_composite_without_sessions()
{
    let dir = TempDir::new().unwrap();
    let (status, body) = send(app(&dir, MemoryStore::new()), get("/composite?age=30")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["index"], json!(70));
    assert_eq!(body["rawTotal"], json!(0.0));
}

#[tokio::test]
async fn test_compare_without_reference_is_server_error()
{
    let dir = TempDir::new().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/compare")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(format!("drawnImage={}", form_encode(&data_url(&square())))))
        .unwrap();
    let (status, body) = send(app(&dir, MemoryStore::new()), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_compare_same_shape()
{
    let dir = TempDir::new().unwrap();
    square().save(dir.path().join("reference.png")).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/compare")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(format!("drawnImage={}", form_encode(&data_url(&square())))))
        .unwrap();
    let (status, body) = send(app(&dir, MemoryStore::new()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "match": 100.0 }));
}

#[tokio::test]
async fn test_submit_saves_image_and_log()
{
    let dir = TempDir::new().unwrap();
    let request = post_json(
        "/submit",
        json!({
            "image": data_url(&square()),
            "accuracy": 87.5,
            "autoSubmit": false,
            "timeTaken": 42.0
        }),
    );
    let (status, body) = send(app(&dir, MemoryStore::new()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        json!("Drawing submitted! Accuracy: 87.5%, Time Taken: 42s")
    );

    let submissions = dir.path().join("submissions");
    let log = std::fs::read_to_string(submissions.join("submissions_log.csv")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines[0], "timestamp,accuracy,time_taken,submission_type,filename");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains(",87.5,42,manual,submission_manual_87_42s_"));

    let saved = std::fs::read_dir(&submissions)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
        .collect::<Vec<_>>();
    assert_eq!(saved.len(), 1);
    let stored = image::open(&saved[0]).unwrap();
    assert_eq!((stored.width(), stored.height()), (120, 120));
}

#[tokio::test]
async fn test_submit_rejects_base64_that_is_not_an_image()
{
    let dir = TempDir::new().unwrap();
    let payload = format!("data:image/png;base64,{}", STANDARD.encode(b"not a png"));
    let request = post_json("/submit", json!({ "image": payload, "accuracy": 10.0 }));
    let (status, _) = send(app(&dir, MemoryStore::new()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!dir.path().join("submissions").exists());
}

#[tokio::test]
async fn test_submit_rejects_garbage_image()
{
    let dir = TempDir::new().unwrap();
    let request = post_json(
        "/submit",
        json!({ "image": "data:text/plain,hello", "accuracy": 10.0 }),
    );
    let (status, _) = send(app(&dir, MemoryStore::new()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
