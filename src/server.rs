//! HTTP surface.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/compare` | Hu-moment match of a drawing against the reference image |
//! | POST | `/submit` | Save a drawing and append it to the submission log |
//! | POST | `/evaluate/kohs` | Score a block grid against a fixture |
//! | POST | `/evaluate/trace` | Score a traced polyline against a fixture |
//! | POST | `/evaluate/pass-along` | Score a tray against a design |
//! | POST | `/evaluate/puzzle` | Score a final tile arrangement |
//! | POST | `/evaluate/digit-span` | Score a recalled digit sequence |
//! | GET | `/sessions/:key` | Stored session record |
//! | GET | `/composite` | Cross-game aggregate over stored sessions |
//!
//! Evaluators look targets up by fixture id so clients never send the
//! answer key.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::{Path as UrlPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::composite::{self, Composite, Profile};
use crate::config::{AppConfig, ConfigError, StorageKeys};
use crate::games::digit_span::{self, RecallMode};
use crate::games::kohs::{self, UserGrid};
use crate::games::pass_along::{self, Tray};
use crate::games::puzzle::{Board, PuzzleVariant};
use crate::games::trace::{self, Point};
use crate::session::SessionRecord;
use crate::shape::{self, ShapeError};
use crate::store::{FileStore, SessionStore, load_record};

pub const SUBMISSION_LOG: &str = "submissions_log.csv";

#[derive(Debug, thiserror::Error)]
pub enum ServerError
{
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl IntoResponse for ServerError
{
    fn into_response(self) -> Response
    {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Shape(ShapeError::Reference { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Shape(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState
{
    store: Arc<Mutex<dyn SessionStore + Send>>,
    keys: Arc<StorageKeys>,
    reference_image: Arc<PathBuf>,
    submissions_dir: Arc<PathBuf>,
}

impl AppState
{
    pub fn new(
        store: impl SessionStore + Send + 'static,
        keys: StorageKeys,
        reference_image: PathBuf,
        submissions_dir: PathBuf,
    ) -> Self
    {
        Self {
            store: Arc::new(Mutex::new(store)),
            keys: Arc::new(keys),
            reference_image: Arc::new(reference_image),
            submissions_dir: Arc::new(submissions_dir),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError>
    {
        Ok(Self::new(
            FileStore::new(config.session_dir()?),
            config.storage_keys.clone(),
            config.reference_image()?,
            config.submissions_dir()?,
        ))
    }
}

pub fn create_router(state: AppState) -> Router
{
    Router::new()
        .route("/health", get(handle_health))
        .route("/compare", post(handle_compare))
        .route("/submit", post(handle_submit))
        .route("/evaluate/kohs", post(handle_evaluate_kohs))
        .route("/evaluate/trace", post(handle_evaluate_trace))
        .route("/evaluate/pass-along", post(handle_evaluate_pass_along))
        .route("/evaluate/puzzle", post(handle_evaluate_puzzle))
        .route("/evaluate/digit-span", post(handle_evaluate_digit_span))
        .route("/sessions/:key", get(handle_get_session))
        .route("/composite", get(handle_composite))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &AppConfig) -> ServerResult<()>
{
    let state = AppState::from_config(config)?;
    let addr: std::net::SocketAddr = config.bind_address().parse()?;
    info!("Starting mindcheck server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

// ── Request/Response types ──────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation
{
    pub is_correct: bool,
    pub score: f64,
}

#[derive(Deserialize)]
struct CompareForm
{
    #[serde(rename = "drawnImage")]
    drawn_image: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest
{
    image: String,
    accuracy: f64,
    #[serde(default)]
    auto_submit: bool,
    #[serde(default)]
    time_taken: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KohsRequest
{
    pattern_id: u32,
    grid: UserGrid,
    #[serde(default)]
    elapsed_seconds: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceRequest
{
    pattern_id: u32,
    points: Vec<Point>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PassAlongRequest
{
    design_id: u32,
    tray: Tray,
    #[serde(default)]
    elapsed_seconds: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PuzzleRequest
{
    variant: PuzzleVariant,
    /// One-based, as shown to players.
    level: usize,
    tiles: Vec<Option<u32>>,
    #[serde(default)]
    elapsed_seconds: f64,
}

#[derive(Deserialize)]
struct DigitSpanRequest
{
    sequence: String,
    mode: RecallMode,
    answer: String,
}

#[derive(Deserialize)]
struct CompositeQuery
{
    age: Option<u32>,
    education: Option<String>,
}

// ── Handlers ────────────────────────────────────────────────────────

async fn handle_health() -> Json<serde_json::Value>
{
    Json(serde_json::json!({ "status": "OK" }))
}

async fn handle_compare(
    State(state): State<AppState>,
    Form(form): Form<CompareForm>,
) -> ServerResult<Json<serde_json::Value>>
{
    let reference = shape::load_reference(&state.reference_image)?;
    let score = shape::compare_data_url(&form.drawn_image, &reference)?;
    debug!(score, "Compared drawing");
    Ok(Json(serde_json::json!({ "match": score })))
}

async fn handle_submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> ServerResult<Json<serde_json::Value>>
{
    // Whatever format the client sent, the saved file is a PNG.
    let drawing = shape::decode_image(&shape::decode_data_url(&request.image)?)?;
    let png = shape::encode_png(&drawing)?;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let label = if request.auto_submit { "auto" } else { "manual" };
    let filename = format!(
        "submission_{label}_{}_{}s_{timestamp}.png",
        request.accuracy.trunc() as i64,
        request.time_taken
    );

    fs::create_dir_all(state.submissions_dir.as_path())?;
    fs::write(state.submissions_dir.join(&filename), png)?;
    let accuracy = request.accuracy.to_string();
    let time_taken = request.time_taken.to_string();
    append_submission_log(
        &state.submissions_dir.join(SUBMISSION_LOG),
        &[
            timestamp.as_str(),
            accuracy.as_str(),
            time_taken.as_str(),
            label,
            filename.as_str(),
        ],
    )?;
    info!(%filename, accuracy = request.accuracy, "Saved submission");

    Ok(Json(serde_json::json!({
        "message": format!(
            "Drawing submitted! Accuracy: {}%, Time Taken: {}s",
            request.accuracy, request.time_taken
        )
    })))
}

fn append_submission_log(path: &Path, row: &[&str]) -> std::io::Result<()>
{
    let exists = path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if !exists {
        writeln!(file, "timestamp,accuracy,time_taken,submission_type,filename")?;
    }
    writeln!(file, "{}", row.join(","))
}

async fn handle_evaluate_kohs(Json(request): Json<KohsRequest>) -> ServerResult<Json<Evaluation>>
{
    let pattern = kohs::pattern_by_id(request.pattern_id)
        .ok_or_else(|| ServerError::NotFound(format!("Unknown pattern {}", request.pattern_id)))?;
    let scored = kohs::score_grid(&request.grid, &pattern.grid, request.elapsed_seconds);
    Ok(Json(Evaluation {
        is_correct: kohs::compare_grids(&request.grid, &pattern.grid),
        score: scored.score as f64,
    }))
}

async fn handle_evaluate_trace(Json(request): Json<TraceRequest>) -> ServerResult<Json<Evaluation>>
{
    let pattern = trace::pattern_by_id(request.pattern_id)
        .ok_or_else(|| ServerError::NotFound(format!("Unknown pattern {}", request.pattern_id)))?;
    let scored = trace::score_trace(&pattern.points, &request.points);
    Ok(Json(Evaluation {
        is_correct: scored.is_correct,
        score: scored.score as f64,
    }))
}

async fn handle_evaluate_pass_along(
    Json(request): Json<PassAlongRequest>,
) -> ServerResult<Json<Evaluation>>
{
    let design = pass_along::design_by_id(request.design_id)
        .ok_or_else(|| ServerError::NotFound(format!("Unknown design {}", request.design_id)))?;
    let is_correct = pass_along::matches(&request.tray, &design.target);
    let index = design.id as usize - 1;
    let score = pass_along::score_for(index, request.elapsed_seconds, is_correct);
    Ok(Json(Evaluation {
        is_correct,
        score: score as f64,
    }))
}

async fn handle_evaluate_puzzle(Json(request): Json<PuzzleRequest>) -> ServerResult<Json<Evaluation>>
{
    let index = request
        .level
        .checked_sub(1)
        .ok_or_else(|| ServerError::BadRequest("Levels start at 1".to_string()))?;
    let level = request
        .variant
        .level(index)
        .ok_or_else(|| ServerError::NotFound(format!("Unknown level {}", request.level)))?;
    let board = Board::from_tiles(level.rows, level.cols, request.tiles).ok_or_else(|| {
        ServerError::BadRequest(format!(
            "Tiles must be 1..{} plus one blank",
            level.rows * level.cols - 1
        ))
    })?;
    let solved = board.is_solved();
    let elapsed = Duration::try_from_secs_f64(request.elapsed_seconds.max(0.0))
        .map_err(|_| ServerError::BadRequest("elapsedSeconds is out of range".to_string()))?;
    let score = request.variant.score(index, solved, elapsed, level.limit);
    Ok(Json(Evaluation {
        is_correct: solved,
        score: score as f64,
    }))
}

async fn handle_evaluate_digit_span(
    Json(request): Json<DigitSpanRequest>,
) -> ServerResult<Json<Evaluation>>
{
    if request.sequence.trim().is_empty() {
        return Err(ServerError::BadRequest("Sequence is empty".to_string()));
    }
    let is_correct = digit_span::is_recall_correct(&request.sequence, request.mode, &request.answer);
    Ok(Json(Evaluation {
        is_correct,
        score: if is_correct { 1.0 } else { 0.0 },
    }))
}

async fn handle_get_session(
    State(state): State<AppState>,
    UrlPath(key): UrlPath<String>,
) -> ServerResult<Json<SessionRecord>>
{
    let store = state.store.lock().await;
    load_record(&*store, &key)
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("No session stored under {key}")))
}

async fn handle_composite(
    State(state): State<AppState>,
    Query(query): Query<CompositeQuery>,
) -> Json<Composite>
{
    let store = state.store.lock().await;
    let records = composite::gather(&*store, &state.keys);
    let mut profile: Profile =
        composite::load_profile(&*store, &state.keys.profile).unwrap_or_default();
    if query.age.is_some() {
        profile.age = query.age;
    }
    if query.education.is_some() {
        profile.education = query.education;
    }
    Json(composite::composite_index(&records, &profile))
}
