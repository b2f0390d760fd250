use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rocket::fs::FileServer;
use rocket::http::{Header, Status};
use rocket::response::{self, Redirect, Responder};
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Request, Rocket, State};
use serde::Serialize;

use common::{Config, Step};

use crate::analysis::MacroAnalysisResult;
use crate::error::PipelineError;
use crate::export;
use crate::llm::LlmProvider;
use crate::orchestrator::{AnalysisOrchestrator, StepProviders};
use crate::runs::{RunSnapshot, RunState, RunTracker, BUSY_MESSAGE};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub providers: StepProviders,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub runs: Arc<RunTracker>,
}

impl AppState {
    pub fn new(config: Config, providers: StepProviders) -> Self {
        let orchestrator = AnalysisOrchestrator::from_config(&config, providers.clone());
        Self {
            started_at: Utc::now(),
            config: Arc::new(config),
            providers,
            orchestrator: Arc::new(orchestrator),
            runs: RunTracker::new(),
        }
    }
}

/// Errors returned by the JSON API
#[derive(Debug)]
pub enum ApiError {
    /// 409 - a run is already loading
    Busy,
    /// 404 - nothing to return yet
    NotFound(String),
    /// 502 - the model pipeline failed; message shown verbatim
    Pipeline(PipelineError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let (status, error, message) = match self {
            ApiError::Busy => (Status::Conflict, "busy".to_string(), BUSY_MESSAGE.to_string()),
            ApiError::NotFound(msg) => (Status::NotFound, "not_found".to_string(), msg),
            ApiError::Pipeline(e) => (Status::BadGateway, e.kind().to_string(), e.to_string()),
        };
        (status, Json(ErrorBody { error, message })).respond_to(req)
    }
}

/// Pretty-printed result served as a file attachment
#[derive(rocket::Responder)]
#[response(status = 200, content_type = "json")]
struct JsonDownload {
    body: String,
    disposition: Header<'static>,
}

/// Model used for each step, for `/api/v1/status`
#[derive(Serialize)]
struct StepModels {
    scout: String,
    verification: Option<String>,
    analysis: String,
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    adapter: String,
    models: StepModels,
    search: bool,
    run_state: RunState,
    /// True while a run holds the single-flight gate
    busy: bool,
}

/// Redirect root to static index.html
#[get("/")]
async fn index_redirect() -> Redirect {
    Redirect::to("/static/index.html")
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint returning uptime, configured models and current run state.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let verification = state
        .orchestrator
        .verification_enabled()
        .then(|| state.providers.get(Step::Verification).model().to_string());

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        adapter: state.config.llm.adapter.clone(),
        models: StepModels {
            scout: state.providers.get(Step::Scout).model().to_string(),
            verification,
            analysis: state.providers.get(Step::Analysis).model().to_string(),
        },
        search: state.config.pipeline.search,
        run_state: state.runs.snapshot().state,
        busy: state.runs.is_loading(),
    })
}

/// Run the pipeline and answer with the result once it is done.
#[post("/api/v1/analysis")]
async fn run_analysis(state: &State<AppState>) -> Result<Json<MacroAnalysisResult>, ApiError> {
    let guard = state.runs.try_begin().ok_or(ApiError::Busy)?;
    let run_id = guard.run_id();
    let on_status = |message: &str| tracing::info!(%run_id, "api: {}", message);

    let result = guard.execute(&state.orchestrator, &on_status).await?;
    Ok(Json(result))
}

/// Current (or last) run state, including the result once done.
#[get("/api/v1/analysis")]
async fn analysis_snapshot(state: &State<AppState>) -> Json<RunSnapshot> {
    Json(state.runs.snapshot())
}

/// Download the last result as a pretty-printed JSON file.
#[get("/api/v1/analysis/download")]
async fn download(state: &State<AppState>) -> Result<JsonDownload, ApiError> {
    let result = state
        .runs
        .last_result()
        .ok_or_else(|| ApiError::NotFound("No analysis result is available yet.".to_string()))?;

    let body = export::render_download(&result).map_err(|e| {
        tracing::error!("failed to render download: {:#}", e);
        ApiError::Pipeline(PipelineError::Unknown)
    })?;

    Ok(JsonDownload {
        body,
        disposition: Header::new(
            "Content-Disposition",
            export::content_disposition(&state.config.output.download_filename),
        ),
    })
}

/// Build the Rocket instance with managed state and all routes mounted.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let server_cfg = state.config.server.clone();

    let fig = rocket::Config::figment()
        .merge(("address", server_cfg.bind.clone()))
        .merge(("port", server_cfg.port));

    let mut rocket = rocket::custom(fig)
        .manage(state)
        .mount(
            "/",
            routes![
                index_redirect,
                health,
                status,
                run_analysis,
                analysis_snapshot,
                download,
            ],
        )
        .mount("/ws", routes![crate::runs::websocket::analysis_websocket]);

    if Path::new(&server_cfg.static_dir).is_dir() {
        rocket = rocket.mount("/static", FileServer::from(&server_cfg.static_dir));
    } else {
        tracing::warn!(dir = %server_cfg.static_dir, "static directory not found; front-end will not be served");
    }

    rocket
}

/// Build and launch the Rocket server.
///
/// This function blocks until the Rocket server shuts down (it awaits `rocket.launch().await`)
/// and returns an error if Rocket fails to start.
pub async fn launch_rocket(state: AppState) -> anyhow::Result<()> {
    tracing::info!(
        bind = %state.config.server.bind,
        port = state.config.server.port,
        "Starting Rocket HTTP server"
    );
    build_rocket(state)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
