//! HTTP surface: application state, request/response types and handlers.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, OnceLock,
};

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tower_http::services::ServeDir;
use tracing::info;

use vits_core::{text, InferenceParams, Language, PreparedText, VitsManager};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::validation::validate_synthesis_request;

/// In-band status string for the text-length overflow, returned with HTTP
/// 200 and a null audio field rather than an error response.
pub const TEXT_TOO_LONG_STATUS: &str = "Error: Text is too long";

pub static START_TIME: OnceLock<std::time::Instant> = OnceLock::new();

#[derive(Clone)]
pub struct AppState {
    pub vits: Arc<VitsManager>,
    /// Single-permit gate: one inference at a time.
    pub synth_gate: Arc<Semaphore>,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(vits: Arc<VitsManager>, config: ServerConfig) -> Self {
        Self {
            vits,
            synth_gate: Arc::new(Semaphore::new(1)),
            request_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }
}

#[derive(Deserialize)]
pub struct SynthesisRequest {
    /// Index into the manifest, as listed by `GET /models`.
    pub model: usize,
    pub text: String,
    /// 0 = Chinese, 1 = Japanese, 2 = Mix (explicit tags in the text).
    pub language: u8,
    pub noise_scale: Option<f32>,
    pub noise_scale_w: Option<f32>,
    pub length_scale: Option<f32>,
}

#[derive(Serialize)]
pub struct SynthesisResponse {
    pub status: String,
    pub audio_base64: Option<String>,
    pub sample_rate: Option<u32>,
    pub duration_ms: Option<u64>,
    pub cached: bool,
}

#[derive(Serialize)]
pub struct ModelSummary {
    pub index: usize,
    pub sid: i64,
    pub name_en: String,
    pub name_zh: String,
    pub title: String,
    pub example: String,
    pub language: String,
    pub cover: Option<String>,
}

#[derive(Deserialize)]
pub struct DefaultsQuery {
    pub language: u8,
}

#[derive(Serialize)]
pub struct SliderDefaults {
    pub noise_scale: f32,
    pub noise_scale_w: f32,
    pub length_scale: f32,
}

pub fn build_router(state: AppState) -> Router {
    let web_dir = state.config.web_dir.clone();
    // Manifest `cover` values like "covers/mana.png" resolve against the
    // model directory, so the UI can use them as-is.
    let covers_dir = format!("{}/covers", state.config.model_dir);
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/models", get(list_models))
        .route("/models/{index}/defaults", get(model_defaults))
        .route("/synthesize", post(synthesize_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .nest_service("/covers", ServeDir::new(covers_dir))
        .fallback_service(ServeDir::new(web_dir).append_index_html_on_directories(true))
        .with_state(state)
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelSummary>> {
    let out = state
        .vits
        .models()
        .iter()
        .enumerate()
        .map(|(index, m)| ModelSummary {
            index,
            sid: m.sid,
            name_en: m.name_en.clone(),
            name_zh: m.name_zh.clone(),
            title: m.title.clone(),
            example: m.example.clone(),
            language: m.language.clone(),
            cover: m.cover.clone(),
        })
        .collect();
    Json(out)
}

/// Slider defaults shown when the language dropdown changes.
pub async fn model_defaults(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(q): Query<DefaultsQuery>,
) -> Result<Json<SliderDefaults>, ApiError> {
    if state.vits.model(index).is_none() {
        return Err(ApiError::NotFound(format!("No model at index {index}")));
    }
    let language = Language::try_from(q.language)
        .map_err(|v| ApiError::InvalidInput(format!("Invalid language selector: {v}")))?;
    let (noise_scale, noise_scale_w, length_scale) = text::slider_defaults(language);
    Ok(Json(SliderDefaults { noise_scale, noise_scale_w, length_scale }))
}

pub async fn synthesize_endpoint(
    State(state): State<AppState>,
    Json(req): Json<SynthesisRequest>,
) -> Result<Json<SynthesisResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    // Missing knobs fall back to the language's slider defaults.
    let language = Language::try_from(req.language)
        .map_err(|v| ApiError::InvalidInput(format!("Invalid language selector: {v}")))?;
    let (d_ns, d_nsw, d_ls) = text::slider_defaults(language);
    let params = InferenceParams {
        noise_scale: req.noise_scale.unwrap_or(d_ns),
        noise_scale_w: req.noise_scale_w.unwrap_or(d_nsw),
        length_scale: req.length_scale.unwrap_or(d_ls),
    };

    validate_synthesis_request(
        &req.text,
        req.language,
        params.noise_scale,
        params.noise_scale_w,
        params.length_scale,
    )?;

    if state.vits.model(req.model).is_none() {
        return Err(ApiError::NotFound(format!("No model at index {}", req.model)));
    }

    let prepared = match text::prepare_text(&req.text, language, state.config.text_limit) {
        PreparedText::Ready(t) => t,
        PreparedText::TooLong { len, limit } => {
            info!("Rejecting over-limit text: {len} chars (limit {limit})");
            return Ok(Json(SynthesisResponse {
                status: TEXT_TOO_LONG_STATUS.to_string(),
                audio_base64: None,
                sample_rate: None,
                duration_ms: None,
                cached: false,
            }));
        }
    };

    let _permit = state
        .synth_gate
        .acquire()
        .await
        .map_err(|_| ApiError::Internal("Synthesis queue closed".to_string()))?;

    let (audio_base64, sample_rate, duration_ms, cached) = state
        .vits
        .synthesize_cached(req.model, &prepared, params)
        .await
        .map_err(ApiError::Synthesis)?;

    Ok(Json(SynthesisResponse {
        status: "Success".to_string(),
        audio_base64: Some(audio_base64),
        sample_rate: Some(sample_rate),
        duration_ms: Some(duration_ms),
        cached,
    }))
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
    pub request_count: u64,
    pub uptime_seconds: u64,
    pub system_load: Option<f64>,
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let cpu_usage = system.global_cpu_info().cpu_usage();

    let memory_used = system.used_memory();
    let memory_total = system.total_memory();
    let memory_usage_percent = if memory_total > 0 {
        (memory_used as f64 / memory_total as f64 * 100.0) as f32
    } else {
        0.0
    };

    let request_count = state.request_count.load(Ordering::Relaxed);

    let uptime = START_TIME.get().map(|start| start.elapsed().as_secs()).unwrap_or(0);

    let system_load = {
        #[cfg(unix)]
        {
            use std::fs;
            if let Ok(loadavg) = fs::read_to_string("/proc/loadavg") {
                loadavg.split_whitespace().next().and_then(|s| s.parse::<f64>().ok())
            } else {
                None
            }
        }
        #[cfg(not(unix))]
        None
    };

    Json(MetricsResponse {
        cpu_usage_percent: cpu_usage,
        memory_used_mb: memory_used / 1024 / 1024,
        memory_total_mb: memory_total / 1024 / 1024,
        memory_usage_percent,
        request_count,
        uptime_seconds: uptime,
        system_load,
    })
}
