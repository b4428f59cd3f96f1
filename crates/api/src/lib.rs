pub mod config;
mod rate_limit;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tripsmith_core::{Plan, PlanError, SavedItinerary, TripContext};
use tripsmith_observability::{AppMetrics, MetricsSnapshot};
use tripsmith_planner::{
    FixedGenerator, GeminiGenerator, Generator, PlannerError, PlannerOptions, RetryPolicy,
    TripPlanner,
};
use tripsmith_storage::Store;

pub use crate::config::ApiConfig;
use crate::config::MAX_BODY_BYTES;
use crate::rate_limit::IpRateLimiter;

pub type Planner = TripPlanner<Store, Generator>;

#[derive(Clone)]
pub struct ApiState {
    pub planner: Arc<Planner>,
    pub metrics: Arc<AppMetrics>,
    pub store_backend: &'static str,
    pub config: Arc<ApiConfig>,
    limiter: IpRateLimiter,
}

impl ApiState {
    pub fn new(store: Store, generator: Generator, config: ApiConfig) -> Self {
        let metrics = AppMetrics::shared();
        let options = PlannerOptions {
            retry: RetryPolicy {
                attempts: config.generation_attempts.max(1),
                ..RetryPolicy::default()
            },
            evening_anchors: config.evening_anchors,
        };
        let store_backend = store.backend_name();
        let planner = Arc::new(TripPlanner::new(
            Arc::new(store),
            Arc::new(generator),
            metrics.clone(),
            options,
        ));

        Self {
            planner,
            metrics,
            store_backend,
            limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
            config: Arc::new(config),
        }
    }
}

pub async fn build_app(config: ApiConfig) -> Result<Router> {
    let store = Store::from_database_url(config.database_url.as_deref()).await?;
    let generator = build_generator(&config).await?;

    info!(
        store = store.backend_name(),
        generator = %generator_label(&generator),
        "tripsmith api configured"
    );

    Ok(build_router(ApiState::new(store, generator, config)))
}

/// Gemini when an API key is configured, otherwise the canned offline answer.
pub async fn build_generator(config: &ApiConfig) -> Result<Generator> {
    if let Some(api_key) = config.google_api_key.as_deref() {
        let mut gemini = GeminiGenerator::new(api_key, config.gemini_model.as_str())?;
        if let Some(base_url) = config.gemini_base_url.as_deref() {
            gemini = gemini.with_base_url(base_url);
        }
        return Ok(Generator::Gemini(gemini));
    }

    let Some(path) = config.offline_response.as_ref() else {
        bail!("no generator configured: set TRIPSMITH_GOOGLE_API_KEY or TRIPSMITH_OFFLINE_RESPONSE");
    };
    let response = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed reading offline response {}", path.display()))?;
    Ok(Generator::Fixed(FixedGenerator::new(response)))
}

fn generator_label(generator: &Generator) -> &'static str {
    match generator {
        Generator::Gemini(_) => "gemini",
        Generator::Fixed(_) => "offline",
    }
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query/day-plan", post(query_day_plan))
        .route("/query/normalize", post(query_normalize))
        .route(
            "/itineraries/{key}",
            get(itineraries_list).put(itineraries_save),
        )
        .route(
            "/itineraries/{key}/{name}/day-plan",
            post(itinerary_day_plan),
        )
        .route("/itineraries/{key}/{name}/choice", post(itinerary_choice))
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

/// JSON error body `{"error": code, "message": text}` with a status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": self.message
            })),
        )
            .into_response()
    }
}

impl From<PlannerError> for ApiError {
    fn from(err: PlannerError) -> Self {
        match err {
            PlannerError::Plan(PlanError::NoPlanGenerated) => {
                Self::bad_request("no_plan_generated", "No plan generated.")
            }
            PlannerError::Plan(err @ PlanError::InvalidDayCount(_)) => {
                Self::bad_request("invalid_day_count", err.to_string())
            }
            PlannerError::Plan(err @ PlanError::SlotOutOfRange { .. }) => {
                Self::bad_request("slot_out_of_range", err.to_string())
            }
            PlannerError::ItineraryNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "itinerary_not_found", err.to_string())
            }
            PlannerError::UpstreamGeneration(_) => {
                error!(error = %err, "day plan generation failed");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "upstream_generation_failed",
                    "The itinerary generator is unavailable. Retry shortly.",
                )
            }
            PlannerError::Storage(_) => {
                error!(error = %err, "itinerary storage failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_failure",
                    "Saved itineraries could not be read or written.",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_body", rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    generator: &'static str,
    store: &'static str,
    metrics: MetricsSnapshot,
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        generator: state.planner.generator_name(),
        store: state.store_backend,
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

#[derive(Debug, Deserialize)]
struct DayPlanRequest {
    #[serde(default)]
    trip: Option<TripContext>,
}

#[derive(Debug, Serialize)]
struct PlanEnvelope {
    json: Plan,
}

async fn query_day_plan(
    State(state): State<ApiState>,
    body: Result<Json<DayPlanRequest>, JsonRejection>,
) -> Result<Json<PlanEnvelope>, ApiError> {
    let Json(request) = body?;
    let trip = request
        .trip
        .ok_or_else(|| ApiError::bad_request("missing_trip", "Missing 'trip'."))?;

    let plan = state.planner.generate_day_plan(&trip).await?;
    Ok(Json(PlanEnvelope { json: plan }))
}

#[derive(Debug, Deserialize)]
struct NormalizeRequest {
    #[serde(default)]
    raw: Value,
    #[serde(default)]
    trip: Option<TripContext>,
}

async fn query_normalize(
    State(state): State<ApiState>,
    body: Result<Json<NormalizeRequest>, JsonRejection>,
) -> Result<Json<PlanEnvelope>, ApiError> {
    let Json(request) = body?;
    let plan = state
        .planner
        .normalize_raw(&request.raw, request.trip.as_ref())?;
    Ok(Json(PlanEnvelope { json: plan }))
}

#[derive(Debug, Serialize, Deserialize)]
struct ItineraryList {
    itineraries: Vec<SavedItinerary>,
}

async fn itineraries_list(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<ItineraryList>, ApiError> {
    let itineraries = state.planner.list_itineraries(&key).await?;
    Ok(Json(ItineraryList { itineraries }))
}

async fn itineraries_save(
    State(state): State<ApiState>,
    Path(key): Path<String>,
    body: Result<Json<ItineraryList>, JsonRejection>,
) -> Result<Json<ItineraryList>, ApiError> {
    let Json(request) = body?;

    let mut seen = HashSet::new();
    for itinerary in &request.itineraries {
        let name = itinerary.name.trim();
        if name.is_empty() {
            return Err(ApiError::bad_request(
                "invalid_itinerary_name",
                "every itinerary needs a name",
            ));
        }
        if !seen.insert(name) {
            return Err(ApiError::bad_request(
                "duplicate_itinerary_name",
                format!("itinerary {name:?} appears more than once"),
            ));
        }
    }

    state
        .planner
        .save_itineraries(&key, &request.itineraries)
        .await?;
    Ok(Json(request))
}

#[derive(Debug, Serialize)]
struct ItineraryEnvelope {
    itinerary: SavedItinerary,
}

async fn itinerary_day_plan(
    State(state): State<ApiState>,
    Path((key, name)): Path<(String, String)>,
) -> Result<Json<ItineraryEnvelope>, ApiError> {
    let itinerary = state.planner.generate_for_saved(&key, &name).await?;
    Ok(Json(ItineraryEnvelope { itinerary }))
}

#[derive(Debug, Deserialize)]
struct ChoiceRequest {
    day_index: usize,
    slot_index: usize,
    #[serde(default)]
    option: Value,
}

async fn itinerary_choice(
    State(state): State<ApiState>,
    Path((key, name)): Path<(String, String)>,
    body: Result<Json<ChoiceRequest>, JsonRejection>,
) -> Result<Json<PlanEnvelope>, ApiError> {
    let Json(request) = body?;
    let plan = state
        .planner
        .apply_choice(
            &key,
            &name,
            request.day_index,
            request.slot_index,
            &request.option,
        )
        .await?;
    Ok(Json(PlanEnvelope { json: plan }))
}

fn build_cors_layer(config: &Arc<ApiConfig>) -> CorsLayer {
    let config = Arc::clone(config);

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &axum::http::request::Parts| {
                origin
                    .to_str()
                    .map(|origin| config.origin_allowed(origin))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || !is_rate_limited_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        warn!(ip = %ip, path = %request.uri().path(), "rate limited");
        return ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded for this IP",
        )
        .into_response();
    }

    next.run(request).await
}

/// Everything that can reach the generator.
fn is_rate_limited_endpoint(path: &str) -> bool {
    path.starts_with("/query/") || (path.starts_with("/itineraries/") && path.ends_with("/day-plan"))
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .next()
                .unwrap_or("unknown")
                .trim()
                .to_string()
        })
        .unwrap_or_else(|| "local".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_generator_paths_are_rate_limited() {
        assert!(is_rate_limited_endpoint("/query/day-plan"));
        assert!(is_rate_limited_endpoint("/query/normalize"));
        assert!(is_rate_limited_endpoint("/itineraries/alice/Goa/day-plan"));
        assert!(!is_rate_limited_endpoint("/itineraries/alice"));
        assert!(!is_rate_limited_endpoint("/health"));
    }

    #[test]
    fn planner_errors_map_to_statuses() {
        let cases = [
            (PlannerError::Plan(PlanError::NoPlanGenerated), StatusCode::BAD_REQUEST),
            (
                PlannerError::Plan(PlanError::InvalidDayCount("0".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                PlannerError::ItineraryNotFound("Goa".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                PlannerError::UpstreamGeneration(anyhow::anyhow!("503")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PlannerError::Storage(anyhow::anyhow!("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[tokio::test]
    async fn missing_key_and_offline_file_is_a_startup_error() {
        assert!(build_generator(&ApiConfig::default()).await.is_err());

        let keyed = ApiConfig {
            google_api_key: Some("key".to_string()),
            ..ApiConfig::default()
        };
        let generator = build_generator(&keyed).await.unwrap();
        assert_eq!(generator_label(&generator), "gemini");
    }
}
