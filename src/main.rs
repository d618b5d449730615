use axum::{
    extract::{Json, Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

mod config;
mod models;
mod palette;
mod renderer;
mod scene;
mod style;
mod template_engine;
mod utils;

use config::Config;
use models::{FeatureCollection, RenderRequest};
use renderer::MapRenderer;
use scene::Scene;
use template_engine::TemplateEngine;
use utils::{fetch_overlay, is_valid_target};

const DEFAULT_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_TARGET: &str = "map";
const DEFAULT_GRADIENT_TARGET: &str = "gradient-map";
const DEFAULT_OVERLAY_TIMEOUT_SECS: u64 = 5;
const DEFAULT_OVERLAY_REFRESH_SECS: u64 = 300;

#[derive(Deserialize, Default)]
struct TargetQuery {
    target: Option<String>,
}

/// Last successfully fetched overlay, kept across failed refreshes.
#[derive(Default)]
struct OverlayCache {
    collection: Option<Arc<FeatureCollection>>,
    last_error: Option<String>,
}

struct AppState {
    template_engine: TemplateEngine,
    config: Config,
    http_client: reqwest::Client,
    renderer: MapRenderer,
    overlay: RwLock<OverlayCache>,
}

impl AppState {
    fn new(config: Config) -> anyhow::Result<Self> {
        let template_dir = config.template_dir.clone().unwrap_or_else(|| "data/templates".to_string());
        let template_engine = TemplateEngine::new(template_dir.into())?;
        debug!("templates loaded from {}", template_engine.base_path().display());
        let overlay_timeout = config.overlay_timeout_secs.unwrap_or(DEFAULT_OVERLAY_TIMEOUT_SECS).max(1);
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("walkmap/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(overlay_timeout))
            .build()?;
        let renderer = MapRenderer::new(config.map.clone());
        Ok(Self {
            template_engine,
            config,
            http_client,
            renderer,
            overlay: RwLock::new(OverlayCache::default()),
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let config = Config::load()?;
    let thread_count = config.thread_count.unwrap_or_else(num_cpus::get);

    info!("starting server with {} threads", thread_count);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(thread_count)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn log_request_response(
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().to_string();
    info!("incoming request: {} {}", method, path);
    let response = next.run(req).await;
    info!("request result: {} for {} {}", response.status(), method, path);
    response
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    let addr = config.listen_addr.clone().unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let state = Arc::new(AppState::new(config)?);
    let options = state.renderer.options();
    info!(
        "map defaults: zoom {}, marker style {:?}, origin label '{}'",
        options.zoom, options.marker_style, options.origin_label
    );
    if state.config.overlay_url.is_some() {
        tokio::spawn(refresh_overlay_periodically(state.clone()));
    }
    let app = router(state);

    info!("listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/render", post(post_render))
        .route("/render/style", post(post_render_style))
        .route("/render/page", post(post_render_page))
        .route("/render/page/{template}", post(post_render_page_template))
        .route("/gradient", post(post_gradient))
        .layer(middleware::from_fn(log_request_response))
        .with_state(state)
}

// --- Handlers ---

async fn post_render(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TargetQuery>,
    Json(req): Json<RenderRequest>,
) -> Response {
    match build_scene(&state, query.target, &req).await {
        Ok(scene) => Json(scene).into_response(),
        Err(resp) => resp,
    }
}

async fn post_render_style(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TargetQuery>,
    Json(req): Json<RenderRequest>,
) -> Response {
    match build_scene(&state, query.target, &req).await {
        Ok(scene) => Json(style::to_style(&scene)).into_response(),
        Err(resp) => resp,
    }
}

async fn post_render_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TargetQuery>,
    Json(req): Json<RenderRequest>,
) -> Response {
    render_page(state, "map", query.target, req).await
}

async fn post_render_page_template(
    State(state): State<Arc<AppState>>,
    Path(template): Path<String>,
    Query(query): Query<TargetQuery>,
    Json(req): Json<RenderRequest>,
) -> Response {
    render_page(state, &template, query.target, req).await
}

async fn post_gradient(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TargetQuery>,
    Json(req): Json<RenderRequest>,
) -> Response {
    let target = match resolve_target(query.target, DEFAULT_GRADIENT_TARGET) {
        Ok(target) => target,
        Err(resp) => return resp,
    };
    match state.renderer.render_gradient(&target, &req) {
        Some(scene) => Json(scene).into_response(),
        None => (StatusCode::NOT_FOUND, "request has no gradient layer").into_response(),
    }
}

// --- Helper Functions ---

async fn render_page(state: Arc<AppState>, template: &str, target: Option<String>, req: RenderRequest) -> Response {
    let scene = match build_scene(&state, target, &req).await {
        Ok(scene) => scene,
        Err(resp) => return resp,
    };
    match state.template_engine.render_page(template, &scene, &req) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("template page error ({}): {}", template, e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("error rendering template: {}", e)).into_response()
        }
    }
}

fn resolve_target(target: Option<String>, default: &str) -> Result<String, Response> {
    let target = target.unwrap_or_else(|| default.to_string());
    if is_valid_target(&target) {
        Ok(target)
    } else {
        Err((StatusCode::BAD_REQUEST, "invalid target element id").into_response())
    }
}

// --- Core Logic ---

async fn build_scene(state: &AppState, target: Option<String>, req: &RenderRequest) -> Result<Scene, Response> {
    let target = resolve_target(target, DEFAULT_TARGET)?;
    let mut scene = state.renderer.render(&target, req);

    if let Some(url) = &state.config.overlay_url {
        let cache = state.overlay.read().await;
        match &cache.collection {
            Some(overlay) => {
                let added = state.renderer.add_overlay(&mut scene, overlay);
                debug!("overlay {} contributed {} stops", url, added);
            }
            None => {
                let reason = cache.last_error.as_deref().unwrap_or("not loaded yet");
                scene.diagnostics.push(format!("overlay unavailable: {}", reason));
            }
        }
    }
    Ok(scene)
}

// --- Overlay ---

async fn refresh_overlay(state: &AppState) {
    let Some(url) = &state.config.overlay_url else {
        return;
    };
    match fetch_overlay(&state.http_client, url).await {
        Ok(collection) => {
            info!("overlay {} loaded with {} features", url, collection.features.len());
            let mut cache = state.overlay.write().await;
            cache.collection = Some(Arc::new(collection));
            cache.last_error = None;
        }
        Err(e) => {
            let message = e.to_string();
            error!("failed to fetch overlay {}: {}", url, message);
            state.overlay.write().await.last_error = Some(message);
        }
    }
}

async fn refresh_overlay_periodically(state: Arc<AppState>) {
    let period = state.config.overlay_refresh_secs.unwrap_or(DEFAULT_OVERLAY_REFRESH_SECS).max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(period));
    loop {
        ticker.tick().await;
        refresh_overlay(&state).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn state(config: &str, dir: &tempfile::TempDir) -> Arc<AppState> {
        let mut config = Config::parse(config).unwrap();
        config.template_dir = Some(dir.path().to_string_lossy().into_owned());
        Arc::new(AppState::new(config).unwrap())
    }

    fn request() -> RenderRequest {
        serde_json::from_value(json!({
            "center": { "lat": 40.0, "lon": -75.0 },
            "buffers_m": [400, 800],
            "breakdown": [
                { "name": "metro", "weight": 1, "nearby_count": 2 },
                { "name": "parks", "weight": 0, "nearby_count": 5 }
            ],
            "nearby": [{ "geometry": { "coordinates": [-75.001, 40.001] }, "category": "metro", "name": "Stop A" }]
        }))
        .unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn render_returns_scene() {
        let dir = tempfile::tempdir().unwrap();
        let resp = post_render(State(state("", &dir)), Query(TargetQuery::default()), Json(request())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let scene = body_json(resp).await;
        assert_eq!(scene["target"], "map");
        let kinds: Vec<_> = scene["layers"].as_array().unwrap().iter().map(|l| l["kind"].as_str().unwrap().to_string()).collect();
        assert_eq!(kinds, vec!["tile", "marker", "circle", "marker"]);
    }

    #[tokio::test]
    async fn bad_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let query = TargetQuery { target: Some("<x>".into()) };
        let resp = post_render(State(state("", &dir)), Query(query), Json(request())).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn overlay_failure_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(r#"overlay_url = "http://127.0.0.1:9/stops.geojson""#, &dir);
        refresh_overlay(&state).await;
        assert!(state.overlay.read().await.last_error.is_some());
        let resp = post_render(State(state), Query(TargetQuery::default()), Json(request())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let scene = body_json(resp).await;
        assert_eq!(scene["layers"].as_array().unwrap().len(), 4);
        assert!(scene["diagnostics"][0].as_str().unwrap().starts_with("overlay unavailable"));
    }

    #[tokio::test]
    async fn silent_overlay_host_does_not_stall_renders() {
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = silent.accept().await {
                held.push(socket);
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let config = format!("overlay_url = \"http://{}/stops.geojson\"\noverlay_timeout_secs = 1", addr);
        let state = state(&config, &dir);

        let render = post_render(State(state.clone()), Query(TargetQuery::default()), Json(request()));
        let resp = tokio::time::timeout(Duration::from_secs(5), render).await.expect("render waited on overlay host");
        assert_eq!(resp.status(), StatusCode::OK);

        let refresh = tokio::time::timeout(Duration::from_secs(5), refresh_overlay(&state)).await;
        assert!(refresh.is_ok());
        assert!(state.overlay.read().await.last_error.is_some());
    }

    #[tokio::test]
    async fn served_overlay_is_merged() {
        let app = Router::new().route(
            "/stops.geojson",
            axum::routing::get(|| async {
                Json(json!({
                    "type": "FeatureCollection",
                    "features": [{
                        "type": "Feature",
                        "geometry": { "type": "Point", "coordinates": [-75.002, 40.002] },
                        "properties": { "stop_name": "Berri-UQAM" }
                    }]
                }))
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let dir = tempfile::tempdir().unwrap();
        let state = state(&format!("overlay_url = \"http://{}/stops.geojson\"", addr), &dir);
        refresh_overlay(&state).await;

        let resp = post_render(State(state), Query(TargetQuery::default()), Json(request())).await;
        let scene = body_json(resp).await;
        let stops: Vec<_> = scene["layers"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|l| l["kind"] == "circle_marker")
            .collect();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0]["style"]["fill_color"], "#0ea5e9");
        assert_eq!(stops[0]["popup"], "Berri-UQAM");
        assert!(scene["diagnostics"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn style_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let resp = post_render_style(State(state("", &dir)), Query(TargetQuery::default()), Json(request())).await;
        let style = body_json(resp).await;
        assert_eq!(style["version"], 8);
        assert_eq!(style["name"], "map");
    }

    #[tokio::test]
    async fn page_endpoint_uses_target() {
        let dir = tempfile::tempdir().unwrap();
        let query = TargetQuery { target: Some("walk".into()) };
        let resp = post_render_page(State(state("", &dir)), Query(query), Json(request())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("<div id=\"walk\"></div>"));
    }

    #[tokio::test]
    async fn missing_page_template_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let resp = post_render_page_template(
            State(state("", &dir)),
            Path("nope".to_string()),
            Query(TargetQuery::default()),
            Json(request()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn gradient_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let resp = post_gradient(State(state("", &dir)), Query(TargetQuery::default()), Json(request())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let mut req = request();
        req.gradient_layer = serde_json::from_value(json!({
            "features": [{ "geometry": { "coordinates": [-75.0, 40.0] }, "properties": { "score": 0.95 } }]
        }))
        .unwrap();
        let resp = post_gradient(State(state("", &dir)), Query(TargetQuery::default()), Json(req)).await;
        let scene = body_json(resp).await;
        assert_eq!(scene["target"], "gradient-map");
        assert_eq!(scene["layers"][1]["style"]["fill_color"], "#ea580c");
    }
}
