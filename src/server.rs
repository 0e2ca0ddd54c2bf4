use crate::annotate::{encode_png, Annotator};
use crate::config::Config;
use crate::engine::{extract, EngineCell, Extraction, Polygon, TextRegion};
use crate::engines;
use crate::error::OcrError;
use crate::plates::{
    extract_plate, normalize_plate, GateAction, GateDecision, PlateEntry, PlateRegistry,
    PlateStatus,
};
use crate::preprocessing::{Pipeline, PreprocessingStats, Preset};
use crate::ui;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use base64::Engine as _;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Formats the upload form advertises
const SUPPORTED_FORMATS: [&str; 2] = ["image/png", "image/jpeg"];

/// Room for multipart boundaries and form fields on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EngineCell>,
    pub annotator: Arc<Annotator>,
    pub plates: Arc<RwLock<PlateRegistry>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, engine: EngineCell, annotator: Annotator) -> Self {
        Self {
            engine: Arc::new(engine),
            annotator: Arc::new(annotator),
            plates: Arc::new(RwLock::new(PlateRegistry::with_defaults())),
            config: Arc::new(config),
        }
    }
}

/// One detected region in an OCR response
#[derive(Serialize)]
pub struct RegionResponse {
    pub index: usize,
    pub bounding_box: Polygon,
    pub text: String,
    pub confidence: f32,
}

/// OCR response
#[derive(Serialize)]
pub struct OcrResponse {
    pub regions: Vec<RegionResponse>,
    pub text: String,
    pub confidence: f32,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
    pub engine: String,
    pub preprocessing: PreprocessingStats,
    /// Base64 PNG with regions drawn, when the form sets `annotate`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_png: Option<String>,
}

/// Gate decision response
#[derive(Serialize)]
pub struct GateResponse {
    pub plate: String,
    pub action: GateAction,
    pub decision: GateDecision,
    pub allowed: bool,
    pub message: String,
    /// Status after the action; absent for unknown plates
    pub status: Option<PlateStatus>,
}

#[derive(Deserialize)]
pub struct AddPlateRequest {
    pub plate: String,
    pub status: PlateStatus,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: String,
    pub engine_description: Option<String>,
    pub engine_loaded: bool,
    pub supported_formats: Vec<String>,
    pub presets: Vec<&'static str>,
    pub default_preset: &'static str,
    pub max_file_size_bytes: usize,
    pub label_font: bool,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let engine = engines::default_engine(&config);
    let annotator = Annotator::from_font_path(config.font_path.as_deref());
    let preload = config.preload;

    let state = AppState::new(config, engine, annotator);

    if preload {
        state.engine.get().await?;
    }

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(ui::index))
        .route("/ocr", post(handle_ocr))
        .route("/ocr/annotated", post(handle_ocr_annotated))
        .route("/plates", get(handle_list_plates).post(handle_add_plate))
        .route("/plates/scan", post(handle_scan_plate))
        .route("/plates/:plate/entry", post(handle_plate_entry))
        .route("/plates/:plate/exit", post(handle_plate_exit))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// An uploaded image plus any other text fields from the form
struct Upload {
    data: Bytes,
    fields: HashMap<String, String>,
}

impl Upload {
    fn preset(&self, default: Preset) -> Result<Preset, OcrError> {
        match self.fields.get("preset").map(|s| s.trim()) {
            None | Some("") => Ok(default),
            Some(name) => Preset::parse(name).ok_or_else(|| {
                OcrError::InvalidRequest(format!(
                    "Unknown preset '{}' (expected one of: {})",
                    name,
                    Preset::names().join(", ")
                ))
            }),
        }
    }

    /// Checkbox-style form field
    fn flag(&self, name: &str) -> bool {
        matches!(
            self.fields.get(name).map(|s| s.trim()),
            Some("true" | "1" | "on")
        )
    }
}

async fn read_upload(mut multipart: Multipart, max_file_size: usize) -> Result<Upload, OcrError> {
    let mut file_data: Option<Bytes> = None;
    let mut content_type: Option<String> = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Failed to parse multipart", max_file_size))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            content_type = field.content_type().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, "Failed to read file data", max_file_size))?,
            );
        } else {
            let value = field.text().await.map_err(|e| {
                let context = format!("Invalid field '{}'", name);
                multipart_error(e, &context, max_file_size)
            })?;
            fields.insert(name, value);
        }
    }

    let data = file_data.ok_or(OcrError::MissingFile)?;

    if data.len() > max_file_size {
        return Err(OcrError::ImageTooLarge {
            size: data.len(),
            max: max_file_size,
        });
    }

    let mime = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    if !SUPPORTED_FORMATS.contains(&mime.as_str()) {
        tracing::warn!("Received file with content type: {}", mime);
    }

    Ok(Upload { data, fields })
}

/// The body limit surfaces as a multipart read error; report it as 413
fn multipart_error(err: MultipartError, context: &str, max_file_size: usize) -> OcrError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!("Upload rejected by body limit: {}", err);
        return OcrError::UploadTooLarge { max: max_file_size };
    }
    OcrError::InvalidRequest(format!("{}: {}", context, err))
}

fn decode_image(data: &[u8]) -> Result<DynamicImage, OcrError> {
    image::load_from_memory(data).map_err(|e| OcrError::DecodeError(e.to_string()))
}

/// Decode, then preprocess and recognize on the blocking pool
async fn run_extraction(
    state: &AppState,
    upload: &Upload,
) -> Result<(DynamicImage, Extraction, &'static str), OcrError> {
    let preset = upload.preset(state.config.default_preset)?;
    let image = decode_image(&upload.data)?;
    let engine = state.engine.get().await?;
    let engine_name = engine.name();

    let (image, extraction) = tokio::task::spawn_blocking(move || {
        let extraction = extract(engine.as_ref(), &image, &Pipeline::new(preset))?;
        Ok::<_, OcrError>((image, extraction))
    })
    .await
    .map_err(|e| OcrError::Internal(format!("OCR task failed: {}", e)))??;

    Ok((image, extraction, engine_name))
}

/// Draw regions on the blocking pool and encode the result as PNG
async fn render_annotated(
    annotator: Arc<Annotator>,
    image: DynamicImage,
    regions: Vec<TextRegion>,
) -> Result<(Vec<u8>, Vec<String>), OcrError> {
    tokio::task::spawn_blocking(move || {
        let annotated = annotator.render(&image, &regions);
        encode_png(&annotated.image).map(|png| (png, annotated.warnings))
    })
    .await
    .map_err(|e| OcrError::Internal(format!("Annotation task failed: {}", e)))?
}

/// Handle OCR requests
async fn handle_ocr(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OcrResponse>, OcrError> {
    let start = Instant::now();

    let upload = read_upload(multipart, state.config.max_file_size).await?;
    let annotate = upload.flag("annotate");
    let (image, extraction, engine_name) = run_extraction(&state, &upload).await?;

    let mut result = extraction.result;
    let annotated_png = if annotate {
        let (png, drawing_warnings) =
            render_annotated(state.annotator.clone(), image, result.regions.clone()).await?;
        result.warnings.extend(drawing_warnings);
        Some(base64::engine::general_purpose::STANDARD.encode(png))
    } else {
        None
    };

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "OCR completed in {}ms, {} regions, confidence: {:.2}",
        processing_time_ms,
        result.regions.len(),
        result.confidence
    );

    let regions = result
        .regions
        .into_iter()
        .enumerate()
        .map(|(index, region)| RegionResponse {
            index,
            bounding_box: region.polygon,
            text: region.text,
            confidence: region.confidence,
        })
        .collect();

    Ok(Json(OcrResponse {
        regions,
        text: result.text,
        confidence: result.confidence,
        processing_time_ms,
        warnings: result.warnings,
        engine: engine_name.to_string(),
        preprocessing: extraction.preprocessing,
        annotated_png,
    }))
}

/// Handle OCR requests that want the annotated image back
async fn handle_ocr_annotated(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, OcrError> {
    let upload = read_upload(multipart, state.config.max_file_size).await?;
    let (image, extraction, _) = run_extraction(&state, &upload).await?;

    let regions = extraction.result.regions;
    let mut warnings = extraction.result.warnings;
    let region_count = regions.len();

    let (png, drawing_warnings) = render_annotated(state.annotator.clone(), image, regions).await?;
    warnings.extend(drawing_warnings);

    let mut response = (
        [(header::CONTENT_TYPE, HeaderValue::from_static("image/png"))],
        png,
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert("x-ocr-regions", HeaderValue::from(region_count));
    if !warnings.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&warnings.join("; ")) {
            headers.insert("x-ocr-warnings", value);
        }
    }

    Ok(response)
}

/// Read a plate from the uploaded image and apply the requested gate action
async fn handle_scan_plate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GateResponse>, OcrError> {
    let upload = read_upload(multipart, state.config.max_file_size).await?;

    let action = upload
        .fields
        .get("action")
        .ok_or_else(|| OcrError::InvalidRequest("Missing 'action' field".to_string()))
        .and_then(|raw| parse_action(raw))?;

    let (_, extraction, _) = run_extraction(&state, &upload).await?;
    let plate = extract_plate(&extraction.result.regions).ok_or(OcrError::NoPlateDetected)?;

    tracing::info!("Read plate {} from upload", plate);

    apply_gate(&state, &plate, action).map(Json)
}

async fn handle_plate_entry(
    State(state): State<AppState>,
    Path(plate): Path<String>,
) -> Result<Json<GateResponse>, OcrError> {
    apply_gate(&state, &plate, GateAction::Entry).map(Json)
}

async fn handle_plate_exit(
    State(state): State<AppState>,
    Path(plate): Path<String>,
) -> Result<Json<GateResponse>, OcrError> {
    apply_gate(&state, &plate, GateAction::Exit).map(Json)
}

async fn handle_list_plates(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlateEntry>>, OcrError> {
    let registry = state.plates.read().map_err(|_| registry_poisoned())?;
    Ok(Json(registry.list()))
}

async fn handle_add_plate(
    State(state): State<AppState>,
    Json(request): Json<AddPlateRequest>,
) -> Result<(StatusCode, Json<PlateEntry>), OcrError> {
    let mut registry = state.plates.write().map_err(|_| registry_poisoned())?;
    let entry = registry
        .add(&request.plate, request.status)
        .ok_or_else(|| {
            OcrError::InvalidRequest("Plate must contain at least one letter or digit".to_string())
        })?;

    Ok((StatusCode::CREATED, Json(entry)))
}

fn apply_gate(
    state: &AppState,
    plate: &str,
    action: GateAction,
) -> Result<GateResponse, OcrError> {
    let mut registry = state.plates.write().map_err(|_| registry_poisoned())?;
    let decision = registry.apply(plate, action);
    let status = registry.status(plate);

    Ok(GateResponse {
        plate: normalize_plate(plate),
        action,
        decision,
        allowed: decision.allowed(),
        message: decision.message().to_string(),
        status,
    })
}

fn parse_action(raw: &str) -> Result<GateAction, OcrError> {
    GateAction::parse(raw).ok_or_else(|| {
        OcrError::InvalidRequest(format!("Unknown action '{}' (expected entry or exit)", raw))
    })
}

fn registry_poisoned() -> OcrError {
    OcrError::Internal("Plate registry lock poisoned".to_string())
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let loaded = state.engine.loaded();

    let supported_formats = match &loaded {
        Some(engine) => engine.supported_formats(),
        None => SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
    };

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.engine.name().to_string(),
        engine_description: loaded.as_ref().map(|e| e.description().to_string()),
        engine_loaded: loaded.is_some(),
        supported_formats,
        presets: Preset::names(),
        default_preset: state.config.default_preset.as_str(),
        max_file_size_bytes: state.config.max_file_size,
        label_font: state.annotator.has_font(),
    })
}
