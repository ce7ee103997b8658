//! RESTful API接口模块
//!
//! 为急诊前端、移动端和可穿戴设备网关提供分诊REST接口

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use triage_core::{
    AiAnalysisResult, AnalysisOverride, Language, PatientIntake, PatientStatus,
    PronunciationEntry, TriageError,
};
use triage_workflow::{
    IntakeSubmission, PatientRecord, RosterFilter, RosterStats, SosSubmission, TriageEngine,
    EXPORT_COLUMNS,
};
use uuid::Uuid;

use crate::client::TriageServiceClient;

/// API状态
#[derive(Clone)]
pub struct ApiState {
    pub engine: TriageEngine,
    pub client: TriageServiceClient,
}

impl ApiState {
    pub fn new(engine: TriageEngine, client: TriageServiceClient) -> Self {
        Self { engine, client }
    }
}

/// API错误，按错误类别映射HTTP状态码
#[derive(Debug)]
pub struct ApiError(pub TriageError);

impl From<TriageError> for ApiError {
    fn from(error: TriageError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TriageError::NotFound(_) => StatusCode::NOT_FOUND,
            TriageError::Validation(_) => StatusCode::BAD_REQUEST,
            TriageError::Upstream(_) | TriageError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    pub intake: PatientIntake,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub intake: PatientIntake,
    #[serde(default)]
    pub analysis: Option<AiAnalysisResult>,
    #[serde(default, rename = "override")]
    pub analysis_override: Option<AnalysisOverride>,
    #[serde(default)]
    pub language: Language,
}

impl From<CreatePatientRequest> for IntakeSubmission {
    fn from(request: CreatePatientRequest) -> Self {
        Self {
            intake: request.intake,
            analysis: request.analysis,
            analysis_override: request.analysis_override,
            language: request.language,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: PatientStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageQuery {
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Deserialize)]
pub struct FollowUpRequest {
    pub symptoms: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowUpResponse {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct PronunciationRequest {
    pub text: String,
}

/// API处理器
pub struct ApiHandler;

impl ApiHandler {
    /// 健康检查
    pub async fn health_check(State(state): State<ApiState>) -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
            "reasoningBackend": state.client.backend_name(),
        }))
    }

    /// 评估但不建档，供人工复核
    pub async fn assess(
        State(state): State<ApiState>,
        Json(request): Json<AssessRequest>,
    ) -> Json<AiAnalysisResult> {
        info!("Assessing intake for review ({:?})", request.language);
        Json(state.engine.assess(&request.intake, request.language).await)
    }

    pub async fn create_patient(
        State(state): State<ApiState>,
        Json(request): Json<CreatePatientRequest>,
    ) -> ApiResult<(StatusCode, Json<PatientRecord>)> {
        let record = state.engine.submit_intake(request.into()).await?;
        Ok((StatusCode::CREATED, Json(record)))
    }

    pub async fn create_sos(
        State(state): State<ApiState>,
        Json(request): Json<SosSubmission>,
    ) -> ApiResult<(StatusCode, Json<PatientRecord>)> {
        let record = state.engine.submit_sos(request).await?;
        Ok((StatusCode::CREATED, Json(record)))
    }

    /// 排序后的名册视图
    pub async fn list_patients(
        State(state): State<ApiState>,
        Query(filter): Query<RosterFilter>,
    ) -> Json<Vec<PatientRecord>> {
        Json(state.engine.sorted_patients(&filter).await)
    }

    pub async fn get_patient(
        State(state): State<ApiState>,
        Path(id): Path<Uuid>,
    ) -> ApiResult<Json<PatientRecord>> {
        Ok(Json(state.engine.get_patient(id).await?))
    }

    pub async fn change_status(
        State(state): State<ApiState>,
        Path(id): Path<Uuid>,
        Json(request): Json<StatusChangeRequest>,
    ) -> ApiResult<Json<PatientRecord>> {
        Ok(Json(state.engine.change_status(id, request.status).await?))
    }

    pub async fn request_teleconsult(
        State(state): State<ApiState>,
        Path(id): Path<Uuid>,
    ) -> ApiResult<Json<PatientRecord>> {
        Ok(Json(state.engine.request_teleconsult(id).await?))
    }

    pub async fn reassess(
        State(state): State<ApiState>,
        Path(id): Path<Uuid>,
        Query(query): Query<LanguageQuery>,
    ) -> ApiResult<Json<PatientRecord>> {
        Ok(Json(state.engine.reassess(id, query.language).await?))
    }

    /// 固定列顺序的导出
    pub async fn export(State(state): State<ApiState>) -> Json<Value> {
        let rows = state.engine.export().await;
        Json(json!({
            "columns": EXPORT_COLUMNS,
            "rows": rows,
        }))
    }

    pub async fn stats(State(state): State<ApiState>) -> Json<RosterStats> {
        Json(state.engine.stats().await)
    }

    pub async fn follow_up(
        State(state): State<ApiState>,
        Json(request): Json<FollowUpRequest>,
    ) -> Json<FollowUpResponse> {
        let question = state
            .client
            .follow_up_question(
                &request.symptoms,
                &request.age,
                &request.gender,
                request.language,
            )
            .await;
        Json(FollowUpResponse { question })
    }

    pub async fn pronunciation(
        State(state): State<ApiState>,
        Json(request): Json<PronunciationRequest>,
    ) -> Json<Vec<PronunciationEntry>> {
        Json(state.client.pronunciation_guide(&request.text).await)
    }
}

/// 创建API路由
pub fn create_router(state: ApiState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(ApiHandler::health_check))
        .route("/triage/assess", post(ApiHandler::assess))
        .route("/triage/follow-up", post(ApiHandler::follow_up))
        .route("/triage/pronunciation", post(ApiHandler::pronunciation))
        .route(
            "/patients",
            get(ApiHandler::list_patients).post(ApiHandler::create_patient),
        )
        .route("/patients/sos", post(ApiHandler::create_sos))
        .route("/patients/export", get(ApiHandler::export))
        .route("/patients/stats", get(ApiHandler::stats))
        .route("/patients/:id", get(ApiHandler::get_patient))
        .route("/patients/:id/status", post(ApiHandler::change_status))
        .route("/patients/:id/teleconsult", post(ApiHandler::request_teleconsult))
        .route("/patients/:id/reassess", post(ApiHandler::reassess))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// API服务器
pub struct ApiServer {
    app: Router,
}

impl ApiServer {
    pub fn new(state: ApiState, enable_cors: bool) -> Self {
        Self {
            app: create_router(state, enable_cors),
        }
    }

    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        info!("Starting triage API server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}
