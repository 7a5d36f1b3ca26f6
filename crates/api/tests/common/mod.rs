// All functions in this module are shared test helpers. Not every test binary
// uses every helper, so we suppress dead_code warnings at the module level.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use promptsmith_api::config::Settings;
use promptsmith_api::engine::compare::CompareOrchestrator;
use promptsmith_api::engine::eval::EvalOrchestrator;
use promptsmith_api::engine::generate::GenerationService;
use promptsmith_api::router::build_app_router;
use promptsmith_api::state::AppState;
use promptsmith_core::planner::PlannedVariant;
use promptsmith_core::refiner::{Suggestion, SuggestionSet};
use promptsmith_core::scoring::Rubric;
use promptsmith_core::types::{CommitStatus, Constraints, LightingShift, ObjectivePreset, StyleDrift};
use promptsmith_openai::error::AdapterError;
use promptsmith_openai::generator::Generator;
use promptsmith_openai::judge::{Judge, JudgeRequest};
use promptsmith_openai::offline::OfflineGenerator;
use promptsmith_openai::planner::VariantPlanner;
use promptsmith_openai::refiner::{Refiner, RunDigest};
use promptsmith_openai::signals::{SemanticScorer, StructuralAssessment, StructuralScorer};
use promptsmith_openai::Adapters;
use promptsmith_store::records::CommitRecord;
use promptsmith_store::{NewCommit, Repository};

// ---------------------------------------------------------------------------
// Stub adapters
// ---------------------------------------------------------------------------

/// Planner producing `{base} mutation {i}` prompts.
pub struct StubPlanner;

#[async_trait]
impl VariantPlanner for StubPlanner {
    async fn plan(
        &self,
        base_prompt: &str,
        _objective: ObjectivePreset,
        _constraints: &Constraints,
        n_variants: usize,
    ) -> Result<Vec<PlannedVariant>, AdapterError> {
        Ok((0..n_variants)
            .map(|index| PlannedVariant {
                variant_prompt: format!("{base_prompt} mutation {}", index + 1),
                mutation_tags: vec![format!("tag-{}", index + 1)],
            })
            .collect())
    }
}

/// Judge returning a fixed strong rubric.
pub struct StubJudge;

#[async_trait]
impl Judge for StubJudge {
    async fn score(&self, _request: JudgeRequest<'_>) -> Result<Rubric, AdapterError> {
        Ok(Rubric {
            prompt_adherence: 0.9,
            subject_fidelity: 0.8,
            composition_quality: 0.8,
            style_coherence: 0.7,
            technical_artifact_penalty: 0.1,
            confidence: 0.85,
            failure_tags: Vec::new(),
            strength_tags: vec!["clean subject".into()],
            rationale: "stub evaluation".into(),
        })
    }
}

/// Judge that always fails, driving the neutral fallback rubric.
pub struct FailingJudge;

#[async_trait]
impl Judge for FailingJudge {
    async fn score(&self, _request: JudgeRequest<'_>) -> Result<Rubric, AdapterError> {
        Err(AdapterError::Upstream {
            status: 502,
            message: "judge is down".into(),
        })
    }
}

/// Refiner returning a fixed complete suggestion set.
pub struct StubRefiner;

#[async_trait]
impl Refiner for StubRefiner {
    async fn synthesize(&self, digest: &RunDigest) -> Result<SuggestionSet, AdapterError> {
        Ok(SuggestionSet {
            conservative: Suggestion {
                prompt_text: digest.base_prompt.clone(),
                rationale: "keep".into(),
            },
            balanced: Suggestion {
                prompt_text: format!("{} refined", digest.base_prompt),
                rationale: "blend".into(),
            },
            aggressive: Suggestion {
                prompt_text: format!("{} reimagined", digest.base_prompt),
                rationale: "explore".into(),
            },
        })
    }
}

/// Semantic scorer returning a fixed similarity.
pub struct StubSemantic(pub f64);

#[async_trait]
impl SemanticScorer for StubSemantic {
    async fn similarity(&self, _baseline: &[u8], _candidate: &[u8]) -> Result<f64, AdapterError> {
        Ok(self.0)
    }
}

/// Semantic scorer that always fails.
pub struct FailingSemantic;

#[async_trait]
impl SemanticScorer for FailingSemantic {
    async fn similarity(&self, _baseline: &[u8], _candidate: &[u8]) -> Result<f64, AdapterError> {
        Err(AdapterError::Timeout("semantic evaluation timed out".into()))
    }
}

/// Structural scorer returning a fixed score.
pub struct StubStructural(pub f64);

#[async_trait]
impl StructuralScorer for StubStructural {
    async fn assess(&self, _baseline: &[u8], _candidate: &[u8]) -> Result<StructuralAssessment, AdapterError> {
        Ok(StructuralAssessment {
            facial_structure_changed: false,
            lighting_shift: LightingShift::Low,
            style_drift: StyleDrift::Low,
            vision_structural_score: self.0,
            notes: "stub structural pass".into(),
        })
    }
}

/// Structural scorer that always fails.
pub struct FailingStructural;

#[async_trait]
impl StructuralScorer for FailingStructural {
    async fn assess(&self, _baseline: &[u8], _candidate: &[u8]) -> Result<StructuralAssessment, AdapterError> {
        Err(AdapterError::Upstream {
            status: 502,
            message: "vision is down".into(),
        })
    }
}

/// Generator that safety-rejects edits whose prompt contains a marker and
/// delegates everything else to the offline generator.
pub struct RejectingGenerator {
    pub marker: String,
    inner: OfflineGenerator,
}

impl RejectingGenerator {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
            inner: OfflineGenerator::default(),
        }
    }
}

#[async_trait]
impl Generator for RejectingGenerator {
    async fn text_to_image(
        &self,
        prompt: &str,
        model: &str,
        quality: promptsmith_core::types::Quality,
    ) -> Result<Vec<u8>, AdapterError> {
        self.inner.text_to_image(prompt, model, quality).await
    }

    async fn image_edit(
        &self,
        base_image: &[u8],
        prompt: &str,
        model: &str,
        quality: promptsmith_core::types::Quality,
    ) -> Result<Vec<u8>, AdapterError> {
        if prompt.contains(&self.marker) {
            return Err(AdapterError::SafetyRejection(
                "Image request rejected by safety system".into(),
            ));
        }
        self.inner.image_edit(base_image, prompt, model, quality).await
    }
}

/// Adapter bundle with working stubs across the board. The generator is the
/// deterministic offline one, which exercises the full commit/blob path.
pub fn stub_adapters() -> Adapters {
    Adapters {
        generator: Arc::new(OfflineGenerator::default()),
        judge: Arc::new(StubJudge),
        planner: Arc::new(StubPlanner),
        refiner: Arc::new(StubRefiner),
        semantic: Arc::new(StubSemantic(0.96)),
        structural: Arc::new(StubStructural(0.05)),
        offline: false,
    }
}

// ---------------------------------------------------------------------------
// Test app construction
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub app: Router,
    pub repository: Arc<Repository>,
    _tmp: TempDir,
}

/// Settings rooted in a fresh temp directory.
pub fn test_settings(tmp: &TempDir) -> Settings {
    Settings {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        data_dir: tmp.path().join("data"),
        image_dir: tmp.path().join("images"),
        artifact_dir: tmp.path().join("artifacts"),
        compare_threshold: 0.30,
        openai_api_key: None,
        openai_image_model: "gpt-image-1".to_string(),
        openai_vision_model: "gpt-4.1-mini".to_string(),
        openai_text_model: "gpt-4.1-mini".to_string(),
        openai_timeout_secs: 5,
        storage_bucket: "promptsmith-images".to_string(),
        storage_prefix: "images".to_string(),
    }
}

/// Full application over temp storage with the default stub adapters.
pub fn build_test_app() -> TestApp {
    build_test_app_with(stub_adapters())
}

/// Full application with a custom adapter bundle.
pub fn build_test_app_with(adapters: Adapters) -> TestApp {
    let tmp = tempfile::tempdir().expect("temp dir");
    let settings = Arc::new(test_settings(&tmp));
    let repository = Arc::new(Repository::new(settings.repository_config()).expect("repository"));

    let state = AppState {
        settings,
        repository: Arc::clone(&repository),
        generation: Arc::new(GenerationService::new(Arc::clone(&repository), adapters.clone())),
        compare: Arc::new(CompareOrchestrator::new(Arc::clone(&repository), adapters.clone())),
        eval: Arc::new(EvalOrchestrator::new(Arc::clone(&repository), adapters)),
    };

    TestApp {
        app: build_app_router(state),
        repository,
        _tmp: tmp,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    app.clone().oneshot(request).await.expect("response")
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

/// Collect the response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Assert an error envelope and return its code.
pub async fn error_code(response: Response<Body>) -> String {
    let json = body_json(response).await;
    let error = &json["error"];
    assert!(error["request_id"].is_string(), "envelope carries a request id");
    assert!(error["message"].is_string(), "envelope carries a message");
    error["code"].as_str().expect("error code").to_string()
}

// ---------------------------------------------------------------------------
// Storage seeding
// ---------------------------------------------------------------------------

/// Encode a tiny solid-color PNG.
pub fn png_bytes(rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(16, 16, image::Rgb(rgb));
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png).expect("png encode");
    buffer.into_inner()
}

/// Seed a successful commit with one stored image.
pub fn seed_commit(repository: &Repository, project_id: &str, parent: Option<&str>, rgb: [u8; 3]) -> CommitRecord {
    repository.ensure_project(project_id).expect("project");
    let commit_id = repository.reserve_commit_id().expect("commit id");
    let image_url = repository
        .blobs()
        .put_commit_image(&commit_id, "img_01.png", &png_bytes(rgb))
        .expect("blob");
    repository
        .create_commit(NewCommit {
            commit_id,
            project_id: project_id.to_string(),
            prompt: "seeded prompt".to_string(),
            model: "stub-model".to_string(),
            seed: None,
            parent_commit_id: parent.map(String::from),
            image_paths: vec![image_url],
            status: CommitStatus::Success,
            error: None,
        })
        .expect("commit")
}

// ---------------------------------------------------------------------------
// Run polling
// ---------------------------------------------------------------------------

/// Poll a run until it reaches a terminal status.
pub async fn poll_run(app: &Router, run_id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let response = get(app, &format!("/eval-runs/{run_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let run = body_json(response).await;
        let status = run["status"].as_str().unwrap_or_default().to_string();
        if matches!(status.as_str(), "completed" | "completed_degraded" | "failed") {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} did not reach a terminal status");
}
