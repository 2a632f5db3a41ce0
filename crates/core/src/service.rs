//! Public operations with JSON-shaped responses.

use crate::catalog::AssetCatalog;
use crate::classifier::{self, StyleVerdict};
use crate::config::AppConfig;
use crate::encoder::{ImageEncoder, NetworkClassifier, PrivateRangeClassifier};
use crate::error::{AppError, Result};
use crate::keywords::KeywordTable;
use crate::models::{
    Asset, CommentResult, FontAsset, ImageRequest, Recommendation, RequestOrigin, ScoredAsset,
    StyleLabel,
};
use crate::pipeline::CommentPipeline;
use crate::recommend::TemplateRecommender;
use crate::uploads;
use providers::noop::NoopProvider;
use providers::openai::{OpenAiConfig, OpenAiVisionProvider};
use providers::{ProviderRegistry, VisionProvider};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use storage::{AssetStore, LocalStore, StoredFile};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub items: Vec<T>,
}

impl<T> ListResponse<T> {
    fn of(items: Vec<T>) -> Self {
        Self {
            success: true,
            items,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendResponse {
    pub success: bool,
    /// `None` only when the catalog was empty before a style was inferred.
    pub style: Option<StyleLabel>,
    pub template: Option<Asset>,
    pub score: u32,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecommendResponse {
    fn from_outcome(
        style: Option<StyleLabel>,
        rationale: Option<String>,
        outcome: Result<Recommendation>,
    ) -> Result<Self> {
        match outcome {
            Ok(rec) => Ok(Self {
                success: true,
                style: Some(rec.style),
                score: rec.score,
                matched: rec.matched,
                reason: Some(rec.reason),
                template: Some(rec.template),
                rationale,
                message: None,
            }),
            Err(AppError::EmptyCatalog) => Ok(Self {
                success: true,
                style,
                template: None,
                score: 0,
                matched: false,
                rationale,
                reason: None,
                message: Some("no template available".to_string()),
            }),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<CommentResult>,
}

impl BatchResponse {
    fn from_results(results: Vec<CommentResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            success: true,
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

pub struct AnnotatorService {
    config: AppConfig,
    catalog: AssetCatalog,
    encoder: ImageEncoder,
    recommender: TemplateRecommender,
    registry: ProviderRegistry,
}

impl AnnotatorService {
    /// Local store under `assets.root`, providers from the environment.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn AssetStore> = Arc::new(LocalStore::new(&config.assets.root));
        let registry = build_registry(&config);
        Self::new(config, store, registry, Arc::new(PrivateRangeClassifier))
    }

    pub fn new(
        config: AppConfig,
        store: Arc<dyn AssetStore>,
        registry: ProviderRegistry,
        network: Arc<dyn NetworkClassifier>,
    ) -> Result<Self> {
        let table = KeywordTable::load_or_default(config.recommend.keywords_path.as_deref())?;
        Ok(Self {
            catalog: AssetCatalog::new(store.clone(), config.assets.clone())?,
            encoder: ImageEncoder::with_classifier(store, network),
            recommender: TemplateRecommender::new(table),
            registry,
            config,
        })
    }

    pub fn list_templates(&self) -> Result<ListResponse<Asset>> {
        Ok(ListResponse::of(self.catalog.templates()?))
    }

    pub fn list_emojis(&self) -> Result<ListResponse<Asset>> {
        Ok(ListResponse::of(self.catalog.emojis()?))
    }

    pub fn list_fonts(&self) -> Result<ListResponse<FontAsset>> {
        Ok(ListResponse::of(self.catalog.fonts()?))
    }

    pub fn upload_image(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile> {
        uploads::upload_image(
            self.catalog.store().as_ref(),
            &self.config.assets.uploads_dir,
            original_name,
            bytes,
            self.config.assets.max_upload_bytes,
        )
    }

    pub fn add_user_template(&self, original_name: &str, bytes: &[u8]) -> Result<Asset> {
        self.catalog.add_user_template(original_name, bytes)
    }

    pub fn remove_user_template(&self, name: &str) -> Result<()> {
        self.catalog.remove_user_template(name)
    }

    pub fn recommend_for_style(&self, style: &str, rationale: &str) -> Result<RecommendResponse> {
        self.recommend_for_style_with(style, rationale, &mut rand::thread_rng())
    }

    pub fn recommend_for_style_with<R: Rng + ?Sized>(
        &self,
        style: &str,
        rationale: &str,
        rng: &mut R,
    ) -> Result<RecommendResponse> {
        if style.trim().is_empty() {
            return Err(AppError::Validation("style is required".to_string()));
        }
        let style = StyleLabel::parse_lenient(style);
        let templates = self.catalog.templates()?;
        let outcome = self.recommender.recommend(&templates, style, rationale, rng);
        RecommendResponse::from_outcome(Some(style), None, outcome)
    }

    /// Full ranking behind a style recommendation, best first.
    pub fn rank_templates(&self, style: &str, rationale: &str) -> Result<Vec<ScoredAsset>> {
        let style = StyleLabel::parse_lenient(style);
        let templates = self.catalog.templates()?;
        Ok(self.recommender.rank(&templates, style, rationale))
    }

    /// Ask the model for a style, then recommend a template for it.
    pub async fn recommend_for_image(
        &self,
        image: &str,
        origin: Option<&RequestOrigin>,
        instruction: Option<&str>,
    ) -> Result<RecommendResponse> {
        require_image(image)?;
        let templates = self.catalog.templates()?;
        if templates.is_empty() {
            info!(%image, "no templates, skipping style inference");
            return RecommendResponse::from_outcome(None, None, Err(AppError::EmptyCatalog));
        }
        let encoded = self.encoder.encode(image, origin)?;
        let provider = self.vision()?;
        let instruction = instruction
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.recommend.style_instruction);
        let StyleVerdict { style, rationale } =
            classifier::classify_style(provider.as_ref(), &encoded, instruction).await?;
        info!(%image, %style, "style inferred for image");

        let outcome = {
            let mut rng = rand::thread_rng();
            self.recommender
                .recommend(&templates, style, &rationale, &mut rng)
        };
        RecommendResponse::from_outcome(Some(style), Some(rationale), outcome)
    }

    pub async fn comment_image(
        &self,
        image: &str,
        origin: Option<&RequestOrigin>,
        instruction: Option<&str>,
    ) -> Result<CommentResponse> {
        require_image(image)?;
        let comment = self
            .pipeline()?
            .generate_single(image, origin, instruction)
            .await?;
        Ok(CommentResponse {
            success: true,
            comment,
        })
    }

    pub async fn comment_batch(
        &self,
        images: &[ImageRequest],
        origin: Option<&RequestOrigin>,
        instruction: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BatchResponse> {
        if images.is_empty() {
            return Err(AppError::Validation(
                "images must be a non-empty list".to_string(),
            ));
        }
        let results = self
            .pipeline()?
            .generate_batch(images, origin, instruction, cancel)
            .await?;
        Ok(BatchResponse::from_results(results))
    }

    fn vision(&self) -> Result<Arc<dyn VisionProvider>> {
        self.registry
            .vision(None)
            .map_err(|e| AppError::Config(e.to_string()))
    }

    fn pipeline(&self) -> Result<CommentPipeline> {
        Ok(CommentPipeline::new(
            self.encoder.clone(),
            self.vision()?,
            self.config.comments.clone(),
        ))
    }
}

fn require_image(image: &str) -> Result<()> {
    if image.trim().is_empty() {
        return Err(AppError::Validation("image path is required".to_string()));
    }
    Ok(())
}

/// Providers from `OPENAI_API_KEY` / `OPENAI_BASE_URL` plus the config.
pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    registry_from(
        config,
        std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
        std::env::var("OPENAI_BASE_URL").ok(),
    )
}

/// `noop` is always present and becomes the preferred provider when the
/// configured one has no credentials, so calls fail with `NotConfigured`.
fn registry_from(
    config: &AppConfig,
    api_key: Option<String>,
    base_url_override: Option<String>,
) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new().with_vision("noop", Arc::new(NoopProvider));

    if let Some(api_key) = api_key {
        let base_url = base_url_override
            .or_else(|| config.provider.base_url.clone())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let provider = OpenAiVisionProvider::new(OpenAiConfig {
            api_key,
            base_url,
            chat_model: config.provider.model.clone(),
            timeout_secs: config.provider.timeout_secs,
            max_tokens: config.provider.max_tokens,
        });
        reg = reg.with_vision("openai", Arc::new(provider));
    }

    let wanted = config.provider.name.as_str();
    let names = reg.names();
    if names.iter().any(|n| n == wanted) {
        reg.set_preferred_vision(wanted)
    } else {
        warn!(
            provider = wanted,
            available = ?names,
            "configured AI provider unavailable, falling back to noop"
        );
        reg.set_preferred_vision("noop")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploads::fixtures::PNG;
    use providers::mock::ScriptedProvider;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::Path;

    fn service(root: &Path, provider: ScriptedProvider) -> AnnotatorService {
        let mut config = AppConfig::default();
        config.assets.root = root.to_string_lossy().into_owned();
        config.provider.name = "mock".to_string();
        config.comments.delay_ms = 0;
        let registry = ProviderRegistry::new()
            .with_vision("mock", Arc::new(provider))
            .set_preferred_vision("mock");
        AnnotatorService::new(
            config,
            Arc::new(LocalStore::new(root)),
            registry,
            Arc::new(PrivateRangeClassifier),
        )
        .unwrap()
    }

    fn put(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, PNG).unwrap();
    }

    #[test]
    fn empty_catalog_is_a_successful_null_recommendation() {
        let temp = tempfile::tempdir().unwrap();
        let svc = service(temp.path(), ScriptedProvider::new());
        let resp = svc.recommend_for_style("warm", "").unwrap();
        assert!(resp.success);
        assert!(resp.template.is_none());
        assert_eq!(resp.message.as_deref(), Some("no template available"));

        let json = serde_json::to_value(&resp).unwrap();
        assert!(json["template"].is_null());
    }

    #[test]
    fn missing_style_is_validation_error() {
        let temp = tempfile::tempdir().unwrap();
        let svc = service(temp.path(), ScriptedProvider::new());
        let err = svc.recommend_for_style("  ", "").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn recommends_from_disk_catalog() {
        let temp = tempfile::tempdir().unwrap();
        put(temp.path(), "templates/builtin/flower_bg.png");
        put(temp.path(), "templates/builtin/plain.png");
        put(temp.path(), "templates/user/heart_love.png");
        let svc = service(temp.path(), ScriptedProvider::new());
        let resp = svc
            .recommend_for_style_with("warm", "", &mut StdRng::seed_from_u64(1))
            .unwrap();
        let template = resp.template.unwrap();
        assert_eq!(template.name, "heart_love.png");
        assert_eq!(template.path, "/templates/user/heart_love.png");
        assert_eq!(resp.score, 4);
    }

    #[tokio::test]
    async fn image_recommendation_uses_inferred_style() {
        let temp = tempfile::tempdir().unwrap();
        put(temp.path(), "templates/builtin/classic_grid.png");
        put(temp.path(), "templates/builtin/balloon_party.png");
        put(temp.path(), "uploads/hw.png");
        let provider = ScriptedProvider::new()
            .then_text(r#"{"style": "lively", "reason": "colorful cartoon drawing"}"#);
        let svc = service(temp.path(), provider.clone());

        let origin = RequestOrigin::new("https", "grading.example.com");
        let resp = svc
            .recommend_for_image("/uploads/hw.png", Some(&origin), None)
            .await
            .unwrap();
        assert_eq!(resp.style, Some(StyleLabel::Lively));
        assert_eq!(resp.template.unwrap().name, "balloon_party.png");
        assert_eq!(resp.rationale.as_deref(), Some("colorful cartoon drawing"));
        assert_eq!(
            provider.calls()[0].image.as_url(),
            "https://grading.example.com/uploads/hw.png"
        );
    }

    #[tokio::test]
    async fn batch_response_counts_outcomes() {
        let temp = tempfile::tempdir().unwrap();
        put(temp.path(), "uploads/a.png");
        let svc = service(temp.path(), ScriptedProvider::new().with_default_text("Tidy!"));
        let images = vec![
            ImageRequest::new("/uploads/a.png", "a"),
            ImageRequest::new("/uploads/gone.png", "gone"),
        ];
        let resp = svc
            .comment_batch(&images, None, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!((resp.total, resp.succeeded, resp.failed), (2, 1, 1));

        let err = svc
            .comment_batch(&[], None, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn added_user_template_is_ranked_by_its_original_name() {
        let temp = tempfile::tempdir().unwrap();
        put(temp.path(), "templates/builtin/flower_bg.png");
        put(temp.path(), "templates/builtin/plain.png");
        let svc = service(temp.path(), ScriptedProvider::new());

        let added = svc.add_user_template("heart_love.png", PNG).unwrap();
        let resp = svc
            .recommend_for_style_with("warm", "", &mut StdRng::seed_from_u64(1))
            .unwrap();
        let template = resp.template.unwrap();
        assert_eq!(template, added);
        assert_eq!(template.provenance, crate::models::Provenance::User);
        assert_eq!(resp.score, 4);
        assert!(resp.matched);
    }

    #[tokio::test]
    async fn image_recommendation_with_no_templates_skips_the_model() {
        let temp = tempfile::tempdir().unwrap();
        put(temp.path(), "uploads/hw.png");
        let provider = ScriptedProvider::new();
        let svc = service(temp.path(), provider.clone());

        let resp = svc
            .recommend_for_image("/uploads/hw.png", None, None)
            .await
            .unwrap();
        assert!(resp.success);
        assert!(resp.template.is_none());
        assert!(resp.style.is_none());
        assert_eq!(resp.message.as_deref(), Some("no template available"));
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn registry_without_key_prefers_noop() {
        let config = AppConfig::default();
        assert_eq!(config.provider.name, "openai");
        let reg = registry_from(&config, None, None);
        assert_eq!(reg.preferred_vision.as_deref(), Some("noop"));
        assert_eq!(reg.names(), vec!["noop".to_string()]);

        let reg = registry_from(&config, Some("sk-test".into()), None);
        assert_eq!(reg.preferred_vision.as_deref(), Some("openai"));
    }

    #[tokio::test]
    async fn unconfigured_default_explains_missing_key() {
        let temp = tempfile::tempdir().unwrap();
        put(temp.path(), "uploads/a.png");
        let mut config = AppConfig::default();
        config.assets.root = temp.path().to_string_lossy().into_owned();
        let registry = registry_from(&config, None, None);
        let svc = AnnotatorService::new(
            config,
            Arc::new(LocalStore::new(temp.path())),
            registry,
            Arc::new(PrivateRangeClassifier),
        )
        .unwrap();

        let err = svc
            .comment_image("/uploads/a.png", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert!(err.public_message().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn unconfigured_provider_is_config_error() {
        let temp = tempfile::tempdir().unwrap();
        put(temp.path(), "uploads/a.png");
        let mut config = AppConfig::default();
        config.assets.root = temp.path().to_string_lossy().into_owned();
        let svc = AnnotatorService::new(
            config,
            Arc::new(LocalStore::new(temp.path())),
            ProviderRegistry::new(),
            Arc::new(PrivateRangeClassifier),
        )
        .unwrap();
        let err = svc
            .comment_image("/uploads/a.png", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(err.public_message(), "internal server error");
    }
}
