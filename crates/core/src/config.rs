use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub assets: AssetConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub comments: CommentConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
}

/// Directory layout under `root`. Every `*_dir` is relative to the root and
/// doubles as the public path prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    #[serde(default = "default_builtin_templates_dir")]
    pub builtin_templates_dir: String,
    #[serde(default = "default_user_templates_dir")]
    pub user_templates_dir: String,
    #[serde(default = "default_emoji_dir")]
    pub emoji_dir: String,
    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            uploads_dir: default_uploads_dir(),
            builtin_templates_dir: default_builtin_templates_dir(),
            user_templates_dir: default_user_templates_dir(),
            emoji_dir: default_emoji_dir(),
            fonts_dir: default_fonts_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            model: default_model(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_comment_instruction")]
    pub default_instruction: String,
    #[serde(default = "default_fallback_comment")]
    pub fallback_comment: String,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            default_instruction: default_comment_instruction(),
            fallback_comment: default_fallback_comment(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    /// TOML keyword table; the built-in table is used when unset.
    #[serde(default)]
    pub keywords_path: Option<String>,
    #[serde(default = "default_style_instruction")]
    pub style_instruction: String,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            keywords_path: None,
            style_instruction: default_style_instruction(),
        }
    }
}

fn default_root() -> String {
    "public".to_string()
}

fn default_provider_name() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_builtin_templates_dir() -> String {
    "templates/builtin".to_string()
}

fn default_user_templates_dir() -> String {
    "templates/user".to_string()
}

fn default_emoji_dir() -> String {
    "emoji".to_string()
}

fn default_fonts_dir() -> String {
    "fonts".to_string()
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    300
}

fn default_delay_ms() -> u64 {
    500
}

fn default_comment_instruction() -> String {
    "You are a kind teacher grading a student's homework. Look at the image and \
     write one short, encouraging comment of at most 20 words. Reply with the \
     comment only."
        .to_string()
}

fn default_fallback_comment() -> String {
    "Great work, keep it up!".to_string()
}

fn default_style_instruction() -> String {
    "Look at this image and decide which background style suits it best. \
     Choose exactly one of: warm, lively, formal, minimal. Reply with JSON only: \
     {\"style\": \"<one of the four>\", \"reason\": \"<one short sentence>\"}"
        .to_string()
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(config::Environment::with_prefix("ANNOTATOR").separator("__"));
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
