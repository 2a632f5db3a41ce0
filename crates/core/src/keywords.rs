//! Style keyword tables used to score template names.
//!
//! A table is plain data handed to the recommender. The built-in one can be
//! replaced by a TOML file shaped like:
//!
//! ```toml
//! [warm]
//! keywords = ["warm", "heart", "love"]
//! related = ["heart", "love"]
//! ```

use crate::error::{AppError, Result};
use crate::models::StyleLabel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleKeywords {
    /// Worth +2 each when contained in a template name.
    pub keywords: Vec<String>,
    /// Worth +1 more when contained in both the rationale and the name.
    #[serde(default)]
    pub related: Vec<String>,
}

impl StyleKeywords {
    fn new(keywords: &[&str], related: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            related: related.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTable {
    pub warm: StyleKeywords,
    pub lively: StyleKeywords,
    pub formal: StyleKeywords,
    pub minimal: StyleKeywords,
}

impl KeywordTable {
    pub fn for_style(&self, style: StyleLabel) -> &StyleKeywords {
        match style {
            StyleLabel::Warm => &self.warm,
            StyleLabel::Lively => &self.lively,
            StyleLabel::Formal => &self.formal,
            StyleLabel::Minimal => &self.minimal,
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AppError::Config(format!("keyword table: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("reading keyword table {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Built-in table unless a path is configured.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(Path::new(p)),
            None => Ok(Self::default()),
        }
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            warm: StyleKeywords::new(
                &[
                    "warm", "home", "heart", "love", "flower", "family", "sun", "cozy", "温馨",
                    "家", "爱", "花",
                ],
                &["heart", "flower", "home", "love"],
            ),
            lively: StyleKeywords::new(
                &[
                    "lively", "fun", "happy", "color", "cartoon", "star", "party", "play",
                    "balloon", "candy", "活泼", "彩",
                ],
                &["color", "happy", "cartoon", "star"],
            ),
            formal: StyleKeywords::new(
                &[
                    "formal", "classic", "business", "grid", "paper", "official",
                    "certificate", "lined", "border", "navy", "正式", "商务",
                ],
                &["classic", "grid", "paper", "business"],
            ),
            minimal: StyleKeywords::new(
                &[
                    "minimal", "simple", "plain", "white", "clean", "blank", "pure", "light",
                    "mono", "soft", "简约", "纯",
                ],
                &["simple", "plain", "white", "clean"],
            ),
        }
    }
}
