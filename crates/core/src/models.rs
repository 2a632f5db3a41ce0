use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Builtin,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub path: String,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontAsset {
    pub name: String,
    pub family: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleLabel {
    Warm,
    Lively,
    Formal,
    #[default]
    Minimal,
}

impl StyleLabel {
    pub const ALL: [StyleLabel; 4] = [
        StyleLabel::Warm,
        StyleLabel::Lively,
        StyleLabel::Formal,
        StyleLabel::Minimal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleLabel::Warm => "warm",
            StyleLabel::Lively => "lively",
            StyleLabel::Formal => "formal",
            StyleLabel::Minimal => "minimal",
        }
    }

    /// Exact label match, English or Chinese, ignoring case and whitespace.
    pub fn from_label(raw: &str) -> Option<StyleLabel> {
        let label = raw.trim().to_lowercase();
        let style = match label.as_str() {
            "warm" | "温馨" | "温暖" => StyleLabel::Warm,
            "lively" | "活泼" | "可爱" => StyleLabel::Lively,
            "formal" | "正式" | "严肃" => StyleLabel::Formal,
            "minimal" | "简约" | "简洁" => StyleLabel::Minimal,
            _ => return None,
        };
        Some(style)
    }

    /// Like [`StyleLabel::from_label`] but never fails: anything unknown is
    /// `Minimal`.
    pub fn parse_lenient(raw: &str) -> StyleLabel {
        Self::from_label(raw).unwrap_or_default()
    }
}

impl fmt::Display for StyleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredAsset {
    pub asset: Asset,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub template: Asset,
    pub score: u32,
    pub style: StyleLabel,
    /// False when nothing matched and the template was drawn at random.
    pub matched: bool,
    pub reason: String,
}

/// One image queued for commenting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Public path of the stored image, e.g. `/uploads/abc.png`.
    #[serde(rename = "path")]
    pub image: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
}

impl ImageRequest {
    pub fn new(image: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            display_name: display_name.into(),
        }
    }
}

/// Scheme and host a client used to reach us, needed to build public URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Host without any `:port` suffix. Bracketed IPv6 hosts lose their
    /// brackets.
    pub fn hostname(&self) -> &str {
        let host = self.host.trim();
        if let Some(rest) = host.strip_prefix('[') {
            return rest.split(']').next().unwrap_or(rest);
        }
        if host.matches(':').count() > 1 {
            // bare IPv6 literal
            return host;
        }
        host.split(':').next().unwrap_or(host)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOutcome {
    Success(String),
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentResult {
    pub image: String,
    pub display_name: String,
    pub outcome: CommentOutcome,
}

impl CommentResult {
    pub fn success(req: &ImageRequest, comment: String) -> Self {
        Self {
            image: req.image.clone(),
            display_name: req.display_name.clone(),
            outcome: CommentOutcome::Success(comment),
        }
    }

    pub fn failure(req: &ImageRequest, reason: String) -> Self {
        Self {
            image: req.image.clone(),
            display_name: req.display_name.clone(),
            outcome: CommentOutcome::Failure(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CommentOutcome::Success(_))
    }

    pub fn comment(&self) -> Option<&str> {
        match &self.outcome {
            CommentOutcome::Success(c) => Some(c),
            CommentOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            CommentOutcome::Failure(e) => Some(e),
            CommentOutcome::Success(_) => None,
        }
    }
}

impl Serialize for CommentResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("CommentResult", 4)?;
        s.serialize_field("image", &self.image)?;
        s.serialize_field("name", &self.display_name)?;
        s.serialize_field("success", &self.is_success())?;
        match &self.outcome {
            CommentOutcome::Success(comment) => s.serialize_field("comment", comment)?,
            CommentOutcome::Failure(error) => s.serialize_field("error", error)?,
        }
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_labels_parse_leniently() {
        assert_eq!(StyleLabel::parse_lenient(" Warm "), StyleLabel::Warm);
        assert_eq!(StyleLabel::parse_lenient("活泼"), StyleLabel::Lively);
        assert_eq!(StyleLabel::parse_lenient("FORMAL"), StyleLabel::Formal);
        assert_eq!(StyleLabel::parse_lenient("baroque"), StyleLabel::Minimal);
        assert_eq!(StyleLabel::from_label("baroque"), None);
    }

    #[test]
    fn origin_hostname_strips_port() {
        assert_eq!(RequestOrigin::new("http", "192.168.1.4:3000").hostname(), "192.168.1.4");
        assert_eq!(RequestOrigin::new("http", "[::1]:8080").hostname(), "::1");
        assert_eq!(RequestOrigin::new("https", "example.com").hostname(), "example.com");
    }

    #[test]
    fn comment_result_serializes_flat() {
        let req = ImageRequest::new("/uploads/a.png", "a.png");
        let ok = serde_json::to_value(CommentResult::success(&req, "Nice".into())).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["comment"], "Nice");
        assert!(ok.get("error").is_none());

        let bad = serde_json::to_value(CommentResult::failure(&req, "boom".into())).unwrap();
        assert_eq!(bad["success"], false);
        assert_eq!(bad["error"], "boom");
        assert_eq!(bad["name"], "a.png");
    }
}
