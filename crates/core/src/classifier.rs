use crate::error::{AppError, Result};
use crate::models::StyleLabel;
use providers::{ImageRef, ProviderError, VisionProvider};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleVerdict {
    pub style: StyleLabel,
    pub rationale: String,
}

/// Ask the model which style suits the image.
pub async fn classify_style(
    provider: &dyn VisionProvider,
    image: &ImageRef,
    instruction: &str,
) -> Result<StyleVerdict> {
    let payload = provider.call(image, instruction).await?;
    let text = provider
        .extract_text(&payload)
        .ok_or(AppError::Adapter(ProviderError::EmptyResponse))?;
    let verdict = parse_verdict(&text);
    debug!(style = %verdict.style, "style classified");
    Ok(verdict)
}

/// Accepts `{"style": .., "reason": ..}` (optionally fenced in markdown) and
/// falls back to spotting a style word in free text.
pub fn parse_verdict(text: &str) -> StyleVerdict {
    let body = strip_code_fence(text.trim());
    if let Some(obj) = json_object(body) {
        let label = obj.get("style").and_then(|v| v.as_str()).unwrap_or("");
        let rationale = obj
            .get("reason")
            .or_else(|| obj.get("rationale"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        let style = StyleLabel::from_label(label)
            .or_else(|| heuristic_label(label))
            .unwrap_or_else(|| {
                warn!(label, "unrecognised style label, using minimal");
                StyleLabel::default()
            });
        return StyleVerdict { style, rationale };
    }

    StyleVerdict {
        style: heuristic_label(body).unwrap_or_default(),
        rationale: body.to_string(),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

fn json_object(text: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(&text[start..=end]) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Earliest style word mentioned anywhere in `text`.
fn heuristic_label(text: &str) -> Option<StyleLabel> {
    const WORDS: &[(&str, StyleLabel)] = &[
        ("warm", StyleLabel::Warm),
        ("温馨", StyleLabel::Warm),
        ("温暖", StyleLabel::Warm),
        ("lively", StyleLabel::Lively),
        ("活泼", StyleLabel::Lively),
        ("可爱", StyleLabel::Lively),
        ("formal", StyleLabel::Formal),
        ("正式", StyleLabel::Formal),
        ("严肃", StyleLabel::Formal),
        ("minimal", StyleLabel::Minimal),
        ("简约", StyleLabel::Minimal),
        ("简洁", StyleLabel::Minimal),
    ];
    let lower = text.to_lowercase();
    WORDS
        .iter()
        .filter_map(|(word, style)| lower.find(word).map(|pos| (pos, *style)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, style)| style)
}
