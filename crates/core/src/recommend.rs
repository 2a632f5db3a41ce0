//! Template recommendation: score template names against a style's keywords
//! and pick the best one.
//!
//! Ranking is score descending, then user templates ahead of built-ins, then
//! file name. When nothing scores at all the pick is a uniform draw over the
//! whole catalog so the first entry is not returned every time.

use crate::error::{AppError, Result};
use crate::keywords::{KeywordTable, StyleKeywords};
use crate::models::{Asset, Provenance, Recommendation, ScoredAsset, StyleLabel};
use rand::Rng;
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct TemplateRecommender {
    table: KeywordTable,
}

impl TemplateRecommender {
    pub fn new(table: KeywordTable) -> Self {
        Self { table }
    }

    /// Every asset with its score, best first.
    pub fn rank(&self, assets: &[Asset], style: StyleLabel, rationale: &str) -> Vec<ScoredAsset> {
        let keywords = self.table.for_style(style);
        let rationale = rationale.trim().to_lowercase();
        let mut scored: Vec<ScoredAsset> = assets
            .iter()
            .map(|asset| ScoredAsset {
                score: score_name(&asset.name, keywords, &rationale),
                asset: asset.clone(),
            })
            .collect();
        scored.sort_by(compare_scored);
        scored
    }

    pub fn recommend<R: Rng + ?Sized>(
        &self,
        assets: &[Asset],
        style: StyleLabel,
        rationale: &str,
        rng: &mut R,
    ) -> Result<Recommendation> {
        if assets.is_empty() {
            return Err(AppError::EmptyCatalog);
        }

        let ranked = self.rank(assets, style, rationale);
        let best = &ranked[0];
        if best.score > 0 {
            debug!(%style, template = %best.asset.name, score = best.score, "template matched");
            return Ok(Recommendation {
                template: best.asset.clone(),
                score: best.score,
                style,
                matched: true,
                reason: format!(
                    "\"{}\" best matches the {} style (score {})",
                    best.asset.name, style, best.score
                ),
            });
        }

        let pick = &assets[rng.gen_range(0..assets.len())];
        debug!(%style, template = %pick.name, "no keyword matched, random template");
        Ok(Recommendation {
            template: pick.clone(),
            score: 0,
            style,
            matched: false,
            reason: format!(
                "no template name matches the {} style, picked one at random",
                style
            ),
        })
    }
}

/// +2 per keyword in the name; +1 per related word found in both the
/// (already lower-cased) rationale and the name.
pub fn score_name(name: &str, keywords: &StyleKeywords, rationale: &str) -> u32 {
    let name = name.to_lowercase();
    let mut score = 0;
    for kw in &keywords.keywords {
        let kw = kw.to_lowercase();
        if !kw.is_empty() && name.contains(&kw) {
            score += 2;
        }
    }
    if !rationale.is_empty() {
        for word in &keywords.related {
            let word = word.to_lowercase();
            if !word.is_empty() && rationale.contains(&word) && name.contains(&word) {
                score += 1;
            }
        }
    }
    score
}

fn provenance_rank(p: Provenance) -> u8 {
    match p {
        Provenance::User => 0,
        Provenance::Builtin => 1,
    }
}

fn compare_scored(a: &ScoredAsset, b: &ScoredAsset) -> Ordering {
    let (pa, pb) = (
        provenance_rank(a.asset.provenance),
        provenance_rank(b.asset.provenance),
    );
    b.score
        .cmp(&a.score)
        .then(pa.cmp(&pb))
        .then_with(|| a.asset.name.cmp(&b.asset.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn asset(name: &str, provenance: Provenance) -> Asset {
        let dir = match provenance {
            Provenance::Builtin => "builtin",
            Provenance::User => "user",
        };
        Asset {
            name: name.to_string(),
            path: format!("/templates/{}/{}", dir, name),
            provenance,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn warm_example_picks_heart_love() {
        let assets = vec![
            asset("flower_bg.png", Provenance::Builtin),
            asset("plain.png", Provenance::Builtin),
            asset("heart_love.png", Provenance::User),
        ];
        let rec = TemplateRecommender::default()
            .recommend(&assets, StyleLabel::Warm, "", &mut rng())
            .unwrap();
        assert_eq!(rec.template.name, "heart_love.png");
        assert_eq!(rec.score, 4);
        assert!(rec.matched);
    }

    #[test]
    fn selected_template_has_max_score() {
        let assets = vec![
            asset("classic_grid.png", Provenance::Builtin),
            asset("paper.png", Provenance::Builtin),
            asset("business_classic_paper.jpg", Provenance::Builtin),
            asset("happy.png", Provenance::User),
        ];
        let rec = TemplateRecommender::default();
        let ranked = rec.rank(&assets, StyleLabel::Formal, "");
        let max = ranked.iter().map(|s| s.score).max().unwrap();
        let pick = rec
            .recommend(&assets, StyleLabel::Formal, "", &mut rng())
            .unwrap();
        assert_eq!(pick.score, max);
        assert_eq!(pick.template.name, "business_classic_paper.jpg");
    }

    #[test]
    fn user_template_wins_a_tie() {
        let assets = vec![
            asset("flower_a.png", Provenance::Builtin),
            asset("flower_b.png", Provenance::User),
        ];
        let pick = TemplateRecommender::default()
            .recommend(&assets, StyleLabel::Warm, "", &mut rng())
            .unwrap();
        assert_eq!(pick.template.name, "flower_b.png");
        assert_eq!(pick.template.provenance, Provenance::User);
    }

    #[test]
    fn equal_user_templates_order_by_name() {
        let assets = vec![
            asset("sun_z.png", Provenance::User),
            asset("sun_a.png", Provenance::User),
        ];
        let ranked = TemplateRecommender::default().rank(&assets, StyleLabel::Warm, "");
        assert_eq!(ranked[0].asset.name, "sun_a.png");
        assert_eq!(ranked[1].asset.name, "sun_z.png");
    }

    #[test]
    fn rationale_adds_related_bonus() {
        let kw = KeywordTable::default();
        let warm = kw.for_style(StyleLabel::Warm);
        assert_eq!(score_name("Flower_BG.png", warm, ""), 2);
        assert_eq!(
            score_name("flower_bg.png", warm, "soft flower pattern suits it"),
            3
        );
        // related word only in the rationale does nothing on its own
        assert_eq!(score_name("plain.png", warm, "flower everywhere"), 0);
    }

    #[test]
    fn rationale_breaks_otherwise_equal_scores() {
        let assets = vec![
            asset("home.png", Provenance::Builtin),
            asset("heart.png", Provenance::Builtin),
        ];
        let pick = TemplateRecommender::default()
            .recommend(&assets, StyleLabel::Warm, "A HEART drawn in the corner", &mut rng())
            .unwrap();
        assert_eq!(pick.template.name, "heart.png");
        assert_eq!(pick.score, 3);
    }

    #[test]
    fn zero_scores_draw_from_whole_catalog() {
        let assets: Vec<Asset> = ["a.png", "b.png", "c.png", "d.png", "e.png"]
            .iter()
            .map(|n| asset(n, Provenance::Builtin))
            .collect();
        let rec = TemplateRecommender::default();
        let mut rng = rng();
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let pick = rec
                .recommend(&assets, StyleLabel::Lively, "", &mut rng)
                .unwrap();
            assert!(!pick.matched);
            assert_eq!(pick.score, 0);
            seen.insert(pick.template.name);
        }
        assert!(seen.len() > 1, "random pick is degenerate: {seen:?}");
    }

    #[test]
    fn zero_score_pick_is_reproducible_with_seed() {
        let assets: Vec<Asset> = ["a.png", "b.png", "c.png"]
            .iter()
            .map(|n| asset(n, Provenance::Builtin))
            .collect();
        let rec = TemplateRecommender::default();
        let first = rec
            .recommend(&assets, StyleLabel::Minimal, "", &mut StdRng::seed_from_u64(42))
            .unwrap();
        let second = rec
            .recommend(&assets, StyleLabel::Minimal, "", &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_catalog_fails() {
        let err = TemplateRecommender::default()
            .recommend(&[], StyleLabel::Warm, "anything", &mut rng())
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyCatalog));
    }

    #[test]
    fn custom_table_drives_scoring() {
        let table = KeywordTable::from_toml_str(
            r#"
            [warm]
            keywords = ["cocoa"]
            [lively]
            keywords = []
            [formal]
            keywords = []
            [minimal]
            keywords = []
            "#,
        )
        .unwrap();
        let assets = vec![
            asset("heart.png", Provenance::Builtin),
            asset("cocoa.png", Provenance::Builtin),
        ];
        let pick = TemplateRecommender::new(table)
            .recommend(&assets, StyleLabel::Warm, "", &mut rng())
            .unwrap();
        assert_eq!(pick.template.name, "cocoa.png");
    }
}
