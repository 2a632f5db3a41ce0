//! Asset catalog: templates, emoji and fonts as they exist on disk right now.
//!
//! Nothing is cached; each listing re-reads the store. Templates come in two
//! provenance classes, listed built-in first and then user-supplied, each in
//! lexical file-name order.

use crate::config::AssetConfig;
use crate::error::{AppError, Result};
use crate::models::{Asset, FontAsset, Provenance};
use crate::uploads;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::sync::Arc;
use storage::{AssetStore, LocalStore};
use tracing::{debug, info};

const IMAGE_PATTERNS: &[&str] = &["*.{png,jpg,jpeg,gif,webp}"];
const FONT_PATTERNS: &[&str] = &["*.{ttf,otf,woff,woff2}"];

pub struct AssetCatalog {
    store: Arc<dyn AssetStore>,
    dirs: AssetConfig,
    images: GlobSet,
    fonts: GlobSet,
}

impl AssetCatalog {
    pub fn new(store: Arc<dyn AssetStore>, dirs: AssetConfig) -> Result<Self> {
        Ok(Self {
            store,
            dirs,
            images: build_globset(IMAGE_PATTERNS)?,
            fonts: build_globset(FONT_PATTERNS)?,
        })
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    pub fn templates(&self) -> Result<Vec<Asset>> {
        let mut assets = self.scan(&self.dirs.builtin_templates_dir, Provenance::Builtin)?;
        assets.extend(self.scan(&self.dirs.user_templates_dir, Provenance::User)?);
        debug!(count = assets.len(), "listed templates");
        Ok(assets)
    }

    pub fn emojis(&self) -> Result<Vec<Asset>> {
        self.scan(&self.dirs.emoji_dir, Provenance::Builtin)
    }

    pub fn fonts(&self) -> Result<Vec<FontAsset>> {
        let dir = &self.dirs.fonts_dir;
        Ok(self
            .store
            .list(dir)?
            .into_iter()
            .filter(|name| self.fonts.is_match(name))
            .map(|name| FontAsset {
                family: font_family(&name),
                path: LocalStore::public_path(dir, &name),
                name,
            })
            .collect())
    }

    /// The stored name keeps the original stem, so keywords in what the user
    /// called the file still count when ranking.
    pub fn add_user_template(&self, original_name: &str, bytes: &[u8]) -> Result<Asset> {
        uploads::validate_image(bytes, self.dirs.max_upload_bytes)?;
        let stored = self
            .store
            .put_named(&self.dirs.user_templates_dir, original_name, bytes)?;
        info!(path = %stored.public_path, "user template added");
        Ok(Asset {
            name: stored.name,
            path: stored.public_path,
            provenance: Provenance::User,
        })
    }

    /// Only user templates can be removed; built-ins live in a different
    /// directory and are never resolved here.
    pub fn remove_user_template(&self, name: &str) -> Result<()> {
        if !is_plain_file_name(name) {
            return Err(AppError::Validation(format!(
                "invalid template name: {}",
                name
            )));
        }
        let path = LocalStore::public_path(&self.dirs.user_templates_dir, name);
        self.store.remove(&path)?;
        info!(%path, "user template removed");
        Ok(())
    }

    fn scan(&self, dir: &str, provenance: Provenance) -> Result<Vec<Asset>> {
        Ok(self
            .store
            .list(dir)?
            .into_iter()
            .filter(|name| self.images.is_match(name))
            .map(|name| Asset {
                path: LocalStore::public_path(dir, &name),
                name,
                provenance,
            })
            .collect())
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .case_insensitive(true)
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| AppError::Config(e.to_string()))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

fn font_family(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .replace(['-', '_'], " ")
}
