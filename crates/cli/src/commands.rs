use annotator_core::error::AppError;
use annotator_core::models::{ImageRequest, RequestOrigin};
use annotator_core::service::AnnotatorService;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List background templates, built-in first then user
    Templates,
    /// List emoji assets
    Emojis,
    /// List available fonts
    Fonts,
    /// Store an image in the uploads directory
    Upload {
        /// Image file to upload
        file: PathBuf,
    },
    /// Add a user template
    AddTemplate {
        /// Image file to add as a template
        file: PathBuf,
    },
    /// Delete a user template by file name
    RemoveTemplate {
        /// File name as shown by `templates`
        name: String,
    },
    /// Recommend a template for a style label
    Recommend {
        /// warm | lively | formal | minimal
        #[arg(long)]
        style: String,
        /// Free-text reasoning that hints at related keywords
        #[arg(long, default_value = "")]
        rationale: String,
        /// Include the full ranking
        #[arg(long, default_value_t = false)]
        explain: bool,
    },
    /// Infer a style from a stored image, then recommend a template
    RecommendImage {
        /// Public path of the stored image, e.g. /uploads/abc.png
        image: String,
        #[command(flatten)]
        origin: OriginArgs,
        /// Override the style instruction sent to the model
        #[arg(long)]
        instruction: Option<String>,
    },
    /// Generate a comment for one stored image
    Comment {
        /// Public path of the stored image
        image: String,
        #[command(flatten)]
        origin: OriginArgs,
        /// Custom instruction for the model
        #[arg(long)]
        instruction: Option<String>,
    },
    /// Generate comments for several stored images, one at a time
    CommentBatch {
        /// Public paths of the stored images
        #[arg(required = true)]
        images: Vec<String>,
        #[command(flatten)]
        origin: OriginArgs,
        /// Custom instruction for the model
        #[arg(long)]
        instruction: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct OriginArgs {
    /// Host the asset server is reachable on; without it images go inline
    #[arg(long)]
    pub public_host: Option<String>,
    /// Scheme for public image URLs
    #[arg(long, default_value = "http")]
    pub public_scheme: String,
}

impl OriginArgs {
    pub fn origin(&self) -> Option<RequestOrigin> {
        self.public_host
            .as_ref()
            .map(|host| RequestOrigin::new(self.public_scheme.clone(), host.clone()))
    }
}

/// Client-facing body for a failed command.
pub fn error_body(err: &AppError) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": err.public_message(),
        "status": err.status_code(),
    })
}

pub async fn execute(
    service: &AnnotatorService,
    command: Command,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, AppError> {
    match command {
        Command::Templates => to_json(&service.list_templates()?),
        Command::Emojis => to_json(&service.list_emojis()?),
        Command::Fonts => to_json(&service.list_fonts()?),
        Command::Upload { file } => {
            let (name, bytes) = read_file(&file)?;
            let stored = service.upload_image(&name, &bytes)?;
            Ok(serde_json::json!({ "success": true, "file": stored }))
        }
        Command::AddTemplate { file } => {
            let (name, bytes) = read_file(&file)?;
            let template = service.add_user_template(&name, &bytes)?;
            Ok(serde_json::json!({ "success": true, "template": template }))
        }
        Command::RemoveTemplate { name } => {
            service.remove_user_template(&name)?;
            Ok(serde_json::json!({ "success": true, "removed": name }))
        }
        Command::Recommend {
            style,
            rationale,
            explain,
        } => {
            let mut body = to_json(&service.recommend_for_style(&style, &rationale)?)?;
            if explain {
                body["ranking"] = to_json(&service.rank_templates(&style, &rationale)?)?;
            }
            Ok(body)
        }
        Command::RecommendImage {
            image,
            origin,
            instruction,
        } => to_json(
            &service
                .recommend_for_image(&image, origin.origin().as_ref(), instruction.as_deref())
                .await?,
        ),
        Command::Comment {
            image,
            origin,
            instruction,
        } => to_json(
            &service
                .comment_image(&image, origin.origin().as_ref(), instruction.as_deref())
                .await?,
        ),
        Command::CommentBatch {
            images,
            origin,
            instruction,
        } => {
            let requests: Vec<ImageRequest> = images
                .iter()
                .map(|image| ImageRequest::new(image.clone(), display_name(image)))
                .collect();
            to_json(
                &service
                    .comment_batch(
                        &requests,
                        origin.origin().as_ref(),
                        instruction.as_deref(),
                        cancel,
                    )
                    .await?,
            )
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

fn read_file(path: &Path) -> Result<(String, Vec<u8>), AppError> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::Validation(format!("cannot read {}: {}", path.display(), e)))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.png")
        .to_string();
    Ok((name, bytes))
}

fn display_name(image: &str) -> String {
    image.rsplit('/').next().unwrap_or(image).to_string()
}
