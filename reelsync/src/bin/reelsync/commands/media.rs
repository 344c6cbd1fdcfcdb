use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use reelsync::{social::MediaUpload, store::DocumentStore};
use tokio::sync::mpsc;

use super::MutationReport;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;
use crate::session::Session;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Videos",
        commands: &[
            "reelsync upload clip.mp4 --as ann --caption \"sunset\" --hashtags \"#beach #summer\"",
            "reelsync upload clip.mov --as ann  # Caption defaults to 'No description'",
        ],
    },
    ExampleGroup {
        title: "Stories",
        commands: &["reelsync upload selfie.jpg --as ann --story  # Expires after 24 hours"],
    },
];

#[derive(Args)]
pub struct UploadArgs {
    /// Media file to upload
    pub file: PathBuf,

    /// Uploading user id
    #[arg(long = "as", value_name = "USER")]
    pub actor: String,

    #[arg(long, default_value = "")]
    pub caption: String,

    /// Space-separated hashtags, e.g. "#beach #summer"
    #[arg(long, default_value = "")]
    pub hashtags: String,

    /// Publish as a story instead of a video
    #[arg(long)]
    pub story: bool,

    /// Override the content type guessed from the file extension
    #[arg(long)]
    pub content_type: Option<String>,
}

/// Content type from the file extension; unknown extensions are left for validation to reject.
fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

pub async fn handle_upload<S: DocumentStore>(args: UploadArgs, session: &Session<S>, output: &OutputManager) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .context("File name is not valid UTF-8")?
        .to_string();
    let content_type = args
        .content_type
        .clone()
        .unwrap_or_else(|| guess_content_type(&args.file).to_string());
    output.verbose(&format!("{file_name}: {} bytes, {content_type}", bytes.len()));

    let upload = MediaUpload {
        file_name: file_name.clone(),
        content_type,
        bytes,
    };
    let (progress, mut events) = mpsc::unbounded_channel();
    let publish = async {
        if args.story {
            session.social.publish_story(&args.actor, &upload, Some(progress)).await
        } else {
            session
                .social
                .publish_video(&args.actor, &upload, &args.caption, &args.hashtags, Some(progress))
                .await
        }
    };
    let report_progress = async {
        while let Some(event) = events.recv().await {
            output.progress(&format!("Uploading {file_name} {:.0}%", event.percent()));
        }
        output.clear_line();
    };
    let (published, ()) = tokio::join!(publish, report_progress);

    let action = if args.story { "story" } else { "upload" };
    let applied = published.with_context(|| format!("{action} of {file_name} failed"))?;
    let report = MutationReport::new(action, &file_name, Some(&args.actor), applied);
    report.emit(output, &format!("{} published {file_name}", args.actor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_follows_the_extension() {
        assert_eq!(guess_content_type(Path::new("clip.MP4")), "video/mp4");
        assert_eq!(guess_content_type(Path::new("a/b/selfie.jpeg")), "image/jpeg");
        assert_eq!(guess_content_type(Path::new("notes.txt")), "application/octet-stream");
        assert_eq!(guess_content_type(Path::new("noext")), "application/octet-stream");
    }
}
