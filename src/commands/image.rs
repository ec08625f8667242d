//! Docker image management for the sandbox.

use anyhow::{Context, Result};
use bollard::image::{BuildImageOptions, ListImagesOptions};
use bollard::service::ImageSummary;
use bollard::Docker;
use bytes::Bytes;
use clap::Subcommand;
use futures_util::StreamExt;
use std::fs;
use std::path::Path;
use tar::{Builder, Header};
use tracing::{info, warn};

use super::init::DOCKERFILE_PATH;
use super::load_project;
use crate::sandbox::DockerBackend;
use crate::templates;

/// Image management actions.
#[derive(Subcommand, Debug)]
pub enum ImageAction {
    /// Build the sandbox image
    Build {
        /// Dockerfile to build from (default: sandbox/Dockerfile, or the built-in one)
        #[arg(long)]
        dockerfile: Option<String>,

        /// Image tag (default: from phoenix.toml or "ai-sandbox:latest")
        #[arg(long)]
        tag: Option<String>,
    },

    /// Show image status and information
    Status {
        /// Image name to check (default: from phoenix.toml or "ai-sandbox:latest")
        #[arg(long)]
        image: Option<String>,
    },
}

/// Run image management command.
pub async fn run(action: ImageAction) -> Result<()> {
    let (project_dir, config) = load_project()?;

    match action {
        ImageAction::Build { dockerfile, tag } => {
            let image_tag = tag.unwrap_or_else(|| config.sandbox.image.clone());
            let content = dockerfile_content(&project_dir, dockerfile.as_deref())?;
            build_image(&content, &image_tag).await?;
        }
        ImageAction::Status { image } => {
            let image_name = image.unwrap_or_else(|| config.sandbox.image.clone());
            show_image_status(&image_name).await?;
        }
    }

    Ok(())
}

/// Dockerfile text: an explicit path, else the project's, else the built-in.
fn dockerfile_content(project_dir: &Path, explicit: Option<&str>) -> Result<String> {
    if let Some(path) = explicit {
        let path = project_dir.join(path);
        return fs::read_to_string(&path)
            .with_context(|| format!("Dockerfile not found: {}", path.display()));
    }

    let project_file = project_dir.join(DOCKERFILE_PATH);
    if project_file.exists() {
        info!("Using {}", project_file.display());
        fs::read_to_string(&project_file)
            .with_context(|| format!("Failed to read {}", project_file.display()))
    } else {
        info!("Using built-in sandbox Dockerfile");
        Ok(templates::SANDBOX_DOCKERFILE.to_string())
    }
}

/// Build context holding a single `Dockerfile`.
fn build_context(dockerfile: &str) -> Result<Bytes> {
    let mut tar_buf = Vec::new();
    {
        let mut tar = Builder::new(&mut tar_buf);
        let mut header = Header::new_gnu();
        header.set_size(dockerfile.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, "Dockerfile", dockerfile.as_bytes())
            .context("Failed to add Dockerfile to build context")?;
        tar.finish().context("Failed to finalize build context")?;
    }
    Ok(Bytes::from(tar_buf))
}

/// Build the sandbox image from Dockerfile text.
async fn build_image(dockerfile: &str, tag: &str) -> Result<()> {
    info!("Building Docker image: {}", tag);

    let backend = DockerBackend::connect().await?;
    let docker = backend.client();

    let build_options = BuildImageOptions {
        dockerfile: "Dockerfile".to_string(),
        t: tag.to_string(),
        rm: true,
        ..Default::default()
    };

    let mut stream = docker.build_image(build_options, None, Some(build_context(dockerfile)?));

    let mut last_output = String::new();

    while let Some(chunk) = stream.next().await {
        let output = chunk.context("Error building image")?;
        if let Some(stream_text) = &output.stream {
            let trimmed = stream_text.trim();
            if !trimmed.is_empty() {
                println!("{trimmed}");
                last_output = trimmed.to_string();
            }
        } else if let Some(error) = &output.error {
            anyhow::bail!("Docker build error: {error}");
        } else if let Some(message) = output.error_detail.as_ref().and_then(|d| d.message.as_ref())
        {
            anyhow::bail!("Docker build error: {message}");
        }
    }

    if last_output.contains("Successfully tagged") || last_output.contains("Successfully built") {
        info!("Image built successfully: {}", tag);
    } else {
        warn!("Build completed, but success message not found. Image may not be tagged correctly.");
    }

    Ok(())
}

/// Whether any of an image's repo tags names `image`.
fn matches_image(summary: &ImageSummary, image: &str) -> bool {
    let (name, tag) = parse_image_tag(image);
    summary
        .repo_tags
        .iter()
        .any(|tag_str| parse_image_tag(tag_str) == (name, tag))
}

async fn list_matching(docker: &Docker, image: &str) -> Result<Vec<ImageSummary>> {
    let images = docker
        .list_images(Some(ListImagesOptions::<String> {
            all: true,
            ..Default::default()
        }))
        .await
        .context("Failed to list images")?;

    Ok(images
        .into_iter()
        .filter(|img| matches_image(img, image))
        .collect())
}

/// Show Docker image status and information.
async fn show_image_status(image: &str) -> Result<()> {
    let backend = DockerBackend::connect().await?;
    let matching = list_matching(backend.client(), image).await?;

    if matching.is_empty() {
        println!("Image not found: {image}");
        println!("\nTo build the image, run:");
        println!("  phoenix image build");
        return Ok(());
    }

    println!("Image: {image}");
    println!("Status: Found");

    for img in matching {
        println!("Size: {}", format_size(img.size));
        println!("Created: {}", img.created);
        if !img.repo_tags.is_empty() {
            println!("Tags: {}", img.repo_tags.join(", "));
        }
        println!("ID: {}", img.id);
    }

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: i64) -> String {
    let megabytes = bytes.unsigned_abs() as f64 / 1_048_576.0;
    let gigabytes = megabytes / 1024.0;
    if gigabytes >= 1.0 {
        format!("{gigabytes:.2} GB ({megabytes:.2} MB)")
    } else {
        format!("{megabytes:.2} MB")
    }
}

/// Parse image name and tag from a string.
fn parse_image_tag(image: &str) -> (&str, &str) {
    match image.rfind(':') {
        Some(colon_pos) if !image[colon_pos + 1..].contains('/') => {
            (&image[..colon_pos], &image[colon_pos + 1..])
        }
        _ => (image, "latest"),
    }
}
