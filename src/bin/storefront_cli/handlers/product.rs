#![deny(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use serde::Serialize;
use storefront::domain::images::{ImageBatchOutcome, ImageBlob};
use storefront::domain::product_form::{Category, FieldErrors, ProductForm, ProductSubmission};

use crate::args::{CategoryArg, ProductCmd};
use crate::client::{CliError, Ctx};
use crate::print::print_json;

pub async fn handle(ctx: &Ctx, cmd: ProductCmd) -> Result<(), CliError> {
    match cmd {
        ProductCmd::Check {
            title,
            description,
            category,
            images,
        } => check(ctx, title, description, category, images).await,
    }
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub valid: bool,
    pub images: ImageBatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionSummary {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub images: Vec<StagedImage>,
}

#[derive(Debug, Serialize)]
pub struct StagedImage {
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

impl From<ProductSubmission> for SubmissionSummary {
    fn from(submission: ProductSubmission) -> Self {
        Self {
            title: submission.title,
            description: submission.description,
            category: submission.category,
            images: submission
                .images
                .into_iter()
                .map(|image| StagedImage {
                    name: image.name,
                    content_type: image.content_type,
                    size_bytes: image.size_bytes,
                })
                .collect(),
        }
    }
}

/// Stage `images` as one batch on a fresh form and evaluate it.
pub async fn build_report(
    ctx: &Ctx,
    title: String,
    description: String,
    category: Option<CategoryArg>,
    images: Vec<PathBuf>,
) -> Result<CheckReport, CliError> {
    let policy = ctx.settings.images.policy();
    let mut form = ProductForm::new(policy);
    form.set_title(title);
    form.set_description(description);
    form.set_category(category.map(Category::from));

    let mut batch = Vec::with_capacity(images.len());
    for path in images {
        batch.push(ImageBlob::from_path(&path, policy.max_image_bytes).await?);
    }
    let outcome = form.set_images(batch);

    let report = match form.submission() {
        Ok(submission) => CheckReport {
            valid: true,
            images: outcome,
            submission: Some(submission.into()),
            errors: None,
        },
        Err(errors) => CheckReport {
            valid: false,
            images: outcome,
            submission: None,
            errors: Some(errors),
        },
    };
    Ok(report)
}

async fn check(
    ctx: &Ctx,
    title: String,
    description: String,
    category: Option<CategoryArg>,
    images: Vec<PathBuf>,
) -> Result<(), CliError> {
    let report = build_report(ctx, title, description, category, images).await?;
    print_json(&report)?;
    if report.valid {
        Ok(())
    } else {
        Err(CliError::InvalidInput(
            "product draft failed validation".to_string(),
        ))
    }
}
