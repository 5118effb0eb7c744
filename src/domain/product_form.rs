//! Product draft form state.
//!
//! Holds the general-information fields of a product being created, stages
//! candidate images against an [`ImagePolicy`], and evaluates the required
//! field rules when the form is about to be submitted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::images::{ImageBatchOutcome, ImageBlob, ImagePolicy};

const TITLE_REQUIRED: &str = "Product title is required";
const DESCRIPTION_REQUIRED: &str = "Description is required";
const CATEGORY_REQUIRED: &str = "Category is required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Clothing,
    Books,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Title,
    Description,
    Category,
    Images,
}

/// Validation state of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum FieldStatus {
    Valid,
    Error(String),
}

impl FieldStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, FieldStatus::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            FieldStatus::Valid => None,
            FieldStatus::Error(message) => Some(message),
        }
    }
}

/// Per-field validation results, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<FormField, FieldStatus>);

impl FieldErrors {
    pub fn status(&self, field: FormField) -> &FieldStatus {
        self.0.get(&field).unwrap_or(&FieldStatus::Valid)
    }

    pub fn message(&self, field: FormField) -> Option<&str> {
        self.status(field).message()
    }

    pub fn has_errors(&self) -> bool {
        self.0.values().any(|status| !status.is_valid())
    }

    /// Fields currently in error, in field order.
    pub fn errors(&self) -> impl Iterator<Item = (FormField, &str)> {
        self.0
            .iter()
            .filter_map(|(field, status)| status.message().map(|message| (*field, message)))
    }

    fn set(&mut self, field: FormField, status: FieldStatus) {
        self.0.insert(field, status);
    }
}

/// Where the form is in its hydration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormLifecycle {
    Uninitialized,
    Hydrated,
    Edited,
}

/// Initial values supplied by the caller, e.g. when editing an existing product.
#[derive(Debug, Clone, Default)]
pub struct InitialDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub images: Vec<ImageBlob>,
}

/// A validated snapshot ready to hand to the submission layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSubmission {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub images: Vec<ImageBlob>,
}

/// Form state for the product general-information section.
#[derive(Debug, Clone)]
pub struct ProductForm {
    policy: ImagePolicy,
    lifecycle: FormLifecycle,
    title: String,
    description: String,
    category: Option<Category>,
    images: Vec<ImageBlob>,
}

impl Default for ProductForm {
    fn default() -> Self {
        Self::new(ImagePolicy::default())
    }
}

impl ProductForm {
    pub fn new(policy: ImagePolicy) -> Self {
        Self {
            policy,
            lifecycle: FormLifecycle::Uninitialized,
            title: String::new(),
            description: String::new(),
            category: None,
            images: Vec::new(),
        }
    }

    pub fn policy(&self) -> &ImagePolicy {
        &self.policy
    }

    pub fn lifecycle(&self) -> FormLifecycle {
        self.lifecycle
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn images(&self) -> &[ImageBlob] {
        &self.images
    }

    /// Hydrate the form once from `draft`.
    ///
    /// Only valid while the form is still uninitialized; any later call
    /// (including after user edits) is ignored so in-progress input survives.
    /// Returns whether hydration happened.
    pub fn initialize_from_draft(&mut self, draft: InitialDraft) -> bool {
        if self.lifecycle != FormLifecycle::Uninitialized {
            debug!(
                lifecycle = ?self.lifecycle,
                "Ignoring draft hydration on an initialized form"
            );
            return false;
        }

        self.title = draft.title.unwrap_or_default();
        self.description = draft.description.unwrap_or_default();
        self.category = draft.category;
        let policy = self.policy;
        self.images = draft
            .images
            .into_iter()
            .filter(|image| image.is_image() && image.size_bytes <= policy.max_image_bytes)
            .take(policy.max_images)
            .collect();
        self.lifecycle = FormLifecycle::Hydrated;
        true
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.mark_edited();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.mark_edited();
    }

    pub fn set_category(&mut self, category: Option<Category>) {
        self.category = category;
        self.mark_edited();
    }

    /// Stage a batch of candidate images (drop or file-picker selection).
    ///
    /// Rejected files are dropped without touching the form's validation
    /// state; the returned outcome lists them for callers that want to tell
    /// the user.
    pub fn set_images(&mut self, files: Vec<ImageBlob>) -> ImageBatchOutcome {
        let (accepted, outcome) = self.policy.filter(self.images.len(), files);
        if !outcome.rejected.is_empty() {
            debug!(
                accepted = outcome.accepted,
                rejected = outcome.rejected.len(),
                staged = self.images.len(),
                "Dropped candidate images"
            );
        }
        self.images.extend(accepted);
        self.mark_edited();
        outcome
    }

    /// Alias of [`ProductForm::set_images`] for call sites that add to the staged set.
    pub fn add_images(&mut self, files: Vec<ImageBlob>) -> ImageBatchOutcome {
        self.set_images(files)
    }

    /// Remove the image at `index`; out-of-range indices are a no-op.
    pub fn remove_image(&mut self, index: usize) -> Option<ImageBlob> {
        if index >= self.images.len() {
            return None;
        }
        let removed = self.images.remove(index);
        self.mark_edited();
        Some(removed)
    }

    /// Evaluate the required-field rules.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        errors.set(FormField::Title, required(&self.title, TITLE_REQUIRED));
        errors.set(
            FormField::Description,
            required(&self.description, DESCRIPTION_REQUIRED),
        );
        errors.set(
            FormField::Category,
            match self.category {
                Some(_) => FieldStatus::Valid,
                None => FieldStatus::Error(CATEGORY_REQUIRED.to_string()),
            },
        );
        errors.set(FormField::Images, FieldStatus::Valid);
        errors
    }

    /// Validate and snapshot the form for submission.
    pub fn submission(&self) -> Result<ProductSubmission, FieldErrors> {
        let errors = self.validate();
        match self.category {
            Some(category) if !errors.has_errors() => Ok(ProductSubmission {
                title: self.title.clone(),
                description: self.description.clone(),
                category,
                images: self.images.clone(),
            }),
            _ => Err(errors),
        }
    }

    fn mark_edited(&mut self) {
        self.lifecycle = FormLifecycle::Edited;
    }
}

fn required(value: &str, message: &str) -> FieldStatus {
    if value.is_empty() {
        FieldStatus::Error(message.to_string())
    } else {
        FieldStatus::Valid
    }
}
