//! Submission forms and their local validation.
//!
//! Every product variant requires at least an idea/context description and
//! an audience description. Validation runs before any request is built, so
//! an incomplete form never reaches the network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Form contract
// ---------------------------------------------------------------------------

/// A form payload that can be submitted to create an analysis job.
pub trait SubmissionForm: Serialize + Send + Sync {
    /// `(field name, value)` pairs that must be non-blank.
    fn required_fields(&self) -> Vec<(&str, &str)>;

    /// Check every required field, naming all that are blank.
    fn validate(&self) -> Result<(), CoreError> {
        let missing: Vec<String> = self
            .required_fields()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation { missing })
        }
    }
}

// ---------------------------------------------------------------------------
// Business-idea form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Industry {
    #[default]
    Tech,
    #[serde(rename = "E-commerce")]
    ECommerce,
    Healthcare,
    Education,
    Finance,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Geography {
    #[default]
    Russia,
    #[serde(rename = "USA")]
    Usa,
    Europe,
    Asia,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStage {
    #[default]
    Idea,
    Prototype,
    FirstClients,
    Scale,
}

/// The short business-idea questionnaire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessIdeaForm {
    pub idea_description: String,
    pub target_audience: String,
    #[serde(default)]
    pub industry: Industry,
    #[serde(default)]
    pub geography: Geography,
    pub value_proposition: String,
    pub monetization_model: String,
    #[serde(default)]
    pub project_stage: ProjectStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_comments: Option<String>,
}

impl SubmissionForm for BusinessIdeaForm {
    fn required_fields(&self) -> Vec<(&str, &str)> {
        vec![
            ("idea_description", self.idea_description.as_str()),
            ("target_audience", self.target_audience.as_str()),
            ("value_proposition", self.value_proposition.as_str()),
            ("monetization_model", self.monetization_model.as_str()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Labelled-field form
// ---------------------------------------------------------------------------

/// A variant form described as labelled string fields.
///
/// `context_field` and `audience_field` are always required; `extra_required`
/// adds variant-specific requirements. Serializes as a flat JSON object of
/// the field values.
#[derive(Debug, Clone)]
pub struct LabelledForm {
    context_field: String,
    audience_field: String,
    extra_required: Vec<String>,
    values: BTreeMap<String, String>,
}

impl LabelledForm {
    pub fn new(context_field: impl Into<String>, audience_field: impl Into<String>) -> Self {
        Self {
            context_field: context_field.into(),
            audience_field: audience_field.into(),
            extra_required: Vec::new(),
            values: BTreeMap::new(),
        }
    }

    /// Mark an additional field as required.
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.extra_required.push(field.into());
        self
    }

    /// Set a field value, replacing any previous one.
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

impl Serialize for LabelledForm {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

impl SubmissionForm for LabelledForm {
    fn required_fields(&self) -> Vec<(&str, &str)> {
        std::iter::once(self.context_field.as_str())
            .chain(std::iter::once(self.audience_field.as_str()))
            .chain(self.extra_required.iter().map(String::as_str))
            .map(|name| (name, self.value(name).unwrap_or("")))
            .collect()
    }
}
