//! Logical secrets, materialized from a store value plus its custom metadata.

use super::value::{SecretValue, MAX_SECRET_SIZE};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

/// Free-form string metadata stored alongside a secret in the store
pub type CustomMetadata = BTreeMap<String, String>;

/// Glob marker allowed in environment and branch scopes
pub const GLOB_MARKER: char = '*';

const ENVIRONMENT_KEY: &str = "environment";
const BRANCH_KEY: &str = "branch";
const DESCRIPTION_KEY: &str = "description";
const ROTATION_INFO_KEY: &str = "rotation_info_id";

lazy_static! {
    static ref SECRET_NAME_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9_-]+$").expect("SECRET_NAME_REGEX should be a valid regex pattern");
    static ref SCOPE_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9_.*/-]+$").expect("SCOPE_REGEX should be a valid regex pattern");
}

/// A tenant's named secret, scoped to an environment and branch.
///
/// There is no local record: the store is the source of truth for existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Secret {
    #[validate(
        length(min = 1, max = 255, message = "Secret name must be between 1 and 255 characters"),
        custom(function = "validate_secret_name")
    )]
    pub name: String,

    #[validate(
        length(min = 1, max = 255, message = "Environment must be between 1 and 255 characters"),
        custom(function = "validate_scope")
    )]
    pub environment: String,

    #[validate(
        length(min = 1, max = 255, message = "Branch must be between 1 and 255 characters"),
        custom(function = "validate_scope")
    )]
    pub branch: String,

    #[validate(length(max = 200, message = "Description must be at most 200 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_info_id: Option<String>,

    /// Current store version, `None` until written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Only populated when the value was explicitly fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SecretValue>,
}

impl Secret {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<SecretValue>,
        environment: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            environment: environment.into(),
            branch: branch.into(),
            description: None,
            rotation_info_id: None,
            version: None,
            created_at: None,
            value: Some(value.into()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate every field, then the value: non-empty and within quota.
    pub fn validate_for_write(&self) -> Result<()> {
        self.validate()?;
        match &self.value {
            None => Err(Error::validation_field("Secret value is required", "value")),
            Some(value) if value.is_empty() => {
                Err(Error::validation_field("Secret value cannot be empty", "value"))
            }
            Some(value) if value.exceeds_quota() => Err(Error::validation_field(
                format!("Secret value exceeds the maximum size of {} bytes", MAX_SECRET_SIZE),
                "value",
            )),
            Some(_) => Ok(()),
        }
    }

    /// True when environment or branch contains a glob marker
    pub fn is_glob_scoped(&self) -> bool {
        is_glob(&self.environment) || is_glob(&self.branch)
    }

    /// Encode the non-value fields as the store's custom metadata
    pub fn custom_metadata(&self) -> CustomMetadata {
        let mut metadata = CustomMetadata::new();
        metadata.insert(ENVIRONMENT_KEY.to_string(), self.environment.clone());
        metadata.insert(BRANCH_KEY.to_string(), self.branch.clone());
        if let Some(description) = &self.description {
            metadata.insert(DESCRIPTION_KEY.to_string(), description.clone());
        }
        if let Some(id) = &self.rotation_info_id {
            metadata.insert(ROTATION_INFO_KEY.to_string(), id.clone());
        }
        metadata
    }

    /// Rebuild a secret from the custom metadata the store returned for `name`.
    pub fn from_metadata(name: impl Into<String>, metadata: &CustomMetadata) -> Result<Self> {
        let name = name.into();
        let required = |key: &str| {
            metadata.get(key).cloned().ok_or_else(|| {
                Error::internal(format!("Secret '{}' metadata is missing '{}'", name, key))
            })
        };

        Ok(Self {
            environment: required(ENVIRONMENT_KEY)?,
            branch: required(BRANCH_KEY)?,
            description: metadata.get(DESCRIPTION_KEY).cloned(),
            rotation_info_id: metadata.get(ROTATION_INFO_KEY).cloned(),
            version: None,
            created_at: None,
            value: None,
            name,
        })
    }
}

/// Read the rotation reminder reference out of raw custom metadata
pub fn rotation_info_id(metadata: &CustomMetadata) -> Option<&str> {
    metadata.get(ROTATION_INFO_KEY).map(String::as_str)
}

pub fn is_glob(scope: &str) -> bool {
    scope.contains(GLOB_MARKER)
}

pub fn validate_secret_name(name: &str) -> std::result::Result<(), ValidationError> {
    if SECRET_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        let mut error = ValidationError::new("invalid_secret_name");
        error.message =
            Some("Secret name may only contain letters, digits, underscores and hyphens".into());
        Err(error)
    }
}

fn validate_scope(scope: &str) -> std::result::Result<(), ValidationError> {
    if SCOPE_REGEX.is_match(scope) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_scope"))
    }
}
