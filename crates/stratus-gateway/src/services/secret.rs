// crates/stratus-gateway/src/services/secret.rs
// ============================================================================
// Module: Secret Service
// Description: Versioned secret store over the target-header convention.
// Purpose: Exercise random per-create ARNs and staging-label consistency.
// Dependencies: serde, serde_json, stratus-core
// ============================================================================

//! ## Overview
//! Secrets are strict-conflict entities keyed by name. The ARN carries a
//! random six-character suffix chosen at create time, so a re-created
//! secret gets a new ARN. Version ids are random unless the client sends a
//! `ClientRequestToken`; repeating a token with the same value returns the
//! existing version.
//!
//! The normalizer keeps staging labels consistent: whenever versions exist,
//! exactly one carries `AWSCURRENT` and at most one carries `AWSPREVIOUS`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use stratus_core::Entity;
use stratus_core::EntityKind;
use stratus_core::IdempotencyPolicy;
use stratus_core::NormalizeContext;
use stratus_core::StoreError;
use stratus_core::Timestamp;
use stratus_core::deterministic_token;
use stratus_core::random_token;

use crate::error::ApiError;
use crate::error::ErrorKind;
use crate::protocol::OperationInput;
use crate::protocol::OperationOutput;
use crate::registry::Binding;
use crate::registry::MarkupStyle;
use crate::registry::OperationContext;
use crate::registry::ServiceDefinition;
use crate::services::params::decode_json;
use crate::services::params::require_field;
use crate::services::tags;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Service name.
pub const SERVICE: &str = "secretsmanager";
/// Label of the live version.
pub const CURRENT_STAGE: &str = "AWSCURRENT";
/// Label of the version replaced by the live one.
pub const PREVIOUS_STAGE: &str = "AWSPREVIOUS";
/// Length of the random ARN suffix.
const ARN_SUFFIX_LENGTH: usize = 6;
/// Not-found error code.
const NOT_FOUND: &str = "ResourceNotFoundException";
/// Collision error code.
const EXISTS: &str = "ResourceExistsException";
/// Declared operations.
const OPERATIONS: &[&str] = &[
    "CreateSecret",
    "DescribeSecret",
    "GetSecretValue",
    "PutSecretValue",
    "DeleteSecret",
    "ListSecrets",
];

// ============================================================================
// SECTION: Entity
// ============================================================================

/// One stored version of a secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecretVersion {
    /// Version id.
    pub version_id: String,
    /// String payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_string: Option<String>,
    /// Base64 binary payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_binary: Option<String>,
    /// Staging labels.
    pub version_stages: Vec<String>,
    /// Creation time (epoch seconds).
    pub created_date: f64,
}

impl SecretVersion {
    /// Returns true when the version carries `stage`.
    fn has_stage(&self, stage: &str) -> bool {
        self.version_stages.iter().any(|label| label == stage)
    }

    /// Returns true when the payload matches.
    fn same_payload(&self, string: Option<&String>, binary: Option<&String>) -> bool {
        self.secret_string.as_ref() == string && self.secret_binary.as_ref() == binary
    }
}

/// Stored secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Secret {
    /// Secret name.
    pub name: String,
    /// ARN with random suffix.
    #[serde(rename = "ARN")]
    pub arn: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// KMS key id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    /// Versions, oldest first.
    pub versions: Vec<SecretVersion>,
}

impl Secret {
    /// Returns the version holding `stage`.
    fn staged(&self, stage: &str) -> Option<&SecretVersion> {
        self.versions.iter().find(|version| version.has_stage(stage))
    }

    /// Moves `AWSCURRENT` to `version_id`, demoting the old holder to
    /// `AWSPREVIOUS`. Versions left without any label are dropped.
    fn promote(&mut self, version_id: &str) {
        let previous = self
            .staged(CURRENT_STAGE)
            .filter(|version| version.version_id != version_id)
            .map(|version| version.version_id.clone());
        for version in &mut self.versions {
            if previous.is_some() {
                version.version_stages.retain(|label| label != PREVIOUS_STAGE);
            }
            if version.version_id == version_id {
                if !version.has_stage(CURRENT_STAGE) {
                    version.version_stages.push(CURRENT_STAGE.to_string());
                }
            } else if previous.as_deref() == Some(version.version_id.as_str()) {
                version.version_stages.retain(|label| label != CURRENT_STAGE);
                version.version_stages.push(PREVIOUS_STAGE.to_string());
            }
        }
        self.prune();
    }

    /// Drops versions that no longer carry any staging label.
    fn prune(&mut self) {
        self.versions.retain(|version| !version.version_stages.is_empty());
    }
}

impl EntityKind for Secret {
    const SERVICE: &'static str = SERVICE;
    const RESOURCE_TYPE: &'static str = "secret";
    const POLICY: IdempotencyPolicy = IdempotencyPolicy::StrictConflict;

    fn normalize(&mut self, ctx: &NormalizeContext<'_>) {
        self.name = ctx.name.to_string();
        let arn_prefix = ctx.identity.arn(SERVICE, &format!("secret:{}-", ctx.name));
        let suffix_ok = self
            .arn
            .strip_prefix(arn_prefix.as_str())
            .is_some_and(|suffix| suffix.len() == ARN_SUFFIX_LENGTH);
        if !suffix_ok {
            self.arn =
                format!("{arn_prefix}{}", deterministic_token(ctx.name, ARN_SUFFIX_LENGTH));
        }
        let current_holders = self.versions.iter().filter(|v| v.has_stage(CURRENT_STAGE)).count();
        if current_holders != 1
            && let Some(latest) = self
                .versions
                .iter()
                .rposition(|v| v.has_stage(CURRENT_STAGE))
                .or_else(|| self.versions.len().checked_sub(1))
        {
            for (index, version) in self.versions.iter_mut().enumerate() {
                version.version_stages.retain(|label| label != CURRENT_STAGE);
                if index == latest {
                    version.version_stages.push(CURRENT_STAGE.to_string());
                }
            }
        }
        if let Some(keep) = self.versions.iter().rposition(|v| v.has_stage(PREVIOUS_STAGE)) {
            for (index, version) in self.versions.iter_mut().enumerate() {
                if index != keep {
                    version.version_stages.retain(|label| label != PREVIOUS_STAGE);
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Tag as sent on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct WireTag {
    /// Tag key.
    key: String,
    /// Tag value.
    value: String,
}

/// `CreateSecret` input.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct CreateSecretRequest {
    /// Secret name.
    name: Option<String>,
    /// Idempotency token used as the first version id.
    client_request_token: Option<String>,
    /// Description.
    description: Option<String>,
    /// KMS key id.
    kms_key_id: Option<String>,
    /// String payload.
    secret_string: Option<String>,
    /// Binary payload.
    secret_binary: Option<String>,
    /// Tags.
    tags: Vec<WireTag>,
}

/// `PutSecretValue` input.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct PutSecretValueRequest {
    /// Name or ARN.
    secret_id: Option<String>,
    /// Idempotency token used as the version id.
    client_request_token: Option<String>,
    /// String payload.
    secret_string: Option<String>,
    /// Binary payload.
    secret_binary: Option<String>,
    /// Labels for the new version.
    version_stages: Vec<String>,
}

/// Input addressing one secret, optionally one version.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct SecretIdRequest {
    /// Name or ARN.
    secret_id: Option<String>,
    /// Version id.
    version_id: Option<String>,
    /// Staging label.
    version_stage: Option<String>,
}

// ============================================================================
// SECTION: Definition
// ============================================================================

/// Returns the secret service definition.
#[must_use]
pub fn definition() -> ServiceDefinition {
    ServiceDefinition {
        name: SERVICE,
        target_prefix: Some(SERVICE),
        data_content_type: "application/x-amz-json-1.1",
        xml_namespace: "",
        markup_style: MarkupStyle::Wrapped,
        operations: OPERATIONS,
        bindings: vec![
            Binding::target("CreateSecret", create_secret),
            Binding::target("DescribeSecret", describe_secret),
            Binding::target("GetSecretValue", get_secret_value),
            Binding::target("PutSecretValue", put_secret_value),
            Binding::target("DeleteSecret", delete_secret),
            Binding::target("ListSecrets", list_secrets),
        ],
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Creates a secret with an optional first version.
fn create_secret(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: CreateSecretRequest = decode_json(input)?;
    let name = require_field(request.name, "Name")?;
    validate_payload(request.secret_string.as_ref(), request.secret_binary.as_ref())?;
    let mut versions = Vec::new();
    if request.secret_string.is_some() || request.secret_binary.is_some() {
        versions.push(SecretVersion {
            version_id: request.client_request_token.unwrap_or_else(new_version_id),
            secret_string: request.secret_string,
            secret_binary: request.secret_binary,
            version_stages: vec![CURRENT_STAGE.to_string()],
            created_date: Timestamp::now().as_epoch_seconds(),
        });
    }
    let arn = ctx.entities.identity().arn(
        SERVICE,
        &format!("secret:{name}-{}", random_token(ARN_SUFFIX_LENGTH)),
    );
    let secret = Secret {
        arn,
        description: request.description,
        kms_key_id: request.kms_key_id,
        versions,
        ..Secret::default()
    };
    let entity = ctx.entities.create(&name, secret).map_err(|err| secret_error(err, &name))?;
    let entity = entity.into_entity();
    let tags: BTreeMap<String, String> =
        request.tags.into_iter().map(|tag| (tag.key, tag.value)).collect();
    if let Err(err) = tags::tag(&ctx.entities, &entity.attributes.arn, tags) {
        tags::discard::<Secret>(&ctx.entities, &name, &entity.attributes.arn);
        return Err(err);
    }
    let mut output = json!({ "ARN": entity.attributes.arn, "Name": entity.name });
    if let Some(version) = entity.attributes.staged(CURRENT_STAGE) {
        output["VersionId"] = Value::String(version.version_id.clone());
    }
    Ok(OperationOutput::data(output))
}

/// Describes a secret's metadata and version stages.
fn describe_secret(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: SecretIdRequest = decode_json(input)?;
    let entity = load(ctx, request.secret_id)?;
    let tags = tags::tags_of(&ctx.entities, &entity.attributes.arn)?;
    let mut output = summary(&entity);
    output["Tags"] = json!(
        tags.into_iter()
            .map(|(key, value)| WireTag {
                key,
                value,
            })
            .collect::<Vec<_>>()
    );
    Ok(OperationOutput::data(output))
}

/// Returns one version's payload, `AWSCURRENT` by default.
fn get_secret_value(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: SecretIdRequest = decode_json(input)?;
    let entity = load(ctx, request.secret_id)?;
    let secret = &entity.attributes;
    let version = match (&request.version_id, &request.version_stage) {
        (Some(id), stage) => secret
            .versions
            .iter()
            .find(|v| &v.version_id == id && stage.as_ref().is_none_or(|s| v.has_stage(s))),
        (None, Some(stage)) => secret.staged(stage),
        (None, None) => secret.staged(CURRENT_STAGE),
    };
    let Some(version) = version else {
        let label = request.version_stage.as_deref().unwrap_or(CURRENT_STAGE);
        return Err(ApiError::not_found(
            NOT_FOUND,
            format!(
                "Secrets Manager can't find the specified secret value for staging label: {label}"
            ),
        ));
    };
    let mut output = json!({
        "ARN": secret.arn,
        "Name": entity.name,
        "VersionId": version.version_id,
        "VersionStages": version.version_stages,
        "CreatedDate": version.created_date,
    });
    if let Some(value) = &version.secret_string {
        output["SecretString"] = Value::String(value.clone());
    }
    if let Some(value) = &version.secret_binary {
        output["SecretBinary"] = Value::String(value.clone());
    }
    Ok(OperationOutput::data(output))
}

/// Adds a version; a repeated token with the same payload is a no-op.
fn put_secret_value(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: PutSecretValueRequest = decode_json(input)?;
    let mut entity = load(ctx, request.secret_id)?;
    if request.secret_string.is_none() && request.secret_binary.is_none() {
        return Err(ApiError::new(
            ErrorKind::Validation,
            "InvalidRequestException",
            "You must provide either SecretString or SecretBinary.",
        ));
    }
    validate_payload(request.secret_string.as_ref(), request.secret_binary.as_ref())?;
    let version_id = request.client_request_token.unwrap_or_else(new_version_id);
    let existing = entity.attributes.versions.iter().find(|v| v.version_id == version_id);
    if let Some(existing) = existing {
        if !existing.same_payload(request.secret_string.as_ref(), request.secret_binary.as_ref()) {
            return Err(ApiError::already_exists(
                EXISTS,
                format!(
                    "You can't modify an existing version {version_id}, you can only create a \
                     new version."
                ),
            ));
        }
        return Ok(OperationOutput::data(json!({
            "ARN": entity.attributes.arn,
            "Name": entity.name,
            "VersionId": existing.version_id,
            "VersionStages": existing.version_stages,
        })));
    }
    let mut stages = request.version_stages;
    if stages.is_empty() {
        stages.push(CURRENT_STAGE.to_string());
    }
    let make_current = stages.iter().any(|stage| stage == CURRENT_STAGE);
    stages.retain(|stage| stage != CURRENT_STAGE);
    for version in &mut entity.attributes.versions {
        version.version_stages.retain(|label| !stages.contains(label));
    }
    entity.attributes.versions.push(SecretVersion {
        version_id: version_id.clone(),
        secret_string: request.secret_string,
        secret_binary: request.secret_binary,
        version_stages: stages,
        created_date: Timestamp::now().as_epoch_seconds(),
    });
    if make_current {
        entity.attributes.promote(&version_id);
    } else {
        entity.attributes.prune();
    }
    ctx.entities.save(&mut entity).map_err(|err| secret_error(err, &entity.name))?;
    let stages = entity
        .attributes
        .versions
        .iter()
        .find(|v| v.version_id == version_id)
        .map(|v| v.version_stages.clone())
        .unwrap_or_default();
    Ok(OperationOutput::data(json!({
        "ARN": entity.attributes.arn,
        "Name": entity.name,
        "VersionId": version_id,
        "VersionStages": stages,
    })))
}

/// Deletes a secret immediately.
fn delete_secret(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: SecretIdRequest = decode_json(input)?;
    let entity = load(ctx, request.secret_id)?;
    ctx.entities.delete::<Secret>(&entity.name).map_err(|err| secret_error(err, &entity.name))?;
    tags::clear(&ctx.entities, &entity.attributes.arn)?;
    Ok(OperationOutput::data(json!({
        "ARN": entity.attributes.arn,
        "Name": entity.name,
        "DeletionDate": Timestamp::now().as_epoch_seconds(),
    })))
}

/// Lists secret summaries in name order.
fn list_secrets(
    ctx: &OperationContext<'_>,
    _input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let secrets: Vec<Value> = ctx.entities.list::<Secret>()?.iter().map(summary).collect();
    Ok(OperationOutput::data(json!({ "SecretList": secrets })))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads a secret by name or ARN.
fn load(ctx: &OperationContext<'_>, secret_id: Option<String>) -> Result<Entity<Secret>, ApiError> {
    let secret_id = require_field(secret_id, "SecretId")?;
    let name = name_from_id(&secret_id);
    let entity = ctx.entities.get::<Secret>(name).map_err(|err| secret_error(err, name))?;
    if secret_id.starts_with("arn:") && entity.attributes.arn != secret_id {
        return Err(not_found());
    }
    Ok(entity)
}

/// Extracts the secret name from a name or full ARN.
fn name_from_id(secret_id: &str) -> &str {
    if !secret_id.starts_with("arn:") {
        return secret_id;
    }
    let Some((_, tail)) = secret_id.split_once(":secret:") else {
        return secret_id;
    };
    match tail.rsplit_once('-') {
        Some((name, suffix)) if suffix.len() == ARN_SUFFIX_LENGTH => name,
        _ => tail,
    }
}

/// Maps store errors with secret wording.
fn secret_error(err: StoreError, name: &str) -> ApiError {
    match err {
        StoreError::NotFound(_) => not_found(),
        StoreError::AlreadyExists(_) => ApiError::already_exists(
            EXISTS,
            format!("The operation failed because the secret {name} already exists."),
        ),
        other => ApiError::from(other),
    }
}

/// Not-found error with provider wording.
fn not_found() -> ApiError {
    ApiError::not_found(NOT_FOUND, "Secrets Manager can't find the specified secret.")
}

/// Renders the metadata shared by describe and list.
fn summary(entity: &Entity<Secret>) -> Value {
    let secret = &entity.attributes;
    let stages: Map<String, Value> = secret
        .versions
        .iter()
        .filter(|version| !version.version_stages.is_empty())
        .map(|version| (version.version_id.clone(), json!(version.version_stages)))
        .collect();
    let mut output = json!({
        "ARN": secret.arn,
        "Name": entity.name,
        "CreatedDate": entity.created_at.as_epoch_seconds(),
        "VersionIdsToStages": stages,
    });
    if let Some(description) = &secret.description {
        output["Description"] = Value::String(description.clone());
    }
    if let Some(key) = &secret.kms_key_id {
        output["KmsKeyId"] = Value::String(key.clone());
    }
    output
}

/// Rejects requests carrying both payload kinds.
fn validate_payload(string: Option<&String>, binary: Option<&String>) -> Result<(), ApiError> {
    if string.is_some() && binary.is_some() {
        return Err(ApiError::new(
            ErrorKind::Validation,
            "InvalidParameterException",
            "You can't specify both a binary secret value and a string secret value in the same \
             secret.",
        ));
    }
    Ok(())
}

/// Generates a random UUID-shaped version id.
fn new_version_id() -> String {
    let hex = random_token(32);
    let part = |from: usize, to: usize| hex.get(from .. to).unwrap_or_default().to_string();
    format!("{}-{}-{}-{}-{}", part(0, 8), part(8, 12), part(12, 16), part(16, 20), part(20, 32))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use stratus_core::NamespaceId;
    use stratus_core::ProviderIdentity;

    use super::*;

    fn version(id: &str, stages: &[&str]) -> SecretVersion {
        SecretVersion {
            version_id: id.to_string(),
            version_stages: stages.iter().map(|s| (*s).to_string()).collect(),
            ..SecretVersion::default()
        }
    }

    fn normalized(mut secret: Secret) -> Secret {
        let identity = ProviderIdentity::default();
        let namespace = NamespaceId::new("default");
        secret.normalize(&NormalizeContext {
            name: "db-password",
            namespace: &namespace,
            identity: &identity,
        });
        secret
    }

    #[test]
    fn exactly_one_current_stage_survives() {
        let secret = normalized(Secret {
            versions: vec![version("a", &[CURRENT_STAGE]), version("b", &[CURRENT_STAGE])],
            ..Secret::default()
        });
        assert!(!secret.versions[0].has_stage(CURRENT_STAGE));
        assert!(secret.versions[1].has_stage(CURRENT_STAGE));
    }

    #[test]
    fn latest_version_becomes_current_when_none_is() {
        let secret = normalized(Secret {
            versions: vec![version("a", &[]), version("b", &[PREVIOUS_STAGE])],
            ..Secret::default()
        });
        assert!(secret.versions[1].has_stage(CURRENT_STAGE));
    }

    #[test]
    fn promote_demotes_previous_holder() {
        let mut secret = Secret {
            versions: vec![version("a", &[PREVIOUS_STAGE]), version("b", &[CURRENT_STAGE])],
            ..Secret::default()
        };
        secret.versions.push(version("c", &[]));
        secret.promote("c");
        let ids: Vec<&str> = secret.versions.iter().map(|v| v.version_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(secret.versions[0].version_stages, vec![PREVIOUS_STAGE.to_string()]);
        assert_eq!(secret.versions[1].version_stages, vec![CURRENT_STAGE.to_string()]);
    }

    #[test]
    fn repeated_rotation_keeps_only_labeled_versions() {
        let mut secret = Secret {
            versions: vec![version("v0", &[CURRENT_STAGE])],
            ..Secret::default()
        };
        for id in ["v1", "v2", "v3", "v4"] {
            secret.versions.push(version(id, &[]));
            secret.promote(id);
        }
        let ids: Vec<&str> = secret.versions.iter().map(|v| v.version_id.as_str()).collect();
        assert_eq!(ids, vec!["v3", "v4"]);
    }

    #[test]
    fn arn_suffix_is_kept_when_well_formed() {
        let arn = "arn:aws:secretsmanager:us-east-1:000000000000:secret:db-password-AbC123";
        let secret = normalized(Secret {
            arn: arn.to_string(),
            ..Secret::default()
        });
        assert_eq!(secret.arn, arn);
        let repaired = normalized(Secret::default());
        let prefix = "arn:aws:secretsmanager:us-east-1:000000000000:secret:db-password-";
        assert!(repaired.arn.starts_with(prefix));
        assert_eq!(normalized(repaired.clone()), repaired);
    }

    #[test]
    fn names_are_recovered_from_arns() {
        assert_eq!(name_from_id("db"), "db");
        assert_eq!(
            name_from_id("arn:aws:secretsmanager:us-east-1:000000000000:secret:my-db-AbC123"),
            "my-db"
        );
    }
}
