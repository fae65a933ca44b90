// crates/stratus-gateway/src/services/queue.rs
// ============================================================================
// Module: Queue Service
// Description: Message queue control plane over the query-action convention.
// Purpose: Exercise idempotent-return create and FIFO-exclusive attributes.
// Dependencies: serde, stratus-core
// ============================================================================

//! ## Overview
//! Queues are idempotent-return entities keyed by name: creating an existing
//! queue returns the stored queue and its URL without writing. FIFO-only
//! attributes are present exactly when the name ends in `.fifo`; default
//! attributes are filled in and the URL and `QueueArn` are recomputed from
//! the name on every pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use stratus_core::Entity;
use stratus_core::EntityKind;
use stratus_core::IdempotencyPolicy;
use stratus_core::NormalizeContext;
use stratus_core::StoreError;

use crate::error::ApiError;
use crate::error::ErrorKind;
use crate::protocol::FormParams;
use crate::protocol::OperationInput;
use crate::protocol::OperationOutput;
use crate::registry::Binding;
use crate::registry::MarkupStyle;
use crate::registry::OperationContext;
use crate::registry::ServiceDefinition;
use crate::services::params::form;
use crate::services::params::indexed_pairs;
use crate::services::params::indexed_values;
use crate::services::params::required;
use crate::services::tags;
use crate::xml::XmlNode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Service name.
pub const SERVICE: &str = "sqs";
/// XML namespace of responses.
pub const XML_NAMESPACE: &str = "http://queue.amazonaws.com/doc/2012-11-05/";
/// Error code for unknown queues.
pub const NON_EXISTENT_QUEUE: &str = "AWS.SimpleQueueService.NonExistentQueue";
/// Suffix marking FIFO queues.
const FIFO_SUFFIX: &str = ".fifo";
/// Maximum queue name length.
const MAX_QUEUE_NAME_LENGTH: usize = 80;
/// Attributes present on every queue, with defaults.
const DEFAULT_ATTRIBUTES: &[(&str, &str)] = &[
    ("DelaySeconds", "0"),
    ("MaximumMessageSize", "262144"),
    ("MessageRetentionPeriod", "345600"),
    ("ReceiveMessageWaitTimeSeconds", "0"),
    ("VisibilityTimeout", "30"),
    ("SqsManagedSseEnabled", "true"),
];
/// Attributes present only on FIFO queues, with defaults.
const FIFO_ATTRIBUTES: &[(&str, &str)] = &[
    ("FifoQueue", "true"),
    ("ContentBasedDeduplication", "false"),
    ("DeduplicationScope", "queue"),
    ("FifoThroughputLimit", "perQueue"),
];
/// Settable attributes besides the defaults and FIFO set.
const OPTIONAL_ATTRIBUTES: &[&str] = &[
    "Policy",
    "RedrivePolicy",
    "RedriveAllowPolicy",
    "KmsMasterKeyId",
    "KmsDataKeyReusePeriodSeconds",
];
/// Read-only attributes computed at read time.
const COMPUTED_ATTRIBUTES: &[&str] = &[
    "ApproximateNumberOfMessages",
    "ApproximateNumberOfMessagesNotVisible",
    "ApproximateNumberOfMessagesDelayed",
    "CreatedTimestamp",
    "LastModifiedTimestamp",
    "QueueArn",
];
/// Declared operations.
const OPERATIONS: &[&str] = &[
    "CreateQueue",
    "GetQueueUrl",
    "GetQueueAttributes",
    "SetQueueAttributes",
    "DeleteQueue",
    "ListQueues",
    "TagQueue",
    "UntagQueue",
    "ListQueueTags",
];

// ============================================================================
// SECTION: Entity
// ============================================================================

/// Stored queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Queue {
    /// Queue name.
    pub name: String,
    /// Derived queue URL.
    pub url: String,
    /// Derived ARN.
    pub arn: String,
    /// Attribute name to value.
    pub attributes: BTreeMap<String, String>,
}

impl EntityKind for Queue {
    const SERVICE: &'static str = SERVICE;
    const RESOURCE_TYPE: &'static str = "queue";
    const POLICY: IdempotencyPolicy = IdempotencyPolicy::IdempotentReturn;

    fn normalize(&mut self, ctx: &NormalizeContext<'_>) {
        self.name = ctx.name.to_string();
        self.url = format!("{}/{}/{}", ctx.identity.endpoint, ctx.identity.account_id, ctx.name);
        self.arn = ctx.identity.arn(SERVICE, ctx.name);
        for (key, value) in DEFAULT_ATTRIBUTES {
            self.attributes.entry((*key).to_string()).or_insert_with(|| (*value).to_string());
        }
        let fifo = ctx.name.ends_with(FIFO_SUFFIX);
        for (key, value) in FIFO_ATTRIBUTES {
            if fifo {
                self.attributes.entry((*key).to_string()).or_insert_with(|| (*value).to_string());
            } else {
                self.attributes.remove(*key);
            }
        }
        if fifo {
            self.attributes.insert("FifoQueue".to_string(), "true".to_string());
        }
        self.attributes.insert("QueueArn".to_string(), self.arn.clone());
    }
}

// ============================================================================
// SECTION: Definition
// ============================================================================

/// Returns the queue service definition.
#[must_use]
pub fn definition() -> ServiceDefinition {
    ServiceDefinition {
        name: SERVICE,
        target_prefix: None,
        data_content_type: "application/x-amz-json-1.0",
        xml_namespace: XML_NAMESPACE,
        markup_style: MarkupStyle::Wrapped,
        operations: OPERATIONS,
        bindings: vec![
            Binding::action("CreateQueue", create_queue),
            Binding::action("GetQueueUrl", get_queue_url),
            Binding::action("GetQueueAttributes", get_queue_attributes),
            Binding::action("SetQueueAttributes", set_queue_attributes),
            Binding::action("DeleteQueue", delete_queue),
            Binding::action("ListQueues", list_queues),
            Binding::action("TagQueue", tag_queue),
            Binding::action("UntagQueue", untag_queue),
            Binding::action("ListQueueTags", list_queue_tags),
        ],
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Creates a queue, or returns the existing one.
fn create_queue(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let name = required(params, "QueueName")?;
    validate_queue_name(name)?;
    let attributes = indexed_pairs(params, "Attribute", "Name", "Value");
    validate_attributes(&attributes)?;
    if attributes.get("FifoQueue").is_some_and(|value| value == "true")
        && !name.ends_with(FIFO_SUFFIX)
    {
        return Err(invalid_parameter("The name of a FIFO queue can only include alphanumeric \
                                      characters, hyphens, or underscores, must end with .fifo \
                                      suffix and be 1 to 80 in length."));
    }
    let outcome = ctx.entities.create(name, Queue {
        attributes,
        ..Queue::default()
    })?;
    let created = outcome.is_created();
    let entity = outcome.into_entity();
    if created {
        let tags = indexed_pairs(params, "Tag", "Key", "Value");
        if let Err(err) = tags::tag(&ctx.entities, &entity.attributes.arn, tags) {
            tags::discard::<Queue>(&ctx.entities, name, &entity.attributes.arn);
            return Err(err);
        }
    }
    Ok(OperationOutput::markup(vec![XmlNode::text("QueueUrl", &entity.attributes.url)]))
}

/// Resolves a queue name to its URL.
fn get_queue_url(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let name = required(params, "QueueName")?;
    let entity = load(ctx, name)?;
    Ok(OperationOutput::markup(vec![XmlNode::text("QueueUrl", &entity.attributes.url)]))
}

/// Returns requested attributes; `All` selects every attribute.
fn get_queue_attributes(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let entity = load(ctx, &queue_name(params)?)?;
    let requested = indexed_values(params, "AttributeName");
    let all = rendered_attributes(&entity);
    let selected: Vec<(String, String)> = if requested.iter().any(|name| name == "All") {
        all.into_iter().collect()
    } else {
        let mut selected = Vec::with_capacity(requested.len());
        for name in requested {
            if !is_known_attribute(&name) {
                return Err(invalid_attribute_name(&name));
            }
            if let Some(value) = all.get(&name) {
                selected.push((name, value.clone()));
            }
        }
        selected
    };
    Ok(OperationOutput::markup(
        selected
            .into_iter()
            .map(|(name, value)| {
                XmlNode::parent("Attribute", vec![
                    XmlNode::text("Name", name),
                    XmlNode::text("Value", value),
                ])
            })
            .collect(),
    ))
}

/// Overwrites settable attributes.
fn set_queue_attributes(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let mut entity = load(ctx, &queue_name(params)?)?;
    let attributes = indexed_pairs(params, "Attribute", "Name", "Value");
    validate_attributes(&attributes)?;
    if attributes.contains_key("FifoQueue") {
        return Err(invalid_attribute_name("FifoQueue"));
    }
    entity.attributes.attributes.extend(attributes);
    ctx.entities.save(&mut entity).map_err(queue_error)?;
    Ok(OperationOutput::markup(Vec::new()))
}

/// Deletes a queue and its tags.
fn delete_queue(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let name = queue_name(params)?;
    let entity = load(ctx, &name)?;
    ctx.entities.delete::<Queue>(&name).map_err(queue_error)?;
    tags::clear(&ctx.entities, &entity.attributes.arn)?;
    Ok(OperationOutput::markup(Vec::new()))
}

/// Lists queue URLs, optionally filtered by name prefix.
fn list_queues(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let prefix = params.get("QueueNamePrefix").map(String::as_str).unwrap_or_default();
    let urls: Vec<XmlNode> = ctx
        .entities
        .list::<Queue>()?
        .into_iter()
        .filter(|entity| entity.name.starts_with(prefix))
        .map(|entity| XmlNode::text("QueueUrl", entity.attributes.url))
        .collect();
    Ok(OperationOutput::markup(urls))
}

/// Adds tags to a queue.
fn tag_queue(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let entity = load(ctx, &queue_name(params)?)?;
    let tags = indexed_pairs(params, "Tag", "Key", "Value");
    tags::tag(&ctx.entities, &entity.attributes.arn, tags)?;
    Ok(OperationOutput::markup(Vec::new()))
}

/// Removes tags from a queue.
fn untag_queue(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let entity = load(ctx, &queue_name(params)?)?;
    tags::untag(&ctx.entities, &entity.attributes.arn, &indexed_values(params, "TagKey"))?;
    Ok(OperationOutput::markup(Vec::new()))
}

/// Lists tags on a queue.
fn list_queue_tags(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let entity = load(ctx, &queue_name(params)?)?;
    let tags = tags::tags_of(&ctx.entities, &entity.attributes.arn)?;
    Ok(OperationOutput::markup(
        tags.into_iter()
            .map(|(key, value)| {
                XmlNode::parent("Tag", vec![
                    XmlNode::text("Key", key),
                    XmlNode::text("Value", value),
                ])
            })
            .collect(),
    ))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads a queue, mapping absence to the non-existent-queue error.
fn load(ctx: &OperationContext<'_>, name: &str) -> Result<Entity<Queue>, ApiError> {
    ctx.entities.get::<Queue>(name).map_err(queue_error)
}

/// Maps store errors with queue wording.
fn queue_error(err: StoreError) -> ApiError {
    if err.is_not_found() {
        return ApiError::not_found(
            NON_EXISTENT_QUEUE,
            "The specified queue does not exist for this wsdl version.",
        );
    }
    ApiError::from_store(err, NON_EXISTENT_QUEUE, "QueueAlreadyExists")
}

/// Extracts the queue name from `QueueUrl` (its last path segment).
fn queue_name(params: &FormParams) -> Result<String, ApiError> {
    let url = required(params, "QueueUrl")?;
    let name = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    Ok(name.to_string())
}

/// Returns stored attributes plus the read-time computed ones.
fn rendered_attributes(entity: &Entity<Queue>) -> BTreeMap<String, String> {
    let mut attributes = entity.attributes.attributes.clone();
    let created = (entity.created_at.as_unix_millis() / 1_000).to_string();
    for name in &COMPUTED_ATTRIBUTES[.. 3] {
        attributes.insert((*name).to_string(), "0".to_string());
    }
    attributes.insert("CreatedTimestamp".to_string(), created.clone());
    attributes.insert("LastModifiedTimestamp".to_string(), created);
    attributes
}

/// Returns true for attribute names this service understands.
fn is_known_attribute(name: &str) -> bool {
    DEFAULT_ATTRIBUTES.iter().any(|(key, _)| *key == name)
        || FIFO_ATTRIBUTES.iter().any(|(key, _)| *key == name)
        || OPTIONAL_ATTRIBUTES.contains(&name)
        || COMPUTED_ATTRIBUTES.contains(&name)
}

/// Rejects unknown or read-only attribute names.
fn validate_attributes(attributes: &BTreeMap<String, String>) -> Result<(), ApiError> {
    for name in attributes.keys() {
        if !is_known_attribute(name) || COMPUTED_ATTRIBUTES.contains(&name.as_str()) {
            return Err(invalid_attribute_name(name));
        }
    }
    Ok(())
}

/// Validates queue name characters and length.
fn validate_queue_name(name: &str) -> Result<(), ApiError> {
    let stem = name.strip_suffix(FIFO_SUFFIX).unwrap_or(name);
    let valid = !stem.is_empty()
        && name.len() <= MAX_QUEUE_NAME_LENGTH
        && stem.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(invalid_parameter(
            "Can only include alphanumeric characters, hyphens, or underscores. 1 to 80 in length",
        ))
    }
}

/// Builds an `InvalidAttributeName` error.
fn invalid_attribute_name(name: &str) -> ApiError {
    ApiError::new(
        ErrorKind::Validation,
        "InvalidAttributeName",
        format!("Unknown Attribute {name}."),
    )
}

/// Builds an `InvalidParameterValue` error.
fn invalid_parameter(message: &str) -> ApiError {
    ApiError::new(ErrorKind::Validation, "InvalidParameterValue", message)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use stratus_core::NamespaceId;
    use stratus_core::ProviderIdentity;

    use super::*;

    fn normalized(name: &str, mut queue: Queue) -> Queue {
        let identity = ProviderIdentity::default();
        let namespace = NamespaceId::new("default");
        queue.normalize(&NormalizeContext {
            name,
            namespace: &namespace,
            identity: &identity,
        });
        queue
    }

    #[test]
    fn standard_queues_drop_fifo_attributes() {
        let mut attributes = BTreeMap::new();
        attributes.insert("ContentBasedDeduplication".to_string(), "true".to_string());
        let queue = normalized("jobs", Queue {
            attributes,
            ..Queue::default()
        });
        assert!(!queue.attributes.contains_key("ContentBasedDeduplication"));
        assert!(!queue.attributes.contains_key("FifoQueue"));
        assert_eq!(queue.attributes.get("VisibilityTimeout").map(String::as_str), Some("30"));
        assert_eq!(queue.url, "http://localhost:4566/000000000000/jobs");
        assert_eq!(
            queue.attributes.get("QueueArn").map(String::as_str),
            Some("arn:aws:sqs:us-east-1:000000000000:jobs")
        );
    }

    #[test]
    fn fifo_queues_carry_fifo_defaults() {
        let queue = normalized("jobs.fifo", Queue::default());
        assert_eq!(queue.attributes.get("FifoQueue").map(String::as_str), Some("true"));
        assert_eq!(queue.attributes.get("DeduplicationScope").map(String::as_str), Some("queue"));
        assert_eq!(normalized("jobs.fifo", queue.clone()), queue);
    }

    #[test]
    fn queue_names_are_validated() {
        assert!(validate_queue_name("orders-1_a").is_ok());
        assert!(validate_queue_name("orders.fifo").is_ok());
        assert!(validate_queue_name(".fifo").is_err());
        assert!(validate_queue_name("has space").is_err());
        assert!(validate_queue_name(&"q".repeat(81)).is_err());
    }

    #[test]
    fn unknown_attributes_are_rejected() {
        let mut attributes = BTreeMap::new();
        attributes.insert("Colour".to_string(), "blue".to_string());
        let err = validate_attributes(&attributes).unwrap_err();
        assert_eq!(err.code(), "InvalidAttributeName");
    }
}
