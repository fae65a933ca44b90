// crates/stratus-gateway/src/services/table.rs
// ============================================================================
// Module: Table Service
// Description: Key-value table control plane over the target-header convention.
// Purpose: Exercise billing-mode exclusive throughput and strict-conflict create.
// Dependencies: serde, serde_json, stratus-core
// ============================================================================

//! ## Overview
//! Tables are strict-conflict entities: a second `CreateTable` fails with
//! `ResourceInUseException`. The normalizer owns the billing-mode contract:
//! under `PROVISIONED` the table and every global secondary index carry
//! `ProvisionedThroughput` (default 5/5); under `PAY_PER_REQUEST` the block is
//! absent everywhere. Key schema and attribute definitions are never empty,
//! and the ARN and table id are recomputed from the name on every pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use stratus_core::Entity;
use stratus_core::EntityKind;
use stratus_core::IdempotencyPolicy;
use stratus_core::NormalizeContext;
use stratus_core::deterministic_token;

use crate::error::ApiError;
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
pub const SERVICE: &str = "dynamodb";
/// Target header prefix.
pub const TARGET_PREFIX: &str = "DynamoDB_20120810";
/// Billing mode with explicit capacity.
pub const PROVISIONED: &str = "PROVISIONED";
/// Billing mode without capacity.
pub const PAY_PER_REQUEST: &str = "PAY_PER_REQUEST";
/// Default read and write capacity under `PROVISIONED`.
pub const DEFAULT_CAPACITY_UNITS: u64 = 5;
/// Default page size for `ListTables`.
const DEFAULT_LIST_LIMIT: usize = 100;
/// Declared operations.
const OPERATIONS: &[&str] = &[
    "CreateTable",
    "DescribeTable",
    "UpdateTable",
    "DeleteTable",
    "ListTables",
    "TagResource",
    "UntagResource",
    "ListTagsOfResource",
];

// ============================================================================
// SECTION: Entity
// ============================================================================

/// Key attribute type declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AttributeDefinition {
    /// Attribute name.
    pub attribute_name: String,
    /// `S`, `N`, or `B`.
    pub attribute_type: String,
}

/// Key schema element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct KeySchemaElement {
    /// Attribute name.
    pub attribute_name: String,
    /// `HASH` or `RANGE`.
    pub key_type: String,
}

/// Provisioned capacity block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProvisionedThroughput {
    /// Read capacity units.
    pub read_capacity_units: u64,
    /// Write capacity units.
    pub write_capacity_units: u64,
    /// Decreases applied today.
    pub number_of_decreases_today: u64,
}

impl ProvisionedThroughput {
    /// Default provisioned capacity.
    const fn defaults() -> Self {
        Self {
            read_capacity_units: DEFAULT_CAPACITY_UNITS,
            write_capacity_units: DEFAULT_CAPACITY_UNITS,
            number_of_decreases_today: 0,
        }
    }
}

/// Index projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Projection {
    /// `ALL`, `KEYS_ONLY`, or `INCLUDE`.
    pub projection_type: String,
    /// Projected non-key attributes for `INCLUDE`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub non_key_attributes: Vec<String>,
}

/// Global secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GlobalSecondaryIndex {
    /// Index name.
    pub index_name: String,
    /// Index key schema.
    pub key_schema: Vec<KeySchemaElement>,
    /// Projection.
    pub projection: Projection,
    /// Capacity; present iff the table is `PROVISIONED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    /// Index status.
    pub index_status: String,
    /// Derived index ARN.
    pub index_arn: String,
}

/// Billing mode wrapper as rendered in descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BillingModeSummary {
    /// Billing mode.
    pub billing_mode: String,
}

/// Stored table description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Table {
    /// Table name.
    pub table_name: String,
    /// Derived ARN.
    pub table_arn: String,
    /// Derived stable table id.
    pub table_id: String,
    /// Lifecycle status.
    pub table_status: String,
    /// Key attribute types.
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Primary key schema.
    pub key_schema: Vec<KeySchemaElement>,
    /// Billing mode.
    pub billing_mode_summary: BillingModeSummary,
    /// Capacity; present iff `PROVISIONED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    /// Global secondary indexes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
}

impl Table {
    /// Returns true when the table is billed per request.
    fn on_demand(&self) -> bool {
        self.billing_mode_summary.billing_mode == PAY_PER_REQUEST
    }
}

impl EntityKind for Table {
    const SERVICE: &'static str = SERVICE;
    const RESOURCE_TYPE: &'static str = "table";
    const POLICY: IdempotencyPolicy = IdempotencyPolicy::StrictConflict;

    fn normalize(&mut self, ctx: &NormalizeContext<'_>) {
        self.table_name = ctx.name.to_string();
        self.table_arn = ctx.identity.arn(SERVICE, &format!("table/{}", ctx.name));
        self.table_id = uuid_from(&deterministic_token(&self.table_arn, 32));
        if self.table_status.is_empty() {
            self.table_status = "ACTIVE".to_string();
        }
        if self.billing_mode_summary.billing_mode != PAY_PER_REQUEST {
            self.billing_mode_summary.billing_mode = PROVISIONED.to_string();
        }
        if self.key_schema.is_empty() {
            self.key_schema.push(KeySchemaElement {
                attribute_name: "id".to_string(),
                key_type: "HASH".to_string(),
            });
        }
        let on_demand = self.on_demand();
        if on_demand {
            self.provisioned_throughput = None;
        } else if self.provisioned_throughput.is_none() {
            self.provisioned_throughput = Some(ProvisionedThroughput::defaults());
        }
        for index in &mut self.global_secondary_indexes {
            if on_demand {
                index.provisioned_throughput = None;
            } else if index.provisioned_throughput.is_none() {
                index.provisioned_throughput = Some(ProvisionedThroughput::defaults());
            }
            if index.projection.projection_type.is_empty() {
                index.projection.projection_type = "ALL".to_string();
            }
            if index.index_status.is_empty() {
                index.index_status = "ACTIVE".to_string();
            }
            index.index_arn = format!("{}/index/{}", self.table_arn, index.index_name);
        }
        let key_names: Vec<String> = self
            .key_schema
            .iter()
            .chain(self.global_secondary_indexes.iter().flat_map(|index| index.key_schema.iter()))
            .map(|element| element.attribute_name.clone())
            .collect();
        for name in key_names {
            if !self.attribute_definitions.iter().any(|def| def.attribute_name == name) {
                self.attribute_definitions.push(AttributeDefinition {
                    attribute_name: name,
                    attribute_type: "S".to_string(),
                });
            }
        }
    }
}

/// Formats 32 hex characters in the 8-4-4-4-12 layout.
fn uuid_from(hex: &str) -> String {
    let part = |from: usize, to: usize| hex.get(from .. to).unwrap_or_default();
    format!("{}-{}-{}-{}-{}", part(0, 8), part(8, 12), part(12, 16), part(16, 20), part(20, 32))
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

/// `CreateTable` input.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct CreateTableRequest {
    /// Table name.
    table_name: Option<String>,
    /// Attribute definitions.
    attribute_definitions: Vec<AttributeDefinition>,
    /// Key schema.
    key_schema: Vec<KeySchemaElement>,
    /// Billing mode.
    billing_mode: Option<String>,
    /// Capacity.
    provisioned_throughput: Option<ProvisionedThroughput>,
    /// Indexes.
    global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    /// Tags.
    tags: Vec<WireTag>,
}

/// `UpdateTable` input.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct UpdateTableRequest {
    /// Table name.
    table_name: Option<String>,
    /// New billing mode.
    billing_mode: Option<String>,
    /// New capacity.
    provisioned_throughput: Option<ProvisionedThroughput>,
    /// New attribute definitions.
    attribute_definitions: Vec<AttributeDefinition>,
}

/// Input naming one table.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct TableNameRequest {
    /// Table name.
    table_name: Option<String>,
}

/// `ListTables` input.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ListTablesRequest {
    /// Exclusive start name.
    exclusive_start_table_name: Option<String>,
    /// Page size.
    limit: Option<usize>,
}

/// Tagging input.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct TagRequest {
    /// Table ARN.
    resource_arn: Option<String>,
    /// Tags to add.
    tags: Vec<WireTag>,
    /// Keys to remove.
    tag_keys: Vec<String>,
}

// ============================================================================
// SECTION: Definition
// ============================================================================

/// Returns the table service definition.
#[must_use]
pub fn definition() -> ServiceDefinition {
    ServiceDefinition {
        name: SERVICE,
        target_prefix: Some(TARGET_PREFIX),
        data_content_type: "application/x-amz-json-1.0",
        xml_namespace: "",
        markup_style: MarkupStyle::Wrapped,
        operations: OPERATIONS,
        bindings: vec![
            Binding::target("CreateTable", create_table),
            Binding::target("DescribeTable", describe_table),
            Binding::target("UpdateTable", update_table),
            Binding::target("DeleteTable", delete_table),
            Binding::target("ListTables", list_tables),
            Binding::target("TagResource", tag_resource),
            Binding::target("UntagResource", untag_resource),
            Binding::target("ListTagsOfResource", list_tags_of_resource),
        ],
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Creates a table.
fn create_table(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: CreateTableRequest = decode_json(input)?;
    let name = require_field(request.table_name, "TableName")?;
    validate_table_name(&name)?;
    let billing_mode = validate_billing_mode(request.billing_mode.as_deref())?;
    if billing_mode == PAY_PER_REQUEST && request.provisioned_throughput.is_some() {
        return Err(ApiError::validation(
            "One or more parameter values were invalid: Neither ReadCapacityUnits nor \
             WriteCapacityUnits can be specified when BillingMode is PAY_PER_REQUEST",
        ));
    }
    let table = Table {
        attribute_definitions: request.attribute_definitions,
        key_schema: request.key_schema,
        billing_mode_summary: BillingModeSummary {
            billing_mode: billing_mode.to_string(),
        },
        provisioned_throughput: request.provisioned_throughput,
        global_secondary_indexes: request.global_secondary_indexes,
        ..Table::default()
    };
    let entity = ctx
        .entities
        .create(&name, table)
        .map_err(|err| {
            ApiError::from_store(err, "ResourceNotFoundException", "ResourceInUseException")
        })?
        .into_entity();
    let tags: BTreeMap<String, String> =
        request.tags.into_iter().map(|tag| (tag.key, tag.value)).collect();
    let arn = &entity.attributes.table_arn;
    if let Err(err) = tags::tag(&ctx.entities, arn, tags) {
        tags::discard::<Table>(&ctx.entities, &name, arn);
        return Err(err);
    }
    Ok(OperationOutput::data(json!({ "TableDescription": describe(&entity)? })))
}

/// Describes a table.
fn describe_table(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: TableNameRequest = decode_json(input)?;
    let name = require_field(request.table_name, "TableName")?;
    let entity = load(ctx, &name)?;
    Ok(OperationOutput::data(json!({ "Table": describe(&entity)? })))
}

/// Switches billing mode or adjusts capacity.
fn update_table(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: UpdateTableRequest = decode_json(input)?;
    let name = require_field(request.table_name, "TableName")?;
    let mut entity = load(ctx, &name)?;
    let billing_mode = match request.billing_mode.as_deref() {
        Some(mode) => validate_billing_mode(Some(mode))?,
        None if entity.attributes.on_demand() => PAY_PER_REQUEST,
        None => PROVISIONED,
    };
    if billing_mode == PAY_PER_REQUEST && request.provisioned_throughput.is_some() {
        return Err(ApiError::validation(
            "One or more parameter values were invalid: ProvisionedThroughput cannot be \
             specified when BillingMode is PAY_PER_REQUEST",
        ));
    }
    billing_mode.clone_into(&mut entity.attributes.billing_mode_summary.billing_mode);
    if let Some(throughput) = request.provisioned_throughput {
        entity.attributes.provisioned_throughput = Some(throughput);
    }
    for definition in request.attribute_definitions {
        let table = &mut entity.attributes;
        table.attribute_definitions.retain(|def| def.attribute_name != definition.attribute_name);
        table.attribute_definitions.push(definition);
    }
    ctx.entities.save(&mut entity)?;
    Ok(OperationOutput::data(json!({ "TableDescription": describe(&entity)? })))
}

/// Deletes a table and its tags.
fn delete_table(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: TableNameRequest = decode_json(input)?;
    let name = require_field(request.table_name, "TableName")?;
    let mut entity = load(ctx, &name)?;
    ctx.entities.delete::<Table>(&name).map_err(|err| table_error(err, &name))?;
    tags::clear(&ctx.entities, &entity.attributes.table_arn)?;
    "DELETING".clone_into(&mut entity.attributes.table_status);
    Ok(OperationOutput::data(json!({ "TableDescription": describe(&entity)? })))
}

/// Lists table names in name order with optional paging.
fn list_tables(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: ListTablesRequest = decode_json(input)?;
    let limit = request.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, DEFAULT_LIST_LIMIT);
    let names: Vec<String> = ctx
        .entities
        .list::<Table>()?
        .into_iter()
        .map(|entity| entity.name)
        .filter(|name| {
            request.exclusive_start_table_name.as_ref().is_none_or(|start| name > start)
        })
        .collect();
    let page: Vec<String> = names.iter().take(limit).cloned().collect();
    let mut output = json!({ "TableNames": page });
    if names.len() > limit
        && let Some(last) = page.last()
    {
        output["LastEvaluatedTableName"] = Value::String(last.clone());
    }
    Ok(OperationOutput::data(output))
}

/// Adds tags to a table.
fn tag_resource(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: TagRequest = decode_json(input)?;
    let arn = tagged_table(ctx, request.resource_arn)?;
    let tags: BTreeMap<String, String> =
        request.tags.into_iter().map(|tag| (tag.key, tag.value)).collect();
    tags::tag(&ctx.entities, &arn, tags)?;
    Ok(OperationOutput::data(json!({})))
}

/// Removes tags from a table.
fn untag_resource(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: TagRequest = decode_json(input)?;
    let arn = tagged_table(ctx, request.resource_arn)?;
    tags::untag(&ctx.entities, &arn, &request.tag_keys)?;
    Ok(OperationOutput::data(json!({})))
}

/// Lists tags on a table.
fn list_tags_of_resource(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: TagRequest = decode_json(input)?;
    let arn = tagged_table(ctx, request.resource_arn)?;
    let tags: Vec<WireTag> = tags::tags_of(&ctx.entities, &arn)?
        .into_iter()
        .map(|(key, value)| WireTag {
            key,
            value,
        })
        .collect();
    Ok(OperationOutput::data(json!({ "Tags": tags })))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads a table, mapping absence to `ResourceNotFoundException`.
fn load(ctx: &OperationContext<'_>, name: &str) -> Result<Entity<Table>, ApiError> {
    ctx.entities.get::<Table>(name).map_err(|err| table_error(err, name))
}

/// Maps store errors with table wording.
fn table_error(err: stratus_core::StoreError, name: &str) -> ApiError {
    if err.is_not_found() {
        return ApiError::not_found(
            "ResourceNotFoundException",
            format!("Requested resource not found: Table: {name} not found"),
        );
    }
    ApiError::from_store(err, "ResourceNotFoundException", "ResourceInUseException")
}

/// Renders a table description.
fn describe(entity: &Entity<Table>) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(&entity.attributes)
        .map_err(|err| ApiError::internal(err.to_string()))?;
    if let Some(object) = value.as_object_mut() {
        object.insert("CreationDateTime".to_string(), json!(entity.created_at.as_epoch_seconds()));
        object.insert("ItemCount".to_string(), json!(0));
        object.insert("TableSizeBytes".to_string(), json!(0));
    }
    Ok(value)
}

/// Resolves a tagging ARN to an existing table's ARN.
fn tagged_table(ctx: &OperationContext<'_>, arn: Option<String>) -> Result<String, ApiError> {
    let arn = require_field(arn, "ResourceArn")?;
    let name = arn.rsplit_once(":table/").map(|(_, name)| name).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::validation(format!("Invalid TableArn: {arn}")));
    }
    match ctx.entities.get::<Table>(name) {
        Ok(entity) => Ok(entity.attributes.table_arn),
        Err(err) if err.is_not_found() => Err(ApiError::not_found(
            "ResourceNotFoundException",
            format!("Requested resource not found: ResourcArn: {arn} not found"),
        )),
        Err(err) => Err(err.into()),
    }
}

/// Validates a table name: 3 to 255 of `[A-Za-z0-9_.-]`.
fn validate_table_name(name: &str) -> Result<(), ApiError> {
    let valid_chars =
        name.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
    if (3 ..= 255).contains(&name.len()) && valid_chars {
        Ok(())
    } else {
        Err(ApiError::validation(format!(
            "1 validation error detected: Value '{name}' at 'tableName' failed to satisfy \
             constraint"
        )))
    }
}

/// Validates a billing mode, defaulting to `PROVISIONED`.
fn validate_billing_mode(mode: Option<&str>) -> Result<&'static str, ApiError> {
    match mode {
        None | Some(PROVISIONED) => Ok(PROVISIONED),
        Some(PAY_PER_REQUEST) => Ok(PAY_PER_REQUEST),
        Some(other) => Err(ApiError::validation(format!(
            "1 validation error detected: Value '{other}' at 'billingMode' failed to satisfy \
             constraint: Member must satisfy enum value set: [PROVISIONED, PAY_PER_REQUEST]"
        ))),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use stratus_core::NamespaceId;
    use stratus_core::ProviderIdentity;

    use super::*;

    fn normalized(mut table: Table) -> Table {
        let identity = ProviderIdentity::default();
        let namespace = NamespaceId::new("default");
        table.normalize(&NormalizeContext {
            name: "orders",
            namespace: &namespace,
            identity: &identity,
        });
        table
    }

    #[test]
    fn provisioned_tables_get_default_capacity_everywhere() {
        let table = normalized(Table {
            global_secondary_indexes: vec![GlobalSecondaryIndex {
                index_name: "by-owner".to_string(),
                ..GlobalSecondaryIndex::default()
            }],
            ..Table::default()
        });
        assert_eq!(table.billing_mode_summary.billing_mode, PROVISIONED);
        assert_eq!(table.provisioned_throughput, Some(ProvisionedThroughput::defaults()));
        let index = &table.global_secondary_indexes[0];
        assert_eq!(index.provisioned_throughput, Some(ProvisionedThroughput::defaults()));
        assert_eq!(index.index_arn, format!("{}/index/by-owner", table.table_arn));
    }

    #[test]
    fn on_demand_tables_have_no_capacity() {
        let table = normalized(Table {
            billing_mode_summary: BillingModeSummary {
                billing_mode: PAY_PER_REQUEST.to_string(),
            },
            provisioned_throughput: Some(ProvisionedThroughput::defaults()),
            global_secondary_indexes: vec![GlobalSecondaryIndex::default()],
            ..Table::default()
        });
        assert!(table.provisioned_throughput.is_none());
        assert!(table.global_secondary_indexes[0].provisioned_throughput.is_none());
        let rendered = serde_json::to_value(&table).unwrap_or_default();
        assert!(rendered.get("ProvisionedThroughput").is_none());
    }

    #[test]
    fn key_schema_and_definitions_are_never_empty() {
        let table = normalized(Table::default());
        assert_eq!(table.key_schema.len(), 1);
        assert_eq!(table.attribute_definitions[0].attribute_name, "id");
        assert_eq!(table.table_arn, "arn:aws:dynamodb:us-east-1:000000000000:table/orders");
        assert_eq!(table.table_id.len(), 36);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalized(Table::default());
        let twice = normalized(once.clone());
        assert_eq!(once, twice);
    }
}
