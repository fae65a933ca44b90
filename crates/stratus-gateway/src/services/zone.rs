// crates/stratus-gateway/src/services/zone.rs
// ============================================================================
// Module: Zone Service
// Description: Hosted DNS zones over the REST-path convention.
// Purpose: Exercise path routing, XML request bodies, and mode-exclusive
//          zone shapes.
// Dependencies: axum, serde, stratus-core
// ============================================================================

//! ## Overview
//! Hosted zones are idempotent-return entities whose id is derived from the
//! zone name and caller reference, so replaying a create returns the stored
//! zone. Every zone carries apex SOA and NS record sets built from
//! deterministic name servers. Public zones expose a delegation set and no
//! VPCs; private zones carry at least one VPC and no delegation set.
//!
//! Record changes are applied all-or-nothing: any failing change rejects
//! the whole batch with `InvalidChangeBatch`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::Method;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
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
use crate::protocol::RestInput;
use crate::registry::Binding;
use crate::registry::MarkupStyle;
use crate::registry::OperationContext;
use crate::registry::ServiceDefinition;
use crate::services::params::rest;
use crate::xml::XmlNode;
use crate::xml::parse_document;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Service name.
pub const SERVICE: &str = "route53";
/// XML namespace of responses.
pub const XML_NAMESPACE: &str = "https://route53.amazonaws.com/doc/2013-04-01/";
/// Unknown zone error code.
const NO_SUCH_ZONE: &str = "NoSuchHostedZone";
/// Length of the derived part of zone ids.
const ZONE_ID_LENGTH: usize = 14;
/// Default page size for list calls.
const DEFAULT_MAX_ITEMS: usize = 100;
/// SOA timing fields: serial, refresh, retry, expire, minimum.
const SOA_TIMINGS: &str = "1 7200 900 1209600 86400";
/// Name-server top-level domains, one per server.
const NAME_SERVER_DOMAINS: [&str; 4] = ["com", "net", "org", "co.uk"];
/// Declared operations.
const OPERATIONS: &[&str] = &[
    "CreateHostedZone",
    "ListHostedZones",
    "GetHostedZone",
    "DeleteHostedZone",
    "ListResourceRecordSets",
    "ChangeResourceRecordSets",
];

// ============================================================================
// SECTION: Entity
// ============================================================================

/// VPC associated with a private zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ZoneVpc {
    /// VPC id.
    pub vpc_id: String,
    /// VPC region.
    pub vpc_region: String,
}

/// Name servers delegated to a public zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DelegationSet {
    /// Delegation set id.
    pub id: String,
    /// Name servers.
    pub name_servers: Vec<String>,
}

/// Resource record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RecordSet {
    /// Fully qualified name with trailing dot.
    pub name: String,
    /// Record type.
    #[serde(rename = "Type")]
    pub record_type: String,
    /// Time to live in seconds.
    #[serde(rename = "TTL")]
    pub ttl: Option<u32>,
    /// Record values.
    pub records: Vec<String>,
}

impl RecordSet {
    /// Returns true when `self` and `other` address the same name and type.
    fn same_slot(&self, other: &Self) -> bool {
        self.name == other.name && self.record_type == other.record_type
    }
}

/// Stored hosted zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostedZone {
    /// Zone id.
    pub id: String,
    /// Zone name with trailing dot.
    pub name: String,
    /// Client idempotency reference.
    pub caller_reference: String,
    /// Free-form comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Private zone flag.
    pub private_zone: bool,
    /// Associated VPCs (private zones only).
    pub vpcs: Vec<ZoneVpc>,
    /// Delegation set (public zones only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_set: Option<DelegationSet>,
    /// Record sets, sorted by name then type.
    pub record_sets: Vec<RecordSet>,
    /// Id of the change that created the zone.
    pub change_id: String,
}

impl HostedZone {
    /// Returns true for the apex SOA and NS record sets.
    fn is_apex(&self, record: &RecordSet) -> bool {
        record.name == self.name && matches!(record.record_type.as_str(), "SOA" | "NS")
    }

    /// Ensures an apex record set of `record_type` exists.
    fn ensure_apex(&mut self, record_type: &str, ttl: u32, records: Vec<String>) {
        let present = self
            .record_sets
            .iter()
            .any(|record| record.name == self.name && record.record_type == record_type);
        if !present {
            self.record_sets.push(RecordSet {
                name: self.name.clone(),
                record_type: record_type.to_string(),
                ttl: Some(ttl),
                records,
            });
        }
    }
}

impl EntityKind for HostedZone {
    const SERVICE: &'static str = SERVICE;
    const RESOURCE_TYPE: &'static str = "hostedzone";
    const POLICY: IdempotencyPolicy = IdempotencyPolicy::IdempotentReturn;

    fn normalize(&mut self, ctx: &NormalizeContext<'_>) {
        self.id = ctx.name.to_string();
        self.name = fully_qualified(&self.name);
        for record in &mut self.record_sets {
            record.name = fully_qualified(&record.name);
        }
        let servers = name_servers(&self.id);
        if self.private_zone {
            self.delegation_set = None;
            if self.vpcs.is_empty() {
                self.vpcs.push(ZoneVpc {
                    vpc_id: format!("vpc-{}", deterministic_token(ctx.namespace.as_str(), 17)),
                    vpc_region: ctx.identity.region.clone(),
                });
            }
        } else {
            self.vpcs.clear();
            self.delegation_set = Some(DelegationSet {
                id: format!("N{}", derived_id(&self.id, "delegation")),
                name_servers: servers.clone(),
            });
        }
        if self.change_id.is_empty() {
            self.change_id = format!("C{}", derived_id(&self.id, "change"));
        }
        let primary = servers.first().cloned().unwrap_or_default();
        self.ensure_apex("SOA", 900, vec![format!(
            "{primary}. awsdns-hostmaster.amazon.com. {SOA_TIMINGS}"
        )]);
        self.ensure_apex(
            "NS",
            172_800,
            servers.iter().map(|server| format!("{server}.")).collect(),
        );
        self.record_sets
            .sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.record_type.cmp(&b.record_type)));
        self.record_sets.dedup_by(|a, b| a.same_slot(b));
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// `CreateHostedZone` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct CreateHostedZoneRequest {
    /// Zone name.
    name: Option<String>,
    /// Idempotency reference.
    caller_reference: Option<String>,
    /// Zone options.
    hosted_zone_config: Option<HostedZoneConfigXml>,
    /// VPC for private zones.
    #[serde(rename = "VPC")]
    vpc: Option<VpcXml>,
}

/// `HostedZoneConfig` element.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct HostedZoneConfigXml {
    /// Comment.
    comment: Option<String>,
    /// Private zone flag.
    private_zone: bool,
}

/// `VPC` element.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VpcXml {
    /// VPC id.
    #[serde(rename = "VPCId")]
    vpc_id: Option<String>,
    /// VPC region.
    #[serde(rename = "VPCRegion")]
    vpc_region: Option<String>,
}

/// `ChangeResourceRecordSets` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ChangeRecordSetsRequest {
    /// Batch of changes.
    change_batch: ChangeBatchXml,
}

/// `ChangeBatch` element.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ChangeBatchXml {
    /// Change list.
    changes: ChangesXml,
}

/// `Changes` element.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChangesXml {
    /// Individual changes.
    #[serde(rename = "Change")]
    items: Vec<ChangeXml>,
}

/// `Change` element.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ChangeXml {
    /// `CREATE`, `DELETE`, or `UPSERT`.
    action: String,
    /// Target record set.
    resource_record_set: RecordSetXml,
}

/// `ResourceRecordSet` element.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RecordSetXml {
    /// Record name.
    name: String,
    /// Record type.
    #[serde(rename = "Type")]
    record_type: String,
    /// Time to live.
    #[serde(rename = "TTL")]
    ttl: Option<u32>,
    /// Values.
    resource_records: RecordsXml,
}

/// `ResourceRecords` element.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecordsXml {
    /// Values.
    #[serde(rename = "ResourceRecord")]
    items: Vec<RecordValueXml>,
}

/// `ResourceRecord` element.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RecordValueXml {
    /// Value.
    value: String,
}

impl From<RecordSetXml> for RecordSet {
    fn from(xml: RecordSetXml) -> Self {
        Self {
            name: fully_qualified(&xml.name),
            record_type: xml.record_type.to_uppercase(),
            ttl: xml.ttl,
            records: xml.resource_records.items.into_iter().map(|record| record.value).collect(),
        }
    }
}

// ============================================================================
// SECTION: Definition
// ============================================================================

/// Returns the zone service definition.
#[must_use]
pub fn definition() -> ServiceDefinition {
    ServiceDefinition {
        name: SERVICE,
        target_prefix: None,
        data_content_type: "application/x-amz-json-1.0",
        xml_namespace: XML_NAMESPACE,
        markup_style: MarkupStyle::Bare,
        operations: OPERATIONS,
        bindings: vec![
            Binding::rest(
                "CreateHostedZone",
                Method::POST,
                "/2013-04-01/hostedzone",
                create_hosted_zone,
            ),
            Binding::rest(
                "ListHostedZones",
                Method::GET,
                "/2013-04-01/hostedzone",
                list_hosted_zones,
            ),
            Binding::rest(
                "GetHostedZone",
                Method::GET,
                "/2013-04-01/hostedzone/{Id}",
                get_hosted_zone,
            ),
            Binding::rest(
                "DeleteHostedZone",
                Method::DELETE,
                "/2013-04-01/hostedzone/{Id}",
                delete_hosted_zone,
            ),
            Binding::rest(
                "ListResourceRecordSets",
                Method::GET,
                "/2013-04-01/hostedzone/{Id}/rrset",
                list_record_sets,
            ),
            Binding::rest(
                "ChangeResourceRecordSets",
                Method::POST,
                "/2013-04-01/hostedzone/{Id}/rrset",
                change_record_sets,
            ),
        ],
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Creates a zone, or returns the zone created with the same reference.
fn create_hosted_zone(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let request: CreateHostedZoneRequest = parse_body(rest(input)?)?;
    let name = non_blank(request.name, "name")?;
    let caller_reference = non_blank(request.caller_reference, "callerReference")?;
    let config = request.hosted_zone_config.unwrap_or_default();
    let vpc = request.vpc.and_then(|vpc| {
        vpc.vpc_id.map(|vpc_id| ZoneVpc {
            vpc_id,
            vpc_region: vpc.vpc_region.unwrap_or_else(|| ctx.entities.identity().region.clone()),
        })
    });
    if config.private_zone && vpc.is_none() {
        return Err(invalid_input(
            "When you're creating a private hosted zone, you must specify a VPC.",
        ));
    }
    let name = fully_qualified(&name);
    let seed = format!("{name}#{caller_reference}");
    let id = format!("Z{}", deterministic_token(&seed, ZONE_ID_LENGTH).to_uppercase());
    let zone = HostedZone {
        name,
        caller_reference,
        comment: config.comment,
        private_zone: config.private_zone,
        vpcs: vpc.into_iter().collect(),
        change_id: format!("C{}", random_token(ZONE_ID_LENGTH).to_uppercase()),
        ..HostedZone::default()
    };
    let entity = ctx.entities.create(&id, zone).map_err(zone_error)?.into_entity();
    let creation = change_node(&entity.attributes.change_id, entity.created_at);
    let mut children = vec![zone_node(&entity), creation];
    children.extend(placement_nodes(&entity.attributes));
    Ok(OperationOutput::markup(children).with_status(StatusCode::CREATED))
}

/// Lists zones ordered by id.
fn list_hosted_zones(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let query = &rest(input)?.query;
    let max_items = page_size(query.get("maxitems"))?;
    let marker = query.get("marker");
    let zones = ctx.entities.list::<HostedZone>()?;
    let mut remaining = zones
        .iter()
        .skip_while(|entity| marker.is_some_and(|marker| entity.name < *marker))
        .peekable();
    let page: Vec<XmlNode> = remaining.by_ref().take(max_items).map(zone_node).collect();
    let next = remaining.peek().map(|entity| entity.name.clone());
    let mut children = vec![XmlNode::parent("HostedZones", page)];
    if let Some(marker) = marker {
        children.push(XmlNode::text("Marker", marker));
    }
    children.push(XmlNode::text("IsTruncated", next.is_some()));
    if let Some(next) = next {
        children.push(XmlNode::text("NextMarker", next));
    }
    children.push(XmlNode::text("MaxItems", max_items));
    Ok(OperationOutput::markup(children))
}

/// Returns one zone with its delegation set or VPCs.
fn get_hosted_zone(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let entity = load(ctx, rest(input)?)?;
    let mut children = vec![zone_node(&entity)];
    children.extend(placement_nodes(&entity.attributes));
    Ok(OperationOutput::markup(children))
}

/// Deletes a zone holding only its apex records.
fn delete_hosted_zone(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let entity = load(ctx, rest(input)?)?;
    let zone = &entity.attributes;
    if zone.record_sets.iter().any(|record| !zone.is_apex(record)) {
        return Err(ApiError::in_use(
            "HostedZoneNotEmpty",
            "The hosted zone contains resource records that are not SOA or NS records.",
        ));
    }
    ctx.entities.delete::<HostedZone>(&entity.name).map_err(zone_error)?;
    Ok(OperationOutput::markup(vec![change_info()]))
}

/// Lists the zone's record sets.
fn list_record_sets(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let input = rest(input)?;
    let max_items = page_size(input.query.get("maxitems"))?;
    let entity = load(ctx, input)?;
    let records = &entity.attributes.record_sets;
    let page: Vec<XmlNode> = records.iter().take(max_items).map(record_node).collect();
    let mut children = vec![
        XmlNode::parent("ResourceRecordSets", page),
        XmlNode::text("IsTruncated", records.len() > max_items),
    ];
    if let Some(next) = records.get(max_items) {
        children.push(XmlNode::text("NextRecordName", &next.name));
        children.push(XmlNode::text("NextRecordType", &next.record_type));
    }
    children.push(XmlNode::text("MaxItems", max_items));
    Ok(OperationOutput::markup(children))
}

/// Applies a change batch atomically.
fn change_record_sets(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let input = rest(input)?;
    let request: ChangeRecordSetsRequest = parse_body(input)?;
    let mut entity = load(ctx, input)?;
    let changes = request.change_batch.changes.items;
    if changes.is_empty() {
        return Err(invalid_input("ChangeBatch must contain at least one change."));
    }
    let mut failures = Vec::new();
    let mut zone = entity.attributes.clone();
    for change in changes {
        let action = change.action.to_uppercase();
        let record = RecordSet::from(change.resource_record_set);
        if let Err(message) = apply_change(&mut zone, &action, record) {
            failures.push(message);
        }
    }
    if !failures.is_empty() {
        return Err(ApiError::new(
            ErrorKind::Validation,
            "InvalidChangeBatch",
            failures.join("; "),
        ));
    }
    entity.attributes = zone;
    ctx.entities.save(&mut entity).map_err(zone_error)?;
    Ok(OperationOutput::markup(vec![change_info()]))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Applies one change to `zone`, returning the failure message on conflict.
fn apply_change(zone: &mut HostedZone, action: &str, record: RecordSet) -> Result<(), String> {
    let describe = || format!("[name='{}', type='{}']", record.name, record.record_type);
    if record.name != zone.name && !record.name.ends_with(&format!(".{}", zone.name)) {
        return Err(format!(
            "RRSet with DNS name {} is not permitted in zone {}",
            record.name, zone.name
        ));
    }
    let position = zone.record_sets.iter().position(|existing| existing.same_slot(&record));
    match (action, position) {
        ("CREATE", Some(_)) => Err(format!(
            "Tried to create resource record set {} but it already exists",
            describe()
        )),
        ("CREATE" | "UPSERT", None) => {
            zone.record_sets.push(record);
            Ok(())
        }
        ("UPSERT", Some(index)) => {
            zone.record_sets[index] = record;
            Ok(())
        }
        ("DELETE", Some(_)) if zone.is_apex(&record) => Err(format!(
            "A HostedZone must contain at least one NS record and one SOA record {}",
            describe()
        )),
        ("DELETE", Some(index)) if zone.record_sets[index] == record => {
            zone.record_sets.remove(index);
            Ok(())
        }
        ("DELETE", Some(_)) => Err(format!(
            "Tried to delete resource record set {} but the values provided do not match the \
             current values",
            describe()
        )),
        ("DELETE", None) => Err(format!(
            "Tried to delete resource record set {} but it was not found",
            describe()
        )),
        (other, _) => Err(format!("Invalid action {other} for {}", describe())),
    }
}

/// Loads the zone named by the `Id` path parameter.
fn load(ctx: &OperationContext<'_>, input: &RestInput) -> Result<Entity<HostedZone>, ApiError> {
    let raw = input.path_params.get("Id").map(String::as_str).unwrap_or_default();
    let id = raw.trim_start_matches("/hostedzone/");
    ctx.entities.get::<HostedZone>(id).map_err(zone_error)
}

/// Decodes an XML body, reporting failures as `InvalidInput`.
fn parse_body<T: serde::de::DeserializeOwned>(input: &RestInput) -> Result<T, ApiError> {
    parse_document(&input.body).map_err(|err| invalid_input(err.message()))
}

/// Parses the `maxitems` query parameter.
fn page_size(raw: Option<&String>) -> Result<usize, ApiError> {
    match raw {
        None => Ok(DEFAULT_MAX_ITEMS),
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(invalid_input(&format!("Invalid value for maxitems: {raw}"))),
        },
    }
}

/// Requires a non-blank request member.
fn non_blank(value: Option<String>, member: &str) -> Result<String, ApiError> {
    value.filter(|value| !value.trim().is_empty()).ok_or_else(|| {
        invalid_input(&format!(
            "1 validation error detected: Value null at '{member}' failed to satisfy constraint: \
             Member must not be null"
        ))
    })
}

/// Derives an uppercase id from the zone id and a purpose tag.
fn derived_id(zone_id: &str, purpose: &str) -> String {
    deterministic_token(&format!("{zone_id}#{purpose}"), ZONE_ID_LENGTH).to_uppercase()
}

/// Appends a trailing dot and lowercases.
fn fully_qualified(name: &str) -> String {
    let name = name.trim().to_lowercase();
    if name.ends_with('.') { name } else { format!("{name}.") }
}

/// Derives four name servers from the zone id.
fn name_servers(zone_id: &str) -> Vec<String> {
    NAME_SERVER_DOMAINS
        .iter()
        .enumerate()
        .map(|(index, domain)| {
            let token = deterministic_token(&format!("{zone_id}#ns{index}"), 4);
            let value = u16::from_str_radix(&token, 16).unwrap_or_default();
            format!("ns-{}.awsdns-{:02}.{domain}", value % 2048, value % 64)
        })
        .collect()
}

/// Maps store errors with zone wording.
fn zone_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(identifier) => {
            let id = identifier.rsplit('/').next().unwrap_or(&identifier).to_string();
            ApiError::not_found(NO_SUCH_ZONE, format!("No hosted zone found with ID: {id}"))
                .with_status(StatusCode::NOT_FOUND)
        }
        other => ApiError::from(other),
    }
}

/// `InvalidInput` error.
fn invalid_input(message: &str) -> ApiError {
    ApiError::new(ErrorKind::Validation, "InvalidInput", message)
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders `HostedZone`.
fn zone_node(entity: &Entity<HostedZone>) -> XmlNode {
    let zone = &entity.attributes;
    let mut config = Vec::new();
    if let Some(comment) = &zone.comment {
        config.push(XmlNode::text("Comment", comment));
    }
    config.push(XmlNode::text("PrivateZone", zone.private_zone));
    XmlNode::parent("HostedZone", vec![
        XmlNode::text("Id", format!("/hostedzone/{}", entity.name)),
        XmlNode::text("Name", &zone.name),
        XmlNode::text("CallerReference", &zone.caller_reference),
        XmlNode::parent("Config", config),
        XmlNode::text("ResourceRecordSetCount", zone.record_sets.len()),
    ])
}

/// Renders the delegation set of a public zone or the VPCs of a private one.
fn placement_nodes(zone: &HostedZone) -> Vec<XmlNode> {
    if let Some(delegation) = &zone.delegation_set {
        return vec![XmlNode::parent("DelegationSet", vec![
            XmlNode::text("Id", format!("/delegationset/{}", delegation.id)),
            XmlNode::list("NameServers", "NameServer", &delegation.name_servers),
        ])];
    }
    vec![XmlNode::parent(
        "VPCs",
        zone.vpcs
            .iter()
            .map(|vpc| {
                XmlNode::parent("VPC", vec![
                    XmlNode::text("VPCRegion", &vpc.vpc_region),
                    XmlNode::text("VPCId", &vpc.vpc_id),
                ])
            })
            .collect(),
    )]
}

/// Renders one `ResourceRecordSet`.
fn record_node(record: &RecordSet) -> XmlNode {
    let mut children = vec![
        XmlNode::text("Name", &record.name),
        XmlNode::text("Type", &record.record_type),
    ];
    if let Some(ttl) = record.ttl {
        children.push(XmlNode::text("TTL", ttl));
    }
    children.push(XmlNode::parent(
        "ResourceRecords",
        record
            .records
            .iter()
            .map(|value| XmlNode::parent("ResourceRecord", vec![XmlNode::text("Value", value)]))
            .collect(),
    ));
    XmlNode::parent("ResourceRecordSet", children)
}

/// Renders a synchronous `ChangeInfo` for a fresh change.
fn change_info() -> XmlNode {
    let id = format!("C{}", random_token(ZONE_ID_LENGTH).to_uppercase());
    change_node(&id, Timestamp::now())
}

/// Renders `ChangeInfo` for a recorded change.
fn change_node(id: &str, submitted_at: Timestamp) -> XmlNode {
    XmlNode::parent("ChangeInfo", vec![
        XmlNode::text("Id", format!("/change/{id}")),
        XmlNode::text("Status", "INSYNC"),
        XmlNode::text("SubmittedAt", submitted_at.to_rfc3339()),
    ])
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use stratus_core::NamespaceId;
    use stratus_core::ProviderIdentity;

    use super::*;

    fn normalized(mut zone: HostedZone) -> HostedZone {
        let identity = ProviderIdentity::default();
        let namespace = NamespaceId::new("default");
        zone.normalize(&NormalizeContext {
            name: "ZABC",
            namespace: &namespace,
            identity: &identity,
        });
        zone
    }

    fn record(name: &str, record_type: &str, value: &str) -> RecordSet {
        RecordSet {
            name: name.to_string(),
            record_type: record_type.to_string(),
            ttl: Some(300),
            records: vec![value.to_string()],
        }
    }

    #[test]
    fn public_zones_carry_apex_records_and_delegation() {
        let zone = normalized(HostedZone {
            name: "Example.com".to_string(),
            vpcs: vec![ZoneVpc::default()],
            ..HostedZone::default()
        });
        assert_eq!(zone.name, "example.com.");
        assert!(zone.vpcs.is_empty());
        let delegation = zone.delegation_set.clone().unwrap_or_default();
        assert_eq!(delegation.name_servers.len(), 4);
        assert!(delegation.id.starts_with('N'));
        let types: Vec<&str> = zone.record_sets.iter().map(|r| r.record_type.as_str()).collect();
        assert_eq!(types, vec!["NS", "SOA"]);
        assert_eq!(normalized(zone.clone()), zone);
    }

    #[test]
    fn creating_change_id_is_kept_across_normalization() {
        let stored = normalized(HostedZone {
            name: "example.com.".to_string(),
            change_id: "CSTORED".to_string(),
            ..HostedZone::default()
        });
        assert_eq!(stored.change_id, "CSTORED");
        let derived = normalized(HostedZone::default());
        assert!(derived.change_id.starts_with('C'));
        assert_eq!(normalized(derived.clone()).change_id, derived.change_id);
    }

    #[test]
    fn private_zones_carry_a_vpc_and_no_delegation() {
        let zone = normalized(HostedZone {
            name: "internal.".to_string(),
            private_zone: true,
            ..HostedZone::default()
        });
        assert!(zone.delegation_set.is_none());
        assert_eq!(zone.vpcs.len(), 1);
        assert_eq!(zone.vpcs[0].vpc_region, "us-east-1");
    }

    #[test]
    fn change_batches_enforce_slot_rules() {
        let mut zone = normalized(HostedZone {
            name: "example.com.".to_string(),
            ..HostedZone::default()
        });
        let www = record("www.example.com.", "A", "1.2.3.4");
        assert!(apply_change(&mut zone, "CREATE", www.clone()).is_ok());
        assert!(apply_change(&mut zone, "CREATE", www.clone()).is_err());
        let upsert = record("www.example.com.", "A", "5.6.7.8");
        assert!(apply_change(&mut zone, "UPSERT", upsert).is_ok());
        assert!(apply_change(&mut zone, "DELETE", www).is_err());
        let foreign = record("www.other.org.", "A", "1.1.1.1");
        assert!(apply_change(&mut zone, "CREATE", foreign).is_err());
        let apex_ns = zone.record_sets.iter().find(|r| r.record_type == "NS").cloned();
        assert!(apex_ns.is_some_and(|ns| apply_change(&mut zone, "DELETE", ns).is_err()));
    }

    #[test]
    fn change_batch_body_parses() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<ChangeResourceRecordSetsRequest xmlns="https://route53.amazonaws.com/doc/2013-04-01/">
  <ChangeBatch>
    <Changes>
      <Change>
        <Action>CREATE</Action>
        <ResourceRecordSet>
          <Name>www.example.com</Name>
          <Type>A</Type>
          <TTL>60</TTL>
          <ResourceRecords>
            <ResourceRecord><Value>10.0.0.1</Value></ResourceRecord>
            <ResourceRecord><Value>10.0.0.2</Value></ResourceRecord>
          </ResourceRecords>
        </ResourceRecordSet>
      </Change>
    </Changes>
  </ChangeBatch>
</ChangeResourceRecordSetsRequest>"#;
        let input = RestInput {
            body: body.as_slice().into(),
            ..RestInput::default()
        };
        let request: Result<ChangeRecordSetsRequest, ApiError> = parse_body(&input);
        let changes = request.map(|r| r.change_batch.changes.items).unwrap_or_default();
        assert_eq!(changes.len(), 1);
        let record = changes.into_iter().next().map(|c| RecordSet::from(c.resource_record_set));
        let record = record.unwrap_or_default();
        assert_eq!(record.name, "www.example.com.");
        assert_eq!(record.ttl, Some(60));
        assert_eq!(record.records, vec!["10.0.0.1", "10.0.0.2"]);
    }
}
