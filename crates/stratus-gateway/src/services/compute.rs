// crates/stratus-gateway/src/services/compute.rs
// ============================================================================
// Module: Compute Service
// Description: Instances, volumes, and attachments over the query-action
//              convention.
// Purpose: Exercise random ids, derived network fields, and cross-resource
//          references.
// Dependencies: serde, stratus-core
// ============================================================================

//! ## Overview
//! Instances and volumes are strict-conflict entities with random ids. The
//! instance normalizer derives every network field from the instance id:
//! private and public addresses, DNS names, and a primary network
//! interface. A terminated instance never carries a public address.
//!
//! Volume attachments are separate entities keyed by volume id, so a second
//! attach of the same volume collides in the store and surfaces as
//! `VolumeInUse`. Terminating an instance removes its attachments and frees
//! the volumes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use stratus_core::Entity;
use stratus_core::EntityKind;
use stratus_core::IdempotencyPolicy;
use stratus_core::NormalizeContext;
use stratus_core::ProviderIdentity;
use stratus_core::StoreError;
use stratus_core::deterministic_token;
use stratus_core::random_token;

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
use crate::services::params::indices;
use crate::services::params::optional_number;
use crate::services::params::required;
use crate::services::tags;
use crate::xml::XmlNode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Service name.
pub const SERVICE: &str = "ec2";
/// XML namespace of responses.
pub const XML_NAMESPACE: &str = "http://ec2.amazonaws.com/doc/2016-11-15/";
/// Length of the random part of resource ids.
const ID_LENGTH: usize = 17;
/// Upper bound on instances per launch.
const MAX_LAUNCH_COUNT: u32 = 20;
/// Volume size bounds in GiB.
const VOLUME_SIZE_RANGE: std::ops::RangeInclusive<u32> = 1 ..= 16_384;
/// Instance state names.
const RUNNING: &str = "running";
/// Terminal instance state.
const TERMINATED: &str = "terminated";
/// Volume state when free.
const AVAILABLE: &str = "available";
/// Volume state when attached.
const IN_USE: &str = "in-use";
/// Unknown instance error code.
const INSTANCE_NOT_FOUND: &str = "InvalidInstanceID.NotFound";
/// Unknown volume error code.
const VOLUME_NOT_FOUND: &str = "InvalidVolume.NotFound";
/// Attached volume error code.
const VOLUME_IN_USE: &str = "VolumeInUse";
/// Declared operations.
const OPERATIONS: &[&str] = &[
    "RunInstances",
    "DescribeInstances",
    "TerminateInstances",
    "CreateVolume",
    "DescribeVolumes",
    "DeleteVolume",
    "AttachVolume",
    "DetachVolume",
];

// ============================================================================
// SECTION: Entities
// ============================================================================

/// Network interface attached to an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkInterface {
    /// Interface id.
    pub network_interface_id: String,
    /// Private address of the interface.
    pub private_ip_address: String,
    /// Subnet id.
    pub subnet_id: String,
}

/// Stored instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Instance {
    /// Instance id (`i-…`).
    pub instance_id: String,
    /// Launch reservation id (`r-…`).
    pub reservation_id: String,
    /// Image id.
    pub image_id: String,
    /// Instance type.
    pub instance_type: String,
    /// State name.
    pub state: String,
    /// Availability zone.
    pub availability_zone: String,
    /// VPC id.
    pub vpc_id: String,
    /// Subnet id.
    pub subnet_id: String,
    /// Primary private address.
    pub private_ip_address: String,
    /// Public address; absent once terminated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip_address: Option<String>,
    /// Private DNS name.
    pub private_dns_name: String,
    /// Public DNS name; empty without a public address.
    pub public_dns_name: String,
    /// Network interfaces, primary first.
    pub network_interfaces: Vec<NetworkInterface>,
}

impl Instance {
    /// Returns the numeric state code reported alongside the state name.
    fn state_code(&self) -> u16 {
        match self.state.as_str() {
            "pending" => 0,
            RUNNING => 16,
            "shutting-down" => 32,
            TERMINATED => 48,
            "stopping" => 64,
            "stopped" => 80,
            _ => 0,
        }
    }
}

impl EntityKind for Instance {
    const SERVICE: &'static str = SERVICE;
    const RESOURCE_TYPE: &'static str = "instance";
    const POLICY: IdempotencyPolicy = IdempotencyPolicy::StrictConflict;

    fn normalize(&mut self, ctx: &NormalizeContext<'_>) {
        let id = ctx.name;
        self.instance_id = id.to_string();
        if self.state.is_empty() {
            self.state = RUNNING.to_string();
        }
        if self.instance_type.is_empty() {
            self.instance_type = "t2.micro".to_string();
        }
        if self.availability_zone.is_empty() {
            self.availability_zone = format!("{}a", ctx.identity.region);
        }
        if self.vpc_id.is_empty() {
            self.vpc_id = format!("vpc-{}", deterministic_token(ctx.namespace.as_str(), ID_LENGTH));
        }
        if self.subnet_id.is_empty() {
            let seed = format!("{}#{}", ctx.namespace, self.availability_zone);
            self.subnet_id = format!("subnet-{}", deterministic_token(&seed, ID_LENGTH));
        }
        if self.private_ip_address.is_empty() {
            let [a, b, _] = octets(id);
            self.private_ip_address = format!("10.0.{a}.{}", b.max(4));
        }
        let dns_label = self.private_ip_address.replace('.', "-");
        self.private_dns_name = format!("ip-{dns_label}.{}", ctx.identity.internal_dns_suffix());
        if self.state == TERMINATED {
            self.public_ip_address = None;
        } else if self.public_ip_address.is_none() {
            let [a, b, c] = octets(&format!("{id}#public"));
            self.public_ip_address = Some(format!("54.{a}.{b}.{}", c.max(1)));
        }
        self.public_dns_name = self
            .public_ip_address
            .as_deref()
            .map(|ip| public_dns_name(ip, ctx.identity))
            .unwrap_or_default();
        if self.network_interfaces.is_empty() {
            self.network_interfaces.push(NetworkInterface {
                network_interface_id: format!("eni-{}", deterministic_token(id, ID_LENGTH)),
                ..NetworkInterface::default()
            });
        }
        let private_ip = self.private_ip_address.clone();
        for (index, interface) in self.network_interfaces.iter_mut().enumerate() {
            if index == 0 || interface.private_ip_address.is_empty() {
                interface.private_ip_address.clone_from(&private_ip);
            }
            if interface.subnet_id.is_empty() {
                interface.subnet_id.clone_from(&self.subnet_id);
            }
        }
    }
}

/// Stored block volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Volume {
    /// Volume id (`vol-…`).
    pub volume_id: String,
    /// Size in GiB.
    pub size: u32,
    /// Volume type.
    pub volume_type: String,
    /// Provisioned IOPS, for types that support it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iops: Option<u32>,
    /// Throughput in MiB/s, gp3 only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<u32>,
    /// Availability zone.
    pub availability_zone: String,
    /// `available` or `in-use`.
    pub state: String,
    /// Encryption flag.
    pub encrypted: bool,
    /// Source snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

impl EntityKind for Volume {
    const SERVICE: &'static str = SERVICE;
    const RESOURCE_TYPE: &'static str = "volume";
    const POLICY: IdempotencyPolicy = IdempotencyPolicy::StrictConflict;

    fn normalize(&mut self, ctx: &NormalizeContext<'_>) {
        self.volume_id = ctx.name.to_string();
        if self.volume_type.is_empty() {
            self.volume_type = "gp2".to_string();
        }
        if self.availability_zone.is_empty() {
            self.availability_zone = format!("{}a", ctx.identity.region);
        }
        if self.state.is_empty() {
            self.state = AVAILABLE.to_string();
        }
        match self.volume_type.as_str() {
            "gp3" => {
                self.iops = Some(self.iops.unwrap_or(3_000));
                self.throughput = Some(self.throughput.unwrap_or(125));
            }
            "io1" | "io2" => {
                self.iops = Some(self.iops.unwrap_or(100).max(100));
                self.throughput = None;
            }
            "gp2" => {
                self.iops = Some(self.size.saturating_mul(3).clamp(100, 16_000));
                self.throughput = None;
            }
            _ => {
                self.iops = None;
                self.throughput = None;
            }
        }
    }
}

/// Attachment of one volume to one instance, keyed by volume id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VolumeAttachment {
    /// Attached volume.
    pub volume_id: String,
    /// Owning instance.
    pub instance_id: String,
    /// Device name.
    pub device: String,
}

impl EntityKind for VolumeAttachment {
    const SERVICE: &'static str = SERVICE;
    const RESOURCE_TYPE: &'static str = "volume-attachment";
    const POLICY: IdempotencyPolicy = IdempotencyPolicy::StrictConflict;

    fn normalize(&mut self, ctx: &NormalizeContext<'_>) {
        self.volume_id = ctx.name.to_string();
    }
}

// ============================================================================
// SECTION: Definition
// ============================================================================

/// Returns the compute service definition.
#[must_use]
pub fn definition() -> ServiceDefinition {
    ServiceDefinition {
        name: SERVICE,
        target_prefix: None,
        data_content_type: "application/x-amz-json-1.0",
        xml_namespace: XML_NAMESPACE,
        markup_style: MarkupStyle::Flat,
        operations: OPERATIONS,
        bindings: vec![
            Binding::action("RunInstances", run_instances),
            Binding::action("DescribeInstances", describe_instances),
            Binding::action("TerminateInstances", terminate_instances),
            Binding::action("CreateVolume", create_volume),
            Binding::action("DescribeVolumes", describe_volumes),
            Binding::action("DeleteVolume", delete_volume),
            Binding::action("AttachVolume", attach_volume),
            Binding::action("DetachVolume", detach_volume),
        ],
    }
}

// ============================================================================
// SECTION: Instance Handlers
// ============================================================================

/// Launches `MaxCount` instances under one reservation.
fn run_instances(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let image_id = required(params, "ImageId")?;
    let min_count = optional_number::<u32>(params, "MinCount")?.unwrap_or(1);
    let max_count = optional_number::<u32>(params, "MaxCount")?.unwrap_or(min_count);
    if min_count == 0 || max_count < min_count {
        return Err(invalid_value("MinCount must be at least 1 and no greater than MaxCount."));
    }
    if max_count > MAX_LAUNCH_COUNT {
        return Err(ApiError::new(
            ErrorKind::Validation,
            "InstanceLimitExceeded",
            format!(
                "You have requested more instances ({max_count}) than your current instance \
                 limit of {MAX_LAUNCH_COUNT} allows."
            ),
        ));
    }
    let tags = tag_specifications(params, "instance");
    let reservation_id = format!("r-{}", random_token(ID_LENGTH));
    let template = Instance {
        reservation_id: reservation_id.clone(),
        image_id: image_id.to_string(),
        instance_type: params.get("InstanceType").cloned().unwrap_or_default(),
        availability_zone: params.get("Placement.AvailabilityZone").cloned().unwrap_or_default(),
        subnet_id: params.get("SubnetId").cloned().unwrap_or_default(),
        ..Instance::default()
    };
    let mut launched = Vec::new();
    let mut items = Vec::new();
    for index in 0 .. max_count {
        let mut instance = template.clone();
        if index == 0
            && let Some(ip) = params.get("PrivateIpAddress")
        {
            instance.private_ip_address.clone_from(ip);
        }
        let id = format!("i-{}", random_token(ID_LENGTH));
        match launch(ctx, &id, instance, &tags) {
            Ok(entity) => {
                items.push(instance_item(&entity, &tags));
                launched.push(id);
            }
            Err(err) => {
                for id in &launched {
                    let arn = instance_arn(ctx.entities.identity(), id);
                    tags::discard::<Instance>(&ctx.entities, id, &arn);
                }
                return Err(err);
            }
        }
    }
    Ok(OperationOutput::markup(vec![
        XmlNode::text("reservationId", reservation_id),
        XmlNode::text("ownerId", &ctx.entities.identity().account_id),
        XmlNode::parent("groupSet", Vec::new()),
        XmlNode::parent("instancesSet", items),
    ]))
}

/// Describes instances grouped by reservation.
fn describe_instances(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let ids = distinct(indexed_values(params, "InstanceId"));
    let instances = select(ctx.entities.list::<Instance>()?, &ids, |id| {
        ApiError::not_found(INSTANCE_NOT_FOUND, format!("The instance ID '{id}' does not exist"))
    })?;
    let mut reservations: BTreeMap<String, Vec<XmlNode>> = BTreeMap::new();
    for entity in &instances {
        let arn = instance_arn(ctx.entities.identity(), &entity.name);
        let tags = tags::tags_of(&ctx.entities, &arn)?;
        reservations
            .entry(entity.attributes.reservation_id.clone())
            .or_default()
            .push(instance_item(entity, &tags));
    }
    let owner = &ctx.entities.identity().account_id;
    let items = reservations
        .into_iter()
        .map(|(reservation_id, items)| {
            XmlNode::parent("item", vec![
                XmlNode::text("reservationId", reservation_id),
                XmlNode::text("ownerId", owner),
                XmlNode::parent("groupSet", Vec::new()),
                XmlNode::parent("instancesSet", items),
            ])
        })
        .collect();
    Ok(OperationOutput::markup(vec![XmlNode::parent("reservationSet", items)]))
}

/// Terminates instances and releases their volumes.
fn terminate_instances(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let ids = distinct(indexed_values(params, "InstanceId"));
    if ids.is_empty() {
        return Err(ApiError::missing_parameter("InstanceId"));
    }
    let mut targets = Vec::new();
    for id in &ids {
        targets.push(ctx.entities.get::<Instance>(id).map_err(instance_error)?);
    }
    let attachments = ctx.entities.list::<VolumeAttachment>()?;
    let mut items = Vec::new();
    for mut entity in targets {
        let previous = state_node("previousState", &entity.attributes);
        for attachment in attachments.iter().filter(|a| a.attributes.instance_id == entity.name) {
            release(ctx, &attachment.name)?;
        }
        entity.attributes.state = TERMINATED.to_string();
        ctx.entities.save(&mut entity).map_err(instance_error)?;
        items.push(XmlNode::parent("item", vec![
            XmlNode::text("instanceId", &entity.name),
            state_node("currentState", &entity.attributes),
            previous,
        ]));
    }
    Ok(OperationOutput::markup(vec![XmlNode::parent("instancesSet", items)]))
}

// ============================================================================
// SECTION: Volume Handlers
// ============================================================================

/// Creates a volume.
fn create_volume(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let snapshot_id = params.get("SnapshotId").cloned();
    let size = match optional_number::<u32>(params, "Size")? {
        Some(size) => size,
        None if snapshot_id.is_some() => 8,
        None => return Err(ApiError::missing_parameter("Size")),
    };
    if !VOLUME_SIZE_RANGE.contains(&size) {
        return Err(invalid_value(&format!(
            "Volume of {size}GiB is outside the supported range of 1-16384GiB."
        )));
    }
    let volume_type = params.get("VolumeType").cloned().unwrap_or_else(|| "gp2".to_string());
    let iops = optional_number::<u32>(params, "Iops")?;
    let throughput = optional_number::<u32>(params, "Throughput")?;
    if iops.is_some() && !matches!(volume_type.as_str(), "gp3" | "io1" | "io2") {
        return Err(invalid_combination(&format!(
            "The parameter iops is not supported for {volume_type} volumes."
        )));
    }
    if throughput.is_some() && volume_type != "gp3" {
        return Err(invalid_combination(&format!(
            "The parameter throughput is not supported for {volume_type} volumes."
        )));
    }
    let volume = Volume {
        size,
        volume_type,
        iops,
        throughput,
        availability_zone: params.get("AvailabilityZone").cloned().unwrap_or_default(),
        encrypted: params.get("Encrypted").is_some_and(|value| value == "true"),
        snapshot_id,
        ..Volume::default()
    };
    let id = format!("vol-{}", random_token(ID_LENGTH));
    let entity = ctx.entities.create(&id, volume).map_err(volume_error)?.into_entity();
    let tags = tag_specifications(params, "volume");
    let arn = volume_arn(ctx.entities.identity(), &id);
    if let Err(err) = tags::tag(&ctx.entities, &arn, tags) {
        tags::discard::<Volume>(&ctx.entities, &id, &arn);
        return Err(err);
    }
    let mut children = volume_fields(&entity);
    children.push(XmlNode::text("createTime", entity.created_at.to_rfc3339()));
    Ok(OperationOutput::markup(children))
}

/// Describes volumes with their attachments.
fn describe_volumes(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let ids = distinct(indexed_values(params, "VolumeId"));
    let volumes = select(ctx.entities.list::<Volume>()?, &ids, |id| {
        ApiError::not_found(VOLUME_NOT_FOUND, format!("The volume '{id}' does not exist."))
    })?;
    let mut items = Vec::new();
    for entity in &volumes {
        let mut children = volume_fields(entity);
        children.push(XmlNode::text("createTime", entity.created_at.to_rfc3339()));
        let attachments = ctx
            .entities
            .find::<VolumeAttachment>(&entity.name)?
            .map(|attachment| attachment_item("item", &attachment, "attached"))
            .into_iter()
            .collect();
        children.push(XmlNode::parent("attachmentSet", attachments));
        let arn = volume_arn(ctx.entities.identity(), &entity.name);
        children.push(tag_set(&tags::tags_of(&ctx.entities, &arn)?));
        items.push(XmlNode::parent("item", children));
    }
    Ok(OperationOutput::markup(vec![XmlNode::parent("volumeSet", items)]))
}

/// Deletes an unattached volume.
fn delete_volume(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let id = required(params, "VolumeId")?;
    ctx.entities.get::<Volume>(id).map_err(volume_error)?;
    if let Some(attachment) = ctx.entities.find::<VolumeAttachment>(id)? {
        return Err(ApiError::in_use(
            VOLUME_IN_USE,
            format!("Volume {id} is currently attached to {}", attachment.attributes.instance_id),
        ));
    }
    ctx.entities.delete::<Volume>(id).map_err(volume_error)?;
    tags::clear(&ctx.entities, &volume_arn(ctx.entities.identity(), id))?;
    Ok(OperationOutput::markup(vec![XmlNode::text("return", true)]))
}

/// Attaches a volume to a live instance in the same zone.
fn attach_volume(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let volume_id = required(params, "VolumeId")?;
    let instance_id = required(params, "InstanceId")?;
    let device = required(params, "Device")?;
    let mut volume = ctx.entities.get::<Volume>(volume_id).map_err(volume_error)?;
    let instance = ctx.entities.get::<Instance>(instance_id).map_err(instance_error)?;
    if instance.attributes.state == TERMINATED {
        return Err(ApiError::new(
            ErrorKind::Validation,
            "IncorrectInstanceState",
            format!(
                "The instance '{instance_id}' is not in a state from which it can be attached."
            ),
        ));
    }
    if volume.attributes.availability_zone != instance.attributes.availability_zone {
        return Err(ApiError::new(
            ErrorKind::Validation,
            "InvalidVolume.ZoneMismatch",
            format!(
                "The volume '{volume_id}' is not in the same availability zone as instance \
                 '{instance_id}'"
            ),
        ));
    }
    let attachment = ctx
        .entities
        .create(volume_id, VolumeAttachment {
            instance_id: instance_id.to_string(),
            device: device.to_string(),
            ..VolumeAttachment::default()
        })
        .map_err(|err| match err {
            StoreError::AlreadyExists(_) => ApiError::in_use(
                VOLUME_IN_USE,
                format!("{volume_id} is already attached to an instance"),
            ),
            other => ApiError::from(other),
        })?
        .into_entity();
    volume.attributes.state = IN_USE.to_string();
    ctx.entities.save(&mut volume).map_err(volume_error)?;
    Ok(OperationOutput::markup(attachment_fields(&attachment, "attached")))
}

/// Detaches a volume.
fn detach_volume(
    ctx: &OperationContext<'_>,
    input: &OperationInput,
) -> Result<OperationOutput, ApiError> {
    let params = form(input)?;
    let volume_id = required(params, "VolumeId")?;
    ctx.entities.get::<Volume>(volume_id).map_err(volume_error)?;
    let attachment = ctx
        .entities
        .find::<VolumeAttachment>(volume_id)?
        .filter(|attachment| {
            params.get("InstanceId").is_none_or(|id| *id == attachment.attributes.instance_id)
        })
        .ok_or_else(|| {
            ApiError::new(
                ErrorKind::Validation,
                "IncorrectState",
                format!("Volume '{volume_id}' is in the 'available' state."),
            )
        })?;
    release(ctx, volume_id)?;
    Ok(OperationOutput::markup(attachment_fields(&attachment, "detached")))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Removes the attachment of `volume_id` and marks the volume available.
fn release(ctx: &OperationContext<'_>, volume_id: &str) -> Result<(), ApiError> {
    match ctx.entities.delete::<VolumeAttachment>(volume_id) {
        Ok(()) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }
    if let Some(mut volume) = ctx.entities.find::<Volume>(volume_id)? {
        volume.attributes.state = AVAILABLE.to_string();
        ctx.entities.save(&mut volume).map_err(volume_error)?;
    }
    Ok(())
}

/// Filters `entities` to `ids`, in request order; all entities when `ids`
/// is empty.
fn select<T: Clone>(
    entities: Vec<Entity<T>>,
    ids: &[String],
    missing: impl Fn(&str) -> ApiError,
) -> Result<Vec<Entity<T>>, ApiError> {
    if ids.is_empty() {
        return Ok(entities);
    }
    let by_name: BTreeMap<&str, &Entity<T>> =
        entities.iter().map(|entity| (entity.name.as_str(), entity)).collect();
    ids.iter()
        .map(|id| {
            by_name.get(id.as_str()).map(|entity| (*entity).clone()).ok_or_else(|| missing(id))
        })
        .collect()
}

/// Creates one instance and applies its launch tags.
fn launch(
    ctx: &OperationContext<'_>,
    id: &str,
    instance: Instance,
    tags: &BTreeMap<String, String>,
) -> Result<Entity<Instance>, ApiError> {
    let entity = ctx.entities.create(id, instance).map_err(instance_error)?.into_entity();
    let arn = instance_arn(ctx.entities.identity(), id);
    if let Err(err) = tags::tag(&ctx.entities, &arn, tags.clone()) {
        tags::discard::<Instance>(&ctx.entities, id, &arn);
        return Err(err);
    }
    Ok(entity)
}

/// Drops repeated ids, keeping first-seen order.
fn distinct(ids: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Collects tags from `TagSpecification.N` entries for `resource_type`.
fn tag_specifications(params: &FormParams, resource_type: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    for index in indices(params, "TagSpecification") {
        let kind = params.get(&format!("TagSpecification.{index}.ResourceType"));
        if kind.is_some_and(|kind| kind == resource_type) {
            let prefix = format!("TagSpecification.{index}.Tag");
            tags.extend(indexed_pairs(params, &prefix, "Key", "Value"));
        }
    }
    tags
}

/// Derives three octets from `seed`.
fn octets(seed: &str) -> [u8; 3] {
    let token = deterministic_token(seed, 6);
    let octet = |at: usize| {
        token.get(at .. at + 2).and_then(|hex| u8::from_str_radix(hex, 16).ok()).unwrap_or(0)
    };
    [octet(0), octet(2), octet(4)]
}

/// Builds the public DNS name for `ip`.
fn public_dns_name(ip: &str, identity: &ProviderIdentity) -> String {
    let host = format!("ec2-{}", ip.replace('.', "-"));
    if identity.region == "us-east-1" {
        format!("{host}.compute-1.amazonaws.com")
    } else {
        format!("{host}.{}.compute.amazonaws.com", identity.region)
    }
}

/// Returns the instance ARN used for tagging.
fn instance_arn(identity: &ProviderIdentity, id: &str) -> String {
    identity.arn(SERVICE, &format!("instance/{id}"))
}

/// Returns the volume ARN used for tagging.
fn volume_arn(identity: &ProviderIdentity, id: &str) -> String {
    identity.arn(SERVICE, &format!("volume/{id}"))
}

/// Maps store errors with instance wording.
fn instance_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(identifier) => {
            let id = identifier.rsplit('/').next().unwrap_or(&identifier).to_string();
            let message = format!("The instance ID '{id}' does not exist");
            ApiError::not_found(INSTANCE_NOT_FOUND, message)
        }
        other => ApiError::from(other),
    }
}

/// Maps store errors with volume wording.
fn volume_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(identifier) => {
            let id = identifier.rsplit('/').next().unwrap_or(&identifier).to_string();
            ApiError::not_found(VOLUME_NOT_FOUND, format!("The volume '{id}' does not exist."))
        }
        other => ApiError::from(other),
    }
}

/// `InvalidParameterValue` error.
fn invalid_value(message: &str) -> ApiError {
    ApiError::new(ErrorKind::Validation, "InvalidParameterValue", message)
}

/// `InvalidParameterCombination` error.
fn invalid_combination(message: &str) -> ApiError {
    ApiError::new(ErrorKind::Validation, "InvalidParameterCombination", message)
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders `tagSet`.
fn tag_set(tags: &BTreeMap<String, String>) -> XmlNode {
    XmlNode::parent(
        "tagSet",
        tags.iter()
            .map(|(key, value)| {
                XmlNode::parent("item", vec![
                    XmlNode::text("key", key),
                    XmlNode::text("value", value),
                ])
            })
            .collect(),
    )
}

/// Renders a state block.
fn state_node(name: &str, instance: &Instance) -> XmlNode {
    XmlNode::parent(name, vec![
        XmlNode::text("code", instance.state_code()),
        XmlNode::text("name", &instance.state),
    ])
}

/// Renders one instance `item`.
fn instance_item(entity: &Entity<Instance>, tags: &BTreeMap<String, String>) -> XmlNode {
    let instance = &entity.attributes;
    let mut children = vec![
        XmlNode::text("instanceId", &entity.name),
        XmlNode::text("imageId", &instance.image_id),
        state_node("instanceState", instance),
        XmlNode::text("privateDnsName", &instance.private_dns_name),
        XmlNode::text("dnsName", &instance.public_dns_name),
        XmlNode::text("instanceType", &instance.instance_type),
        XmlNode::text("launchTime", entity.created_at.to_rfc3339()),
        XmlNode::parent("placement", vec![XmlNode::text(
            "availabilityZone",
            &instance.availability_zone,
        )]),
        XmlNode::text("subnetId", &instance.subnet_id),
        XmlNode::text("vpcId", &instance.vpc_id),
        XmlNode::text("privateIpAddress", &instance.private_ip_address),
    ];
    if let Some(ip) = &instance.public_ip_address {
        children.push(XmlNode::text("ipAddress", ip));
    }
    children.push(XmlNode::parent(
        "networkInterfaceSet",
        instance
            .network_interfaces
            .iter()
            .map(|interface| {
                XmlNode::parent("item", vec![
                    XmlNode::text("networkInterfaceId", &interface.network_interface_id),
                    XmlNode::text("subnetId", &interface.subnet_id),
                    XmlNode::text("vpcId", &instance.vpc_id),
                    XmlNode::text("privateIpAddress", &interface.private_ip_address),
                ])
            })
            .collect(),
    ));
    children.push(tag_set(tags));
    XmlNode::parent("item", children)
}

/// Renders the fields shared by volume create and describe.
fn volume_fields(entity: &Entity<Volume>) -> Vec<XmlNode> {
    let volume = &entity.attributes;
    let mut children = vec![
        XmlNode::text("volumeId", &entity.name),
        XmlNode::text("size", volume.size),
        XmlNode::text("snapshotId", volume.snapshot_id.as_deref().unwrap_or_default()),
        XmlNode::text("availabilityZone", &volume.availability_zone),
        XmlNode::text("status", &volume.state),
        XmlNode::text("volumeType", &volume.volume_type),
        XmlNode::text("encrypted", volume.encrypted),
    ];
    if let Some(iops) = volume.iops {
        children.push(XmlNode::text("iops", iops));
    }
    if let Some(throughput) = volume.throughput {
        children.push(XmlNode::text("throughput", throughput));
    }
    children
}

/// Renders attachment fields.
fn attachment_fields(entity: &Entity<VolumeAttachment>, status: &str) -> Vec<XmlNode> {
    vec![
        XmlNode::text("volumeId", &entity.name),
        XmlNode::text("instanceId", &entity.attributes.instance_id),
        XmlNode::text("device", &entity.attributes.device),
        XmlNode::text("status", status),
        XmlNode::text("attachTime", entity.created_at.to_rfc3339()),
    ]
}

/// Renders an attachment as a named element.
fn attachment_item(name: &str, entity: &Entity<VolumeAttachment>, status: &str) -> XmlNode {
    XmlNode::parent(name, attachment_fields(entity, status))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
