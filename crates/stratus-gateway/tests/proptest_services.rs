// crates/stratus-gateway/tests/proptest_services.rs
// ============================================================================
// Module: Service Property Tests
// Description: Property checks over generated resource names.
// Purpose: Keep name normalization and idempotent replays stable.
// Dependencies: stratus-gateway, stratus-core, proptest
// ============================================================================

//! ## Overview
//! Calls [`Gateway::handle`] directly with generated names and checks the
//! invariants that must hold for any accepted input. Entity normalizers are
//! also checked directly for idempotence and mode-exclusive fields.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use proptest::prelude::*;
use stratus_core::EntityKind;
use stratus_core::InMemoryResourceStore;
use stratus_core::NamespaceId;
use stratus_core::NormalizeContext;
use stratus_core::ProviderIdentity;
use stratus_core::ReadRetryPolicy;
use stratus_core::SharedResourceStore;
use stratus_gateway::EncodedResponse;
use stratus_gateway::Gateway;
use stratus_gateway::InboundRequest;
use stratus_gateway::services::compute::Volume;
use stratus_gateway::services::table::BillingModeSummary;
use stratus_gateway::services::table::ProvisionedThroughput;
use stratus_gateway::services::table::Table;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn gateway() -> Gateway {
    let store = SharedResourceStore::from_store(InMemoryResourceStore::new())
        .with_read_retry(ReadRetryPolicy::none());
    Gateway::with_builtin_services(store).unwrap()
}

fn post(path: &str, content_type: &'static str, body: String) -> InboundRequest {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static(content_type));
    InboundRequest {
        method: Method::POST,
        path: path.to_string(),
        query: None,
        headers,
        body: Bytes::from(body),
    }
}

fn text_between<'a>(response: &'a EncodedResponse, open: &str, close: &str) -> &'a str {
    let body = std::str::from_utf8(&response.body).unwrap();
    let start = body.find(open).unwrap() + open.len();
    let end = body[start ..].find(close).unwrap() + start;
    &body[start .. end]
}

fn create_zone(gateway: &Gateway, name: &str, reference: &str) -> EncodedResponse {
    let body = format!(
        "<CreateHostedZoneRequest><Name>{name}</Name>\
         <CallerReference>{reference}</CallerReference></CreateHostedZoneRequest>"
    );
    gateway.handle(&post("/2013-04-01/hostedzone", "text/xml", body))
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn zone_names_are_lowercase_and_fully_qualified(
        label in "[a-zA-Z][a-zA-Z0-9]{0,11}",
        tld in "(com|net|ORG)",
        trailing_dot in any::<bool>(),
        reference in "[a-z0-9]{1,8}",
    ) {
        let gateway = gateway();
        let name = if trailing_dot { format!("{label}.{tld}.") } else { format!("{label}.{tld}") };
        let created = create_zone(&gateway, &name, &reference);
        prop_assert_eq!(created.status, StatusCode::CREATED);
        let expected = format!("{}.{}.", label.to_lowercase(), tld.to_lowercase());
        prop_assert_eq!(text_between(&created, "<Name>", "</Name>"), expected.as_str());
        prop_assert_eq!(
            text_between(&created, "<ResourceRecordSetCount>", "</ResourceRecordSetCount>"),
            "2"
        );

        let replay = create_zone(&gateway, &name, &reference);
        prop_assert_eq!(replay.status, StatusCode::CREATED);
        prop_assert_eq!(&replay.body, &created.body);
    }

    #[test]
    fn queue_urls_end_with_the_queue_name(name in "[A-Za-z0-9_-]{1,80}") {
        let gateway = gateway();
        let form = format!("Action=CreateQueue&QueueName={name}");
        let created = gateway.handle(&post("/", "application/x-www-form-urlencoded", form));
        prop_assert_eq!(created.status, StatusCode::OK);
        let url = text_between(&created, "<QueueUrl>", "</QueueUrl>");
        prop_assert_eq!(url, format!("http://localhost:4566/000000000000/{name}"));
    }

    #[test]
    fn table_normalizer_is_idempotent_and_mode_exclusive(
        name in "[A-Za-z0-9_.-]{3,40}",
        on_demand in any::<bool>(),
        capacity in prop::option::of((1_u64..1000, 1_u64..1000)),
    ) {
        let identity = ProviderIdentity::default();
        let namespace = NamespaceId::new("default");
        let ctx = NormalizeContext { name: &name, namespace: &namespace, identity: &identity };
        let mode = if on_demand { "PAY_PER_REQUEST" } else { "PROVISIONED" };
        let mut table = Table {
            billing_mode_summary: BillingModeSummary { billing_mode: mode.to_string() },
            provisioned_throughput: capacity.map(|(read, write)| ProvisionedThroughput {
                read_capacity_units: read,
                write_capacity_units: write,
                ..ProvisionedThroughput::default()
            }),
            ..Table::default()
        };
        table.normalize(&ctx);
        let once = serde_json::to_vec(&table).unwrap();
        table.normalize(&ctx);
        prop_assert_eq!(&once, &serde_json::to_vec(&table).unwrap());
        prop_assert_eq!(table.provisioned_throughput.is_none(), on_demand);
        prop_assert!(!table.key_schema.is_empty());
        prop_assert!(!table.attribute_definitions.is_empty());
    }

    #[test]
    fn volume_performance_fields_follow_the_volume_type(
        volume_type in prop::sample::select(
            vec!["gp2", "gp3", "io1", "io2", "st1", "sc1", "standard"]
        ),
        size in 1_u32..16_384,
        iops in prop::option::of(100_u32..64_000),
        throughput in prop::option::of(125_u32..1000),
    ) {
        let identity = ProviderIdentity::default();
        let namespace = NamespaceId::new("default");
        let ctx = NormalizeContext {
            name: "vol-0123456789abcdef0",
            namespace: &namespace,
            identity: &identity,
        };
        let mut volume = Volume {
            size,
            volume_type: volume_type.to_string(),
            iops,
            throughput,
            ..Volume::default()
        };
        volume.normalize(&ctx);
        let once = serde_json::to_vec(&volume).unwrap();
        volume.normalize(&ctx);
        prop_assert_eq!(&once, &serde_json::to_vec(&volume).unwrap());
        prop_assert_eq!(volume.throughput.is_some(), volume_type == "gp3");
        let supports_iops = matches!(volume_type, "gp2" | "gp3" | "io1" | "io2");
        prop_assert_eq!(volume.iops.is_some(), supports_iops);
    }
}
