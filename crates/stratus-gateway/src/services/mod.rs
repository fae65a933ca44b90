// crates/stratus-gateway/src/services/mod.rs
// ============================================================================
// Module: Emulated Services
// Description: Built-in service definitions served by the gateway.
// Purpose: Exercise each idempotency policy and wire convention.
// Dependencies: stratus-core
// ============================================================================

//! ## Overview
//! Each service is a thin mapping from wire operations onto the entity
//! store. The set covers all three wire conventions (target header, action
//! form, REST path) and all three idempotency policies.

pub mod compute;
pub mod params;
pub mod queue;
pub mod secret;
pub mod table;
pub mod tags;
pub mod zone;

use crate::registry::ServiceDefinition;

/// Returns the definitions of every built-in service.
#[must_use]
pub fn builtin_services() -> Vec<ServiceDefinition> {
    vec![
        table::definition(),
        secret::definition(),
        queue::definition(),
        compute::definition(),
        zone::definition(),
    ]
}
