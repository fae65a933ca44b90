// crates/stratus-core/src/core/identity.rs
// ============================================================================
// Module: Stratus Provider Identity
// Description: Fixed partition, region, and account used to mint ARNs.
// Purpose: Build provider-style resource names from one configured identity.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every ARN Stratus returns has the shape
//! `arn:{partition}:{service}:{region}:{account}:{descriptor}`. The identity
//! is fixed per process and comes from configuration, together with the
//! public endpoint embedded in URL-shaped identifiers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default ARN partition.
pub const DEFAULT_PARTITION: &str = "aws";
/// Default region.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Default twelve-digit account id.
pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";
/// Default endpoint clients use to reach the emulator.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4566";

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Partition, region, and account that the emulator impersonates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// ARN partition.
    pub partition: String,
    /// Region name.
    pub region: String,
    /// Account id.
    pub account_id: String,
    /// Public base URL embedded in resource URLs (no trailing slash).
    pub endpoint: String,
}

impl Default for ProviderIdentity {
    fn default() -> Self {
        Self {
            partition: DEFAULT_PARTITION.to_string(),
            region: DEFAULT_REGION.to_string(),
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl ProviderIdentity {
    /// Builds a regional ARN for `service`.
    #[must_use]
    pub fn arn(&self, service: &str, descriptor: &str) -> String {
        format!(
            "arn:{}:{service}:{}:{}:{descriptor}",
            self.partition, self.region, self.account_id
        )
    }

    /// Builds a global ARN with empty region and account fields.
    #[must_use]
    pub fn global_arn(&self, service: &str, descriptor: &str) -> String {
        format!("arn:{}:{service}:::{descriptor}", self.partition)
    }

    /// Returns the internal DNS suffix used for private host names.
    #[must_use]
    pub fn internal_dns_suffix(&self) -> String {
        if self.region == DEFAULT_REGION {
            "ec2.internal".to_string()
        } else {
            format!("{}.compute.internal", self.region)
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::ProviderIdentity;

    #[test]
    fn regional_arn_uses_identity() {
        let identity = ProviderIdentity::default();
        assert_eq!(
            identity.arn("dynamodb", "table/orders"),
            "arn:aws:dynamodb:us-east-1:000000000000:table/orders"
        );
    }

    #[test]
    fn global_arn_drops_region_and_account() {
        let identity = ProviderIdentity::default();
        assert_eq!(
            identity.global_arn("route53", "hostedzone/Z1"),
            "arn:aws:route53:::hostedzone/Z1"
        );
    }

    #[test]
    fn internal_dns_suffix_follows_region() {
        let mut identity = ProviderIdentity::default();
        assert_eq!(identity.internal_dns_suffix(), "ec2.internal");
        identity.region = "eu-west-1".to_string();
        assert_eq!(identity.internal_dns_suffix(), "eu-west-1.compute.internal");
    }
}
