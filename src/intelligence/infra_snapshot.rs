//! Phase 3 — infra snapshot (spec §4.4.3). For AWS targets, queries the
//! default VPC/subnets, latest hardened AMI id, caller account id, and
//! region via the capability registry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::CapabilityRegistry;
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfraSnapshot {
    pub region: Option<String>,
    pub account_id: Option<String>,
    pub vpc_id: Option<String>,
    pub vpc_cidr: Option<String>,
    pub subnet_ids: Vec<String>,
    pub ami_id: Option<String>,
}

/// Accepts the VPC's `CidrBlock` only if it parses as a well-formed CIDR
/// (mirrors the teacher's `NetAllowList` validation in
/// `bootstrap/network.rs`), so a malformed describe-vpcs response never
/// seeds a bogus static binding.
fn valid_cidr(candidate: &str) -> Option<String> {
    candidate.parse::<ipnet::IpNet>().ok().map(|_| candidate.to_string())
}

impl InfraSnapshot {
    /// Static bindings seeded unconditionally by the resolver's first stage
    /// (spec §4.9).
    pub fn static_bindings(&self) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        if let Some(region) = &self.region {
            out.insert("REGION".to_string(), region.clone());
        }
        if let Some(account_id) = &self.account_id {
            out.insert("ACCOUNT_ID".to_string(), account_id.clone());
        }
        if let Some(ami_id) = &self.ami_id {
            out.insert("AMI_ID".to_string(), ami_id.clone());
        }
        if let Some(vpc_id) = &self.vpc_id {
            out.insert("VPC_ID".to_string(), vpc_id.clone());
        }
        if let Some(vpc_cidr) = &self.vpc_cidr {
            out.insert("VPC_CIDR".to_string(), vpc_cidr.clone());
        }
        out
    }
}

fn first_string(value: &Value, path: &[&str]) -> Option<String> {
    let mut cursor = value;
    for key in path {
        cursor = match key.parse::<usize>() {
            Ok(index) => cursor.as_array()?.get(index)?,
            Err(_) => cursor.get(key)?,
        };
    }
    match cursor {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}

/// Queries the AWS capability backend for the handful of facts a launch
/// plan needs. Best-effort per field: a missing capability operation leaves
/// that field `None` rather than failing the whole snapshot, since not
/// every target needs every fact (e.g. a `lambda` deploy has no VPC facts).
pub async fn snapshot(registry: &CapabilityRegistry) -> Result<InfraSnapshot> {
    let mut snapshot = InfraSnapshot::default();

    if let Ok(identity) = registry.execute_operation("aws", "caller_identity", &IndexMap::new()).await {
        snapshot.account_id = first_string(&identity, &["Account"]);
    }

    if let Ok(vpcs) = registry.execute_operation("aws", "describe_default_vpc", &IndexMap::new()).await {
        snapshot.vpc_id = first_string(&vpcs, &["Vpcs", "0", "VpcId"]);
        snapshot.vpc_cidr = first_string(&vpcs, &["Vpcs", "0", "CidrBlock"]).and_then(|cidr| valid_cidr(&cidr));
    }

    if let Ok(subnets) = registry.execute_operation("aws", "describe_subnets", &IndexMap::new()).await
        && let Some(items) = subnets.get("Subnets").and_then(|v| v.as_array())
    {
        snapshot.subnet_ids = items
            .iter()
            .filter_map(|s| s.get("SubnetId").and_then(|v| v.as_str()).map(str::to_string))
            .collect();
    }

    if let Ok(amis) = registry.execute_operation("aws", "describe_hardened_amis", &IndexMap::new()).await {
        snapshot.ami_id = first_string(&amis, &["Images", "0", "ImageId"]);
    }

    snapshot.region = std::env::var("AWS_REGION").ok().or_else(|| std::env::var("AWS_DEFAULT_REGION").ok());

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_bindings_only_include_present_fields() {
        let snapshot = InfraSnapshot { region: Some("us-east-1".into()), ..Default::default() };
        let bindings = snapshot.static_bindings();
        assert_eq!(bindings.get("REGION"), Some(&"us-east-1".to_string()));
        assert!(!bindings.contains_key("ACCOUNT_ID"));
    }

    #[test]
    fn malformed_cidr_is_rejected() {
        assert_eq!(valid_cidr("not-a-cidr"), None);
        assert_eq!(valid_cidr("10.0.0.0/16"), Some("10.0.0.0/16".to_string()));
    }

    #[test]
    fn first_string_indexes_through_numeric_array_segments() {
        let vpcs = serde_json::json!({
            "Vpcs": [{"VpcId": "vpc-abc123", "CidrBlock": "10.0.0.0/16"}]
        });
        assert_eq!(first_string(&vpcs, &["Vpcs", "0", "VpcId"]), Some("vpc-abc123".to_string()));
        assert_eq!(first_string(&vpcs, &["Vpcs", "0", "CidrBlock"]), Some("10.0.0.0/16".to_string()));
        assert_eq!(first_string(&vpcs, &["Vpcs", "1", "VpcId"]), None);
    }
}
