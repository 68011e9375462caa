// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resource registry: Redfish resources advertised by a device.
//!
//! Built from Redfish resource PDRs. Each PDR contributes its primary
//! resource plus any additional resources it names; URIs are constructed
//! by walking containment parents up to a root, which contributes the
//! leading `/`.

use crate::error::{Error, Result};
use crate::protocol::pdr::{PdrHeader, RedfishResourcePdr, PDR_HEADER_SIZE};
use crate::protocol::rde::{OperationType, SchemaClass};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One registered Redfish resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    #[serde(rename = "resourceId")]
    pub resource_id: u32,
    #[serde(rename = "subURI")]
    pub uri: String,
    #[serde(rename = "schemaName")]
    pub schema_name: String,
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "schemaClass")]
    pub schema_class: SchemaClass,
    #[serde(rename = "ProposedContainingResourceName")]
    pub proposed_containing_resource: String,
    pub operations: Vec<OperationType>,
    /// Containment parent; 0 for roots.
    pub parent: u32,
}

/// Registry of resources for one device.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    by_id: HashMap<u32, ResourceInfo>,
    uri_to_id: HashMap<String, u32>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, info: ResourceInfo) {
        self.uri_to_id.insert(info.uri.clone(), info.resource_id);
        self.by_id.insert(info.resource_id, info);
    }

    pub fn uri_to_id(&self, uri: &str) -> Result<u32> {
        self.uri_to_id
            .get(uri)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("URI {} not in registry", uri)))
    }

    pub fn id_to_uri(&self, resource_id: u32) -> Result<&str> {
        self.by_id
            .get(&resource_id)
            .map(|info| info.uri.as_str())
            .ok_or_else(|| Error::NotFound(format!("resource {} not in registry", resource_id)))
    }

    pub fn get(&self, resource_id: u32) -> Option<&ResourceInfo> {
        self.by_id.get(&resource_id)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceInfo> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Resources whose dictionary the discovery flow fetches.
    pub fn major_resources(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .by_id
            .values()
            .filter(|info| info.schema_class == SchemaClass::Major && !info.schema_name.is_empty())
            .map(|info| info.resource_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn reset(&mut self) {
        self.by_id.clear();
        self.uri_to_id.clear();
    }

    /// Ingest Redfish resource PDR payloads (complete records including
    /// the common PDR header).
    pub fn load_from_resource_pdrs(&mut self, payloads: &[Vec<u8>]) -> Result<()> {
        self.reset();

        let mut parsed: Vec<RedfishResourcePdr> = Vec::new();
        for payload in payloads {
            if payload.is_empty() {
                continue;
            }
            let hdr = PdrHeader::decode(payload)?;
            if hdr.pdr_type != crate::protocol::pdr::PDR_REDFISH_RESOURCE {
                warn!(
                    "[rde] skipping PDR type {} in resource payload list",
                    hdr.pdr_type
                );
                continue;
            }
            parsed.push(RedfishResourcePdr::decode(&payload[PDR_HEADER_SIZE..])?);
        }

        // First pass: URI fragments and containment edges, including the
        // additional resources nested in each PDR.
        let mut fragment: HashMap<u32, String> = HashMap::new();
        let mut parent: HashMap<u32, u32> = HashMap::new();
        let mut primary: HashMap<u32, &RedfishResourcePdr> = HashMap::new();

        for pdr in &parsed {
            let rid = pdr.resource_id;
            let frag = if pdr.containing_resource_id == 0 {
                let mut uri = String::new();
                if !pdr.proposed_containing_resource_name.is_empty() {
                    uri.push('/');
                    uri.push_str(&pdr.proposed_containing_resource_name);
                }
                if !pdr.sub_uri.is_empty() {
                    if !uri.ends_with('/') {
                        uri.push('/');
                    }
                    uri.push_str(&pdr.sub_uri);
                }
                uri
            } else {
                pdr.sub_uri.clone()
            };
            fragment.insert(rid, frag);
            parent.insert(rid, pdr.containing_resource_id);
            primary.insert(rid, pdr);

            for add in &pdr.additional {
                fragment.insert(add.resource_id, add.name.clone());
                parent.insert(add.resource_id, rid);
            }
        }

        // Second pass: full URIs by parent walk, then registration.
        for (&rid, _) in &fragment {
            let uri = Self::construct_uri(rid, &fragment, &parent)?;
            let info = match primary.get(&rid) {
                Some(pdr) => ResourceInfo {
                    resource_id: rid,
                    uri,
                    schema_name: pdr.major_schema_name.clone(),
                    schema_version: pdr.major_schema_version.display(),
                    schema_class: SchemaClass::Major,
                    proposed_containing_resource: pdr.proposed_containing_resource_name.clone(),
                    operations: OperationType::from_bitmap(pdr.supported_operations),
                    parent: pdr.containing_resource_id,
                },
                None => ResourceInfo {
                    resource_id: rid,
                    uri,
                    schema_name: String::new(),
                    schema_version: String::new(),
                    schema_class: SchemaClass::Major,
                    proposed_containing_resource: String::new(),
                    operations: Vec::new(),
                    parent: parent.get(&rid).copied().unwrap_or(0),
                },
            };
            debug!(
                "[rde] registered resource {} at {} (schema {} {})",
                rid, info.uri, info.schema_name, info.schema_version
            );
            self.register(info);
        }
        Ok(())
    }

    fn construct_uri(
        rid: u32,
        fragment: &HashMap<u32, String>,
        parent: &HashMap<u32, u32>,
    ) -> Result<String> {
        let mut segments: Vec<&str> = Vec::new();
        let mut cursor = rid;
        // Bounded walk: containment loops in a malformed PDR set must not
        // hang discovery.
        for _ in 0..64 {
            let frag = fragment
                .get(&cursor)
                .ok_or_else(|| Error::NotFound(format!("resource {} has no URI fragment", cursor)))?;
            segments.push(frag);
            match parent.get(&cursor) {
                Some(0) | None => {
                    let mut uri = String::new();
                    for seg in segments.iter().rev() {
                        if !seg.starts_with('/') {
                            uri.push('/');
                        }
                        uri.push_str(seg);
                    }
                    return Ok(uri);
                }
                Some(&p) => cursor = p,
            }
        }
        Err(Error::DecodeError(format!(
            "containment loop while building URI for resource {}",
            rid
        )))
    }

    /// Persist the registry as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut entries: Vec<&ResourceInfo> = self.by_id.values().collect();
        entries.sort_by_key(|info| info.resource_id);
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| Error::EncodeError(e.to_string()))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Restore a registry saved with [`ResourceRegistry::save`].
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)?;
        let entries: Vec<ResourceInfo> =
            serde_json::from_str(&json).map_err(|e| Error::DecodeError(e.to_string()))?;
        self.reset();
        for info in entries {
            self.register(info);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::base::Ver32;
    use crate::protocol::pdr::AdditionalResource;

    fn chassis_pdr() -> RedfishResourcePdr {
        RedfishResourcePdr {
            resource_id: 1,
            containing_resource_id: 0,
            proposed_containing_resource_name: "redfish/v1".to_string(),
            sub_uri: "Chassis/1".to_string(),
            supported_operations: 0b0001_0011,
            additional: vec![AdditionalResource {
                resource_id: 2,
                name: "Sensors".to_string(),
            }],
            major_schema_name: "Chassis".to_string(),
            major_schema_version: Ver32 {
                major: 0xf1,
                minor: 0xf2,
                update: 0xf0,
                alpha: 0,
            },
            major_schema_dictionary_length: 4096,
        }
    }

    #[test]
    fn test_root_uri_gets_leading_slash() {
        let mut registry = ResourceRegistry::new();
        registry
            .load_from_resource_pdrs(&[chassis_pdr().encode_record(1)])
            .unwrap();
        assert_eq!(registry.uri_to_id("/redfish/v1/Chassis/1").unwrap(), 1);
        assert_eq!(registry.get(1).unwrap().schema_name, "Chassis");
        assert_eq!(registry.get(1).unwrap().schema_version, "1.2.0");
    }

    #[test]
    fn test_additional_resource_nested_under_parent() {
        let mut registry = ResourceRegistry::new();
        registry
            .load_from_resource_pdrs(&[chassis_pdr().encode_record(1)])
            .unwrap();
        assert_eq!(
            registry.uri_to_id("/redfish/v1/Chassis/1/Sensors").unwrap(),
            2
        );
        // Additional resources carry no schema of their own.
        assert!(registry.get(2).unwrap().schema_name.is_empty());
    }

    #[test]
    fn test_major_resources_excludes_schemaless() {
        let mut registry = ResourceRegistry::new();
        registry
            .load_from_resource_pdrs(&[chassis_pdr().encode_record(1)])
            .unwrap();
        assert_eq!(registry.major_resources(), vec![1]);
    }

    #[test]
    fn test_unknown_uri_is_not_found() {
        let registry = ResourceRegistry::new();
        assert!(matches!(
            registry.uri_to_id("/nope"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ResourceRegistry.txt");

        let mut registry = ResourceRegistry::new();
        registry
            .load_from_resource_pdrs(&[chassis_pdr().encode_record(1)])
            .unwrap();
        registry.save(&path).unwrap();

        let mut restored = ResourceRegistry::new();
        restored.load(&path).unwrap();
        assert_eq!(restored.len(), registry.len());
        assert_eq!(restored.uri_to_id("/redfish/v1/Chassis/1").unwrap(), 1);
        assert_eq!(
            restored.get(1).unwrap().operations,
            vec![
                OperationType::Head,
                OperationType::Read,
                OperationType::Update
            ]
        );
    }
}
