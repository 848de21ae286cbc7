//! Candidate collection and ranking
//!
//! Nodes reported during the discovery window are collected here, enriched
//! with their signal strength and catalog entry, then ranked strongest first.

use std::cmp::Reverse;

use plejd_core::{Catalog, CatalogDevice, LinkAddress, Result as CoreResult};
use tracing::debug;
use uuid::Uuid;

use crate::gatt::{NodeId, NodeInfo};

// ----------------------------------------------------------------------------
// Candidate
// ----------------------------------------------------------------------------

/// A mesh node seen during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub node: NodeId,
    pub rssi: Option<i16>,
    pub address: Option<String>,
    pub device: Option<CatalogDevice>,
    /// Set once the node's properties were read successfully
    pub inspected: bool,
}

impl Candidate {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            rssi: None,
            address: None,
            device: None,
            inspected: false,
        }
    }

    /// Attach the node's properties and look it up in the catalog by serial
    pub fn enrich(&mut self, info: NodeInfo, catalog: &Catalog) {
        self.rssi = info.rssi;
        self.address = info.address;
        self.inspected = true;
        self.device = catalog.find_by_serial(self.platform_address()).cloned();
    }

    /// Address the keystream is derived from
    pub fn link_address(&self) -> CoreResult<LinkAddress> {
        LinkAddress::from_platform_address(self.platform_address())
    }

    fn platform_address(&self) -> &str {
        self.address.as_deref().unwrap_or_else(|| self.node.as_str())
    }
}

// ----------------------------------------------------------------------------
// Candidate Set
// ----------------------------------------------------------------------------

/// Nodes collected during one discovery window
#[derive(Debug, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a discovered node if it advertises `service`.
    /// Returns true when the node was not seen before in this window.
    pub fn observe(&mut self, node: NodeId, services: &[Uuid], service: Uuid) -> bool {
        if !services.contains(&service) {
            return false;
        }
        if self.candidates.iter().any(|c| c.node == node) {
            return false;
        }
        debug!("Found mesh node {}", node);
        self.candidates.push(Candidate::new(node));
        true
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
    }

    /// Hand the collected candidates over, leaving the set empty
    pub fn take(&mut self) -> Vec<Candidate> {
        std::mem::take(&mut self.candidates)
    }
}

/// Order inspected candidates by signal strength, strongest first.
///
/// Candidates that could not be inspected are dropped. Ties keep discovery
/// order. Nodes without an RSSI reading go last.
pub fn rank(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = candidates.into_iter().filter(|c| c.inspected).collect();
    ranked.sort_by_key(|c| (c.rssi.is_none(), Reverse(c.rssi)));
    ranked
}
