//! Directory binding snapshot

use serde::Serialize;
use std::collections::BTreeSet;

/// Join state of the host
///
/// `bound == false` implies every other field is `None`. A `Some(vec![])`
/// search node list means the key exists but is empty, which is different
/// from the key being absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryStatus {
    pub bound: bool,
    pub domain: Option<String>,
    pub search_nodes: Option<Vec<String>>,
    pub realms: Option<BTreeSet<String>>,
}

impl DirectoryStatus {
    pub fn unbound() -> Self {
        DirectoryStatus {
            bound: false,
            domain: None,
            search_nodes: None,
            realms: None,
        }
    }
}
