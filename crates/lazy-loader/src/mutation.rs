//! Mutation Watch
//!
//! One subtree-wide child-list observation on `<body>`. Every element added
//! anywhere below it is scanned, rooted at the added element itself, so a
//! marked leaf matches directly and marked descendants of an inserted
//! subtree are found by the subtree search.

use crate::{Discovery, ElementHost, LoaderError, MutationHost};
use lazy_dom::{MutationObserverInit, MutationRecord, MutationType, NodeId, ObserverId};

/// Mutation Watch
#[derive(Debug)]
pub struct MutationWatch {
    observer: ObserverId,
    target: NodeId,
}

impl MutationWatch {
    /// Start observing `<body>` (or the document node when there is no
    /// body) for child-list changes at any depth
    pub fn arm<H: ElementHost + MutationHost>(host: &mut H) -> Result<Self, LoaderError> {
        let target = match host.body() {
            Some(body) => body,
            None => {
                tracing::debug!("Document has no body, watching the document node");
                host.document_node()
            }
        };

        let observer = host.create_mutation_observer();
        host.observe_mutations(
            observer,
            target,
            MutationObserverInit {
                child_list: true,
                subtree: true,
                ..Default::default()
            },
        )?;
        tracing::debug!("Mutation watch armed on {:?} with observer {}", target, observer);

        Ok(Self { observer, target })
    }

    pub fn observer(&self) -> ObserverId {
        self.observer
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Marked elements introduced by a batch of records, in record order.
    /// Added text and comment nodes are ignored.
    pub fn discover<H: ElementHost + ?Sized>(
        &self,
        host: &H,
        discovery: &Discovery,
        records: &[MutationRecord],
    ) -> Vec<NodeId> {
        records
            .iter()
            .filter(|r| r.mutation_type == MutationType::ChildList)
            .flat_map(|r| r.added_nodes.iter().copied())
            .filter(|&node| host.is_element(node))
            .flat_map(|node| discovery.find_marked(host, node))
            .collect()
    }
}
