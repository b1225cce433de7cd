// tests/node_partition.rs
//
// Fleet ownership: every registered source maps to exactly one node, nodes
// agree without coordinating, and the pipeline scrapes only what it owns.

use std::collections::HashSet;
use std::sync::Arc;

use newswire::assign::{partition_point, NodeAssigner};
use newswire::config::default_sources;
use newswire::ingest::sources::SourceRegistry;
use newswire::ingest::Pipeline;
use newswire::live::Broadcaster;
use newswire::store::ArticleStore;

#[test]
fn stock_sources_split_deterministically_across_two_nodes() {
    // wire-contract values; a change here strands article ownership
    assert_eq!(partition_point("bbc_news") % 2, 0);
    assert_eq!(partition_point("cnn_news") % 2, 1);

    let node0 = NodeAssigner::new(2, 0).expect("node 0");
    let node1 = NodeAssigner::new(2, 1).expect("node 1");

    assert!(node0.owns("bbc_news"));
    assert!(!node0.owns("cnn_news"));
    assert!(node1.owns("cnn_news"));
    assert!(!node1.owns("bbc_news"));
}

#[test]
fn every_source_has_exactly_one_owner_for_any_fleet_size() {
    let ids: Vec<String> = default_sources().iter().map(|s| s.id.clone()).collect();

    for count in 1..=5u32 {
        for id in &ids {
            let owners = (0..count)
                .filter(|&index| {
                    NodeAssigner::new(count, index)
                        .expect("assigner")
                        .owns(id)
                })
                .count();
            assert_eq!(owners, 1, "source {id} with {count} nodes");
        }
    }
}

fn pipeline_for(index: u32) -> Pipeline {
    let registry = Arc::new(SourceRegistry::from_configs(&default_sources()).expect("registry"));
    let assigner = NodeAssigner::new(2, index).expect("assigner");
    Pipeline::new(
        registry,
        assigner,
        Arc::new(ArticleStore::new()),
        Arc::new(Broadcaster::new(8)),
    )
}

#[test]
fn pipelines_on_different_nodes_partition_the_registry() {
    let owned0: HashSet<String> = pipeline_for(0).owned_sources().into_iter().collect();
    let owned1: HashSet<String> = pipeline_for(1).owned_sources().into_iter().collect();

    assert!(owned0.is_disjoint(&owned1));

    let mut union: Vec<String> = owned0.union(&owned1).cloned().collect();
    union.sort();
    let mut all: Vec<String> = default_sources().iter().map(|s| s.id.clone()).collect();
    all.sort();
    assert_eq!(union, all);
}
