// src/snapshots/ordering.rs

//! Ordering snapper configs by mount hierarchy
//!
//! Snapshots of nested subvolumes must be processed parents-first so a
//! child mountpoint is always layered over its container. Configs are
//! inserted into a forest by path containment and flattened breadth-first;
//! siblings sort by their `"{mountpoint}_{name}"` key.

use crate::snapshots::SnapperConfigInfo;
use std::collections::VecDeque;

pub fn sort_snapper_configs(configs: &[SnapperConfigInfo]) -> Vec<String> {
    let roots = calculate_roots(configs);
    breadth_first(roots)
}

struct Node {
    config: SnapperConfigInfo,
    children: Vec<Node>,
}

impl Node {
    fn new(config: SnapperConfigInfo) -> Self {
        Self {
            config,
            children: Vec::new(),
        }
    }

    fn sort_key(&self) -> String {
        format!("{}_{}", self.config.mountpoint.display(), self.config.name)
    }

    /// Try to place `node` somewhere under this node. Returns the node back
    /// when its mountpoint is not contained by this one.
    fn insert(&mut self, node: Node) -> Option<Node> {
        if !node.config.mountpoint.starts_with(&self.config.mountpoint) {
            return Some(node);
        }
        let mut node = node;
        for child in &mut self.children {
            node = match child.insert(node) {
                None => return None,
                Some(rejected) => rejected,
            };
        }
        // The node becomes a direct child and may absorb existing children
        // whose mountpoints it contains
        let mut kept = Vec::new();
        for child in self.children.drain(..) {
            if let Some(rejected) = node.insert(child) {
                kept.push(rejected);
            }
        }
        kept.push(node);
        kept.sort_by_key(Node::sort_key);
        self.children = kept;
        None
    }
}

fn calculate_roots(configs: &[SnapperConfigInfo]) -> Vec<Node> {
    let mut roots: Vec<Node> = Vec::new();
    for config in configs {
        let mut node = Some(Node::new(config.clone()));
        let mut placed = false;
        for root in &mut roots {
            match root.insert(node.take().unwrap()) {
                None => {
                    placed = true;
                    break;
                }
                Some(rejected) => node = Some(rejected),
            };
        }
        if !placed {
            // New root; it may absorb existing roots it contains
            let mut node = node.unwrap();
            let mut kept = Vec::new();
            for root in roots.drain(..) {
                if let Some(rejected) = node.insert(root) {
                    kept.push(rejected);
                }
            }
            kept.push(node);
            roots = kept;
        }
    }
    roots.sort_by_key(Node::sort_key);
    roots
}

fn breadth_first(roots: Vec<Node>) -> Vec<String> {
    let mut queue: VecDeque<Node> = roots.into();
    let mut names = Vec::new();
    while let Some(node) = queue.pop_front() {
        names.push(node.config.name);
        queue.extend(node.children);
    }
    names
}
