//! Segment trie mapping request paths to ordered candidate lists.
//!
//! # Responsibilities
//! - Store values under literal/parameter segment paths
//! - Resolve concrete request paths, literal first with backtracking
//! - Shrink per-node value lists on removal
//!
//! # Design Decisions
//! - Nodes are append-only: removal never unlinks a node, so a reader that
//!   reached a node can keep walking it
//! - Children are published fully built (`DashMap` entry / `OnceLock`)
//! - Value lists are copy-on-write behind `ArcSwap`; readers iterate a stable
//!   snapshot while writers swap in a new list
//! - A node has at most one parameter child; the parameter name is not part
//!   of the key

use std::fmt;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::routing::path::{PathSegment, RoutePath};

struct Node<V> {
    literals: DashMap<String, Arc<Node<V>>>,
    param: OnceLock<Arc<Node<V>>>,
    values: ArcSwap<Vec<V>>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self {
            literals: DashMap::new(),
            param: OnceLock::new(),
            values: ArcSwap::from_pointee(Vec::new()),
        }
    }

    fn literal(&self, key: &str) -> Option<Arc<Node<V>>> {
        self.literals.get(key).map(|child| Arc::clone(child.value()))
    }

    fn child(&self, segment: &PathSegment) -> Option<Arc<Node<V>>> {
        match segment {
            PathSegment::Literal(text) => self.literal(text),
            PathSegment::Param(_) => self.param.get().cloned(),
        }
    }

    fn child_or_insert(&self, segment: &PathSegment) -> Arc<Node<V>> {
        match segment {
            PathSegment::Param(_) => Arc::clone(self.param.get_or_init(|| Arc::new(Node::new()))),
            PathSegment::Literal(text) => {
                if let Some(existing) = self.literal(text) {
                    return existing;
                }
                Arc::clone(
                    self.literals
                        .entry(text.clone())
                        .or_insert_with(|| Arc::new(Node::new()))
                        .value(),
                )
            }
        }
    }

    fn has_values(&self) -> bool {
        !self.values.load().is_empty()
    }

    fn sorted_literals(&self) -> Vec<(String, Arc<Node<V>>)> {
        let mut children: Vec<_> = self
            .literals
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        children
    }
}

/// A concurrent path trie holding ordered value lists.
pub struct PathTree<V> {
    root: ArcSwap<Node<V>>,
}

impl<V: Clone> PathTree<V> {
    pub fn new() -> Self {
        Self {
            root: ArcSwap::from_pointee(Node::new()),
        }
    }

    /// Store `value` at `path`, either ahead of or after the values already there.
    pub fn insert(&self, path: &RoutePath, value: V, at_front: bool) {
        let root = self.root.load_full();
        let node = path
            .segments()
            .iter()
            .fold(root, |node, segment| node.child_or_insert(segment));

        node.values.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            if at_front {
                next.push(value.clone());
                next.extend(current.iter().cloned());
            } else {
                next.extend(current.iter().cloned());
                next.push(value.clone());
            }
            next
        });
    }

    /// Resolve a concrete request path into its candidate list.
    ///
    /// An empty list means no registered path matched every segment.
    pub fn lookup(&self, segments: &[&str]) -> Arc<Vec<V>> {
        let root = self.root.load_full();
        match Self::resolve(&root, segments) {
            Some(node) => node.values.load_full(),
            None => Arc::new(Vec::new()),
        }
    }

    fn resolve(node: &Arc<Node<V>>, segments: &[&str]) -> Option<Arc<Node<V>>> {
        let Some((head, tail)) = segments.split_first() else {
            return Some(Arc::clone(node));
        };

        let literal = node
            .literal(head)
            .and_then(|child| Self::resolve(&child, tail));
        match literal {
            Some(found) if found.has_values() => Some(found),
            _ => node.param.get().and_then(|child| Self::resolve(child, tail)),
        }
    }

    /// Values stored exactly at a registered pattern (no backtracking).
    pub fn get(&self, path: &RoutePath) -> Arc<Vec<V>> {
        match self.node_at(path) {
            Some(node) => node.values.load_full(),
            None => Arc::new(Vec::new()),
        }
    }

    /// Remove the values at `path` matching `predicate`; returns how many went.
    pub fn remove_where<F>(&self, path: &RoutePath, predicate: F) -> usize
    where
        F: Fn(&V) -> bool,
    {
        let Some(node) = self.node_at(path) else {
            return 0;
        };

        let mut removed = 0;
        node.values.rcu(|current| {
            let kept: Vec<V> = current.iter().filter(|v| !predicate(v)).cloned().collect();
            removed = current.len() - kept.len();
            kept
        });
        removed
    }

    fn node_at(&self, path: &RoutePath) -> Option<Arc<Node<V>>> {
        let mut node = self.root.load_full();
        for segment in path.segments() {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Drop every node and value.
    pub fn clear(&self) {
        self.root.store(Arc::new(Node::new()));
    }

    /// Total number of stored values.
    pub fn len(&self) -> usize {
        fn count<V>(node: &Node<V>) -> usize {
            let own = node.values.load().len();
            let literals: usize = node.literals.iter().map(|c| count(c.value())).sum();
            let param = node.param.get().map_or(0, |c| count(c));
            own + literals + param
        }
        count(&self.root.load())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored values, depth first.
    pub fn entries(&self) -> Vec<V> {
        fn collect<V: Clone>(node: &Node<V>, out: &mut Vec<V>) {
            out.extend(node.values.load().iter().cloned());
            for (_, child) in node.sorted_literals() {
                collect(&child, out);
            }
            if let Some(child) = node.param.get() {
                collect(child, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.root.load(), &mut out);
        out
    }
}

impl<V: Clone> Default for PathTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Display for PathTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render<V>(
            f: &mut fmt::Formatter<'_>,
            key: &str,
            node: &Node<V>,
            depth: usize,
        ) -> fmt::Result {
            let count = node.values.load().len();
            write!(f, "{:indent$}{key}", "", indent = depth * 2)?;
            if count > 0 {
                write!(f, " ({count})")?;
            }
            writeln!(f)?;
            for (child_key, child) in node.sorted_literals() {
                render(f, &child_key, &child, depth + 1)?;
            }
            if let Some(child) = node.param.get() {
                render(f, ":", child, depth + 1)?;
            }
            Ok(())
        }

        render(f, "/", &self.root.load(), 0)
    }
}
