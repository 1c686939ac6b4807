//! Arena-backed dependency graph.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::error::ConfigurationError;
use crate::model::{PredicateKind, base_name};

/// Order value of a node the scheduler has not ranked yet.
pub const UNMARKED_ORDER: i32 = -1;

/// Index of a node inside a [`DependencyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredicateId(usize);

impl PredicateId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct DependencyNode {
    name: String,
    kind: PredicateKind,
    parents: Vec<PredicateId>,
    order: i32,
}

impl DependencyNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PredicateKind {
        self.kind
    }

    pub fn parents(&self) -> &[PredicateId] {
        &self.parents
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn is_marked(&self) -> bool {
        self.order != UNMARKED_ORDER
    }
}

/// Relational dependency network: each predicate points at the predicates its
/// conditional model reads. Cycles are allowed.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    index: HashMap<String, PredicateId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` with the given kind, or updates the kind if it already exists.
    pub fn add_predicate(&mut self, name: &str, kind: PredicateKind) -> PredicateId {
        let name = base_name(name);
        if let Some(&id) = self.index.get(name) {
            self.nodes[id.0].kind = kind;
            return id;
        }
        let id = PredicateId(self.nodes.len());
        self.nodes.push(DependencyNode {
            name: name.to_string(),
            kind,
            parents: Vec::new(),
            order: UNMARKED_ORDER,
        });
        self.index.insert(name.to_string(), id);
        id
    }

    /// Records that `child`'s model depends on `parent`. Unknown parents are added as
    /// evidence predicates.
    pub fn add_dependency(&mut self, child: &str, parent: &str) -> Result<(), ConfigurationError> {
        let child_id = self.require(child)?;
        let parent_id = match self.id(parent) {
            Some(id) => id,
            None => self.add_predicate(parent, PredicateKind::Evidence),
        };
        let parents = &mut self.nodes[child_id.0].parents;
        if !parents.contains(&parent_id) {
            parents.push(parent_id);
        }
        Ok(())
    }

    pub fn id(&self, name: &str) -> Option<PredicateId> {
        self.index.get(base_name(name)).copied()
    }

    fn require(&self, name: &str) -> Result<PredicateId, ConfigurationError> {
        self.id(name)
            .ok_or_else(|| ConfigurationError::UnknownPredicate {
                predicate: name.to_string(),
            })
    }

    pub fn node(&self, id: PredicateId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (PredicateId, &DependencyNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (PredicateId(idx), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct parents of `name` that are query predicates.
    pub fn query_parents(&self, name: &str) -> Result<Vec<PredicateId>, ConfigurationError> {
        let id = self.require(name)?;
        Ok(self.nodes[id.0]
            .parents
            .iter()
            .copied()
            .filter(|parent| self.nodes[parent.0].kind == PredicateKind::Query)
            .collect())
    }

    pub fn has_query_parents(&self, name: &str) -> Result<bool, ConfigurationError> {
        Ok(!self.query_parents(name)?.is_empty())
    }

    /// All transitive ancestors of `name` with the given kind, in breadth-first order.
    pub fn ancestors_of_type(
        &self,
        name: &str,
        kind: PredicateKind,
    ) -> Result<Vec<PredicateId>, ConfigurationError> {
        let start = self.require(name)?;
        let mut seen = BTreeSet::from([start]);
        let mut queue: VecDeque<PredicateId> = self.nodes[start.0].parents.iter().copied().collect();
        let mut found = Vec::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let node = &self.nodes[id.0];
            if node.kind == kind {
                found.push(id);
            }
            queue.extend(node.parents.iter().copied());
        }
        Ok(found)
    }

    pub fn order(&self, name: &str) -> Result<i32, ConfigurationError> {
        Ok(self.nodes[self.require(name)?.0].order)
    }

    pub fn set_order(&mut self, name: &str, order: i32) -> Result<(), ConfigurationError> {
        let id = self.require(name)?;
        self.nodes[id.0].order = order;
        Ok(())
    }

    /// Returns every node to [`UNMARKED_ORDER`].
    pub fn reset_order(&mut self) {
        for node in &mut self.nodes {
            node.order = UNMARKED_ORDER;
        }
    }
}
