//! Graphviz rendering of a dependency network.

use std::io::{self, Write};

use crate::model::PredicateKind;

use super::graph::DependencyGraph;

/// Writes `graph` in DOT format. Query predicates are boxes labelled with their sampling
/// order once the scheduler has ranked them.
pub fn write_dot<W: Write>(graph: &DependencyGraph, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "digraph RDN {{")?;
    for (id, node) in graph.nodes() {
        let shape = match node.kind() {
            PredicateKind::Query => "box",
            PredicateKind::Evidence => "ellipse",
            PredicateKind::Computed => "diamond",
        };
        let label = if node.is_marked() {
            format!("{} [{}]", node.name(), node.order())
        } else {
            node.name().to_string()
        };
        writeln!(
            writer,
            "  n{} [label=\"{}\", shape={}];",
            id.index(),
            label.replace('"', "\\\""),
            shape
        )?;
    }
    for (id, node) in graph.nodes() {
        for parent in node.parents() {
            writeln!(writer, "  n{} -> n{};", parent.index(), id.index())?;
        }
    }
    writeln!(writer, "}}")
}
