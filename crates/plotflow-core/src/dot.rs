//! Graphviz DOT export of a verified graph.
//!
//! This is the renderer shipped with the crate. It emits plain DOT text and
//! leaves coordinate assignment to Graphviz (`dot -Tpng`), so the only layout
//! decision made here is the rank direction.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::graph::VerifiedGraph;

/// Direction in which dependencies flow in the rendered graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Top to bottom.
    #[default]
    Vertical,
    /// Left to right.
    Horizontal,
}

impl Orientation {
    fn rankdir(self) -> &'static str {
        match self {
            Orientation::Vertical => "TB",
            Orientation::Horizontal => "LR",
        }
    }
}

/// Rendering options for [`to_dot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotOptions {
    pub orientation: Orientation,
    /// Graph caption. Omitted when empty.
    pub title: String,
    pub node_color: String,
    pub font_size: u32,
    pub node_shape: String,
}

impl Default for DotOptions {
    fn default() -> Self {
        DotOptions {
            orientation: Orientation::Vertical,
            title: "Pipeline Flow".to_string(),
            node_color: "#cceeff".to_string(),
            font_size: 10,
            node_shape: "box".to_string(),
        }
    }
}

/// Renders `graph` as a DOT `digraph`.
///
/// Nodes are emitted in ascending id order and edges in ascending
/// `(source, target)` order, so the output is stable for a given graph.
pub fn to_dot(graph: &VerifiedGraph, options: &DotOptions) -> String {
    let mut out = String::new();
    // fmt::Write for String is infallible.
    let _ = write_dot(&mut out, graph, options);
    out
}

fn write_dot(out: &mut String, graph: &VerifiedGraph, options: &DotOptions) -> std::fmt::Result {
    writeln!(out, "digraph pipeline {{")?;
    write!(out, "    graph [rankdir={}", options.orientation.rankdir())?;
    if !options.title.is_empty() {
        write!(
            out,
            ", label=\"{}\", labelloc=t, fontsize={}",
            escape(&options.title),
            options.font_size.saturating_add(6)
        )?;
    }
    writeln!(out, "];")?;
    writeln!(
        out,
        "    node [shape={}, style=filled, fillcolor=\"{}\", fontsize={}];",
        escape(&options.node_shape),
        escape(&options.node_color),
        options.font_size
    )?;
    writeln!(out, "    edge [color=gray];")?;

    for node in graph.nodes() {
        writeln!(out, "    {} [label=\"{}\"];", node.id, escape(&node.label))?;
    }
    for edge in graph.edges() {
        writeln!(out, "    {} -> {};", edge.source, edge.target)?;
    }
    writeln!(out, "}}")
}

/// Escapes a DOT double-quoted string.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}
