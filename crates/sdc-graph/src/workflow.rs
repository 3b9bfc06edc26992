//! Workflow: nodes, typed edges, build-time literals and boundary ports.
//!
//! Every edge and literal is checked when it is added, so an invalid wiring
//! fails at the line that introduced it. [`Workflow::validate`] adds the
//! whole-graph checks that can only run once wiring is complete.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::literal::Literal;
use crate::node::{Node, NodeKind};
use crate::port::PortSpec;

/// Name of the node exposing the workflow inputs.
pub const INPUT_NODE: &str = "inputnode";
/// Name of the node collecting the workflow outputs.
pub const OUTPUT_NODE: &str = "outputnode";

/// A typed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src: String,
    pub src_port: String,
    pub dst: String,
    pub dst_port: String,
}

/// A constant bound to an input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralBinding {
    pub node: String,
    pub port: String,
    pub value: Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cardinality {
    Single,
    List(Option<usize>),
}

/// A static computation graph with input and output boundary nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    literals: Vec<LiteralBinding>,
}

impl Workflow {
    /// Create a workflow whose boundary nodes expose `inputs` and `outputs`.
    pub fn new(name: impl Into<String>, inputs: Vec<PortSpec>, outputs: Vec<PortSpec>) -> Self {
        Self {
            name: name.into(),
            nodes: vec![
                Node::new(INPUT_NODE, NodeKind::Boundary { ports: inputs }),
                Node::new(OUTPUT_NODE, NodeKind::Boundary { ports: outputs }),
            ],
            edges: Vec::new(),
            literals: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn literals(&self) -> &[LiteralBinding] {
        &self.literals
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    /// Ports the caller must supply.
    pub fn input_ports(&self) -> Vec<PortSpec> {
        self.node(INPUT_NODE).map(|n| n.kind.inputs()).unwrap_or_default()
    }

    /// Ports the workflow produces.
    pub fn output_ports(&self) -> Vec<PortSpec> {
        self.node(OUTPUT_NODE).map(|n| n.kind.outputs()).unwrap_or_default()
    }

    /// Add a node. Names are unique within a workflow.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.contains(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        if let Some(fan_out) = &node.fan_out {
            let invalid = |reason: String| GraphError::InvalidFanOut {
                node: node.name.clone(),
                reason,
            };
            if fan_out.width == 0 {
                return Err(invalid("width must be at least 1".into()));
            }
            if fan_out.iterfields.is_empty() {
                return Err(invalid("no iteration fields".into()));
            }
            for field in &fan_out.iterfields {
                if node.input(field).is_none() {
                    return Err(invalid(format!("{field} is not an input port")));
                }
            }
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Connect `src.src_port` to `dst.dst_port`.
    pub fn connect(&mut self, src: &str, src_port: &str, dst: &str, dst_port: &str) -> Result<()> {
        let src_node = self.node(src).ok_or_else(|| GraphError::UnknownNode(src.to_string()))?;
        let dst_node = self.node(dst).ok_or_else(|| GraphError::UnknownNode(dst.to_string()))?;
        let src_spec = src_node
            .output(src_port)
            .ok_or_else(|| GraphError::unknown_output(src, src_port))?;
        let dst_spec = dst_node
            .input(dst_port)
            .ok_or_else(|| GraphError::unknown_input(dst, dst_port))?;

        if !dst_spec.ty.accepts(src_spec.ty) {
            return Err(GraphError::IncompatiblePorts {
                src: format!("{src}.{src_port}"),
                src_ty: src_spec.ty,
                dst: format!("{dst}.{dst_port}"),
                dst_ty: dst_spec.ty,
            });
        }

        let cardinality = Self::cardinality(src_node, &src_spec);
        if let Some(width) = dst_node.width().filter(|_| dst_node.is_iterfield(dst_port)) {
            let actual = match cardinality {
                Cardinality::Single => Some(1),
                Cardinality::List(n) => n,
            };
            if let Some(actual) = actual.filter(|&n| n != width) {
                return Err(GraphError::FanOutWidthMismatch {
                    node: dst.to_string(),
                    port: dst_port.to_string(),
                    expected: width,
                    actual,
                });
            }
        } else if !dst_spec.collection && cardinality != Cardinality::Single {
            return Err(GraphError::CardinalityMismatch {
                src: format!("{src}.{src_port}"),
                dst: format!("{dst}.{dst_port}"),
            });
        }

        if !dst_spec.collection && self.feed_count(dst, dst_port) > 0 {
            return Err(GraphError::already_connected(dst, dst_port));
        }
        if src == dst || self.has_path(dst, src) {
            return Err(GraphError::Cycle(vec![src.to_string(), dst.to_string()]));
        }

        self.edges.push(Edge {
            src: src.to_string(),
            src_port: src_port.to_string(),
            dst: dst.to_string(),
            dst_port: dst_port.to_string(),
        });
        Ok(())
    }

    /// Connect several port pairs between the same two nodes.
    pub fn connect_all(&mut self, src: &str, dst: &str, ports: &[(&str, &str)]) -> Result<()> {
        for (src_port, dst_port) in ports {
            self.connect(src, src_port, dst, dst_port)?;
        }
        Ok(())
    }

    /// Bind a build-time constant to an input port.
    pub fn set_input(&mut self, node: &str, port: &str, value: impl Into<Literal>) -> Result<()> {
        let value = value.into();
        let target = self.node(node).ok_or_else(|| GraphError::UnknownNode(node.to_string()))?;
        let spec = target.input(port).ok_or_else(|| GraphError::unknown_input(node, port))?;

        if !spec.ty.accepts(value.port_type()) {
            return Err(GraphError::IncompatiblePorts {
                src: "literal".to_string(),
                src_ty: value.port_type(),
                dst: format!("{node}.{port}"),
                dst_ty: spec.ty,
            });
        }

        if let Some(width) = target.width().filter(|_| target.is_iterfield(port)) {
            let actual = value.list_len().unwrap_or(1);
            if value.list_len() != Some(width) {
                return Err(GraphError::LiteralWidthMismatch {
                    node: node.to_string(),
                    port: port.to_string(),
                    expected: width,
                    actual,
                });
            }
        } else if !spec.collection && value.list_len().is_some() {
            return Err(GraphError::CardinalityMismatch {
                src: "literal".to_string(),
                dst: format!("{node}.{port}"),
            });
        }

        if !spec.collection && self.feed_count(node, port) > 0 {
            return Err(GraphError::already_connected(node, port));
        }

        self.literals.push(LiteralBinding {
            node: node.to_string(),
            port: port.to_string(),
            value,
        });
        Ok(())
    }

    /// Edges feeding `node.port`, in connection order.
    pub fn edges_into<'a>(&'a self, node: &'a str, port: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.dst == node && e.dst_port == port)
    }

    /// Literal bound to `node.port`, if any.
    pub fn literal(&self, node: &str, port: &str) -> Option<&Literal> {
        self.literals
            .iter()
            .find(|l| l.node == node && l.port == port)
            .map(|l| &l.value)
    }

    /// Whole-graph checks: every required input fed (exactly once unless it
    /// is a collection) and no cycle.
    pub fn validate(&self) -> Result<()> {
        for node in self.nodes.iter().filter(|n| n.name != INPUT_NODE) {
            for spec in node.kind.inputs() {
                let fed = self.feed_count(&node.name, &spec.name);
                if spec.required && fed == 0 {
                    return Err(GraphError::Unfed {
                        node: node.name.clone(),
                        port: spec.name,
                    });
                }
                if !spec.collection && fed > 1 {
                    return Err(GraphError::already_connected(&node.name, &spec.name));
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Nodes in dependency order.
    ///
    /// Kahn's algorithm, seeded and expanded in insertion order, so the order
    /// is the same for the same build.
    pub fn topological_order(&self) -> Result<Vec<&Node>> {
        let index: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            let (Some(&s), Some(&d)) = (index.get(edge.src.as_str()), index.get(edge.dst.as_str())) else {
                return Err(GraphError::UnknownNode(format!("{} -> {}", edge.src, edge.dst)));
            };
            successors[s].push(d);
            in_degree[d] += 1;
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(i) = queue.pop_front() {
            order.push(&self.nodes[i]);
            for &d in &successors[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    queue.push_back(d);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let remaining = (0..self.nodes.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].name.clone())
                .collect();
            return Err(GraphError::Cycle(remaining));
        }
        Ok(order)
    }

    /// Graphviz rendering, one box per node and one labeled arrow per edge.
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", self.name);
        let _ = writeln!(dot, "  rankdir=LR;");
        for node in &self.nodes {
            let shape = if node.fan_out.is_some() { "box3d" } else { "box" };
            let _ = writeln!(
                dot,
                "  \"{}\" [shape={shape}, label=\"{}\\n{}\"];",
                node.name,
                node.name,
                node.kind.label()
            );
        }
        for edge in &self.edges {
            let _ = writeln!(
                dot,
                "  \"{}\" -> \"{}\" [label=\"{} -> {}\"];",
                edge.src, edge.dst, edge.src_port, edge.dst_port
            );
        }
        dot.push_str("}\n");
        dot
    }

    /// JSON description for an external execution engine.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn feed_count(&self, node: &str, port: &str) -> usize {
        self.edges_into(node, port).count()
            + self
                .literals
                .iter()
                .filter(|l| l.node == node && l.port == port)
                .count()
    }

    fn cardinality(node: &Node, spec: &PortSpec) -> Cardinality {
        match node.width() {
            Some(width) => Cardinality::List(Some(width)),
            None if spec.collection => Cardinality::List(None),
            None => Cardinality::Single,
        }
    }

    /// Whether `to` is reachable from `from` along existing edges.
    fn has_path(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            stack.extend(self.edges.iter().filter(|e| e.src == current).map(|e| e.dst.as_str()));
        }
        false
    }
}
