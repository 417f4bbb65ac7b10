use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{Context, Result, bail};

use crate::dsl::ShaderGraphDSL;
use crate::nodes::NodeKind;

pub type NodeIndex = usize;

/// A produced value: one named output pin of one node. This is the unit of memoization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputPin {
    pub node: NodeIndex,
    pub pin: String,
}

impl OutputPin {
    pub fn new(node: NodeIndex, pin: impl Into<String>) -> Self {
        Self {
            node,
            pin: pin.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub index: NodeIndex,
    pub id: String,
    pub type_name: String,
    pub kind: NodeKind,
    pub comment: Option<String>,
}

impl GraphNode {
    pub fn output(&self, pin: &str) -> OutputPin {
        OutputPin::new(self.index, pin)
    }
}

/// Resolved, read-only view of a shader graph. The generator never mutates it.
#[derive(Debug, Clone)]
pub struct ShaderGraph {
    pub name: String,
    nodes: Vec<GraphNode>,
    index_by_id: HashMap<String, NodeIndex>,
    // Connected input pins per node, in connection order.
    inputs: Vec<Vec<(String, OutputPin)>>,
}

impl ShaderGraph {
    pub fn from_dsl(dsl: &ShaderGraphDSL) -> Result<Self> {
        let mut nodes = Vec::with_capacity(dsl.nodes.len());
        let mut index_by_id = HashMap::new();
        for (index, n) in dsl.nodes.iter().enumerate() {
            if index_by_id.insert(n.id.clone(), index).is_some() {
                bail!("duplicate node id: {}", n.id);
            }
            nodes.push(GraphNode {
                index,
                id: n.id.clone(),
                type_name: n.node_type.clone(),
                kind: n.kind()?,
                comment: n.comment.clone().filter(|c| !c.trim().is_empty()),
            });
        }
        topo_sort(dsl).context("shader graph must be acyclic")?;

        let mut inputs: Vec<Vec<(String, OutputPin)>> = vec![Vec::new(); nodes.len()];
        for c in &dsl.connections {
            let (Some(&from), Some(&to)) = (
                index_by_id.get(c.from.node_id.as_str()),
                index_by_id.get(c.to.node_id.as_str()),
            ) else {
                bail!(
                    "connection references missing node: {} -> {}",
                    c.from.node_id,
                    c.to.node_id
                );
            };
            if inputs[to].iter().any(|(pin, _)| pin == &c.to.port_id) {
                bail!(
                    "input {}.{} has more than one incoming connection",
                    c.to.node_id,
                    c.to.port_id
                );
            }
            inputs[to].push((c.to.port_id.clone(), OutputPin::new(from, c.from.port_id.clone())));
        }

        Ok(Self {
            name: dsl.metadata.name.clone(),
            nodes,
            index_by_id,
            inputs,
        })
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> &GraphNode {
        &self.nodes[index]
    }

    pub fn find(&self, id: &str) -> Option<&GraphNode> {
        self.index_by_id.get(id).map(|&i| &self.nodes[i])
    }

    /// The output pin feeding `node.pin`, if connected.
    pub fn source(&self, node: NodeIndex, pin: &str) -> Option<&OutputPin> {
        self.inputs[node]
            .iter()
            .find(|(name, _)| name == pin)
            .map(|(_, source)| source)
    }

    pub fn connected_inputs(&self, node: NodeIndex) -> &[(String, OutputPin)] {
        &self.inputs[node]
    }

    /// Indices of nodes matching `pred`, in declaration order.
    pub fn nodes_where(&self, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .filter(|n| pred(&n.kind))
            .map(|n| n.index)
            .collect()
    }

    /// Every output pin reachable upstream of `node.pin`, nearest first.
    pub fn upstream_outputs(&self, node: NodeIndex, pin: &str) -> Vec<OutputPin> {
        let Some(start) = self.source(node, pin) else {
            return Vec::new();
        };

        let mut order: Vec<OutputPin> = Vec::new();
        let mut seen_pins: HashSet<OutputPin> = HashSet::new();
        let mut expanded: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<OutputPin> = VecDeque::from([start.clone()]);
        while let Some(p) = queue.pop_front() {
            if !seen_pins.insert(p.clone()) {
                continue;
            }
            let n = p.node;
            order.push(p);
            if expanded.insert(n) {
                for (_, source) in &self.inputs[n] {
                    queue.push_back(source.clone());
                }
            }
        }
        order
    }

    /// Output pins reachable from every one of `pins` on `node`.
    pub fn find_common_outputs(&self, node: NodeIndex, pins: &[&str]) -> Vec<OutputPin> {
        let Some((first, rest)) = pins.split_first() else {
            return Vec::new();
        };
        let others: Vec<HashSet<OutputPin>> = rest
            .iter()
            .map(|p| self.upstream_outputs(node, p).into_iter().collect())
            .collect();
        if others.is_empty() {
            return Vec::new();
        }
        self.upstream_outputs(node, first)
            .into_iter()
            .filter(|p| others.iter().all(|set| set.contains(p)))
            .collect()
    }

    /// Output pins upstream of `node.pin` which do not depend on any of `dependent`.
    pub fn find_non_dependent_outputs(
        &self,
        node: NodeIndex,
        pin: &str,
        dependent: &[OutputPin],
    ) -> Vec<OutputPin> {
        let mut memo: HashMap<NodeIndex, bool> = HashMap::new();
        self.upstream_outputs(node, pin)
            .into_iter()
            .filter(|p| {
                p.node != node && !dependent.contains(p) && !self.depends_on(p.node, dependent, &mut memo)
            })
            .collect()
    }

    fn depends_on(
        &self,
        node: NodeIndex,
        dependent: &[OutputPin],
        memo: &mut HashMap<NodeIndex, bool>,
    ) -> bool {
        if let Some(&d) = memo.get(&node) {
            return d;
        }
        // Loop feedback makes the graph cyclic at node level; in-progress nodes count as independent.
        memo.insert(node, false);
        let d = self.inputs[node]
            .iter()
            .any(|(_, source)| dependent.contains(source) || self.depends_on(source.node, dependent, memo));
        memo.insert(node, d);
        d
    }
}

/// Loop nodes evaluate these pins once their own outputs are bound, so edges into
/// them may close a cycle through the loop node.
pub fn is_loop_body_input(node_type: &str, port: &str) -> bool {
    matches!(node_type, "Iterate" | "Iterate2" | "Iterate2d" | "Repeat" | "Sum")
        && matches!(
            port,
            "Input" | "Input0" | "Input1" | "Input2" | "Input3" | "Condition"
        )
}

pub fn topo_sort(graph: &ShaderGraphDSL) -> Result<Vec<String>> {
    let mut indeg: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), 0usize))
        .collect();

    let types: HashMap<&str, &str> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.node_type.as_str()))
        .collect();

    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for c in &graph.connections {
        if !indeg.contains_key(c.from.node_id.as_str()) {
            bail!(
                "connection references missing node: {} -> {}",
                c.from.node_id,
                c.to.node_id
            );
        }
        let Some(d) = indeg.get_mut(c.to.node_id.as_str()) else {
            bail!(
                "connection references missing node: {} -> {}",
                c.from.node_id,
                c.to.node_id
            );
        };
        if types
            .get(c.to.node_id.as_str())
            .is_some_and(|t| is_loop_body_input(t, &c.to.port_id))
        {
            continue;
        }
        *d += 1;
        outgoing
            .entry(c.from.node_id.as_str())
            .or_default()
            .push(c.to.node_id.as_str());
    }

    // Seed in declaration order so the result is stable.
    let mut q: VecDeque<&str> = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| indeg.get(id) == Some(&0))
        .collect();
    let mut order: Vec<String> = Vec::with_capacity(graph.nodes.len());

    while let Some(n) = q.pop_front() {
        order.push(n.to_string());
        if let Some(nexts) = outgoing.get(n) {
            for m in nexts {
                if let Some(entry) = indeg.get_mut(m) {
                    *entry -= 1;
                    if *entry == 0 {
                        q.push_back(m);
                    }
                }
            }
        }
    }

    if order.len() != graph.nodes.len() {
        bail!("cycle detected in graph (cannot topologically sort)");
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::node_emitter::test_utils::{node, test_connection, test_graph_dsl};
    use serde_json::json;

    fn diamond() -> ShaderGraph {
        // s -> a, s -> b, a -> c.Input1, b -> c.Input2
        let dsl = test_graph_dsl(
            vec![
                node("s", "Scalar", json!({ "value": 1.0 })),
                node("a", "Abs", json!({})),
                node("b", "Neg", json!({})),
                node("c", "Add", json!({})),
            ],
            vec![
                test_connection("s", "Output", "a", "Input"),
                test_connection("s", "Output", "b", "Input"),
                test_connection("a", "Output", "c", "Input1"),
                test_connection("b", "Output", "c", "Input2"),
            ],
        );
        ShaderGraph::from_dsl(&dsl).unwrap()
    }

    #[test]
    fn source_resolves_connected_pin() {
        let g = diamond();
        let c = g.find("c").unwrap().index;
        let a = g.find("a").unwrap().index;
        assert_eq!(g.source(c, "Input1"), Some(&OutputPin::new(a, "Output")));
        assert_eq!(g.source(c, "Input3"), None);
    }

    #[test]
    fn common_outputs_are_shared_ancestors() {
        let g = diamond();
        let c = g.find("c").unwrap().index;
        let s = g.find("s").unwrap().index;
        assert_eq!(
            g.find_common_outputs(c, &["Input1", "Input2"]),
            vec![OutputPin::new(s, "Output")]
        );
    }

    #[test]
    fn non_dependent_outputs_exclude_dependents() {
        let g = diamond();
        let c = g.find("c").unwrap().index;
        let s = g.find("s").unwrap().index;
        let a = g.find("a").unwrap().index;
        let free = g.find_non_dependent_outputs(c, "Input1", &[OutputPin::new(s, "Output")]);
        assert!(free.is_empty());
        let free = g.find_non_dependent_outputs(c, "Input1", &[]);
        assert_eq!(free, vec![OutputPin::new(a, "Output"), OutputPin::new(s, "Output")]);
    }

    #[test]
    fn cycles_are_rejected() {
        let dsl = test_graph_dsl(
            vec![node("a", "Abs", json!({})), node("b", "Abs", json!({}))],
            vec![
                test_connection("a", "Output", "b", "Input"),
                test_connection("b", "Output", "a", "Input"),
            ],
        );
        assert!(ShaderGraph::from_dsl(&dsl).is_err());
    }

    #[test]
    fn loop_feedback_is_not_a_cycle() {
        let dsl = test_graph_dsl(
            vec![
                node("loop", "Iterate", json!({ "from": 0, "to": 3 })),
                node("add", "Add", json!({})),
            ],
            vec![
                test_connection("loop", "Output", "add", "Input1"),
                test_connection("loop", "N", "add", "Input2"),
                test_connection("add", "Output", "loop", "Input"),
            ],
        );
        let g = ShaderGraph::from_dsl(&dsl).unwrap();
        let l = g.find("loop").unwrap().index;
        let dependents = [OutputPin::new(l, "N"), OutputPin::new(l, "Output")];
        assert!(g.find_non_dependent_outputs(l, "Input", &dependents).is_empty());
    }

    #[test]
    fn double_connected_input_is_rejected() {
        let dsl = test_graph_dsl(
            vec![
                node("a", "Scalar", json!({})),
                node("b", "Scalar", json!({})),
                node("c", "Abs", json!({})),
            ],
            vec![
                test_connection("a", "Output", "c", "Input"),
                test_connection("b", "Output", "c", "Input"),
            ],
        );
        assert!(ShaderGraph::from_dsl(&dsl).is_err());
    }
}
