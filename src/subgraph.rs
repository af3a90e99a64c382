use crate::model::{ElementId, ElementKind};
use crate::query::Filter;
use crate::store::Graph;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// What the root uses.
    #[default]
    Forward,
    /// What uses the root.
    Reverse,
}

#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Kinds shown in the result. Every other kind is walked through without being shown.
    pub kinds: Vec<ElementKind>,
    pub level: usize,
    /// Total number of shown nodes; `None` is unlimited.
    pub max: Option<usize>,
    pub direction: Direction,
    /// Package and class-shape scope applied to shown nodes.
    pub filter: Filter,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            kinds: vec![ElementKind::Class, ElementKind::Object],
            level: 3,
            max: None,
            direction: Direction::Forward,
            filter: Filter::default(),
        }
    }
}

impl TraversalOptions {
    fn shows(&self, kind: &ElementKind) -> bool {
        self.kinds.iter().any(|k| k.matches(kind.as_str()))
    }
}

/// One-hop neighbours of `id` for the given direction, before kind filtering.
pub fn neighbors(
    graph: &Graph,
    id: ElementId,
    direction: Direction,
    kinds: &[ElementKind],
) -> Vec<ElementId> {
    let Some(element) = graph.get(id) else {
        return Vec::new();
    };
    let wants = |kind: ElementKind| kinds.iter().any(|k| *k == kind);

    match (direction, &element.kind) {
        (Direction::Forward, ElementKind::Class) => {
            let mut out = graph.class_symbols(id);
            out.extend(graph.class_methods(id));
            out.extend(graph.sorted_references(id));
            if wants(ElementKind::Object) {
                out.extend(instances_of(graph, id));
            }
            out
        }
        (Direction::Forward, ElementKind::ConstantPool) => element
            .as_constant_pool()
            .and_then(|pool| pool.pool_holder)
            .into_iter()
            .collect(),
        (Direction::Forward, ElementKind::Method) => element
            .as_method()
            .and_then(|method| method.class)
            .into_iter()
            .collect(),
        (Direction::Forward, kind) if kind.is_referencing() => graph.sorted_references(id),
        (Direction::Forward, _) => Vec::new(),
        (Direction::Reverse, ElementKind::Class) if wants(ElementKind::Symbol) => {
            graph.class_symbols(id)
        }
        (Direction::Reverse, ElementKind::Object) => {
            let mut out = graph.sorted_referrers(id);
            out.extend(
                graph
                    .sorted_references(id)
                    .into_iter()
                    .filter(|r| graph[*r].kind == ElementKind::Class),
            );
            out
        }
        (Direction::Reverse, _) => graph.sorted_referrers(id),
    }
}

/// Objects whose instance-of link points at `class`. They are always among its referrers.
fn instances_of(graph: &Graph, class: ElementId) -> Vec<ElementId> {
    graph
        .sorted_referrers(class)
        .into_iter()
        .filter(|r| {
            graph[*r]
                .as_instance()
                .is_some_and(|instance| instance.instance_of == Some(class))
        })
        .collect()
}

/// Shown-kind nodes reachable from `root` in one tree step.
///
/// Nodes of kinds that are not shown are expanded breadth first until a shown node
/// is reached, so linking nodes (Symbols, Methods, profiles) connect shown nodes
/// without appearing themselves. Stops once `budget` nodes were found.
pub fn expand(
    graph: &Graph,
    root: ElementId,
    opts: &TraversalOptions,
    budget: Option<usize>,
) -> Vec<ElementId> {
    let mut seen: HashSet<ElementId> = HashSet::new();
    let mut queue: VecDeque<ElementId> = VecDeque::new();
    let mut found = Vec::new();
    seen.insert(root);
    queue.push_back(root);

    while let Some(id) = queue.pop_front() {
        for next in neighbors(graph, id, opts.direction, &opts.kinds) {
            if !seen.insert(next) {
                continue;
            }
            let element = &graph[next];
            if opts.shows(&element.kind) {
                if opts.filter.in_scope(graph, element) {
                    found.push(next);
                    if budget.is_some_and(|max| found.len() >= max) {
                        return found;
                    }
                }
            } else {
                queue.push_back(next);
            }
        }
    }
    found
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub id: ElementId,
    pub kind: ElementKind,
    pub key: String,
    /// Already shown elsewhere in the tree; not expanded again.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub repeated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyTree {
    pub direction: Direction,
    pub root: TreeNode,
    pub nodes: usize,
    pub truncated: bool,
}

impl DependencyTree {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[{}] {}", self.root.kind, self.root.key);
        for child in &self.root.children {
            render_node(&mut out, child, 1);
        }
        if self.truncated {
            let _ = writeln!(out, "... (stopped after {} nodes)", self.nodes);
        }
        out
    }
}

fn render_node(out: &mut String, node: &TreeNode, depth: usize) {
    let marker = if node.repeated { '-' } else { '+' };
    let _ = writeln!(
        out,
        "{}{} [{}] {}",
        "  ".repeat(depth),
        marker,
        node.kind,
        node.key
    );
    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}

struct TreeBuilder<'g> {
    graph: &'g Graph,
    opts: &'g TraversalOptions,
    visited: HashSet<ElementId>,
    shown: usize,
    truncated: bool,
}

impl TreeBuilder<'_> {
    fn remaining(&self) -> Option<usize> {
        self.opts.max.map(|max| max.saturating_sub(self.shown))
    }

    fn node(&self, id: ElementId, repeated: bool) -> TreeNode {
        let element = &self.graph[id];
        TreeNode {
            id,
            kind: element.kind.clone(),
            key: element.key().to_string(),
            repeated,
            children: Vec::new(),
        }
    }

    fn children(&mut self, id: ElementId, depth: usize) -> Vec<TreeNode> {
        if depth == 0 || self.truncated {
            return Vec::new();
        }
        if self.remaining() == Some(0) {
            self.truncated = true;
            return Vec::new();
        }
        // one extra so a full budget can tell "exactly enough" from "more left"
        let found = expand(self.graph, id, self.opts, self.remaining().map(|r| r + 1));
        let mut out = Vec::with_capacity(found.len());
        for next in found {
            if self.remaining() == Some(0) {
                self.truncated = true;
                break;
            }
            self.shown += 1;
            if self.visited.insert(next) {
                let mut node = self.node(next, false);
                node.children = self.children(next, depth - 1);
                out.push(node);
            } else {
                out.push(self.node(next, true));
            }
        }
        out
    }
}

/// Depth-first usage tree rooted at `root`, `opts.level` levels deep.
/// Each element is expanded at most once; later sightings are marked as repeated.
pub fn build_tree(graph: &Graph, root: ElementId, opts: &TraversalOptions) -> DependencyTree {
    let mut builder = TreeBuilder {
        graph,
        opts,
        visited: HashSet::new(),
        shown: 0,
        truncated: false,
    };
    builder.visited.insert(root);
    let mut tree_root = builder.node(root, false);
    tree_root.children = builder.children(root, opts.level);
    tracing::debug!(
        root = %graph[root],
        nodes = builder.shown,
        truncated = builder.truncated,
        "tree built"
    );
    DependencyTree {
        direction: opts.direction,
        root: tree_root,
        nodes: builder.shown,
        truncated: builder.truncated,
    }
}
