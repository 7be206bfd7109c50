use crate::schema::{parent_id_column, Schema, Table};
use crate::{Error, Result};

use indexmap::IndexMap;
use std::fmt;

/// Uniquely identifies a node within the schema graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl fmt::Debug for NodeId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "NodeId({})", self.0)
    }
}

/// The relationship type of a directed edge from `a` to `b`.
///
/// The difference between `OneToOne` and `BelongsTo` is in the direction: when
/// table B is nested in table A with `single = true`, B belongs to A and A has
/// a OneToOne edge to B. A non-single child C gives A a OneToMany edge to C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rel {
    OneToOne,
    OneToMany,
    BelongsTo,
}

/// A directed edge in the schema graph.
///
/// Edges are stored as indexed pairs on each node rather than as owning
/// references: both directions of a relationship exist, which would otherwise
/// form an ownership cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub rel: Rel,

    /// When `true`, the foreign key behind this relationship joins the
    /// child's natural key.
    pub unique: bool,
}

impl Edge {
    /// True if the destination of this edge is reached at most once from the
    /// source, i.e. anything other than OneToMany.
    pub fn is_scalar(&self) -> bool {
        self.rel != Rel::OneToMany
    }
}

/// A node in the schema graph: a flattened table plus its edges.
#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub table: Table,
    pub edges: Vec<Edge>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// The edge from this node to `to`, if any.
    pub fn edge(&self, to: NodeId) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.to == to)
    }

    /// Outgoing forward edges (OneToOne / OneToMany), in declaration order.
    pub fn forward_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|edge| edge.rel != Rel::BelongsTo)
    }

    /// Outgoing belongs-to edges, one per parent join.
    pub fn belongs_to_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|edge| edge.rel == Rel::BelongsTo)
    }
}

/// One component of a table's natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    /// A field declared `unique`.
    Field(String),
    /// The implicit foreign key to the named parent table.
    Parent(String),
}

impl KeyPart {
    /// The database column backing this key part.
    pub fn column(&self) -> String {
        match self {
            KeyPart::Field(name) => name.clone(),
            KeyPart::Parent(parent) => parent_id_column(parent),
        }
    }
}

/// A graph representation of the schema: nodes are tables, edges are typed
/// relationships. This is the canonical compiled form the rest of the engine
/// works against.
#[derive(Debug)]
pub struct SchemaGraph {
    nodes: Vec<Node>,
    index: IndexMap<String, NodeId>,
    roots: Vec<NodeId>,
}

impl SchemaGraph {
    /// Builds the graph from a compiled schema.
    ///
    /// Fails with `SchemaInvalid` when a join references an undeclared table,
    /// when two edges connect the same ordered pair of nodes, or when the
    /// belongs-to projection of the graph contains a cycle.
    pub fn build(schema: &Schema) -> Result<Self> {
        let mut nodes: Vec<Node> = Vec::with_capacity(schema.len());
        let mut index = IndexMap::with_capacity(schema.len());

        for (position, table) in schema.tables().enumerate() {
            let id = NodeId(position);
            index.insert(table.name.clone(), id);
            nodes.push(Node {
                id,
                table: table.clone(),
                edges: Vec::new(),
            });
        }

        // Connect related nodes. A join means the table belongs to the named
        // parent; the parent gets the matching forward edge.
        for child_pos in 0..nodes.len() {
            let child = NodeId(child_pos);

            for join_pos in 0..nodes[child_pos].table.joins.len() {
                let join = nodes[child_pos].table.joins[join_pos].clone();

                let parent = match index.get(&join.table) {
                    Some(parent) => *parent,
                    None => {
                        return Err(Error::schema_invalid(format!(
                            "table `{}` joins unknown table `{}`",
                            nodes[child_pos].name(),
                            join.table
                        )));
                    }
                };

                if nodes[parent.0].edge(child).is_some() || nodes[child_pos].edge(parent).is_some()
                {
                    return Err(Error::schema_invalid(format!(
                        "duplicate join between `{}` and `{}`",
                        join.table,
                        nodes[child_pos].name()
                    )));
                }

                let rel = if join.single {
                    Rel::OneToOne
                } else {
                    Rel::OneToMany
                };

                nodes[parent.0].edges.push(Edge {
                    from: parent,
                    to: child,
                    rel,
                    unique: join.unique,
                });
                nodes[child_pos].edges.push(Edge {
                    from: child,
                    to: parent,
                    rel: Rel::BelongsTo,
                    unique: join.unique,
                });
            }
        }

        let roots = nodes
            .iter()
            .filter(|node| node.belongs_to_edges().next().is_none())
            .map(|node| node.id)
            .collect();

        let graph = Self {
            nodes,
            index,
            roots,
        };
        graph.reject_cycles()?;

        Ok(graph)
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Get a node by table name.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|id| self.node(*id))
    }

    /// Iterate over all nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Nodes with no outgoing belongs-to edge.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The edge from `a` to `b`, if any.
    pub fn edge(&self, a: NodeId, b: NodeId) -> Option<&Edge> {
        self.node(a).edge(b)
    }

    /// Applies `visit` to every node exactly once: pre-order DFS over forward
    /// edges, roots first, siblings in declaration order.
    ///
    /// The order is deterministic; the derived GraphQL schema depends on it.
    pub fn traverse(&self, mut visit: impl FnMut(&Node)) {
        let mut visited = vec![false; self.nodes.len()];

        for root in &self.roots {
            self.visit_node(*root, &mut visited, &mut visit);
        }
        // Acyclic belongs-to edges guarantee a root above every node, but
        // traversal must stay total for every graph it is handed.
        for node in &self.nodes {
            self.visit_node(node.id, &mut visited, &mut visit);
        }
    }

    fn visit_node(&self, id: NodeId, visited: &mut [bool], visit: &mut impl FnMut(&Node)) {
        if visited[id.0] {
            return;
        }
        visited[id.0] = true;

        let node = self.node(id);
        visit(node);

        for edge in node.forward_edges() {
            self.visit_node(edge.to, visited, visit);
        }
    }

    /// The shortest path between two nodes, ignoring edge direction.
    /// Includes both endpoints. Returns `None` when no path exists.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        if from == to {
            return Some(vec![from]);
        }

        let mut prev: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut queue = std::collections::VecDeque::from([from]);
        prev[from.0] = Some(from);

        while let Some(current) = queue.pop_front() {
            for edge in &self.node(current).edges {
                if prev[edge.to.0].is_some() {
                    continue;
                }
                prev[edge.to.0] = Some(current);

                if edge.to == to {
                    let mut path = vec![to];
                    let mut step = current;
                    while step != from {
                        path.push(step);
                        step = prev[step.0].unwrap();
                    }
                    path.push(from);
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(edge.to);
            }
        }

        None
    }

    /// All nodes within `depth` undirected hops of `id`, in breadth-first
    /// order, excluding `id` itself.
    pub fn neighbours(&self, id: NodeId, depth: usize) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        seen[id.0] = true;

        let mut result = Vec::new();
        let mut frontier = vec![id];

        for _ in 0..depth {
            let mut next = Vec::new();
            for current in frontier {
                for edge in &self.node(current).edges {
                    if !seen[edge.to.0] {
                        seen[edge.to.0] = true;
                        result.push(edge.to);
                        next.push(edge.to);
                    }
                }
            }
            frontier = next;
        }

        result
    }

    /// The ordered components of a table's natural key: `unique` fields in
    /// declaration order, then the foreign keys of `unique` parent joins. A
    /// `single` table takes its identity solely from its parents.
    pub fn natural_key(&self, id: NodeId) -> Vec<KeyPart> {
        let table = &self.node(id).table;

        if table.single {
            return table
                .joins
                .iter()
                .map(|join| KeyPart::Parent(join.table.clone()))
                .collect();
        }

        let mut parts: Vec<KeyPart> = table
            .unique_fields()
            .map(|field| KeyPart::Field(field.name.clone()))
            .collect();
        parts.extend(
            table
                .joins
                .iter()
                .filter(|join| join.unique)
                .map(|join| KeyPart::Parent(join.table.clone())),
        );
        parts
    }

    /// Errors when the belongs-to projection contains a cycle.
    fn reject_cycles(&self) -> Result<()> {
        // 0 = unvisited, 1 = on the current path, 2 = done
        let mut state = vec![0u8; self.nodes.len()];

        for node in &self.nodes {
            self.check_cycle(node.id, &mut state)?;
        }

        Ok(())
    }

    fn check_cycle(&self, id: NodeId, state: &mut [u8]) -> Result<()> {
        match state[id.0] {
            1 => {
                return Err(Error::schema_invalid(format!(
                    "cyclic schema: table `{}` transitively belongs to itself",
                    self.node(id).name()
                )));
            }
            2 => return Ok(()),
            _ => {}
        }

        state[id.0] = 1;
        for edge in self.node(id).belongs_to_edges() {
            self.check_cycle(edge.to, state)?;
        }
        state[id.0] = 2;

        Ok(())
    }
}
