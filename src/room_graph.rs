//! Weighted undirected graph over room indices
//!
//! Nodes are integer indices into a caller-owned room list, so graph
//! algorithms never depend on reference identity or hashing of rooms.
//! Used for the minimal river topology and the inter-city road network.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A weighted edge to another node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub to: usize,
    pub weight: f32,
}

/// Undirected weighted graph with adjacency lists.
#[derive(Clone, Debug)]
pub struct RoomGraph {
    adjacency: Vec<Vec<Edge>>,
}

impl RoomGraph {
    pub fn new(node_count: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); node_count],
        }
    }

    /// Build a complete graph over `node_count` nodes. The weight closure
    /// may decline an edge (e.g. an unreachable lake pair) by returning
    /// `None`, in which case the graph is simply missing that edge.
    pub fn connect_all_with(
        node_count: usize,
        mut weight: impl FnMut(usize, usize) -> Option<f32>,
    ) -> Self {
        let mut graph = Self::new(node_count);
        for a in 0..node_count {
            for b in (a + 1)..node_count {
                if let Some(w) = weight(a, b) {
                    graph.add_edge(a, b, w);
                }
            }
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn add_edge(&mut self, a: usize, b: usize, weight: f32) {
        debug_assert!(a != b && a < self.node_count() && b < self.node_count());
        self.adjacency[a].push(Edge { to: b, weight });
        self.adjacency[b].push(Edge { to: a, weight });
    }

    pub fn neighbors(&self, node: usize) -> &[Edge] {
        &self.adjacency[node]
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.adjacency[a].iter().any(|e| e.to == b)
    }

    /// Undirected edge list with `a < b`, sorted for stable output.
    pub fn edges(&self) -> Vec<(usize, usize, f32)> {
        let mut result = Vec::new();
        for (a, edges) in self.adjacency.iter().enumerate() {
            for e in edges {
                if a < e.to {
                    result.push((a, e.to, e.weight));
                }
            }
        }
        result.sort_by(|l, r| (l.0, l.1).cmp(&(r.0, r.1)));
        result
    }

    pub fn total_weight(&self) -> f32 {
        self.edges().iter().map(|&(_, _, w)| w).sum()
    }

    /// Prim's minimum spanning tree. For a connected input the result has
    /// exactly `nodes - 1` edges; disconnected inputs yield a spanning
    /// forest. Ties are broken by (weight, from, to) so the result is
    /// deterministic.
    pub fn minimum_spanning_tree(&self) -> RoomGraph {
        let n = self.node_count();
        let mut tree = RoomGraph::new(n);
        if n == 0 {
            return tree;
        }

        let mut in_tree = vec![false; n];
        let mut heap: BinaryHeap<PrimEdge> = BinaryHeap::new();

        for start in 0..n {
            if in_tree[start] {
                continue;
            }
            in_tree[start] = true;
            for e in &self.adjacency[start] {
                heap.push(PrimEdge {
                    weight: e.weight,
                    from: start,
                    to: e.to,
                });
            }

            while let Some(edge) = heap.pop() {
                if in_tree[edge.to] {
                    continue;
                }
                in_tree[edge.to] = true;
                tree.add_edge(edge.from, edge.to, edge.weight);
                for e in &self.adjacency[edge.to] {
                    if !in_tree[e.to] {
                        heap.push(PrimEdge {
                            weight: e.weight,
                            from: edge.to,
                            to: e.to,
                        });
                    }
                }
            }
        }

        tree
    }

    /// Shortest-path distance between two nodes by edge weight (Dijkstra;
    /// weights must be non-negative). `None` if disconnected.
    pub fn path_distance(&self, from: usize, to: usize) -> Option<f32> {
        let n = self.node_count();
        let mut dist = vec![f32::INFINITY; n];
        let mut heap: BinaryHeap<PrimEdge> = BinaryHeap::new();
        dist[from] = 0.0;
        heap.push(PrimEdge {
            weight: 0.0,
            from,
            to: from,
        });

        while let Some(entry) = heap.pop() {
            let node = entry.to;
            if entry.weight > dist[node] {
                continue;
            }
            if node == to {
                return Some(entry.weight);
            }
            for e in &self.adjacency[node] {
                let next = entry.weight + e.weight;
                if next < dist[e.to] {
                    dist[e.to] = next;
                    heap.push(PrimEdge {
                        weight: next,
                        from: node,
                        to: e.to,
                    });
                }
            }
        }

        None
    }

    /// Apply a function to every edge weight (e.g. unsquaring stored
    /// squared distances before summing path lengths).
    pub fn map_weights(mut self, f: impl Fn(f32) -> f32) -> Self {
        for edges in &mut self.adjacency {
            for e in edges.iter_mut() {
                e.weight = f(e.weight);
            }
        }
        self
    }
}

/// Heap entry for Prim/Dijkstra, inverted into a min-heap with pinned
/// tie-breaking.
#[derive(PartialEq)]
struct PrimEdge {
    weight: f32,
    from: usize,
    to: usize,
}

impl Eq for PrimEdge {}

impl Ord for PrimEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .weight
            .total_cmp(&self.weight)
            .then_with(|| (other.from, other.to).cmp(&(self.from, self.to)))
    }
}

impl PartialOrd for PrimEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Exhaustive MST by trying every spanning tree of a small graph.
    fn brute_force_mst_weight(n: usize, edges: &[(usize, usize, f32)]) -> f32 {
        let mut best = f32::INFINITY;
        let count = edges.len();
        for mask in 0u32..(1 << count) {
            if mask.count_ones() as usize != n - 1 {
                continue;
            }
            // Union-find connectivity check.
            let mut parent: Vec<usize> = (0..n).collect();
            fn find(parent: &mut Vec<usize>, x: usize) -> usize {
                if parent[x] != x {
                    let root = find(parent, parent[x]);
                    parent[x] = root;
                }
                parent[x]
            }
            let mut weight = 0.0;
            let mut joined = 0;
            for (i, &(a, b, w)) in edges.iter().enumerate() {
                if mask & (1 << i) == 0 {
                    continue;
                }
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra] = rb;
                    joined += 1;
                }
                weight += w;
            }
            if joined == n - 1 {
                best = best.min(weight);
            }
        }
        best
    }

    fn five_node_graph() -> (RoomGraph, Vec<(usize, usize, f32)>) {
        let edges = vec![
            (0, 1, 4.0),
            (0, 2, 1.0),
            (1, 2, 3.0),
            (1, 3, 2.5),
            (2, 3, 5.0),
            (2, 4, 6.0),
            (3, 4, 1.5),
            (0, 4, 9.0),
        ];
        let mut graph = RoomGraph::new(5);
        for &(a, b, w) in &edges {
            graph.add_edge(a, b, w);
        }
        (graph, edges)
    }

    #[test]
    fn test_mst_edge_count_and_connectivity() {
        let (graph, _) = five_node_graph();
        let mst = graph.minimum_spanning_tree();
        assert_eq!(mst.edges().len(), 4);
        for node in 1..5 {
            assert!(mst.path_distance(0, node).is_some());
        }
    }

    #[test]
    fn test_mst_matches_brute_force() {
        let (graph, edges) = five_node_graph();
        let mst = graph.minimum_spanning_tree();
        let expected = brute_force_mst_weight(5, &edges);
        assert!((mst.total_weight() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_mst_of_complete_graph() {
        // Complete graph on 5 nodes with deterministic weights.
        let graph =
            RoomGraph::connect_all_with(5, |a, b| Some(((a * 7 + b * 13) % 10) as f32 + 1.0));
        let mst = graph.minimum_spanning_tree();
        assert_eq!(mst.edges().len(), 4);
        assert!(mst.total_weight() <= graph.total_weight());
    }

    #[test]
    fn test_disconnected_graph_yields_forest() {
        let mut graph = RoomGraph::new(4);
        graph.add_edge(0, 1, 1.0);
        graph.add_edge(2, 3, 1.0);
        let mst = graph.minimum_spanning_tree();
        assert_eq!(mst.edges().len(), 2);
        assert!(mst.path_distance(0, 2).is_none());
    }

    #[test]
    fn test_path_distance_sums_weights() {
        let mut graph = RoomGraph::new(3);
        graph.add_edge(0, 1, 2.0);
        graph.add_edge(1, 2, 3.0);
        graph.add_edge(0, 2, 10.0);
        assert_eq!(graph.path_distance(0, 2), Some(5.0));
    }

    #[test]
    fn test_map_weights() {
        let mut graph = RoomGraph::new(2);
        graph.add_edge(0, 1, 9.0);
        let mapped = graph.map_weights(f32::sqrt);
        assert_eq!(mapped.path_distance(0, 1), Some(3.0));
    }
}
