use herdnet_core::{AnimalId, EigenvectorConfig};
use herdnet_graph::InteractionGraph;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Node ids in ascending order plus an id -> dense-index lookup. All
/// centrality kernels work on dense indices and map back at the end.
pub(crate) struct NodeIndex {
    pub ids: Vec<AnimalId>,
    pub positions: HashMap<AnimalId, usize>,
}

impl NodeIndex {
    pub fn of(graph: &InteractionGraph) -> Self {
        let ids: Vec<AnimalId> = graph.nodes().cloned().collect();
        let positions = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Self { ids, positions }
    }

    pub fn adjacency_lists(&self, graph: &InteractionGraph) -> Vec<Vec<usize>> {
        self.ids
            .iter()
            .map(|id| {
                graph
                    .neighbors(id)
                    .map(|(nbr, _)| self.positions[nbr])
                    .collect()
            })
            .collect()
    }
}

/// Degree centrality: degree / (|V| - 1); 0 for graphs with fewer than two
/// nodes.
pub fn degree_centrality(graph: &InteractionGraph) -> BTreeMap<AnimalId, f64> {
    let n = graph.node_count();
    graph
        .nodes()
        .map(|id| {
            let c = if n < 2 {
                0.0
            } else {
                graph.degree(id) as f64 / (n - 1) as f64
            };
            (id.clone(), c)
        })
        .collect()
}

fn bfs_distances(adj: &[Vec<usize>], s: usize) -> Vec<i64> {
    let mut dist = vec![-1i64; adj.len()];
    dist[s] = 0;
    let mut queue = VecDeque::new();
    queue.push_back(s);
    while let Some(v) = queue.pop_front() {
        for &w in &adj[v] {
            if dist[w] < 0 {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
        }
    }
    dist
}

/// Closeness centrality over unweighted shortest paths with the
/// Wasserman-Faust correction: each score is scaled by the fraction of the
/// herd the node can actually reach, so disconnected graphs stay
/// comparable. Isolated nodes score 0.
pub fn closeness_centrality(graph: &InteractionGraph) -> BTreeMap<AnimalId, f64> {
    let index = NodeIndex::of(graph);
    let n = index.ids.len();
    if n < 2 {
        return index.ids.iter().map(|id| (id.clone(), 0.0)).collect();
    }
    let adj = index.adjacency_lists(graph);

    let scores: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|s| {
            let dist = bfs_distances(&adj, s);
            let mut total = 0i64;
            let mut reached = 0i64;
            for &d in &dist {
                if d > 0 {
                    total += d;
                    reached += 1;
                }
            }
            if total == 0 {
                0.0
            } else {
                let r = reached as f64;
                (r / total as f64) * (r / (n - 1) as f64)
            }
        })
        .collect();

    index
        .ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), scores[i]))
        .collect()
}

/// Longest shortest path in the graph. `None` when the graph is empty or
/// disconnected.
pub fn diameter(graph: &InteractionGraph) -> Option<usize> {
    let index = NodeIndex::of(graph);
    let n = index.ids.len();
    if n == 0 {
        return None;
    }
    let adj = index.adjacency_lists(graph);
    let mut max = 0i64;
    for s in 0..n {
        for &d in &bfs_distances(&adj, s) {
            if d < 0 {
                return None;
            }
            max = max.max(d);
        }
    }
    Some(max as usize)
}

/// Betweenness centrality via Brandes' algorithm over unweighted shortest
/// paths, normalized by (n-1)(n-2)/2.
///
/// Per-source accumulation runs on the rayon pool; partial results are
/// collected in source order and folded sequentially so floating-point sums
/// are identical run to run.
pub fn betweenness_centrality(graph: &InteractionGraph) -> BTreeMap<AnimalId, f64> {
    let index = NodeIndex::of(graph);
    let n = index.ids.len();
    if n < 3 {
        return index.ids.iter().map(|id| (id.clone(), 0.0)).collect();
    }
    let adj = index.adjacency_lists(graph);

    let partials: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|s| brandes_from_source(&adj, s))
        .collect();

    let mut scores = vec![0.0f64; n];
    for partial in &partials {
        for (v, c) in partial.iter().enumerate() {
            scores[v] += c;
        }
    }

    // Each unordered pair is counted from both endpoints.
    let norm = ((n - 1) * (n - 2)) as f64;
    index
        .ids
        .iter()
        .enumerate()
        .map(|(v, id)| (id.clone(), scores[v] / norm))
        .collect()
}

fn brandes_from_source(adj: &[Vec<usize>], s: usize) -> Vec<f64> {
    let n = adj.len();
    let mut stack = Vec::with_capacity(n);
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![-1i64; n];
    let mut delta = vec![0.0f64; n];

    sigma[s] = 1.0;
    dist[s] = 0;
    let mut queue = VecDeque::new();
    queue.push_back(s);

    while let Some(v) = queue.pop_front() {
        stack.push(v);
        for &w in &adj[v] {
            if dist[w] < 0 {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }

    while let Some(w) = stack.pop() {
        for &v in &preds[w] {
            delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
        }
    }

    let mut contribution = vec![0.0f64; n];
    for v in 0..n {
        if v != s {
            contribution[v] = delta[v];
        }
    }
    contribution
}

pub struct EigenvectorResult {
    pub scores: BTreeMap<AnimalId, f64>,
    pub converged: bool,
}

/// Eigenvector centrality by power iteration on the identity-shifted
/// weighted adjacency matrix, scaled so the largest component is 1. On
/// non-convergence within the configured cap the caller falls back to
/// degree centrality.
pub fn eigenvector_centrality(
    graph: &InteractionGraph,
    config: &EigenvectorConfig,
) -> EigenvectorResult {
    let index = NodeIndex::of(graph);
    let n = index.ids.len();
    let zeros = || index.ids.iter().map(|id| (id.clone(), 0.0)).collect();

    if n == 0 || graph.edge_count() == 0 {
        return EigenvectorResult {
            scores: zeros(),
            converged: true,
        };
    }

    let max_weight = graph
        .edges()
        .map(|(_, _, data)| data.weight(graph.weighting()))
        .fold(0.0f64, f64::max);
    if max_weight <= 0.0 {
        return EigenvectorResult {
            scores: zeros(),
            converged: true,
        };
    }

    // Iterate on A/|A|_max + I: scaling and shifting leave the eigenvectors
    // of A unchanged, but the shifted spectrum has a strictly dominant
    // eigenvalue, so the iterate cannot oscillate between the ±λ pair of a
    // bipartite graph.
    let mut matrix = Array2::<f64>::zeros((n, n));
    for (u, v, data) in graph.edges() {
        let (i, j) = (index.positions[u], index.positions[v]);
        let w = data.weight(graph.weighting()) / max_weight;
        matrix[[i, j]] = w;
        matrix[[j, i]] = w;
    }
    for i in 0..n {
        matrix[[i, i]] += 1.0;
    }

    let mut x = Array1::<f64>::from_elem(n, 1.0 / (n as f64).sqrt());
    let mut converged = false;
    for _ in 0..config.max_iterations {
        let next = matrix.dot(&x);
        let norm = next.dot(&next).sqrt();
        if norm <= f64::EPSILON {
            return EigenvectorResult {
                scores: zeros(),
                converged: true,
            };
        }
        let next = next / norm;
        let drift = (&next - &x).iter().map(|d| d.abs()).fold(0.0f64, f64::max);
        x = next;
        if drift < config.tolerance {
            converged = true;
            break;
        }
    }

    let max = x.iter().cloned().fold(0.0f64, f64::max);
    let scores = index
        .ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let v = if max > 0.0 { x[i] / max } else { 0.0 };
            (id.clone(), v.max(0.0))
        })
        .collect();

    EigenvectorResult { scores, converged }
}
