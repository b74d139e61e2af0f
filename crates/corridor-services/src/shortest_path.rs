//! All-pairs shortest paths (Floyd–Warshall) over small dense graphs.
//!
//! Used by both tiers: hop-count chains across the vehicles of one segment,
//! and weighted routes across the fixed segment graph. Missing edges are
//! `None` rather than a large sentinel weight, so sums never overflow.

/// Directed edge weights. `None` = no edge.
#[derive(Debug, Clone)]
pub struct WeightMatrix {
    n: usize,
    weights: Vec<Option<u64>>,
}

impl WeightMatrix {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            weights: vec![None; n * n],
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn set(&mut self, from: usize, to: usize, weight: Option<u64>) {
        self.weights[from * self.n + to] = weight;
    }

    /// Set both directions.
    pub fn set_undirected(&mut self, a: usize, b: usize, weight: Option<u64>) {
        self.set(a, b, weight);
        self.set(b, a, weight);
    }

    pub fn get(&self, from: usize, to: usize) -> Option<u64> {
        self.weights[from * self.n + to]
    }
}

#[derive(Debug, Clone)]
pub struct ShortestPaths {
    n: usize,
    dist: Vec<Option<u64>>,
    /// First hop on the best path from i to j.
    next: Vec<Option<usize>>,
}

/// Run Floyd–Warshall. Ties keep the path found first, so among equal-cost
/// routes the one through lower-numbered intermediates wins.
pub fn floyd_warshall(graph: &WeightMatrix) -> ShortestPaths {
    let n = graph.len();
    let mut dist = vec![None; n * n];
    let mut next = vec![None; n * n];

    for i in 0..n {
        for j in 0..n {
            if i == j {
                dist[i * n + j] = Some(0);
                next[i * n + j] = Some(j);
            } else if let Some(w) = graph.get(i, j) {
                dist[i * n + j] = Some(w);
                next[i * n + j] = Some(j);
            }
        }
    }

    for k in 0..n {
        for i in 0..n {
            let Some(ik) = dist[i * n + k] else { continue };
            for j in 0..n {
                let Some(kj) = dist[k * n + j] else { continue };
                let through = ik.saturating_add(kj);
                let better = match dist[i * n + j] {
                    Some(current) => through < current,
                    None => true,
                };
                if better {
                    dist[i * n + j] = Some(through);
                    next[i * n + j] = next[i * n + k];
                }
            }
        }
    }

    ShortestPaths { n, dist, next }
}

impl ShortestPaths {
    pub fn distance(&self, from: usize, to: usize) -> Option<u64> {
        if from >= self.n || to >= self.n {
            return None;
        }
        self.dist[from * self.n + to]
    }

    /// Node sequence from `from` to `to`, both included.
    pub fn path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        self.distance(from, to)?;
        let mut path = vec![from];
        let mut at = from;
        while at != to {
            at = self.next[at * self.n + to]?;
            path.push(at);
            if path.len() > self.n {
                return None;
            }
        }
        Some(path)
    }
}
