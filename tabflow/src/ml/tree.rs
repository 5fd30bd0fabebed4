//! Classification tree grown by exhaustive threshold search.

use ndarray::{Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Impurity measure used to score candidate splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Gini impurity.
    Gini,
    /// Shannon entropy.
    #[default]
    Entropy,
}

impl Criterion {
    fn impurity(self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let total = total as f64;
        match self {
            Self::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / total;
                        p * p
                    })
                    .sum::<f64>()
            }
            Self::Entropy => counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / total;
                    -p * p.log2()
                })
                .sum(),
        }
    }
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    /// Split scoring.
    pub criterion: Criterion,
    /// Maximum depth; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs to be split.
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split.
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split.
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct Candidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// A fitted decision tree over class indices `0..n_classes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    n_classes: usize,
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grows a tree on the rows listed in `samples` (duplicates allowed).
    ///
    /// `targets[i]` is the class index of row `i`.
    pub fn fit<R: Rng + ?Sized>(
        features: &Array2<f64>,
        targets: &[usize],
        n_classes: usize,
        mut samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let placeholder = || Node::Leaf {
            distribution: Vec::new(),
        };
        let mut nodes = vec![placeholder()];
        let mut stack = vec![(0_usize, 0_usize, samples.len(), 0_usize)];

        while let Some((id, start, end, depth)) = stack.pop() {
            let node_samples = &mut samples[start..end];
            let counts = class_counts(node_samples, targets, n_classes);
            let n = node_samples.len();

            let splittable = params.max_depth.map_or(true, |max| depth < max)
                && n >= params.min_samples_split
                && n >= 2 * params.min_samples_leaf
                && params.criterion.impurity(&counts, n) > 0.0;

            let split = if splittable {
                best_split(features, targets, n_classes, node_samples, params, rng)
            } else {
                None
            };

            match split {
                Some(candidate) => {
                    let mid = partition(node_samples, |i| {
                        features[[i, candidate.feature]] <= candidate.threshold
                    });
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(placeholder());
                    nodes.push(placeholder());
                    nodes[id] = Node::Split {
                        feature: candidate.feature,
                        threshold: candidate.threshold,
                        left,
                        right,
                    };
                    stack.push((right, start + mid, end, depth + 1));
                    stack.push((left, start, start + mid, depth + 1));
                }
                None => {
                    let total = n.max(1) as f64;
                    nodes[id] = Node::Leaf {
                        distribution: counts.iter().map(|&c| c as f64 / total).collect(),
                    };
                }
            }
        }

        Self { n_classes, nodes }
    }

    /// Class distribution of the leaf `row` falls into.
    #[must_use]
    pub fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }

    /// Number of classes the tree was fitted on.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Total number of nodes.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0_usize, 0_usize)];
        while let Some((id, depth)) = stack.pop() {
            match &self.nodes[id] {
                Node::Leaf { .. } => deepest = deepest.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        deepest
    }
}

fn class_counts(samples: &[usize], targets: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &i in samples {
        counts[targets[i]] += 1;
    }
    counts
}

fn partition(samples: &mut [usize], goes_left: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..samples.len() {
        if goes_left(samples[i]) {
            samples.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

fn best_split<R: Rng + ?Sized>(
    features: &Array2<f64>,
    targets: &[usize],
    n_classes: usize,
    samples: &[usize],
    params: &TreeParams,
    rng: &mut R,
) -> Option<Candidate> {
    let n = samples.len();
    let n_features = features.ncols();
    if n_features == 0 {
        return None;
    }
    let wanted = params.max_features.clamp(1, n_features);
    let order = rand::seq::index::sample(rng, n_features, n_features);
    let total_counts = class_counts(samples, targets, n_classes);

    let mut best: Option<Candidate> = None;
    let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n);
    let mut visited = 0;

    // Constant features do not count towards `wanted`.
    for feature in order.iter() {
        if visited == wanted {
            break;
        }
        sorted.clear();
        sorted.extend(samples.iter().map(|&i| (features[[i, feature]], targets[i])));
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        if sorted[n - 1].0 <= sorted[0].0 {
            continue;
        }
        visited += 1;

        let mut left = vec![0_usize; n_classes];
        let mut right = total_counts.clone();

        for pos in 0..n - 1 {
            let (value, class) = sorted[pos];
            left[class] += 1;
            right[class] -= 1;

            let next = sorted[pos + 1].0;
            if next <= value {
                continue;
            }
            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < params.min_samples_leaf || n_right < params.min_samples_leaf {
                continue;
            }

            let impurity = (n_left as f64 * params.criterion.impurity(&left, n_left)
                + n_right as f64 * params.criterion.impurity(&right, n_right))
                / n as f64;
            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
    }

    best
}
