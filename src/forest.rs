//! Random forest of CART trees for the binary stroke label.
//!
//! Every tree is grown on a bootstrap sample of the training rows, with
//! sample weights equal to the bootstrap count times the class weight, and
//! considers a random subset of features at each split. Trees store the
//! weighted fraction of positive samples in their leaves; the forest
//! probability is the mean over trees.

use log::{debug, trace};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{Result, StrokeError};

const MIN_IMPURITY_DECREASE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassWeight {
    Uniform,
    /// `n_samples / (n_classes * count(class))`
    Balanced,
}

impl ClassWeight {
    /// Weight for class 0 and class 1.
    pub fn weights(&self, labels: &[u32]) -> [f64; 2] {
        match self {
            ClassWeight::Uniform => [1.0, 1.0],
            ClassWeight::Balanced => {
                let mut counts = [0usize; 2];
                for &label in labels {
                    if let Some(count) = counts.get_mut(label as usize) {
                        *count += 1;
                    }
                }
                let n_classes = counts.iter().filter(|&&c| c > 0).count() as f64;
                let n = counts.iter().sum::<usize>() as f64;
                let mut weights = [0.0; 2];
                for (w, &count) in weights.iter_mut().zip(&counts) {
                    if count > 0 {
                        *w = n / (n_classes * count as f64);
                    }
                }
                weights
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    Sqrt,
    All,
    Count(usize),
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => *k,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeight,
    /// `predict` returns 1 iff the class-1 probability is strictly above this.
    pub threshold: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeight::Balanced,
            threshold: 0.5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { probability } => return *probability,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Children always come after their parent, so a tree that passes this
    /// check terminates on every row of width `n_features`.
    fn check(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { probability } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(format!("node {} has probability {}", idx, probability));
                    }
                }
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, n_features
                        ));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {} points to node {}", idx, child));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
}

fn gini(w0: f64, w1: f64) -> f64 {
    let total = w0 + w1;
    if total <= 0.0 {
        return 0.0;
    }
    let p0 = w0 / total;
    let p1 = w1 / total;
    1.0 - p0 * p0 - p1 * p1
}

struct TreeBuilder<'a> {
    columns: &'a [Vec<f64>],
    labels: &'a [u32],
    weights: &'a [f64],
    params: &'a ForestParams,
    n_candidates: usize,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn class_totals(&self, samples: &[usize]) -> (f64, f64) {
        samples.iter().fold((0.0, 0.0), |(w0, w1), &i| {
            if self.labels[i] == 1 {
                (w0, w1 + self.weights[i])
            } else {
                (w0 + self.weights[i], w1)
            }
        })
    }

    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let (w0, w1) = self.class_totals(samples);
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            probability: w1 / (w0 + w1),
        });

        let min_leaf = self.params.min_samples_leaf.max(1);
        if w0 == 0.0
            || w1 == 0.0
            || samples.len() < self.params.min_samples_split
            || samples.len() < 2 * min_leaf
            || self.params.max_depth.map_or(false, |d| depth >= d)
        {
            return node_id;
        }

        let split = match self.best_split(samples, w0, w1, min_leaf) {
            Some(split) => split,
            None => return node_id,
        };

        let column = &self.columns[split.feature];
        let mut mid = 0;
        for k in 0..samples.len() {
            if column[samples[k]] <= split.threshold {
                samples.swap(k, mid);
                mid += 1;
            }
        }

        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn best_split(
        &mut self,
        samples: &[usize],
        w0: f64,
        w1: f64,
        min_leaf: usize,
    ) -> Option<SplitCandidate> {
        let total = w0 + w1;
        let mut best_score = gini(w0, w1) - MIN_IMPURITY_DECREASE;
        let mut best = None;
        let mut order = samples.to_vec();

        let candidates = index::sample(&mut self.rng, self.columns.len(), self.n_candidates);
        for feature in candidates.iter() {
            let column = &self.columns[feature];
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let (mut l0, mut l1) = (0.0, 0.0);
            for k in 0..order.len() - 1 {
                let i = order[k];
                if self.labels[i] == 1 {
                    l1 += self.weights[i];
                } else {
                    l0 += self.weights[i];
                }

                let n_left = k + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }
                let (lo, hi) = (column[i], column[order[k + 1]]);
                if lo == hi {
                    continue;
                }

                let left_weight = l0 + l1;
                let right_weight = total - left_weight;
                let score =
                    (left_weight * gini(l0, l1) + right_weight * gini(w0 - l0, w1 - l1)) / total;
                if score < best_score {
                    best_score = score;
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate { feature, threshold });
                }
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    pub fn fit(x: &DenseMatrix<f64>, y: &[u32], params: ForestParams) -> Result<Self> {
        let (n_samples, n_features) = x.shape();
        if n_samples == 0 {
            return Err(StrokeError::EmptyDataset);
        }
        if y.len() != n_samples {
            return Err(StrokeError::LengthMismatch {
                features: n_samples,
                labels: y.len(),
            });
        }
        if let Some(row) = y.iter().position(|&label| label > 1) {
            return Err(StrokeError::InvalidLabel {
                row,
                value: Some(y[row] as i64),
            });
        }
        if params.n_trees == 0 {
            return Err(StrokeError::InvalidInput(
                "a forest needs at least one tree".to_string(),
            ));
        }

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|j| (0..n_samples).map(|i| *x.get((i, j))).collect())
            .collect();
        let class_weights = params.class_weight.weights(y);
        let n_candidates = params.max_features.resolve(n_features);
        debug!(
            "fitting {} trees on {}x{}, class weights {:?}, {} features per split",
            params.n_trees, n_samples, n_features, class_weights, n_candidates
        );

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for t in 0..params.n_trees {
            let mut tree_rng = ChaCha8Rng::seed_from_u64(rng.gen::<u64>());

            let mut counts = vec![0u32; n_samples];
            for _ in 0..n_samples {
                counts[tree_rng.gen_range(0..n_samples)] += 1;
            }
            let weights: Vec<f64> = counts
                .iter()
                .zip(y)
                .map(|(&c, &label)| c as f64 * class_weights[label as usize])
                .collect();
            let mut samples: Vec<usize> = (0..n_samples).filter(|&i| weights[i] > 0.0).collect();

            let mut builder = TreeBuilder {
                columns: &columns,
                labels: y,
                weights: &weights,
                params: &params,
                n_candidates,
                rng: tree_rng,
                nodes: Vec::new(),
            };
            builder.build(&mut samples, 0);
            let tree = DecisionTree {
                nodes: builder.nodes,
            };
            trace!("tree {}: {} nodes, depth {}", t, tree.n_nodes(), tree.depth());
            trees.push(tree);
        }

        Ok(RandomForestClassifier {
            params,
            n_features,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural check for a forest read back from disk.
    pub fn check(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(StrokeError::CorruptArtifact(
                "forest has no trees".to_string(),
            ));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features).map_err(|reason| {
                StrokeError::CorruptArtifact(format!("tree {}: {}", t, reason))
            })?;
        }
        Ok(())
    }

    pub fn predict_proba_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(StrokeError::ShapeMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    /// Class-1 probability for every row of `x`.
    pub fn predict_proba(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>> {
        let (n_rows, n_cols) = x.shape();
        if n_cols != self.n_features {
            return Err(StrokeError::ShapeMismatch {
                expected: self.n_features,
                actual: n_cols,
            });
        }
        let mut row = vec![0.0; n_cols];
        (0..n_rows)
            .map(|i| {
                for (j, value) in row.iter_mut().enumerate() {
                    *value = *x.get((i, j));
                }
                self.predict_proba_row(&row)
            })
            .collect()
    }

    pub fn label_for(&self, probability: f64) -> u32 {
        u32::from(probability > self.params.threshold)
    }

    pub fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<u32>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| self.label_for(p))
            .collect())
    }
}
