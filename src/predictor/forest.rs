//! Random-forest evaluation for exported tree ensembles.
//!
//! Models are trained offline and exported to JSON with the same per-node
//! arrays a fitted decision tree exposes (`children_left`,
//! `children_right`, `feature`, `threshold`, `value`). A leaf has both
//! children set to -1. Inputs are compared at f32 precision because the
//! training library casts features to f32 before splitting.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::{Classification, Classifier, Regressor};
use crate::error::PredictorError;
use crate::features::feature_columns;

const TREE_LEAF: i64 = -1;

/// Input columns of the status classifier.
pub const CLASSIFIER_COLUMNS: [&str; 3] = ["water_pH", "TDS", "water_temp"];

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct ForestFile {
    n_features: usize,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    #[serde(default)]
    classes: Option<Vec<i64>>,
    trees: Vec<TreeArrays>,
}

#[derive(Debug, Deserialize)]
struct TreeArrays {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<Vec<f64>>,
}

#[derive(Debug)]
struct Tree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<usize>,
    threshold: Vec<f64>,
    value: Vec<Vec<f64>>,
}

impl Tree {
    fn from_arrays(arrays: TreeArrays, n_features: usize, value_width: usize) -> Result<Self, ModelLoadError> {
        let nodes = arrays.children_left.len();
        if nodes == 0 {
            return Err(ModelLoadError::Invalid("tree has no nodes".into()));
        }
        if arrays.children_right.len() != nodes
            || arrays.feature.len() != nodes
            || arrays.threshold.len() != nodes
            || arrays.value.len() != nodes
        {
            return Err(ModelLoadError::Invalid(
                "tree definition invalid: node array length mismatch".into(),
            ));
        }

        let mut feature = Vec::with_capacity(nodes);
        for node in 0..nodes {
            let (left, right) = (arrays.children_left[node], arrays.children_right[node]);
            if arrays.value[node].len() != value_width {
                return Err(ModelLoadError::Invalid(format!(
                    "node {node} has {} values, expected {value_width}",
                    arrays.value[node].len()
                )));
            }

            if left == TREE_LEAF && right == TREE_LEAF {
                feature.push(0);
                continue;
            }

            // Children always come after their parent; this also rules out cycles.
            for child in [left, right] {
                if child <= node as i64 || child >= nodes as i64 {
                    return Err(ModelLoadError::Invalid(format!(
                        "node {node} has out-of-range child {child}"
                    )));
                }
            }
            let f = arrays.feature[node];
            if f < 0 || f as usize >= n_features {
                return Err(ModelLoadError::Invalid(format!(
                    "node {node} splits on feature {f}, model has {n_features}"
                )));
            }
            feature.push(f as usize);
        }

        Ok(Self {
            children_left: arrays.children_left,
            children_right: arrays.children_right,
            feature,
            threshold: arrays.threshold,
            value: arrays.value,
        })
    }

    fn leaf(&self, features: &[f64]) -> &[f64] {
        let mut node = 0usize;
        loop {
            let left = self.children_left[node];
            if left == TREE_LEAF {
                return &self.value[node];
            }
            let x = features[self.feature[node]] as f32;
            node = if f64::from(x) <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }
    }
}

fn read_forest(path: &Path) -> Result<ForestFile, ModelLoadError> {
    let text = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn check_feature_names(names: Option<&[String]>, expected: &[&str]) -> Result<(), ModelLoadError> {
    match names {
        Some(names) if !names.iter().map(String::as_str).eq(expected.iter().copied()) => {
            Err(ModelLoadError::Invalid(format!(
                "model feature names {names:?} do not match expected {expected:?}"
            )))
        }
        _ => Ok(()),
    }
}

fn build_trees(trees: Vec<TreeArrays>, n_features: usize, value_width: usize) -> Result<Vec<Tree>, ModelLoadError> {
    if trees.is_empty() {
        return Err(ModelLoadError::Invalid("forest contains no trees".into()));
    }
    trees
        .into_iter()
        .map(|arrays| Tree::from_arrays(arrays, n_features, value_width))
        .collect()
}

/// Mean-of-trees regressor.
#[derive(Debug)]
pub struct ForestRegressor {
    n_features: usize,
    trees: Vec<Tree>,
}

impl ForestRegressor {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        Self::from_forest(read_forest(path.as_ref())?)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelLoadError> {
        let forest = serde_json::from_str(json).map_err(|source| ModelLoadError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::from_forest(forest)
    }

    fn from_forest(forest: ForestFile) -> Result<Self, ModelLoadError> {
        if forest.n_features != feature_columns().len() {
            return Err(ModelLoadError::Invalid(format!(
                "regressor expects {} features, model has {}",
                feature_columns().len(),
                forest.n_features
            )));
        }
        check_feature_names(forest.feature_names.as_deref(), feature_columns())?;
        Ok(Self {
            n_features: forest.n_features,
            trees: build_trees(forest.trees, forest.n_features, 1)?,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for ForestRegressor {
    fn predict(&self, features: &[f64]) -> Result<f64, PredictorError> {
        if features.len() != self.n_features {
            return Err(PredictorError::FeatureCount {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        let sum: f64 = self.trees.iter().map(|t| t.leaf(features)[0]).sum();
        let prediction = sum / self.trees.len() as f64;
        if !prediction.is_finite() {
            return Err(PredictorError::NonFinite(prediction));
        }
        Ok(prediction)
    }
}

/// Binary classifier averaging per-tree class distributions.
#[derive(Debug)]
pub struct ForestClassifier {
    classes: Vec<i64>,
    positive: usize,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        Self::from_forest(read_forest(path.as_ref())?)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelLoadError> {
        let forest = serde_json::from_str(json).map_err(|source| ModelLoadError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::from_forest(forest)
    }

    fn from_forest(forest: ForestFile) -> Result<Self, ModelLoadError> {
        if forest.n_features != CLASSIFIER_COLUMNS.len() {
            return Err(ModelLoadError::Invalid(format!(
                "classifier expects {} features, model has {}",
                CLASSIFIER_COLUMNS.len(),
                forest.n_features
            )));
        }
        check_feature_names(forest.feature_names.as_deref(), &CLASSIFIER_COLUMNS)?;

        let classes = forest.classes.unwrap_or_else(|| vec![0, 1]);
        let positive = classes
            .iter()
            .position(|&c| c == 1)
            .filter(|_| classes.len() == 2)
            .ok_or_else(|| {
                ModelLoadError::Invalid(format!("expected binary classes [0, 1], got {classes:?}"))
            })?;

        Ok(Self {
            trees: build_trees(forest.trees, forest.n_features, classes.len())?,
            classes,
            positive,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn probabilities(&self, features: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf(features);
            let total: f64 = leaf.iter().sum();
            let normalizer = if total > 0.0 { total } else { 1.0 };
            for (p, v) in proba.iter_mut().zip(leaf) {
                *p += v / normalizer;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }
}

impl Classifier for ForestClassifier {
    fn classify(&self, ph: f64, tds: f64, temperature: f64) -> Result<Classification, PredictorError> {
        let proba = self.probabilities(&[ph, tds, temperature]);
        if let Some(bad) = proba.iter().find(|p| !p.is_finite()) {
            return Err(PredictorError::NonFinite(*bad));
        }

        // First maximum wins, so an exact 0.5/0.5 split yields class 0.
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }
        let label = u8::try_from(self.classes[best])
            .map_err(|_| PredictorError::Malformed(format!("class {} is not 0/1", self.classes[best])))?;

        Ok(Classification {
            label,
            probability: proba[self.positive],
        })
    }
}
