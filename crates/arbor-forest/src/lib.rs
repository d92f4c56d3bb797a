//! Bagged decision-tree forests over string-typed tables.
//!
//! Loads a rectangular table into a [`Dataset`] keyed by the row id in
//! column 0, draws bootstrap samples by id, grows Gini-split trees in a node
//! arena (each column split at most once per path), and aggregates them into
//! a [`Forest`] that predicts by majority vote. Tree growth runs in parallel
//! via rayon; candidate scoring goes through a pluggable [`ComputeBackend`].

mod backend;
mod bootstrap;
mod cancel;
mod columns;
mod config;
mod confusion;
mod dataset;
mod error;
mod forest;
mod importance;
mod node;
mod oob;
mod predict;
mod result;
mod schema;
mod split;
mod tree;

pub use backend::{BackendKind, ComputeBackend, ParallelBackend, SequentialBackend};
pub use bootstrap::{BootstrapSample, DrawPolicy, RandomSource, SeededSource, sample};
pub use cancel::CancellationToken;
pub use columns::{Column, ColumnRegistry, PathScope};
pub use config::{ForestConfig, OobMode};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use dataset::{ColumnKind, Dataset, SENTINEL_ROW_ID};
pub use error::ForestError;
pub use forest::Forest;
pub use importance::RankedFeature;
pub use node::{
    ColumnIndex, Impurity, Node, NodeIndex, NodeKind, SplitTest, SplitValue, StopReason,
};
pub use oob::OobScore;
pub use predict::ClassVotes;
pub use result::{ForestResult, TrainingMetadata};
pub use schema::{FieldSource, FieldValue, FrameRow, LabelColumn, Schema, TrainingFrame};
pub use split::{
    BestSplit, SplitEvaluator, TIE_TOLERANCE, gini, split_impurity, weighted_gini,
};
pub use tree::{Tree, TreeBuilder, TreeConfig};
