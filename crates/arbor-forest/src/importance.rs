//! Feature importance aggregation across trees.

use std::collections::BTreeMap;

use crate::node::ColumnIndex;
use crate::schema::Schema;

/// A ranked feature column with name, importance score, and rank.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedFeature {
    /// Header position of the column.
    pub column: ColumnIndex,
    /// Header name of the column.
    pub name: String,
    /// Mean impurity decrease of the column, normalized to sum to 1.0 across
    /// feature columns.
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

/// Normalize per-column mean impurity decreases to sum to 1.0 over the
/// feature columns, sort descending and assign 1-based ranks.
///
/// `means` is [`Forest::feature_importance`](crate::Forest::feature_importance):
/// columns absent from it rank with importance 0.0. Ties keep header order.
pub(crate) fn rank_importances(
    means: &BTreeMap<ColumnIndex, f64>,
    schema: &Schema,
) -> Vec<RankedFeature> {
    let mean_of = |column: &ColumnIndex| means.get(column).copied().unwrap_or(0.0);
    let sum: f64 = schema.features().iter().map(mean_of).sum();

    let mut ranked: Vec<RankedFeature> = schema
        .features()
        .iter()
        .map(|&column| RankedFeature {
            column,
            name: schema.column_name(column).unwrap_or_default().to_owned(),
            importance: if sum > 0.0 {
                mean_of(&column) / sum
            } else {
                0.0
            },
            rank: 0,
        })
        .collect();

    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    for (i, feature) in ranked.iter_mut().enumerate() {
        feature.rank = i + 1;
    }
    ranked
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::rank_importances;
    use crate::config::ForestConfig;
    use crate::dataset::Dataset;
    use crate::dataset::tests::four_row_table;
    use crate::node::ColumnIndex;
    use crate::schema::{LabelColumn, TrainingFrame};

    #[test]
    fn separating_column_ranks_first() {
        let ds = four_row_table();
        let frame = TrainingFrame::new(&ds, &LabelColumn::Last).unwrap();
        let means = BTreeMap::from([(ColumnIndex::new(1), 0.5)]);
        let ranked = rank_importances(&means, frame.schema());

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].column, ColumnIndex::new(1));
        assert_eq!(ranked[0].name, "A");
        assert_eq!(ranked[0].rank, 1);
        assert!((ranked[0].importance - 1.0).abs() < 1e-12);
        assert_eq!(ranked[1].rank, 2);
        assert!(ranked[1].importance.abs() < f64::EPSILON);
    }

    #[test]
    fn no_trees_gives_zero_importances() {
        let ds = four_row_table();
        let frame = TrainingFrame::new(&ds, &LabelColumn::Last).unwrap();
        let ranked = rank_importances(&BTreeMap::new(), frame.schema());
        assert!(ranked.iter().all(|f| f.importance == 0.0));
        let sum: usize = ranked.iter().map(|f| f.rank).sum();
        assert_eq!(sum, 3);
    }

    #[test]
    fn means_not_totals_are_normalized() {
        let means = BTreeMap::from([(ColumnIndex::new(1), 0.3), (ColumnIndex::new(2), 0.1)]);
        let ds = four_row_table();
        let frame = TrainingFrame::new(&ds, &LabelColumn::Last).unwrap();
        let ranked = rank_importances(&means, frame.schema());
        assert!((ranked[0].importance - 0.75).abs() < 1e-12);
        assert!((ranked[1].importance - 0.25).abs() < 1e-12);
    }

    #[test]
    fn ranked_importances_match_feature_importance() {
        // `a` decides most labels and `b` flips every fifth row, so the two
        // columns are split on at different rates.
        let mut rows = vec![vec![
            "id".to_string(),
            "a".to_string(),
            "b".to_string(),
            "label".to_string(),
        ]];
        for i in 0..40u32 {
            let label = if (i % 4 < 2) != (i % 5 == 0) { "p" } else { "q" };
            rows.push(vec![
                (i + 1).to_string(),
                (i % 4).to_string(),
                (i % 5).to_string(),
                label.to_string(),
            ]);
        }
        let ds = Dataset::from_records(rows).unwrap();
        let result = ForestConfig::new(10)
            .unwrap()
            .with_seed(5)
            .fit(&ds, &LabelColumn::Last)
            .unwrap();
        let forest = result.forest();

        let means = forest.feature_importance();
        let sum: f64 = means.values().sum();
        assert!(sum > 0.0);
        for feature in forest.ranked_importances() {
            let expected = means.get(&feature.column).copied().unwrap_or(0.0) / sum;
            assert!(
                (feature.importance - expected).abs() < 1e-12,
                "column {} ranked {} but normalized mean is {expected}",
                feature.column,
                feature.importance
            );
        }
    }
}
