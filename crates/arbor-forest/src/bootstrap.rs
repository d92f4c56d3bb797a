use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::dataset::{Dataset, SENTINEL_ROW_ID};
use crate::error::ForestError;

/// Source of uniform random integers for bootstrap draws and tree seeding.
pub trait RandomSource {
    /// Uniform integer in `[min, max]`, both inclusive. Callers guarantee
    /// `min <= max`.
    fn next_in_range(&mut self, min: usize, max: usize) -> usize;

    /// Seed for an independent per-tree source.
    fn next_seed(&mut self) -> u64;
}

/// [`RandomSource`] backed by a seeded ChaCha8 stream.
#[derive(Debug, Clone)]
pub struct SeededSource {
    rng: ChaCha8Rng,
}

impl SeededSource {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededSource {
    fn next_in_range(&mut self, min: usize, max: usize) -> usize {
        self.rng.gen_range(min..=max)
    }

    fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}

/// What the sampler does with a draw that does not resolve to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawPolicy {
    /// Drop the draw; the sample may come out smaller than requested.
    #[default]
    Discard,
    /// Draw again until the sample reaches the requested size.
    Retry,
}

/// A multiset of dataset row positions drawn with replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapSample {
    rows: Vec<usize>,
    out_of_bag: Vec<usize>,
    n_requested: usize,
    n_discarded: usize,
}

impl BootstrapSample {
    /// Every sampleable row exactly once, with an empty out-of-bag set.
    #[must_use]
    pub fn all(dataset: &Dataset) -> Self {
        let rows = dataset.sampleable_positions();
        Self {
            n_requested: rows.len(),
            rows,
            out_of_bag: Vec::new(),
            n_discarded: 0,
        }
    }

    /// Drawn row positions in draw order; repeats are kept.
    #[must_use]
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Identifiers of the distinct rows in the sample.
    #[must_use]
    pub fn ids<'a>(&self, dataset: &'a Dataset) -> BTreeSet<&'a str> {
        self.rows
            .iter()
            .filter_map(|&p| dataset.row_id(p))
            .collect()
    }

    /// Sampleable row positions never drawn, ascending.
    #[must_use]
    pub fn out_of_bag(&self) -> &[usize] {
        &self.out_of_bag
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The sample size the caller asked for.
    #[must_use]
    pub fn n_requested(&self) -> usize {
        self.n_requested
    }

    /// Draws dropped under [`DrawPolicy::Discard`].
    #[must_use]
    pub fn n_discarded(&self) -> usize {
        self.n_discarded
    }
}

/// Draw `count` row positions with replacement.
///
/// Each draw is an integer `k` in `[1, row_count - 1]`, looked up as the row
/// id `k`. Draws that match the sentinel id or no row at all are handled per
/// `policy`.
///
/// # Errors
///
/// Returns [`ForestError::InvalidSampleCount`] if `count` is zero, or
/// [`ForestError::NoSampleableRows`] if no draw can ever resolve.
#[instrument(skip_all, fields(count = count, policy = ?policy))]
pub fn sample(
    dataset: &Dataset,
    count: usize,
    policy: DrawPolicy,
    source: &mut impl RandomSource,
) -> Result<BootstrapSample, ForestError> {
    if count == 0 {
        return Err(ForestError::InvalidSampleCount { count });
    }
    let max_draw = dataset.row_count() - 1;
    let reachable = (1..=max_draw).any(|k| resolve(dataset, k).is_some());
    if !reachable {
        return Err(ForestError::NoSampleableRows);
    }

    let mut rows = Vec::with_capacity(count);
    let mut n_discarded = 0;
    let mut attempts = 0;
    while attempts < count || (policy == DrawPolicy::Retry && rows.len() < count) {
        attempts += 1;
        let k = source.next_in_range(1, max_draw);
        match resolve(dataset, k) {
            Some(position) => rows.push(position),
            None if policy == DrawPolicy::Discard => n_discarded += 1,
            None => {}
        }
        if policy == DrawPolicy::Retry && rows.len() == count {
            break;
        }
    }

    let mut in_bag = vec![false; dataset.n_data_rows()];
    for &p in &rows {
        in_bag[p] = true;
    }
    let out_of_bag = dataset
        .sampleable_positions()
        .into_iter()
        .filter(|&p| !in_bag[p])
        .collect::<Vec<_>>();

    debug!(
        drawn = rows.len(),
        n_discarded,
        n_oob = out_of_bag.len(),
        "bootstrap sample drawn"
    );

    Ok(BootstrapSample {
        rows,
        out_of_bag,
        n_requested: count,
        n_discarded,
    })
}

fn resolve(dataset: &Dataset, draw: usize) -> Option<usize> {
    let id = draw.to_string();
    if id == SENTINEL_ROW_ID {
        return None;
    }
    dataset.position_of(&id)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use super::{BootstrapSample, DrawPolicy, RandomSource, SeededSource, sample};
    use crate::dataset::Dataset;
    use crate::dataset::tests::{four_row_table, records};
    use crate::error::ForestError;

    /// Replays a fixed draw sequence, then repeats the last value.
    pub(crate) struct Scripted(pub VecDeque<usize>);

    impl RandomSource for Scripted {
        fn next_in_range(&mut self, min: usize, max: usize) -> usize {
            let v = if self.0.len() > 1 {
                self.0.pop_front().unwrap()
            } else {
                *self.0.front().unwrap()
            };
            assert!((min..=max).contains(&v), "{v} outside [{min}, {max}]");
            v
        }

        fn next_seed(&mut self) -> u64 {
            self.next_in_range(0, usize::MAX) as u64
        }
    }

    #[test]
    fn draws_are_repeatable_and_keep_duplicates() {
        let ds = four_row_table();
        let mut src = Scripted(VecDeque::from([2, 2, 4, 1]));
        let s = sample(&ds, 4, DrawPolicy::Discard, &mut src).unwrap();
        assert_eq!(s.rows(), [1, 1, 3, 0]);
        assert_eq!(s.out_of_bag(), [2]);
        assert_eq!(s.ids(&ds).into_iter().collect::<Vec<_>>(), ["1", "2", "4"]);
    }

    #[test]
    fn same_seed_same_sample() {
        let ds = four_row_table();
        let a = sample(&ds, 10, DrawPolicy::Discard, &mut SeededSource::new(7)).unwrap();
        let b = sample(&ds, 10, DrawPolicy::Discard, &mut SeededSource::new(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
    }

    #[test]
    fn discard_shrinks_sample_on_gaps() {
        // Ids 1 and 3 exist; a draw of 2 lands in the gap.
        let ds = Dataset::from_records(records(&[
            &["id", "label"],
            &["1", "a"],
            &["3", "b"],
            &["0", "c"],
        ]))
        .unwrap();
        let mut src = Scripted(VecDeque::from([2, 1, 3]));
        let s = sample(&ds, 3, DrawPolicy::Discard, &mut src).unwrap();
        assert_eq!(s.rows(), [0, 1]);
        assert_eq!(s.n_discarded(), 1);
        assert_eq!(s.n_requested(), 3);
    }

    #[test]
    fn retry_fills_the_sample() {
        let ds = Dataset::from_records(records(&[
            &["id", "label"],
            &["1", "a"],
            &["3", "b"],
            &["0", "c"],
        ]))
        .unwrap();
        let mut src = Scripted(VecDeque::from([2, 2, 1, 2, 3]));
        let s = sample(&ds, 2, DrawPolicy::Retry, &mut src).unwrap();
        assert_eq!(s.rows(), [0, 1]);
        assert_eq!(s.n_discarded(), 0);
    }

    #[test]
    fn sentinel_rows_are_never_out_of_bag() {
        let ds = Dataset::from_records(records(&[
            &["id", "label"],
            &["1", "a"],
            &["0", "b"],
        ]))
        .unwrap();
        let mut src = Scripted(VecDeque::from([1]));
        let s = sample(&ds, 1, DrawPolicy::Discard, &mut src).unwrap();
        assert_eq!(s.rows(), [0]);
        assert!(s.out_of_bag().is_empty());
    }

    #[test]
    fn zero_count_is_rejected() {
        let err = sample(
            &four_row_table(),
            0,
            DrawPolicy::Discard,
            &mut SeededSource::new(1),
        )
        .unwrap_err();
        assert!(matches!(err, ForestError::InvalidSampleCount { count: 0 }));
    }

    #[test]
    fn unreachable_ids_are_rejected() {
        let ds = Dataset::from_records(records(&[
            &["id", "label"],
            &["a", "x"],
            &["b", "y"],
        ]))
        .unwrap();
        let err = sample(&ds, 3, DrawPolicy::Retry, &mut SeededSource::new(1)).unwrap_err();
        assert!(matches!(err, ForestError::NoSampleableRows));
    }

    #[test]
    fn all_takes_each_row_once() {
        let s = BootstrapSample::all(&four_row_table());
        assert_eq!(s.rows(), [0, 1, 2, 3]);
        assert!(s.out_of_bag().is_empty());
    }
}
