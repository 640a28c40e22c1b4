use indexmap::IndexMap;

use crate::consensus::pair_merger::MergedSequence;

/// A distinct merged sequence with its position in the count ordering (1-based)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedVariant {
    pub rank: usize,
    pub sequence: String,
    pub count: usize,
}

/// Counts of each distinct merged sequence, remembering the order they were first seen.
/// Sequences are compared as rendered strings, so case and gap characters matter.
#[derive(Debug, Default)]
pub struct VariantTally {
    counts: IndexMap<String, usize>,
}

impl VariantTally {
    pub fn new() -> VariantTally {
        VariantTally::default()
    }

    pub fn add(&mut self, merged: &MergedSequence) {
        self.add_sequence(merged.to_string());
    }

    pub fn add_sequence(&mut self, sequence: String) {
        *self.counts.entry(sequence).or_insert(0) += 1;
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Consume the tally and order variants by count, highest first.
    ///
    /// Ties come out in reverse order of first appearance: the entries are stably sorted by
    /// ascending count and the whole list is then reversed.
    pub fn into_ranked(self) -> Vec<RankedVariant> {
        let mut entries: Vec<(String, usize)> = self.counts.into_iter().collect();
        entries.sort_by_key(|(_sequence, count)| *count);
        entries.reverse();

        entries.into_iter().enumerate().map(|(i, (sequence, count))| {
            RankedVariant { rank: i + 1, sequence, count }
        }).collect()
    }
}
