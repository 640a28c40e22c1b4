use std::collections::{HashMap, HashSet};

use crate::cigar::reconstruct::{ReconstructedRead, QMIN};
use crate::errors::PairingError;
use crate::utils::read_utils::phred_score;
use crate::{AMBIGUOUS_BASE, GAP_BASE, UNCOVERED_BASE};

/// minimum base quality for a call to survive the merge
pub const QCUT: i32 = 10;

/// minimum quality gap between two disagreeing bases before one of them can win
pub const QDELTA: i32 = 5;

/// Quality cutoffs that drive reconstruction and merging
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityThresholds {
    pub qmin: i32,
    pub qcut: i32,
    pub qdelta: i32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds { qmin: QMIN, qcut: QCUT, qdelta: QDELTA }
    }
}

/// One position of a merged read pair. `Ambiguous`, `Gap` and `Uncovered` are three
/// different statements: the reads disagree or are too poor to call (N), the consensus
/// has a deletion here (-), or neither read reached this position (n).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MergedBase {
    Base(u8),
    Ambiguous,
    Gap,
    Uncovered,
}

impl MergedBase {
    /// wrap a base taken from one of the reads
    pub fn call(base: u8) -> MergedBase {
        match base {
            GAP_BASE => MergedBase::Gap,
            AMBIGUOUS_BASE => MergedBase::Ambiguous,
            x => MergedBase::Base(x),
        }
    }

    pub fn symbol(&self) -> u8 {
        match self {
            MergedBase::Base(x) => *x,
            MergedBase::Ambiguous => AMBIGUOUS_BASE,
            MergedBase::Gap => GAP_BASE,
            MergedBase::Uncovered => UNCOVERED_BASE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct MergedSequence {
    pub bases: Vec<MergedBase>,
}

impl MergedSequence {
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bases.iter().map(|b| b.symbol()).collect()
    }
}

impl std::fmt::Display for MergedSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.to_bytes()))
    }
}

/// Merge two reads of the same fragment, both already in consensus coordinates.
///
/// The shorter read is treated as read one, so the order of the arguments does not matter.
/// Where both reads cover a position, agreeing bases are kept if either is of decent quality,
/// and disagreeing bases are resolved in favour of the clearly better one, or called N.
/// Past the end of read one, read two's padding becomes the unread-interval marker and its
/// real bases are kept on quality alone.
///
/// # Arguments
///
/// * `seq1`, `seq2` - the two reads' bases
/// * `qual1`, `qual2` - their Phred+33 qualities, the same length as the matching read
/// * `thresholds` - the QCUT / QDELTA cutoffs
///
/// # Returns
///
/// * `MergedSequence` - as long as the longer read
pub fn merge_pairs(seq1: &[u8],
                   seq2: &[u8],
                   qual1: &[u8],
                   qual2: &[u8],
                   thresholds: &QualityThresholds) -> MergedSequence {
    assert_eq!(seq1.len(), qual1.len());
    assert_eq!(seq2.len(), qual2.len());

    // seq2 should be the longer one
    let (seq1, seq2, qual1, qual2) = if seq2.len() < seq1.len() {
        (seq2, seq1, qual2, qual1)
    } else {
        (seq1, seq2, qual1, qual2)
    };

    let bases = seq2.iter().zip(qual2.iter()).enumerate().map(|(i, (c2, q2))| {
        let q2 = phred_score(q2);
        if i < seq1.len() {
            merge_covered_position(seq1[i], phred_score(&qual1[i]), *c2, q2, thresholds)
        } else if *c2 == GAP_BASE && q2 == 0 {
            MergedBase::Uncovered
        } else if q2 > thresholds.qcut {
            MergedBase::call(*c2)
        } else {
            MergedBase::Ambiguous
        }
    }).collect();

    MergedSequence { bases }
}

fn merge_covered_position(c1: u8, q1: i32, c2: u8, q2: i32, thresholds: &QualityThresholds) -> MergedBase {
    match (c1, c2) {
        (GAP_BASE, GAP_BASE) => MergedBase::Gap,
        (a, b) if a == b => {
            if q1 > thresholds.qcut || q2 > thresholds.qcut {
                MergedBase::call(a)
            } else {
                MergedBase::Ambiguous
            }
        }
        (a, b) => {
            if (q2 - q1).abs() < thresholds.qdelta {
                MergedBase::Ambiguous
            } else if q1 > std::cmp::max(q2, thresholds.qcut) {
                MergedBase::call(a)
            } else if q2 > thresholds.qcut {
                MergedBase::call(b)
            } else {
                MergedBase::Ambiguous
            }
        }
    }
}

pub fn merge_reads(read1: &ReconstructedRead, read2: &ReconstructedRead, thresholds: &QualityThresholds) -> MergedSequence {
    merge_pairs(&read1.sequence, &read2.sequence, &read1.quality, &read2.quality, thresholds)
}

/// Holds the first read of each fragment until its mate turns up
#[derive(Debug, Default)]
pub struct PendingPairCache {
    pending: HashMap<String, ReconstructedRead>,
    // every fragment ever paired, so this grows with the input rather than the reads in flight
    completed: HashSet<String>,
}

impl PendingPairCache {
    pub fn new() -> PendingPairCache {
        PendingPairCache::default()
    }

    /// Offer a read for pairing. The first read of a fragment is cached and `None` returned;
    /// the second returns both reads (cached one first) and clears the entry. A third
    /// read with the same fragment name is an error.
    pub fn offer(&mut self, fragment: &str, read: ReconstructedRead) -> Result<Option<(ReconstructedRead, ReconstructedRead)>, PairingError> {
        if self.completed.contains(fragment) {
            return Err(PairingError::FragmentSeenTooOften { fragment: fragment.to_string() });
        }
        match self.pending.remove(fragment) {
            Some(mate) => {
                self.completed.insert(fragment.to_string());
                Ok(Some((mate, read)))
            }
            None => {
                self.pending.insert(fragment.to_string(), read);
                Ok(None)
            }
        }
    }

    /// reads still waiting for a mate
    pub fn unpaired(&self) -> usize {
        self.pending.len()
    }

    pub fn pairs_completed(&self) -> usize {
        self.completed.len()
    }
}
