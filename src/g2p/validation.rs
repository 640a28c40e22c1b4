//! # Variant validation and scoring
//!
//! Each ranked variant runs through a fixed series of checks before it is scored. The
//! first failed check decides the variant's rejection reason and nothing after it runs.
//! A rejection is an ordinary result, and every variant produces exactly one output row.

use serde::Serialize;

use crate::consensus::variant_tally::RankedVariant;
use crate::errors::ScorerError;
use crate::g2p::scoring::G2pScorer;
use crate::g2p::translation::{Translator, AMBIGUOUS_RESIDUE, STOP_RESIDUE};
use crate::utils::read_utils::strip_gaps_and_intervals;
use crate::AMBIGUOUS_BASE;

/// variants with more than this fraction of N calls are not worth translating
pub const MAX_AMBIGUOUS_FRACTION: f64 = 0.5;

/// V3 loop length bounds, in residues, inclusive
pub const MIN_V3_LENGTH: usize = 32;
pub const MAX_V3_LENGTH: usize = 40;

const CYSTEINE: char = 'C';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    LowQuality,
    NotDivisibleByThree,
    ZeroLength,
    Cysteines,
    Ambiguous,
    StopCodons,
    Length,
    FailedToAlign,
}

impl RejectionReason {
    pub fn label(&self) -> &'static str {
        match self {
            RejectionReason::LowQuality => "low quality",
            RejectionReason::NotDivisibleByThree => "notdiv3",
            RejectionReason::ZeroLength => "zerolength",
            RejectionReason::Cysteines => "cysteines",
            RejectionReason::Ambiguous => "ambiguous",
            RejectionReason::StopCodons => "stop codons",
            RejectionReason::Length => "length",
            RejectionReason::FailedToAlign => "failed to align",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome for one variant. A rejection keeps whatever was computed before the failed
/// check: the translated protein from the protein checks onward, the g2p score when
/// alignment fails.
#[derive(Clone, Debug, PartialEq)]
pub enum ScoreResult {
    Rejected {
        reason: RejectionReason,
        g2p: Option<f64>,
        protein: Option<String>,
    },
    Scored {
        g2p: f64,
        fpr: f64,
        aligned: String,
    },
}

impl ScoreResult {
    fn rejected(reason: RejectionReason) -> ScoreResult {
        ScoreResult::Rejected { reason, g2p: None, protein: None }
    }

    fn rejected_protein(reason: RejectionReason, protein: String) -> ScoreResult {
        ScoreResult::Rejected { reason, g2p: None, protein: Some(protein) }
    }

    #[allow(dead_code)]
    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            ScoreResult::Rejected { reason, .. } => Some(*reason),
            ScoreResult::Scored { .. } => None,
        }
    }

    pub fn to_row(&self, sample: &str, variant: &RankedVariant) -> G2pRow {
        let (g2p, fpr, aligned, error) = match self {
            ScoreResult::Rejected { reason, g2p, protein } => (*g2p, None, protein.clone(), Some(reason.label().to_string())),
            ScoreResult::Scored { g2p, fpr, aligned } => (Some(*g2p), Some(*fpr), Some(aligned.clone()), None),
        };
        G2pRow { sample: sample.to_string(), rank: variant.rank, count: variant.count, g2p, fpr, aligned, error }
    }
}

/// One line of the g2p output table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct G2pRow {
    pub sample: String,
    pub rank: usize,
    pub count: usize,
    pub g2p: Option<f64>,
    pub fpr: Option<f64>,
    pub aligned: Option<String>,
    pub error: Option<String>,
}

/// Runs the checks, translation and scoring for ranked variants
pub struct VariantValidator<'a, T: Translator, S: G2pScorer> {
    translator: &'a T,
    scorer: &'a S,
    matrix: S::Matrix,
    reference: String,
}

impl<'a, T: Translator, S: G2pScorer> VariantValidator<'a, T, S> {
    /// load the named matrix from the scorer up front, so a missing matrix fails before any variant is scored
    pub fn new(translator: &'a T, scorer: &'a S, matrix_name: &str, reference: &str) -> Result<Self, ScorerError> {
        let matrix = scorer.load_matrix(matrix_name)?;
        Ok(VariantValidator { translator, scorer, matrix, reference: reference.to_string() })
    }

    /// Check, translate and score one merged variant.
    ///
    /// # Errors
    ///
    /// Only failures of the scorer itself are errors; every biological problem with the
    /// variant is a [`ScoreResult::Rejected`].
    pub fn score_variant(&self, variant: &RankedVariant) -> Result<ScoreResult, ScorerError> {
        let gapped = variant.sequence.as_bytes();
        let seq = strip_gaps_and_intervals(gapped);

        let ambiguous = seq.iter().filter(|b| **b == AMBIGUOUS_BASE).count();
        if ambiguous as f64 > MAX_AMBIGUOUS_FRACTION * seq.len() as f64 {
            return Ok(ScoreResult::rejected(RejectionReason::LowQuality));
        }

        if gapped.len() % 3 != 0 {
            return Ok(ScoreResult::rejected(RejectionReason::NotDivisibleByThree));
        }

        if seq.is_empty() {
            return Ok(ScoreResult::rejected(RejectionReason::ZeroLength));
        }

        let protein = self.translator.translate(&seq);

        if !protein.starts_with(CYSTEINE) || !protein.ends_with(CYSTEINE) {
            return Ok(ScoreResult::rejected_protein(RejectionReason::Cysteines, protein));
        }
        if protein.contains(AMBIGUOUS_RESIDUE) {
            return Ok(ScoreResult::rejected_protein(RejectionReason::Ambiguous, protein));
        }
        if protein.contains(STOP_RESIDUE) {
            return Ok(ScoreResult::rejected_protein(RejectionReason::StopCodons, protein));
        }
        let length = protein.chars().count();
        if length < MIN_V3_LENGTH || length > MAX_V3_LENGTH {
            return Ok(ScoreResult::rejected_protein(RejectionReason::Length, protein));
        }

        let alignment = self.scorer.score(&seq, &self.reference, &self.matrix)?;
        match alignment.flatten() {
            None => {
                debug!("variant {} failed to align with score {}", variant.rank, alignment.score);
                Ok(ScoreResult::Rejected { reason: RejectionReason::FailedToAlign, g2p: Some(alignment.score), protein: None })
            }
            Some(aligned) => {
                let fpr = self.scorer.score_to_fpr(alignment.score)?;
                Ok(ScoreResult::Scored { g2p: alignment.score, fpr, aligned })
            }
        }
    }
}
