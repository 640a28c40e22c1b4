//! # CIGAR reconstruction
//!
//! Rebuilds a read in consensus coordinates from its leftmost position and CIGAR
//! string. Bases upstream of the read are padded with gaps, deletions become gaps,
//! soft clips are dropped, and insertions are kept only when every inserted base is
//! of high quality. The result can then be clipped to a region of interest.

use rust_htslib::bam::record::{Cigar, CigarString};

use crate::errors::CigarError;
use crate::utils::read_utils::{all_at_least, u8s};
use crate::{BLANK_QUALITY, GAP_BASE, PAD_QUALITY};

/// Minimum Phred score every base of an insertion needs before the insertion is kept
pub const QMIN: i32 = 20;

/// A read laid out against the consensus. `sequence` and `quality` always have the same length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconstructedRead {
    pub sequence: Vec<u8>,
    pub quality: Vec<u8>,
}

impl ReconstructedRead {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    fn push_span(&mut self, bases: &[u8], quals: &[u8]) {
        self.sequence.extend_from_slice(bases);
        self.quality.extend_from_slice(quals);
    }

    fn push_repeated(&mut self, base: u8, qual: u8, length: usize) {
        self.sequence.extend(std::iter::repeat(base).take(length));
        self.quality.extend(std::iter::repeat(qual).take(length));
    }

    /// keep the inclusive consensus range [clip_from, clip_to]; bounds past the end saturate
    fn clip(self, clip_from: usize, clip_to: Option<usize>) -> ReconstructedRead {
        let end = match clip_to {
            Some(x) => std::cmp::min(x.saturating_add(1), self.len()),
            None => self.len(),
        };
        let start = std::cmp::min(clip_from, end);
        ReconstructedRead {
            sequence: self.sequence[start..end].to_vec(),
            quality: self.quality[start..end].to_vec(),
        }
    }
}

impl std::fmt::Display for ReconstructedRead {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}\n{}", u8s(&self.sequence), u8s(&self.quality))
    }
}

const CIGAR_OPERATIONS: &[u8] = b"MIDNSHPX=";

/// true if the text is one or more `<digits><op>` tokens with nothing left over
fn is_cigar_syntax(cigar: &[u8]) -> bool {
    let mut digits = 0;
    for c in cigar {
        if c.is_ascii_digit() {
            digits += 1;
        } else if CIGAR_OPERATIONS.contains(c) && digits > 0 {
            digits = 0;
        } else {
            return false;
        }
    }
    !cigar.is_empty() && digits == 0
}

/// Parse a textual CIGAR. Anything outside `(<positive integer><op>)+` is rejected.
pub fn parse_cigar(cigar: &str) -> Result<CigarString, CigarError> {
    let invalid = || CigarError::InvalidCigarSyntax { cigar: cigar.to_string() };

    if !is_cigar_syntax(cigar.as_bytes()) {
        return Err(invalid());
    }
    let parsed = CigarString::try_from(cigar.as_bytes()).map_err(|_| invalid())?;
    if parsed.is_empty() || parsed.iter().any(|op| op.len() == 0) {
        return Err(invalid());
    }
    Ok(parsed)
}

/// Apply a CIGAR to a read with the default insertion quality floor, see
/// [`reconstruct_with_min_insertion_quality`]. `12M` over `AAACAACCACCC` clipped to
/// positions 3 through 9 gives `CAACCA`.
#[allow(dead_code)]
pub fn reconstruct(cigar: &str,
                   sequence: &[u8],
                   quality: &[u8],
                   position: usize,
                   clip_from: usize,
                   clip_to: Option<usize>) -> Result<ReconstructedRead, CigarError> {
    reconstruct_with_min_insertion_quality(cigar, sequence, quality, position, clip_from, clip_to, QMIN)
}

/// Apply a CIGAR string to a read, producing a sequence/quality pair in consensus coordinates.
///
/// # Arguments
///
/// * `cigar` - the CIGAR string relating the read to the consensus
/// * `sequence` - the bases of the read
/// * `quality` - Phred+33 quality codes, one per base
/// * `position` - 0-based consensus position of the first aligned base; that many gaps are prepended
/// * `clip_from` - first consensus position kept in the output
/// * `clip_to` - last consensus position kept in the output (inclusive), `None` keeps everything
/// * `min_insertion_quality` - insertions are kept only if every base reaches this Phred score
///
/// # Errors
///
/// Fails on CIGAR syntax errors, unsupported operations (`H`, `P`), a CIGAR that
/// consumes more or fewer bases than the read has, or mismatched sequence and quality lengths.
pub fn reconstruct_with_min_insertion_quality(cigar: &str,
                                              sequence: &[u8],
                                              quality: &[u8],
                                              position: usize,
                                              clip_from: usize,
                                              clip_to: Option<usize>,
                                              min_insertion_quality: i32) -> Result<ReconstructedRead, CigarError> {
    if sequence.len() != quality.len() {
        return Err(CigarError::SequenceQualityMismatch {
            sequence_length: sequence.len(),
            quality_length: quality.len(),
        });
    }
    let tokens = parse_cigar(cigar)?;

    let mut read = ReconstructedRead {
        sequence: Vec::with_capacity(position + sequence.len()),
        quality: Vec::with_capacity(position + sequence.len()),
    };
    read.push_repeated(GAP_BASE, PAD_QUALITY, position);

    let mut left: usize = 0;
    for token in tokens.iter() {
        let length = token.len() as usize;
        let right = left + length;
        let too_long = || CigarError::CigarTooLong { cigar: cigar.to_string(), sequence: u8s(sequence) };

        match token {
            Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_) => {
                if right > sequence.len() {
                    return Err(too_long());
                }
                read.push_span(&sequence[left..right], &quality[left..right]);
                left = right;
            }
            Cigar::Del(_) | Cigar::RefSkip(_) => {
                read.push_repeated(GAP_BASE, BLANK_QUALITY, length);
            }
            Cigar::Ins(_) => {
                if right > sequence.len() {
                    return Err(too_long());
                }
                if all_at_least(&quality[left..right], min_insertion_quality) {
                    read.push_span(&sequence[left..right], &quality[left..right]);
                }
                left = right;
            }
            Cigar::SoftClip(_) => {
                if right > sequence.len() {
                    return Err(too_long());
                }
                left = right;
            }
            Cigar::HardClip(_) | Cigar::Pad(_) => {
                return Err(CigarError::MalformedCigar { cigar: cigar.to_string(), token: format!("{}", token) });
            }
        }
        assert_eq!(read.sequence.len(), read.quality.len());
    }

    if left < sequence.len() {
        return Err(CigarError::CigarTooShort { cigar: cigar.to_string(), sequence: u8s(sequence) });
    }

    Ok(read.clip(clip_from, clip_to))
}
