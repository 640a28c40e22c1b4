//! Error types for the structural failures of a run.
//!
//! Biological rejections of a variant (low quality, stop codons, ...) are not errors;
//! they are carried as [`crate::g2p::validation::RejectionReason`] values.

use thiserror::Error;

/// Problems applying a CIGAR string to a read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CigarError {
    #[error("Invalid CIGAR string: '{cigar}'")]
    InvalidCigarSyntax { cigar: String },

    #[error("Unsupported CIGAR token '{token}' in '{cigar}'")]
    MalformedCigar { cigar: String, token: String },

    #[error("CIGAR string '{cigar}' is too long for sequence '{sequence}'")]
    CigarTooLong { cigar: String, sequence: String },

    #[error("CIGAR string '{cigar}' is too short for sequence '{sequence}'")]
    CigarTooShort { cigar: String, sequence: String },

    #[error("Sequence length {sequence_length} does not match quality length {quality_length}")]
    SequenceQualityMismatch {
        sequence_length: usize,
        quality_length: usize,
    },
}

/// Problems pairing reads by fragment name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairingError {
    #[error("Fragment '{fragment}' appears more than twice in the input")]
    FragmentSeenTooOften { fragment: String },
}

/// Problems with an individual input row, before any CIGAR work
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Row {row} has {found} fields, expected {expected}")]
    WrongFieldCount {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Row {row}: unable to parse field '{field}' from value '{value}'")]
    UnparsableField {
        row: usize,
        field: String,
        value: String,
    },

    #[error("Row {row}: read '{fragment}' contains non-nucleotide characters")]
    InvalidSequence { row: usize, fragment: String },
}

/// Failures of the g2p scoring collaborator itself (not alignment failures)
#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("No g2p scorer command configured; set scorer_command in the settings file or pass --scorer-command")]
    NotConfigured,

    #[error("Unable to run scorer command '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Scorer command '{command}' exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Unable to parse scorer output '{output}'")]
    BadOutput { output: String },
}

/// Any structural failure that stops a record from being reconstructed and paired
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("Fragment '{fragment}': {source}")]
    Cigar {
        fragment: String,
        #[source]
        source: CigarError,
    },

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Record(#[from] RecordError),
}
