//! # g2p scoring
//!
//! The PSSM itself lives outside this crate. [`G2pScorer`] is the seam: something that can
//! load a named matrix, score a V3 nucleotide sequence against a reference, and map a
//! score onto a false positive rate. [`ExternalG2pScorer`] fulfils it by running a
//! separate program.

use std::process::Command;

use itertools::Itertools;

use crate::errors::ScorerError;

/// Score and aligned protein from the PSSM scorer. `aligned` holds one entry per
/// reference position, each entry the residue(s) the sample placed there. `None`
/// means the sequence could not be aligned.
#[derive(Clone, Debug, PartialEq)]
pub struct G2pAlignment {
    pub score: f64,
    pub aligned: Option<Vec<String>>,
}

impl G2pAlignment {
    /// Render the aligned protein as one string. Positions holding a single residue
    /// contribute that residue; positions holding several are written as `[..]`.
    pub fn flatten(&self) -> Option<String> {
        self.aligned.as_ref().map(|positions| {
            positions.iter().map(|p| {
                if p.chars().count() == 1 { p.clone() } else { format!("[{}]", p) }
            }).join("")
        })
    }
}

pub trait G2pScorer {
    type Matrix;

    fn load_matrix(&self, name: &str) -> Result<Self::Matrix, ScorerError>;

    fn score(&self, sequence: &[u8], reference: &str, matrix: &Self::Matrix) -> Result<G2pAlignment, ScorerError>;

    fn score_to_fpr(&self, score: f64) -> Result<f64, ScorerError>;
}

/// Runs a g2p scoring program for each request. The program is called as
///
/// * `<command> matrix <name>` - exit status 0 if it knows the matrix
/// * `<command> score <matrix> <reference> <sequence>` - prints `<score>\t<aligned>`, where
///   aligned positions are separated by commas; a missing or `-` aligned field means the
///   sequence failed to align
/// * `<command> fpr <score>` - prints the false positive rate
///
/// `command` may carry leading arguments (`python3 g2p.py`); it is split on whitespace.
#[derive(Clone, Debug)]
pub struct ExternalG2pScorer {
    pub command: String,
}

impl ExternalG2pScorer {
    pub fn new(command: &str) -> ExternalG2pScorer {
        ExternalG2pScorer { command: command.to_string() }
    }

    fn run(&self, args: &[&str]) -> Result<String, ScorerError> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or(ScorerError::NotConfigured)?;

        trace!("running {} {:?}", self.command, args);
        let output = Command::new(program)
            .args(parts)
            .args(args)
            .output()
            .map_err(|e| ScorerError::Launch { command: self.command.clone(), source: e })?;

        if !output.status.success() {
            return Err(ScorerError::Failed {
                command: self.command.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn parse_number(text: &str, output: &str) -> Result<f64, ScorerError> {
    text.trim().parse::<f64>().map_err(|_| ScorerError::BadOutput { output: output.to_string() })
}

/// parse a `<score>\t<aligned>` line from the scoring program
pub fn parse_score_line(line: &str) -> Result<G2pAlignment, ScorerError> {
    let mut fields = line.splitn(2, '\t');
    let score = parse_number(fields.next().unwrap_or(""), line)?;
    let aligned = match fields.next().map(|f| f.trim()) {
        None | Some("") | Some("-") => None,
        Some(positions) => Some(positions.split(',').map(|p| p.to_string()).collect()),
    };
    Ok(G2pAlignment { score, aligned })
}

impl G2pScorer for ExternalG2pScorer {
    type Matrix = String;

    fn load_matrix(&self, name: &str) -> Result<String, ScorerError> {
        self.run(&["matrix", name])?;
        info!("Scoring matrix '{}' is available from {}", name, self.command);
        Ok(name.to_string())
    }

    fn score(&self, sequence: &[u8], reference: &str, matrix: &String) -> Result<G2pAlignment, ScorerError> {
        let sequence = String::from_utf8_lossy(sequence).to_string();
        let output = self.run(&["score", matrix.as_str(), reference, sequence.as_str()])?;
        parse_score_line(&output)
    }

    fn score_to_fpr(&self, score: f64) -> Result<f64, ScorerError> {
        let output = self.run(&["fpr", &score.to_string()])?;
        parse_number(&output, &output)
    }
}
