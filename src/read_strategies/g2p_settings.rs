use std::fs::File;
use std::io::Read;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cigar::reconstruct::QMIN;
use crate::consensus::pair_merger::{QualityThresholds, QCUT, QDELTA};

/// consensus B V3 loop, the default reference for g2p alignment
pub const CONSENSUS_B_V3: &str = "CTRPNNNTRKSIHIGPGRAFYATGEIIGDIRQAHC";

pub const DEFAULT_TARGET_REGION: &str = "HIV1B-env-seed";

/// Settings for one g2p run. Every key is optional in the YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct G2pSettings {
    pub target_region: String,
    pub qmin: i32,
    pub qcut: i32,
    pub qdelta: i32,
    pub clip_from: usize,
    pub clip_to: Option<usize>,
    pub strict: bool,
    pub resolve_synonymous_mixtures: bool,
    pub reference_v3: String,
    pub matrix_name: String,
    pub fpr_cutoffs: Vec<f64>,
    pub min_counts: Vec<usize>,
    pub scorer_command: Option<String>,
}

impl Default for G2pSettings {
    fn default() -> Self {
        G2pSettings {
            target_region: DEFAULT_TARGET_REGION.to_string(),
            qmin: QMIN,
            qcut: QCUT,
            qdelta: QDELTA,
            clip_from: 0,
            clip_to: None,
            strict: true,
            resolve_synonymous_mixtures: false,
            reference_v3: CONSENSUS_B_V3.to_string(),
            matrix_name: "g2p".to_string(),
            fpr_cutoffs: vec![3.0, 3.5, 4.0, 5.0],
            min_counts: vec![0, 50, 100, 1000],
            scorer_command: None,
        }
    }
}

impl G2pSettings {
    /// Load run settings from a YAML document. Keys that are left out keep their defaults:
    ///
    /// *target_region* - reads mapped to any other reference are ignored
    /// *qmin* - an insertion is kept only if every base reaches this quality
    /// *qcut* / *qdelta* - a merged base needs quality above *qcut*, and disagreeing mates
    /// must differ in quality by at least *qdelta*, or the base is called N
    /// *clip_from* / *clip_to* - inclusive window, in reference coordinates, kept from each read
    /// *strict* - stop at the first malformed record instead of skipping it
    /// *resolve_synonymous_mixtures* - translate codons with mixtures when they all mean one residue
    /// *reference_v3*, *matrix_name*, *scorer_command* - what the g2p scorer is given
    /// *fpr_cutoffs*, *min_counts* - the grid of the tropism summary
    ///
    /// an example of this format is the *g2p_settings.yaml* file in the test_data directory
    pub fn from_yaml(yaml_file: &str) -> Result<G2pSettings> {
        let mut file = File::open(yaml_file)
            .with_context(|| format!("Unable to open YAML configuration file: {}", yaml_file))?;

        let mut yaml_contents = String::new();
        file.read_to_string(&mut yaml_contents)
            .with_context(|| format!("Unable to read contents of YAML configuration file: {}", yaml_file))?;

        let settings: G2pSettings = serde_yaml::from_str(&yaml_contents)
            .with_context(|| format!("Unable to de-yaml your settings file: {}", yaml_file))?;
        Ok(settings)
    }

    /// settings from the file if one was given, defaults otherwise
    pub fn load(yaml_file: Option<&str>) -> Result<G2pSettings> {
        match yaml_file {
            Some(path) => G2pSettings::from_yaml(path),
            None => Ok(G2pSettings::default()),
        }
    }

    pub fn thresholds(&self) -> QualityThresholds {
        QualityThresholds { qmin: self.qmin, qcut: self.qcut, qdelta: self.qdelta }
    }
}

// *********************************************       *********************************************
// ********************************************* TESTS *********************************************
// *********************************************       *********************************************
