extern crate anyhow;
extern crate bio;
extern crate clap;
extern crate csv;
extern crate flate2;
extern crate indexmap;
extern crate indicatif;
extern crate itertools;
#[macro_use]
extern crate log;
extern crate phf;
extern crate pretty_env_logger;
extern crate rust_htslib;
extern crate serde;
extern crate serde_yaml;
extern crate thiserror;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;

use crate::read_strategies::g2p_settings::G2pSettings;
use crate::sam_g2p::{run_g2p, run_tabulate};

/// deletion, or padding before the first aligned base
const GAP_BASE: u8 = b'-';
/// merged position that neither read covers
const UNCOVERED_BASE: u8 = b'n';
const AMBIGUOUS_BASE: u8 = b'N';
/// Phred 0, for positions to the left of the read
const PAD_QUALITY: u8 = b'!';
/// Phred -1, for deletions
const BLANK_QUALITY: u8 = b' ';

mod cigar {
    pub mod reconstruct;
}

mod consensus {
    pub mod pair_merger;
    pub mod variant_tally;
}

mod g2p {
    pub mod scoring;
    pub mod translation;
    pub mod tropism_summary;
    pub mod validation;
}

mod read_strategies {
    pub mod g2p_settings;
    pub mod remap_records;
}

mod utils {
    pub mod read_utils;
}

mod errors;
mod sam_g2p;

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Merge paired V3 reads, then validate and score each distinct variant
    G2p {
        #[clap(long)]
        remap_csv: String,

        #[clap(long)]
        g2p_csv: String,

        #[clap(long)]
        summary_csv: Option<String>,

        #[clap(long)]
        settings: Option<String>,

        #[clap(long)]
        scorer_command: Option<String>,
    },
    /// Merge paired V3 reads and write the ranked variant counts
    Tabulate {
        #[clap(long)]
        remap_csv: String,

        #[clap(long)]
        output_csv: String,

        #[clap(long)]
        settings: Option<String>,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Cmd,
}

fn main() -> Result<()> {

    if let Err(_) = std::env::var("RUST_LOG") {
        std::env::set_var("RUST_LOG", "info");
    }

    pretty_env_logger::init_timed();

    let parameters = Args::parse();
    trace!("{:?}", &parameters.cmd);

    match &parameters.cmd {
        Cmd::G2p {
            remap_csv,
            g2p_csv,
            summary_csv,
            settings,
            scorer_command,
        } => {
            let mut settings = G2pSettings::load(settings.as_deref())?;
            if let Some(command) = scorer_command {
                settings.scorer_command = Some(command.clone());
            }
            info!("Scoring V3 variants from {} for region {}", remap_csv, settings.target_region);
            run_g2p(remap_csv, g2p_csv, summary_csv.as_deref(), &settings)?;
        }

        Cmd::Tabulate {
            remap_csv,
            output_csv,
            settings,
        } => {
            let settings = G2pSettings::load(settings.as_deref())?;
            run_tabulate(remap_csv, output_csv, &settings)?;
        }
    }
    Ok(())
}
