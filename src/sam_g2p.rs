use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result};
use csv::{StringRecord, WriterBuilder};
use indicatif::ProgressBar;

use crate::cigar::reconstruct::reconstruct_with_min_insertion_quality;
use crate::consensus::pair_merger::{merge_reads, PendingPairCache, QualityThresholds};
use crate::consensus::variant_tally::{RankedVariant, VariantTally};
use crate::errors::{ScorerError, StructuralError};
use crate::g2p::scoring::{ExternalG2pScorer, G2pScorer};
use crate::g2p::translation::{StandardCodeTranslator, Translator};
use crate::g2p::tropism_summary::summarize;
use crate::g2p::validation::{ScoreResult, VariantValidator};
use crate::read_strategies::g2p_settings::G2pSettings;
use crate::read_strategies::remap_records::{open_remap_reader, AlignmentRecord};

pub const G2P_HEADER: [&str; 7] = ["sample", "rank", "count", "g2p", "fpr", "aligned", "error"];
pub const SUMMARY_HEADER: [&str; 6] = ["sample", "fpr_cutoff", "min_count", "total_x4", "total_reads", "proportion_x4"];
pub const TABULATE_HEADER: [&str; 3] = ["rank", "count", "sequence"];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub rows: usize,
    pub off_target_rows: usize,
    pub target_reads: usize,
    pub skipped_reads: usize,
    pub pairs_merged: usize,
    pub unpaired_reads: usize,
}

/// Reconstructs each target read, pairs mates by fragment name and tallies the merged pairs
pub struct PairTallier<'a> {
    settings: &'a G2pSettings,
    thresholds: QualityThresholds,
    cache: PendingPairCache,
    tally: VariantTally,
    sample: Option<String>,
    pub stats: ReadStats,
}

impl<'a> PairTallier<'a> {
    pub fn new(settings: &'a G2pSettings) -> PairTallier<'a> {
        PairTallier {
            settings,
            thresholds: settings.thresholds(),
            cache: PendingPairCache::new(),
            tally: VariantTally::new(),
            sample: None,
            stats: ReadStats::default(),
        }
    }

    /// Feed one CSV row through reconstruction and pairing. Rows for other regions are
    /// counted and ignored.
    pub fn add_row(&mut self, row: usize, raw: &StringRecord) -> Result<(), StructuralError> {
        self.stats.rows += 1;
        let record = match AlignmentRecord::from_row(row, raw, &self.settings.target_region)? {
            Some(record) => record,
            None => {
                self.stats.off_target_rows += 1;
                return Ok(());
            }
        };
        self.stats.target_reads += 1;
        self.note_sample(row, &record.sample);

        let read = reconstruct_with_min_insertion_quality(&record.cigar,
                                                          &record.seq,
                                                          &record.qual,
                                                          record.offset(),
                                                          self.settings.clip_from,
                                                          self.settings.clip_to,
                                                          self.thresholds.qmin)
            .map_err(|source| StructuralError::Cigar { fragment: record.qname.clone(), source })?;

        if let Some((first, second)) = self.cache.offer(&record.qname, read)? {
            self.tally.add(&merge_reads(&first, &second, &self.thresholds));
        }

        Ok(())
    }

    /// the latest target row names the sample, even if the row is later rejected
    fn note_sample(&mut self, row: usize, sample: &str) {
        match &self.sample {
            Some(current) if current == sample => {}
            Some(current) => {
                warn!("Sample name changed from {} to {} at row {}; using the latest", current, sample, row);
                self.sample = Some(sample.to_string());
            }
            None => self.sample = Some(sample.to_string()),
        }
    }

    /// Finish the pass, returning the sample name and ranked variants
    pub fn finish(mut self) -> (String, Vec<RankedVariant>, ReadStats) {
        self.stats.pairs_merged = self.cache.pairs_completed();
        self.stats.unpaired_reads = self.cache.unpaired();
        if self.stats.unpaired_reads > 0 {
            warn!("{} reads had no mate and were left out", self.stats.unpaired_reads);
        }
        info!("Merged {} read pairs into {} distinct variants", self.tally.total(), self.tally.distinct());
        (self.sample.unwrap_or_default(), self.tally.into_ranked(), self.stats)
    }
}

/// First pass: read the remap CSV and rank the merged read pairs.
///
/// In strict mode the first structural problem stops the run; otherwise the offending
/// record is logged and skipped.
pub fn tally_remap_file(remap_csv: &str, settings: &G2pSettings) -> Result<(String, Vec<RankedVariant>, ReadStats)> {
    let mut reader = open_remap_reader(remap_csv)?;
    let mut tallier = PairTallier::new(settings);

    let bar = ProgressBar::new_spinner();
    for (index, raw) in reader.records().enumerate() {
        let row = index + 1;
        let raw = raw.with_context(|| format!("Unable to read row {} of {}", row, remap_csv))?;
        if let Err(e) = tallier.add_row(row, &raw) {
            if settings.strict {
                return Err(e).with_context(|| format!("Row {} of {}", row, remap_csv));
            }
            warn!("Skipping row {} of {}: {}", row, remap_csv, e);
            tallier.stats.skipped_reads += 1;
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    let (sample, ranked, stats) = tallier.finish();
    info!("Read {} rows from {}: {} target reads, {} skipped, {} rows for other regions",
          stats.rows, remap_csv, stats.target_reads, stats.skipped_reads, stats.off_target_rows);
    Ok((sample, ranked, stats))
}

/// Second pass: validate and score every ranked variant, writing one row each.
///
/// # Returns
///
/// `(count, fpr)` for the variants that were scored, for the tropism summary
pub fn score_variants<T: Translator, S: G2pScorer, W: Write>(sample: &str,
                                                              ranked: &[RankedVariant],
                                                              validator: &VariantValidator<T, S>,
                                                              output: W) -> Result<Vec<(usize, f64)>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(output);
    writer.write_record(G2P_HEADER)?;

    let mut scored = Vec::new();
    for variant in ranked {
        let result = validator.score_variant(variant)
            .with_context(|| format!("Unable to score variant {} ({})", variant.rank, variant.sequence))?;
        match &result {
            ScoreResult::Scored { fpr, .. } => scored.push((variant.count, *fpr)),
            ScoreResult::Rejected { reason, .. } => debug!("variant {} rejected: {}", variant.rank, reason),
        }
        writer.serialize(result.to_row(sample, variant))?;
    }
    writer.flush()?;
    info!("Scored {} of {} variants", scored.len(), ranked.len());
    Ok(scored)
}

pub fn write_summary<W: Write>(sample: &str, scored: &[(usize, f64)], settings: &G2pSettings, output: W) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(output);
    writer.write_record(SUMMARY_HEADER)?;
    for row in summarize(sample, scored, &settings.fpr_cutoffs, &settings.min_counts) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn create_output(path: &str) -> Result<File> {
    File::create(path).with_context(|| format!("Unable to create output file {}", path))
}

/// Run both passes with the given collaborators
pub fn run_g2p_with<T: Translator, S: G2pScorer>(remap_csv: &str,
                                                 g2p_csv: &str,
                                                 summary_csv: Option<&str>,
                                                 settings: &G2pSettings,
                                                 translator: &T,
                                                 scorer: &S) -> Result<()> {
    let validator = VariantValidator::new(translator, scorer, &settings.matrix_name, &settings.reference_v3)
        .with_context(|| format!("Unable to load scoring matrix {}", settings.matrix_name))?;

    let (sample, ranked, _stats) = tally_remap_file(remap_csv, settings)?;
    let scored = score_variants(&sample, &ranked, &validator, create_output(g2p_csv)?)?;

    if let Some(summary_csv) = summary_csv {
        write_summary(&sample, &scored, settings, create_output(summary_csv)?)?;
        info!("Wrote tropism summary to {}", summary_csv);
    }
    Ok(())
}

/// Run both passes with the standard genetic code and the configured scoring program
pub fn run_g2p(remap_csv: &str, g2p_csv: &str, summary_csv: Option<&str>, settings: &G2pSettings) -> Result<()> {
    let command = settings.scorer_command.as_deref().ok_or(ScorerError::NotConfigured)?;
    let scorer = ExternalG2pScorer::new(command);
    let translator = StandardCodeTranslator { resolve_synonymous_mixtures: settings.resolve_synonymous_mixtures };
    run_g2p_with(remap_csv, g2p_csv, summary_csv, settings, &translator, &scorer)
}

/// Run only the first pass and write the ranked variants
pub fn run_tabulate(remap_csv: &str, output_csv: &str, settings: &G2pSettings) -> Result<()> {
    let (_sample, ranked, _stats) = tally_remap_file(remap_csv, settings)?;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(create_output(output_csv)?);
    writer.write_record(TABULATE_HEADER)?;
    for variant in &ranked {
        writer.write_record(&[variant.rank.to_string(), variant.count.to_string(), variant.sequence.clone()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    use crate::errors::PairingError;
    use crate::g2p::validation::tests::{back_translate, FixedScorer, CONSENSUS_B_V3};

    const STOP_VARIANT: &str = "CTRPNNNTRKSIHIGPGRAF*ATGEIIGDIRQAHC";

    fn read_row(fragment: &str, rname: &str, cigar: &str, seq: &str) -> String {
        format!("S1,{},99,{},1,44,{},=,1,{},{},{}\n", fragment, rname, cigar, seq.len(), seq, "I".repeat(seq.len()))
    }

    fn v3_remap() -> String {
        let good = back_translate(CONSENSUS_B_V3);
        let stop = back_translate(STOP_VARIANT);
        let cigar = format!("{}M", good.len());

        let mut text = String::from("sample,qname,flag,rname,pos,mapq,cigar,rnext,pnext,tlen,seq,qual\n");
        text += &read_row("gag1", "HIV1B-gag", "3M", "ACG");
        for fragment in ["f1", "f2", "f3"] {
            text += &read_row(fragment, "HIV1B-env-seed", &cigar, &good);
        }
        text += &read_row("f4", "HIV1B-env-seed", &cigar, &stop);
        for fragment in ["f1", "f2", "f3"] {
            text += &read_row(fragment, "HIV1B-env-seed", &cigar, &good);
        }
        text += &read_row("f4", "HIV1B-env-seed", &cigar, &stop);
        text += &read_row("lonely", "HIV1B-env-seed", &cigar, &good);
        text
    }

    fn write_input(dir: &TempDir, name: &str, text: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn output_path(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    #[test]
    fn tally_pairs_and_counts() {
        let dir = TempDir::new().unwrap();
        let remap = write_input(&dir, "remap.csv", &v3_remap());

        let (sample, ranked, stats) = tally_remap_file(&remap, &G2pSettings::default()).unwrap();
        assert_eq!(sample, "S1");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].count, 3);
        assert_eq!(ranked[0].sequence, back_translate(CONSENSUS_B_V3));
        assert_eq!(stats, ReadStats {
            rows: 11,
            off_target_rows: 2,
            target_reads: 9,
            skipped_reads: 0,
            pairs_merged: 4,
            unpaired_reads: 1,
        });
    }

    #[test]
    fn g2p_rows_and_summary() {
        let dir = TempDir::new().unwrap();
        let remap = write_input(&dir, "remap.csv", &v3_remap());
        let g2p = output_path(&dir, "g2p.csv");
        let summary = output_path(&dir, "summary.csv");

        let settings = G2pSettings { fpr_cutoffs: vec![30.0], min_counts: vec![0, 5], ..G2pSettings::default() };
        let scorer = FixedScorer::aligning(0.25);
        run_g2p_with(&remap, &g2p, Some(&summary), &settings, &StandardCodeTranslator::default(), &scorer).unwrap();

        let lines: Vec<String> = fs::read_to_string(&g2p).unwrap().lines().map(|l| l.to_string()).collect();
        assert_eq!(lines, vec![
            "sample,rank,count,g2p,fpr,aligned,error".to_string(),
            "S1,1,3,0.25,25.0,C[TR]C,".to_string(),
            format!("S1,2,1,,,{},stop codons", STOP_VARIANT),
        ]);
        // only the good variant reaches the scorer
        assert_eq!(scorer.calls.get(), 1);

        let lines: Vec<String> = fs::read_to_string(&summary).unwrap().lines().map(|l| l.to_string()).collect();
        assert_eq!(lines, vec![
            "sample,fpr_cutoff,min_count,total_x4,total_reads,proportion_x4".to_string(),
            "S1,30.0,0,3,3,1.0".to_string(),
            "S1,30.0,5,0,0,".to_string(),
        ]);
    }

    #[test]
    fn reruns_are_identical() {
        let dir = TempDir::new().unwrap();
        let remap = write_input(&dir, "remap.csv", &v3_remap());
        let settings = G2pSettings::default();

        let mut outputs = Vec::new();
        for name in ["first.csv", "second.csv"] {
            let g2p = output_path(&dir, name);
            run_g2p_with(&remap, &g2p, None, &settings, &StandardCodeTranslator::default(), &FixedScorer::aligning(0.25)).unwrap();
            outputs.push(fs::read(&g2p).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn empty_input_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let remap = write_input(&dir, "remap.csv", "");
        let g2p = output_path(&dir, "g2p.csv");

        run_g2p_with(&remap, &g2p, None, &G2pSettings::default(), &StandardCodeTranslator::default(), &FixedScorer::aligning(0.25)).unwrap();
        assert_eq!(fs::read_to_string(&g2p).unwrap(), "sample,rank,count,g2p,fpr,aligned,error\n");
    }

    #[test]
    fn strict_mode_stops_on_bad_cigar() {
        let dir = TempDir::new().unwrap();
        let mut text = v3_remap();
        text += &read_row("bad", "HIV1B-env-seed", "2H3M", "ACG");
        let remap = write_input(&dir, "remap.csv", &text);

        let error = tally_remap_file(&remap, &G2pSettings::default()).unwrap_err();
        assert!(matches!(error.downcast_ref::<StructuralError>(), Some(StructuralError::Cigar { .. })));

        let lenient = G2pSettings { strict: false, ..G2pSettings::default() };
        let (_sample, ranked, stats) = tally_remap_file(&remap, &lenient).unwrap();
        assert_eq!(stats.skipped_reads, 1);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn third_sighting_of_a_fragment() {
        let dir = TempDir::new().unwrap();
        let mut text = v3_remap();
        text += &read_row("f1", "HIV1B-env-seed", "3M", "ACG");
        let remap = write_input(&dir, "remap.csv", &text);

        let error = tally_remap_file(&remap, &G2pSettings::default()).unwrap_err();
        assert_eq!(error.downcast_ref::<StructuralError>(),
                   Some(&StructuralError::Pairing(PairingError::FragmentSeenTooOften { fragment: "f1".to_string() })));
    }

    #[test]
    fn lowercase_reads_merge_with_uppercase_mates() {
        let settings = G2pSettings::default();
        let mut tallier = PairTallier::new(&settings);
        let upper = StringRecord::from(vec!["S1", "f1", "99", "HIV1B-env-seed", "1", "44", "6M", "=", "1", "6", "ACNGTA", "IIIIII"]);
        let lower = StringRecord::from(vec!["S1", "f1", "147", "HIV1B-env-seed", "1", "44", "6M", "=", "1", "-6", "acngta", "IIIIII"]);
        tallier.add_row(1, &upper).unwrap();
        tallier.add_row(2, &lower).unwrap();

        let (_sample, ranked, _stats) = tallier.finish();
        assert_eq!(ranked.len(), 1);
        // the read's own n is an ambiguous call, not an unread interval
        assert_eq!(ranked[0].sequence, "ACNGTA");
    }

    #[test]
    fn third_sighting_is_skipped_when_lenient() {
        let dir = TempDir::new().unwrap();
        let mut text = v3_remap();
        text += &read_row("f1", "HIV1B-env-seed", "3M", "ACG");
        let remap = write_input(&dir, "remap.csv", &text);

        let lenient = G2pSettings { strict: false, ..G2pSettings::default() };
        let (_sample, ranked, stats) = tally_remap_file(&remap, &lenient).unwrap();
        assert_eq!(stats.skipped_reads, 1);
        assert_eq!(stats.pairs_merged, 4);
        assert_eq!(ranked[0].count, 3);
    }

    #[test]
    fn latest_sample_name_wins() {
        let settings = G2pSettings::default();
        let mut tallier = PairTallier::new(&settings);
        let first = StringRecord::from(vec!["S1", "f1", "99", "HIV1B-env-seed", "1", "44", "3M", "=", "1", "3", "ACG", "III"]);
        let second = StringRecord::from(vec!["S2", "f2", "99", "HIV1B-env-seed", "1", "44", "2H3M", "=", "1", "3", "ACG", "III"]);
        let other = StringRecord::from(vec!["S3", "g1", "99", "HIV1B-gag", "1", "44", "3M", "=", "1", "3", "ACG", "III"]);
        tallier.add_row(1, &first).unwrap();
        // a rejected target row still names the sample, an off-target row does not
        assert!(tallier.add_row(2, &second).is_err());
        tallier.add_row(3, &other).unwrap();

        let (sample, _ranked, _stats) = tallier.finish();
        assert_eq!(sample, "S2");
    }

    #[test]
    fn tabulate_writes_ranked_sequences() {
        let dir = TempDir::new().unwrap();
        let remap = write_input(&dir, "remap.csv", &v3_remap());
        let table = output_path(&dir, "table.csv");

        run_tabulate(&remap, &table, &G2pSettings::default()).unwrap();
        let lines: Vec<String> = fs::read_to_string(&table).unwrap().lines().map(|l| l.to_string()).collect();
        assert_eq!(lines[0], "rank,count,sequence");
        assert_eq!(lines[1], format!("1,3,{}", back_translate(CONSENSUS_B_V3)));
        assert_eq!(lines[2], format!("2,1,{}", back_translate(STOP_VARIANT)));
    }

    #[test]
    fn g2p_needs_a_scorer() {
        let dir = TempDir::new().unwrap();
        let remap = write_input(&dir, "remap.csv", &v3_remap());
        let error = run_g2p(&remap, &output_path(&dir, "g2p.csv"), None, &G2pSettings::default()).unwrap_err();
        assert!(matches!(error.downcast_ref::<ScorerError>(), Some(ScorerError::NotConfigured)));
    }
}
