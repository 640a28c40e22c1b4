use serde::Serialize;

/// One cell of the cutoff by minimum-count grid
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TropismSummaryRow {
    pub sample: String,
    pub fpr_cutoff: f64,
    pub min_count: usize,
    pub total_x4: usize,
    pub total_reads: usize,
    pub proportion_x4: Option<f64>,
}

/// Summarize scored variants into X4 proportions.
///
/// # Arguments
///
/// * `sample` - the sample name written on every row
/// * `scored` - `(count, fpr)` for each variant that was successfully scored; rejected
///   variants should not be passed in
/// * `fpr_cutoffs` - a variant counts as X4 when its FPR is at or below the cutoff
/// * `min_counts` - variants seen fewer times than this are left out of both totals
///
/// # Returns
///
/// One row per cutoff and minimum count, cutoffs in the outer loop. The proportion is
/// empty when no reads pass the minimum count.
pub fn summarize(sample: &str, scored: &[(usize, f64)], fpr_cutoffs: &[f64], min_counts: &[usize]) -> Vec<TropismSummaryRow> {
    let mut rows = Vec::with_capacity(fpr_cutoffs.len() * min_counts.len());
    for cutoff in fpr_cutoffs {
        for min_count in min_counts {
            let kept = scored.iter().filter(|(count, _)| count >= min_count);
            let (total_x4, total_reads) = kept.fold((0, 0), |(x4, total), (count, fpr)| {
                if fpr <= cutoff { (x4 + count, total + count) } else { (x4, total + count) }
            });
            let proportion_x4 = if total_reads == 0 { None } else { Some(total_x4 as f64 / total_reads as f64) };
            rows.push(TropismSummaryRow {
                sample: sample.to_string(),
                fpr_cutoff: *cutoff,
                min_count: *min_count,
                total_x4,
                total_reads,
                proportion_x4,
            });
        }
    }
    rows
}
