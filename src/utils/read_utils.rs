use crate::{GAP_BASE, UNCOVERED_BASE};

/// Phred quality strings are ASCII offset by 33
pub const PHRED_OFFSET: i32 = 33;

/// decode a single quality byte to its Phred score. Signed, since the blank sentinel
/// used for deletions (' ') decodes to -1
pub fn phred_score(quality_byte: &u8) -> i32 {
    *quality_byte as i32 - PHRED_OFFSET
}

/// true if every base in the span reaches the minimum quality. An empty span passes.
pub fn all_at_least(qualities: &[u8], minimum: i32) -> bool {
    qualities.iter().all(|q| phred_score(q) >= minimum)
}

pub fn u8s(u8s: &[u8]) -> String {
    String::from_utf8_lossy(u8s).to_string()
}

/// remove both structural gaps and the lowercase marker for the unread interval between mates
pub fn strip_gaps_and_intervals(bases: &[u8]) -> Vec<u8> {
    bases.iter().filter(|x| **x != GAP_BASE && **x != UNCOVERED_BASE).map(|x| *x).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phred_score_test() {
        assert_eq!(phred_score(&b'!'), 0);
        assert_eq!(phred_score(&b' '), -1);
        assert_eq!(phred_score(&b'+'), 10);
        assert_eq!(phred_score(&b'5'), 20);
        assert_eq!(phred_score(&b'I'), 40);
    }

    #[test]
    fn all_at_least_test() {
        assert!(all_at_least(b"5555", 20));
        assert!(!all_at_least(b"5545", 20));
        assert!(all_at_least(b"", 20));
    }

    #[test]
    fn strip_test() {
        assert_eq!(strip_gaps_and_intervals(b"A--Cnnn-G"), b"ACG".to_vec());
        assert_eq!(strip_gaps_and_intervals(b"ANNn"), b"ANN".to_vec());
    }
}
