use phf::phf_map;

/// residue emitted for a codon that cannot be translated unambiguously
pub const AMBIGUOUS_RESIDUE: char = 'X';

pub const STOP_RESIDUE: char = '*';

/// Turns a nucleotide sequence into a protein sequence
pub trait Translator {
    fn translate(&self, nucleotides: &[u8]) -> String;
}

static CODON_TABLE: phf::Map<&'static str, char> = phf_map! {
    "TTT" => 'F', "TTC" => 'F', "TTA" => 'L', "TTG" => 'L',
    "CTT" => 'L', "CTC" => 'L', "CTA" => 'L', "CTG" => 'L',
    "ATT" => 'I', "ATC" => 'I', "ATA" => 'I', "ATG" => 'M',
    "GTT" => 'V', "GTC" => 'V', "GTA" => 'V', "GTG" => 'V',
    "TCT" => 'S', "TCC" => 'S', "TCA" => 'S', "TCG" => 'S',
    "CCT" => 'P', "CCC" => 'P', "CCA" => 'P', "CCG" => 'P',
    "ACT" => 'T', "ACC" => 'T', "ACA" => 'T', "ACG" => 'T',
    "GCT" => 'A', "GCC" => 'A', "GCA" => 'A', "GCG" => 'A',
    "TAT" => 'Y', "TAC" => 'Y', "TAA" => '*', "TAG" => '*',
    "CAT" => 'H', "CAC" => 'H', "CAA" => 'Q', "CAG" => 'Q',
    "AAT" => 'N', "AAC" => 'N', "AAA" => 'K', "AAG" => 'K',
    "GAT" => 'D', "GAC" => 'D', "GAA" => 'E', "GAG" => 'E',
    "TGT" => 'C', "TGC" => 'C', "TGA" => '*', "TGG" => 'W',
    "CGT" => 'R', "CGC" => 'R', "CGA" => 'R', "CGG" => 'R',
    "AGT" => 'S', "AGC" => 'S', "AGA" => 'R', "AGG" => 'R',
    "GGT" => 'G', "GGC" => 'G', "GGA" => 'G', "GGG" => 'G',
};

// IUPAC nucleotide codes and the bases each one stands for
static MIXTURES: phf::Map<u8, &'static str> = phf_map! {
    b'A' => "A", b'C' => "C", b'G' => "G", b'T' => "T", b'U' => "T",
    b'W' => "AT", b'R' => "AG", b'K' => "GT", b'Y' => "CT", b'S' => "CG", b'M' => "AC",
    b'V' => "AGC", b'H' => "ATC", b'D' => "ATG", b'B' => "TGC",
    b'N' => "ATGC",
};

/// The standard genetic code, reading frame 0. A trailing partial codon is dropped.
///
/// Codons containing anything other than A/C/G/T translate to `X`, unless
/// `resolve_synonymous_mixtures` is set: then a codon with IUPAC mixtures that only ever
/// expands to one residue (GCN is always alanine) translates to that residue.
#[derive(Clone, Debug, Default)]
pub struct StandardCodeTranslator {
    pub resolve_synonymous_mixtures: bool,
}

impl StandardCodeTranslator {
    fn translate_codon(&self, codon: &[u8]) -> char {
        let codon: Vec<u8> = codon.iter().map(|b| b.to_ascii_uppercase()).collect();
        if let Some(residue) = std::str::from_utf8(&codon).ok().and_then(|c| CODON_TABLE.get(c)) {
            return *residue;
        }
        if self.resolve_synonymous_mixtures {
            if let Some(residue) = resolve_mixture(&codon) {
                return residue;
            }
        }
        AMBIGUOUS_RESIDUE
    }
}

/// the single residue every expansion of the codon encodes, if there is one
fn resolve_mixture(codon: &[u8]) -> Option<char> {
    let mut expansions: Vec<Vec<u8>> = vec![Vec::new()];
    for base in codon {
        let choices = MIXTURES.get(base)?;
        expansions = expansions.iter().flat_map(|prefix| {
            choices.bytes().map(move |c| {
                let mut next = prefix.clone();
                next.push(c);
                next
            })
        }).collect();
    }

    let mut residues = expansions.iter().map(|e| {
        std::str::from_utf8(e).ok().and_then(|c| CODON_TABLE.get(c)).copied()
    });
    let first = residues.next()??;
    if residues.all(|r| r == Some(first)) { Some(first) } else { None }
}

impl Translator for StandardCodeTranslator {
    fn translate(&self, nucleotides: &[u8]) -> String {
        nucleotides.chunks_exact(3).map(|codon| self.translate_codon(codon)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_standard_codons() {
        let translator = StandardCodeTranslator::default();
        assert_eq!(translator.translate(b"TGTACAAGACCCAACAACAATACAAGAAAAAGTATC"), "CTRPNNNTRKSI");
        assert_eq!(translator.translate(b"atgtaa"), "M*");
    }

    #[test]
    fn trailing_partial_codon_is_dropped() {
        let translator = StandardCodeTranslator::default();
        assert_eq!(translator.translate(b"TGTAC"), "C");
        assert_eq!(translator.translate(b""), "");
    }

    #[test]
    fn mixtures_are_ambiguous_by_default() {
        let translator = StandardCodeTranslator::default();
        assert_eq!(translator.translate(b"GCNTGYNNN"), "XXX");
    }

    #[test]
    fn synonymous_mixtures_resolve_when_asked() {
        let translator = StandardCodeTranslator { resolve_synonymous_mixtures: true };
        // GCN is always A, TGY is always C, ATR is I or M, NNN is anything
        assert_eq!(translator.translate(b"GCNTGYATRNNN"), "ACXX");
        // TAR is always a stop
        assert_eq!(translator.translate(b"TAR"), "*");
        // unknown symbols stay X
        assert_eq!(translator.translate(b"GC?"), "X");
    }
}
