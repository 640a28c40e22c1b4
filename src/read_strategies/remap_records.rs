use std::fs::File;
use std::io::{BufReader, Read};
use std::str::FromStr;

use anyhow::{Context, Result};
use bio::alphabets::dna;
use csv::{Reader, ReaderBuilder, StringRecord};
use flate2::read::MultiGzDecoder;

use crate::errors::RecordError;

pub const REMAP_FIELD_COUNT: usize = 12;

const RNAME_FIELD: usize = 3;

/// One aligned read from the remap CSV:
/// `sample, qname, flag, rname, pos, mapq, cigar, rnext, pnext, tlen, seq, qual`
#[allow(dead_code)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub sample: String,
    pub qname: String,
    pub flag: u16,
    pub rname: String,
    /// 1-based leftmost mapped position
    pub pos: usize,
    pub mapq: u8,
    pub cigar: String,
    pub rnext: String,
    pub pnext: usize,
    pub tlen: i64,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

fn parse_field<T: FromStr>(row: usize, name: &str, value: &str) -> Result<T, RecordError> {
    value.trim().parse::<T>().map_err(|_| RecordError::UnparsableField {
        row,
        field: name.to_string(),
        value: value.to_string(),
    })
}

impl AlignmentRecord {
    /// The 0-based reference offset of the read's first aligned base
    pub fn offset(&self) -> usize {
        self.pos.saturating_sub(1)
    }

    /// Parse one CSV row.
    ///
    /// # Arguments
    ///
    /// * `row` - 1-based row number, used in error messages
    /// * `record` - the raw CSV fields
    /// * `target_region` - rows aligned to any other reference return `Ok(None)`
    ///
    /// A header row never names the target region, so it is skipped along with the
    /// reads for other regions. Bases are uppercased, so a lowercase `n` is read as N and
    /// never confused with the unread-interval marker.
    pub fn from_row(row: usize, record: &StringRecord, target_region: &str) -> Result<Option<AlignmentRecord>, RecordError> {
        if record.get(RNAME_FIELD) != Some(target_region) {
            return Ok(None);
        }
        if record.len() != REMAP_FIELD_COUNT {
            return Err(RecordError::WrongFieldCount { row, found: record.len(), expected: REMAP_FIELD_COUNT });
        }

        let field = |i: usize| record.get(i).unwrap_or("");
        let parsed = AlignmentRecord {
            sample: field(0).to_string(),
            qname: field(1).to_string(),
            flag: parse_field(row, "flag", field(2))?,
            rname: field(3).to_string(),
            pos: parse_field(row, "pos", field(4))?,
            mapq: parse_field(row, "mapq", field(5))?,
            cigar: field(6).to_string(),
            rnext: field(7).to_string(),
            pnext: parse_field(row, "pnext", field(8))?,
            tlen: parse_field(row, "tlen", field(9))?,
            seq: field(10).as_bytes().to_ascii_uppercase(),
            qual: field(11).as_bytes().to_vec(),
        };

        if !dna::iupac_alphabet().is_word(&parsed.seq) {
            return Err(RecordError::InvalidSequence { row, fragment: parsed.qname });
        }
        Ok(Some(parsed))
    }
}

/// Open a remap CSV for reading. A path ending in `.gz` is decompressed on the fly,
/// including files made of several concatenated gzip members.
pub fn open_remap_reader(path: &str) -> Result<Reader<Box<dyn Read>>> {
    let file = File::open(path).with_context(|| format!("Unable to open remap file {}", path))?;
    let input: Box<dyn Read> = if path.ends_with(".gz") {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(ReaderBuilder::new().has_headers(false).flexible(true).from_reader(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn row(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    const READ: [&str; 12] = ["S1", "M01:1:1", "99", "HIV1B-env-seed", "5", "44", "6M", "=", "20", "30", "ACGTRN", "IIIIII"];

    #[test]
    fn parses_target_rows() {
        let record = AlignmentRecord::from_row(2, &row(&READ), "HIV1B-env-seed").unwrap().unwrap();
        assert_eq!(record.sample, "S1");
        assert_eq!(record.qname, "M01:1:1");
        assert_eq!(record.flag, 99);
        assert_eq!(record.pos, 5);
        assert_eq!(record.offset(), 4);
        assert_eq!(record.tlen, 30);
        assert_eq!(record.seq, b"ACGTRN".to_vec());
        assert_eq!(record.qual, b"IIIIII".to_vec());
    }

    #[test]
    fn skips_other_regions_and_headers() {
        let header = ["sample", "qname", "flag", "rname", "pos", "mapq", "cigar", "rnext", "pnext", "tlen", "seq", "qual"];
        assert_eq!(AlignmentRecord::from_row(1, &row(&header), "HIV1B-env-seed").unwrap(), None);

        let mut other = READ;
        other[3] = "HIV1B-gag";
        assert_eq!(AlignmentRecord::from_row(2, &row(&other), "HIV1B-env-seed").unwrap(), None);
        assert_eq!(AlignmentRecord::from_row(3, &row(&["too", "short"]), "HIV1B-env-seed").unwrap(), None);
    }

    #[test]
    fn lowercase_bases_are_uppercased() {
        let mut read = READ;
        read[10] = "acgtrn";
        let record = AlignmentRecord::from_row(2, &row(&read), "HIV1B-env-seed").unwrap().unwrap();
        assert_eq!(record.seq, b"ACGTRN".to_vec());
    }

    #[test]
    fn zero_position_saturates() {
        let mut read = READ;
        read[4] = "0";
        let record = AlignmentRecord::from_row(2, &row(&read), "HIV1B-env-seed").unwrap().unwrap();
        assert_eq!(record.offset(), 0);
    }

    #[test]
    fn bad_rows_are_errors() {
        let short = &READ[..11];
        assert_eq!(AlignmentRecord::from_row(4, &row(short), "HIV1B-env-seed"),
                   Err(RecordError::WrongFieldCount { row: 4, found: 11, expected: 12 }));

        let mut read = READ;
        read[4] = "five";
        assert!(matches!(AlignmentRecord::from_row(5, &row(&read), "HIV1B-env-seed"),
                         Err(RecordError::UnparsableField { row: 5, .. })));

        let mut read = READ;
        read[10] = "ACGT1!";
        assert_eq!(AlignmentRecord::from_row(6, &row(&read), "HIV1B-env-seed"),
                   Err(RecordError::InvalidSequence { row: 6, fragment: "M01:1:1".to_string() }));
    }

    #[test]
    fn reads_plain_and_gzipped_files() {
        let text = "sample,qname,flag,rname,pos,mapq,cigar,rnext,pnext,tlen,seq,qual\nS1,M01:1:1,99,HIV1B-env-seed,1,44,3M,=,1,3,ACG,III\n";

        let mut plain = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        plain.write_all(text.as_bytes()).unwrap();
        plain.flush().unwrap();

        let mut gz = tempfile::Builder::new().suffix(".csv.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        gz.write_all(&encoder.finish().unwrap()).unwrap();
        gz.flush().unwrap();

        for path in [plain.path(), gz.path()] {
            let mut reader = open_remap_reader(path.to_str().unwrap()).unwrap();
            let rows: Vec<StringRecord> = reader.records().map(|r| r.unwrap()).collect();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1].get(6), Some("3M"));
        }
    }
}
