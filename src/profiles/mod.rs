//src/profiles/mod.rs
//
// Classifier output parsers. Every supported format is converted into
// `ClassificationRecord`s through the `ProfileParser` trait; `Classifier`
// picks the parser once per run.

pub mod diamond;
pub mod kraken;
pub mod metabuli;
pub mod metacache;
pub mod sylph;

use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, TaxError};
use crate::io::open_text;
use crate::types::ClassificationRecord;

pub use diamond::DiamondHits;
pub use kraken::{Kraken2Reads, KrakenReport};
pub use metabuli::MetabuliReads;
pub use metacache::{MetacacheReads, MetacacheReport};
pub use sylph::{SylphMappedReads, SylphProfile, OTHER_SEQUENCES_TAXID};

/// Column separator of a classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Pipe,
    /// Any run of whitespace.
    Whitespace,
}

impl Delimiter {
    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Tab => line.split('\t').collect(),
            Delimiter::Pipe => line.split('|').map(str::trim).collect(),
            Delimiter::Whitespace => line.split_whitespace().collect(),
        }
    }
}

/// A parser for one classifier output schema.
pub trait ProfileParser: Send + Sync {
    /// Short format name used in logs.
    fn name(&self) -> &'static str;

    fn delimiter(&self) -> Delimiter;

    /// Column names in file order.
    fn columns(&self) -> &'static [&'static str];

    /// Fewest columns a data line may have.
    fn min_columns(&self) -> usize {
        self.columns().len()
    }

    /// Leading lines to discard before data starts.
    fn header_lines(&self) -> usize {
        0
    }

    /// Whether lines starting with `#` are comments.
    fn skips_comments(&self) -> bool {
        false
    }

    /// Converts one non-blank data line. `Ok(None)` drops the line on purpose.
    fn parse_line(&self, line: &str, line_num: usize) -> Result<Option<ClassificationRecord>>;

    /// Splits `line` and checks it has at least `min_columns` fields.
    fn split_checked<'a>(&self, line: &'a str, line_num: usize) -> Result<Vec<&'a str>> {
        let fields = self.delimiter().split(line);
        if fields.len() < self.min_columns() {
            return Err(TaxError::malformed(
                line_num,
                line,
                format!(
                    "{} expects {} columns, found {}",
                    self.name(),
                    self.min_columns(),
                    fields.len()
                ),
            ));
        }
        Ok(fields)
    }

    /// Parses a whole profile. Blank lines are skipped; the first malformed
    /// line aborts the parse.
    fn parse(&self, reader: &mut dyn BufRead) -> Result<Vec<ClassificationRecord>> {
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (idx, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line_num = idx + 1;

            if line_num <= self.header_lines()
                || line.trim().is_empty()
                || (self.skips_comments() && line.starts_with('#'))
            {
                continue;
            }
            match self.parse_line(&line, line_num)? {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        log::debug!(
            "Parsed {} {} records ({} dropped)",
            records.len(),
            self.name(),
            skipped
        );
        Ok(records)
    }

    fn parse_file(&self, path: &Path) -> Result<Vec<ClassificationRecord>> {
        let mut reader = open_text(path)?;
        self.parse(reader.as_mut())
    }
}

/// Returns field `idx` or a malformed-record error naming `column`.
pub(crate) fn field<'a>(
    fields: &[&'a str],
    idx: usize,
    column: &str,
    line: &str,
    line_num: usize,
) -> Result<&'a str> {
    fields
        .get(idx)
        .copied()
        .ok_or_else(|| TaxError::malformed(line_num, line, format!("missing column {column}")))
}

/// Parses field `idx` as a number.
pub(crate) fn numeric_field<T: FromStr>(
    fields: &[&str],
    idx: usize,
    column: &str,
    line: &str,
    line_num: usize,
) -> Result<T> {
    let raw = field(fields, idx, column, line, line_num)?.trim();
    raw.parse::<T>().map_err(|_| {
        TaxError::malformed(line_num, line, format!("non-numeric {column} '{raw}'"))
    })
}

/// Supported classifier tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classifier {
    Kraken2,
    Metabuli,
    Metacache,
    Diamond,
    Sylph,
}

impl Classifier {
    pub const ALL: [Classifier; 5] = [
        Classifier::Kraken2,
        Classifier::Diamond,
        Classifier::Metabuli,
        Classifier::Metacache,
        Classifier::Sylph,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Classifier::Kraken2 => "kraken2",
            Classifier::Metabuli => "metabuli",
            Classifier::Metacache => "metacache",
            Classifier::Diamond => "diamond",
            Classifier::Sylph => "sylph",
        }
    }

    /// Parser for the tool's per-read assignments.
    pub fn read_parser(&self) -> Box<dyn ProfileParser> {
        match self {
            Classifier::Kraken2 => Box::new(Kraken2Reads),
            Classifier::Metabuli => Box::new(MetabuliReads),
            Classifier::Metacache => Box::new(MetacacheReads),
            Classifier::Diamond => Box::new(DiamondHits),
            Classifier::Sylph => Box::new(SylphMappedReads),
        }
    }

    /// Parser for the tool's abundance profile (report or clade table).
    /// DIAMOND has no report, so its per-read hits are counted instead.
    pub fn profile_parser(&self) -> Box<dyn ProfileParser> {
        match self {
            Classifier::Kraken2 | Classifier::Metabuli => Box::new(KrakenReport),
            Classifier::Metacache => Box::new(MetacacheReport),
            Classifier::Diamond => Box::new(DiamondHits),
            Classifier::Sylph => Box::new(SylphProfile::default()),
        }
    }

    /// Fixed position of the tool's column in a read samplesheet
    /// (`sample, fastq, kraken2, diamond, metabuli, metacache, sylph`).
    pub fn samplesheet_column(&self) -> usize {
        match self {
            Classifier::Kraken2 => 2,
            Classifier::Diamond => 3,
            Classifier::Metabuli => 4,
            Classifier::Metacache => 5,
            Classifier::Sylph => 6,
        }
    }
}

impl FromStr for Classifier {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Classifier::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| TaxError::UnknownClassifier(s.to_string()))
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
