//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::types::TaxId;

pub type Result<T> = std::result::Result<T, TaxError>;

#[derive(Error, Debug)]
pub enum TaxError {
    /// The taxonomy dump is inconsistent (e.g. a name for a taxid with no node).
    #[error("cannot build taxonomy: {0}")]
    Build(String),

    #[error("unknown taxid {0}")]
    UnknownTaxon(TaxId),

    /// Walking parents from this taxid never reached the root.
    #[error("parent cycle above taxid {0}")]
    ParentCycle(TaxId),

    /// A classifier output line could not be converted.
    #[error("malformed record at line {line_num} ({reason}): {line:?}")]
    MalformedRecord {
        line_num: usize,
        line: String,
        reason: String,
    },

    #[error("unknown classifier '{0}' (expected one of kraken2, metabuli, metacache, diamond, sylph)")]
    UnknownClassifier(String),

    #[error("invalid samplesheet: {0}")]
    Samplesheet(String),

    /// Any failure while reading one sample's classifier output.
    #[error("sample '{sample}' ({}): {source}", path.display())]
    Profile {
        sample: String,
        path: PathBuf,
        #[source]
        source: Box<TaxError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TaxError {
    pub(crate) fn malformed(line_num: usize, line: &str, reason: impl Into<String>) -> Self {
        TaxError::MalformedRecord {
            line_num,
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn in_profile(self, sample: &str, path: &std::path::Path) -> Self {
        TaxError::Profile {
            sample: sample.to_string(),
            path: path.to_path_buf(),
            source: Box::new(self),
        }
    }
}
