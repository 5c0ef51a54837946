use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;
use crate::naming::{image_file_name, sanitize_name};

pub const SCIENTIFIC_NAME_COLUMN: &str = "scientific_name";
pub const IMAGE_URL_COLUMN: &str = "image_url";
pub const OBSERVATION_URL_COLUMN: &str = "url";

/// Columns every source table must carry, in the order they are projected.
pub const REQUIRED_COLUMNS: [&str; 3] = [
    SCIENTIFIC_NAME_COLUMN,
    IMAGE_URL_COLUMN,
    OBSERVATION_URL_COLUMN,
];

/// One row of an observation export, reduced to the fields needed to fetch
/// and name its image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationRecord {
    pub scientific_name: Option<String>,
    pub image_url: Option<String>,
    pub url: Option<String>,
}

impl ObservationRecord {
    /// Only records with both a label and an image URL take part in a run.
    pub fn is_eligible(&self) -> bool {
        self.scientific_name.is_some() && self.image_url.is_some()
    }

    pub fn taxon_token(&self) -> String {
        sanitize_name(self.scientific_name.as_deref())
    }

    pub fn file_name(&self, position: usize) -> String {
        image_file_name(self.scientific_name.as_deref(), self.url.as_deref(), position)
    }
}

/// A record together with its position in the concatenated source sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    pub position: usize,
    pub record: ObservationRecord,
}

impl IndexedRecord {
    pub fn file_name(&self) -> String {
        self.record.file_name(self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Every image directly under the output directory.
    Flat,
    /// One subdirectory per taxonomic token.
    Nested,
}

impl Layout {
    pub fn destination(&self, root: &Utf8Path, record: &IndexedRecord) -> Utf8PathBuf {
        let file_name = record.file_name();
        match self {
            Layout::Flat => root.join(file_name),
            Layout::Nested => root.join(record.record.taxon_token()).join(file_name),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Flat => write!(f, "flat"),
            Layout::Nested => write!(f, "nested"),
        }
    }
}

impl FromStr for Layout {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(Layout::Flat),
            "nested" => Ok(Layout::Nested),
            _ => Err(KiraError::InvalidConfig(format!("unknown layout: {value}"))),
        }
    }
}
