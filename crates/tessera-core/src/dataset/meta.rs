//! Dataset meta items.
//!
//! A table dataset can hold a fixed set of meta items, plus any number of
//! coordinate reference system definitions. Each item knows its storage
//! format: text items are stored verbatim and surface as JSON strings, JSON
//! items are stored as canonical JSON.

use crate::errors::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const CRS_PREFIX: &str = "crs/";
const CRS_SUFFIX: &str = ".wkt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MetaItemName {
    Title,
    Description,
    Schema,
    MetadataXml,
    DatasetJson,
    /// `crs/<identifier>.wkt`
    Crs(String),
}

impl MetaItemName {
    /// The items every table dataset may hold, excluding CRS definitions
    pub const FIXED: [MetaItemName; 5] = [
        MetaItemName::Title,
        MetaItemName::Description,
        MetaItemName::Schema,
        MetaItemName::MetadataXml,
        MetaItemName::DatasetJson,
    ];

    /// Recognise an item name, or `None` if this dataset kind cannot hold it
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "title" => Some(MetaItemName::Title),
            "description" => Some(MetaItemName::Description),
            "schema.json" => Some(MetaItemName::Schema),
            "metadata.xml" => Some(MetaItemName::MetadataXml),
            "metadata/dataset.json" => Some(MetaItemName::DatasetJson),
            _ => {
                let ident = name.strip_prefix(CRS_PREFIX)?.strip_suffix(CRS_SUFFIX)?;
                if ident.is_empty() || ident.contains('/') {
                    return None;
                }
                Some(MetaItemName::Crs(ident.to_string()))
            }
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidMetaItem` for names [`MetaItemName::parse`] rejects.
    pub fn parse_required(name: &str) -> Result<Self> {
        Self::parse(name).ok_or_else(|| TesseraError::InvalidMetaItem {
            name: name.to_string(),
        })
    }

    /// Item name, which is also its path under the dataset's `meta/` directory
    pub fn as_name(&self) -> String {
        match self {
            MetaItemName::Title => "title".to_string(),
            MetaItemName::Description => "description".to_string(),
            MetaItemName::Schema => "schema.json".to_string(),
            MetaItemName::MetadataXml => "metadata.xml".to_string(),
            MetaItemName::DatasetJson => "metadata/dataset.json".to_string(),
            MetaItemName::Crs(ident) => format!("{}{}{}", CRS_PREFIX, ident, CRS_SUFFIX),
        }
    }

    pub fn format(&self) -> MetaFormat {
        match self {
            MetaItemName::Schema | MetaItemName::DatasetJson => MetaFormat::Json,
            _ => MetaFormat::Text,
        }
    }

    /// Serialize a value for storage
    ///
    /// # Errors
    ///
    /// Returns `InvalidPatch` when a text item is given a non-string value.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match self.format() {
            MetaFormat::Json => Ok(serde_json::to_vec(value)?),
            MetaFormat::Text => match value {
                Value::String(text) => Ok(text.as_bytes().to_vec()),
                _ => Err(TesseraError::InvalidPatch {
                    reason: format!("Meta item {} must be a string", self),
                }),
            },
        }
    }

    /// Deserialize stored bytes
    ///
    /// # Errors
    ///
    /// Returns `Json` if a JSON item does not parse, or `InvalidPatch` if a
    /// text item is not UTF-8.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        match self.format() {
            MetaFormat::Json => Ok(serde_json::from_slice(bytes)?),
            MetaFormat::Text => String::from_utf8(bytes.to_vec())
                .map(Value::String)
                .map_err(|_| TesseraError::InvalidPatch {
                    reason: format!("Meta item {} is not valid UTF-8", self),
                }),
        }
    }
}

impl TryFrom<String> for MetaItemName {
    type Error = TesseraError;

    fn try_from(name: String) -> Result<Self> {
        Self::parse_required(&name)
    }
}

impl From<MetaItemName> for String {
    fn from(item: MetaItemName) -> Self {
        item.as_name()
    }
}

impl fmt::Display for MetaItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_name())
    }
}
