//! Boundary adapters: on-disk layout, atomic writes, config loading,
//! schema export.
//!
//! Nanostore is single-file: one logical file holds a header (format
//! version + the dimension set in canonical form) and the ordered document
//! list. Everything else in the crate is pure in-memory logic;
//! this module is the only place that touches the filesystem, and the only
//! place operations may block.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dimension::{Dimension, DimensionSet};
use crate::document::Document;
use crate::error::{Error, Result};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedHeader {
    format_version: u32,
    dimensions: Vec<Dimension>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFile {
    header: PersistedHeader,
    documents: Vec<Document>,
}

/// Owns the on-disk file handle for a store. Acquired at construction,
/// released on drop; `close` surfaces any error instead of swallowing it
///.
pub struct FileHandle {
    path: PathBuf,
}

impl FileHandle {
    /// Open an existing file, or create a new, empty one with the given
    /// dimension set if none exists yet.
    pub fn open_or_create(path: impl AsRef<Path>, dims: &DimensionSet) -> Result<(Self, Vec<Document>)> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            let handle = Self { path };
            let documents = handle.load(dims)?;
            Ok((handle, documents))
        } else {
            let handle = Self { path };
            handle.write(dims, &[])?;
            Ok((handle, Vec::new()))
        }
    }

    fn load(&self, expected: &DimensionSet) -> Result<Vec<Document>> {
        let bytes = fs::read(&self.path)?;
        let persisted: PersistedFile = serde_json::from_slice(&bytes)?;

        if persisted.header.format_version != FORMAT_VERSION {
            return Err(Error::configuration(format!(
                "unsupported store format version {}",
                persisted.header.format_version
            )));
        }

        let on_disk = DimensionSet::new(persisted.header.dimensions)?;
        if on_disk.dimensions() != expected.dimensions() {
            tracing::warn!(path = %self.path.display(), "opening store whose on-disk dimension set differs from the requested one");
        }

        Ok(persisted.documents)
    }

    /// Write the full document set atomically: write to a sibling temp file
    /// in the same directory, then rename over the target.
    pub fn write(&self, dims: &DimensionSet, documents: &[Document]) -> Result<()> {
        let persisted = PersistedFile {
            header: PersistedHeader {
                format_version: FORMAT_VERSION,
                dimensions: dims.dimensions().to_vec(),
            },
            documents: documents.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&persisted)?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let tmp_path = dir.join(format!(
            ".{}.tmp",
            self.path.file_name().and_then(|n| n.to_str()).unwrap_or("nanostore")
        ));

        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&json)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), documents = documents.len(), "persisted store snapshot");
        Ok(())
    }

    /// Release the handle, surfacing any pending error. Files have no
    /// buffered state to flush by this point (every write is synced before
    /// `write` returns), so this is a no-op that exists to give close a
    /// single, explicit point of failure to report.
    pub fn close(self) -> Result<()> {
        Ok(())
    }
}

/// The configuration document accepted by the loader: a list of
/// dimensions, each with `name`, `type`, and type-specific fields.
#[derive(Debug, Deserialize)]
pub struct ConfigDocument {
    pub dimensions: Vec<ConfigDimension>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConfigDimension {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ConfigDimensionKind,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub prefixes: std::collections::HashMap<String, String>,
    pub default_value: Option<String>,
    pub ref_field: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigDimensionKind {
    Enumerated,
    Hierarchical,
}

/// Load and validate a dimension-set configuration document from a JSON
/// file. Returns a human-readable `Error::Configuration` on any
/// invariant violation.
pub fn load_config(path: impl AsRef<Path>) -> Result<DimensionSet> {
    let bytes = fs::read(path)?;
    let doc: ConfigDocument = serde_json::from_slice(&bytes)?;
    parse_config(doc)
}

pub fn parse_config(doc: ConfigDocument) -> Result<DimensionSet> {
    let mut dims = Vec::with_capacity(doc.dimensions.len());
    for d in doc.dimensions {
        let dim = match d.kind {
            ConfigDimensionKind::Enumerated => Dimension::enumerated(d.name, d.values, d.prefixes, d.default_value),
            ConfigDimensionKind::Hierarchical => {
                let ref_field = d
                    .ref_field
                    .ok_or_else(|| Error::configuration(format!("dimension '{}' is hierarchical but declares no ref_field", d.name)))?;
                Dimension::hierarchical(d.name, ref_field)
            }
        };
        dims.push(dim);
    }
    DimensionSet::new(dims)
}

/// The schema-exporter shape: the inverse of the loader, starting
/// from a validated `DimensionSet` plus the data-field inventory a typed
/// schema binder collects (`schema::Recordable::data_fields`).
#[derive(Debug, Serialize)]
pub struct ExportedSchema {
    pub store_name: String,
    pub version: u32,
    pub dimensions: std::collections::HashMap<String, ExportedDimension>,
    pub data_fields: std::collections::HashMap<String, ExportedDataField>,
}

#[derive(Debug, Serialize)]
pub struct ExportedDimension {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub field_type: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub prefixes: std::collections::HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_field: Option<String>,
    pub nullable: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportedDataField {
    pub field_type: &'static str,
    pub nullable: bool,
}

pub fn export_schema(store_name: &str, dims: &DimensionSet, data_fields: &[(String, &'static str, bool)]) -> ExportedSchema {
    let mut dimensions = std::collections::HashMap::new();
    for dim in dims.dimensions() {
        let entry = match &dim.kind {
            crate::dimension::DimensionKind::Enumerated { values, prefixes, default } => ExportedDimension {
                kind: "enumerated",
                field_type: "string",
                values: values.clone(),
                default: default.clone(),
                prefixes: prefixes.clone(),
                ref_field: None,
                nullable: default.is_none(),
            },
            crate::dimension::DimensionKind::Hierarchical { ref_field } => ExportedDimension {
                kind: "hierarchical",
                field_type: "string",
                values: Vec::new(),
                default: None,
                prefixes: std::collections::HashMap::new(),
                ref_field: Some(ref_field.clone()),
                nullable: true,
            },
        };
        dimensions.insert(dim.name.clone(), entry);
    }

    let data_fields = data_fields
        .iter()
        .map(|(name, field_type, nullable)| {
            (
                name.clone(),
                ExportedDataField {
                    field_type,
                    nullable: *nullable,
                },
            )
        })
        .collect();

    ExportedSchema {
        store_name: store_name.to_string(),
        version: FORMAT_VERSION,
        dimensions,
        data_fields,
    }
}
