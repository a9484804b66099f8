//! In-memory PPTX package.
//!
//! A PPTX file is a ZIP archive of XML parts. The package keeps every part
//! as raw bytes in archive order so untouched parts are written back
//! byte-for-byte.

pub mod content_types;
pub mod presentation;
pub mod rels;

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::CatalogError;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const ROOT_RELS_PART: &str = "_rels/.rels";
pub const DEFAULT_PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Parts of an OOXML package, in archive order.
#[derive(Debug, Clone, Default)]
pub struct PptxPackage {
    parts: Vec<(String, Vec<u8>)>,
}

impl PptxPackage {
    /// Read a package from disk. The file is read in one call and closed
    /// before parsing starts.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            CatalogError::Template(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_bytes(&data)
    }

    /// Read a package from raw ZIP bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CatalogError> {
        let mut archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| CatalogError::Template(format!("not a PPTX package: {e}")))?;

        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| CatalogError::Template(format!("corrupt PPTX entry {i}: {e}")))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)
                .map_err(|e| CatalogError::Template(format!("cannot read {name}: {e}")))?;
            parts.push((name, content));
        }

        let package = Self { parts };
        if !package.has_part(CONTENT_TYPES_PART) {
            return Err(CatalogError::Template(format!(
                "not a PPTX package: {CONTENT_TYPES_PART} missing"
            )));
        }
        Ok(package)
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// A part decoded as UTF-8 XML.
    pub fn part_text(&self, name: &str) -> Result<String, CatalogError> {
        let data = self
            .part(name)
            .ok_or_else(|| CatalogError::Template(format!("part {name} missing")))?;
        String::from_utf8(data.to_vec())
            .map_err(|_| CatalogError::Template(format!("part {name} is not UTF-8")))
    }

    /// Replace a part, or append it when it does not exist yet.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    /// The main presentation part, found through the package relationships.
    pub fn presentation_part(&self) -> Result<String, CatalogError> {
        let Some(data) = self.part(ROOT_RELS_PART) else {
            return Ok(DEFAULT_PRESENTATION_PART.to_string());
        };
        let xml = std::str::from_utf8(data)
            .map_err(|_| CatalogError::Template(format!("part {ROOT_RELS_PART} is not UTF-8")))?;
        let rels = rels::Relationships::parse(xml)?;
        Ok(rels
            .first_of_type(rels::REL_OFFICE_DOCUMENT)
            .map(|r| rels::resolve_target("", &r.target))
            .unwrap_or_else(|| DEFAULT_PRESENTATION_PART.to_string()))
    }

    /// Serialize the package to ZIP bytes.
    ///
    /// Entries keep their order and carry a fixed timestamp, so equal
    /// packages serialize to equal bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CatalogError> {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in &self.parts {
            zip.start_file(name.as_str(), options)
                .map_err(|e| CatalogError::Output(format!("cannot add {name}: {e}")))?;
            zip.write_all(data)
                .map_err(|e| CatalogError::Output(format!("cannot write {name}: {e}")))?;
        }
        let cursor = zip
            .finish()
            .map_err(|e| CatalogError::Output(format!("cannot finish package: {e}")))?;
        Ok(cursor.into_inner())
    }
}
