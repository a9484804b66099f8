//! Package relationship parts (`*.rels`).

use std::fmt::Write;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use crate::error::CatalogError;

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const REL_NOTES_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";

const RELS_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `External` for targets outside the package.
    pub target_mode: Option<String>,
}

/// The relationships of one part, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(xml: &str) -> Result<Self, CatalogError> {
        let mut items = Vec::new();
        let mut reader = Reader::from_str(xml);

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        target_mode: None,
                    };
                    for attr in e.attributes().flatten() {
                        let Ok(value) = attr.unescape_value() else {
                            continue;
                        };
                        match attr.key.local_name().as_ref() {
                            b"Id" => rel.id = value.to_string(),
                            b"Type" => rel.rel_type = value.to_string(),
                            b"Target" => rel.target = value.to_string(),
                            b"TargetMode" => rel.target_mode = Some(value.to_string()),
                            _ => {}
                        }
                    }
                    if !rel.id.is_empty() {
                        items.push(rel);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(CatalogError::Template(format!(
                        "malformed relationships part: {e}"
                    )));
                }
                _ => {}
            }
        }

        Ok(Self { items })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn first_of_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.rel_type == rel_type)
    }

    /// An `rIdN` not used by any relationship, `N` one past the highest.
    pub fn next_id(&self) -> String {
        let max = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    /// `count` consecutive unused ids, starting at [`next_id`](Self::next_id).
    pub fn reserve_ids(&self, count: usize) -> Vec<String> {
        let first = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<usize>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        (first..first + count).map(|n| format!("rId{n}")).collect()
    }

    /// Add an internal relationship and return its id.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_id();
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: None,
        });
        id
    }

    /// Add a relationship with a caller-chosen id.
    pub fn insert(&mut self, rel: Relationship) {
        self.items.push(rel);
    }

    /// Drop every relationship of `rel_type`.
    pub fn remove_type(&mut self, rel_type: &str) {
        self.items.retain(|r| r.rel_type != rel_type);
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        let _ = write!(xml, r#"<Relationships xmlns="{RELS_NAMESPACE}">"#);
        for rel in &self.items {
            let _ = write!(
                xml,
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                escape(rel.id.as_str()),
                escape(rel.rel_type.as_str()),
                escape(rel.target.as_str())
            );
            if let Some(mode) = &rel.target_mode {
                let _ = write!(xml, r#" TargetMode="{}""#, escape(mode.as_str()));
            }
            xml.push_str("/>");
        }
        xml.push_str("</Relationships>");
        xml
    }
}

/// Relationships part of `part`: `ppt/slides/slide1.xml` →
/// `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns it.
/// Absolute targets (`/ppt/...`) are package-rooted.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}
