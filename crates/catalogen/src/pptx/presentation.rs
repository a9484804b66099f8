//! Slide order (`p:sldIdLst`) and slide part management.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::content_types::{CT_SLIDE, ContentTypes};
use super::rels::{self, REL_SLIDE, Relationships};
use super::{CONTENT_TYPES_PART, PptxPackage};
use crate::error::CatalogError;

/// First id PowerPoint accepts in `p:sldIdLst`.
const MIN_SLIDE_ID: u32 = 256;

/// A slide as listed by the presentation, in deck order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideEntry {
    pub id: u32,
    pub rel_id: String,
    /// Package part name, e.g. `ppt/slides/slide1.xml`.
    pub part: String,
}

struct SlideIdList {
    entries: Vec<(u32, String)>,
    /// Qualified name of the relationship attribute, usually `r:id`.
    rel_attr: String,
}

fn parse_slide_ids(xml: &str) -> Result<SlideIdList, CatalogError> {
    let mut list = SlideIdList {
        entries: Vec::new(),
        rel_attr: "r:id".to_string(),
    };
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sldId" =>
            {
                let mut id = None;
                let mut rel_id = None;
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() != b"id" {
                        continue;
                    }
                    let Ok(value) = attr.unescape_value() else {
                        continue;
                    };
                    if attr.key.prefix().is_some() {
                        list.rel_attr = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        rel_id = Some(value.to_string());
                    } else {
                        id = value.parse::<u32>().ok();
                    }
                }
                if let (Some(id), Some(rel_id)) = (id, rel_id) {
                    list.entries.push((id, rel_id));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CatalogError::Template(format!(
                    "malformed presentation part: {e}"
                )));
            }
            _ => {}
        }
    }

    Ok(list)
}

/// Rewrite `p:sldIdLst` of a presentation part with `entries`, leaving the
/// rest of the document untouched.
fn write_slide_ids(xml: &str, list: &SlideIdList) -> Result<String, CatalogError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut skipping = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| CatalogError::Template(format!("malformed presentation part: {e}")))?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) if e.local_name().as_ref() == b"sldIdLst" => {
                writer.write_event(Event::Start(e.clone())).map_err(xml_error)?;
                write_entries(&mut writer, e, list)?;
                skipping = true;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sldIdLst" => {
                writer.write_event(Event::Start(e.clone())).map_err(xml_error)?;
                write_entries(&mut writer, e, list)?;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer
                    .write_event(Event::End(BytesEnd::new(name)))
                    .map_err(xml_error)?;
            }
            Event::End(ref e) if skipping && e.local_name().as_ref() == b"sldIdLst" => {
                skipping = false;
                writer.write_event(Event::End(e.clone())).map_err(xml_error)?;
            }
            _ if skipping => {}
            other => writer.write_event(other).map_err(xml_error)?,
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|_| CatalogError::Template("presentation part is not UTF-8".to_string()))
}

fn write_entries(
    writer: &mut Writer<Vec<u8>>,
    list_start: &BytesStart<'_>,
    list: &SlideIdList,
) -> Result<(), CatalogError> {
    let qname = String::from_utf8_lossy(list_start.name().as_ref()).into_owned();
    let entry_name = match qname.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:sldId"),
        None => "sldId".to_string(),
    };
    for (id, rel_id) in &list.entries {
        let id = id.to_string();
        let entry = BytesStart::new(entry_name.as_str()).with_attributes([
            ("id", id.as_str()),
            (list.rel_attr.as_str(), rel_id.as_str()),
        ]);
        writer.write_event(Event::Empty(entry)).map_err(xml_error)?;
    }
    Ok(())
}

fn xml_error(e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Template(format!("cannot write presentation part: {e}"))
}

/// Slides of the presentation in deck order.
pub fn slide_list(package: &PptxPackage) -> Result<Vec<SlideEntry>, CatalogError> {
    let pres_part = package.presentation_part()?;
    let pres_xml = package.part_text(&pres_part)?;
    let pres_rels = Relationships::parse(&package.part_text(&rels::rels_part_for(&pres_part))?)?;

    parse_slide_ids(&pres_xml)?
        .entries
        .into_iter()
        .map(|(id, rel_id)| {
            let rel = pres_rels.get(&rel_id).ok_or_else(|| {
                CatalogError::Template(format!("slide relationship {rel_id} missing"))
            })?;
            Ok(SlideEntry {
                id,
                part: rels::resolve_target(&pres_part, &rel.target),
                rel_id,
            })
        })
        .collect()
}

/// Add a slide part right after `after_part` in deck order and return the
/// new part name.
pub fn insert_slide_after(
    package: &mut PptxPackage,
    after_part: &str,
    slide_xml: Vec<u8>,
    slide_rels: &Relationships,
) -> Result<String, CatalogError> {
    let pres_part = package.presentation_part()?;
    let pres_rels_part = rels::rels_part_for(&pres_part);
    let pres_xml = package.part_text(&pres_part)?;
    let mut pres_rels = Relationships::parse(&package.part_text(&pres_rels_part)?)?;
    let mut types = ContentTypes::parse(&package.part_text(CONTENT_TYPES_PART)?)?;

    let number = next_slide_number(package);
    let part = format!("ppt/slides/slide{number}.xml");
    let target = match pres_part.rsplit_once('/') {
        Some((dir, _)) if part.starts_with(&format!("{dir}/")) => part[dir.len() + 1..].to_string(),
        _ => format!("/{part}"),
    };

    let mut list = parse_slide_ids(&pres_xml)?;
    let position = list
        .entries
        .iter()
        .position(|(_, rid)| {
            pres_rels
                .get(rid)
                .is_some_and(|r| rels::resolve_target(&pres_part, &r.target) == after_part)
        })
        .map(|i| i + 1)
        .unwrap_or(list.entries.len());
    let id = list
        .entries
        .iter()
        .map(|(id, _)| *id + 1)
        .max()
        .unwrap_or(MIN_SLIDE_ID)
        .max(MIN_SLIDE_ID);
    let rel_id = pres_rels.add(REL_SLIDE, &target);
    list.entries.insert(position, (id, rel_id));

    types.set_override(&part, CT_SLIDE);

    package.set_part(&part, slide_xml);
    package.set_part(&rels::rels_part_for(&part), slide_rels.to_xml().into_bytes());
    package.set_part(&pres_part, write_slide_ids(&pres_xml, &list)?.into_bytes());
    package.set_part(&pres_rels_part, pres_rels.to_xml().into_bytes());
    package.set_part(CONTENT_TYPES_PART, types.to_xml().into_bytes());
    Ok(part)
}

fn next_slide_number(package: &PptxPackage) -> u32 {
    package
        .part_names()
        .filter_map(|name| {
            name.strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()
        })
        .max()
        .unwrap_or(0)
        + 1
}
