//! `[Content_Types].xml`: extension defaults and per-part overrides.

use std::fmt::Write;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use crate::error::CatalogError;

pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

const TYPES_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// MIME type for an image extension, if it is one we place.
pub fn image_content_type(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// (extension, content type)
    defaults: Vec<(String, String)>,
    /// (part name with leading `/`, content type)
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Result<Self, CatalogError> {
        let mut types = Self::default();
        let mut reader = Reader::from_str(xml);

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let local = e.local_name();
                    let key_attr: &[u8] = match local.as_ref() {
                        b"Default" => b"Extension",
                        b"Override" => b"PartName",
                        _ => continue,
                    };
                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes().flatten() {
                        let Ok(value) = attr.unescape_value() else {
                            continue;
                        };
                        let name = attr.key.local_name();
                        if name.as_ref() == key_attr {
                            key = Some(value.to_string());
                        } else if name.as_ref() == b"ContentType" {
                            content_type = Some(value.to_string());
                        }
                    }
                    if let (Some(key), Some(ct)) = (key, content_type) {
                        if local.as_ref() == b"Default" {
                            types.defaults.push((key, ct));
                        } else {
                            types.overrides.push((key, ct));
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(CatalogError::Template(format!(
                        "malformed [Content_Types].xml: {e}"
                    )));
                }
                _ => {}
            }
        }

        Ok(types)
    }

    pub fn has_default(&self, ext: &str) -> bool {
        self.defaults
            .iter()
            .any(|(e, _)| e.eq_ignore_ascii_case(ext))
    }

    /// Register an extension default unless one exists.
    pub fn ensure_default(&mut self, ext: &str, content_type: &str) {
        if !self.has_default(ext) {
            self.defaults
                .push((ext.to_string(), content_type.to_string()));
        }
    }

    /// Content type override for a package part (`ppt/slides/slide1.xml`).
    pub fn override_for(&self, part: &str) -> Option<&str> {
        let name = format!("/{}", part.trim_start_matches('/'));
        self.overrides
            .iter()
            .find(|(p, _)| *p == name)
            .map(|(_, ct)| ct.as_str())
    }

    /// Set the override of a package part.
    pub fn set_override(&mut self, part: &str, content_type: &str) {
        let name = format!("/{}", part.trim_start_matches('/'));
        match self.overrides.iter_mut().find(|(p, _)| *p == name) {
            Some((_, ct)) => *ct = content_type.to_string(),
            None => self.overrides.push((name, content_type.to_string())),
        }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        let _ = write!(xml, r#"<Types xmlns="{TYPES_NAMESPACE}">"#);
        for (ext, ct) in &self.defaults {
            let _ = write!(
                xml,
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(ext.as_str()),
                escape(ct.as_str())
            );
        }
        for (part, ct) in &self.overrides {
            let _ = write!(
                xml,
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape(part.as_str()),
                escape(ct.as_str())
            );
        }
        xml.push_str("</Types>");
        xml
    }
}
