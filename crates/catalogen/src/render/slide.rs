//! Slide XML rewriting.
//!
//! Text is rewritten one DrawingML paragraph (`a:p`) at a time. When every
//! token sits inside a single run, each `a:t` is substituted in place.
//! PowerPoint freely splits text into runs, so a token like `{{price_1}}`
//! may also be spread over several `a:t` elements: then the paragraph text
//! is joined, substituted, written into the first `a:t`, and the remaining
//! `a:t` elements are emptied. Shapes (`p:sp`) holding an image token are
//! swapped for a `p:pic` occupying the same box.

use std::collections::VecDeque;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};

use super::picture::{Geometry, PictureRef, picture_xml};
use crate::error::CatalogError;
use crate::placeholder::{Placeholder, contains_placeholder, find_placeholders, replace_placeholders};

/// Decides what each placeholder token becomes.
pub(crate) trait TokenResolver {
    /// Replacement text for a token.
    fn text(&mut self, placeholder: &Placeholder) -> String;
    /// Picture that should replace the shape holding `placeholder`, if any.
    fn picture(&mut self, placeholder: &Placeholder) -> Option<PictureRef>;
}

/// Result of rewriting one slide.
#[derive(Debug, Default)]
pub(crate) struct SlideOutcome {
    pub xml: String,
    /// Image tokens whose shape was replaced by a picture.
    pub placed: Vec<Placeholder>,
    /// Image tokens that had a picture but no box to put it in.
    pub unplaced: Vec<(Placeholder, String)>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tag {
    ParagraphStart,
    ParagraphEnd,
    TextStart,
    TextEnd,
    TextEmpty,
    ShapeStart,
    ShapeEnd,
    Other,
}

/// Classify by local name so any namespace prefix works.
fn tag(event: &Event<'_>) -> Tag {
    match event {
        Event::Start(e) => match e.local_name().as_ref() {
            b"p" => Tag::ParagraphStart,
            b"t" => Tag::TextStart,
            b"sp" => Tag::ShapeStart,
            _ => Tag::Other,
        },
        Event::End(e) => match e.local_name().as_ref() {
            b"p" => Tag::ParagraphEnd,
            b"t" => Tag::TextEnd,
            b"sp" => Tag::ShapeEnd,
            _ => Tag::Other,
        },
        Event::Empty(e) if e.local_name().as_ref() == b"t" => Tag::TextEmpty,
        _ => Tag::Other,
    }
}

fn malformed(e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Template(format!("malformed slide XML: {e}"))
}

fn write_error(e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Template(format!("cannot write slide XML: {e}"))
}

/// Visible text of `a:t` elements in `events`, one string per paragraph.
fn paragraph_texts(events: &[Event<'static>]) -> Vec<String> {
    let mut texts = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    for event in events {
        match tag(event) {
            Tag::ParagraphStart => current.clear(),
            Tag::ParagraphEnd => texts.push(std::mem::take(&mut current)),
            Tag::TextStart => in_text = true,
            Tag::TextEnd => in_text = false,
            _ if in_text => push_text(event, &mut current),
            _ => {}
        }
    }
    if !current.is_empty() {
        texts.push(current);
    }
    texts
}

/// Text of each `a:t` element of one paragraph, in order. Empty `<a:t/>`
/// elements are not listed.
fn run_texts(events: &[Event<'static>]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current: Option<String> = None;
    for event in events {
        match tag(event) {
            Tag::TextStart => current = Some(String::new()),
            Tag::TextEnd => runs.extend(current.take()),
            _ => {
                if let Some(text) = current.as_mut() {
                    push_text(event, text);
                }
            }
        }
    }
    runs
}

fn push_text(event: &Event<'_>, out: &mut String) {
    match event {
        Event::Text(t) => {
            if let Ok(text) = t.xml_content() {
                out.push_str(&text);
            }
        }
        Event::GeneralRef(r) => {
            if let Ok(Some(ch)) = r.resolve_char_ref() {
                out.push(ch);
            } else if let Ok(name) = r.decode()
                && let Some(resolved) = resolve_predefined_entity(&name)
            {
                out.push_str(resolved);
            }
        }
        Event::CData(c) => {
            if let Ok(text) = c.decode() {
                out.push_str(&text);
            }
        }
        _ => {}
    }
}

fn read_events(xml: &str) -> Result<Vec<Event<'static>>, CatalogError> {
    let mut reader = Reader::from_str(xml);
    let mut events = Vec::new();
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Eof => break,
            event => events.push(event.into_owned()),
        }
    }
    Ok(events)
}

/// Placeholder tokens of a slide, paragraph by paragraph.
pub(crate) fn slide_placeholders(xml: &str) -> Result<Vec<Placeholder>, CatalogError> {
    let events = read_events(xml)?;
    Ok(paragraph_texts(&events)
        .iter()
        .flat_map(|text| find_placeholders(text))
        .collect())
}

struct SlideWriter {
    writer: Writer<Vec<u8>>,
    paragraph: Option<Vec<Event<'static>>>,
    /// Set while a captured `p:sp` is written back.
    in_shape: bool,
    outcome: SlideOutcome,
}

impl SlideWriter {
    fn write(&mut self, event: Event<'_>) -> Result<(), CatalogError> {
        self.writer.write_event(event).map_err(write_error)
    }

    fn write_raw(&mut self, xml: &str) {
        self.writer.get_mut().extend_from_slice(xml.as_bytes());
    }

    /// Pass an event through, buffering whole paragraphs for substitution.
    fn feed(
        &mut self,
        event: Event<'static>,
        resolver: &mut dyn TokenResolver,
    ) -> Result<(), CatalogError> {
        let kind = tag(&event);
        if let Some(buffer) = self.paragraph.as_mut() {
            buffer.push(event);
            if kind == Tag::ParagraphEnd
                && let Some(buffer) = self.paragraph.take()
            {
                self.flush_paragraph(buffer, resolver)?;
            }
            return Ok(());
        }
        if kind == Tag::ParagraphStart {
            self.paragraph = Some(vec![event]);
            return Ok(());
        }
        self.write(event)
    }

    fn flush_paragraph(
        &mut self,
        events: Vec<Event<'static>>,
        resolver: &mut dyn TokenResolver,
    ) -> Result<(), CatalogError> {
        let text = paragraph_texts(&events).concat();
        if !contains_placeholder(&text) {
            for event in events {
                self.write(event)?;
            }
            return Ok(());
        }

        if !self.in_shape {
            for placeholder in find_placeholders(&text) {
                if resolver.picture(&placeholder).is_some() {
                    self.outcome.unplaced.push((
                        placeholder,
                        "image placeholder is not in a shape".to_string(),
                    ));
                }
            }
        }

        // Tokens that each sit inside one run are replaced run by run, so
        // line breaks and run formatting stay where they are. Otherwise the
        // whole paragraph text goes into the first run.
        let runs = run_texts(&events);
        let per_run = runs.iter().map(|r| find_placeholders(r).len()).sum::<usize>()
            == find_placeholders(&text).len();
        let mut pending: VecDeque<String> = if per_run {
            runs.iter()
                .map(|r| replace_placeholders(r, |p| resolver.text(p)).into_owned())
                .collect()
        } else {
            std::iter::once(replace_placeholders(&text, |p| resolver.text(p)).into_owned())
                .collect()
        };
        let mut in_text = false;

        for event in events {
            match tag(&event) {
                Tag::TextStart => {
                    self.write(event)?;
                    in_text = true;
                    if let Some(text) = pending.pop_front()
                        && !text.is_empty()
                    {
                        self.write(Event::Text(BytesText::new(&text)))?;
                    }
                }
                Tag::TextEnd => {
                    in_text = false;
                    self.write(event)?;
                }
                Tag::TextEmpty if !per_run => match pending.pop_front() {
                    Some(text) if !text.is_empty() => {
                        if let Event::Empty(start) = event {
                            let end = start.to_end().into_owned();
                            self.write(Event::Start(start))?;
                            self.write(Event::Text(BytesText::new(&text)))?;
                            self.write(Event::End(end))?;
                        }
                    }
                    _ => self.write(event)?,
                },
                _ if in_text => {}
                _ => self.write(event)?,
            }
        }
        Ok(())
    }

    /// Write a captured `p:sp`, replacing it with a picture when it holds
    /// an image token that resolves to one.
    fn finish_shape(
        &mut self,
        events: Vec<Event<'static>>,
        resolver: &mut dyn TokenResolver,
    ) -> Result<(), CatalogError> {
        let text = paragraph_texts(&events).concat();
        for placeholder in find_placeholders(&text) {
            let Some(picture) = resolver.picture(&placeholder) else {
                continue;
            };
            match ShapeInfo::from_events(&events) {
                Some(info) => {
                    let frame = info.geometry.fit(picture.width, picture.height);
                    self.write_raw(&picture_xml(info.id, &info.name, &picture, frame));
                    self.outcome.placed.push(placeholder);
                    return Ok(());
                }
                None => {
                    self.outcome
                        .unplaced
                        .push((placeholder, "frame has no position of its own".to_string()));
                    break;
                }
            }
        }

        self.in_shape = true;
        for event in events {
            self.feed(event, resolver)?;
        }
        self.in_shape = false;
        Ok(())
    }
}

/// What is needed from a shape to put a picture in its place.
struct ShapeInfo {
    id: u32,
    name: String,
    geometry: Geometry,
}

impl ShapeInfo {
    fn from_events(events: &[Event<'static>]) -> Option<Self> {
        let mut id = None;
        let mut name = String::new();
        let mut in_sp_pr = false;
        let mut in_xfrm = false;
        let mut offset = None;
        let mut extent = None;

        for event in events {
            let (start, is_open) = match event {
                Event::Start(e) => (e, true),
                Event::Empty(e) => (e, false),
                Event::End(e) => {
                    match e.local_name().as_ref() {
                        b"spPr" => in_sp_pr = false,
                        b"xfrm" => in_xfrm = false,
                        _ => {}
                    }
                    continue;
                }
                _ => continue,
            };
            match start.local_name().as_ref() {
                b"cNvPr" if id.is_none() => {
                    id = attr_value(start, b"id").and_then(|v| v.parse().ok());
                    name = attr_value(start, b"name").unwrap_or_default();
                }
                b"spPr" => in_sp_pr = is_open,
                b"xfrm" if in_sp_pr && offset.is_none() => in_xfrm = is_open,
                b"off" if in_xfrm => {
                    offset = Some((attr_i64(start, b"x")?, attr_i64(start, b"y")?));
                }
                b"ext" if in_xfrm => {
                    extent = Some((attr_i64(start, b"cx")?, attr_i64(start, b"cy")?));
                }
                _ => {}
            }
        }

        let ((x, y), (cx, cy)) = (offset?, extent?);
        Some(Self {
            id: id?,
            name,
            geometry: Geometry { x, y, cx, cy },
        })
    }
}

fn attr_value(start: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn attr_i64(start: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<i64> {
    attr_value(start, key)?.parse().ok()
}

/// Rewrite every placeholder of a slide through `resolver`.
pub(crate) fn rewrite_slide(
    xml: &str,
    resolver: &mut dyn TokenResolver,
) -> Result<SlideOutcome, CatalogError> {
    let mut reader = Reader::from_str(xml);
    let mut out = SlideWriter {
        writer: Writer::new(Vec::new()),
        paragraph: None,
        in_shape: false,
        outcome: SlideOutcome::default(),
    };
    let mut shape: Option<Vec<Event<'static>>> = None;
    let mut shape_depth = 0usize;

    loop {
        let event = reader.read_event().map_err(malformed)?.into_owned();
        if matches!(event, Event::Eof) {
            break;
        }
        let kind = tag(&event);

        if let Some(captured) = shape.as_mut() {
            match kind {
                Tag::ShapeStart => shape_depth += 1,
                Tag::ShapeEnd => shape_depth -= 1,
                _ => {}
            }
            captured.push(event);
            if shape_depth == 0
                && let Some(captured) = shape.take()
            {
                out.finish_shape(captured, resolver)?;
            }
            continue;
        }

        if kind == Tag::ShapeStart {
            shape = Some(vec![event]);
            shape_depth = 1;
            continue;
        }
        out.feed(event, resolver)?;
    }

    if shape.is_some() || out.paragraph.is_some() {
        return Err(malformed("unexpected end of document"));
    }

    let mut outcome = out.outcome;
    outcome.xml = String::from_utf8(out.writer.into_inner()).map_err(write_error)?;
    Ok(outcome)
}
