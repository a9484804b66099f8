//! Template renderer: fills the product slide of a PPTX template page by
//! page and substitutes deck-wide placeholders everywhere else.

mod fields;
mod picture;
mod slide;

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use self::picture::{MediaImage, PictureRef};
use self::slide::{TokenResolver, rewrite_slide, slide_placeholders};
use crate::config::CatalogOptions;
use crate::error::{CatalogError, CatalogWarning};
use crate::filter::SupplierCode;
use crate::images::ImageSet;
use crate::placeholder::{Placeholder, PlaceholderKind};
use crate::pptx::content_types::ContentTypes;
use crate::pptx::presentation::{SlideEntry, insert_slide_after, slide_list};
use crate::pptx::rels::{REL_IMAGE, REL_NOTES_SLIDE, Relationship, Relationships, rels_part_for};
use crate::pptx::{CONTENT_TYPES_PART, PptxPackage};
use crate::sheet::ProductRow;

pub use fields::format_price;

/// One product and the images found for it.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub row: ProductRow,
    pub images: ImageSet,
}

/// Everything placeholders can resolve against, besides the products.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub options: &'a CatalogOptions,
    pub supplier_code: &'a SupplierCode,
    pub supplier_name: &'a str,
    /// Header names of the product master, in sheet order.
    pub columns: &'a [String],
}

/// A rendered deck, not yet written anywhere.
#[derive(Debug)]
pub struct RenderedCatalog {
    pub package: PptxPackage,
    /// Number of product slides (template slide plus clones).
    pub product_slides: usize,
    pub warnings: Vec<CatalogWarning>,
}

/// Render `entries` into `template`.
///
/// Products fill the slots of the product slide in order; each further
/// batch goes on a copy of the untouched product slide inserted after the
/// previous one. With no entries the product slide is rendered once with
/// every slot cleared.
pub fn render_catalog(
    mut package: PptxPackage,
    entries: &[CatalogEntry],
    ctx: &RenderContext<'_>,
) -> Result<RenderedCatalog, CatalogError> {
    let slides = slide_list(&package)?;
    if slides.is_empty() {
        return Err(CatalogError::Template("template has no slides".to_string()));
    }
    let (product_index, slot_count) =
        select_product_slide(&package, &slides, ctx.options.template_slide)?;
    let product_part = slides[product_index].part.clone();
    debug!(
        slide = product_index + 1,
        part = %product_part,
        slots = slot_count,
        "selected product slide"
    );

    let pristine_xml = package.part_text(&product_part)?;
    let mut clone_rels = read_rels(&package, &product_part)?;
    clone_rels.remove_type(REL_NOTES_SLIDE);

    let pages: Vec<&[CatalogEntry]> = if entries.is_empty() {
        vec![entries]
    } else {
        entries.chunks(slot_count).collect()
    };

    let mut page_parts = vec![product_part];
    for _ in 1..pages.len() {
        let previous = page_parts.last().map(String::as_str).unwrap_or_default();
        let part = insert_slide_after(
            &mut package,
            previous,
            pristine_xml.clone().into_bytes(),
            &clone_rels,
        )?;
        page_parts.push(part);
    }

    let mut state = RenderState::default();
    for (page, (part, slots)) in page_parts.iter().zip(&pages).enumerate() {
        render_product_page(
            &mut package,
            part,
            slots,
            product_index + 1 + page,
            ctx,
            &mut state,
        )?;
    }

    for (index, entry) in slides.iter().enumerate() {
        if index == product_index {
            continue;
        }
        let position = if index < product_index {
            index + 1
        } else {
            index + pages.len()
        };
        render_other_slide(&mut package, &entry.part, position, ctx, &mut state)?;
    }

    if !state.media_types.is_empty() {
        let mut types = ContentTypes::parse(&package.part_text(CONTENT_TYPES_PART)?)?;
        for (ext, content_type) in &state.media_types {
            types.ensure_default(ext, content_type);
        }
        package.set_part(CONTENT_TYPES_PART, types.to_xml().into_bytes());
    }

    info!(
        products = entries.len(),
        product_slides = pages.len(),
        images = state.images_placed,
        "rendered catalog"
    );
    Ok(RenderedCatalog {
        package,
        product_slides: pages.len(),
        warnings: state.warnings,
    })
}

/// Index of the product slide in `slides` and its slot count.
fn select_product_slide(
    package: &PptxPackage,
    slides: &[SlideEntry],
    requested: Option<usize>,
) -> Result<(usize, usize), CatalogError> {
    let slot_count = |entry: &SlideEntry| -> Result<usize, CatalogError> {
        let xml = package.part_text(&entry.part)?;
        Ok(slide_placeholders(&xml)?
            .iter()
            .filter_map(Placeholder::index)
            .max()
            .unwrap_or(0))
    };

    if let Some(number) = requested {
        let entry = number
            .checked_sub(1)
            .and_then(|i| slides.get(i))
            .ok_or_else(|| {
                CatalogError::Template(format!(
                    "template_slide {number} out of range (template has {} slides)",
                    slides.len()
                ))
            })?;
        let slots = slot_count(entry)?;
        if slots == 0 {
            return Err(CatalogError::Template(format!(
                "slide {number} has no indexed placeholders"
            )));
        }
        return Ok((number - 1, slots));
    }

    for (index, entry) in slides.iter().enumerate() {
        let slots = slot_count(entry)?;
        if slots > 0 {
            return Ok((index, slots));
        }
    }
    Err(CatalogError::Template(
        "no slide contains an indexed placeholder such as {{product_name_1}}".to_string(),
    ))
}

fn read_rels(package: &PptxPackage, part: &str) -> Result<Relationships, CatalogError> {
    let rels_part = rels_part_for(part);
    if package.has_part(&rels_part) {
        Relationships::parse(&package.part_text(&rels_part)?)
    } else {
        Ok(Relationships::default())
    }
}

/// Bookkeeping shared by all slides of one render.
struct RenderState {
    warnings: Vec<CatalogWarning>,
    /// Tokens already reported as unknown.
    reported: HashSet<String>,
    /// Number of the next `ppt/media/catalogen_image<N>` part.
    next_media: usize,
    /// Image extensions embedded so far, with their content types.
    media_types: BTreeMap<String, &'static str>,
    images_placed: usize,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            warnings: Vec::new(),
            reported: HashSet::new(),
            next_media: 1,
            media_types: BTreeMap::new(),
            images_placed: 0,
        }
    }
}

impl RenderState {
    fn push_warning(&mut self, warning: CatalogWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    fn unknown_placeholder(&mut self, slide: usize, placeholder: &Placeholder) {
        if self.reported.insert(placeholder.token.clone()) {
            self.push_warning(CatalogWarning::UnknownPlaceholder {
                slide,
                token: placeholder.token.clone(),
            });
        }
    }
}

/// A product image waiting to be placed in a slot.
struct StagedImage {
    picture: PictureRef,
    media: MediaImage,
}

fn slot_label(entry: &CatalogEntry, ctx: &RenderContext<'_>, index: usize) -> String {
    let code = entry.row.text(&ctx.options.columns.product_code);
    if code.is_empty() {
        format!("slot {index}")
    } else {
        format!("slot {index} ({code})")
    }
}

fn render_product_page(
    package: &mut PptxPackage,
    part: &str,
    slots: &[CatalogEntry],
    position: usize,
    ctx: &RenderContext<'_>,
    state: &mut RenderState,
) -> Result<(), CatalogError> {
    let xml = package.part_text(part)?;
    let mut rels = read_rels(package, part)?;

    let with_images: Vec<(usize, &CatalogEntry)> = slots
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.images.is_empty())
        .map(|(i, entry)| (i + 1, entry))
        .collect();
    let rel_ids = rels.reserve_ids(with_images.len());

    let mut staged = BTreeMap::new();
    for ((index, entry), rel_id) in with_images.into_iter().zip(rel_ids) {
        let Some(path) = entry.images.first() else {
            continue;
        };
        match MediaImage::load(path) {
            Ok(media) => {
                let descr = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let picture = PictureRef {
                    rel_id,
                    width: media.width,
                    height: media.height,
                    descr,
                };
                staged.insert(index, StagedImage { picture, media });
            }
            Err(reason) => state.push_warning(CatalogWarning::ImageNotPlaced {
                slot: slot_label(entry, ctx, index),
                reason: format!("{}: {reason}", path.display()),
            }),
        }
    }

    let mut resolver = SlideResolver {
        ctx,
        slots: Some(slots),
        pictures: &staged,
        slide: position,
        state: &mut *state,
    };
    let outcome = rewrite_slide(&xml, &mut resolver)?;

    for (placeholder, reason) in &outcome.unplaced {
        if let Some(index) = placeholder.index()
            && let Some(entry) = slots.get(index - 1)
        {
            state.push_warning(CatalogWarning::ImageNotPlaced {
                slot: slot_label(entry, ctx, index),
                reason: reason.clone(),
            });
        }
    }

    let mut placed: Vec<usize> = outcome.placed.iter().filter_map(Placeholder::index).collect();
    placed.sort_unstable();
    placed.dedup();
    for index in placed {
        let Some(image) = staged.get(&index) else {
            continue;
        };
        let mut name = format!("catalogen_image{}.{}", state.next_media, image.media.ext);
        while package.has_part(&format!("ppt/media/{name}")) {
            state.next_media += 1;
            name = format!("catalogen_image{}.{}", state.next_media, image.media.ext);
        }
        state.next_media += 1;
        state.images_placed += 1;
        package.set_part(&format!("ppt/media/{name}"), image.media.data.clone());
        rels.insert(Relationship {
            id: image.picture.rel_id.clone(),
            rel_type: REL_IMAGE.to_string(),
            target: format!("../media/{name}"),
            target_mode: None,
        });
        state
            .media_types
            .insert(image.media.ext.clone(), image.media.content_type);
    }

    package.set_part(part, outcome.xml.into_bytes());
    package.set_part(&rels_part_for(part), rels.to_xml().into_bytes());
    debug!(part, slide = position, products = slots.len(), "rendered product page");
    Ok(())
}

/// Substitute deck-wide placeholders on a slide that is not a product page.
/// Slides without tokens are left byte-for-byte untouched.
fn render_other_slide(
    package: &mut PptxPackage,
    part: &str,
    position: usize,
    ctx: &RenderContext<'_>,
    state: &mut RenderState,
) -> Result<(), CatalogError> {
    let xml = package.part_text(part)?;
    if slide_placeholders(&xml)?.is_empty() {
        return Ok(());
    }
    let staged = BTreeMap::new();
    let mut resolver = SlideResolver {
        ctx,
        slots: None,
        pictures: &staged,
        slide: position,
        state: &mut *state,
    };
    let outcome = rewrite_slide(&xml, &mut resolver)?;
    package.set_part(part, outcome.xml.into_bytes());
    Ok(())
}

struct SlideResolver<'a, 'c> {
    ctx: &'a RenderContext<'c>,
    /// Products of this page; `None` on slides that are not product pages.
    slots: Option<&'a [CatalogEntry]>,
    pictures: &'a BTreeMap<usize, StagedImage>,
    /// 1-based position of the slide in the output deck.
    slide: usize,
    state: &'a mut RenderState,
}

impl TokenResolver for SlideResolver<'_, '_> {
    fn text(&mut self, placeholder: &Placeholder) -> String {
        let options = self.ctx.options;
        match &placeholder.kind {
            PlaceholderKind::Global(name) => match options
                .aliases
                .get(name)
                .map(String::as_str)
                .unwrap_or(name.as_str())
            {
                "supplier_name" => self.ctx.supplier_name.to_string(),
                "supplier_code" => self.ctx.supplier_code.to_string(),
                _ => {
                    self.state.unknown_placeholder(self.slide, placeholder);
                    String::new()
                }
            },
            PlaceholderKind::Indexed { field, index } => {
                let Some(slots) = self.slots else {
                    self.state.unknown_placeholder(self.slide, placeholder);
                    return String::new();
                };
                let entry = slots.get(index - 1);
                if *field == options.image_field {
                    return match entry {
                        Some(_) => options.no_image_text.clone(),
                        None => String::new(),
                    };
                }
                let Some(column) = fields::resolve_column(field, self.ctx.columns, &options.aliases)
                else {
                    self.state.unknown_placeholder(self.slide, placeholder);
                    return String::new();
                };
                match entry {
                    Some(entry) => fields::format_field(entry.row.get(column), field, options),
                    None => String::new(),
                }
            }
        }
    }

    fn picture(&mut self, placeholder: &Placeholder) -> Option<PictureRef> {
        self.slots?;
        match &placeholder.kind {
            PlaceholderKind::Indexed { field, index } if *field == self.ctx.options.image_field => {
                self.pictures.get(index).map(|s| s.picture.clone())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::rc::Rc;

    use zip::ZipWriter;
    use zip::write::FileOptions;

    use super::*;
    use crate::sheet::FieldValue;

    fn slide_xml(texts: &[&str]) -> String {
        let shapes: String = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="T"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>{t}</a:t></a:r></a:p></p:txBody></p:sp>"#,
                    i + 2
                )
            })
            .collect();
        format!(
            r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree>{shapes}</p:spTree></p:cSld></p:sld>"#
        )
    }

    fn package(slides: &[String]) -> PptxPackage {
        let mut ids = String::new();
        let mut rels = String::new();
        let mut parts = Vec::new();
        for (i, xml) in slides.iter().enumerate() {
            let n = i + 1;
            ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{n}"/>"#, 255 + n));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="{REL}" Target="slides/slide{n}.xml"/>"#,
                REL = crate::pptx::rels::REL_SLIDE
            ));
            parts.push((format!("ppt/slides/slide{n}.xml"), xml.clone()));
        }
        parts.insert(0, (CONTENT_TYPES_PART.to_string(), "<Types/>".to_string()));
        parts.insert(
            1,
            (
                "ppt/presentation.xml".to_string(),
                format!(
                    r#"<p:presentation xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldIdLst>{ids}</p:sldIdLst></p:presentation>"#
                ),
            ),
        );
        parts.insert(
            2,
            (
                "ppt/_rels/presentation.xml.rels".to_string(),
                format!("<Relationships>{rels}</Relationships>"),
            ),
        );

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in &parts {
            zip.start_file(name.as_str(), FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        PptxPackage::from_bytes(&zip.finish().unwrap().into_inner()).unwrap()
    }

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            row: ProductRow::new(
                2,
                vec![(Rc::from("product_name"), FieldValue::Text(name.to_string()))],
            ),
            images: ImageSet::default(),
        }
    }

    fn render(
        package: PptxPackage,
        entries: &[CatalogEntry],
        options: &CatalogOptions,
    ) -> Result<RenderedCatalog, CatalogError> {
        let code = SupplierCode::new("HAK").unwrap();
        let columns = vec!["product_name".to_string()];
        let ctx = RenderContext {
            options,
            supplier_code: &code,
            supplier_name: "Hakata Foods",
            columns: &columns,
        };
        render_catalog(package, entries, &ctx)
    }

    #[test]
    fn test_product_slide_is_first_with_indexed_tokens() {
        let pkg = package(&[
            slide_xml(&["{{supplier_name}}"]),
            slide_xml(&["{{product_name_1}}", "{{product_name_3}}"]),
        ]);
        let slides = slide_list(&pkg).unwrap();
        assert_eq!(select_product_slide(&pkg, &slides, None).unwrap(), (1, 3));
    }

    #[test]
    fn test_requested_slide_out_of_range() {
        let pkg = package(&[slide_xml(&["{{product_name_1}}"])]);
        let slides = slide_list(&pkg).unwrap();
        let err = select_product_slide(&pkg, &slides, Some(2)).unwrap_err();
        assert!(matches!(err, CatalogError::Template(msg) if msg.contains("out of range")));
    }

    #[test]
    fn test_requested_slide_without_slots() {
        let pkg = package(&[slide_xml(&["Cover"]), slide_xml(&["{{product_name_1}}"])]);
        let slides = slide_list(&pkg).unwrap();
        assert!(select_product_slide(&pkg, &slides, Some(1)).is_err());
    }

    #[test]
    fn test_render_batches_onto_clones() {
        let pkg = package(&[slide_xml(&["{{product_name_1}}", "{{product_name_2}}"])]);
        let entries = [entry("A"), entry("B"), entry("C")];
        let rendered = render(pkg, &entries, &CatalogOptions::default()).unwrap();
        assert_eq!(rendered.product_slides, 2);

        let slides = slide_list(&rendered.package).unwrap();
        let texts: Vec<String> = slides
            .iter()
            .map(|s| rendered.package.part_text(&s.part).unwrap())
            .collect();
        assert!(texts[0].contains("<a:t>A</a:t>") && texts[0].contains("<a:t>B</a:t>"));
        assert!(texts[1].contains("<a:t>C</a:t>"));
        assert!(!texts[1].contains("{{"));
        assert!(rendered.warnings.is_empty());
    }

    #[test]
    fn test_render_is_deterministic() {
        let slides = [slide_xml(&["{{product_name_1}}"]), slide_xml(&["{{supplier_name}}"])];
        let entries = [entry("A"), entry("B")];
        let first = render(package(&slides), &entries, &CatalogOptions::default()).unwrap();
        let second = render(package(&slides), &entries, &CatalogOptions::default()).unwrap();
        assert_eq!(
            first.package.to_bytes().unwrap(),
            second.package.to_bytes().unwrap()
        );
    }

    #[test]
    fn test_global_alias_resolves_supplier_name() {
        let pkg = package(&[
            slide_xml(&["{{仕入先名}}"]),
            slide_xml(&["{{商品名_1}}"]),
        ]);
        let mut options = CatalogOptions::default();
        options
            .aliases
            .insert("仕入先名".to_string(), "supplier_name".to_string());
        options
            .aliases
            .insert("商品名".to_string(), "product_name".to_string());
        let rendered = render(pkg, &[entry("Ponzu")], &options).unwrap();
        assert!(rendered.warnings.is_empty(), "{:?}", rendered.warnings);

        let slides = slide_list(&rendered.package).unwrap();
        let cover = rendered.package.part_text(&slides[0].part).unwrap();
        let page = rendered.package.part_text(&slides[1].part).unwrap();
        assert!(cover.contains("<a:t>Hakata Foods</a:t>"), "{cover}");
        assert!(page.contains("<a:t>Ponzu</a:t>"), "{page}");
    }

    #[test]
    fn test_unknown_global_on_other_slide_is_reported() {
        let pkg = package(&[
            slide_xml(&["{{campaign}}"]),
            slide_xml(&["{{product_name_1}}"]),
        ]);
        let rendered = render(pkg, &[entry("A")], &CatalogOptions::default()).unwrap();
        assert_eq!(
            rendered.warnings,
            vec![CatalogWarning::UnknownPlaceholder {
                slide: 1,
                token: "{{campaign}}".to_string()
            }]
        );
    }
}
