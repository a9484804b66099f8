//! Shared fixtures for integration tests: a product master, a PPTX template
//! and product images, all generated into a temporary directory.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use catalogen::config::CatalogPaths;
use catalogen::pptx::PptxPackage;
use catalogen::pptx::presentation::slide_list;
use image::{ImageFormat, Rgb, RgbImage};
use zip::ZipWriter;
use zip::write::FileOptions;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

pub const MASTER_HEADER: [&str; 5] = [
    "product_code",
    "product_name",
    "supplier_code",
    "supplier_name",
    "price",
];

/// One row of the generated product master.
#[derive(Debug, Clone)]
pub struct Product {
    pub code: &'static str,
    pub name: &'static str,
    pub supplier: &'static str,
    pub supplier_name: &'static str,
    pub price: Option<f64>,
}

pub const fn product(
    code: &'static str,
    name: &'static str,
    supplier: &'static str,
    price: f64,
) -> Product {
    Product {
        code,
        name,
        supplier,
        supplier_name: "Hakata Foods",
        price: Some(price),
    }
}

/// Write an XLSX product master with a header row and one row per product.
pub fn write_master(path: &Path, products: &[Product]) {
    let mut book = umya_spreadsheet::new_file();
    {
        let sheet = book.get_sheet_mut(&0).unwrap();
        sheet.set_name("Master");
        for (col, header) in MASTER_HEADER.iter().enumerate() {
            sheet
                .get_cell_mut((col as u32 + 1, 1))
                .set_value_string(*header);
        }
        for (i, p) in products.iter().enumerate() {
            let row = i as u32 + 2;
            sheet.get_cell_mut((1, row)).set_value_string(p.code);
            sheet.get_cell_mut((2, row)).set_value_string(p.name);
            sheet.get_cell_mut((3, row)).set_value_string(p.supplier);
            sheet.get_cell_mut((4, row)).set_value_string(p.supplier_name);
            if let Some(price) = p.price {
                sheet.get_cell_mut((5, row)).set_value_number(price);
            }
        }
    }
    let file = std::fs::File::create(path).unwrap();
    umya_spreadsheet::writer::xlsx::write_writer(&book, file).unwrap();
}

/// Write an XLSX with the given header and text rows.
pub fn write_sheet(path: &Path, header: &[&str], rows: &[&[&str]]) {
    let mut book = umya_spreadsheet::new_file();
    {
        let sheet = book.get_sheet_mut(&0).unwrap();
        for (col, name) in header.iter().enumerate() {
            sheet.get_cell_mut((col as u32 + 1, 1)).set_value_string(*name);
        }
        for (i, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                sheet
                    .get_cell_mut((col as u32 + 1, i as u32 + 2))
                    .set_value_string(*value);
            }
        }
    }
    let file = std::fs::File::create(path).unwrap();
    umya_spreadsheet::writer::xlsx::write_writer(&book, file).unwrap();
}

/// A text box shape whose single paragraph is made of `runs`.
pub fn text_box(id: u32, runs: &[&str]) -> String {
    let mut xml = format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="TextBox {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="914400"/><a:ext cx="1828800" cy="914400"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p>"#,
        x = u64::from(id) * 100_000
    );
    for run in runs {
        let _ = write!(xml, r#"<a:r><a:rPr lang="ja-JP" sz="1200"/><a:t>{run}</a:t></a:r>"#);
    }
    xml.push_str("</a:p></p:txBody></p:sp>");
    xml
}

/// A one-cell table holding `text`.
pub fn table(id: u32, text: &str) -> String {
    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {id}"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm><a:off x="0" y="4000000"/><a:ext cx="3000000" cy="370840"/></p:xfrm><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblGrid><a:gridCol w="3000000"/></a:tblGrid><a:tr h="370840"><a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US"/><a:t>{text}</a:t></a:r></a:p></a:txBody><a:tcPr/></a:tc></a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#
    )
}

pub fn slide(shapes: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        shapes.concat()
    )
}

/// Product slide with two slots. The second name token is split over runs
/// the way PowerPoint does after editing.
pub fn product_slide() -> String {
    slide(&[
        text_box(2, &["{{product_name_1}}"]),
        text_box(3, &["{{product_", "name", "_2}}"]),
        text_box(4, &["Price: ", "{{price_1}}"]),
        text_box(5, &["Price: {{price_2}}"]),
        text_box(6, &["{{image_1}}"]),
        text_box(7, &["{{image_2}}"]),
        table(8, "{{product_code_1}} / {{product_code_2}}"),
    ])
}

pub fn title_slide() -> String {
    slide(&[text_box(2, &["{{supplier_name}} ", "({{supplier_code}})"])])
}

pub fn closing_slide() -> String {
    slide(&[text_box(2, &["Thank you"])])
}

/// Build a PPTX package from slide XML, in deck order. The slide at
/// `notes_on` (0-based) gets a notes relationship.
pub fn template_bytes(slides: &[String], notes_on: Option<usize>) -> Vec<u8> {
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>"#,
    );
    let mut sld_ids = String::new();
    let mut pres_rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>"#,
    );
    for i in 1..=slides.len() {
        let _ = write!(
            content_types,
            r#"<Override PartName="/ppt/slides/slide{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        );
        let _ = write!(
            sld_ids,
            r#"<p:sldId id="{}" r:id="rId{}"/>"#,
            255 + i,
            i + 1
        );
        let _ = write!(
            pres_rels,
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{i}.xml"/>"#,
            i + 1
        );
    }
    content_types.push_str("</Types>");
    pres_rels.push_str("</Relationships>");

    let presentation = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {NS} saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{sld_ids}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    );

    let mut parts: Vec<(String, String)> = vec![
        ("[Content_Types].xml".to_string(), content_types),
        (
            "_rels/.rels".to_string(),
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#
                .to_string(),
        ),
        ("ppt/presentation.xml".to_string(), presentation),
        ("ppt/_rels/presentation.xml.rels".to_string(), pres_rels),
    ];
    for (i, xml) in slides.iter().enumerate() {
        let n = i + 1;
        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#,
        );
        if notes_on == Some(i) {
            rels.push_str(r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide" Target="../notesSlides/notesSlide1.xml"/>"#);
        }
        rels.push_str("</Relationships>");
        parts.push((format!("ppt/slides/slide{n}.xml"), xml.clone()));
        parts.push((format!("ppt/slides/_rels/slide{n}.xml.rels"), rels));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in &parts {
        zip.start_file(name.as_str(), FileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Write a solid-colour image of `width` x `height`.
pub fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(width, height, Rgb([30, 120, 200]))
        .save_with_format(path, format)
        .unwrap();
}

/// A temporary working directory laid out like a real run.
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub paths: CatalogPaths,
}

impl Workspace {
    /// Master with `products` and the standard title/product/closing
    /// template (notes on the product slide).
    pub fn new(products: &[Product]) -> Self {
        let ws = Self::empty();
        write_master(&ws.paths.spreadsheet, products);
        ws.write_template(&[title_slide(), product_slide(), closing_slide()], Some(1));
        ws
    }

    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = CatalogPaths {
            spreadsheet: dir.path().join("products.xlsx"),
            template: dir.path().join("catalog_template.pptx"),
            images_dir: dir.path().join("images"),
            output_dir: dir.path().join("output"),
        };
        Self { dir, paths }
    }

    pub fn write_template(&self, slides: &[String], notes_on: Option<usize>) {
        std::fs::write(&self.paths.template, template_bytes(slides, notes_on)).unwrap();
    }

    /// Path of an image for `supplier`/`file_name` under the image root.
    pub fn image_path(&self, supplier: &str, file_name: &str) -> PathBuf {
        self.paths.images_dir.join(supplier).join(file_name)
    }
}

/// Slides of a written deck in order, as XML text.
pub fn deck_slides(path: &Path) -> Vec<String> {
    let package = PptxPackage::open(path).unwrap();
    slide_list(&package)
        .unwrap()
        .iter()
        .map(|s| package.part_text(&s.part).unwrap())
        .collect()
}

/// Concatenated `a:t` text of a slide.
pub fn visible_text(slide_xml: &str) -> String {
    let mut text = String::new();
    let mut rest = slide_xml;
    while let Some(start) = rest.find("<a:t>") {
        rest = &rest[start + 5..];
        let end = rest.find("</a:t>").unwrap();
        text.push_str(&rest[..end]);
        text.push('|');
        rest = &rest[end..];
    }
    text
}
