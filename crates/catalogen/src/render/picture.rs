//! Product pictures: media preparation and `p:pic` markup.

use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;
use quick_xml::escape::escape;

use crate::pptx::content_types::image_content_type;

/// A shape box in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Geometry {
    /// Largest box with the aspect ratio of a `width` x `height` image that
    /// fits inside `self`, centred in it.
    pub fn fit(self, width: u32, height: u32) -> Self {
        if width == 0 || height == 0 || self.cx <= 0 || self.cy <= 0 {
            return self;
        }
        let (w, h) = (i64::from(width), i64::from(height));
        let (cx, cy) = if w * self.cy > self.cx * h {
            (self.cx, self.cx * h / w)
        } else {
            (self.cy * w / h, self.cy)
        };
        Self {
            x: self.x + (self.cx - cx) / 2,
            y: self.y + (self.cy - cy) / 2,
            cx,
            cy,
        }
    }
}

/// A picture ready to be referenced from a slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PictureRef {
    /// Relationship id of the image on the slide.
    pub rel_id: String,
    pub width: u32,
    pub height: u32,
    /// Alt text.
    pub descr: String,
}

/// Image bytes in a format PowerPoint embeds.
#[derive(Debug, Clone)]
pub(crate) struct MediaImage {
    pub data: Vec<u8>,
    /// Lower-case file extension of `data`.
    pub ext: String,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

impl MediaImage {
    /// Load a product image. WebP is re-encoded as PNG.
    pub fn load(path: &Path) -> Result<Self, String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let data = std::fs::read(path).map_err(|e| format!("cannot read image: {e}"))?;

        if ext == "webp" {
            let decoded = image::load_from_memory_with_format(&data, ImageFormat::WebP)
                .map_err(|e| format!("cannot decode WebP image: {e}"))?;
            let mut png = Cursor::new(Vec::new());
            decoded
                .write_to(&mut png, ImageFormat::Png)
                .map_err(|e| format!("cannot convert WebP image: {e}"))?;
            return Ok(Self {
                data: png.into_inner(),
                ext: "png".to_string(),
                content_type: "image/png",
                width: decoded.width(),
                height: decoded.height(),
            });
        }

        let content_type = image_content_type(&ext)
            .ok_or_else(|| format!("unsupported image type {ext:?}"))?;
        let (width, height) = image::ImageReader::new(Cursor::new(&data))
            .with_guessed_format()
            .map_err(|e| format!("cannot read image: {e}"))?
            .into_dimensions()
            .map_err(|e| format!("cannot read image size: {e}"))?;
        Ok(Self {
            data,
            ext: if ext == "jpeg" { "jpg".to_string() } else { ext },
            content_type,
            width,
            height,
        })
    }
}

/// `p:pic` markup for `picture` in `frame`, reusing the id and name of the
/// shape it replaces.
pub(crate) fn picture_xml(id: u32, name: &str, picture: &PictureRef, frame: Geometry) -> String {
    format!(
        concat!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{name}" descr="{descr}"/>"#,
            r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
            r#"<p:blipFill><a:blip xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" r:embed="{rel}"/>"#,
            r#"<a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
            r#"<p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
        ),
        id = id,
        name = escape(name),
        descr = escape(picture.descr.as_str()),
        rel = escape(picture.rel_id.as_str()),
        x = frame.x,
        y = frame.y,
        cx = frame.cx,
        cy = frame.cy,
    )
}
