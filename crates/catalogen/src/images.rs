//! Product image lookup.
//!
//! Images live in `<root>/<supplier>/` and are named
//! `PRD_<brand>_<supplier>_<product>_<NN>.<ext>`. The name is the only link
//! between a spreadsheet row and its pictures, so it is matched strictly:
//! anything that looks like it belongs to a product but does not follow the
//! pattern is reported, never guessed at.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::CatalogWarning;
use crate::filter::SupplierCode;

/// Extensions accepted as product images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Images of one product, ordered by their sequence number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet(Vec<PathBuf>);

impl ImageSet {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self(paths)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The image placed into the product's frame.
    pub fn first(&self) -> Option<&Path> {
        self.0.first().map(PathBuf::as_path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }
}

/// Finds product images under a root directory.
#[derive(Debug, Clone)]
pub struct ImageLocator {
    root: PathBuf,
}

struct Candidate {
    seq: u32,
    name: String,
    path: PathBuf,
}

impl ImageLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the images of `supplier`.
    pub fn supplier_dir(&self, supplier: &SupplierCode) -> PathBuf {
        self.root.join(supplier.as_str())
    }

    /// Locate the images of `product_code`.
    ///
    /// A missing directory or no matching file gives an empty [`ImageSet`]
    /// and a warning; lookup never fails.
    pub fn locate(
        &self,
        supplier: &SupplierCode,
        product_code: &str,
    ) -> (ImageSet, Vec<CatalogWarning>) {
        let mut warnings = Vec::new();
        let dir = self.supplier_dir(supplier);
        let product = product_segment(supplier, product_code.trim());

        if product.is_empty() {
            push_warning(
                &mut warnings,
                CatalogWarning::ImageLookup {
                    product: product_code.to_string(),
                    reason: "empty product code, images not looked up".to_string(),
                },
            );
            return (ImageSet::default(), warnings);
        }

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                push_warning(
                    &mut warnings,
                    CatalogWarning::ImageLookup {
                        product: product_code.to_string(),
                        reason: format!("cannot list {}: {e}", dir.display()),
                    },
                );
                return (ImageSet::default(), warnings);
            }
        };

        let key = format!("{}_{}", supplier.as_str(), product);
        let marker = format!("_{}_{}_", supplier.as_str(), product);

        let mut candidates: Vec<Candidate> = Vec::new();
        for entry in entries.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.starts_with("PRD_") || !name.contains(&marker) {
                continue;
            }
            match classify(&key, &name) {
                Ok(seq) => candidates.push(Candidate { seq, name, path }),
                Err(reason) => push_warning(
                    &mut warnings,
                    CatalogWarning::AmbiguousImage { path, reason },
                ),
            }
        }

        candidates.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.name.cmp(&b.name)));
        for pair in candidates.windows(2) {
            if pair[0].seq == pair[1].seq {
                push_warning(
                    &mut warnings,
                    CatalogWarning::AmbiguousImage {
                        path: pair[1].path.clone(),
                        reason: format!(
                            "sequence {:02} also used by {}",
                            pair[1].seq, pair[0].name
                        ),
                    },
                );
            }
        }

        if candidates.is_empty() {
            push_warning(
                &mut warnings,
                CatalogWarning::ImageLookup {
                    product: product_code.to_string(),
                    reason: format!(
                        "no image PRD_*_{}_{}_NN.* in {}",
                        supplier.as_str(),
                        product,
                        dir.display()
                    ),
                },
            );
        } else {
            debug!(product = product_code, images = candidates.len(), "located images");
        }

        let paths = candidates.into_iter().map(|c| c.path).collect();
        (ImageSet::new(paths), warnings)
    }
}

fn push_warning(warnings: &mut Vec<CatalogWarning>, warning: CatalogWarning) {
    warn!("{warning}");
    warnings.push(warning);
}

/// Product part of the image name. A full `PRD_<brand>_<supplier>_<product>`
/// id is reduced to its trailing product segment.
fn product_segment<'a>(supplier: &SupplierCode, product_code: &'a str) -> &'a str {
    let Some(rest) = product_code.strip_prefix("PRD_") else {
        return product_code;
    };
    let Some((brand, tail)) = rest.split_once('_') else {
        return product_code;
    };
    if brand.is_empty() {
        return product_code;
    }
    match tail.strip_prefix(supplier.as_str()).and_then(|t| t.strip_prefix('_')) {
        Some(product) if !product.is_empty() => product,
        _ => product_code,
    }
}

/// `PRD_<brand>_<supplier>_<product>_<NN>.<ext>`; supplier and product are
/// compared as one `<supplier>_<product>` group.
static IMAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PRD_([^_]+)_(.+)_(\d+)\.([A-Za-z0-9]+)$").expect("valid image name pattern")
});

/// Sequence number of a strictly matching file name, or why it was rejected.
fn classify(key: &str, name: &str) -> Result<u32, String> {
    let caps = IMAGE_NAME
        .captures(name)
        .filter(|caps| &caps[2] == key)
        .ok_or_else(|| "does not match PRD_<brand>_<supplier>_<product>_<NN>.<ext>".to_string())?;
    let ext = caps[4].to_ascii_lowercase();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(format!("unsupported image extension .{ext}"));
    }
    caps[3]
        .parse::<u32>()
        .map_err(|_| format!("sequence number {} out of range", &caps[3]))
}
