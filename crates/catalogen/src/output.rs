//! Writing the rendered deck to the output directory.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::error::CatalogError;
use crate::filter::SupplierCode;
use crate::pptx::PptxPackage;

/// `catalog_<supplier>_<YYYYMMDD>.pptx`
pub fn output_file_name(supplier: &SupplierCode, date: NaiveDate) -> String {
    format!("catalog_{supplier}_{}.pptx", date.format("%Y%m%d"))
}

/// Candidate paths in `dir` for this catalog: the plain name, then `_2`,
/// `_3`, ...
fn candidate_paths(
    dir: &Path,
    supplier: &SupplierCode,
    date: NaiveDate,
) -> impl Iterator<Item = PathBuf> {
    let name = output_file_name(supplier, date);
    let stem = name.trim_end_matches(".pptx").to_string();
    std::iter::once(dir.join(&name))
        .chain((2u32..).map(move |n| dir.join(format!("{stem}_{n}.pptx"))))
}

/// Serialize `package` into `dir`, creating the directory if needed.
/// Existing files are never overwritten.
pub fn write_catalog(
    package: &PptxPackage,
    dir: impl AsRef<Path>,
    supplier: &SupplierCode,
    date: NaiveDate,
) -> Result<PathBuf, CatalogError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .map_err(|e| CatalogError::Output(format!("cannot create {}: {e}", dir.display())))?;

    let data = package.to_bytes()?;
    for path in candidate_paths(dir, supplier, date) {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(CatalogError::Output(format!(
                    "cannot write {}: {e}",
                    path.display()
                )));
            }
        };
        file.write_all(&data)
            .map_err(|e| CatalogError::Output(format!("cannot write {}: {e}", path.display())))?;
        debug!(path = %path.display(), bytes = data.len(), "wrote catalog");
        return Ok(path);
    }
    Err(CatalogError::Output(format!("no free file name in {}", dir.display())))
}
