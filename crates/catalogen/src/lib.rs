pub mod config;
pub mod error;
pub mod filter;
pub mod images;
pub mod output;
pub mod placeholder;
pub mod pptx;
pub mod render;
pub mod sheet;

use chrono::NaiveDate;
use tracing::{info, warn};

use config::{CatalogOptions, CatalogPaths};
use error::{CatalogError, CatalogResult, CatalogWarning};
use filter::{SupplierCode, SupplierSource};
use images::ImageLocator;
use pptx::PptxPackage;
use render::{CatalogEntry, RenderContext};
use sheet::ProductRows;

/// Generate the catalog deck of one supplier.
///
/// Reads the product master, keeps the supplier's rows, looks up their
/// images, renders the template and writes
/// `catalog_<supplier>_<YYYYMMDD>.pptx` into the output directory. Missing
/// images and unknown placeholders are reported in
/// [`CatalogResult::warnings`]; unreadable inputs abort the run.
pub fn generate_catalog(
    supplier: &SupplierCode,
    paths: &CatalogPaths,
    options: &CatalogOptions,
    date: NaiveDate,
) -> Result<CatalogResult, CatalogError> {
    options.validate()?;

    let rows = ProductRows::open(&paths.spreadsheet, options)?;
    let columns: Vec<String> = rows.column_names().into_iter().map(String::from).collect();
    let source = SupplierSource::from_options(options);
    let products: Vec<_> = filter::filter_by_supplier(rows, supplier, source).collect();
    info!(supplier = %supplier, products = products.len(), "filtered product master");

    let mut warnings = Vec::new();
    if products.is_empty() {
        let warning = CatalogWarning::NoMatchingProducts {
            supplier: supplier.to_string(),
        };
        warn!("{warning}");
        warnings.push(warning);
    }
    let supplier_name =
        filter::supplier_display_name(&products, supplier, &options.columns.supplier_name);

    let locator = ImageLocator::new(&paths.images_dir);
    let entries: Vec<CatalogEntry> = products
        .into_iter()
        .map(|row| {
            let code = row.text(&options.columns.product_code);
            let (images, found) = locator.locate(supplier, &code);
            warnings.extend(found);
            CatalogEntry { row, images }
        })
        .collect();

    let template = PptxPackage::open(&paths.template)?;
    let ctx = RenderContext {
        options,
        supplier_code: supplier,
        supplier_name: &supplier_name,
        columns: &columns,
    };
    let rendered = render::render_catalog(template, &entries, &ctx)?;
    warnings.extend(rendered.warnings);

    let output_path = output::write_catalog(&rendered.package, &paths.output_dir, supplier, date)?;
    info!(
        path = %output_path.display(),
        warnings = warnings.len(),
        "catalog written"
    );

    Ok(CatalogResult {
        output_path,
        products: entries.len(),
        product_slides: rendered.product_slides,
        warnings,
    })
}
