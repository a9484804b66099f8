use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::CatalogError;

/// Column headers the pipeline needs to find in the product master.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub product_code: String,
    pub product_name: String,
    pub supplier_code: String,
    /// Optional; feeds the `{{supplier_name}}` placeholder when present.
    pub supplier_name: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            product_code: "product_code".to_string(),
            product_name: "product_name".to_string(),
            supplier_code: "supplier_code".to_string(),
            supplier_name: "supplier_name".to_string(),
        }
    }
}

impl ColumnNames {
    /// Columns that must exist in the header row.
    pub fn required(&self) -> [&str; 3] {
        [
            self.product_code.as_str(),
            self.product_name.as_str(),
            self.supplier_code.as_str(),
        ]
    }
}

/// Options controlling a catalog run.
///
/// Every key is optional in the JSON config file; missing keys take the
/// defaults below. CLI flags are applied on top.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogOptions {
    /// Worksheet to read (default: first sheet).
    pub sheet_name: Option<String>,
    /// 1-based row holding the column headers.
    pub header_row: u32,
    pub columns: ColumnNames,
    /// Placeholder field name → column header.
    pub aliases: BTreeMap<String, String>,
    /// Fields rendered as prices.
    pub price_fields: Vec<String>,
    pub currency_symbol: String,
    /// Text for an empty cell of an occupied slot.
    pub missing_value: String,
    /// Per-field override of `missing_value`.
    pub field_missing_values: BTreeMap<String, String>,
    /// Text appended to a formatted price, per price field.
    pub price_suffixes: BTreeMap<String, String>,
    /// Field name of image placeholders (`{{image_1}}`).
    pub image_field: String,
    /// Text left in an image frame when no image is available.
    pub no_image_text: String,
    /// 1-based product slide (default: first slide with indexed placeholders).
    pub template_slide: Option<usize>,
    /// Take the supplier code from the product id (`PRD_<brand>_<SUP>_<prod>`)
    /// instead of a supplier-code column, which then becomes optional.
    pub supplier_code_from_product_id: bool,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            sheet_name: None,
            header_row: 1,
            columns: ColumnNames::default(),
            aliases: BTreeMap::new(),
            price_fields: Vec::new(),
            currency_symbol: "¥".to_string(),
            missing_value: "-".to_string(),
            field_missing_values: BTreeMap::new(),
            price_suffixes: BTreeMap::new(),
            image_field: "image".to_string(),
            no_image_text: String::new(),
            template_slide: None,
            supplier_code_from_product_id: false,
        }
    }
}

impl CatalogOptions {
    /// Load options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
            .map_err(|e| CatalogError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse options from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub(crate) fn validate(&self) -> Result<(), CatalogError> {
        if self.header_row == 0 {
            return Err(CatalogError::Config(
                "header_row is 1-based and must be at least 1".to_string(),
            ));
        }
        if self.template_slide == Some(0) {
            return Err(CatalogError::Config(
                "template_slide is 1-based and must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Filesystem locations for one run.
#[derive(Debug, Clone)]
pub struct CatalogPaths {
    pub spreadsheet: std::path::PathBuf,
    pub template: std::path::PathBuf,
    pub images_dir: std::path::PathBuf,
    pub output_dir: std::path::PathBuf,
}

impl Default for CatalogPaths {
    fn default() -> Self {
        Self {
            spreadsheet: "products.xlsx".into(),
            template: "catalog_template.pptx".into(),
            images_dir: "images".into(),
            output_dir: "output".into(),
        }
    }
}
