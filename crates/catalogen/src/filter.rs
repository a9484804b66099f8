use crate::config::CatalogOptions;
use crate::error::CatalogError;
use crate::sheet::ProductRow;

/// Short vendor code partitioning products and image directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SupplierCode(String);

impl SupplierCode {
    /// Validate a supplier code. The code doubles as a directory name, so it
    /// must be non-empty and free of path separators.
    pub fn new(code: impl Into<String>) -> Result<Self, CatalogError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty()
            || trimmed != code
            || code.contains(['/', '\\'])
            || code == "."
            || code == ".."
        {
            return Err(CatalogError::InvalidSupplierCode(code));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SupplierCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SupplierCode {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Where the supplier code of a row is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierSource<'a> {
    /// A supplier-code column, compared verbatim.
    Column(&'a str),
    /// The third `_` segment of a `PRD_<brand>_<supplier>_<product>` id
    /// held in this product-code column.
    ProductId(&'a str),
}

impl<'a> SupplierSource<'a> {
    pub fn from_options(options: &'a CatalogOptions) -> Self {
        if options.supplier_code_from_product_id {
            Self::ProductId(&options.columns.product_code)
        } else {
            Self::Column(&options.columns.supplier_code)
        }
    }

    fn matches(&self, row: &ProductRow, supplier: &SupplierCode) -> bool {
        match *self {
            Self::Column(column) => row
                .get(column)
                .is_some_and(|value| value.to_string() == supplier.as_str()),
            Self::ProductId(column) => {
                supplier_from_product_id(&row.text(column)) == Some(supplier.as_str())
            }
        }
    }
}

/// Supplier segment of a product id: `PRD_MAR_HAK_0001` gives `HAK`.
pub fn supplier_from_product_id(id: &str) -> Option<&str> {
    id.split('_').nth(2).filter(|code| !code.is_empty())
}

/// Keep only rows whose supplier code equals `supplier` exactly
/// (case-sensitive, no trimming).
pub fn filter_by_supplier<'a, I>(
    rows: I,
    supplier: &'a SupplierCode,
    source: SupplierSource<'a>,
) -> impl Iterator<Item = ProductRow> + 'a
where
    I: IntoIterator<Item = ProductRow>,
    I::IntoIter: 'a,
{
    rows.into_iter()
        .filter(move |row| source.matches(row, supplier))
}

/// Display name for the catalog: the supplier-name cell of the first
/// matched row, or the supplier code when that is empty or absent.
pub fn supplier_display_name(
    rows: &[ProductRow],
    supplier: &SupplierCode,
    name_column: &str,
) -> String {
    rows.first()
        .map(|row| row.text(name_column))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| supplier.to_string())
}
