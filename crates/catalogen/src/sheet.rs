//! Product master reader.
//!
//! Reads one worksheet of an XLSX workbook and yields its data rows as
//! [`ProductRow`] records keyed by the header row.

use std::io::Cursor;
use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use crate::config::CatalogOptions;
use crate::error::CatalogError;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Empty,
    Text(String),
    Number(f64),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Numeric view of the value, parsing text cells that hold a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().replace(',', "").parse().ok(),
            Self::Empty => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{n:.0}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// One data row of the product master, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    /// 1-based worksheet row number.
    pub row_number: u32,
    fields: Vec<(Rc<str>, FieldValue)>,
}

impl ProductRow {
    pub fn new(row_number: u32, fields: Vec<(Rc<str>, FieldValue)>) -> Self {
        Self { row_number, fields }
    }

    /// Value of the named column, if the column exists.
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name.as_ref() == column)
            .map(|(_, value)| value)
    }

    /// Text of the named column with surrounding whitespace removed.
    /// Missing columns and empty cells give an empty string.
    pub fn text(&self, column: &str) -> String {
        self.get(column)
            .map(|v| v.to_string().trim().to_string())
            .unwrap_or_default()
    }

    /// Column names and values in sheet order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_ref(), value))
    }
}

struct Column {
    name: Rc<str>,
    index: u32,
}

/// Lazy iterator over the data rows of a product master sheet.
///
/// The workbook is read fully into memory when opened, so no file handle
/// outlives [`ProductRows::open`]. Iteration cannot be restarted.
pub struct ProductRows {
    book: umya_spreadsheet::Spreadsheet,
    sheet_index: usize,
    columns: Vec<Column>,
    name_column: String,
    next_row: u32,
    last_row: u32,
}

impl std::fmt::Debug for ProductRows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductRows")
            .field("sheet_index", &self.sheet_index)
            .field("columns", &self.column_names())
            .field("next_row", &self.next_row)
            .field("last_row", &self.last_row)
            .finish()
    }
}

impl ProductRows {
    /// Open the product master at `path`.
    pub fn open(path: impl AsRef<Path>, options: &CatalogOptions) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            CatalogError::Input(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_bytes(&data, options)
    }

    /// Read a product master from raw XLSX bytes.
    pub fn from_bytes(data: &[u8], options: &CatalogOptions) -> Result<Self, CatalogError> {
        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(data), true)
            .map_err(|e| CatalogError::Input(format!("failed to parse XLSX: {e}")))?;

        let sheets = book.get_sheet_collection();
        let sheet_index = match &options.sheet_name {
            Some(name) => sheets
                .iter()
                .position(|s| s.get_name() == name.as_str())
                .ok_or_else(|| CatalogError::Input(format!("sheet {name:?} not found")))?,
            None if sheets.is_empty() => {
                return Err(CatalogError::Input("workbook has no sheets".to_string()));
            }
            None => 0,
        };
        let sheet = &sheets[sheet_index];

        let (max_col, max_row) = sheet.get_highest_column_and_row();
        let header_row = options.header_row;
        if max_row < header_row {
            return Err(CatalogError::Input(format!(
                "sheet {:?} has no header row {header_row}",
                sheet.get_name()
            )));
        }

        let columns: Vec<Column> = (1..=max_col)
            .filter_map(|col| {
                let name = sheet
                    .get_cell((col, header_row))
                    .map(|cell| cell.get_value().trim().to_string())
                    .unwrap_or_default();
                (!name.is_empty()).then(|| Column {
                    name: Rc::from(name),
                    index: col,
                })
            })
            .collect();

        check_required_columns(&columns, options)?;
        debug!(
            sheet = sheet.get_name(),
            columns = columns.len(),
            rows = max_row - header_row,
            "opened product master"
        );

        Ok(Self {
            sheet_index,
            columns,
            name_column: options.columns.product_name.clone(),
            next_row: header_row + 1,
            last_row: max_row,
            book,
        })
    }

    /// Header names in sheet order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_ref()).collect()
    }

    fn read_row(&self, row: u32) -> Option<ProductRow> {
        let sheet = self.book.get_sheet_collection().get(self.sheet_index)?;
        let fields: Vec<(Rc<str>, FieldValue)> = self
            .columns
            .iter()
            .map(|col| (col.name.clone(), field_value(sheet.get_cell((col.index, row)))))
            .collect();
        Some(ProductRow::new(row, fields))
    }
}

impl Iterator for ProductRows {
    type Item = ProductRow;

    fn next(&mut self) -> Option<ProductRow> {
        while self.next_row <= self.last_row {
            let row_number = self.next_row;
            self.next_row += 1;

            let row = self.read_row(row_number)?;
            if row.fields().all(|(_, v)| v.is_empty()) {
                continue;
            }
            if row.get(&self.name_column).is_none_or(FieldValue::is_empty) {
                debug!(row = row_number, "skipping row without product name");
                continue;
            }
            return Some(row);
        }
        None
    }
}

fn field_value(cell: Option<&umya_spreadsheet::Cell>) -> FieldValue {
    let Some(cell) = cell else {
        return FieldValue::Empty;
    };
    if let umya_spreadsheet::CellRawValue::Numeric(n) = cell.get_raw_value() {
        return FieldValue::Number(*n);
    }
    let value = cell.get_value();
    if value.trim().is_empty() {
        FieldValue::Empty
    } else {
        FieldValue::Text(value.to_string())
    }
}

fn check_required_columns(
    columns: &[Column],
    options: &CatalogOptions,
) -> Result<(), CatalogError> {
    let names = &options.columns;
    let missing: Vec<&str> = names
        .required()
        .into_iter()
        .filter(|required| {
            !(options.supplier_code_from_product_id && *required == names.supplier_code)
        })
        .filter(|required| !columns.iter().any(|c| c.name.as_ref() == *required))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::Input(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )))
    }
}
