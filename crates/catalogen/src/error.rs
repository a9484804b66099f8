use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a catalog run.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("input error: {0}")]
    Input(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("output error: {0}")]
    Output(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid supplier code: {0:?}")]
    InvalidSupplierCode(String),
}

impl CatalogError {
    /// Process exit code used by the CLI for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Input(_) => 2,
            Self::Template(_) => 3,
            Self::Output(_) => 4,
            Self::Config(_) | Self::InvalidSupplierCode(_) => 1,
        }
    }
}

/// A non-fatal condition noticed during a run. Processing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogWarning {
    /// The supplier filter matched no rows; the catalog is rendered empty.
    NoMatchingProducts { supplier: String },
    /// No image could be found for a product.
    ImageLookup { product: String, reason: String },
    /// A file looked like a product image but did not follow the naming
    /// convention strictly, or collided with another image.
    AmbiguousImage { path: PathBuf, reason: String },
    /// A placeholder token that names no known field; it was cleared.
    UnknownPlaceholder { slide: usize, token: String },
    /// An image exists but could not be placed into its frame.
    ImageNotPlaced { slot: String, reason: String },
}

impl std::fmt::Display for CatalogWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatchingProducts { supplier } => {
                write!(f, "no products found for supplier {supplier}")
            }
            Self::ImageLookup { product, reason } => {
                write!(f, "product {product}: {reason}")
            }
            Self::AmbiguousImage { path, reason } => {
                write!(f, "{}: {reason}", path.display())
            }
            Self::UnknownPlaceholder { slide, token } => {
                write!(f, "slide {slide}: unknown placeholder {token} cleared")
            }
            Self::ImageNotPlaced { slot, reason } => {
                write!(f, "{slot}: image not placed: {reason}")
            }
        }
    }
}

/// Result of a successful catalog run.
#[derive(Debug)]
pub struct CatalogResult {
    /// Where the rendered deck was written.
    pub output_path: PathBuf,
    /// Number of products rendered.
    pub products: usize,
    /// Number of product slides in the deck (template slide plus clones).
    pub product_slides: usize,
    /// Warnings collected during the run (non-fatal issues).
    pub warnings: Vec<CatalogWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display_no_matches() {
        let w = CatalogWarning::NoMatchingProducts {
            supplier: "HAK".to_string(),
        };
        assert_eq!(w.to_string(), "no products found for supplier HAK");
    }

    #[test]
    fn test_warning_display_unknown_placeholder() {
        let w = CatalogWarning::UnknownPlaceholder {
            slide: 2,
            token: "{{colour_1}}".to_string(),
        };
        assert_eq!(
            w.to_string(),
            "slide 2: unknown placeholder {{colour_1}} cleared"
        );
    }

    #[test]
    fn test_warning_display_ambiguous_image() {
        let w = CatalogWarning::AmbiguousImage {
            path: PathBuf::from("images/HAK/PRD_A_B_HAK_0001_01.jpg"),
            reason: "brand segment contains '_'".to_string(),
        };
        assert_eq!(
            w.to_string(),
            "images/HAK/PRD_A_B_HAK_0001_01.jpg: brand segment contains '_'"
        );
    }

    #[test]
    fn test_exit_codes_distinguish_stages() {
        assert_eq!(CatalogError::Input("x".into()).exit_code(), 2);
        assert_eq!(CatalogError::Template("x".into()).exit_code(), 3);
        assert_eq!(CatalogError::Output("x".into()).exit_code(), 4);
        assert_eq!(CatalogError::Config("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_error_display_prefixes_stage() {
        let err = CatalogError::Template("no product placeholder slots".to_string());
        assert_eq!(
            err.to_string(),
            "template error: no product placeholder slots"
        );
    }
}
