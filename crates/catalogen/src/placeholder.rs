use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("valid placeholder pattern"));

/// What a `{{...}}` token refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// `{{<field>_<index>}}`: a field of the product in slot `index` (1-based).
    Indexed { field: String, index: usize },
    /// Any other name: a deck-wide value such as `{{supplier_name}}`.
    Global(String),
}

/// A placeholder token found in template text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    /// The token as written, braces included.
    pub token: String,
    pub kind: PlaceholderKind,
}

impl Placeholder {
    fn from_captures(caps: &Captures<'_>) -> Self {
        Self {
            token: caps[0].to_string(),
            kind: parse_name(&caps[1]),
        }
    }

    /// Slot index of an indexed placeholder.
    pub fn index(&self) -> Option<usize> {
        match self.kind {
            PlaceholderKind::Indexed { index, .. } => Some(index),
            PlaceholderKind::Global(_) => None,
        }
    }
}

/// Split a placeholder name. The last `_<digits>` group is the slot index,
/// so `unit_price_2` is field `unit_price` of slot 2.
fn parse_name(name: &str) -> PlaceholderKind {
    if let Some((field, digits)) = name.rsplit_once('_')
        && !field.is_empty()
        && !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && let Ok(index) = digits.parse::<usize>()
        && index > 0
    {
        return PlaceholderKind::Indexed {
            field: field.to_string(),
            index,
        };
    }
    PlaceholderKind::Global(name.to_string())
}

/// Whether `text` contains at least one placeholder token.
pub fn contains_placeholder(text: &str) -> bool {
    TOKEN.is_match(text)
}

/// All placeholder tokens in `text`, in order of appearance.
pub fn find_placeholders(text: &str) -> Vec<Placeholder> {
    TOKEN
        .captures_iter(text)
        .map(|caps| Placeholder::from_captures(&caps))
        .collect()
}

/// Replace every token in `text` with the string `resolve` returns for it.
pub fn replace_placeholders<'t>(
    text: &'t str,
    mut resolve: impl FnMut(&Placeholder) -> String,
) -> Cow<'t, str> {
    TOKEN.replace_all(text, |caps: &Captures<'_>| {
        resolve(&Placeholder::from_captures(caps))
    })
}
