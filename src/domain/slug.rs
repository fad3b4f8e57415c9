//! Deterministic slug derivation for article titles.
//!
//! Slugs are never edited by hand: they are recomputed from the title on every
//! create and on every title change. The `slug` crate transliterates through
//! `deunicode`, so accented Latin text loses its diacritics before
//! non-alphanumeric runs collapse into single hyphens.

use slug::slugify;
use thiserror::Error;

/// Errors that can occur while deriving a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_strips_diacritics_and_symbols() {
        let slug = derive_slug("Título com Acentuação & Símbolos!").expect("slug");
        assert_eq!(slug, "titulo-com-acentuacao-simbolos");
    }

    #[test]
    fn derive_slug_collapses_separator_runs() {
        let slug = derive_slug("  Marketing --- Digital   2025  ").expect("slug");
        assert_eq!(slug, "marketing-digital-2025");
    }

    #[test]
    fn derive_slug_rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn derive_slug_rejects_symbol_only_input() {
        let result = derive_slug("!!! ???").expect_err("no alphanumerics");
        assert!(matches!(result, SlugError::Unrepresentable { .. }));
    }
}
