// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::common::i18n::{I18nStore, DEFAULT_LANGUAGE};

// Extrator de idioma (Accept-Language). Só aceita idiomas que temos traduzidos.
#[derive(Debug, Clone)]
pub struct Locale(pub String);

impl Default for Locale {
    fn default() -> Self {
        Locale(DEFAULT_LANGUAGE.to_string())
    }
}

impl Locale {
    pub fn from_header(value: Option<&str>) -> Self {
        let store = I18nStore::shared();

        value
            .map(accept_language::parse)
            .and_then(|tags| {
                tags.into_iter()
                    // "pt-BR" -> "pt"
                    .map(|tag| tag.split('-').next().unwrap_or(&tag).to_lowercase())
                    .find(|lang| store.supports(lang))
            })
            .map(Locale)
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());

        Ok(Locale::from_header(header_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_first_supported_language() {
        assert_eq!(Locale::from_header(Some("en-US,en;q=0.9")).0, "en");
        assert_eq!(Locale::from_header(Some("fr-FR, en;q=0.5")).0, "en");
        assert_eq!(Locale::from_header(Some("pt-BR")).0, "pt");
    }

    #[test]
    fn defaults_to_portuguese() {
        assert_eq!(Locale::from_header(None).0, "pt");
        assert_eq!(Locale::from_header(Some("de-DE")).0, "pt");
    }
}
