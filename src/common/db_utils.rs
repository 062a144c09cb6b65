// src/common/db_utils.rs

use crate::common::error::AppError;

/// Converte violação de unicidade em erro de conflito; o resto vira DatabaseError.
pub(crate) fn map_unique_violation(e: sqlx::Error, conflict: impl FnOnce(&str) -> AppError) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            return conflict(constraint);
        }
    }
    e.into()
}

/// Monta o padrão do ILIKE a partir da busca do usuário (escapa os curingas).
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" ana "), "%ana%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
