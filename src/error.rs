// src/error.rs
//! Классифицированные ошибки генерации
//!
//! Все сбои пайплайна попадают в один из трёх классов:
//! - `InvalidSettings` — отлавливается до запуска пайплайна, никогда посреди него;
//! - `DegenerateGeometry` — вырожденный набор точек, если исчерпаны повторные попытки;
//! - `InvalidState` — обращение к структуре до завершения её фазы (ошибка программиста).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Недопустимое значение параметра генерации.
    #[error("invalid setting `{field}`: {reason}")]
    InvalidSettings {
        field: &'static str,
        reason: String,
    },

    /// Дубликаты или почти совпадающие точки, не исправленные повторным джиттером.
    #[error("degenerate point set: mesh construction failed after {attempts} jitter attempts")]
    DegenerateGeometry { attempts: u32 },

    /// Запрос к структуре до завершения строящей её фазы.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

impl GenerationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            field,
            reason: reason.into(),
        }
    }
}
