// src/hydrology/mod.rs
//! Гидрология: реки и озёра
//!
//! Реки трассируются наискорейшим спуском по графу соседей и по построению
//! никогда не поднимаются в гору. Замкнутые локальные минимумы становятся
//! зёрнами озёр; озёра классифицируются по наличию стока и балансу
//! испарение/приток.

pub mod lakes;
pub mod rivers;

pub use lakes::form_lakes;
pub use rivers::trace_rivers;

use serde::Serialize;

use crate::mesh::Point;

/// Река: цепочка ячеек от истока к устью.
#[derive(Debug, Clone, Serialize)]
pub struct River {
    pub id: u32,
    /// Ячейки от истока к устью; высоты не возрастают вдоль цепочки
    pub cell_ids: Vec<u32>,
    /// Ширина в устье, производная от накопленного потока
    pub width: f32,
    /// Косметическая извилистая линия; производна от `cell_ids`,
    /// но не авторитетна над ними и не влияет на логику потока
    pub meander_path: Vec<Point>,
}

/// Тип озера.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LakeKind {
    /// Есть сток в более низкую ячейку
    Open,
    /// Замкнутое пресное
    ClosedFreshwater,
    /// Замкнутое солёное: испарение покрывает приток
    ClosedSaline,
    /// Пересыхающее: слабый приток при сухом климате
    Seasonal,
}

/// Озеро: затопленный замкнутый бассейн.
#[derive(Debug, Clone, Serialize)]
pub struct Lake {
    pub id: u32,
    pub cell_ids: Vec<u32>,
    pub kind: LakeKind,
    /// Ячейка стока для открытых озёр; у замкнутых отсутствует
    pub outlet_cell_id: Option<u32>,
    /// Высота зеркала воды
    pub surface: f32,
}

impl Lake {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(
            self.kind,
            LakeKind::ClosedFreshwater | LakeKind::ClosedSaline | LakeKind::Seasonal
        )
    }
}
