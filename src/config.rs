// src/config.rs
//! Конфигурация генерации рельефа и гидрологии
//!
//! Этот модуль определяет все параметры детерминированного пайплайна:
//! - Размеры карты и сид (числовой или строковый)
//! - Стратегия распределения точек и релаксация Ллойда
//! - Сглаживание и политика эрозии
//! - Климатические настройки (ветер, широтный градиент, доля суши)
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для удобной настройки
//! через конфигурационные файлы. `validate()` отсекает недопустимые значения
//! до запуска пайплайна — посреди генерации ошибок конфигурации не бывает.

use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::GenerationError;

/// Стратегия начального распределения точек
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PointDistribution {
    /// Регулярная сетка со случайным смещением в каждой ячейке
    #[default]
    JitteredGrid,
    /// Poisson-disk: точки попарно не ближе минимальной дистанции
    PoissonDisk,
}

/// Политика эрозии (выбирается конфигурацией, не иерархией типов)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ErosionPolicy {
    /// Без эрозии
    #[default]
    None,
    /// Врезание русла: ячейки с большим речным потоком теряют до 5 единиц высоты
    Simple,
    /// Стабильность по соседям: ячейка с ≥3 строго более высокими соседями не трогается
    NeighborStability {
        /// Снимаемая за итерацию высота
        amount: f32,
        /// Количество итераций (1–20)
        iterations: u32,
    },
}

/// Направление господствующего ветра для эффекта дождевой тени
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WindDirection {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    #[default]
    West,
    NorthWest,
}

impl WindDirection {
    /// Единичный вектор направления, куда дует ветер.
    #[must_use]
    pub fn vector(self) -> (f32, f32) {
        const DIAG: f32 = std::f32::consts::FRAC_1_SQRT_2;
        match self {
            WindDirection::North => (0.0, -1.0),
            WindDirection::NorthEast => (DIAG, -DIAG),
            WindDirection::East => (1.0, 0.0),
            WindDirection::SouthEast => (DIAG, DIAG),
            WindDirection::South => (0.0, 1.0),
            WindDirection::SouthWest => (-DIAG, DIAG),
            WindDirection::West => (-1.0, 0.0),
            WindDirection::NorthWest => (-DIAG, -DIAG),
        }
    }
}

/// Климатические настройки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateSettings {
    /// Глобальный сдвиг температуры (-1.0 = очень холодно, +1.0 = очень жарко)
    #[serde(default = "default_temperature_offset")]
    pub global_temperature_offset: f32,

    /// Экспонента широтного градиента:
    /// - `<1.0` → сжимает полюсы (больше умеренных зон),
    /// - `=1.0` → линейно,
    /// - `>1.0` → расширяет полюсы.
    #[serde(default = "default_latitude_exponent")]
    pub latitude_exponent: f32,

    /// Направление господствующего ветра
    #[serde(default)]
    pub wind: WindDirection,

    /// Порог высоты, выше которого ячейка считается горным барьером
    #[serde(default = "default_mountain_threshold")]
    pub mountain_threshold: f32,
}

fn default_temperature_offset() -> f32 {
    0.0
}
fn default_latitude_exponent() -> f32 {
    0.65
}
fn default_mountain_threshold() -> f32 {
    70.0
}

impl Default for ClimateSettings {
    fn default() -> Self {
        Self {
            global_temperature_offset: 0.0,
            latitude_exponent: 0.65,
            wind: WindDirection::West,
            mountain_threshold: 70.0,
        }
    }
}

/// Настройки сглаживания рельефа
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingSettings {
    /// Количество проходов (0 = без сглаживания)
    #[serde(default = "default_smoothing_iterations")]
    pub iterations: u32,

    /// Сила смешивания s ∈ [0,1]: new = old*(1-s) + mean(соседи)*s
    #[serde(default = "default_smoothing_strength")]
    pub strength: f32,

    /// Сглаживать только сушу (океанские соседи не участвуют в среднем)
    #[serde(default)]
    pub land_only: bool,
}

fn default_smoothing_iterations() -> u32 {
    2
}
fn default_smoothing_strength() -> f32 {
    0.5
}

impl Default for SmoothingSettings {
    fn default() -> Self {
        Self {
            iterations: 2,
            strength: 0.5,
            land_only: false,
        }
    }
}

/// Основные параметры генерации
///
/// Полная конфигурация одного запуска. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Сид генератора случайных чисел (детерминированная генерация)
    pub seed: u64,

    /// Строковый сид: если задан, используется legacy-генератор Alea вместо PCG
    #[serde(default)]
    pub string_seed: Option<String>,

    /// Ширина карты в условных единицах (по умолчанию 800)
    #[serde(default = "default_width")]
    pub width: f32,

    /// Высота карты в условных единицах (по умолчанию 600)
    #[serde(default = "default_height")]
    pub height: f32,

    /// Количество ячеек рельефа (минимум 3)
    #[serde(default = "default_point_count")]
    pub point_count: usize,

    /// Уровень моря в долях диапазона высот [0,1]
    #[serde(default = "default_sea_level")]
    pub sea_level: f32,

    /// Целевая доля суши [0,1]
    #[serde(default = "default_land_ratio")]
    pub target_land_ratio: f32,

    /// Стратегия распределения точек
    #[serde(default)]
    pub distribution: PointDistribution,

    /// Включить релаксацию Ллойда
    #[serde(default = "default_true")]
    pub enable_lloyd_relaxation: bool,

    /// Количество итераций релаксации (обычно 1–3)
    #[serde(default = "default_lloyd_iterations")]
    pub lloyd_iterations: u32,

    /// Степень нелинейности высоты:
    /// - `<1.0` → сглаживает рельеф (меньше гор, больше равнин),
    /// - `>1.0` → усиливает рельеф (более резкие горы и долины).
    #[serde(default = "default_elevation_power")]
    pub elevation_power: f32,

    /// Политика эрозии
    #[serde(default)]
    pub erosion: ErosionPolicy,

    /// Настройки сглаживания
    #[serde(default)]
    pub smoothing: SmoothingSettings,

    /// Климатические настройки
    #[serde(default)]
    pub climate: ClimateSettings,
}

fn default_width() -> f32 {
    800.0
}
fn default_height() -> f32 {
    600.0
}
fn default_point_count() -> usize {
    1000
}
fn default_sea_level() -> f32 {
    0.2
}
fn default_land_ratio() -> f32 {
    0.35
}
fn default_true() -> bool {
    true
}
fn default_lloyd_iterations() -> u32 {
    2
}
fn default_elevation_power() -> f32 {
    0.8
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            string_seed: None,
            width: 800.0,
            height: 600.0,
            point_count: 1000,
            sea_level: 0.2,
            target_land_ratio: 0.35,
            distribution: PointDistribution::JitteredGrid,
            enable_lloyd_relaxation: true,
            lloyd_iterations: 2,
            elevation_power: 0.8,
            erosion: ErosionPolicy::Simple,
            smoothing: SmoothingSettings::default(),
            climate: ClimateSettings::default(),
        }
    }
}

impl GenerationSettings {
    /// Загружает параметры из TOML-файла
    ///
    /// # Ошибки
    /// Возвращает ошибку, если файл не найден или содержит недопустимый формат.
    ///
    /// # Пример
    /// ```toml
    /// # world.toml
    /// seed = 42
    /// width = 800.0
    /// height = 600.0
    /// point_count = 1000
    /// ```
    pub fn from_toml_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let params: Self = toml::from_str(&contents)?;
        Ok(params)
    }

    /// Проверяет все параметры до запуска пайплайна.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if !(self.width > 0.0) {
            return Err(GenerationError::invalid(
                "width",
                format!("must be positive, got {}", self.width),
            ));
        }
        if !(self.height > 0.0) {
            return Err(GenerationError::invalid(
                "height",
                format!("must be positive, got {}", self.height),
            ));
        }
        if self.point_count < 3 {
            return Err(GenerationError::invalid(
                "point_count",
                format!("must be at least 3, got {}", self.point_count),
            ));
        }
        if !(0.0..=1.0).contains(&self.sea_level) {
            return Err(GenerationError::invalid(
                "sea_level",
                format!("must be within [0,1], got {}", self.sea_level),
            ));
        }
        if !(0.0..=1.0).contains(&self.target_land_ratio) {
            return Err(GenerationError::invalid(
                "target_land_ratio",
                format!("must be within [0,1], got {}", self.target_land_ratio),
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing.strength) {
            return Err(GenerationError::invalid(
                "smoothing.strength",
                format!("must be within [0,1], got {}", self.smoothing.strength),
            ));
        }
        if let ErosionPolicy::NeighborStability { amount, iterations } = self.erosion {
            if !(0.0..=100.0).contains(&amount) {
                return Err(GenerationError::invalid(
                    "erosion.amount",
                    format!("must be within [0,100], got {amount}"),
                ));
            }
            if !(1..=20).contains(&iterations) {
                return Err(GenerationError::invalid(
                    "erosion.iterations",
                    format!("must be within 1..=20, got {iterations}"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(GenerationSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_width() {
        let settings = GenerationSettings {
            width: 0.0,
            ..GenerationSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(GenerationError::InvalidSettings { field: "width", .. })
        ));
    }

    #[test]
    fn rejects_tiny_point_count() {
        let settings = GenerationSettings {
            point_count: 2,
            ..GenerationSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_sea_level_out_of_range() {
        let settings = GenerationSettings {
            sea_level: 1.5,
            ..GenerationSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_erosion_iterations_out_of_range() {
        let settings = GenerationSettings {
            erosion: ErosionPolicy::NeighborStability {
                amount: 1.0,
                iterations: 25,
            },
            ..GenerationSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn parses_minimal_toml() {
        let params: GenerationSettings = toml::from_str("seed = 42").unwrap();
        assert_eq!(params.seed, 42);
        assert_eq!(params.point_count, 1000);
        assert!(params.enable_lloyd_relaxation);
    }

    #[test]
    fn parses_erosion_variant_from_toml() {
        let toml_src = r#"
            seed = 7
            [erosion.NeighborStability]
            amount = 2.0
            iterations = 5
        "#;
        let params: GenerationSettings = toml::from_str(toml_src).unwrap();
        assert!(matches!(
            params.erosion,
            ErosionPolicy::NeighborStability { iterations: 5, .. }
        ));
    }
}
