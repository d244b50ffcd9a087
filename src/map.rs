// src/map.rs
//! Сборка карты: последовательность фаз генерации
//!
//! Фазы идут строго по порядку, каждая читает результат предыдущих и пишет
//! в арену ячеек. Весь произвол — из одного корневого генератора, поэтому
//! одинаковые настройки дают побитово одинаковую карту.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use crate::biome::{Biome, assign_biomes};
use crate::climate::{RainShadowStats, apply_rain_shadow, assign_precipitation, assign_temperature};
use crate::config::{GenerationSettings, PointDistribution};
use crate::elevation::{assign_elevation, compute_flux, sea_threshold, smooth, update_land_flags};
use crate::erosion::erode;
use crate::error::GenerationError;
use crate::hydrology::{Lake, River, form_lakes, trace_rivers};
use crate::mesh::{Mesh, Point};
use crate::mesh::voronoi::build_mesh;
use crate::points::{jittered_grid, lloyd_relax, poisson_disk};
use crate::rng::MapRng;
use crate::spatial::SpatialIndex;

/// Готовая карта: сетка со всеми слоями, реки, озёра и индекс.
#[derive(Debug, Clone)]
pub struct MapData {
    pub mesh: Mesh,
    pub rivers: Vec<River>,
    pub lakes: Vec<Lake>,
    pub rain_shadow: RainShadowStats,
    /// Заполняется в конце генерации; до того запросы дают `InvalidState`
    spatial: Option<SpatialIndex>,
}

impl MapData {
    /// Пространственный индекс карты.
    ///
    /// # Errors
    /// `InvalidState`, если индекс ещё не построен — лучше отказ сразу,
    /// чем чтение устаревших данных.
    pub fn spatial_index(&self) -> Result<&SpatialIndex, GenerationError> {
        self.spatial
            .as_ref()
            .ok_or(GenerationError::InvalidState("spatial index not built"))
    }

    /// FNV-1a по битам высот — дешёвый отпечаток рельефа для проверки
    /// детерминизма между запусками.
    #[must_use]
    pub fn height_checksum(&self) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for cell in &self.mesh.cells {
            for byte in cell.height.to_bits().to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
        hash
    }

    /// Сводка по готовой карте.
    #[must_use]
    pub fn report(&self) -> MapReport {
        let cells = &self.mesh.cells;
        let land = cells.iter().filter(|c| c.is_land).count();
        let mut min_h = f32::INFINITY;
        let mut max_h = f32::NEG_INFINITY;
        let mut sum_h = 0.0_f64;
        let mut biomes: BTreeMap<Biome, usize> = BTreeMap::new();
        for cell in cells {
            min_h = min_h.min(cell.height);
            max_h = max_h.max(cell.height);
            sum_h += f64::from(cell.height);
            *biomes.entry(cell.biome).or_insert(0) += 1;
        }
        MapReport {
            cell_count: cells.len(),
            land_ratio: land as f32 / cells.len().max(1) as f32,
            min_height: min_h,
            max_height: max_h,
            mean_height: (sum_h / cells.len().max(1) as f64) as f32,
            river_count: self.rivers.len(),
            lake_count: self.lakes.len(),
            biomes,
            rain_shadow: self.rain_shadow.clone(),
            height_checksum: self.height_checksum(),
        }
    }
}

/// Отчёт о генерации для CLI и логов.
#[derive(Debug, Clone, Serialize)]
pub struct MapReport {
    pub cell_count: usize,
    pub land_ratio: f32,
    pub min_height: f32,
    pub max_height: f32,
    pub mean_height: f32,
    pub river_count: usize,
    pub lake_count: usize,
    pub biomes: BTreeMap<Biome, usize>,
    pub rain_shadow: RainShadowStats,
    pub height_checksum: u64,
}

/// Генерирует карту по настройкам.
///
/// # Errors
/// `InvalidSettings` до начала работы; `DegenerateGeometry`, если точки
/// не удалось привести к невырожденному виду.
pub fn generate(settings: &GenerationSettings) -> Result<MapData, GenerationError> {
    settings.validate()?;

    let mut rng = match &settings.string_seed {
        Some(s) => MapRng::from_string_seed(s),
        None => MapRng::from_seed(settings.seed),
    };
    info!(
        "generating map {}x{} with {} points",
        settings.width, settings.height, settings.point_count
    );

    let mut points = distribute_points(settings, &mut rng);
    if settings.enable_lloyd_relaxation && settings.lloyd_iterations > 0 {
        points = lloyd_relax(
            points,
            settings.width,
            settings.height,
            settings.lloyd_iterations,
            &mut rng,
        )?;
    }
    debug!("distributed {} points", points.len());

    let mut mesh = build_mesh(&points, settings.width, settings.height, &mut rng)?;
    debug!("mesh: {:?}", mesh.stats());

    assign_elevation(&mut mesh, settings);
    smooth(
        &mut mesh,
        settings.smoothing.strength,
        settings.smoothing.iterations,
        settings.smoothing.land_only,
    );

    assign_temperature(&mut mesh, settings, &rng);
    assign_precipitation(&mut mesh, &rng);
    let rain_shadow = apply_rain_shadow(&mut mesh, settings);
    debug!("rain shadow: {rain_shadow:?}");

    compute_flux(&mut mesh);
    erode(&mut mesh, settings.erosion);
    // Эрозия меняет высоты: флаги суши и потоки пересчитываются
    update_land_flags(&mut mesh, sea_threshold(settings));
    compute_flux(&mut mesh);

    let (rivers, pits) = trace_rivers(&mut mesh, &rng);
    let lakes = form_lakes(&mut mesh, &rivers, &pits);
    info!("traced {} rivers, formed {} lakes", rivers.len(), lakes.len());

    assign_biomes(&mut mesh);
    let spatial = SpatialIndex::build(&mesh);

    Ok(MapData {
        mesh,
        rivers,
        lakes,
        rain_shadow,
        spatial: Some(spatial),
    })
}

fn distribute_points(settings: &GenerationSettings, rng: &mut MapRng) -> Vec<Point> {
    match settings.distribution {
        PointDistribution::JitteredGrid => jittered_grid(
            settings.width,
            settings.height,
            settings.point_count,
            rng,
        ),
        PointDistribution::PoissonDisk => {
            // Радиус подбирается под целевую плотность; итоговое число точек
            // близко к запрошенному, но не точное — свойство метода
            let r = 0.8 * (settings.width * settings.height / settings.point_count as f32).sqrt();
            poisson_disk(settings.width, settings.height, r, rng)
        }
    }
}
