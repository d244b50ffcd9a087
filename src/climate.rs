// src/climate.rs
//! Климат: температура, осадки и дождевая тень
//!
//! Температура и базовые осадки считаются независимо для каждой ячейки, поэтому
//! проходы распараллеливаются. Каждая ячейка получает собственный дочерний
//! RNG-поток от стабильного смещения `(соль, id)` — результат побитово одинаков
//! при любом планировании и числе потоков.
//!
//! Дождевая тень — чистая функция сетки (без RNG): обход цепочки ячеек против
//! ветра до горного барьера. Подветренные ячейки теряют осадки, наветренные
//! получают больше. Статистика прохода всегда вычисляется.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;

use crate::config::GenerationSettings;
use crate::mesh::{Cell, Mesh, Point};
use crate::rng::{MapRng, Pcg32, RandExt};

/// Соли смещений дочерних потоков: температура и осадки не делят поток.
const TEMPERATURE_SALT: u64 = 1 << 40;
const PRECIPITATION_SALT: u64 = 2 << 40;

/// Максимальная длина обхода по/против ветра.
const WIND_WALK_STEPS: u32 = 10;
/// Доля потерь осадков в тени прямо за барьером.
const SHADOW_LOSS: f32 = 0.6;
/// Прибавка осадков на наветренном склоне прямо перед барьером.
const WINDWARD_GAIN: f32 = 0.4;

/// Назначает температуру [0,1]: широтный градиент с настраиваемой экспонентой,
/// шумовая составляющая и потеря с высотой.
pub fn assign_temperature(mesh: &mut Mesh, settings: &GenerationSettings, rng: &MapRng) {
    let map_height = mesh.height;
    let exponent = (2.5 * settings.climate.latitude_exponent).max(0.1);
    let offset = settings.climate.global_temperature_offset;

    let derive = |cell: &Cell| -> f32 {
        let mut child: Pcg32 = rng.child(TEMPERATURE_SALT | u64::from(cell.id));
        // Нелинейный градиент: сжимаем полюса, расширяем умеренную зону
        let lat_factor = (cell.center.y / map_height - 0.5).abs() * 2.0;
        let lat_temp = 1.0 - lat_factor.powf(exponent);
        let noise = child.next_float() as f32;
        // Температура падает с высотой
        let elevation_loss = cell.height / 100.0 * 0.4;
        (lat_temp * 0.8 + noise * 0.2 - elevation_loss + offset).clamp(0.0, 1.0)
    };

    #[cfg(feature = "parallel")]
    let temps: Vec<f32> = mesh.cells.par_iter().map(derive).collect();
    #[cfg(not(feature = "parallel"))]
    let temps: Vec<f32> = mesh.cells.iter().map(derive).collect();

    for (cell, t) in mesh.cells.iter_mut().zip(temps) {
        cell.temperature = t;
    }
}

/// Назначает базовые осадки [0,1]: влажная экваториальная полоса, сухие полюса,
/// шумовая составляющая. Океан всегда максимально «влажный».
pub fn assign_precipitation(mesh: &mut Mesh, rng: &MapRng) {
    let map_height = mesh.height;

    let derive = |cell: &Cell| -> f32 {
        if !cell.is_land {
            return 1.0;
        }
        let mut child: Pcg32 = rng.child(PRECIPITATION_SALT | u64::from(cell.id));
        let lat_factor = (cell.center.y / map_height - 0.5).abs() * 2.0;
        let band = 0.7 - 0.4 * lat_factor;
        let noise = child.next_float() as f32;
        (band + noise * 0.3).clamp(0.0, 1.0)
    };

    #[cfg(feature = "parallel")]
    let precip: Vec<f32> = mesh.cells.par_iter().map(derive).collect();
    #[cfg(not(feature = "parallel"))]
    let precip: Vec<f32> = mesh.cells.iter().map(derive).collect();

    for (cell, p) in mesh.cells.iter_mut().zip(precip) {
        cell.precipitation = p;
    }
}

/// Диагностика прохода дождевой тени.
#[derive(Debug, Clone, Serialize)]
pub struct RainShadowStats {
    /// Ячейки выше горного порога
    pub mountain_cells: usize,
    /// Подветренные ячейки с урезанными осадками
    pub shadowed_cells: usize,
    /// Наветренные ячейки с увеличенными осадками
    pub windward_cells: usize,
    /// Среднее изменение осадков по затронутым ячейкам (со знаком)
    pub mean_change: f32,
}

/// Применяет дождевую тень к осадкам. Двойной буфер: чтение из снимка,
/// запись в новый массив — порядок обхода не влияет на результат.
pub fn apply_rain_shadow(mesh: &mut Mesh, settings: &GenerationSettings) -> RainShadowStats {
    let wind = settings.climate.wind.vector();
    let threshold = settings.climate.mountain_threshold;
    let upwind = (-wind.0, -wind.1);
    let downwind = wind;

    let snapshot: Vec<f32> = mesh.cells.iter().map(|c| c.precipitation).collect();
    let mut output = snapshot.clone();

    let mut mountain_cells = 0usize;
    let mut shadowed_cells = 0usize;
    let mut windward_cells = 0usize;
    let mut total_change = 0.0f32;
    let mut changed = 0usize;

    for cell in &mesh.cells {
        if cell.height >= threshold {
            mountain_cells += 1;
            continue;
        }
        if !cell.is_land {
            continue;
        }

        let old = snapshot[cell.id as usize];
        let mut value = old;

        // Барьер против ветра → эта ячейка в тени
        if let Some(steps) = barrier_distance(mesh, cell.id, upwind, threshold) {
            let falloff = 1.0 - (steps - 1) as f32 / WIND_WALK_STEPS as f32;
            value *= 1.0 - SHADOW_LOSS * falloff;
            shadowed_cells += 1;
        }
        // Барьер по ветру → наветренный склон
        if let Some(steps) = barrier_distance(mesh, cell.id, downwind, threshold) {
            let falloff = 1.0 - (steps - 1) as f32 / WIND_WALK_STEPS as f32;
            value += WINDWARD_GAIN * falloff * (1.0 - value);
            windward_cells += 1;
        }

        let value = value.clamp(0.0, 1.0);
        if value != old {
            total_change += value - old;
            changed += 1;
        }
        output[cell.id as usize] = value;
    }

    for (cell, &p) in mesh.cells.iter_mut().zip(&output) {
        cell.precipitation = p;
    }

    RainShadowStats {
        mountain_cells,
        shadowed_cells,
        windward_cells,
        mean_change: if changed > 0 {
            total_change / changed as f32
        } else {
            0.0
        },
    }
}

/// Идёт по цепочке ячеек в направлении `dir` (не больше `WIND_WALK_STEPS`
/// шагов) и возвращает номер шага, на котором встретился горный барьер.
fn barrier_distance(mesh: &Mesh, start: u32, dir: (f32, f32), threshold: f32) -> Option<u32> {
    let mut current = start;
    for step in 1..=WIND_WALK_STEPS {
        current = step_toward(mesh, current, dir)?;
        if mesh.cells[current as usize].height >= threshold {
            return Some(step);
        }
    }
    None
}

/// Сосед, лучше всего выровненный с направлением `dir`; связи рвутся по id.
/// `None`, если ни один сосед не лежит в нужной полуплоскости.
fn step_toward(mesh: &Mesh, from: u32, dir: (f32, f32)) -> Option<u32> {
    let origin = mesh.cells[from as usize].center;
    let mut best: Option<(f32, u32)> = None;
    for &nb in &mesh.cells[from as usize].neighbor_ids {
        let c: Point = mesh.cells[nb as usize].center;
        let dx = c.x - origin.x;
        let dy = c.y - origin.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len < 1e-6 {
            continue;
        }
        let dot = (dx * dir.0 + dy * dir.1) / len;
        if dot < 0.3 {
            continue; // сосед не в направлении обхода
        }
        match best {
            Some((best_dot, best_id)) => {
                if dot > best_dot || (dot == best_dot && nb < best_id) {
                    best = Some((dot, nb));
                }
            }
            None => best = Some((dot, nb)),
        }
    }
    best.map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindDirection;
    use crate::mesh::voronoi::build_mesh;
    use crate::points::jittered_grid;
    use crate::rng::Pcg32;

    fn test_mesh(seed: u64, count: usize, width: f32, height: f32) -> Mesh {
        let mut rng = Pcg32::new(seed, 0);
        let points = jittered_grid(width, height, count, &mut rng);
        let mut mesh = build_mesh(&points, width, height, &mut rng).unwrap();
        for cell in &mut mesh.cells {
            cell.is_land = true;
            cell.height = 30.0;
        }
        mesh
    }

    #[test]
    fn temperature_is_colder_at_poles() {
        let mut mesh = test_mesh(1, 400, 200.0, 200.0);
        let settings = GenerationSettings::default();
        let rng = MapRng::from_seed(7);
        assign_temperature(&mut mesh, &settings, &rng);

        let mean = |cells: Vec<&Cell>| -> f32 {
            let n = cells.len().max(1) as f32;
            cells.iter().map(|c| c.temperature).sum::<f32>() / n
        };
        let polar = mean(
            mesh.cells
                .iter()
                .filter(|c| c.center.y < 20.0 || c.center.y > 180.0)
                .collect(),
        );
        let equatorial = mean(
            mesh.cells
                .iter()
                .filter(|c| (80.0..120.0).contains(&c.center.y))
                .collect(),
        );
        assert!(equatorial > polar);
    }

    #[test]
    fn climate_passes_are_deterministic() {
        let settings = GenerationSettings::default();
        let mut a = test_mesh(2, 300, 200.0, 200.0);
        let mut b = test_mesh(2, 300, 200.0, 200.0);
        let rng = MapRng::from_seed(11);
        assign_temperature(&mut a, &settings, &rng);
        assign_temperature(&mut b, &settings, &rng);
        assign_precipitation(&mut a, &rng);
        assign_precipitation(&mut b, &rng);
        for (ca, cb) in a.cells.iter().zip(&b.cells) {
            assert_eq!(ca.temperature.to_bits(), cb.temperature.to_bits());
            assert_eq!(ca.precipitation.to_bits(), cb.precipitation.to_bits());
        }
    }

    #[test]
    fn precipitation_in_unit_range() {
        let mut mesh = test_mesh(3, 300, 200.0, 200.0);
        let rng = MapRng::from_seed(3);
        assign_precipitation(&mut mesh, &rng);
        for cell in &mesh.cells {
            assert!((0.0..=1.0).contains(&cell.precipitation));
        }
    }

    #[test]
    fn mountain_wall_casts_rain_shadow() {
        let mut mesh = test_mesh(4, 400, 200.0, 200.0);
        // Вертикальная горная стена посередине, ветер дует на восток
        for cell in &mut mesh.cells {
            cell.precipitation = 0.5;
            if (95.0..105.0).contains(&cell.center.x) {
                cell.height = 90.0;
            }
        }
        let settings = GenerationSettings {
            climate: crate::config::ClimateSettings {
                wind: WindDirection::East,
                ..Default::default()
            },
            ..GenerationSettings::default()
        };
        let stats = apply_rain_shadow(&mut mesh, &settings);

        assert!(stats.mountain_cells > 0);
        assert!(stats.shadowed_cells > 0);
        assert!(stats.windward_cells > 0);

        // Сразу к востоку от стены суше, чем сразу к западу
        let east: Vec<f32> = mesh
            .cells
            .iter()
            .filter(|c| (106.0..126.0).contains(&c.center.x))
            .map(|c| c.precipitation)
            .collect();
        let west: Vec<f32> = mesh
            .cells
            .iter()
            .filter(|c| (74.0..94.0).contains(&c.center.x))
            .map(|c| c.precipitation)
            .collect();
        let mean_east: f32 = east.iter().sum::<f32>() / east.len().max(1) as f32;
        let mean_west: f32 = west.iter().sum::<f32>() / west.len().max(1) as f32;
        assert!(mean_east < mean_west, "east {mean_east} west {mean_west}");
    }

    #[test]
    fn rain_shadow_clamps_to_unit_range() {
        let mut mesh = test_mesh(5, 300, 200.0, 200.0);
        for (i, cell) in mesh.cells.iter_mut().enumerate() {
            cell.precipitation = (i % 11) as f32 / 10.0;
            if i % 7 == 0 {
                cell.height = 95.0;
            }
        }
        let settings = GenerationSettings::default();
        let _ = apply_rain_shadow(&mut mesh, &settings);
        for cell in &mesh.cells {
            assert!((0.0..=1.0).contains(&cell.precipitation));
        }
    }

    #[test]
    fn flat_map_has_no_shadow() {
        let mut mesh = test_mesh(6, 200, 200.0, 200.0);
        for cell in &mut mesh.cells {
            cell.precipitation = 0.4;
        }
        let stats = apply_rain_shadow(&mut mesh, &GenerationSettings::default());
        assert_eq!(stats.mountain_cells, 0);
        assert_eq!(stats.shadowed_cells, 0);
        assert_eq!(stats.windward_cells, 0);
        assert_eq!(stats.mean_change, 0.0);
        assert!(mesh.cells.iter().all(|c| c.precipitation == 0.4));
    }
}
