// src/elevation.rs
//! Назначение и кондиционирование высот
//!
//! Высота ячейки живёт в диапазоне [0, 100] и обязана оставаться в нём после
//! каждого прохода. Все мутирующие проходы работают через двойной буфер:
//! чтение из снимка, запись в отдельный массив — сосед никогда не видит
//! наполовину обновлённые значения своей же итерации.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::VecDeque;

use crate::config::GenerationSettings;
use crate::mesh::Mesh;

pub const MAX_HEIGHT: f32 = 100.0;

/// Порог уровня моря в единицах высоты.
#[must_use]
pub fn sea_threshold(settings: &GenerationSettings) -> f32 {
    settings.sea_level * MAX_HEIGHT
}

/// Назначает высоты по фрактальному шуму с подгонкой под целевую долю суши.
///
/// Сэмплирование шума не зависит от порядка обхода — проход распараллеливается
/// без дочерних RNG-потоков (шум детерминирован сам по себе).
pub fn assign_elevation(mesh: &mut Mesh, settings: &GenerationSettings) {
    let mut noise = FastNoiseLite::new();
    noise.set_seed(Some(settings.seed as i32));
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(5));
    // Частота масштабируется к размеру карты: крупные формы для континентов
    noise.set_frequency(Some(4.0 / settings.width.max(settings.height)));

    let sample = |cell: &crate::mesh::Cell| -> f32 {
        let v = noise.get_noise_2d(cell.center.x, cell.center.y);
        (v + 1.0) * 0.5
    };

    #[cfg(feature = "parallel")]
    let mut values: Vec<f32> = mesh.cells.par_iter().map(sample).collect();
    #[cfg(not(feature = "parallel"))]
    let mut values: Vec<f32> = mesh.cells.iter().map(sample).collect();

    // Нормализация к [0,1]
    let min_v = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max_v = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max_v > min_v {
        for v in &mut values {
            *v = (*v - min_v) / (max_v - min_v);
        }
    }

    // Экспонента рельефа
    for v in &mut values {
        *v = v.powf(settings.elevation_power);
    }

    // Подбор сдвига под долю суши
    let sea = settings.sea_level;
    let mut best_offset = 0.0;
    let mut best_diff = f32::INFINITY;
    for i in 0..100 {
        let offset = (i as f32) / 100.0 - 0.5;
        let land_count = values
            .iter()
            .filter(|&&v| (v + offset).clamp(0.0, 1.0) > sea)
            .count();
        let land_ratio = land_count as f32 / values.len().max(1) as f32;
        let diff = (land_ratio - settings.target_land_ratio).abs();
        if diff < best_diff {
            best_diff = diff;
            best_offset = offset;
        }
    }

    let threshold = sea_threshold(settings);
    for (cell, v) in mesh.cells.iter_mut().zip(&values) {
        cell.height = ((v + best_offset).clamp(0.0, 1.0) * MAX_HEIGHT).clamp(0.0, MAX_HEIGHT);
        cell.is_land = cell.height > threshold;
    }
}

/// Обновляет флаги суши после кондиционирования высот.
pub fn update_land_flags(mesh: &mut Mesh, threshold: f32) {
    for cell in &mut mesh.cells {
        cell.is_land = cell.height > threshold;
    }
}

/// Итеративное сглаживание смешиванием со средним соседей:
/// `new = old*(1-s) + mean(соседи)*s`.
///
/// В варианте `land_only` океанские ячейки не трогаются и не участвуют
/// в среднем своих соседей.
pub fn smooth(mesh: &mut Mesh, strength: f32, iterations: u32, land_only: bool) {
    if iterations == 0 || strength <= 0.0 {
        return;
    }
    let s = strength.clamp(0.0, 1.0);

    for _ in 0..iterations {
        let snapshot: Vec<f32> = mesh.cells.iter().map(|c| c.height).collect();
        let mut output = snapshot.clone();

        for cell in &mesh.cells {
            if land_only && !cell.is_land {
                continue;
            }
            let mut sum = 0.0;
            let mut count = 0usize;
            for &nb in &cell.neighbor_ids {
                if land_only && !mesh.cells[nb as usize].is_land {
                    continue;
                }
                sum += snapshot[nb as usize];
                count += 1;
            }
            if count == 0 {
                continue;
            }
            let mean = sum / count as f32;
            let old = snapshot[cell.id as usize];
            output[cell.id as usize] = (old * (1.0 - s) + mean * s).clamp(0.0, MAX_HEIGHT);
        }

        for (cell, &h) in mesh.cells.iter_mut().zip(&output) {
            cell.height = h;
        }
    }
}

/// Медианный фильтр: высоты в BFS-радиусе, берётся медиана.
/// Убирает выбросы без размытия границ.
pub fn median_filter(mesh: &mut Mesh, radius: u32) {
    if radius == 0 {
        return;
    }
    let snapshot: Vec<f32> = mesh.cells.iter().map(|c| c.height).collect();
    let mut output = snapshot.clone();

    for cell in &mesh.cells {
        let mut heights: Vec<f32> = collect_within_hops(mesh, cell.id, radius)
            .into_iter()
            .map(|id| snapshot[id as usize])
            .collect();
        heights.sort_by(f32::total_cmp);
        output[cell.id as usize] = heights[heights.len() / 2].clamp(0.0, MAX_HEIGHT);
    }

    for (cell, &h) in mesh.cells.iter_mut().zip(&output) {
        cell.height = h;
    }
}

/// Сглаживание с обратными к расстоянию весами до граничного радиуса.
pub fn smooth_distance_weighted(mesh: &mut Mesh, cutoff: f32) {
    if cutoff <= 0.0 {
        return;
    }
    let snapshot: Vec<f32> = mesh.cells.iter().map(|c| c.height).collect();
    let mut output = snapshot.clone();

    for cell in &mesh.cells {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for id in collect_within_distance(mesh, cell.id, cutoff) {
            if id == cell.id {
                continue;
            }
            let d = cell.center.distance(&mesh.cells[id as usize].center).max(1e-3);
            let w = 1.0 / d;
            weighted += snapshot[id as usize] * w;
            total_weight += w;
        }
        if total_weight > 0.0 {
            let mean = weighted / total_weight;
            let old = snapshot[cell.id as usize];
            output[cell.id as usize] = (0.5 * old + 0.5 * mean).clamp(0.0, MAX_HEIGHT);
        }
    }

    for (cell, &h) in mesh.cells.iter_mut().zip(&output) {
        cell.height = h;
    }
}

/// Ячейки в пределах `radius` шагов по графу (BFS), включая стартовую.
fn collect_within_hops(mesh: &Mesh, start: u32, radius: u32) -> Vec<u32> {
    let mut visited = vec![false; mesh.cells.len()];
    let mut result = Vec::new();
    let mut queue = VecDeque::new();
    visited[start as usize] = true;
    queue.push_back((start, 0u32));
    while let Some((id, depth)) = queue.pop_front() {
        result.push(id);
        if depth == radius {
            continue;
        }
        for &nb in &mesh.cells[id as usize].neighbor_ids {
            if !visited[nb as usize] {
                visited[nb as usize] = true;
                queue.push_back((nb, depth + 1));
            }
        }
    }
    result
}

/// Ячейки, чьи центры лежат в евклидовом радиусе `cutoff` (обход по графу).
fn collect_within_distance(mesh: &Mesh, start: u32, cutoff: f32) -> Vec<u32> {
    let origin = mesh.cells[start as usize].center;
    let cutoff_sq = cutoff * cutoff;
    let mut visited = vec![false; mesh.cells.len()];
    let mut result = Vec::new();
    let mut queue = VecDeque::new();
    visited[start as usize] = true;
    queue.push_back(start);
    while let Some(id) = queue.pop_front() {
        result.push(id);
        for &nb in &mesh.cells[id as usize].neighbor_ids {
            if !visited[nb as usize]
                && mesh.cells[nb as usize].center.distance_sq(&origin) <= cutoff_sq
            {
                visited[nb as usize] = true;
                queue.push_back(nb);
            }
        }
    }
    result
}

/// Накопление потока: обход от вершин к низинам, весь поток ячейки уходит
/// к её самому низкому соседу. Океанские ячейки поток не несут.
///
/// Связи при выборе цели рвутся по наименьшему id — выбор произвольный,
/// но стабильный (контракт детерминизма).
pub fn compute_flux(mesh: &mut Mesh) {
    let n = mesh.cells.len();
    let mut flux: Vec<f32> = mesh
        .cells
        .iter()
        .map(|c| if c.is_land { 1.0 + c.precipitation } else { 0.0 })
        .collect();

    // Индексы от вершин к низинам; равные высоты упорядочены по id
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        mesh.cells[b]
            .height
            .total_cmp(&mesh.cells[a].height)
            .then(mesh.cells[a].id.cmp(&mesh.cells[b].id))
    });

    for &idx in &order {
        let cell = &mesh.cells[idx];
        if !cell.is_land {
            flux[idx] = 0.0;
            continue;
        }
        if let Some(target) = lowest_neighbor(mesh, cell.id) {
            if mesh.cells[target as usize].height < cell.height {
                flux[target as usize] += flux[idx];
            }
        }
    }

    for (cell, &f) in mesh.cells.iter_mut().zip(&flux) {
        cell.flux = f;
    }
}

/// Самый низкий сосед ячейки; связи рвутся по наименьшему id.
#[must_use]
pub fn lowest_neighbor(mesh: &Mesh, id: u32) -> Option<u32> {
    let cell = &mesh.cells[id as usize];
    cell.neighbor_ids
        .iter()
        .copied()
        .min_by(|&a, &b| {
            mesh.cells[a as usize]
                .height
                .total_cmp(&mesh.cells[b as usize].height)
                .then(a.cmp(&b))
        })
}
