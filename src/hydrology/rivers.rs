// src/hydrology/rivers.rs
//! Трассировка рек наискорейшим спуском
//!
//! Исток — сухопутный локальный максимум достаточной высоты. Каждый шаг идёт
//! к самому низкому ещё не посещённому этой рекой соседу не выше текущей
//! ячейки; равные высоты разрешены (плёсы). Остановка: океан, чужая река или
//! озеро, либо локальный минимум — он становится зерном озера.
//!
//! Инвариант «высоты не возрастают вдоль русла» выполняется по построению,
//! отдельной проверки на подъём алгоритму не нужно.

use super::River;
use crate::mesh::{Mesh, Point};
use crate::rng::{MapRng, Pcg32, RandExt};

/// Минимальная высота истока.
pub const SOURCE_MIN_HEIGHT: f32 = 45.0;
/// Соль дочерних RNG-потоков извилин.
const MEANDER_SALT: u64 = 3 << 40;
/// Базовая амплитуда извилин в единицах карты.
const MEANDER_AMPLITUDE: f32 = 2.0;

/// Трассирует все реки. Возвращает реки и зёрна озёр (локальные минимумы,
/// в которых захлебнулись русла).
pub fn trace_rivers(mesh: &mut Mesh, rng: &MapRng) -> (Vec<River>, Vec<u32>) {
    let sources = find_sources(mesh);
    let mut rivers: Vec<River> = Vec::new();
    let mut pits: Vec<u32> = Vec::new();

    for source in sources {
        if mesh.cells[source as usize].river_id.is_some() {
            continue; // уже захвачен другой рекой
        }
        let river_id = rivers.len() as u32;
        let (path, pit) = descend(mesh, source);
        if let Some(pit) = pit {
            if !pits.contains(&pit) {
                pits.push(pit);
            }
        }
        if path.len() < 2 {
            continue;
        }

        for &cell_id in &path {
            let cell = &mut mesh.cells[cell_id as usize];
            if cell.river_id.is_none() {
                cell.river_id = Some(river_id);
            }
            cell.water = cell.water.max(0.3);
        }

        let mouth = path[path.len() - 1];
        let width = (1.0 + mesh.cells[mouth as usize].flux.sqrt() * 0.3).min(10.0);
        let meander_path = build_meander(mesh, &path, rng.child(MEANDER_SALT | u64::from(river_id)));

        rivers.push(River {
            id: river_id,
            cell_ids: path,
            width,
            meander_path,
        });
    }

    (rivers, pits)
}

/// Истоки: сухопутные локальные максимумы выше порога,
/// отсортированы от высоких к низким (связи — по id).
fn find_sources(mesh: &Mesh) -> Vec<u32> {
    let mut sources: Vec<u32> = mesh
        .cells
        .iter()
        .filter(|c| c.is_land && c.height >= SOURCE_MIN_HEIGHT)
        .filter(|c| {
            c.neighbor_ids
                .iter()
                .all(|&nb| mesh.cells[nb as usize].height < c.height)
        })
        .map(|c| c.id)
        .collect();
    sources.sort_by(|&a, &b| {
        mesh.cells[b as usize]
            .height
            .total_cmp(&mesh.cells[a as usize].height)
            .then(a.cmp(&b))
    });
    sources
}

/// Спуск от истока. Возвращает путь и, если русло упёрлось в локальный
/// минимум, зерно озера.
fn descend(mesh: &Mesh, source: u32) -> (Vec<u32>, Option<u32>) {
    let mut path = vec![source];
    let mut visited = vec![false; mesh.cells.len()];
    visited[source as usize] = true;
    let mut current = source;

    loop {
        let cell = &mesh.cells[current as usize];
        // Самый низкий непосещённый сосед не выше текущей ячейки.
        // Связи рвутся по наименьшему id: выбор произвольный, но стабильный.
        let next = cell
            .neighbor_ids
            .iter()
            .copied()
            .filter(|&nb| !visited[nb as usize])
            .filter(|&nb| mesh.cells[nb as usize].height <= cell.height)
            .min_by(|&a, &b| {
                mesh.cells[a as usize]
                    .height
                    .total_cmp(&mesh.cells[b as usize].height)
                    .then(a.cmp(&b))
            });

        let Some(next) = next else {
            // Локальный минимум — зерно озера
            return (path, Some(current));
        };

        visited[next as usize] = true;
        path.push(next);
        let next_cell = &mesh.cells[next as usize];

        if !next_cell.is_land {
            return (path, None); // устье в океане
        }
        if next_cell.river_id.is_some() || next_cell.lake_id.is_some() {
            return (path, None); // слияние с существующей рекой или озером
        }
        current = next;
    }
}

/// Косметическая извилистая линия русла: центры ячеек плюс смещённые
/// середины сегментов. Амплитуда затухает от истока и в высокогорье.
/// Никогда не читается логикой потока.
fn build_meander(mesh: &Mesh, path: &[u32], mut rng: Pcg32) -> Vec<Point> {
    let centers: Vec<Point> = path
        .iter()
        .map(|&id| mesh.cells[id as usize].center)
        .collect();
    if centers.len() < 2 {
        return centers;
    }

    let mut out = Vec::with_capacity(centers.len() * 2);
    let len = centers.len() as f32;
    for i in 0..centers.len() - 1 {
        let a = centers[i];
        let b = centers[i + 1];
        out.push(a);

        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let seg = (dx * dx + dy * dy).sqrt();
        if seg < 1e-6 {
            continue;
        }
        // Перпендикуляр к сегменту
        let (nx, ny) = (-dy / seg, dx / seg);
        let height = mesh.cells[path[i] as usize].height;
        let decay = 1.0 - i as f32 / len;
        let highland_damp = (1.0 - height / 150.0).max(0.0);
        let amplitude = MEANDER_AMPLITUDE * decay * highland_damp;
        let offset = (rng.next_float() as f32 - 0.5) * 2.0 * amplitude;

        out.push(Point::new(
            (a.x + b.x) * 0.5 + nx * offset,
            (a.y + b.y) * 0.5 + ny * offset,
        ));
    }
    out.push(centers[centers.len() - 1]);
    out
}

/// Проверка монотонности русла: высоты не возрастают от истока к устью.
#[must_use]
pub fn is_monotone_descent(heights: &[f32]) -> bool {
    heights.windows(2).all(|w| w[0] >= w[1])
}
