// src/mesh/voronoi.rs
//! Построение сетки ячеек: двойственность Вороного к триангуляции Делоне
//!
//! Вокруг карты добавляется рамка из псевдоточек: она стабилизирует ячейки у
//! границы (их полигоны замыкаются на край карты, а не уходят в бесконечность).
//! Псевдоточки участвуют только в триангуляции — ячеек для них нет, в списки
//! соседей они не попадают.
//!
//! Вырожденные входы (совпадающие точки) лечатся джиттером с повторной
//! попыткой; после исчерпания попыток — `DegenerateGeometry`.

use log::warn;
use rand::RngCore;

use super::delaunay::{self, Triangle};
use super::{Cell, Mesh, Point, Vertex};
use crate::error::GenerationError;
use crate::rng::RandExt;

/// Максимум повторных попыток с джиттером.
const MAX_JITTER_ATTEMPTS: u32 = 3;

/// Строит сетку из набора точек.
///
/// `rng` используется только для джиттера при вырожденных входах: для чистого
/// набора точек генератор не трогается и результат зависит лишь от точек.
pub fn build_mesh(
    points: &[Point],
    width: f32,
    height: f32,
    rng: &mut impl RngCore,
) -> Result<Mesh, GenerationError> {
    let mut working: Vec<Point> = points.to_vec();

    for attempt in 0..MAX_JITTER_ATTEMPTS {
        let dupes = find_near_duplicates(&working, width, height);
        if dupes.is_empty() {
            if let Some(mesh) = try_build(&working, width, height) {
                return Ok(mesh);
            }
            // Коллинеарный или иначе вырожденный набор без явных дубликатов
            jitter_all(&mut working, width, height, rng);
            warn!("degenerate triangulation, re-jittering all points (attempt {attempt})");
            continue;
        }

        warn!(
            "{} near-duplicate points detected, jittering (attempt {attempt})",
            dupes.len()
        );
        for idx in dupes {
            jitter_point(&mut working[idx], width, height, rng);
        }
    }

    Err(GenerationError::DegenerateGeometry {
        attempts: MAX_JITTER_ATTEMPTS,
    })
}

/// Рамка из псевдоточек на расстоянии одного среднего шага за границей карты.
fn boundary_frame(width: f32, height: f32, count: usize) -> Vec<Point> {
    let spacing = (width * height / count.max(1) as f32).sqrt();
    let offset = spacing;
    let mut frame = Vec::new();

    let nx = ((width / (2.0 * spacing)).ceil() as usize).max(2);
    let ny = ((height / (2.0 * spacing)).ceil() as usize).max(2);

    for i in 0..=nx {
        let x = -offset + (width + 2.0 * offset) * i as f32 / nx as f32;
        frame.push(Point::new(x, -offset));
        frame.push(Point::new(x, height + offset));
    }
    for j in 1..ny {
        let y = -offset + (height + 2.0 * offset) * j as f32 / ny as f32;
        frame.push(Point::new(-offset, y));
        frame.push(Point::new(width + offset, y));
    }
    frame
}

/// Пытается построить сетку; `None`, если триангуляция не накрыла все точки.
fn try_build(points: &[Point], width: f32, height: f32) -> Option<Mesh> {
    let n = points.len();
    let mut padded = points.to_vec();
    padded.extend(boundary_frame(width, height, n));

    let triangles: Vec<Triangle> = delaunay::triangulate(&padded);
    if triangles.is_empty() {
        return None;
    }

    let mut cells: Vec<Cell> = points
        .iter()
        .enumerate()
        .map(|(id, &center)| Cell::new(id as u32, center))
        .collect();

    // Вершина на треугольник с хотя бы одной настоящей ячейкой:
    // прижатый к карте центр описанной окружности
    let mut vertices: Vec<Vertex> = Vec::new();
    for tri in &triangles {
        let real: Vec<u32> = tri.iter().filter(|&&s| s < n).map(|&s| s as u32).collect();
        if real.is_empty() {
            continue;
        }
        let (cx, cy) = delaunay::circumcenter(*tri, &padded);
        let vid = vertices.len() as u32;
        let mut cell_ids = real;
        cell_ids.sort_unstable();
        for &site in &cell_ids {
            cells[site as usize].vertex_ids.push(vid);
        }
        vertices.push(Vertex {
            position: Point::new(
                (cx as f32).clamp(0.0, width),
                (cy as f32).clamp(0.0, height),
            ),
            cell_ids,
        });
    }

    // Соседство из рёбер Делоне между настоящими ячейками —
    // сразу в обе стороны, симметрия по построению
    for tri in &triangles {
        let [a, b, c] = *tri;
        for (u, v) in [(a, b), (b, c), (c, a)] {
            if u < n && v < n && u != v {
                cells[u].neighbor_ids.push(v as u32);
                cells[v].neighbor_ids.push(u as u32);
            }
        }
    }

    for cell in &mut cells {
        if cell.vertex_ids.is_empty() {
            // Точка не попала ни в один треугольник — вход вырожден
            return None;
        }
        cell.neighbor_ids.sort_unstable();
        cell.neighbor_ids.dedup();
        sort_ring_by_angle(&mut cell.vertex_ids, cell.center, &vertices);
    }

    Some(Mesh {
        width,
        height,
        cells,
        vertices,
    })
}

/// Сортирует кольцо вершин по полярному углу вокруг центра ячейки.
/// Связи рвутся по id вершины — порядок стабилен.
fn sort_ring_by_angle(ring: &mut [u32], center: Point, vertices: &[Vertex]) {
    ring.sort_by(|&a, &b| {
        let pa = vertices[a as usize].position;
        let pb = vertices[b as usize].position;
        let ang_a = f64::from(pa.y - center.y).atan2(f64::from(pa.x - center.x));
        let ang_b = f64::from(pb.y - center.y).atan2(f64::from(pb.x - center.x));
        ang_a
            .partial_cmp(&ang_b)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
}

/// Ищет почти совпадающие точки через пространственную хеш-решётку.
/// Возвращает индексы точек, требующих джиттера (первая из пары не трогается).
fn find_near_duplicates(points: &[Point], width: f32, height: f32) -> Vec<usize> {
    let eps = duplicate_epsilon(width, height, points.len());
    let eps_sq = eps * eps;
    let inv = 1.0 / eps;

    let mut grid: std::collections::HashMap<(i64, i64), Vec<usize>> =
        std::collections::HashMap::new();
    let mut dupes = Vec::new();

    for (i, p) in points.iter().enumerate() {
        let gx = (p.x * inv).floor() as i64;
        let gy = (p.y * inv).floor() as i64;
        let mut is_dupe = false;
        'scan: for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = grid.get(&(gx + dx, gy + dy)) {
                    for &j in bucket {
                        if points[j].distance_sq(p) < eps_sq {
                            is_dupe = true;
                            break 'scan;
                        }
                    }
                }
            }
        }
        if is_dupe {
            dupes.push(i);
        } else {
            grid.entry((gx, gy)).or_default().push(i);
        }
    }
    dupes
}

/// Порог «почти совпадения»: малая доля среднего шага между точками.
fn duplicate_epsilon(width: f32, height: f32, count: usize) -> f32 {
    let spacing = (width * height / count.max(1) as f32).sqrt();
    (spacing * 1e-3).max(1e-6)
}

fn jitter_point(p: &mut Point, width: f32, height: f32, rng: &mut impl RngCore) {
    let amount = width.min(height) * 1e-2;
    p.x = (p.x + (rng.next_float() as f32 - 0.5) * amount).clamp(0.0, width);
    p.y = (p.y + (rng.next_float() as f32 - 0.5) * amount).clamp(0.0, height);
}

fn jitter_all(points: &mut [Point], width: f32, height: f32, rng: &mut impl RngCore) {
    for p in points {
        jitter_point(p, width, height, rng);
    }
}
