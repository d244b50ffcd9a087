// src/points.rs
//! Распределение исходных точек
//!
//! Три взаимозаменяемые стратегии: сетка с джиттером, Poisson-disk по Бридсону
//! и релаксация Ллойда поверх уже готового набора. Каждая итерация Ллойда
//! перестраивает сетку с нуля — граф соседства живёт как неизменяемое значение
//! на итерацию и заменяется целиком.

use rand::RngCore;

use crate::error::GenerationError;
use crate::mesh::voronoi::build_mesh;
use crate::mesh::Point;
use crate::rng::RandExt;

/// Регулярная сетка со случайным смещением внутри каждой ячейки.
/// Возвращает ровно `count` точек.
#[must_use]
pub fn jittered_grid(width: f32, height: f32, count: usize, rng: &mut impl RngCore) -> Vec<Point> {
    if count == 0 {
        return Vec::new();
    }
    let cols = ((count as f32 * width / height).sqrt().round() as usize).max(1);
    let rows = count.div_ceil(cols);
    let step_x = width / cols as f32;
    let step_y = height / rows as f32;
    // Джиттер не доходит до границ ячейки, чтобы точки не слипались
    let jitter = 0.9;

    let mut points = Vec::with_capacity(count);
    'fill: for row in 0..rows {
        for col in 0..cols {
            if points.len() == count {
                break 'fill;
            }
            let dx = (rng.next_float() as f32 - 0.5) * jitter;
            let dy = (rng.next_float() as f32 - 0.5) * jitter;
            points.push(Point::new(
                ((col as f32 + 0.5 + dx) * step_x).clamp(0.0, width),
                ((row as f32 + 0.5 + dy) * step_y).clamp(0.0, height),
            ));
        }
    }
    points
}

/// Poisson-disk по Бридсону: точки попарно не ближе `min_distance`.
///
/// Количество точек определяется дистанцией и размерами карты, не задаётся
/// напрямую. Решётка ускорения с шагом `min_distance / √2` гарантирует не
/// больше одной точки на ячейку решётки.
#[must_use]
pub fn poisson_disk(
    width: f32,
    height: f32,
    min_distance: f32,
    rng: &mut impl RngCore,
) -> Vec<Point> {
    const ATTEMPTS_PER_POINT: u32 = 30;

    let cell_size = min_distance / std::f32::consts::SQRT_2;
    let grid_w = (width / cell_size).ceil() as usize + 1;
    let grid_h = (height / cell_size).ceil() as usize + 1;
    let mut grid: Vec<Option<usize>> = vec![None; grid_w * grid_h];
    let grid_index = |p: &Point| -> usize {
        let gx = (p.x / cell_size) as usize;
        let gy = (p.y / cell_size) as usize;
        gy.min(grid_h - 1) * grid_w + gx.min(grid_w - 1)
    };

    let mut points: Vec<Point> = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    let first = Point::new(
        width * rng.next_float() as f32,
        height * rng.next_float() as f32,
    );
    grid[grid_index(&first)] = Some(0);
    points.push(first);
    active.push(0);

    let min_dist_sq = min_distance * min_distance;

    while !active.is_empty() {
        let slot = rng.next_int(active.len() as i64) as usize;
        let base = points[active[slot]];
        let mut placed = false;

        for _ in 0..ATTEMPTS_PER_POINT {
            // Кандидат в кольце [r, 2r] вокруг базовой точки
            let angle = rng.next_float() as f32 * 2.0 * std::f32::consts::PI;
            let radius = min_distance * (1.0 + rng.next_float() as f32);
            let candidate = Point::new(
                base.x + radius * angle.cos(),
                base.y + radius * angle.sin(),
            );
            if !(0.0..=width).contains(&candidate.x) || !(0.0..=height).contains(&candidate.y) {
                continue;
            }

            let gx = (candidate.x / cell_size) as i64;
            let gy = (candidate.y / cell_size) as i64;
            let mut ok = true;
            'check: for dy in -2..=2_i64 {
                for dx in -2..=2_i64 {
                    let nx = gx + dx;
                    let ny = gy + dy;
                    if nx < 0 || ny < 0 || nx >= grid_w as i64 || ny >= grid_h as i64 {
                        continue;
                    }
                    if let Some(pi) = grid[ny as usize * grid_w + nx as usize] {
                        if points[pi].distance_sq(&candidate) < min_dist_sq {
                            ok = false;
                            break 'check;
                        }
                    }
                }
            }
            if ok {
                let id = points.len();
                grid[grid_index(&candidate)] = Some(id);
                points.push(candidate);
                active.push(id);
                placed = true;
                break;
            }
        }

        if !placed {
            active.swap_remove(slot);
        }
    }

    points
}

/// Релаксация Ллойда: каждая точка заменяется центроидом своей ячейки,
/// сетка перестраивается, и так `iterations` раз.
///
/// Количество точек сохраняется; точки никогда не выходят за
/// `[0,width] × [0,height]`. Для менее чем двух точек — no-op.
pub fn lloyd_relax(
    mut points: Vec<Point>,
    width: f32,
    height: f32,
    iterations: u32,
    rng: &mut impl RngCore,
) -> Result<Vec<Point>, GenerationError> {
    if points.len() < 2 {
        return Ok(points);
    }

    for _ in 0..iterations {
        let mesh = build_mesh(&points, width, height, rng)?;
        points = mesh
            .cells
            .iter()
            .map(|cell| {
                let c = cell.centroid(&mesh.vertices);
                Point::new(c.x.clamp(0.0, width), c.y.clamp(0.0, height))
            })
            .collect();
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Pcg32;

    #[test]
    fn jittered_grid_returns_exact_count() {
        let mut rng = Pcg32::new(42, 0);
        for count in [3, 10, 100, 777, 1000] {
            let pts = jittered_grid(800.0, 600.0, count, &mut rng);
            assert_eq!(pts.len(), count);
        }
    }

    #[test]
    fn jittered_grid_points_in_bounds() {
        let mut rng = Pcg32::new(7, 0);
        for p in jittered_grid(800.0, 600.0, 500, &mut rng) {
            assert!((0.0..=800.0).contains(&p.x));
            assert!((0.0..=600.0).contains(&p.y));
        }
    }

    #[test]
    fn poisson_disk_respects_min_distance() {
        let mut rng = Pcg32::new(13, 0);
        let pts = poisson_disk(200.0, 200.0, 15.0, &mut rng);
        assert!(pts.len() > 20, "too few points: {}", pts.len());
        for i in 0..pts.len() {
            for j in (i + 1)..pts.len() {
                assert!(
                    pts[i].distance(&pts[j]) >= 15.0 - 1e-3,
                    "points {i} and {j} too close"
                );
            }
        }
    }

    #[test]
    fn poisson_disk_is_deterministic() {
        let mut a = Pcg32::new(21, 0);
        let mut b = Pcg32::new(21, 0);
        assert_eq!(
            poisson_disk(100.0, 100.0, 10.0, &mut a),
            poisson_disk(100.0, 100.0, 10.0, &mut b)
        );
    }

    #[test]
    fn lloyd_preserves_count_and_bounds() {
        let mut rng = Pcg32::new(99, 0);
        let pts = jittered_grid(800.0, 600.0, 100, &mut rng);
        let relaxed = lloyd_relax(pts, 800.0, 600.0, 3, &mut rng).unwrap();
        assert_eq!(relaxed.len(), 100);
        for p in &relaxed {
            assert!((0.0..=800.0).contains(&p.x));
            assert!((0.0..=600.0).contains(&p.y));
        }
    }

    #[test]
    fn lloyd_moves_points_toward_uniformity() {
        // Случайный (независимый от пайплайна) набор точек: хотя бы одна
        // должна сдвинуться больше чем на единицу
        use rand::SeedableRng;
        let mut chacha = rand_chacha::ChaCha8Rng::seed_from_u64(5);
        let pts: Vec<Point> = (0..100)
            .map(|_| {
                Point::new(
                    rand::Rng::gen_range(&mut chacha, 0.0..800.0),
                    rand::Rng::gen_range(&mut chacha, 0.0..600.0),
                )
            })
            .collect();
        let mut rng = Pcg32::new(1, 0);
        let relaxed = lloyd_relax(pts.clone(), 800.0, 600.0, 1, &mut rng).unwrap();
        let max_move = pts
            .iter()
            .zip(&relaxed)
            .map(|(a, b)| a.distance(b))
            .fold(0.0_f32, f32::max);
        assert!(max_move > 1.0, "max move {max_move}");
    }

    #[test]
    fn lloyd_single_point_is_noop() {
        let pts = vec![Point::new(123.0, 45.0)];
        let mut rng = Pcg32::new(2, 0);
        let relaxed = lloyd_relax(pts.clone(), 800.0, 600.0, 3, &mut rng).unwrap();
        assert_eq!(relaxed, pts);
    }
}
