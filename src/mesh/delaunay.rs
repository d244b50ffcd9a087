// src/mesh/delaunay.rs
//! Триангуляция Делоне методом Бойера–Ватсона
//!
//! Точки вставляются строго в порядке индексов, граница полости обходится
//! в отсортированном порядке — результат детерминирован для одного и того же
//! набора точек. Вся арифметика в f64.

use std::collections::BTreeMap;

use super::Point;

/// Треугольник как тройка индексов точек, ориентирован против часовой стрелки.
pub type Triangle = [usize; 3];

/// Строит триангуляцию Делоне. Возвращает только «настоящие» треугольники —
/// без вершин супертреугольника.
///
/// Для менее чем трёх точек возвращает пустой список.
#[must_use]
pub fn triangulate(points: &[Point]) -> Vec<Triangle> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }

    let mut xs: Vec<f64> = points.iter().map(|p| f64::from(p.x)).collect();
    let mut ys: Vec<f64> = points.iter().map(|p| f64::from(p.y)).collect();

    // Супертреугольник с большим запасом вокруг ограничивающего прямоугольника
    let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let mid_x = (min_x + max_x) * 0.5;
    let mid_y = (min_y + max_y) * 0.5;

    xs.push(mid_x - 1000.0 * span);
    ys.push(mid_y - span);
    xs.push(mid_x);
    ys.push(mid_y + 1000.0 * span);
    xs.push(mid_x + 1000.0 * span);
    ys.push(mid_y - span);

    let mut triangles: Vec<Triangle> = vec![ccw([n, n + 1, n + 2], &xs, &ys)];

    for p in 0..n {
        let px = xs[p];
        let py = ys[p];

        // Треугольники, чья описанная окружность содержит новую точку
        let mut bad: Vec<usize> = Vec::new();
        for (ti, tri) in triangles.iter().enumerate() {
            if in_circumcircle(*tri, px, py, &xs, &ys) {
                bad.push(ti);
            }
        }

        // Граница полости: рёбра, встретившиеся ровно один раз.
        // BTreeMap вместо HashMap: порядок обхода обязан быть стабильным.
        let mut edge_use: BTreeMap<(usize, usize), (usize, usize, u32)> = BTreeMap::new();
        for &ti in &bad {
            let [a, b, c] = triangles[ti];
            for (u, v) in [(a, b), (b, c), (c, a)] {
                let key = if u < v { (u, v) } else { (v, u) };
                edge_use
                    .entry(key)
                    .and_modify(|e| e.2 += 1)
                    .or_insert((u, v, 1));
            }
        }

        let mut keep = vec![true; triangles.len()];
        for &ti in &bad {
            keep[ti] = false;
        }
        let mut next: Vec<Triangle> = triangles
            .into_iter()
            .zip(keep)
            .filter_map(|(t, k)| k.then_some(t))
            .collect();

        for (u, v, count) in edge_use.into_values() {
            if count == 1 {
                next.push(ccw([u, v, p], &xs, &ys));
            }
        }
        triangles = next;
    }

    triangles
        .into_iter()
        .filter(|t| t.iter().all(|&v| v < n))
        .collect()
}

/// Ориентирует тройку против часовой стрелки.
fn ccw(tri: Triangle, xs: &[f64], ys: &[f64]) -> Triangle {
    let [a, b, c] = tri;
    let cross = (xs[b] - xs[a]) * (ys[c] - ys[a]) - (ys[b] - ys[a]) * (xs[c] - xs[a]);
    if cross < 0.0 { [a, c, b] } else { tri }
}

/// Точка (px, py) внутри описанной окружности CCW-треугольника?
fn in_circumcircle(tri: Triangle, px: f64, py: f64, xs: &[f64], ys: &[f64]) -> bool {
    let [a, b, c] = tri;
    let ax = xs[a] - px;
    let ay = ys[a] - py;
    let bx = xs[b] - px;
    let by = ys[b] - py;
    let cx = xs[c] - px;
    let cy = ys[c] - py;

    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);
    det > 0.0
}

/// Центр описанной окружности треугольника.
#[must_use]
pub fn circumcenter(tri: Triangle, points: &[Point]) -> (f64, f64) {
    let [a, b, c] = tri;
    let ax = f64::from(points[a].x);
    let ay = f64::from(points[a].y);
    let bx = f64::from(points[b].x);
    let by = f64::from(points[b].y);
    let cx = f64::from(points[c].x);
    let cy = f64::from(points[c].y);

    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    if d.abs() < 1e-12 {
        // Почти коллинеарные точки: центр масс как запасное значение
        return ((ax + bx + cx) / 3.0, (ay + by + cy) / 3.0);
    }
    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
    let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;
    (ux, uy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_points_give_one_triangle() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 8.0),
        ];
        let tris = triangulate(&points);
        assert_eq!(tris.len(), 1);
        let mut ids: Vec<usize> = tris[0].to_vec();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn square_gives_two_triangles() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert_eq!(triangulate(&points).len(), 2);
    }

    #[test]
    fn delaunay_property_holds() {
        // Ни одна точка не лежит внутри описанной окружности чужого треугольника
        let points: Vec<Point> = (0..40)
            .map(|i| {
                let x = (i % 8) as f32 * 13.0 + ((i * 7) % 5) as f32;
                let y = (i / 8) as f32 * 11.0 + ((i * 3) % 7) as f32;
                Point::new(x, y)
            })
            .collect();
        let xs: Vec<f64> = points.iter().map(|p| f64::from(p.x)).collect();
        let ys: Vec<f64> = points.iter().map(|p| f64::from(p.y)).collect();

        for tri in triangulate(&points) {
            for (i, _) in points.iter().enumerate() {
                if tri.contains(&i) {
                    continue;
                }
                assert!(
                    !in_circumcircle(tri, xs[i], ys[i], &xs, &ys),
                    "point {i} inside circumcircle of {tri:?}"
                );
            }
        }
    }

    #[test]
    fn triangulation_is_deterministic() {
        let points: Vec<Point> = (0..60)
            .map(|i| Point::new(((i * 37) % 101) as f32, ((i * 53) % 97) as f32))
            .collect();
        assert_eq!(triangulate(&points), triangulate(&points));
    }

    #[test]
    fn circumcenter_of_right_triangle() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(0.0, 4.0),
        ];
        let (x, y) = circumcenter([0, 1, 2], &points);
        // Центр гипотенузы
        assert!((x - 2.0).abs() < 1e-9);
        assert!((y - 2.0).abs() < 1e-9);
    }
}
