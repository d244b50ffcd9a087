// src/spatial.rs
//! Пространственный индекс по центрам ячеек
//!
//! Равномерная решётка корзин поверх прямоугольника карты. Строится один раз
//! после сборки сетки и дальше только читается; все запросы возвращают
//! индексы ячеек в возрастающем порядке, чтобы результат не зависел от
//! порядка обхода корзин.

use serde::Serialize;

use crate::mesh::{Mesh, Point};

/// Точка интереса: позиция плюс владеющая ячейка.
#[derive(Debug, Clone, Serialize)]
pub struct Poi {
    pub id: u32,
    pub position: Point,
    /// Ячейка, в которой лежит точка (ближайший центр)
    pub cell_id: u32,
}

/// Именованный слой точек интереса поверх индекса.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoiLayer {
    pub name: String,
    pub points: Vec<Poi>,
}

impl PoiLayer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// Добавляет точку, привязывая её к ближайшей ячейке индекса.
    pub fn add(&mut self, index: &SpatialIndex, position: Point) -> u32 {
        let id = self.points.len() as u32;
        let cell_id = index.nearest_cell(position);
        self.points.push(Poi {
            id,
            position,
            cell_id,
        });
        id
    }

    /// Точки, принадлежащие данной ячейке.
    #[must_use]
    pub fn in_cell(&self, cell_id: u32) -> Vec<&Poi> {
        self.points.iter().filter(|p| p.cell_id == cell_id).collect()
    }

    /// Ближайшая точка слоя; `None` для пустого слоя.
    #[must_use]
    pub fn nearest(&self, position: Point) -> Option<&Poi> {
        self.points.iter().min_by(|a, b| {
            a.position
                .distance_sq(&position)
                .total_cmp(&b.position.distance_sq(&position))
                .then(a.id.cmp(&b.id))
        })
    }

    /// Точки в радиусе от позиции, по возрастанию id.
    #[must_use]
    pub fn within_radius(&self, position: Point, radius: f32) -> Vec<&Poi> {
        let r_sq = radius * radius;
        self.points
            .iter()
            .filter(|p| p.position.distance_sq(&position) <= r_sq)
            .collect()
    }
}

/// Диагностика индекса.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub cols: usize,
    pub rows: usize,
    pub bucket_size: f32,
    pub cell_count: usize,
    pub max_bucket_len: usize,
}

/// Решётчатый индекс центров ячеек. После `build` неизменяем.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    width: f32,
    height: f32,
    bucket_size: f32,
    cols: usize,
    rows: usize,
    /// Корзина — список id ячеек, отсортирован по возрастанию
    buckets: Vec<Vec<u32>>,
    centers: Vec<Point>,
}

impl SpatialIndex {
    /// Строит индекс по центрам всех ячеек сетки. Размер корзины подбирается
    /// под среднюю плотность: порядка одной-двух ячеек на корзину.
    #[must_use]
    pub fn build(mesh: &Mesh) -> Self {
        let count = mesh.cells.len().max(1);
        let bucket_size = (mesh.width * mesh.height / count as f32).sqrt().max(1e-3);
        let cols = (mesh.width / bucket_size).ceil().max(1.0) as usize;
        let rows = (mesh.height / bucket_size).ceil().max(1.0) as usize;

        let mut index = Self {
            width: mesh.width,
            height: mesh.height,
            bucket_size,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
            centers: mesh.cells.iter().map(|c| c.center).collect(),
        };
        for cell in &mesh.cells {
            let b = index.bucket_of(cell.center);
            index.buckets[b].push(cell.id);
        }
        // id приходят по возрастанию, но не полагаемся на это
        for bucket in &mut index.buckets {
            bucket.sort_unstable();
        }
        index
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            cols: self.cols,
            rows: self.rows,
            bucket_size: self.bucket_size,
            cell_count: self.centers.len(),
            max_bucket_len: self.buckets.iter().map(Vec::len).max().unwrap_or(0),
        }
    }

    /// Ближайшая к точке ячейка. Кольцевой обход корзин от точки наружу;
    /// поиск останавливается, когда следующее кольцо заведомо дальше
    /// текущего лучшего кандидата. Точки вне карты прижимаются к границе.
    ///
    /// # Panics
    /// Паникует на индексе без ячеек — такой не строится из валидной сетки.
    #[must_use]
    pub fn nearest_cell(&self, position: Point) -> u32 {
        assert!(!self.centers.is_empty(), "nearest_cell on empty index");
        let p = self.clamp_to_map(position);
        let (pc, pr) = self.grid_coords(p);

        let mut best_id = u32::MAX;
        let mut best_dist_sq = f32::INFINITY;
        let max_ring = self.cols.max(self.rows);

        for ring in 0..=max_ring {
            // Кольцо дальше лучшего кандидата уже не улучшит ответ
            if best_id != u32::MAX {
                let ring_floor = (ring as f32 - 1.0).max(0.0) * self.bucket_size;
                if ring_floor * ring_floor > best_dist_sq {
                    break;
                }
            }
            for (c, r) in self.ring_coords(pc, pr, ring) {
                for &id in &self.buckets[r * self.cols + c] {
                    let d = self.centers[id as usize].distance_sq(&p);
                    if d < best_dist_sq || (d == best_dist_sq && id < best_id) {
                        best_dist_sq = d;
                        best_id = id;
                    }
                }
            }
        }
        best_id
    }

    /// Ячейки с центром в радиусе от точки, по возрастанию id.
    #[must_use]
    pub fn cells_within_radius(&self, position: Point, radius: f32) -> Vec<u32> {
        if radius < 0.0 {
            return Vec::new();
        }
        let r_sq = radius * radius;
        let c_lo = self.col_of(position.x - radius);
        let c_hi = self.col_of(position.x + radius);
        let r_lo = self.row_of(position.y - radius);
        let r_hi = self.row_of(position.y + radius);

        let mut out = Vec::new();
        for r in r_lo..=r_hi {
            for c in c_lo..=c_hi {
                for &id in &self.buckets[r * self.cols + c] {
                    if self.centers[id as usize].distance_sq(&position) <= r_sq {
                        out.push(id);
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Ячейки с центром внутри прямоугольника (границы включительно),
    /// по возрастанию id.
    #[must_use]
    pub fn cells_in_rect(&self, min: Point, max: Point) -> Vec<u32> {
        if min.x > max.x || min.y > max.y {
            return Vec::new();
        }
        let mut out = Vec::new();
        for r in self.row_of(min.y)..=self.row_of(max.y) {
            for c in self.col_of(min.x)..=self.col_of(max.x) {
                for &id in &self.buckets[r * self.cols + c] {
                    let p = self.centers[id as usize];
                    if p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y {
                        out.push(id);
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }

    fn clamp_to_map(&self, p: Point) -> Point {
        Point::new(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }

    fn grid_coords(&self, p: Point) -> (usize, usize) {
        (self.col_of(p.x), self.row_of(p.y))
    }

    fn bucket_of(&self, p: Point) -> usize {
        let (c, r) = self.grid_coords(p);
        r * self.cols + c
    }

    fn col_of(&self, x: f32) -> usize {
        ((x / self.bucket_size) as isize).clamp(0, self.cols as isize - 1) as usize
    }

    fn row_of(&self, y: f32) -> usize {
        ((y / self.bucket_size) as isize).clamp(0, self.rows as isize - 1) as usize
    }

    /// Координаты корзин кольца Чебышёва радиуса `ring` вокруг (pc, pr),
    /// обрезанные границами решётки.
    fn ring_coords(&self, pc: usize, pr: usize, ring: usize) -> Vec<(usize, usize)> {
        let mut coords = Vec::new();
        let (pc, pr) = (pc as isize, pr as isize);
        let ring = ring as isize;
        for dr in -ring..=ring {
            for dc in -ring..=ring {
                if dr.abs().max(dc.abs()) != ring {
                    continue;
                }
                let (c, r) = (pc + dc, pr + dr);
                if c >= 0 && r >= 0 && (c as usize) < self.cols && (r as usize) < self.rows {
                    coords.push((c as usize, r as usize));
                }
            }
        }
        coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::voronoi::build_mesh;
    use crate::points::jittered_grid;
    use crate::rng::Pcg32;

    fn sample_mesh(seed: u64, count: usize) -> Mesh {
        let mut rng = Pcg32::new(seed, 0);
        let points = jittered_grid(200.0, 150.0, count, &mut rng);
        build_mesh(&points, 200.0, 150.0, &mut rng).unwrap()
    }

    fn brute_nearest(mesh: &Mesh, p: Point) -> u32 {
        mesh.cells
            .iter()
            .min_by(|a, b| {
                a.center
                    .distance_sq(&p)
                    .total_cmp(&b.center.distance_sq(&p))
                    .then(a.id.cmp(&b.id))
            })
            .map(|c| c.id)
            .unwrap()
    }

    #[test]
    fn nearest_cell_agrees_with_brute_force() {
        let mesh = sample_mesh(42, 300);
        let index = SpatialIndex::build(&mesh);
        use crate::rng::RandExt;
        let mut probe = Pcg32::new(99, 0);
        for _ in 0..200 {
            let p = Point::new(
                probe.next_float() as f32 * 200.0,
                probe.next_float() as f32 * 150.0,
            );
            assert_eq!(index.nearest_cell(p), brute_nearest(&mesh, p), "at {p:?}");
        }
    }

    #[test]
    fn build_places_every_cell_in_its_own_bucket() {
        let mesh = sample_mesh(5, 250);
        let index = SpatialIndex::build(&mesh);
        let total: usize = index.buckets.iter().map(Vec::len).sum();
        assert_eq!(total, mesh.cells.len());
        for cell in &mesh.cells {
            let b = index.bucket_of(cell.center);
            assert!(
                index.buckets[b].binary_search(&cell.id).is_ok(),
                "cell {} not in bucket {b}",
                cell.id
            );
        }
    }

    #[test]
    fn nearest_cell_clamps_outside_points() {
        let mesh = sample_mesh(7, 100);
        let index = SpatialIndex::build(&mesh);
        let outside = Point::new(-50.0, 500.0);
        let clamped = Point::new(0.0, 150.0);
        assert_eq!(index.nearest_cell(outside), brute_nearest(&mesh, clamped));
    }

    #[test]
    fn radius_query_agrees_with_brute_force() {
        let mesh = sample_mesh(11, 300);
        let index = SpatialIndex::build(&mesh);
        let center = Point::new(100.0, 75.0);
        for radius in [0.0, 5.0, 20.0, 80.0, 500.0] {
            let got = index.cells_within_radius(center, radius);
            let want: Vec<u32> = mesh
                .cells
                .iter()
                .filter(|c| c.center.distance_sq(&center) <= radius * radius)
                .map(|c| c.id)
                .collect();
            assert_eq!(got, want, "radius {radius}");
        }
    }

    #[test]
    fn rect_query_agrees_with_brute_force() {
        let mesh = sample_mesh(13, 300);
        let index = SpatialIndex::build(&mesh);
        let (min, max) = (Point::new(40.0, 30.0), Point::new(120.0, 100.0));
        let got = index.cells_in_rect(min, max);
        let want: Vec<u32> = mesh
            .cells
            .iter()
            .filter(|c| {
                c.center.x >= min.x && c.center.x <= max.x && c.center.y >= min.y && c.center.y <= max.y
            })
            .map(|c| c.id)
            .collect();
        assert_eq!(got, want);
    }

    #[test]
    fn empty_rect_and_negative_radius_yield_nothing() {
        let mesh = sample_mesh(17, 100);
        let index = SpatialIndex::build(&mesh);
        assert!(index
            .cells_in_rect(Point::new(50.0, 50.0), Point::new(10.0, 10.0))
            .is_empty());
        assert!(index
            .cells_within_radius(Point::new(50.0, 50.0), -1.0)
            .is_empty());
    }

    #[test]
    fn poi_layer_binds_points_to_owning_cells() {
        let mesh = sample_mesh(19, 200);
        let index = SpatialIndex::build(&mesh);
        let mut layer = PoiLayer::new("settlements");

        let pos = Point::new(60.0, 40.0);
        let id = layer.add(&index, pos);
        let poi = &layer.points[id as usize];
        assert_eq!(poi.cell_id, brute_nearest(&mesh, pos));
        assert_eq!(layer.in_cell(poi.cell_id).len(), 1);
        assert_eq!(layer.nearest(Point::new(61.0, 41.0)).unwrap().id, id);
        assert!(layer.within_radius(pos, 1.0).iter().any(|p| p.id == id));
        assert!(layer.nearest(Point::new(0.0, 0.0)).is_some());
    }

    #[test]
    fn index_stats_reflect_mesh() {
        let mesh = sample_mesh(23, 150);
        let index = SpatialIndex::build(&mesh);
        let stats = index.stats();
        assert_eq!(stats.cell_count, mesh.cells.len());
        assert!(stats.cols > 0 && stats.rows > 0);
        assert!(stats.max_bucket_len >= 1);
    }
}
