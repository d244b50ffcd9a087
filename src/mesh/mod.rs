// src/mesh/mod.rs
//! Сетка ячеек: планарное разбиение, двойственное триангуляции Делоне
//!
//! Ячейки ссылаются друг на друга только по индексам в общей арене —
//! никаких владеющих указателей между ячейками, циклы владения невозможны.
//! Смежность симметрична по построению: пара соседей появляется из общего
//! ребра Делоне сразу в обе стороны.

pub mod delaunay;
pub mod voronoi;

use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::biome::Biome;

/// Точка карты в условных единицах. Неизменяемое значение.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(&self, other: &Point) -> f32 {
        self.distance_sq(other).sqrt()
    }

    #[must_use]
    pub fn distance_sq(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Угол сетки, общий для прилегающих ячеек (центр описанной окружности
/// треугольника Делоне). Принадлежит сетке, ячейки ссылаются по индексу.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point,
    /// Ячейки, сходящиеся в этом угле
    pub cell_ids: Vec<u32>,
}

/// Ячейка рельефа — атомарная единица высоты, климата и воды.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: u32,
    pub center: Point,
    /// Замкнутое кольцо вершин полигона (по порядку обхода)
    pub vertex_ids: Vec<u32>,
    /// Соседи, отсортированы по возрастанию id; без самоссылок, симметрично
    pub neighbor_ids: Vec<u32>,
    /// Высота в диапазоне [0, 100]
    pub height: f32,
    pub biome: Biome,
    /// Температура [0, 1]
    pub temperature: f32,
    /// Осадки [0, 1]
    pub precipitation: f32,
    /// Накопленный речной поток (количество ячеек выше по течению)
    pub flux: f32,
    /// Глубина воды в ячейке (озеро или русло), 0 на сухой суше
    pub water: f32,
    pub is_land: bool,
    pub lake_id: Option<u32>,
    pub river_id: Option<u32>,
}

impl Cell {
    #[must_use]
    pub fn new(id: u32, center: Point) -> Self {
        Self {
            id,
            center,
            vertex_ids: Vec::new(),
            neighbor_ids: Vec::new(),
            height: 0.0,
            biome: Biome::Ocean,
            temperature: 0.0,
            precipitation: 0.0,
            flux: 0.0,
            water: 0.0,
            is_land: false,
            lake_id: None,
            river_id: None,
        }
    }

    /// Центроид полигона ячейки; для вырожденного кольца — среднее вершин,
    /// без вершин — собственный центр.
    #[must_use]
    pub fn centroid(&self, vertices: &[Vertex]) -> Point {
        let ring: Vec<Point> = self
            .vertex_ids
            .iter()
            .map(|&v| vertices[v as usize].position)
            .collect();
        polygon_centroid(&ring).unwrap_or(self.center)
    }
}

/// Центроид полигона по формуле площадей; `None` для колец из <3 точек
/// или почти нулевой площади.
#[must_use]
pub fn polygon_centroid(ring: &[Point]) -> Option<Point> {
    if ring.len() < 3 {
        return None;
    }
    let mut area2 = 0.0_f64;
    let mut cx = 0.0_f64;
    let mut cy = 0.0_f64;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        let cross = f64::from(a.x) * f64::from(b.y) - f64::from(b.x) * f64::from(a.y);
        area2 += cross;
        cx += (f64::from(a.x) + f64::from(b.x)) * cross;
        cy += (f64::from(a.y) + f64::from(b.y)) * cross;
    }
    if area2.abs() < 1e-9 {
        // Вырожденный полигон: берём среднее вершин
        let n = ring.len() as f32;
        let sx: f32 = ring.iter().map(|p| p.x).sum();
        let sy: f32 = ring.iter().map(|p| p.y).sum();
        return Some(Point::new(sx / n, sy / n));
    }
    let factor = 1.0 / (3.0 * area2);
    Some(Point::new((cx * factor) as f32, (cy * factor) as f32))
}

/// Готовая сетка: арена ячеек и вершин плюс границы карты.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub width: f32,
    pub height: f32,
    pub cells: Vec<Cell>,
    pub vertices: Vec<Vertex>,
}

/// Диагностика структуры сетки.
#[derive(Debug, Clone, Serialize)]
pub struct MeshStats {
    pub cell_count: usize,
    pub vertex_count: usize,
    pub min_neighbors: usize,
    pub max_neighbors: usize,
    pub mean_neighbors: f32,
}

impl Mesh {
    /// Проверяет структурные инварианты: без самоссылок, смежность симметрична,
    /// индексы соседей валидны.
    ///
    /// # Panics
    /// Паникует при нарушении инварианта — это ошибка построения, не данных.
    pub fn assert_valid(&self) {
        let n = self.cells.len() as u32;
        for cell in &self.cells {
            for &nb in &cell.neighbor_ids {
                assert!(nb < n, "cell {} references invalid neighbor {nb}", cell.id);
                assert_ne!(nb, cell.id, "cell {} references itself", cell.id);
                let back = &self.cells[nb as usize];
                assert!(
                    back.neighbor_ids.contains(&cell.id),
                    "adjacency not symmetric: {} -> {nb}",
                    cell.id
                );
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> MeshStats {
        let counts: Vec<usize> = self.cells.iter().map(|c| c.neighbor_ids.len()).collect();
        let total: usize = counts.iter().sum();
        MeshStats {
            cell_count: self.cells.len(),
            vertex_count: self.vertices.len(),
            min_neighbors: counts.iter().copied().min().unwrap_or(0),
            max_neighbors: counts.iter().copied().max().unwrap_or(0),
            mean_neighbors: total as f32 / self.cells.len().max(1) as f32,
        }
    }

    /// Экспортирует граф смежности для внешних потребителей
    /// (рост политических регионов, поиск путей).
    #[must_use]
    pub fn adjacency_graph(&self) -> UnGraph<u32, ()> {
        let mut graph = UnGraph::new_undirected();
        let mut id_to_node = HashMap::new();

        for cell in &self.cells {
            let node = graph.add_node(cell.id);
            id_to_node.insert(cell.id, node);
        }

        let mut edges = HashSet::new();
        for cell in &self.cells {
            for &nb in &cell.neighbor_ids {
                let (a, b) = if cell.id < nb { (cell.id, nb) } else { (nb, cell.id) };
                if edges.insert((a, b)) {
                    graph.add_edge(id_to_node[&a], id_to_node[&b], ());
                }
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_centroid_of_unit_square() {
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let c = polygon_centroid(&ring).unwrap();
        assert!((c.x - 0.5).abs() < 1e-6);
        assert!((c.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn polygon_centroid_rejects_degenerate_ring() {
        assert!(polygon_centroid(&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]).is_none());
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn adjacency_graph_dedups_edges() {
        // Треугольник из трёх ячеек: три ребра, каждое хранится один раз
        let mut cells: Vec<Cell> = (0..3)
            .map(|i| Cell::new(i, Point::new(f32::from(i as u8), 0.0)))
            .collect();
        cells[0].neighbor_ids = vec![1, 2];
        cells[1].neighbor_ids = vec![0, 2];
        cells[2].neighbor_ids = vec![0, 1];
        let mesh = Mesh {
            width: 3.0,
            height: 1.0,
            cells,
            vertices: Vec::new(),
        };
        let graph = mesh.adjacency_graph();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
    }
}
