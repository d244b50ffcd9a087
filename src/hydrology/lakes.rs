// src/hydrology/lakes.rs
//! Заполнение замкнутых бассейнов приоритетным паводком
//!
//! Зерно озера — локальный минимум, в котором захлебнулась река. Бассейн
//! растёт от зерна: из границы всегда извлекается самая низкая ячейка.
//! Если она не выше текущего зеркала (или это океан) — найден сток, озеро
//! открытое. Иначе ячейка входит в озеро и поднимает зеркало. Бассейн без
//! стока после исчерпания фронта или достижения лимита — замкнутое озеро.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{Lake, LakeKind, River};
use crate::mesh::Mesh;

/// Предел размера одного озера в ячейках.
const MAX_LAKE_CELLS: usize = 64;
/// Приток, ниже которого замкнутое озеро в сухом климате пересыхающее.
const SEASONAL_INFLOW: f32 = 2.0;
/// Порог осадков сухого климата для пересыхающих озёр.
const SEASONAL_PRECIPITATION: f32 = 0.2;
/// Минимальная глубина воды в ячейке озера.
const MIN_DEPTH: f32 = 0.1;

/// Запись границы бассейна: упорядочена по высоте, связи — по id.
/// `f32` не `Ord`, поэтому сравниваем через `total_cmp` вручную.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    height: f32,
    cell_id: u32,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.height
            .total_cmp(&other.height)
            .then(self.cell_id.cmp(&other.cell_id))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Заполняет озёра из зёрен, классифицирует их и помечает ячейки.
pub fn form_lakes(mesh: &mut Mesh, rivers: &[River], pits: &[u32]) -> Vec<Lake> {
    let mut lakes: Vec<Lake> = Vec::new();

    for &pit in pits {
        if mesh.cells[pit as usize].lake_id.is_some() {
            continue; // зерно поглощено ранее заполненным озером
        }
        let lake_id = lakes.len() as u32;
        let (members, outlet, surface) = flood(mesh, pit);
        let kind = match outlet {
            Some(_) => LakeKind::Open,
            None => classify_closed(mesh, rivers, &members),
        };

        for &id in &members {
            let cell = &mut mesh.cells[id as usize];
            cell.lake_id = Some(lake_id);
            cell.water = (surface - cell.height).max(MIN_DEPTH);
        }

        lakes.push(Lake {
            id: lake_id,
            cell_ids: members,
            kind,
            outlet_cell_id: outlet,
            surface,
        });
    }

    lakes
}

/// Приоритетный паводок от зерна. Возвращает ячейки озера (отсортированы
/// по id), ячейку стока (если нашлась) и высоту зеркала.
fn flood(mesh: &Mesh, pit: u32) -> (Vec<u32>, Option<u32>, f32) {
    let mut members = vec![pit];
    let mut in_basin = vec![false; mesh.cells.len()];
    in_basin[pit as usize] = true;
    let mut surface = mesh.cells[pit as usize].height;

    let mut frontier: BinaryHeap<Reverse<Frontier>> = BinaryHeap::new();
    push_neighbors(mesh, pit, &mut in_basin, &mut frontier);

    while let Some(Reverse(entry)) = frontier.pop() {
        let cell = &mesh.cells[entry.cell_id as usize];
        // Сток: океан или ячейка не выше зеркала, куда вода может уйти
        if !cell.is_land || cell.height <= surface {
            return (sorted(members), Some(entry.cell_id), surface);
        }
        if members.len() >= MAX_LAKE_CELLS {
            break;
        }

        surface = cell.height;
        members.push(entry.cell_id);
        push_neighbors(mesh, entry.cell_id, &mut in_basin, &mut frontier);
    }

    (sorted(members), None, surface)
}

fn push_neighbors(
    mesh: &Mesh,
    cell_id: u32,
    in_basin: &mut [bool],
    frontier: &mut BinaryHeap<Reverse<Frontier>>,
) {
    for &nb in &mesh.cells[cell_id as usize].neighbor_ids {
        if in_basin[nb as usize] {
            continue;
        }
        in_basin[nb as usize] = true;
        frontier.push(Reverse(Frontier {
            height: mesh.cells[nb as usize].height,
            cell_id: nb,
        }));
    }
}

fn sorted(mut ids: Vec<u32>) -> Vec<u32> {
    ids.sort_unstable();
    ids
}

/// Классификация замкнутого озера по водному балансу.
///
/// Приток — суммарный поток рек, впадающих в бассейн; испарение оценивается
/// по температуре и сухости ячеек зеркала. Слабый приток при сухом климате —
/// пересыхающее озеро; иначе солёное, если испарение покрывает приток.
fn classify_closed(mesh: &Mesh, rivers: &[River], members: &[u32]) -> LakeKind {
    let inflow: f32 = rivers
        .iter()
        .filter_map(|r| r.cell_ids.last())
        .filter(|&&mouth| members.contains(&mouth))
        .map(|&mouth| mesh.cells[mouth as usize].flux)
        .sum();

    let mean_precipitation: f32 = members
        .iter()
        .map(|&id| mesh.cells[id as usize].precipitation)
        .sum::<f32>()
        / members.len().max(1) as f32;

    if inflow < SEASONAL_INFLOW && mean_precipitation < SEASONAL_PRECIPITATION {
        return LakeKind::Seasonal;
    }

    let evaporation: f32 = members
        .iter()
        .map(|&id| {
            let c = &mesh.cells[id as usize];
            c.temperature * (1.0 - c.precipitation)
        })
        .sum();

    if evaporation >= inflow {
        LakeKind::ClosedSaline
    } else {
        LakeKind::ClosedFreshwater
    }
}
