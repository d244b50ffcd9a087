// src/erosion.rs
//! Эрозия рельефа
//!
//! Две взаимозаменяемые политики, выбираемые конфигурацией:
//! - `Simple` — врезание русла по речному потоку: высокогорные ячейки с большим
//!   потоком теряют до 5 единиц высоты, но не опускаются ниже пола в 20 единиц;
//! - `NeighborStability` — ячейка с тремя и более строго более высокими
//!   соседями считается стабильной и не трогается, остальные теряют
//!   фиксированную величину за итерацию.
//!
//! Обе политики безопасны при повторном запуске: ноль итераций — no-op,
//! высоты всегда остаются в [0, 100]. Эрозия никогда не поднимает ячейку —
//! уже построенные реки не могут начать «течь в гору».

use crate::config::ErosionPolicy;
use crate::elevation::MAX_HEIGHT;
use crate::mesh::Mesh;

/// Порог высокогорья: ниже него врезание русла не применяется.
pub const HIGHLAND_THRESHOLD: f32 = 35.0;
/// Пол врезания: после эрозии высота не опускается ниже.
pub const DOWNCUT_FLOOR: f32 = 20.0;
/// Максимальное врезание за проход.
pub const MAX_DOWNCUT: f32 = 5.0;
/// Минимальный поток, при котором русло начинает резать породу.
pub const FLUX_THRESHOLD: f32 = 10.0;
/// Перевод потока во врезание.
const DOWNCUT_PER_FLUX: f32 = 0.05;

/// Применяет выбранную политику эрозии. `ErosionPolicy::None` — no-op.
pub fn erode(mesh: &mut Mesh, policy: ErosionPolicy) {
    match policy {
        ErosionPolicy::None => {}
        ErosionPolicy::Simple => downcut_by_flux(mesh),
        ErosionPolicy::NeighborStability { amount, iterations } => {
            neighbor_stability(mesh, amount, iterations);
        }
    }
}

/// Врезание русла: один проход по всем ячейкам с большим потоком.
fn downcut_by_flux(mesh: &mut Mesh) {
    for cell in &mut mesh.cells {
        if !cell.is_land || cell.height < HIGHLAND_THRESHOLD || cell.flux <= FLUX_THRESHOLD {
            continue;
        }
        let amount = (cell.flux * DOWNCUT_PER_FLUX).min(MAX_DOWNCUT);
        cell.height = (cell.height - amount).max(DOWNCUT_FLOOR).min(MAX_HEIGHT);
    }
}

/// Эрозия по стабильности соседей, `iterations` проходов с двойным буфером.
fn neighbor_stability(mesh: &mut Mesh, amount: f32, iterations: u32) {
    for _ in 0..iterations {
        let snapshot: Vec<f32> = mesh.cells.iter().map(|c| c.height).collect();
        let mut output = snapshot.clone();

        for cell in &mesh.cells {
            if !cell.is_land {
                continue;
            }
            let h = snapshot[cell.id as usize];
            let higher = cell
                .neighbor_ids
                .iter()
                .filter(|&&nb| snapshot[nb as usize] > h)
                .count();
            if higher >= 3 {
                continue; // стабильная ячейка
            }
            output[cell.id as usize] = (h - amount).clamp(0.0, MAX_HEIGHT);
        }

        for (cell, &h) in mesh.cells.iter_mut().zip(&output) {
            cell.height = h;
        }
    }
}
