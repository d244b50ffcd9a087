// src/biome.rs
use serde::{Deserialize, Serialize};

use crate::mesh::Mesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Biome {
    Ocean,
    Ice,
    Tundra,
    Taiga,
    TemperateForest,
    TropicalRainforest,
    Grassland,
    Savanna,
    Desert,
    Swamp,
    Mountain,
}

/// Назначает биомы по высоте, температуре и осадкам.
/// Озёрные ячейки получают Swamp — заболоченные берега внутренних водоёмов.
pub fn assign_biomes(mesh: &mut Mesh) {
    for cell in &mut mesh.cells {
        cell.biome = classify(
            cell.is_land,
            cell.lake_id.is_some(),
            cell.height,
            cell.temperature,
            cell.precipitation,
        );
    }
}

fn classify(is_land: bool, in_lake: bool, height: f32, temp: f32, humid: f32) -> Biome {
    if !is_land {
        return Biome::Ocean;
    }
    if in_lake {
        return Biome::Swamp;
    }

    // Горы: на холоде превращаются в лёд, а не в серые скалы
    if height > 85.0 {
        return Biome::Mountain;
    }
    if height > 75.0 && temp < 0.3 {
        return Biome::Ice;
    }

    if temp < 0.15 {
        Biome::Ice
    } else if temp < 0.3 {
        if humid < 0.4 { Biome::Tundra } else { Biome::Taiga }
    } else if temp < 0.65 {
        // Расширенная умеренная зона
        if humid < 0.35 {
            Biome::Grassland
        } else if humid < 0.7 {
            Biome::TemperateForest
        } else {
            Biome::Swamp
        }
    } else {
        // Тропики и пустыни
        if humid < 0.25 {
            Biome::Desert
        } else if humid < 0.55 {
            Biome::Savanna
        } else {
            Biome::TropicalRainforest
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocean_regardless_of_climate() {
        assert_eq!(classify(false, false, 10.0, 0.9, 0.9), Biome::Ocean);
    }

    #[test]
    fn high_peaks_are_mountains() {
        assert_eq!(classify(true, false, 90.0, 0.5, 0.5), Biome::Mountain);
    }

    #[test]
    fn cold_highlands_are_ice() {
        assert_eq!(classify(true, false, 80.0, 0.2, 0.5), Biome::Ice);
    }

    #[test]
    fn hot_and_dry_is_desert() {
        assert_eq!(classify(true, false, 30.0, 0.8, 0.1), Biome::Desert);
    }

    #[test]
    fn temperate_and_wet_is_forest() {
        assert_eq!(classify(true, false, 30.0, 0.5, 0.5), Biome::TemperateForest);
    }

    #[test]
    fn lake_cells_become_swamp() {
        assert_eq!(classify(true, true, 30.0, 0.5, 0.2), Biome::Swamp);
    }
}
