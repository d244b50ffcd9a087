pub mod biome;
pub mod climate;
pub mod config;
pub mod elevation;
pub mod erosion;
pub mod error;
pub mod hydrology;
pub mod map;
pub mod mesh;
pub mod points;
pub mod rng;
pub mod spatial;

pub use config::{
    ClimateSettings, ErosionPolicy, GenerationSettings, PointDistribution, SmoothingSettings,
    WindDirection,
};
pub use error::GenerationError;
pub use hydrology::{Lake, LakeKind, River};
pub use map::{MapData, MapReport, generate};
pub use mesh::{Cell, Mesh, Point, Vertex};
pub use rng::MapRng;
pub use spatial::{PoiLayer, SpatialIndex};
