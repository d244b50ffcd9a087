use clap::Parser;
use image::GrayImage;
use std::path::PathBuf;
use terragen::{GenerationSettings, MapData, generate};

/// Генератор карт для Chronicles of Realms
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: PathBuf,

    /// Путь для сохранения height.png (по умолчанию: ./height.png)
    #[arg(short, long, default_value = "height.png")]
    output: PathBuf,

    /// Путь для сводки в формате JSON (по умолчанию не пишется)
    #[arg(short, long)]
    summary: Option<PathBuf>,

    /// Переопределить сид из конфигурации
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    println!("🔍 Загрузка конфигурации...");
    let mut settings = GenerationSettings::from_toml_file(
        cli.config.to_str().ok_or("config path is not valid UTF-8")?,
    )?;
    if let Some(seed) = cli.seed {
        settings.seed = seed;
        settings.string_seed = None;
    }

    println!(
        "Генерация карты (размер: {}×{}, ячеек: {})...",
        settings.width, settings.height, settings.point_count
    );
    let map = generate(&settings)?;

    let report = map.report();
    println!(
        "Суша: {:.1}%, рек: {}, озёр: {}, контрольная сумма высот: {:016x}",
        report.land_ratio * 100.0,
        report.river_count,
        report.lake_count,
        report.height_checksum
    );

    println!("Сохранение в {:?}", cli.output);
    render_height_png(&map)?.save(&cli.output)?;

    if let Some(path) = &cli.summary {
        println!("Сводка в {path:?}");
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }

    println!("\nГотово! Карта сохранена.");
    Ok(())
}

/// Растеризует высоты в grayscale PNG: каждому пикселю — высота ближайшей
/// ячейки, вода затемнена.
fn render_height_png(map: &MapData) -> Result<GrayImage, Box<dyn std::error::Error>> {
    let index = map.spatial_index()?;
    let w = map.mesh.width.ceil().max(1.0) as u32;
    let h = map.mesh.height.ceil().max(1.0) as u32;

    Ok(GrayImage::from_fn(w, h, |x, y| {
        let p = terragen::Point::new(x as f32 + 0.5, y as f32 + 0.5);
        let cell = &map.mesh.cells[index.nearest_cell(p) as usize];
        let mut v = (cell.height / 100.0 * 255.0) as u8;
        if !cell.is_land || cell.water > 0.0 {
            v = v.saturating_sub(60);
        }
        image::Luma([v])
    }))
}
