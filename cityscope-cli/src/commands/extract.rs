//! `cityscope extract` - run one extraction against the Overpass API.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing::info;

use cityscope::catalog::LayerCatalog;
use cityscope::extract::{ExtractError, ExtractRequest, Feature, FeatureSource};
use cityscope::storage::LayerInfo;

use super::common::{city_name, load_boundary};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// GeoJSON file with the city boundary (Polygon or MultiPolygon)
    #[arg(long)]
    pub boundary: PathBuf,

    /// Catalog layer to extract
    #[arg(long)]
    pub layer: String,

    /// City name (defaults to the boundary file name)
    #[arg(long)]
    pub city: Option<String>,

    /// Print features as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Persist the result to the configured storage directory
    #[arg(long)]
    pub save: bool,
}

pub async fn run(args: ExtractArgs, debug: bool, verbose: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(debug, verbose && !args.json)?;
    runner.log_startup("extract");

    let boundary = Arc::new(load_boundary(&args.boundary)?);
    let city = city_name(args.city, &args.boundary);
    let request = ExtractRequest::new(city.clone(), boundary, args.layer.clone());

    let source = runner.overpass_source()?;
    let retry = runner.config().source.retry_policy();
    let what = format!("extract {} for {}", request.layer, request.city);
    let features = match retry.retry(&what, || source.extract_features(&request)).await {
        Ok(features) => features,
        Err(ExtractError::EmptyBoundary) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    info!(city = %city, layer = %args.layer, features = features.len(), "Extraction finished");

    if args.save {
        save(&runner, &city, &args.layer, &features)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&features)?);
    } else {
        print_table(&features);
    }

    Ok(())
}

fn save(runner: &CliRunner, city: &str, layer: &str, features: &[Feature]) -> Result<(), CliError> {
    let store = runner.layer_store()?;
    let info = LayerCatalog::builtin()
        .get(layer)
        .map(LayerInfo::from)
        .ok_or_else(|| ExtractError::UnknownLayer(layer.to_string()))?;
    store.save_layer(city, layer, info, features)?;
    eprintln!(
        "Saved {} features to {}",
        features.len(),
        store.root().join(city).display()
    );
    Ok(())
}

fn print_table(features: &[Feature]) {
    println!("{:<20} {:<16} {:<24} Name", "Id", "Type", "Position");
    println!("{}", "-".repeat(80));
    for feature in features {
        let point = feature.representative_point();
        println!(
            "{:<20} {:<16} {:<24} {}",
            feature.id().to_string(),
            feature.geometry_type().to_string(),
            format!("{:.5},{:.5}", point.lat, point.lon),
            feature.name().unwrap_or("-")
        );
    }
    println!();
    println!("{} features", features.len());
}
