//! `cityscope sync` - run a sync session for one city and print the
//! clustered result once every requested layer has settled.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cityscope::cluster::{ClusterConfig, Marker};
use cityscope::extract::FeatureSource;
use cityscope::sync::{
    ActiveLayerSet, CitySession, Declaration, LayerLoadState, SyncDriver, SyncEngine, SyncProgress,
    DEFAULT_DECLARATION_CHANNEL_CAPACITY,
};

use super::common::{city_name, load_boundary, load_neighbourhoods};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the sync command.
#[derive(Args)]
pub struct SyncArgs {
    /// City name (defaults to the boundary file name)
    #[arg(long)]
    pub city: Option<String>,

    /// GeoJSON file with the city boundary (Polygon or MultiPolygon)
    #[arg(long)]
    pub boundary: PathBuf,

    /// GeoJSON file with named neighbourhood polygons
    #[arg(long)]
    pub neighbourhoods: Option<PathBuf>,

    /// Comma-separated layers to activate
    #[arg(long, value_delimiter = ',', required = true)]
    pub layers: Vec<String>,

    /// Viewport zoom used for clustering (defaults to [cluster] zoom)
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Read layers from the storage directory instead of Overpass
    #[arg(long)]
    pub stored: bool,

    /// Print markers as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: SyncArgs, debug: bool, verbose: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(debug, verbose && !args.json)?;
    runner.log_startup("sync");

    let boundary = load_boundary(&args.boundary)?;
    let neighbourhoods = match &args.neighbourhoods {
        Some(path) => load_neighbourhoods(path)?,
        None => Vec::new(),
    };
    let city = city_name(args.city.clone(), &args.boundary);
    let session = Arc::new(CitySession::new(city, boundary, neighbourhoods));

    if args.stored {
        run_session(runner.stored_source()?, &runner, session, &args).await
    } else {
        run_session(runner.overpass_source()?, &runner, session, &args).await
    }
}

async fn run_session<S: FeatureSource>(
    source: S,
    runner: &CliRunner,
    session: Arc<CitySession>,
    args: &SyncArgs,
) -> Result<(), CliError> {
    let config = runner.config();
    let mut sync_config = config.sync_config();
    if let Some(zoom) = args.zoom {
        sync_config.cluster = ClusterConfig {
            zoom,
            ..sync_config.cluster
        };
    }
    info!(source = source.name(), city = session.name(), "Starting sync session");

    let engine = SyncEngine::new(source, sync_config);
    let (driver, mut progress) = SyncDriver::new(engine, config.sync.debounce());
    let (tx, rx) = mpsc::channel(DEFAULT_DECLARATION_CHANNEL_CAPACITY);
    let token = CancellationToken::new();
    let handle = tokio::spawn(driver.run(rx, token.clone()));

    let city = session.name().to_string();
    let active: ActiveLayerSet = args.layers.iter().cloned().collect();
    let declarations = [
        Declaration::SelectCity(session),
        Declaration::SetActiveLayers(active),
    ];
    for declaration in declarations {
        if tx.send(declaration).await.is_err() {
            break;
        }
    }

    let mut reported: BTreeMap<String, LayerLoadState> = BTreeMap::new();
    loop {
        let snapshot = progress.borrow_and_update().clone();
        report_changes(&snapshot, &mut reported);
        if is_done(&snapshot, &city, &args.layers) {
            break;
        }
        if progress.changed().await.is_err() {
            break;
        }
    }

    token.cancel();
    let engine = handle
        .await
        .map_err(|e| CliError::Output(format!("sync driver stopped unexpectedly: {}", e)))?;

    let markers = engine.markers();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&markers)?);
    } else {
        print_summary(&engine.progress(), &markers);
    }

    Ok(())
}

/// Every requested layer is known to the engine and none is still busy.
fn is_done(progress: &SyncProgress, city: &str, layers: &[String]) -> bool {
    progress.city.as_deref() == Some(city)
        && layers.iter().all(|layer| progress.layers.contains_key(layer))
        && progress.is_settled()
}

fn report_changes(progress: &SyncProgress, reported: &mut BTreeMap<String, LayerLoadState>) {
    for (layer, state) in &progress.layers {
        if reported.get(layer) != Some(state) {
            eprintln!("  {:<20} {}", layer, state);
            reported.insert(layer.clone(), state.clone());
        }
    }
}

fn print_summary(progress: &SyncProgress, markers: &[Marker]) {
    println!();
    println!(
        "{}: {} features materialized",
        progress.city.as_deref().unwrap_or("-"),
        progress.materialized_feature_count
    );
    println!();
    println!("{:<16} {:>8} {:<14} {:<24} Neighbourhoods", "Cell", "Members", "Domain", "Center");
    println!("{}", "-".repeat(88));

    for marker in markers {
        let position = marker.position();
        let center = format!("{:.5},{:.5}", position.lat, position.lon);
        match marker {
            Marker::Cluster(cluster) => {
                let hoods: Vec<&str> = cluster.neighbourhood_names.iter().map(String::as_str).collect();
                println!(
                    "{:<16} {:>8} {:<14} {:<24} {}",
                    cluster.cell.to_string(),
                    cluster.member_count,
                    cluster.dominant_domain().unwrap_or("-"),
                    center,
                    hoods.join(", ")
                );
            }
            Marker::Feature {
                id,
                domain,
                name,
                neighbourhoods,
                ..
            } => {
                println!(
                    "{:<16} {:>8} {:<14} {:<24} {}",
                    id.to_string(),
                    1,
                    domain,
                    center,
                    neighbourhoods.join(", ")
                );
                if let Some(name) = name {
                    println!("{:<16} {:>8} {}", "", "", name);
                }
            }
        }
    }
    println!();
    println!("{} markers", markers.len());
}
