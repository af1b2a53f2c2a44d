//! GeoJSON input shared by the commands.
//!
//! Boundary and neighbourhood files may hold a bare geometry, a `Feature`
//! or a `FeatureCollection`. Neighbourhood names come from the feature's
//! `name` property.

use std::fs;
use std::path::Path;

use serde_json::Value;

use cityscope::geometry::{Boundary, Neighbourhood, Polygon};

use crate::error::CliError;

fn input_error(path: &Path, reason: impl Into<String>) -> CliError {
    CliError::Input {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_geojson(path: &Path) -> Result<Value, CliError> {
    let text = fs::read_to_string(path).map_err(|e| input_error(path, e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| input_error(path, format!("invalid JSON: {}", e)))
}

/// Splits a GeoJSON document into `(name, geometry)` pairs.
fn geometries(path: &Path, mut value: Value) -> Result<Vec<(Option<String>, Value)>, CliError> {
    let kind = value.get("type").and_then(Value::as_str).map(str::to_string);
    match kind.as_deref() {
        Some("FeatureCollection") => {
            let features = match value.get_mut("features").map(Value::take) {
                Some(Value::Array(features)) => features,
                _ => return Err(input_error(path, "FeatureCollection has no features array")),
            };
            features
                .into_iter()
                .map(|feature| feature_geometry(path, feature))
                .collect()
        }
        Some("Feature") => Ok(vec![feature_geometry(path, value)?]),
        Some(_) => Ok(vec![(None, value)]),
        None => Err(input_error(path, "not a GeoJSON object")),
    }
}

fn feature_geometry(path: &Path, mut feature: Value) -> Result<(Option<String>, Value), CliError> {
    let name = feature
        .pointer("/properties/name")
        .and_then(Value::as_str)
        .map(str::to_string);
    match feature.get_mut("geometry").map(Value::take) {
        Some(geometry) if !geometry.is_null() => Ok((name, geometry)),
        _ => Err(input_error(path, "feature without geometry")),
    }
}

fn to_boundary(path: &Path, geometry: Value) -> Result<Boundary, CliError> {
    serde_json::from_value(geometry).map_err(|e| input_error(path, e.to_string()))
}

/// Loads a city boundary. Several areal features are merged into one
/// MultiPolygon.
pub fn load_boundary(path: &Path) -> Result<Boundary, CliError> {
    let mut parts = geometries(path, read_geojson(path)?)?
        .into_iter()
        .map(|(_, geometry)| to_boundary(path, geometry))
        .collect::<Result<Vec<_>, _>>()?;

    match parts.len() {
        0 => Err(input_error(path, "no boundary geometry")),
        1 => Ok(parts.remove(0)),
        _ => {
            let polygons: Vec<Polygon> = parts
                .iter()
                .flat_map(|boundary| boundary.parts().iter().cloned())
                .collect();
            Ok(Boundary::MultiPolygon(polygons))
        }
    }
}

/// Loads named neighbourhoods. Features without a `name` are numbered.
pub fn load_neighbourhoods(path: &Path) -> Result<Vec<Neighbourhood>, CliError> {
    geometries(path, read_geojson(path)?)?
        .into_iter()
        .enumerate()
        .map(|(index, (name, geometry))| {
            let name = name.unwrap_or_else(|| format!("neighbourhood-{}", index + 1));
            Ok(Neighbourhood::new(name, to_boundary(path, geometry)?))
        })
        .collect()
}

/// City name from an explicit flag, else the boundary file stem.
pub fn city_name(explicit: Option<String>, boundary: &Path) -> String {
    explicit.unwrap_or_else(|| {
        boundary
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "city".to_string())
    })
}
