//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::defaults::MAX_CONFIG_ZOOM;
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = section.get("overpass_url") {
            let v = v.trim();
            if !(v.starts_with("http://") || v.starts_with("https://")) {
                return Err(invalid("source", "overpass_url", v, "must be an http(s) URL"));
            }
            config.source.overpass_url = v.to_string();
        }
        if let Some(v) = section.get("timeout") {
            config.source.timeout = parse_positive("source", "timeout", v, "seconds")?;
        }
        if let Some(v) = section.get("max_attempts") {
            config.source.max_attempts = parse_positive("source", "max_attempts", v, "attempts")?;
        }
        if let Some(v) = section.get("backoff_ms") {
            config.source.backoff_ms = parse_number("source", "backoff_ms", v)?;
        }
    }

    // [sync] section
    if let Some(section) = ini.section(Some("sync")) {
        if let Some(v) = section.get("chunk_size") {
            config.sync.chunk_size = parse_positive("sync", "chunk_size", v, "features")?;
        }
        if let Some(v) = section.get("debounce_ms") {
            config.sync.debounce_ms = parse_number("sync", "debounce_ms", v)?;
        }
    }

    // [cluster] section
    if let Some(section) = ini.section(Some("cluster")) {
        if let Some(v) = section.get("zoom") {
            let zoom: u8 = parse_number("cluster", "zoom", v)?;
            if zoom > MAX_CONFIG_ZOOM {
                return Err(invalid(
                    "cluster",
                    "zoom",
                    v,
                    &format!("must be between 0 and {}", MAX_CONFIG_ZOOM),
                ));
            }
            config.cluster.zoom = zoom;
        }
        if let Some(v) = section.get("cell_zoom_offset") {
            config.cluster.cell_zoom_offset = parse_number("cluster", "cell_zoom_offset", v)?;
        }
    }

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.storage.directory = Some(expand_tilde(v));
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn parse_positive<T>(section: &str, key: &str, value: &str, unit: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + Default + PartialEq,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, &format!("must be a positive integer ({})", unit)))?;
    if parsed == T::default() {
        return Err(invalid(
            section,
            key,
            value,
            &format!("must be a positive integer ({})", unit),
        ));
    }
    Ok(parsed)
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
