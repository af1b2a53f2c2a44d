//! Selected-city session handle.

use std::sync::Arc;

use crate::geometry::{Boundary, Neighbourhood};

/// Everything the engine needs to know about the selected city.
///
/// Sessions are immutable and shared by `Arc`; selecting another city means
/// handing the engine a new session.
#[derive(Debug, Clone)]
pub struct CitySession {
    name: String,
    boundary: Arc<Boundary>,
    neighbourhoods: Arc<[Neighbourhood]>,
}

impl CitySession {
    pub fn new(
        name: impl Into<String>,
        boundary: Boundary,
        neighbourhoods: Vec<Neighbourhood>,
    ) -> Self {
        Self {
            name: name.into(),
            boundary: Arc::new(boundary),
            neighbourhoods: Arc::from(neighbourhoods),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn boundary(&self) -> &Arc<Boundary> {
        &self.boundary
    }

    pub fn neighbourhoods(&self) -> &Arc<[Neighbourhood]> {
        &self.neighbourhoods
    }
}
