//! Feature extraction pipeline.
//!
//! Given a city boundary and a layer name, a [`FeatureSource`] produces the
//! layer's features as normalized, domain-tagged points inside the boundary.
//!
//! # Pipeline
//!
//! ```text
//! Boundary ──bbox──► OverpassQuery (catalog tag predicate)
//!                          │
//!                          ▼
//!                    RawElement[] ──dedupe──► Geometry ──representative point──►
//!                                                   containment filter ──► Feature[]
//! ```
//!
//! [`RetryPolicy`] wraps any call with exponential backoff on
//! [`ExtractError::SourceUnavailable`].

mod convert;
mod error;
mod feature;
mod pipeline;
mod retry;

pub use convert::{element_geometry, features_from_elements, ConversionStats};
pub use error::{ExtractError, MalformedGeometry};
pub use feature::{Feature, FeatureId};
pub use pipeline::{ExtractRequest, FeatureSource, OverpassFeatureSource};
pub use retry::{RetryPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS};
