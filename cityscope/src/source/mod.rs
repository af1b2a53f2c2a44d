//! Map-data source.
//!
//! The only upstream the extraction pipeline talks to is an Overpass
//! interpreter. HTTP access goes through [`AsyncHttpClient`] so tests can
//! substitute a mock.

mod http;
mod overpass;
mod types;

pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS};
pub use overpass::{
    ElementKind, LatLon, OverpassClient, OverpassQuery, OverpassResponse, RawElement, RawMember,
    DEFAULT_OVERPASS_URL, DEFAULT_QUERY_TIMEOUT_SECS,
};
pub use types::SourceError;

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
