//! HTTP layer: request descriptors, transports and the retrying pipeline
//!
//! Every call made through [`Client`](crate::Client) becomes a
//! [`RequestDescriptor`] that the [`Pipeline`] dispatches over a
//! [`Transport`], classifying each outcome and retrying, refreshing or
//! terminating as the policy dictates.

pub use pipeline::Pipeline;
pub use request::{CancelHandle, RequestDescriptor, RequestOptions};
pub(crate) use request::parse_header;
pub use response::{ApiResponse, Response};
pub use transport::{Outcome, ReqwestTransport, Transport, TransportError};

mod pipeline;
mod request;
mod response;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export HTTP types from the http crate for convenience
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
