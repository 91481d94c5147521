//! Authenticated request dispatch.
//!
//! [`HttpDispatcher`] owns the send pipeline: precondition checks, header
//! construction, transport execution, the single CSRF retry, and routing of
//! failed responses through [`verify::translate`].

pub mod auth;
pub mod dispatch;
pub mod mock;
pub mod request;
pub mod transport;
pub mod verify;

pub use auth::{AuthMode, API_KEY_HEADER, AUTH_COOKIE, CSRF_HEADER};
pub use dispatch::HttpDispatcher;
pub use request::{ApiRequest, HostSelection, RequestBody};
pub use transport::{ClientPool, OutboundRequest, RawResponse, ReqwestTransport, Transport};
