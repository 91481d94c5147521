//! Shared plumbing for Roblox web API clients.
//!
//! - [`HttpDispatcher`]: authenticated dispatch with one reactive CSRF retry
//! - [`verify`](http::verify): local preconditions and failure translation
//! - [`EntityRegistry`] / [`EntityPool`]: one in-memory instance per (type, id)
//! - [`LazyRef`]: deferred, memoized resolution of an entity by id
//! - [`Page`]: cursor pagination and fixed page sizes
//!
//! Entity types live outside this crate and plug in through [`Entity`],
//! [`FromId`] and [`Refresh`].

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod http;
pub mod lazy;
pub mod logging;
pub mod page;
pub mod pool;
pub mod session;
pub mod util;

pub use config::ClientConfig;
pub use context::ApiContext;
pub use entity::{attach_and_refresh, Entity, FromId, Refresh, SessionSlot};
pub use error::{ErrorKind, HttpFailure, RbxError, Result};
pub use http::{ApiRequest, AuthMode, HttpDispatcher, RawResponse, Transport};
pub use lazy::LazyRef;
pub use logging::setup_tracing;
pub use page::{collect_all, fetch_page, stream_pages, CursorQuery, FixedLimit, Page, SortOrder};
pub use pool::{EntityPool, EntityRegistry};
pub use session::{Identity, Secret, Session};
