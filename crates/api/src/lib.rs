//! HTTP layer for the beacon gate.

pub mod extractors;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;

pub use routes::router;
pub use state::{AdminAccess, AppState, ProxyTrust};
pub use store::{
    EventSink, MemoryStore, ReportKind, ReportQuery, ReportRange, ReportSource, WidgetKind,
};
