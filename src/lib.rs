//! Live synchronization and season-normalized aggregation for vineyard parcels.
//!
//! ```text
//!   RemoteStore ──► CollectionMirror ──► VineyardStore / ActionStore / VintageStore
//!                                                     │
//!                                                     ▼
//!                                         stats::aggregate (pure)
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod live;
pub mod mirror;
pub mod model;
pub mod paths;
pub mod remote;
pub mod render;
pub mod stats;
pub mod store;

pub use config::SyncConfig;
pub use error::StoreError;
pub use geometry::{GeometryError, Point, Polygon, Projection};
pub use live::{Live, Subscription, Update};
pub use mirror::CollectionMirror;
pub use model::{
    Action, ActionType, Document, Parcel, ParcelKey, Vintage, VintageStatus, WeatherSample,
};
pub use remote::{InMemoryRemoteStore, RemoteStore, TransportError};
pub use stats::{aggregate, Statistics, VarietyFilter};
pub use store::{last_update_date, ActionStore, VineyardStore, VintageStore};
