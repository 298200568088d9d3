#![deny(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

pub mod codec;
pub mod error;
pub mod nomenclature;
pub mod property;
pub mod record;
pub mod remote;
pub mod settings;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use error::{Error, Result};
pub use nomenclature::{
    apply_default_values, resolve_labels, InMemoryNomenclatures, NomenclatureLookup,
    NomenclatureValue,
};
pub use property::{Properties, PropertyValue};
pub use record::{
    CountingRecord, Geometry, ObservationRecord, Status, Taxon, TaxonRecord, Taxonomy,
};
pub use remote::{HttpOcctaxApi, OcctaxApi, RemoteClient, RetryConfig};
pub use settings::{AppSettings, DateSetting, DateSettings, SyncSettings};
pub use store::LocalStore;
pub use sync::{SyncEngine, SyncFailure, SyncProgress, SyncReport};
