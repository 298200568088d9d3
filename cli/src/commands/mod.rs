pub mod config;
pub mod counting;
pub mod record;
pub mod sync;
pub mod taxon;
