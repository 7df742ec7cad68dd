pub mod memory;
pub mod pg;
pub mod postgres;
pub mod signal;
pub mod store;

pub use memory::MemoryStore;
pub use pg::PgStore;
pub use postgres::create_pool;
pub use signal::{create_redis_client, PopularitySignal, SignalWriterHandle};
pub use store::{ActivityStore, CatalogOrder, PlaceCatalog};
