pub mod checkpoint_persistence;
pub mod historical_data;
pub mod host;
pub mod observability;
pub mod repositories;

pub use checkpoint_persistence::JsonCheckpointStore;
pub use historical_data::CsvHistoricalDataStore;
pub use host::FileStrategyHost;
pub use repositories::InMemoryCheckpointRepository;
