// Optimization domain: bounds, checkpoints, status
pub mod optimization;

// Trade statistics
pub mod performance;

// Port interfaces
pub mod ports;

// Repository traits
pub mod repositories;

// Historical trade and candle records
pub mod trading;

// Domain-specific error types
pub mod errors;
