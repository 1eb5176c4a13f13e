pub mod metrics;
pub mod export;
pub mod params;
