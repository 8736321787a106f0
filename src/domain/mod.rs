// Domain layer - Value types with no I/O
pub mod chart;
pub mod error;
pub mod export;
pub mod observation;
pub mod stream;
pub mod time_range;
