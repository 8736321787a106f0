// Application layer - Use cases over the injected transport
pub mod export_service;
pub mod formatter;
pub mod request;
pub mod series_builder;
pub mod stream_aggregator;
