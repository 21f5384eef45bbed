// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod enlighten_portal;
pub mod payload_mapper;
pub mod persistence;
