// Application layer - Use cases and repository seams
pub mod day_series_store;
pub mod portal_repository;
