pub mod repo;
pub mod sheets;
