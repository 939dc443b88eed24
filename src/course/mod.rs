pub mod course_dto;
pub mod course_handlers;
pub mod course_models;
pub mod course_repository;
pub mod routes;

pub use course_repository::{CatalogRepository, PgCatalogRepository};
