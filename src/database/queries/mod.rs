pub mod schema_elements;
pub mod sqldb;
pub mod thothlog;
pub mod vectordb;
pub mod workspace;
