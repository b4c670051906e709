pub mod dao;
#[cfg(test)]
pub(crate) mod memory;
pub mod models;
pub mod pg;
pub mod tables;

pub use dao::ExploreStore;
pub use pg::PgExploreStore;
pub use tables::TableSet;
