pub mod bestsellers;
pub mod catalog;
#[cfg(test)]
pub(crate) mod stub;

pub use bestsellers::{BestsellerClient, BestsellerError, BestsellerSource};
pub use catalog::{CatalogClient, CatalogError, CatalogQuery, CatalogSearch, CatalogVolume};
