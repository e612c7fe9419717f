//! Adapters for the document search backend.
mod catalog;
mod client;
pub use catalog::{CatalogSnapshot, ServiceCatalog};
pub use client::{Retriever, SearchClient, ServiceDirectory, ServiceMetadata};
