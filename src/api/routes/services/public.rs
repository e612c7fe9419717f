//! Public types for the search services API
use serde::Serialize;

use crate::search::ServiceMetadata;

#[derive(Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceMetadata>,
    pub warning: Option<String>,
}
