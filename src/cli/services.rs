use anyhow::Result;

use crate::core::AppConfig;
use crate::search::{SearchClient, ServiceDirectory};

pub async fn run(config: &AppConfig) -> Result<()> {
    let client = SearchClient::new(&config.search_api_url);
    let services = client.list_services().await?;
    if services.is_empty() {
        println!("No search services found.");
    }
    for service in services {
        println!("{} (column: {})", service.name, service.search_column);
    }
    Ok(())
}
