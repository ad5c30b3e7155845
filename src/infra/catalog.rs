use std::sync::Arc;

use tracing::info;

use crate::application::repos::CatalogStore;
use crate::config::{CatalogSettings, CatalogSource};

use super::{db::PostgresCatalog, error::InfraError, rest::RestCatalog};

/// Build the configured catalog store adapter.
pub fn connect(settings: &CatalogSettings) -> Result<Arc<dyn CatalogStore>, InfraError> {
    match &settings.source {
        CatalogSource::Postgres {
            url,
            max_connections,
        } => {
            let pool = PostgresCatalog::connect_lazy(
                url,
                max_connections.get(),
                settings.request_timeout,
            )
            .map_err(|err| InfraError::catalog(format!("invalid database url: {err}")))?;
            info!(
                target = "playshelf::catalog",
                backend = "postgres",
                max_connections = max_connections.get(),
                "catalog store configured"
            );
            Ok(Arc::new(PostgresCatalog::new(pool)))
        }
        CatalogSource::Rest { endpoint, api_key } => {
            let catalog = RestCatalog::new(endpoint, api_key.clone(), settings.request_timeout)
                .map_err(|err| InfraError::catalog(err.to_string()))?;
            info!(
                target = "playshelf::catalog",
                backend = "rest",
                endpoint = %endpoint,
                "catalog store configured"
            );
            Ok(Arc::new(catalog))
        }
    }
}
