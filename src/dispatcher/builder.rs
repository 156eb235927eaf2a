//! Builder for [`Dispatcher`] instances.
//!
//! All wiring is checked here, once: every binding must name a registered
//! connector that has a mapping table for the resource type, and every
//! table must compile against the schemas. A dispatcher that builds never
//! fails a request for configuration reasons it could have caught earlier.

use super::{AllowAll, Authorizer, Dispatcher, DispatcherState};
use crate::config::AdapterConfig;
use crate::connector::{Connector, ConnectorRegistry};
use crate::error::{BuildError, BuildResult};
use crate::mapper::{MappingTable, ResourceMapper, Transform, TransformRegistry};
use crate::schema::SchemaRegistry;

use log::info;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct DispatcherBuilder {
    config: AdapterConfig,
    registry: Option<SchemaRegistry>,
    connectors: Vec<Arc<dyn Connector>>,
    transforms: Vec<Transform>,
    tables: Vec<MappingTable>,
    authorizer: Option<Arc<dyn Authorizer>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping tables in the configuration are used alongside any added
    /// with [`DispatcherBuilder::with_mapping_table`].
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// Schemas to serve. Defaults to the embedded User, Group and
    /// Enterprise User schemas.
    pub fn with_schema_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.push(connector);
        self
    }

    /// A named transform mapping table entries can refer to.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn with_mapping_table(mut self, table: MappingTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn build(self) -> BuildResult<Dispatcher> {
        self.config.validate()?;
        let registry = match self.registry {
            Some(registry) => registry,
            None => SchemaRegistry::new()?,
        };

        let mut connectors = ConnectorRegistry::new();
        for connector in self.connectors {
            connectors.register(connector)?;
        }

        let mut transforms = TransformRegistry::new();
        for transform in self.transforms {
            transforms.register(transform)?;
        }

        let mut mappers: HashMap<(String, String), Arc<ResourceMapper>> = HashMap::new();
        let tables = self.config.mapping_tables.iter().cloned().chain(self.tables);
        for table in tables {
            if !connectors.contains(&table.system) {
                return Err(BuildError::MissingConnector {
                    system: table.system.clone(),
                });
            }
            let mapper = ResourceMapper::new(table, &registry, &transforms)?;
            let resource_type = registry.resource_type(mapper.resource_type())?.name.clone();
            let key = (resource_type, mapper.system().to_string());
            if mappers.contains_key(&key) {
                return Err(BuildError::InvalidConfiguration {
                    message: format!("More than one mapping table for {} on system '{}'", key.0, key.1),
                });
            }
            mappers.insert(key, Arc::new(mapper));
        }

        for (resource_type, system) in &self.config.bindings {
            let resource_type = registry
                .resource_type(resource_type)
                .map_err(|_| BuildError::InvalidConfiguration {
                    message: format!("Binding names unknown resource type '{}'", resource_type),
                })?
                .name
                .clone();
            if !connectors.contains(system) {
                return Err(BuildError::MissingConnector {
                    system: system.clone(),
                });
            }
            if !mappers.contains_key(&(resource_type.clone(), system.clone())) {
                return Err(BuildError::MissingMapping { resource_type });
            }
        }

        info!(
            "SCIM dispatcher built with {} connector(s) [{}] and {} mapping table(s), serving {}",
            connectors.len(),
            connectors.names().join(", "),
            mappers.len(),
            self.config.base_url
        );

        Ok(Dispatcher::from_state(DispatcherState {
            config: self.config,
            registry,
            connectors,
            mappers,
            authorizer: self.authorizer.unwrap_or_else(|| Arc::new(AllowAll)),
        }))
    }
}
