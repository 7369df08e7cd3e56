//! Root and feature module wiring.
//!
//! The root module opens every configured connection and registers each one
//! under its client token. Feature registrations add one repository per
//! entity under its repository token, and may ask for the entity's index to
//! be created at startup.
//!
//! ```rust,no_run
//! use armature_elasticsearch::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Product {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Entity for Product {}
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     declare::<Product>()
//!         .document(DocumentOptions::new("products"))
//!         .field("id", FieldOptions::keyword())
//!         .field("name", FieldOptions::text());
//!
//!     let mut module = ElasticsearchModule::for_root(ElasticsearchOptions::single(
//!         ConnectionOptions::from_env(),
//!     ))?;
//!     module.feature(None).entity::<Product>().auto_create(true).register()?;
//!
//!     module.on_module_init().await?;
//!
//!     let products = module.repository::<Product>(None)?;
//!     products.index_one(&Product { id: "p1".into(), name: "Widget".into() }, Some("p1")).await?;
//!
//!     module.on_application_shutdown(None).await?;
//!     Ok(())
//! }
//! ```

use crate::{
    config::{ElasticsearchOptions, normalize_connection_name},
    connection::{ConnectionFactory, SearchConnection},
    document::Entity,
    error::{ElasticsearchError, Result},
    lifecycle::{LifecycleResult, OnApplicationShutdown, OnModuleInit},
    metadata::MetadataStore,
    provider::ProviderRegistry,
    registry::{ConnectionRegistry, ShutdownReport},
    repository::Repository,
    token::{CONNECTION_REGISTRY_TOKEN, client_token, repository_token_for},
};
use async_trait::async_trait;
use futures::future::{BoxFuture, join_all};
use std::sync::Arc;
use tracing::{debug, info, warn};

type InstallFn = fn(&ProviderRegistry, String, Arc<dyn SearchConnection>, Arc<MetadataStore>);
type ProvisionFn =
    fn(Arc<dyn SearchConnection>, Arc<MetadataStore>) -> BoxFuture<'static, Result<Option<String>>>;

fn install_repository<E: Entity>(
    providers: &ProviderRegistry,
    token: String,
    connection: Arc<dyn SearchConnection>,
    metadata: Arc<MetadataStore>,
) {
    providers.register(token, Repository::<E>::with_metadata(connection, metadata));
}

fn provision_entity<E: Entity>(
    connection: Arc<dyn SearchConnection>,
    metadata: Arc<MetadataStore>,
) -> BoxFuture<'static, Result<Option<String>>> {
    Box::pin(async move {
        let repository = Repository::<E>::with_metadata(connection, metadata);
        let Some(schema) = repository.schema() else {
            return Ok(None);
        };
        repository.ensure_index().await?;
        Ok(Some(schema.index))
    })
}

/// One entity of a feature registration.
struct FeatureEntity {
    name: &'static str,
    install: InstallFn,
    provision: ProvisionFn,
}

/// An entity whose index is created at startup.
struct AutoCreate {
    entity: &'static str,
    connection: Arc<dyn SearchConnection>,
    provision: ProvisionFn,
}

/// Elasticsearch module: connections, repositories and their lifecycle.
pub struct ElasticsearchModule {
    providers: ProviderRegistry,
    registry: Arc<ConnectionRegistry>,
    metadata: Arc<MetadataStore>,
    auto_create: Vec<AutoCreate>,
}

impl ElasticsearchModule {
    /// Open the configured connections with the `opensearch` client.
    pub fn for_root(options: ElasticsearchOptions) -> Result<Self> {
        Self::for_root_with_registry(options, ConnectionRegistry::opensearch())
    }

    /// Open the configured connections with `factory`.
    pub fn for_root_with_factory(
        options: ElasticsearchOptions,
        factory: impl ConnectionFactory + 'static,
    ) -> Result<Self> {
        Self::for_root_with_registry(options, ConnectionRegistry::new(factory))
    }

    fn for_root_with_registry(
        options: ElasticsearchOptions,
        registry: ConnectionRegistry,
    ) -> Result<Self> {
        let names = registry.configure(&options)?;
        let registry = Arc::new(registry);
        let providers = ProviderRegistry::new();

        for name in &names {
            let connection = registry.get(Some(name))?;
            providers.register(client_token(Some(name)), connection);
        }
        providers.register_arc(CONNECTION_REGISTRY_TOKEN, Arc::clone(&registry));

        info!(connections = names.len(), "Elasticsearch module configured");

        Ok(Self {
            providers,
            registry,
            metadata: MetadataStore::global(),
            auto_create: Vec::new(),
        })
    }

    /// Read declarations from `metadata` instead of the global store.
    ///
    /// Applies to features registered afterwards.
    pub fn with_metadata(mut self, metadata: Arc<MetadataStore>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Start a feature registration on the connection named `connection`.
    pub fn feature(&mut self, connection: Option<&str>) -> FeatureBuilder<'_> {
        FeatureBuilder {
            module: self,
            connection: connection.map(str::to_string),
            entities: Vec::new(),
            auto_create: false,
        }
    }

    /// Providers registered by this module.
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Connection registered under the client token of `name`.
    pub fn connection(&self, name: Option<&str>) -> Result<Arc<dyn SearchConnection>> {
        self.providers
            .resolve::<Arc<dyn SearchConnection>>(&client_token(name))
            .map(|connection| Arc::clone(&*connection))
    }

    /// Repository of `E` on the connection named `connection`.
    pub fn repository<E: Entity>(&self, connection: Option<&str>) -> Result<Arc<Repository<E>>> {
        self.providers
            .resolve::<Repository<E>>(&repository_token_for(E::entity_name(), connection))
    }

    /// Create the index of every auto-create entity.
    ///
    /// Creations run concurrently and are all awaited. Entities without a
    /// document declaration are skipped. Failures are logged and reported,
    /// never returned as an error.
    pub async fn provision(&self) -> ProvisionReport {
        let outcomes = join_all(self.auto_create.iter().map(|entry| {
            let future =
                (entry.provision)(Arc::clone(&entry.connection), Arc::clone(&self.metadata));
            async move { (entry.entity, future.await) }
        }))
        .await;

        let mut report = ProvisionReport::default();
        for (entity, outcome) in outcomes {
            match outcome {
                Ok(Some(index)) => {
                    debug!(entity = entity, index = %index, "Index provisioned");
                    report.ensured.push(index);
                }
                Ok(None) => {
                    debug!(entity = entity, "No document declaration, skipped");
                    report.skipped.push(entity.to_string());
                }
                Err(err) => {
                    warn!(entity = entity, error = %err, "Failed to provision index");
                    report.failed.push((entity.to_string(), err));
                }
            }
        }

        info!(
            ensured = report.ensured.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Index provisioning finished"
        );
        report
    }

    /// Close every connection.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.registry.dispose_all().await
    }
}

impl std::fmt::Debug for ElasticsearchModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchModule")
            .field("providers", &self.providers)
            .field("auto_create", &self.auto_create.len())
            .finish()
    }
}

#[async_trait]
impl OnModuleInit for ElasticsearchModule {
    async fn on_module_init(&self) -> LifecycleResult {
        self.provision().await;
        Ok(())
    }
}

#[async_trait]
impl OnApplicationShutdown for ElasticsearchModule {
    async fn on_application_shutdown(&self, signal: Option<String>) -> LifecycleResult {
        debug!(signal = ?signal, "Shutting down Elasticsearch module");
        self.shutdown().await;
        Ok(())
    }
}

/// Registers repositories for a set of entities on one connection.
pub struct FeatureBuilder<'a> {
    module: &'a mut ElasticsearchModule,
    connection: Option<String>,
    entities: Vec<FeatureEntity>,
    auto_create: bool,
}

impl FeatureBuilder<'_> {
    /// Add a repository for `E`.
    pub fn entity<E: Entity>(mut self) -> Self {
        self.entities.push(FeatureEntity {
            name: E::entity_name(),
            install: install_repository::<E>,
            provision: provision_entity::<E>,
        });
        self
    }

    /// Create the indices of this feature's entities at startup.
    pub fn auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    /// Register the repositories; returns their tokens.
    ///
    /// Fails when the connection was never configured.
    pub fn register(self) -> Result<Vec<String>> {
        let connection_name = self.connection.as_deref();
        let connection = self.module.registry.get(connection_name)?;
        let metadata = Arc::clone(&self.module.metadata);

        let mut tokens = Vec::with_capacity(self.entities.len());
        for entity in self.entities {
            let token = repository_token_for(entity.name, connection_name);
            (entity.install)(
                &self.module.providers,
                token.clone(),
                Arc::clone(&connection),
                Arc::clone(&metadata),
            );

            if self.auto_create {
                self.module.auto_create.push(AutoCreate {
                    entity: entity.name,
                    connection: Arc::clone(&connection),
                    provision: entity.provision,
                });
            }
            tokens.push(token);
        }

        debug!(
            connection = %normalize_connection_name(connection_name),
            repositories = ?tokens,
            "Feature registered"
        );
        Ok(tokens)
    }
}

/// Outcome of startup index provisioning.
#[derive(Debug, Default)]
pub struct ProvisionReport {
    /// Indices created or found already present.
    pub ensured: Vec<String>,
    /// Entities without a document declaration.
    pub skipped: Vec<String>,
    /// Entities whose index creation failed.
    pub failed: Vec<(String, ElasticsearchError)>,
}

impl ProvisionReport {
    /// Whether no creation failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
