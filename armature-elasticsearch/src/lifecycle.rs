//! Startup and shutdown hooks.
//!
//! The host calls [`OnModuleInit::on_module_init`] once every provider is
//! registered and [`OnApplicationShutdown::on_application_shutdown`] once
//! while shutting down.

use async_trait::async_trait;

/// Error type for lifecycle hooks.
pub type LifecycleResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Hook called after the module's providers are registered.
#[async_trait]
pub trait OnModuleInit: Send + Sync {
    /// Called once the module has been initialized.
    async fn on_module_init(&self) -> LifecycleResult;
}

/// Hook called during application shutdown.
#[async_trait]
pub trait OnApplicationShutdown: Send + Sync {
    /// Called when the application is shutting down.
    async fn on_application_shutdown(&self, signal: Option<String>) -> LifecycleResult;
}
