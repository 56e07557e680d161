//! Service container for dependency injection
//!
//! Wires up the clone service with its collaborators.

use std::sync::Arc;

use crate::application::services::TreeCloner;
use crate::config::Settings;
use crate::infrastructure::store::JsonFileRepository;
use crate::infrastructure::traits::{
    FileSystem, KeyGenerator, LinkRepository, RandomKeyGenerator, RealFileSystem,
};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Link persistence
    pub repository: Arc<dyn LinkRepository>,

    /// Global key source
    pub keys: Arc<dyn KeyGenerator>,
}

impl ServiceContainer {
    /// Create a container backed by the JSON store at `settings.store_path`.
    pub fn new(settings: Settings) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let repository = Arc::new(JsonFileRepository::new(settings.store_path.clone(), fs));
        Self::with_deps(settings, repository, Arc::new(RandomKeyGenerator))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        repository: Arc<dyn LinkRepository>,
        keys: Arc<dyn KeyGenerator>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            repository,
            keys,
        }
    }

    /// Clone service using the configured success policy.
    pub fn tree_cloner(&self) -> TreeCloner {
        TreeCloner::new(self.repository.clone(), self.keys.clone())
            .with_policy(self.settings.success_policy)
    }
}
