//! Construction of every entity and relationship service from configuration.

use crate::base::{BaseService, EntitySchema};
use crate::entities::{
    junctions, Cursos, Entrevistas, HistoriasOrales, Noticias, OfertasLaborales, Organizaciones,
    Personas, Proyectos, Temas,
};
use crate::relationship::RelationshipService;
use comunidad_cache::{
    CacheClient, CacheHealthCheck, CacheService, CacheStore, CacheableConfig, CacheableService,
    InvalidationListener,
};
use comunidad_config::{AppConfig, CacheConfig};
use comunidad_core::{ComunidadResult, HealthCheck, HealthStatus};
use comunidad_repository::{BackingStore, DatabasePool, PgStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

fn entity_service<S: EntitySchema>(
    store: &Arc<dyn BackingStore>,
    cache: &CacheService,
    config: &CacheConfig,
) -> BaseService<S> {
    let mut settings = CacheableConfig::new(S::ENTITY_TYPE, config.ttl(S::TTL_PRESET))
        .with_stats_ttl(config.short_ttl());
    if !config.enabled {
        settings = settings.disabled();
    }
    BaseService::with_cacheable(Arc::clone(store), CacheableService::new(cache.clone(), settings))
}

/// All services sharing one backing store and one cache store.
pub struct Services {
    pub cache: CacheService,
    pub cache_health: Arc<CacheHealthCheck>,

    pub personas: BaseService<Personas>,
    pub organizaciones: BaseService<Organizaciones>,
    pub temas: BaseService<Temas>,
    pub proyectos: BaseService<Proyectos>,
    pub entrevistas: BaseService<Entrevistas>,
    pub noticias: BaseService<Noticias>,
    pub cursos: BaseService<Cursos>,
    pub historias_orales: BaseService<HistoriasOrales>,
    pub ofertas_laborales: BaseService<OfertasLaborales>,

    pub persona_tema: RelationshipService,
    pub proyecto_persona: RelationshipService,
    pub proyecto_tema: RelationshipService,
    pub organizacion_persona: RelationshipService,

    client: Option<Arc<CacheClient>>,
    pool: Option<DatabasePool>,
    listener: Option<JoinHandle<()>>,
}

impl Services {
    /// Wires services over already constructed stores. No listener is started.
    #[must_use]
    pub fn from_stores(
        store: Arc<dyn BackingStore>,
        cache_store: Arc<dyn CacheStore>,
        config: &CacheConfig,
    ) -> Self {
        let cache = CacheService::new(Arc::clone(&cache_store), config);
        let relationship = |junction| RelationshipService::new(Arc::clone(&store), junction);

        Self {
            cache_health: Arc::new(CacheHealthCheck::new(cache_store, config)),
            personas: entity_service(&store, &cache, config),
            organizaciones: entity_service(&store, &cache, config),
            temas: entity_service(&store, &cache, config),
            proyectos: entity_service(&store, &cache, config),
            entrevistas: entity_service(&store, &cache, config),
            noticias: entity_service(&store, &cache, config),
            cursos: entity_service(&store, &cache, config),
            historias_orales: entity_service(&store, &cache, config),
            ofertas_laborales: entity_service(&store, &cache, config),
            persona_tema: relationship(junctions::persona_tema()),
            proyecto_persona: relationship(junctions::proyecto_persona()),
            proyecto_tema: relationship(junctions::proyecto_tema()),
            organizacion_persona: relationship(junctions::organizacion_persona()),
            cache,
            client: None,
            pool: None,
            listener: None,
        }
    }

    /// Connects PostgreSQL and Redis and starts the invalidation listener.
    ///
    /// A database failure is fatal. A Redis failure is logged and the
    /// services run uncached while the client retries the connection on
    /// later commands. The listener keeps trying to subscribe meanwhile.
    pub async fn connect(config: &AppConfig) -> ComunidadResult<Self> {
        let pool = DatabasePool::new(&config.database).await?;
        let store: Arc<dyn BackingStore> = Arc::new(PgStore::from_config(&pool, &config.database));

        let client = Arc::new(CacheClient::new(&config.redis)?);
        let connected = match client.connect().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache unavailable, continuing without it: {}", e);
                false
            }
        };

        let mut services = Self::from_stores(store, client.clone(), &config.cache);
        if config.cache.enabled {
            let listener =
                InvalidationListener::new(services.cache.clone()).with_backoff(client.retry_policy());
            services.listener = Some(if connected {
                match listener.clone().start().await {
                    Ok(handle) => handle,
                    Err(e) => {
                        warn!("Failed to start cache invalidation listener: {}", e);
                        listener.spawn()
                    }
                }
            } else {
                listener.spawn()
            });
        }
        services.client = Some(client);
        services.pool = Some(pool);

        info!(
            app = %config.app.name,
            environment = %config.app.environment,
            cache_connected = connected,
            "Services ready"
        );
        Ok(services)
    }

    /// True while a listener task is applying published invalidations.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Status of every external dependency, keyed by component name.
    pub async fn health(&self) -> Vec<(String, HealthStatus)> {
        let mut statuses = vec![(
            self.cache_health.name().to_string(),
            self.cache_health.check().await,
        )];
        if let Some(pool) = &self.pool {
            let status = match pool.health_check().await {
                Ok(()) => HealthStatus::Healthy,
                Err(e) => HealthStatus::Unhealthy(e.to_string()),
            };
            statuses.push(("database".to_string(), status));
        }
        statuses
    }

    /// Stops the listener and closes both connections.
    pub async fn shutdown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(client) = self.client.take() {
            client.disconnect().await;
        }
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        info!("Services shut down");
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("cache", &self.cache)
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CreateTema;
    use comunidad_cache::InMemoryCacheStore;
    use comunidad_core::EntityType;
    use comunidad_repository::InMemoryStore;

    #[tokio::test]
    async fn test_services_share_the_cache() {
        let cache_store = Arc::new(InMemoryCacheStore::new());
        let services = Services::from_stores(
            Arc::new(InMemoryStore::new()),
            cache_store.clone(),
            &CacheConfig::default(),
        );

        assert_eq!(services.temas.entity_type(), EntityType::Tema);
        assert_eq!(services.historias_orales.entity_type(), EntityType::HistoriaOral);

        let tema = services.temas.create(CreateTema::new("Agroecología")).await.unwrap();
        assert!(cache_store
            .exists(&format!("comunidad:tema:{}", tema.id))
            .await
            .unwrap());
        assert!(!services.is_listening());

        let health = services.health().await;
        assert_eq!(health.len(), 1);
        assert_eq!(health[0], ("cache".to_string(), HealthStatus::Healthy));
    }

    #[tokio::test]
    async fn test_disabled_cache_config_skips_writes() {
        let cache_store = Arc::new(InMemoryCacheStore::new());
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let services = Services::from_stores(Arc::new(InMemoryStore::new()), cache_store.clone(), &config);

        services.temas.create(CreateTema::new("Agroecología")).await.unwrap();
        assert!(cache_store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_use_the_short_ttl() {
        let cache_store = Arc::new(InMemoryCacheStore::new());
        let config = CacheConfig::default();
        let services = Services::from_stores(Arc::new(InMemoryStore::new()), cache_store.clone(), &config);

        let tema = services.temas.create(CreateTema::new("Agroecología")).await.unwrap();
        services.temas.get_stats().await.unwrap();
        assert!(cache_store.exists("comunidad:tema:stats").await.unwrap());

        tokio::time::advance(config.short_ttl() + std::time::Duration::from_secs(1)).await;
        assert!(!cache_store.exists("comunidad:tema:stats").await.unwrap());
        assert!(cache_store
            .exists(&format!("comunidad:tema:{}", tema.id))
            .await
            .unwrap());
    }

    #[test]
    fn test_entity_ttl_follows_schema_preset() {
        let services = Services::from_stores(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryCacheStore::new()),
            &CacheConfig::default(),
        );

        assert_eq!(services.temas.cacheable().ttl(), std::time::Duration::from_secs(300));
        assert_eq!(
            services.historias_orales.cacheable().ttl(),
            std::time::Duration::from_secs(3600)
        );
    }
}
