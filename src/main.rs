use std::sync::Arc;

use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use forum::openapi::ApiDoc;
use forum::repo::Repo;
use forum::{config, AppState, Settings};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping forum server");
    let settings = Settings::from_env();
    let repo = build_repo(&settings).await?;
    let openapi = ApiDoc::openapi();

    let state = web::Data::new(AppState::new(repo));
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .app_data(state.clone())
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(settings.bind_addr())
    .with_context(|| format!("bind {}:{}", settings.host, settings.port))?;

    info!("Listening on http://{}:{}", settings.host, settings.port);
    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
async fn build_repo(settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    use forum::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let Some(url) = settings.database_url.as_deref() else {
        return fallback_repo();
    };
    let pool = PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .acquire_timeout(settings.db_acquire_timeout)
        .connect_lazy(url)
        .context("create Postgres pool")?;
    let repo = PgRepo::new(pool);
    if settings.run_migrations {
        repo.migrate().await.context("run migrations")?;
        info!("Migrations applied");
    }
    info!(max_connections = settings.db_max_connections, "Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(not(feature = "postgres-store"))]
async fn build_repo(settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    if settings.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but the postgres-store feature is disabled");
    }
    fallback_repo()
}

#[cfg(feature = "inmem-store")]
fn fallback_repo() -> anyhow::Result<Arc<dyn Repo>> {
    info!("Using in-memory repository backend");
    Ok(Arc::new(forum::repo::inmem::InMemRepo::new()))
}

#[cfg(not(feature = "inmem-store"))]
fn fallback_repo() -> anyhow::Result<Arc<dyn Repo>> {
    anyhow::bail!("DATABASE_URL is required when the inmem-store feature is disabled")
}
