use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;
use crate::gateway::{KhaltiClient, PaymentGateway};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub public_url: String,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");

        let gateway = KhaltiClient::new(&config.khalti_base_url, &config.khalti_secret_key)?;

        Ok(Self {
            pool,
            gateway: Arc::new(gateway),
            jwt_secret: config.jwt_secret.clone(),
            frontend_url: config.frontend_url.clone(),
            public_url: config.public_url.clone(),
        })
    }
}
