//! Server configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// JWT secret for user authentication
    pub jwt_secret: String,
    /// Khalti ePayment secret key
    pub khalti_secret_key: String,
    /// Khalti ePayment API base URL
    pub khalti_base_url: String,
    /// Storefront base URL for payment-verification redirects
    pub frontend_url: String,
    /// Externally reachable base URL of this service, used as the gateway return URL
    pub public_url: String,
    /// Seconds between settlement-reconciler passes
    pub reconcile_interval_secs: u64,
    /// Minutes after which a pending gateway order is considered stale
    pub reconcile_stale_after_mins: i64,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            khalti_secret_key: Self::require_secret("KHALTI_SECRET_KEY", &environment)?,
            khalti_base_url: std::env::var("KHALTI_BASE_URL")
                .unwrap_or_else(|_| "https://dev.khalti.com/api/v2".into()),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            public_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            reconcile_interval_secs: std::env::var("RECONCILE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            reconcile_stale_after_mins: std::env::var("RECONCILE_STALE_AFTER_MINS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            environment,
        })
    }
}
