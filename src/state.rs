use std::sync::Arc;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{MemoryUserStore, PgUserStore, UserStore};
use crate::config::{AppConfig, JwtConfig, MailConfig, OtpConfig};
use crate::db;
use crate::notify::{self, LogNotifier, Notifier};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let users = match &config.database_url {
            Some(url) => Arc::new(PgUserStore::new(db::connect(url).await?)) as Arc<dyn UserStore>,
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory user store");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };
        let notifier = notify::from_config(&config.mail);

        Ok(Self::from_parts(Arc::new(config), users, notifier))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            jwt: JwtKeys::from_config(&config.jwt),
            config,
            users,
            notifier,
        }
    }

    /// Config suitable for tests: in-memory everything, fixed secret.
    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 7 * 24 * 60,
            },
            otp: OtpConfig::default(),
            mail: MailConfig {
                sender: "no-reply@test.local".into(),
                api_url: None,
                api_key: None,
            },
            production: false,
            cors_origin: "http://localhost:5173".into(),
        }
    }

    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(Self::test_config()),
            Arc::new(MemoryUserStore::new()),
            Arc::new(LogNotifier),
        )
    }
}
