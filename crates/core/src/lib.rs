pub mod domain;
pub mod error;
pub mod listings;
pub mod ranking;
pub mod seed;
pub mod storage;

pub mod config {
    use anyhow::Context;

    const DEFAULT_PORT: u16 = 3000;
    const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    const DEFAULT_BEST_SELLERS_LIMIT: usize = 5;
    const DEFAULT_LISTING_MAX_LIMIT: usize = 50;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub port: u16,
        pub database_max_connections: u32,
        /// Size of the best-sellers list when the caller does not pass `limit`.
        pub best_sellers_limit: usize,
        /// Upper bound applied to any caller-supplied `limit`.
        pub listing_max_limit: usize,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                database_url: None,
                sentry_dsn: None,
                port: DEFAULT_PORT,
                database_max_connections: DEFAULT_MAX_CONNECTIONS,
                best_sellers_limit: DEFAULT_BEST_SELLERS_LIMIT,
                listing_max_limit: DEFAULT_LISTING_MAX_LIMIT,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();
            let settings = Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                port: parse_env("PORT")?.unwrap_or(defaults.port),
                database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or(defaults.database_max_connections),
                best_sellers_limit: parse_env("BEST_SELLERS_LIMIT")?
                    .unwrap_or(defaults.best_sellers_limit),
                listing_max_limit: parse_env("LISTING_MAX_LIMIT")?
                    .unwrap_or(defaults.listing_max_limit),
            };

            anyhow::ensure!(
                settings.best_sellers_limit >= 1,
                "BEST_SELLERS_LIMIT must be >= 1"
            );
            anyhow::ensure!(
                settings.listing_max_limit >= settings.best_sellers_limit,
                "LISTING_MAX_LIMIT must be >= BEST_SELLERS_LIMIT ({} < {})",
                settings.listing_max_limit,
                settings.best_sellers_limit
            );

            Ok(settings)
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }
    }

    fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match std::env::var(key) {
            Ok(s) => {
                let v = s
                    .trim()
                    .parse::<T>()
                    .with_context(|| format!("{key} is not valid (got {s:?})"))?;
                Ok(Some(v))
            }
            Err(_) => Ok(None),
        }
    }

}
