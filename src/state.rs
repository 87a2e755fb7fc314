use std::sync::Arc;
use std::time::Duration;

use crate::api::middleware::RateLimiter;
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    BackgroundTasks, Mailer, MovieService, RetryingMailer, SeaOrmMovieService,
    SeaOrmTokenService, SeaOrmUserService, TokenService, UserService, mailer,
};

const MAIL_ATTEMPTS: u32 = 3;
const MAIL_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub background: BackgroundTasks,

    pub rate_limiter: Arc<RateLimiter>,

    pub token_service: Arc<dyn TokenService>,

    pub user_service: Arc<dyn UserService>,

    pub movie_service: Arc<dyn MovieService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        let store = Store::connect(&config.database).await?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Store) -> anyhow::Result<Self> {
        let rate_limiter = Arc::new(RateLimiter::new(&config.limiter)?);
        let background = BackgroundTasks::new();

        let mailer: Arc<dyn Mailer> = Arc::new(RetryingMailer::new(
            mailer::from_config(&config.smtp)?,
            MAIL_ATTEMPTS,
            MAIL_RETRY_DELAY,
        ));

        let token_service: Arc<dyn TokenService> =
            Arc::new(SeaOrmTokenService::new(store.clone()));

        let user_service: Arc<dyn UserService> = Arc::new(SeaOrmUserService::new(
            store.clone(),
            token_service.clone(),
            mailer,
            background.clone(),
            config.security.clone(),
        ));

        let movie_service: Arc<dyn MovieService> =
            Arc::new(SeaOrmMovieService::new(store.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            background,
            rate_limiter,
            token_service,
            user_service,
            movie_service,
        })
    }
}
