//! Application state for market-server

use aws_sdk_s3::Client as S3Client;
use aws_sdk_sesv2::Client as SesClient;
use sqlx::PgPool;

use crate::config::Config;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stripe configuration carried in state
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub basic_price_id: String,
    pub premium_price_id: String,
    pub enterprise_price_id: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// AWS SES client for transactional email
    pub ses: SesClient,
    /// SES sender email address
    pub ses_from_email: String,
    /// AWS S3 client (product images)
    pub s3: S3Client,
    /// S3 bucket for product images
    pub image_s3_bucket: String,
    /// Stripe keys and plan price ids
    pub stripe: StripeConfig,
    /// URL to redirect after successful subscription checkout
    pub checkout_success_url: String,
    /// URL to redirect after cancelled subscription checkout
    pub checkout_cancel_url: String,
    /// JWT secret for user authentication
    pub jwt_secret: String,
    /// Platform commission as a fraction in [0, 1]
    pub commission_rate: f64,
    /// Rate limiter for auth/payment routes
    pub rate_limiter: crate::auth::rate_limit::RateLimiter,
    /// Rate limit window/ceiling for auth routes
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_requests: u32,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let s3 = S3Client::new(&aws_config);

        let ses = if let Ok(ses_region) = std::env::var("SES_REGION") {
            let ses_config = aws_config
                .to_builder()
                .region(aws_config::Region::new(ses_region))
                .build();
            SesClient::new(&ses_config)
        } else {
            SesClient::new(&aws_config)
        };

        Ok(Self {
            pool,
            ses,
            ses_from_email: config.ses_from_email.clone(),
            s3,
            image_s3_bucket: config.image_s3_bucket.clone(),
            stripe: StripeConfig {
                secret_key: config.stripe_secret_key.clone(),
                webhook_secret: config.stripe_webhook_secret.clone(),
                basic_price_id: config.stripe_basic_price_id.clone(),
                premium_price_id: config.stripe_premium_price_id.clone(),
                enterprise_price_id: config.stripe_enterprise_price_id.clone(),
            },
            checkout_success_url: config.checkout_success_url.clone(),
            checkout_cancel_url: config.checkout_cancel_url.clone(),
            jwt_secret: config.jwt_secret.clone(),
            commission_rate: config.commission_rate(),
            rate_limiter: crate::auth::rate_limit::RateLimiter::new(),
            rate_limit_window_secs: config.rate_limit_window_secs,
            rate_limit_max_requests: config.rate_limit_max_requests,
        })
    }
}
