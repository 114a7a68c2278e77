//! Marketplace server configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Marketplace server configuration
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
    /// Platform commission on item subtotals, percent (e.g. 10 = 10%)
    pub platform_commission: f64,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Stripe Price IDs for seller subscription plans (monthly)
    pub stripe_basic_price_id: String,
    pub stripe_premium_price_id: String,
    pub stripe_enterprise_price_id: String,
    /// URL to redirect after successful subscription checkout
    pub checkout_success_url: String,
    /// URL to redirect after cancelled subscription checkout
    pub checkout_cancel_url: String,
    /// SES sender email address
    pub ses_from_email: String,
    /// S3 bucket for product images
    pub image_s3_bucket: String,
    /// Rate limit window (seconds) and ceiling for auth/payment routes
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_requests: u32,
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

        let platform_commission = std::env::var("PLATFORM_COMMISSION")
            .ok()
            .and_then(|p| p.parse::<f64>().ok())
            .unwrap_or(10.0);
        if !(0.0..=100.0).contains(&platform_commission) {
            return Err(format!(
                "PLATFORM_COMMISSION must be a percentage in [0, 100], got {platform_commission}"
            )
            .into());
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            platform_commission,
            stripe_secret_key: Self::require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: Self::require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            stripe_basic_price_id: std::env::var("STRIPE_BASIC_PRICE_ID")
                .unwrap_or_else(|_| "price_basic".into()),
            stripe_premium_price_id: std::env::var("STRIPE_PREMIUM_PRICE_ID")
                .unwrap_or_else(|_| "price_premium".into()),
            stripe_enterprise_price_id: std::env::var("STRIPE_ENTERPRISE_PRICE_ID")
                .unwrap_or_else(|_| "price_enterprise".into()),
            checkout_success_url: std::env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "https://zerowaste.market/subscription/success".into()),
            checkout_cancel_url: std::env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "https://zerowaste.market/pricing".into()),
            ses_from_email: std::env::var("SES_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@zerowaste.market".into()),
            image_s3_bucket: std::env::var("IMAGE_S3_BUCKET")
                .unwrap_or_else(|_| "zerowaste-product-images".into()),
            rate_limit_window_secs: std::env::var("RATE_LIMIT_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        })
    }

    /// Commission as a fraction in [0, 1]
    pub fn commission_rate(&self) -> f64 {
        self.platform_commission / 100.0
    }
}
