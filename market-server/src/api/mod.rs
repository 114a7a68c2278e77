//! API routes for market-server

pub mod account;
pub mod analytics;
pub mod auth;
pub mod health;
pub mod images;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod stripe_webhook;
pub mod subscriptions;

use axum::routing::{get, post, put};
use axum::{Router, middleware};

use crate::auth::rate_limit;
use crate::auth::user_auth::user_auth_middleware;
use crate::state::AppState;

pub type ApiResult<T> = Result<axum::Json<T>, shared::error::AppError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Registration (rate limited, stricter)
    let register = Router::new()
        .route("/api/auth/register", post(auth::register))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::register_rate_limit,
        ));

    // Login and password reset (rate limited)
    let login = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::login_rate_limit,
        ));

    // Public catalog and reviews
    let catalog = Router::new()
        .route("/api/products", get(products::list_products))
        .route("/api/products/featured", get(products::list_featured))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/reviews/product/{id}", get(reviews::list_product_reviews))
        .route("/api/subscriptions/plans", get(subscriptions::list_plans));

    // Stripe webhook (signature-verified, raw body)
    let webhook = Router::new().route(
        "/api/payments/webhook",
        post(stripe_webhook::handle_webhook),
    );

    // Payment intent creation carries its own rate limit on top of auth
    let payment_intent = Router::new()
        .route("/api/payments/create-intent", post(payments::create_intent))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::payment_rate_limit,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            user_auth_middleware,
        ));

    // Everything else requires a bearer token
    let protected = Router::new()
        // Account
        .route(
            "/api/users/me",
            get(account::get_profile).put(account::update_profile),
        )
        .route("/api/users/me/password", put(account::change_password))
        .route("/api/users/me/audit-log", get(account::audit_log))
        // Listings (seller)
        .route("/api/products", post(products::create_product))
        .route("/api/products/mine", get(products::my_products))
        .route(
            "/api/products/{id}",
            put(products::update_product).delete(products::delete_product),
        )
        .route(
            "/api/products/images",
            post(images::upload_image)
                .layer(axum::extract::DefaultBodyLimit::max(12 * 1024 * 1024)),
        )
        .route("/api/products/images/{hash}", get(images::get_image_url))
        // Orders
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/mine", get(orders::my_orders))
        .route("/api/orders/seller", get(orders::seller_orders))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/pay", put(orders::pay_order))
        .route("/api/orders/{id}/ship", put(orders::ship_order))
        .route("/api/orders/{id}/deliver", put(orders::deliver_order))
        .route("/api/orders/{id}/cancel", put(orders::cancel_order))
        // Payments
        .route("/api/payments/{id}", get(payments::get_payment))
        .route("/api/payments/{id}/refund", post(payments::refund_payment))
        // Subscriptions
        .route("/api/subscriptions/checkout", post(subscriptions::create_checkout))
        .route(
            "/api/subscriptions/current",
            get(subscriptions::current_subscription)
                .delete(subscriptions::cancel_subscription),
        )
        .route("/api/subscriptions/portal", post(subscriptions::billing_portal))
        // Reviews
        .route("/api/reviews", post(reviews::create_review))
        // Analytics
        .route("/api/analytics/seller", get(analytics::seller_analytics))
        .route("/api/analytics/buyer", get(analytics::buyer_analytics))
        .route("/api/analytics/platform", get(analytics::platform_analytics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            user_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(register)
        .merge(login)
        .merge(catalog)
        .merge(webhook)
        .merge(payment_intent)
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Clamp pagination query params the same way everywhere
pub fn page_params(page: Option<i32>, per_page: Option<i32>, default_per_page: i32) -> (i32, i32, i32) {
    let per_page = per_page.unwrap_or(default_per_page).clamp(1, 100);
    let page = page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;
    (page, per_page, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_clamping() {
        assert_eq!(page_params(None, None, 20), (1, 20, 0));
        assert_eq!(page_params(Some(3), Some(10), 20), (3, 10, 20));
        assert_eq!(page_params(Some(0), Some(500), 20), (1, 100, 0));
        assert_eq!(page_params(Some(-5), Some(0), 20), (1, 1, 0));
    }
}
