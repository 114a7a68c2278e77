//! Order endpoints: placement, listing, payment confirmation, fulfillment

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{OrderStatus, PaymentMethod, ShippingAddress};

use crate::auth::UserIdentity;
use crate::db;
use crate::db::orders::{NewOrderItem, Order, OrderItem, PaymentOutcome};
use crate::money;
use crate::state::AppState;

use super::ApiResult;

#[derive(serde::Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

async fn load_detail(state: &AppState, order: Order) -> Result<OrderDetail, AppError> {
    let items = db::orders::items(&state.pool, &order.id)
        .await
        .map_err(|e| {
            tracing::error!("Order items query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    Ok(OrderDetail { order, items })
}

/// POST /api/orders
#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    /// Buyer-selected shipping option; item prices come from the listings
    pub shipping_price: f64,
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<OrderDetail> {
    if req.items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }
    if !req.shipping_address.is_complete() {
        return Err(AppError::validation("Shipping address is incomplete")
            .with_detail("field", "shipping_address"));
    }
    let payment_method = PaymentMethod::from_db(&req.payment_method).ok_or_else(|| {
        AppError::validation(format!("Unknown payment method: {}", req.payment_method))
    })?;

    // Price every line from the server-side listing; never trust client prices
    let mut seller_id: Option<String> = None;
    let mut lines: Vec<(f64, i32)> = Vec::with_capacity(req.items.len());
    let mut items: Vec<NewOrderItem> = Vec::with_capacity(req.items.len());
    let mut total_waste = 0.0;
    let mut total_co2 = 0.0;

    for item in &req.items {
        money::validate_quantity(item.quantity)?;

        let product = db::products::find_by_id(&state.pool, &item.product_id)
            .await
            .map_err(|e| {
                tracing::error!("Product query error: {e}");
                AppError::new(ErrorCode::InternalError)
            })?
            .ok_or_else(|| {
                AppError::new(ErrorCode::ProductNotFound)
                    .with_detail("product_id", item.product_id.clone())
            })?;

        let status = shared::models::ProductStatus::from_db(&product.status);
        if !status.is_some_and(|s| s.is_purchasable()) {
            return Err(AppError::new(ErrorCode::ProductNotActive)
                .with_detail("product_id", product.id.clone()));
        }
        // Soft check; the authoritative guard is the decrement at confirmation
        if product.stock < item.quantity {
            return Err(AppError::new(ErrorCode::ProductOutOfStock)
                .with_detail("product_id", product.id.clone())
                .with_detail("stock", product.stock));
        }

        // One order, one seller
        match &seller_id {
            None => seller_id = Some(product.seller_id.clone()),
            Some(s) if *s != product.seller_id => {
                return Err(AppError::new(ErrorCode::OrderMixedSellers)
                    .with_detail("product_id", product.id.clone()));
            }
            Some(_) => {}
        }

        let waste = money::line_impact(product.waste_per_unit, item.quantity);
        let co2 = money::line_impact(product.co2_per_unit, item.quantity);
        total_waste += waste;
        total_co2 += co2;

        lines.push((product.discounted_price, item.quantity));
        items.push(NewOrderItem {
            product_id: product.id.clone(),
            title: product.title.clone(),
            quantity: item.quantity,
            price: product.discounted_price,
            image: product.images.as_array().and_then(|a| {
                a.first().and_then(|v| v.as_str()).map(String::from)
            }),
            waste_reduced: waste,
            co2_saved: co2,
        });
    }

    let seller_id = seller_id.ok_or_else(|| AppError::new(ErrorCode::OrderEmpty))?;
    if seller_id == identity.user_id {
        return Err(AppError::validation("Cannot order your own listings"));
    }

    let totals = money::order_totals(&lines, req.shipping_price, state.commission_rate)?;

    let order_id = uuid::Uuid::new_v4().to_string();
    let order_number = crate::util::generate_order_number();
    let now = crate::util::now_millis();

    db::orders::create(
        &state.pool,
        &db::orders::NewOrder {
            id: &order_id,
            order_number: &order_number,
            buyer_id: &identity.user_id,
            seller_id: &seller_id,
            street: &req.shipping_address.street,
            city: &req.shipping_address.city,
            state: &req.shipping_address.state,
            zip_code: &req.shipping_address.zip_code,
            country: &req.shipping_address.country,
            payment_method: payment_method.as_db(),
            items_price: totals.items_price,
            shipping_price: totals.shipping_price,
            platform_fee: totals.platform_fee,
            total_price: totals.total_price,
            total_waste_reduced: total_waste,
            total_co2_saved: total_co2,
            items: &items,
            now,
        },
    )
    .await
    .map_err(|e| {
        tracing::error!("Order insert error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    tracing::info!(
        order_id = %order_id,
        order_number = %order_number,
        buyer_id = %identity.user_id,
        total = totals.total_price,
        "Order placed"
    );

    let detail = serde_json::json!({ "order_number": order_number, "total": totals.total_price });
    let _ = db::audit::log(
        &state.pool,
        &identity.user_id,
        "order_placed",
        Some(&detail),
        None,
        now,
    )
    .await;

    let order = db::orders::find_by_id(&state.pool, &order_id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::InternalError))?;
    Ok(Json(load_detail(&state, order).await?))
}

/// GET /api/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
) -> ApiResult<OrderDetail> {
    let order = find_order(&state, &id).await?;

    if !identity.is_self_or_admin(&order.buyer_id) && order.seller_id != identity.user_id {
        return Err(AppError::permission_denied(
            "Not authorized to view this order",
        ));
    }

    Ok(Json(load_detail(&state, order).await?))
}

/// GET /api/orders/mine
#[derive(Deserialize)]
pub struct OrdersQuery {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
    pub status: Option<String>,
}

pub async fn my_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<Vec<Order>> {
    let (_, per_page, offset) = super::page_params(query.page, query.per_page, 20);

    let orders = db::orders::list_by_buyer(&state.pool, &identity.user_id, per_page, offset)
        .await
        .map_err(|e| {
            tracing::error!("Orders query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    Ok(Json(orders))
}

/// GET /api/orders/seller
pub async fn seller_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<Vec<Order>> {
    identity.require_seller()?;
    let (_, per_page, offset) = super::page_params(query.page, query.per_page, 20);

    if let Some(ref s) = query.status
        && OrderStatus::from_db(s).is_none()
    {
        return Err(AppError::validation(format!("Unknown status: {s}")));
    }

    let orders = db::orders::list_by_seller(
        &state.pool,
        &identity.user_id,
        query.status.as_deref(),
        per_page,
        offset,
    )
    .await
    .map_err(|e| {
        tracing::error!("Orders query error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;
    Ok(Json(orders))
}

/// PUT /api/orders/:id/pay — synchronous confirmation path
///
/// Shares `apply_payment_success` with the webhook, so a client confirm
/// followed by the webhook (or a retried call) cannot deduct stock twice.
#[derive(Deserialize)]
pub struct PayOrderRequest {
    /// Processor-side payment reference reported by the client
    pub id: Option<String>,
    pub status: Option<String>,
    pub email: Option<String>,
}

pub async fn pay_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
    Json(req): Json<PayOrderRequest>,
) -> ApiResult<OrderDetail> {
    let order = find_order(&state, &id).await?;
    if !identity.is_self_or_admin(&order.buyer_id) {
        return Err(AppError::permission_denied(
            "Not authorized to pay this order",
        ));
    }

    let now = crate::util::now_millis();
    let payment_result = serde_json::json!({
        "id": req.id,
        "status": req.status.as_deref().unwrap_or("succeeded"),
        "email": req.email,
        "source": "client_confirm",
        "update_time": now,
    });

    match db::orders::apply_payment_success(&state.pool, &id, &payment_result, now).await? {
        PaymentOutcome::Applied => {}
        PaymentOutcome::AlreadyPaid => return Err(AppError::new(ErrorCode::OrderAlreadyPaid)),
    }

    let order = find_order(&state, &id).await?;

    let _ = crate::email::send_order_confirmation(
        &state.ses,
        &state.ses_from_email,
        &identity.email,
        &order.order_number,
        order.total_price,
    )
    .await;

    let detail = serde_json::json!({ "order_number": order.order_number });
    let _ = db::audit::log(
        &state.pool,
        &identity.user_id,
        "order_paid",
        Some(&detail),
        None,
        now,
    )
    .await;

    Ok(Json(load_detail(&state, order).await?))
}

/// PUT /api/orders/:id/ship
#[derive(Deserialize)]
pub struct ShipOrderRequest {
    pub tracking_number: Option<String>,
}

pub async fn ship_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
    Json(req): Json<ShipOrderRequest>,
) -> ApiResult<OrderDetail> {
    let order = find_order(&state, &id).await?;
    if !identity.is_self_or_admin(&order.seller_id) {
        return Err(AppError::permission_denied("Not authorized"));
    }

    let shipped = db::orders::mark_shipped(&state.pool, &id, req.tracking_number.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Ship update error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    if !shipped {
        return Err(AppError::new(ErrorCode::OrderInvalidTransition)
            .with_detail("status", order.status.clone()));
    }

    let order = find_order(&state, &id).await?;
    Ok(Json(load_detail(&state, order).await?))
}

/// PUT /api/orders/:id/deliver
pub async fn deliver_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
) -> ApiResult<OrderDetail> {
    let order = find_order(&state, &id).await?;
    if !identity.is_self_or_admin(&order.seller_id) {
        return Err(AppError::permission_denied("Not authorized"));
    }

    let delivered = db::orders::mark_delivered(&state.pool, &id, crate::util::now_millis())
        .await
        .map_err(|e| {
            tracing::error!("Deliver update error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    if !delivered {
        return Err(AppError::new(ErrorCode::OrderInvalidTransition)
            .with_detail("status", order.status.clone()));
    }

    let order = find_order(&state, &id).await?;
    Ok(Json(load_detail(&state, order).await?))
}

/// PUT /api/orders/:id/cancel
#[derive(Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> ApiResult<OrderDetail> {
    let order = find_order(&state, &id).await?;
    if !identity.is_self_or_admin(&order.buyer_id) {
        return Err(AppError::permission_denied(
            "Not authorized to cancel this order",
        ));
    }

    let now = crate::util::now_millis();
    let order = db::orders::cancel(&state.pool, &id, req.reason.as_deref(), now).await?;

    let detail = serde_json::json!({
        "order_number": order.order_number,
        "reason": req.reason,
    });
    let _ = db::audit::log(
        &state.pool,
        &identity.user_id,
        "order_cancelled",
        Some(&detail),
        None,
        now,
    )
    .await;

    Ok(Json(load_detail(&state, order).await?))
}

async fn find_order(state: &AppState, id: &str) -> Result<Order, AppError> {
    db::orders::find_by_id(&state.pool, id)
        .await
        .map_err(|e| {
            tracing::error!("Order query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))
}
