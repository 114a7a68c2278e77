//! Product catalog endpoints: public search/browse, seller CRUD

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Condition, ExpiryType, PlanFeatures, ProductCategory, ProductStatus, Unit,
    discount_percentage,
};
use shared::response::PaginatedResponse;

use crate::auth::UserIdentity;
use crate::db;
use crate::db::products::Product;
use crate::money;
use crate::state::AppState;

use super::ApiResult;

/// GET /api/products
#[derive(Deserialize)]
pub struct CatalogQuery {
    pub page: Option<i32>,
    pub limit: Option<i32>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub expiry_type: Option<String>,
    pub sort: Option<String>,
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<PaginatedResponse<Product>> {
    let (page, per_page, offset) = super::page_params(query.page, query.limit, 12);

    // Unknown filter values mean an empty result, not a query error
    let category = match query.category.as_deref() {
        None | Some("all") => None,
        Some(c) => Some(
            ProductCategory::from_db(c)
                .ok_or_else(|| AppError::validation(format!("Unknown category: {c}")))?
                .as_db(),
        ),
    };
    let expiry_type = match query.expiry_type.as_deref() {
        None => None,
        Some(e) => Some(
            ExpiryType::from_db(e)
                .ok_or_else(|| AppError::validation(format!("Unknown expiry type: {e}")))?
                .as_db(),
        ),
    };

    let filter = db::products::CatalogFilter {
        category,
        search: query.search.as_deref().filter(|s| !s.trim().is_empty()),
        min_price: query.min_price,
        max_price: query.max_price,
        expiry_type,
        sort: query.sort.as_deref(),
        limit: per_page,
        offset,
    };

    let products = db::products::list_catalog(&state.pool, &filter)
        .await
        .map_err(|e| {
            tracing::error!("Catalog query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    let total = db::products::count_catalog(&state.pool, &filter)
        .await
        .map_err(|e| {
            tracing::error!("Catalog count error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;

    Ok(Json(PaginatedResponse::new(
        products,
        page as u32,
        per_page as u32,
        total as u64,
    )))
}

/// GET /api/products/featured
pub async fn list_featured(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    let products = db::products::list_featured(&state.pool, crate::util::now_millis(), 12)
        .await
        .map_err(|e| {
            tracing::error!("Featured query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    Ok(Json(products))
}

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    let product = db::products::find_by_id(&state.pool, &id)
        .await
        .map_err(|e| {
            tracing::error!("Product query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound))?;

    // View count is best-effort; a failed bump must not fail the read
    if let Err(e) = db::products::increment_views(&state.pool, &id).await {
        tracing::warn!(product_id = %id, "Failed to increment views: {e}");
    }

    Ok(Json(product))
}

/// POST /api/products
#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub unit: Option<String>,
    pub condition: Option<String>,
    pub expiry_type: String,
    pub expiry_date: Option<i64>,
    pub original_price: f64,
    pub discounted_price: f64,
    pub stock: i32,
    pub waste_per_unit: Option<f64>,
    pub co2_per_unit: Option<f64>,
    /// SHA256 hashes from the image upload endpoint
    pub images: Option<Vec<String>>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

struct ValidatedListing {
    category: &'static str,
    unit: &'static str,
    condition: &'static str,
    expiry_type: &'static str,
}

fn validate_listing(req: &CreateProductRequest) -> Result<ValidatedListing, AppError> {
    let title = req.title.trim();
    if title.is_empty() || title.len() > 200 {
        return Err(
            AppError::validation("Title must be 1-200 characters").with_detail("field", "title"),
        );
    }
    if req.description.trim().is_empty() || req.description.len() > 2000 {
        return Err(AppError::validation("Description must be 1-2000 characters")
            .with_detail("field", "description"));
    }

    let category = ProductCategory::from_db(&req.category)
        .ok_or_else(|| AppError::validation(format!("Unknown category: {}", req.category)))?;
    let unit = match req.unit.as_deref() {
        None => Unit::Piece,
        Some(u) => {
            Unit::from_db(u).ok_or_else(|| AppError::validation(format!("Unknown unit: {u}")))?
        }
    };
    let condition = match req.condition.as_deref() {
        None => Condition::New,
        Some(c) => Condition::from_db(c)
            .ok_or_else(|| AppError::validation(format!("Unknown condition: {c}")))?,
    };
    let expiry_type = ExpiryType::from_db(&req.expiry_type)
        .ok_or_else(|| AppError::validation(format!("Unknown expiry type: {}", req.expiry_type)))?;

    money::validate_price(req.original_price, "original_price")?;
    money::validate_price(req.discounted_price, "discounted_price")?;
    if req.discounted_price > req.original_price {
        return Err(AppError::new(ErrorCode::ProductInvalidPrice)
            .with_detail("reason", "discounted_price exceeds original_price"));
    }
    if req.stock < 0 {
        return Err(AppError::validation("Stock cannot be negative").with_detail("field", "stock"));
    }
    for metric in [req.waste_per_unit, req.co2_per_unit].into_iter().flatten() {
        if !metric.is_finite() || metric < 0.0 {
            return Err(AppError::validation(
                "Environmental estimates must be non-negative",
            ));
        }
    }

    Ok(ValidatedListing {
        category: category.as_db(),
        unit: unit.as_db(),
        condition: condition.as_db(),
        expiry_type: expiry_type.as_db(),
    })
}

/// Active-listing quota from the seller's subscription, free tier otherwise
async fn listing_quota(state: &AppState, user_id: &str) -> Result<PlanFeatures, AppError> {
    let sub = db::subscriptions::find_active_by_user(&state.pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("Subscription query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    Ok(match sub.and_then(|s| shared::models::Plan::from_db(&s.plan)) {
        Some(plan) => plan.features(),
        None => PlanFeatures::free_tier(),
    })
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<Product> {
    identity.require_seller()?;

    let validated = validate_listing(&req)?;

    // Plan quota applies to sellers, not admins
    if !identity.role.is_admin() {
        let features = listing_quota(&state, &identity.user_id).await?;
        let active = db::products::count_active_by_seller(&state.pool, &identity.user_id)
            .await
            .map_err(|e| {
                tracing::error!("Listing count error: {e}");
                AppError::new(ErrorCode::InternalError)
            })?;
        if !features.allows_listing(active) {
            return Err(AppError::new(ErrorCode::ListingLimitReached)
                .with_detail("active_listings", active));
        }
    }

    let now = crate::util::now_millis();
    let id = uuid::Uuid::new_v4().to_string();
    let status = ProductStatus::derive(ProductStatus::Active, req.stock, req.expiry_date, now);
    let images = serde_json::json!(req.images.clone().unwrap_or_default());

    db::products::create(
        &state.pool,
        &db::products::CreateProduct {
            id: &id,
            seller_id: &identity.user_id,
            title: req.title.trim(),
            description: &req.description,
            category: validated.category,
            unit: validated.unit,
            condition: validated.condition,
            expiry_type: validated.expiry_type,
            expiry_date: req.expiry_date,
            original_price: req.original_price,
            discounted_price: req.discounted_price,
            discount_percentage: discount_percentage(req.original_price, req.discounted_price),
            stock: req.stock,
            status: status.as_db(),
            waste_per_unit: req.waste_per_unit.unwrap_or(0.0),
            co2_per_unit: req.co2_per_unit.unwrap_or(0.0),
            images: &images,
            city: req.city.as_deref(),
            state: req.state.as_deref(),
            country: req.country.as_deref(),
            now,
        },
    )
    .await
    .map_err(|e| {
        tracing::error!("Product insert error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    tracing::info!(product_id = %id, seller_id = %identity.user_id, "Listing created");

    let product = db::products::find_by_id(&state.pool, &id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::InternalError))?;
    Ok(Json(product))
}

/// PUT /api/products/:id
#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub condition: Option<String>,
    pub expiry_type: Option<String>,
    pub expiry_date: Option<i64>,
    pub original_price: Option<f64>,
    pub discounted_price: Option<f64>,
    pub stock: Option<i32>,
    pub waste_per_unit: Option<f64>,
    pub co2_per_unit: Option<f64>,
    pub images: Option<Vec<String>>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Sellers may deactivate/reactivate a listing
    pub is_active: Option<bool>,
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<Product> {
    let existing = db::products::find_by_id(&state.pool, &id)
        .await
        .map_err(|e| {
            tracing::error!("Product query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound))?;

    if !identity.is_self_or_admin(&existing.seller_id) {
        return Err(AppError::permission_denied(
            "Not authorized to update this listing",
        ));
    }

    // Merge the patch over the existing row, then re-validate as a whole
    let merged = CreateProductRequest {
        title: req.title.unwrap_or_else(|| existing.title.clone()),
        description: req.description.unwrap_or_else(|| existing.description.clone()),
        category: req.category.unwrap_or_else(|| existing.category.clone()),
        unit: Some(req.unit.unwrap_or_else(|| existing.unit.clone())),
        condition: Some(req.condition.unwrap_or_else(|| existing.condition.clone())),
        expiry_type: req.expiry_type.unwrap_or_else(|| existing.expiry_type.clone()),
        expiry_date: req.expiry_date.or(existing.expiry_date),
        original_price: req.original_price.unwrap_or(existing.original_price),
        discounted_price: req.discounted_price.unwrap_or(existing.discounted_price),
        stock: req.stock.unwrap_or(existing.stock),
        waste_per_unit: Some(req.waste_per_unit.unwrap_or(existing.waste_per_unit)),
        co2_per_unit: Some(req.co2_per_unit.unwrap_or(existing.co2_per_unit)),
        images: None,
        city: req.city.or_else(|| existing.city.clone()),
        state: req.state.or_else(|| existing.state.clone()),
        country: req.country.or_else(|| existing.country.clone()),
    };
    let validated = validate_listing(&merged)?;

    let now = crate::util::now_millis();

    // Status invariants re-derived on every save; an explicit is_active flag
    // switches between the seller-controlled inactive state and derivation
    let current = ProductStatus::from_db(&existing.status).unwrap_or(ProductStatus::Active);
    let base = match req.is_active {
        Some(false) => ProductStatus::Inactive,
        Some(true) => ProductStatus::Active,
        None => current,
    };
    let status = ProductStatus::derive(base, merged.stock, merged.expiry_date, now);

    let images = match req.images {
        Some(list) => serde_json::json!(list),
        None => existing.images.clone(),
    };

    db::products::save(
        &state.pool,
        &id,
        &db::products::SaveProduct {
            title: merged.title.trim(),
            description: &merged.description,
            category: validated.category,
            unit: validated.unit,
            condition: validated.condition,
            expiry_type: validated.expiry_type,
            expiry_date: merged.expiry_date,
            original_price: merged.original_price,
            discounted_price: merged.discounted_price,
            discount_percentage: discount_percentage(
                merged.original_price,
                merged.discounted_price,
            ),
            stock: merged.stock,
            status: status.as_db(),
            waste_per_unit: merged.waste_per_unit.unwrap_or(0.0),
            co2_per_unit: merged.co2_per_unit.unwrap_or(0.0),
            images: &images,
            city: merged.city.as_deref(),
            state: merged.state.as_deref(),
            country: merged.country.as_deref(),
            now,
        },
    )
    .await
    .map_err(|e| {
        tracing::error!("Product update error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    let product = db::products::find_by_id(&state.pool, &id)
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))?
        .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound))?;
    Ok(Json(product))
}

/// DELETE /api/products/:id — soft delete to 'inactive'
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let existing = db::products::find_by_id(&state.pool, &id)
        .await
        .map_err(|e| {
            tracing::error!("Product query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound))?;

    if !identity.is_self_or_admin(&existing.seller_id) {
        return Err(AppError::permission_denied(
            "Not authorized to delete this listing",
        ));
    }

    db::products::set_status(
        &state.pool,
        &id,
        ProductStatus::Inactive.as_db(),
        crate::util::now_millis(),
    )
    .await
    .map_err(|e| {
        tracing::error!("Product delete error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    tracing::info!(product_id = %id, "Listing deactivated");

    Ok(Json(serde_json::json!({ "message": "Listing removed" })))
}

/// GET /api/products/mine
pub async fn my_products(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<Vec<Product>> {
    identity.require_seller()?;

    let products = db::products::list_by_seller(&state.pool, &identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Seller products query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    Ok(Json(products))
}
