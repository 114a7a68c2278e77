//! Product listing queries
//!
//! Stock mutations live in `db::orders` (guarded UPDATEs inside the
//! fulfillment/cancellation transactions); this module covers catalog
//! CRUD, search and the expiry sweep.

use sqlx::PgPool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(sqlx::FromRow, serde::Serialize)]
pub struct Product {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub unit: String,
    pub condition: String,
    pub expiry_type: String,
    pub expiry_date: Option<i64>,
    pub original_price: f64,
    pub discounted_price: f64,
    pub discount_percentage: i32,
    pub stock: i32,
    pub status: String,
    pub waste_per_unit: f64,
    pub co2_per_unit: f64,
    pub rating: f64,
    pub review_count: i32,
    pub total_sold: i32,
    pub total_revenue: f64,
    pub views: i64,
    pub is_featured: bool,
    pub featured_until: Option<i64>,
    pub images: serde_json::Value,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Search/filter parameters for the public catalog
pub struct CatalogFilter<'a> {
    pub category: Option<&'a str>,
    pub search: Option<&'a str>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub expiry_type: Option<&'a str>,
    pub sort: Option<&'a str>,
    pub limit: i32,
    pub offset: i32,
}

const CATALOG_WHERE: &str = "
    FROM products
    WHERE status = 'active'
        AND ($1::TEXT IS NULL OR category = $1)
        AND ($2::TEXT IS NULL OR title ILIKE '%' || $2 || '%' OR description ILIKE '%' || $2 || '%')
        AND ($3::DOUBLE PRECISION IS NULL OR discounted_price >= $3)
        AND ($4::DOUBLE PRECISION IS NULL OR discounted_price <= $4)
        AND ($5::TEXT IS NULL OR expiry_type = $5)";

fn order_clause(sort: Option<&str>) -> &'static str {
    match sort {
        Some("price-low") => "discounted_price ASC",
        Some("price-high") => "discounted_price DESC",
        Some("popular") => "total_sold DESC",
        _ => "created_at DESC",
    }
}

pub async fn list_catalog(
    pool: &PgPool,
    filter: &CatalogFilter<'_>,
) -> Result<Vec<Product>, BoxError> {
    let sql = format!(
        "SELECT * {CATALOG_WHERE} ORDER BY {} LIMIT $6 OFFSET $7",
        order_clause(filter.sort)
    );
    let rows: Vec<Product> = sqlx::query_as(&sql)
        .bind(filter.category)
        .bind(filter.search)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.expiry_type)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn count_catalog(pool: &PgPool, filter: &CatalogFilter<'_>) -> Result<i64, BoxError> {
    let sql = format!("SELECT COUNT(*) {CATALOG_WHERE}");
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(filter.category)
        .bind(filter.search)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.expiry_type)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Atomic view counter bump; detail reads must not race each other
pub async fn increment_views(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET views = views + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub struct CreateProduct<'a> {
    pub id: &'a str,
    pub seller_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub unit: &'a str,
    pub condition: &'a str,
    pub expiry_type: &'a str,
    pub expiry_date: Option<i64>,
    pub original_price: f64,
    pub discounted_price: f64,
    pub discount_percentage: i32,
    pub stock: i32,
    pub status: &'a str,
    pub waste_per_unit: f64,
    pub co2_per_unit: f64,
    pub images: &'a serde_json::Value,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub country: Option<&'a str>,
    pub now: i64,
}

pub async fn create(pool: &PgPool, p: &CreateProduct<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO products (id, seller_id, title, description, category, unit, condition,
            expiry_type, expiry_date, original_price, discounted_price, discount_percentage,
            stock, status, waste_per_unit, co2_per_unit, images, city, state, country,
            created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
            $13, $14, $15, $16, $17, $18, $19, $20, $21, $21)",
    )
    .bind(p.id)
    .bind(p.seller_id)
    .bind(p.title)
    .bind(p.description)
    .bind(p.category)
    .bind(p.unit)
    .bind(p.condition)
    .bind(p.expiry_type)
    .bind(p.expiry_date)
    .bind(p.original_price)
    .bind(p.discounted_price)
    .bind(p.discount_percentage)
    .bind(p.stock)
    .bind(p.status)
    .bind(p.waste_per_unit)
    .bind(p.co2_per_unit)
    .bind(p.images)
    .bind(p.city)
    .bind(p.state)
    .bind(p.country)
    .bind(p.now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fully-merged update: the handler re-derives discount_percentage and
/// status before calling this, so the stored invariants hold on every write.
pub struct SaveProduct<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub unit: &'a str,
    pub condition: &'a str,
    pub expiry_type: &'a str,
    pub expiry_date: Option<i64>,
    pub original_price: f64,
    pub discounted_price: f64,
    pub discount_percentage: i32,
    pub stock: i32,
    pub status: &'a str,
    pub waste_per_unit: f64,
    pub co2_per_unit: f64,
    pub images: &'a serde_json::Value,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub country: Option<&'a str>,
    pub now: i64,
}

pub async fn save(pool: &PgPool, id: &str, p: &SaveProduct<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products SET title = $1, description = $2, category = $3, unit = $4,
            condition = $5, expiry_type = $6, expiry_date = $7, original_price = $8,
            discounted_price = $9, discount_percentage = $10, stock = $11, status = $12,
            waste_per_unit = $13, co2_per_unit = $14, images = $15, city = $16, state = $17,
            country = $18, updated_at = $19
         WHERE id = $20",
    )
    .bind(p.title)
    .bind(p.description)
    .bind(p.category)
    .bind(p.unit)
    .bind(p.condition)
    .bind(p.expiry_type)
    .bind(p.expiry_date)
    .bind(p.original_price)
    .bind(p.discounted_price)
    .bind(p.discount_percentage)
    .bind(p.stock)
    .bind(p.status)
    .bind(p.waste_per_unit)
    .bind(p.co2_per_unit)
    .bind(p.images)
    .bind(p.city)
    .bind(p.state)
    .bind(p.country)
    .bind(p.now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_status(
    pool: &PgPool,
    id: &str,
    status: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_by_seller(pool: &PgPool, seller_id: &str) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE seller_id = $1 ORDER BY created_at DESC")
        .bind(seller_id)
        .fetch_all(pool)
        .await
}

/// Active listings count, used against the plan quota
pub async fn count_active_by_seller(pool: &PgPool, seller_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE seller_id = $1 AND status = 'active'")
        .bind(seller_id)
        .fetch_one(pool)
        .await
}

pub async fn list_featured(pool: &PgPool, now: i64, limit: i32) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM products
         WHERE status = 'active' AND is_featured = TRUE
            AND (featured_until IS NULL OR featured_until > $1)
         ORDER BY created_at DESC
         LIMIT $2",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Background sweep: listings past expiry flip to 'expired' without waiting
/// for the next write. Returns the number of rows flipped.
pub async fn expire_stale(pool: &PgPool, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET status = 'expired', updated_at = $1
         WHERE status = 'active' AND expiry_date IS NOT NULL AND expiry_date < $1",
    )
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
