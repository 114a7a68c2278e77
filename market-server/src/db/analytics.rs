//! Read-only analytics aggregations for dashboards
//!
//! No state mutation here; paid means the order currently holds a
//! captured payment (refunded/cancelled orders drop out of the sums).

use sqlx::PgPool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const PAID: &str = "('confirmed', 'processing', 'shipped', 'delivered')";

#[derive(serde::Serialize, Default)]
pub struct RevenueSummary {
    pub gross: f64,
    pub platform_fees: f64,
    pub net: f64,
    pub orders: i64,
}

#[derive(serde::Serialize, sqlx::FromRow)]
pub struct CategorySales {
    pub category: String,
    pub units_sold: i64,
    pub revenue: f64,
}

#[derive(serde::Serialize, sqlx::FromRow)]
pub struct DailySales {
    pub date: String,
    pub orders: i64,
    pub revenue: f64,
}

#[derive(serde::Serialize, Default)]
pub struct ImpactSummary {
    pub waste_reduced: f64,
    pub co2_saved: f64,
}

#[derive(serde::Serialize)]
pub struct SellerOverview {
    pub revenue: RevenueSummary,
    pub products_total: i64,
    pub products_active: i64,
    pub total_views: i64,
    pub sales_by_category: Vec<CategorySales>,
    pub sales_trend: Vec<DailySales>,
    pub impact: ImpactSummary,
}

pub async fn seller_overview(
    pool: &PgPool,
    seller_id: &str,
    from: Option<i64>,
    to: Option<i64>,
) -> Result<SellerOverview, BoxError> {
    let sql = format!(
        "SELECT COALESCE(SUM(items_price), 0), COALESCE(SUM(platform_fee), 0),
            COALESCE(SUM(total_waste_reduced), 0), COALESCE(SUM(total_co2_saved), 0), COUNT(*)
         FROM orders
         WHERE seller_id = $1 AND status IN {PAID}
            AND ($2::BIGINT IS NULL OR created_at >= $2)
            AND ($3::BIGINT IS NULL OR created_at <= $3)"
    );
    let (gross, fees, waste, co2, orders): (f64, f64, f64, f64, i64) = sqlx::query_as(&sql)
        .bind(seller_id)
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await?;

    let (products_total, products_active, total_views): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
            COUNT(*) FILTER (WHERE status = 'active'),
            COALESCE(SUM(views), 0)::BIGINT
         FROM products WHERE seller_id = $1",
    )
    .bind(seller_id)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT p.category, COALESCE(SUM(oi.quantity), 0) AS units_sold,
            COALESCE(SUM(oi.price * oi.quantity), 0) AS revenue
         FROM orders o
         JOIN order_items oi ON oi.order_id = o.id
         JOIN products p ON p.id = oi.product_id
         WHERE o.seller_id = $1 AND o.status IN {PAID}
         GROUP BY p.category
         ORDER BY revenue DESC"
    );
    let sales_by_category: Vec<CategorySales> =
        sqlx::query_as(&sql).bind(seller_id).fetch_all(pool).await?;

    // Daily sales for the trailing 30 days
    let sql = format!(
        "SELECT to_char(to_timestamp(created_at / 1000), 'YYYY-MM-DD') AS date,
            COUNT(*) AS orders, COALESCE(SUM(items_price), 0) AS revenue
         FROM orders
         WHERE seller_id = $1 AND status IN {PAID} AND created_at >= $2
         GROUP BY date
         ORDER BY date"
    );
    let thirty_days_ago = shared::util::now_millis() - 30 * 24 * 3600 * 1000;
    let sales_trend: Vec<DailySales> = sqlx::query_as(&sql)
        .bind(seller_id)
        .bind(thirty_days_ago)
        .fetch_all(pool)
        .await?;

    Ok(SellerOverview {
        revenue: RevenueSummary {
            gross,
            platform_fees: fees,
            net: gross - fees,
            orders,
        },
        products_total,
        products_active,
        total_views,
        sales_by_category,
        sales_trend,
        impact: ImpactSummary {
            waste_reduced: waste,
            co2_saved: co2,
        },
    })
}

#[derive(serde::Serialize)]
pub struct BuyerOverview {
    pub total_spent: f64,
    pub average_order: f64,
    pub orders: i64,
    pub orders_by_category: Vec<CategorySales>,
    pub impact: ImpactSummary,
}

pub async fn buyer_overview(pool: &PgPool, buyer_id: &str) -> Result<BuyerOverview, BoxError> {
    let sql = format!(
        "SELECT COALESCE(SUM(total_price), 0), COALESCE(SUM(total_waste_reduced), 0),
            COALESCE(SUM(total_co2_saved), 0), COUNT(*)
         FROM orders
         WHERE buyer_id = $1 AND status IN {PAID}"
    );
    let (spent, waste, co2, orders): (f64, f64, f64, i64) =
        sqlx::query_as(&sql).bind(buyer_id).fetch_one(pool).await?;

    let sql = format!(
        "SELECT p.category, COALESCE(SUM(oi.quantity), 0) AS units_sold,
            COALESCE(SUM(oi.price * oi.quantity), 0) AS revenue
         FROM orders o
         JOIN order_items oi ON oi.order_id = o.id
         JOIN products p ON p.id = oi.product_id
         WHERE o.buyer_id = $1 AND o.status IN {PAID}
         GROUP BY p.category
         ORDER BY revenue DESC"
    );
    let orders_by_category: Vec<CategorySales> =
        sqlx::query_as(&sql).bind(buyer_id).fetch_all(pool).await?;

    Ok(BuyerOverview {
        total_spent: spent,
        average_order: if orders > 0 { spent / orders as f64 } else { 0.0 },
        orders,
        orders_by_category,
        impact: ImpactSummary {
            waste_reduced: waste,
            co2_saved: co2,
        },
    })
}

#[derive(serde::Serialize, sqlx::FromRow)]
pub struct TopSeller {
    pub seller_id: String,
    pub name: String,
    pub business_name: Option<String>,
    pub orders: i64,
    pub revenue: f64,
}

#[derive(serde::Serialize)]
pub struct PlatformOverview {
    pub total_users: i64,
    pub total_sellers: i64,
    pub total_buyers: i64,
    pub total_products: i64,
    pub active_products: i64,
    pub revenue: RevenueSummary,
    pub impact: ImpactSummary,
    pub top_categories: Vec<CategorySales>,
    pub top_sellers: Vec<TopSeller>,
}

pub async fn platform_overview(pool: &PgPool) -> Result<PlatformOverview, BoxError> {
    let (total_users, total_sellers, total_buyers): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
            COUNT(*) FILTER (WHERE role = 'seller'),
            COUNT(*) FILTER (WHERE role = 'buyer')
         FROM users",
    )
    .fetch_one(pool)
    .await?;

    let (total_products, active_products): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'active') FROM products",
    )
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT COALESCE(SUM(items_price), 0), COALESCE(SUM(platform_fee), 0),
            COALESCE(SUM(total_waste_reduced), 0), COALESCE(SUM(total_co2_saved), 0), COUNT(*)
         FROM orders WHERE status IN {PAID}"
    );
    let (gross, fees, waste, co2, orders): (f64, f64, f64, f64, i64) =
        sqlx::query_as(&sql).fetch_one(pool).await?;

    let sql = format!(
        "SELECT p.category, COALESCE(SUM(oi.quantity), 0) AS units_sold,
            COALESCE(SUM(oi.price * oi.quantity), 0) AS revenue
         FROM orders o
         JOIN order_items oi ON oi.order_id = o.id
         JOIN products p ON p.id = oi.product_id
         WHERE o.status IN {PAID}
         GROUP BY p.category
         ORDER BY revenue DESC
         LIMIT 10"
    );
    let top_categories: Vec<CategorySales> = sqlx::query_as(&sql).fetch_all(pool).await?;

    let sql = format!(
        "SELECT o.seller_id, u.name, u.business_name,
            COUNT(*) AS orders, COALESCE(SUM(o.items_price), 0) AS revenue
         FROM orders o
         JOIN users u ON u.id = o.seller_id
         WHERE o.status IN {PAID}
         GROUP BY o.seller_id, u.name, u.business_name
         ORDER BY revenue DESC
         LIMIT 10"
    );
    let top_sellers: Vec<TopSeller> = sqlx::query_as(&sql).fetch_all(pool).await?;

    Ok(PlatformOverview {
        total_users,
        total_sellers,
        total_buyers,
        total_products,
        active_products,
        revenue: RevenueSummary {
            gross,
            platform_fees: fees,
            net: gross - fees,
            orders,
        },
        impact: ImpactSummary {
            waste_reduced: waste,
            co2_saved: co2,
        },
        top_categories,
        top_sellers,
    })
}
