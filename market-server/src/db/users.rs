use sqlx::PgPool;

#[derive(sqlx::FromRow, serde::Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: String,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub business_name: Option<String>,
    pub business_description: Option<String>,
    pub business_category: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    pub subscription_plan: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_period_end: Option<i64>,
    pub total_sales: i32,
    pub total_purchases: i32,
    pub waste_reduced: f64,
    pub co2_saved: f64,
    pub rating: f64,
    pub review_count: i32,
    pub is_active: bool,
    pub created_at: i64,
}

pub struct CreateUser<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub hashed_password: &'a str,
    pub role: &'a str,
    pub business_name: Option<&'a str>,
    pub business_description: Option<&'a str>,
    pub business_category: Option<&'a str>,
    pub now: i64,
}

pub async fn create(pool: &PgPool, user: &CreateUser<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, name, email, hashed_password, role,
            business_name, business_description, business_category, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(user.id)
    .bind(user.name)
    .bind(user.email)
    .bind(user.hashed_password)
    .bind(user.role)
    .bind(user.business_name)
    .bind(user.business_description)
    .bind(user.business_category)
    .bind(user.now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_stripe_customer(
    pool: &PgPool,
    customer_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE stripe_customer_id = $1")
        .bind(customer_id)
        .fetch_optional(pool)
        .await
}

pub async fn update_password(
    pool: &PgPool,
    user_id: &str,
    hashed_password: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET hashed_password = $1 WHERE id = $2")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub struct UpdateProfile<'a> {
    pub name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub street: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub zip_code: Option<&'a str>,
    pub country: Option<&'a str>,
    pub business_name: Option<&'a str>,
    pub business_description: Option<&'a str>,
    pub business_category: Option<&'a str>,
}

pub async fn update_profile(
    pool: &PgPool,
    user_id: &str,
    update: &UpdateProfile<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET
            name = COALESCE($1, name),
            phone = COALESCE($2, phone),
            street = COALESCE($3, street),
            city = COALESCE($4, city),
            state = COALESCE($5, state),
            zip_code = COALESCE($6, zip_code),
            country = COALESCE($7, country),
            business_name = COALESCE($8, business_name),
            business_description = COALESCE($9, business_description),
            business_category = COALESCE($10, business_category)
         WHERE id = $11",
    )
    .bind(update.name)
    .bind(update.phone)
    .bind(update.street)
    .bind(update.city)
    .bind(update.state)
    .bind(update.zip_code)
    .bind(update.country)
    .bind(update.business_name)
    .bind(update.business_description)
    .bind(update.business_category)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_stripe_customer(
    pool: &PgPool,
    user_id: &str,
    stripe_customer_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET stripe_customer_id = $1 WHERE id = $2")
        .bind(stripe_customer_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Keep the denormalized subscription mirror on the user row in sync.
pub async fn set_subscription_mirror(
    pool: &PgPool,
    user_id: &str,
    plan: Option<&str>,
    status: Option<&str>,
    period_end: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET subscription_plan = $1, subscription_status = $2,
            subscription_period_end = $3
         WHERE id = $4",
    )
    .bind(plan)
    .bind(status)
    .bind(period_end)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}
