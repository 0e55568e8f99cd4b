use commerce_admin_api::{config::AppConfig, db::create_pool};
use rust_decimal::Decimal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let alice = ensure_user(&pool, "alice", "alice@example.com", Some("Berlin")).await?;
    let bob = ensure_user(&pool, "bob", "bob@example.com", None).await?;
    seed_products(&pool).await?;

    println!("Seed completed. User IDs: {alice}, {bob}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    location: Option<&str>,
) -> anyhow::Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO users (username, email, location)
        VALUES ($1, $2, $3)
        ON CONFLICT (username) DO UPDATE SET email = EXCLUDED.email
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(location)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (i64,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
                .bind(username)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {username}");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        ("Walnut Desk Organizer", "Keeps the desk tidy", "45.50", 50),
        ("Ceramic Pour-Over Set", "Slow mornings, better coffee", "68.00", 100),
        ("Linen Tote Bag", "Carries the groceries", "19.99", 200),
        ("Brass Bookends", "Pair of cast bookends", "89.90", 75),
    ];

    for (name, desc, price, stock) in products {
        let price: Decimal = price.parse()?;
        sqlx::query(
            r#"
            INSERT INTO products (name, description, price, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
