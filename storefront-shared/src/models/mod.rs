/// Database models for Storefront
///
/// Each model owns its SQL. Functions take a `&PgPool`, or a generic
/// executor where they must also run inside a transaction.
///
/// # Models
///
/// - `user`: user accounts
/// - `user_profile`: one-to-one profile extension with e-mail verification state
/// - `auth_token`: single-use e-mail verification and password reset tokens
/// - `revoked_token`: refresh-token blacklist
/// - `category`: product categories
/// - `product`: products, listings and owner statistics
/// - `product_image`: product gallery images
///
/// # Example
///
/// ```no_run
/// use storefront_shared::models::user::{User, CreateUser};
/// use storefront_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     username: "jdoe".to_string(),
///     email: "jdoe@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     first_name: "John".to_string(),
///     last_name: "Doe".to_string(),
/// };
///
/// let user = User::create(&pool, new_user).await?;
/// # Ok(())
/// # }
/// ```

pub mod auth_token;
pub mod category;
pub mod product;
pub mod product_image;
pub mod revoked_token;
pub mod user;
pub mod user_profile;
