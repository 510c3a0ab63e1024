/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength validation
/// - [`jwt`]: access/refresh JWT generation and validation
/// - [`token`]: single-use e-mail tokens (verification, password reset)
/// - [`middleware`]: request authentication context and Bearer parsing
/// - [`authorization`]: staff checks
///
/// # Example
///
/// ```no_run
/// use storefront_shared::auth::password::{hash_password, verify_password};
/// use storefront_shared::auth::jwt::{issue_token_pair, validate_access_token, TokenLifetimes};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Correct-Horse-9")?;
/// assert!(verify_password("Correct-Horse-9", &hash)?);
///
/// let secret = "a-secret-key-that-is-at-least-32-characters";
/// let pair = issue_token_pair(Uuid::new_v4(), secret, TokenLifetimes::default())?;
/// let claims = validate_access_token(&pair.access, secret)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod token;
