/// Slug and SKU generation
///
/// Slugs are the public identifiers of products and categories in URLs.
/// They are derived from the name once and kept stable afterwards.
///
/// # Example
///
/// ```
/// use storefront_shared::catalog::slug::{slugify, first_free_slug, PRODUCT_SLUG_MAX};
/// use std::collections::HashSet;
///
/// let base = slugify("Wireless Headphones (Black)", PRODUCT_SLUG_MAX);
/// assert_eq!(base, "wireless-headphones-black");
///
/// let taken: HashSet<String> = [base.clone()].into_iter().collect();
/// assert_eq!(first_free_slug(&base, &taken, PRODUCT_SLUG_MAX), "wireless-headphones-black-2");
/// ```

use std::collections::HashSet;

use uuid::Uuid;

/// Column width of `products.slug`
pub const PRODUCT_SLUG_MAX: usize = 220;

/// Column width of `categories.slug`
pub const CATEGORY_SLUG_MAX: usize = 120;

/// Prefix of generated SKUs
pub const SKU_PREFIX: &str = "PRD-";

/// Turns free text into a URL-safe slug
///
/// Keeps lowercase ASCII letters and digits. Runs of whitespace, hyphens
/// and underscores become a single hyphen; anything else is dropped. The
/// result never starts or ends with a hyphen and is at most `max_len`
/// bytes long. It may be empty.
pub fn slugify(input: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(input.len().min(max_len));
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_hyphen = true;
        }
    }

    truncate_slug(&slug, max_len).to_string()
}

fn truncate_slug(slug: &str, max_len: usize) -> &str {
    // Slugs are ASCII, so byte slicing is safe.
    let end = slug.len().min(max_len);
    slug[..end].trim_end_matches('-')
}

/// Builds the `n`th candidate for a base slug
///
/// Attempt 1 is the base itself; later attempts append `-n`, shortening
/// the base so the result still fits in `max_len`.
pub fn candidate_slug(base: &str, attempt: u32, max_len: usize) -> String {
    if attempt <= 1 {
        return truncate_slug(base, max_len).to_string();
    }

    let suffix = format!("-{}", attempt);
    let room = max_len.saturating_sub(suffix.len());
    format!("{}{}", truncate_slug(base, room), suffix)
}

/// Picks the first candidate not present in `taken`
///
/// An empty base falls back to a random short identifier.
pub fn first_free_slug(base: &str, taken: &HashSet<String>, max_len: usize) -> String {
    if base.is_empty() {
        return Uuid::new_v4().simple().to_string()[..8].to_string();
    }

    (1u32..)
        .map(|attempt| candidate_slug(base, attempt, max_len))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Generates a SKU of the form `PRD-XXXXXXXX` (uppercase hex)
pub fn generate_sku() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}", SKU_PREFIX, id[..8].to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World", 100), "hello-world");
        assert_eq!(slugify("  Leading and trailing  ", 100), "leading-and-trailing");
        assert_eq!(slugify("Rock & Roll", 100), "rock-roll");
        assert_eq!(slugify("snake_case--and  spaces", 100), "snake-case-and-spaces");
        assert_eq!(slugify("MiXeD 123", 100), "mixed-123");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Café Crème", 100), "caf-crme");
        assert_eq!(slugify("日本語", 100), "");
        assert_eq!(slugify("!!!", 100), "");
    }

    #[test]
    fn test_slugify_truncates_without_trailing_hyphen() {
        assert_eq!(slugify("abcde fgh", 6), "abcde");
        assert_eq!(slugify(&"a".repeat(300), PRODUCT_SLUG_MAX).len(), PRODUCT_SLUG_MAX);
    }

    #[test]
    fn test_candidate_slug() {
        assert_eq!(candidate_slug("shoe", 1, 120), "shoe");
        assert_eq!(candidate_slug("shoe", 2, 120), "shoe-2");
        assert_eq!(candidate_slug("shoe", 10, 120), "shoe-10");

        let long = "a".repeat(120);
        let candidate = candidate_slug(&long, 3, 120);
        assert_eq!(candidate.len(), 120);
        assert!(candidate.ends_with("-3"));
    }

    #[test]
    fn test_first_free_slug() {
        let taken: HashSet<String> = ["shoe", "shoe-2", "shoe-3"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(first_free_slug("shoe", &taken, 120), "shoe-4");
        assert_eq!(first_free_slug("boot", &taken, 120), "boot");
    }

    #[test]
    fn test_first_free_slug_empty_base() {
        let slug = first_free_slug("", &HashSet::new(), 120);
        assert_eq!(slug.len(), 8);
    }

    #[test]
    fn test_generate_sku() {
        let sku = generate_sku();
        assert!(sku.starts_with("PRD-"));
        assert_eq!(sku.len(), 12);
        assert!(sku[4..].chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(sku, generate_sku());
    }
}
