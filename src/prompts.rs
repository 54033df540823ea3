//! Goal prompt for the logo search
//!
//! The goal tells the model what a good answer looks like: an `img` tag with
//! the logo URL, a short description in `title`, and the brand in `alt`.

/// Build the goal text for `brand`
///
/// # Examples
///
/// ```
/// use iconagent::prompts::build_goal;
///
/// let goal = build_goal("Acme Corp");
/// assert!(goal.contains("logo of Acme Corp"));
/// assert!(goal.contains("'img' tag"));
/// ```
pub fn build_goal(brand: &str) -> String {
    let brand = brand.trim();
    format!(
        "Get a valid URL for the logo of {brand}, ideally the official logo as published \
by the organization that owns the brand, but other sources can work. \
Once sure the URL is valid, return a reference to it in an HTML 'img' tag \
using a concise text description of the logo image for the 'title' attribute \
and referencing the brand name in the 'alt' attribute, saying something like '{brand} logo'. \
If you encounter errors along the way, retry up to {RETRY_HINT} times.",
    )
}

/// Retry count mentioned to the model; the loop enforces its own budget
const RETRY_HINT: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_mentions_brand_and_attributes() {
        let goal = build_goal("  Contoso  ");
        assert!(goal.contains("logo of Contoso,"));
        assert!(goal.contains("'Contoso logo'"));
        assert!(goal.contains("'title' attribute"));
        assert!(goal.contains("'alt' attribute"));
    }

    #[test]
    fn test_goal_is_deterministic() {
        assert_eq!(build_goal("Acme Corp"), build_goal("Acme Corp"));
    }
}
