//! Cart permalink construction.
//!
//! Shopify cart permalinks have the form
//! `https://{domain}/cart/{variant_id}:{quantity},{variant_id}:{quantity}`.
//! Visiting one populates the cart on the target store and proceeds to
//! checkout in one step.

use core::fmt;

use super::{ShopDomain, VariantRef};

/// A cart permalink on a specific store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartPermalink {
    domain: ShopDomain,
    lines: Vec<(VariantRef, u32)>,
}

impl CartPermalink {
    /// Build a permalink from resolved `(variant, quantity)` pairs.
    ///
    /// Line order is preserved exactly.
    #[must_use]
    pub fn new(domain: ShopDomain, lines: Vec<(VariantRef, u32)>) -> Self {
        Self { domain, lines }
    }

    /// The store the permalink points at.
    #[must_use]
    pub const fn domain(&self) -> &ShopDomain {
        &self.domain
    }

    /// Number of cart lines encoded in the permalink.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if the permalink carries no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render the permalink URL.
    #[must_use]
    pub fn to_url(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CartPermalink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}/cart/", self.domain)?;
        for (i, (variant, quantity)) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{variant}:{quantity}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(s: &str) -> ShopDomain {
        ShopDomain::parse(s).unwrap()
    }

    fn variant(s: &str) -> VariantRef {
        VariantRef::parse(s).unwrap()
    }

    #[test]
    fn test_single_line() {
        let link = CartPermalink::new(domain("backup.example.com"), vec![(variant("222"), 2)]);
        assert_eq!(link.to_url(), "https://backup.example.com/cart/222:2");
        assert_eq!(link.len(), 1);
    }

    #[test]
    fn test_multiple_lines_keep_order() {
        let link = CartPermalink::new(
            domain("backup.example.com"),
            vec![(variant("9"), 1), (variant("3"), 4), (variant("7"), 2)],
        );
        assert_eq!(link.to_url(), "https://backup.example.com/cart/9:1,3:4,7:2");
    }

    #[test]
    fn test_repeated_variant_is_not_merged() {
        let link = CartPermalink::new(
            domain("b.example.com"),
            vec![(variant("5"), 1), (variant("5"), 2)],
        );
        assert_eq!(link.to_url(), "https://b.example.com/cart/5:1,5:2");
    }
}
