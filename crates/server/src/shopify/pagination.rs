//! Cursor extraction from Shopify `Link` headers.
//!
//! Shopify paginates REST collections with a header of the form:
//!
//! ```text
//! Link: <https://shop.myshopify.com/admin/api/2026-01/products.json?limit=250&page_info=abc>; rel="previous",
//!       <https://shop.myshopify.com/admin/api/2026-01/products.json?limit=250&page_info=def>; rel="next"
//! ```

use url::Url;

/// Extract the `page_info` cursor of the `rel="next"` link, if present.
#[must_use]
pub fn next_page_info(link_header: Option<&str>) -> Option<String> {
    let header = link_header?;

    header.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }

        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        let url = Url::parse(url).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page_info")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    })
}
