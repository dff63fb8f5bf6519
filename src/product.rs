use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::Driver;
use crate::extract::{extract_field, first_match};
use crate::normalize::normalize_url;
use crate::selectors::{FieldSpec, SiteProfile};

/// One product listing. Every field is always populated; missing data shows
/// up as the field's "unavailable" sentinel.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub name: String,
    pub price: String,
    pub rating: String,
    pub rating_count: String,
    pub link: String,
    pub image: String,
}

/// Build up to `max_items` records from `nodes`, in the order given.
pub fn assemble_products<'a, D: Driver>(
    driver: &'a D,
    nodes: &[D::Node<'a>],
    profile: &SiteProfile,
    base_origin: &str,
    max_items: usize,
) -> Vec<ProductRecord> {
    nodes
        .iter()
        .take(max_items)
        .enumerate()
        .map(|(idx, node)| {
            let record = ProductRecord {
                name: extract_field(driver, node, &profile.name),
                price: extract_field(driver, node, &profile.price),
                rating: extract_field(driver, node, &profile.rating),
                rating_count: extract_field(driver, node, &profile.rating_count),
                link: extract_url(driver, node, &profile.link, base_origin),
                image: extract_url(driver, node, &profile.image, base_origin),
            };
            debug!("  [{}] {}...", idx + 1, preview(&record.name, 50));
            record
        })
        .collect()
}

fn extract_url<'a, D: Driver>(driver: &'a D, node: &D::Node<'a>, spec: &FieldSpec, base_origin: &str) -> String {
    first_match(driver, node, spec)
        .map(|raw| normalize_url(&raw, base_origin))
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| spec.default.to_string())
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HtmlSnapshot;
    use crate::extract::enumerate_candidates;
    use crate::selectors::*;

    const BASE: &str = "https://www.coupang.com";

    fn listing(n: usize) -> String {
        format!(
            r#"<li data-product-id="{n}">
                 <a class="search-product-link" href="/vp/products/{n}">
                   <img class="search-product-wrap-img" src="//thumbnail.coupangcdn.com/{n}.jpg">
                   <div class="name">Laptop {n}</div>
                 </a>
                 <strong class="price-value">{n},000</strong>
                 <em class="rating">4.5</em>
                 <span class="rating-total-count">({n})</span>
               </li>"#
        )
    }

    #[test]
    fn test_full_record() {
        let page = HtmlSnapshot::parse(&format!("<ul>{}</ul>", listing(7)));
        let nodes = enumerate_candidates(&page, &COUPANG.containers);
        let records = assemble_products(&page, &nodes, &COUPANG, BASE, 10);

        assert_eq!(
            records,
            vec![ProductRecord {
                name: "Laptop 7".into(),
                price: "7,000".into(),
                rating: "4.5".into(),
                rating_count: "(7)".into(),
                link: "https://www.coupang.com/vp/products/7".into(),
                image: "https://thumbnail.coupangcdn.com/7.jpg".into(),
            }]
        );
    }

    #[test]
    fn test_partial_record_uses_sentinels() {
        let page = HtmlSnapshot::parse(r#"<ul><li data-product-id="1"><span>bare</span></li></ul>"#);
        let nodes = enumerate_candidates(&page, &COUPANG.containers);
        let records = assemble_products(&page, &nodes, &COUPANG, BASE, 10);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, NAME_UNAVAILABLE);
        assert_eq!(record.price, PRICE_UNAVAILABLE);
        assert_eq!(record.rating, RATING_UNAVAILABLE);
        assert_eq!(record.rating_count, RATING_COUNT_UNAVAILABLE);
        assert_eq!(record.link, LINK_UNAVAILABLE);
        assert_eq!(record.image, IMAGE_UNAVAILABLE);
    }

    #[test]
    fn test_empty_href_is_unavailable() {
        let page = HtmlSnapshot::parse(
            r#"<ul><li data-product-id="1"><a class="search-product-link" href="">x</a></li></ul>"#,
        );
        let nodes = enumerate_candidates(&page, &COUPANG.containers);
        let records = assemble_products(&page, &nodes, &COUPANG, BASE, 10);
        assert_eq!(records[0].link, LINK_UNAVAILABLE);
        // the anchor text still serves as the name fallback
        assert_eq!(records[0].name, "x");
    }

    #[test]
    fn test_lazy_image_attribute() {
        let page = HtmlSnapshot::parse(
            r#"<ul><li data-product-id="1"><img data-img-src="/img/1.png"></li></ul>"#,
        );
        let nodes = enumerate_candidates(&page, &COUPANG.containers);
        let records = assemble_products(&page, &nodes, &COUPANG, BASE, 10);
        assert_eq!(records[0].image, "https://www.coupang.com/img/1.png");
    }

    #[test]
    fn test_bounded_and_ordered() {
        let items: String = (0..23).map(listing).collect();
        let page = HtmlSnapshot::parse(&format!("<ul>{}</ul>", items));
        let nodes = enumerate_candidates(&page, &COUPANG.containers);
        assert_eq!(nodes.len(), 23);

        let records = assemble_products(&page, &nodes, &COUPANG, BASE, 10);
        assert_eq!(records.len(), 10);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.name, format!("Laptop {}", i));
        }

        assert!(assemble_products(&page, &nodes, &COUPANG, BASE, 0).is_empty());
        assert_eq!(assemble_products(&page, &nodes, &COUPANG, BASE, 100).len(), 23);
    }

    #[test]
    fn test_serializes_camel_case() {
        let record = ProductRecord {
            name: "n".into(),
            price: "p".into(),
            rating: "r".into(),
            rating_count: "c".into(),
            link: "l".into(),
            image: "i".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ratingCount"], "c");
        assert_eq!(json.as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("노트북 게이밍", 3), "노트북");
        assert_eq!(preview("short", 50), "short");
    }
}
