// ============================================================================
// Locator chains and field specs for the search-results page
// ============================================================================

/// Priority-ordered list of CSS selectors. The first entry is tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorChain(&'static [&'static str]);

impl LocatorChain {
    pub const fn new(locators: &'static [&'static str]) -> Self {
        assert!(!locators.is_empty(), "a locator chain needs at least one locator");
        Self(locators)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How a field's value is read off the element a locator resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Trimmed visible text.
    Text,
    /// First non-empty attribute among the candidates, in order.
    Attribute(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub locators: LocatorChain,
    pub mode: ExtractMode,
    /// Returned when no locator in the chain resolves.
    pub default: &'static str,
}

impl FieldSpec {
    pub const fn text(locators: LocatorChain, default: &'static str) -> Self {
        Self { locators, mode: ExtractMode::Text, default }
    }

    pub const fn attribute(
        locators: LocatorChain,
        names: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self { locators, mode: ExtractMode::Attribute(names), default }
    }
}

/// Everything site-specific the pipeline needs: where results live and how
/// each field is found inside one result.
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    pub search_path: &'static str,
    /// Any one of these being visible means results have rendered.
    pub readiness: LocatorChain,
    /// Result-container strategies, best first.
    pub containers: LocatorChain,
    pub name: FieldSpec,
    pub price: FieldSpec,
    pub rating: FieldSpec,
    pub rating_count: FieldSpec,
    pub link: FieldSpec,
    pub image: FieldSpec,
}

impl SiteProfile {
    /// `{base}{search_path}?q={keyword}&channel=user`, keyword percent-encoded.
    pub fn search_url(&self, base_url: &str, keyword: &str) -> String {
        format!(
            "{}{}?q={}&channel=user",
            base_url.trim_end_matches('/'),
            self.search_path,
            urlencoding::encode(keyword)
        )
    }
}

pub const NAME_UNAVAILABLE: &str = "name unavailable";
pub const PRICE_UNAVAILABLE: &str = "price unavailable";
pub const RATING_UNAVAILABLE: &str = "rating unavailable";
pub const RATING_COUNT_UNAVAILABLE: &str = "rating count unavailable";
pub const LINK_UNAVAILABLE: &str = "link unavailable";
pub const IMAGE_UNAVAILABLE: &str = "image unavailable";

const PRODUCT_CONTAINERS: LocatorChain = LocatorChain::new(&[
    "li.search-product",
    "ul.search-product-list > li",
    "li[data-product-id]",
]);

pub const COUPANG: SiteProfile = SiteProfile {
    search_path: "/np/search",
    readiness: PRODUCT_CONTAINERS,
    containers: PRODUCT_CONTAINERS,
    name: FieldSpec::text(
        LocatorChain::new(&[
            "div.name",
            "a.search-product-link div.name",
            "div[class*='name']",
            "a.search-product-link",
        ]),
        NAME_UNAVAILABLE,
    ),
    price: FieldSpec::text(
        LocatorChain::new(&[
            "strong.price-value",
            "span.price-value",
            "strong[class*='price']",
            "span[class*='price']",
        ]),
        PRICE_UNAVAILABLE,
    ),
    rating: FieldSpec::text(
        LocatorChain::new(&[
            "em.rating",
            "span.rating",
            "em[class*='rating']",
            "span[class*='rating']",
        ]),
        RATING_UNAVAILABLE,
    ),
    rating_count: FieldSpec::text(
        LocatorChain::new(&[
            "span.rating-total-count",
            "em.rating-total-count",
            "span[class*='rating-total']",
            "em[class*='rating-total']",
        ]),
        RATING_COUNT_UNAVAILABLE,
    ),
    link: FieldSpec::attribute(
        LocatorChain::new(&[
            "a.search-product-link",
            "a[href*='/products/']",
            "a[class*='product-link']",
        ]),
        &["href"],
        LINK_UNAVAILABLE,
    ),
    image: FieldSpec::attribute(
        LocatorChain::new(&[
            "img.search-product-wrap-img",
            "img[class*='product-image']",
            "img[class*='product-img']",
            "img[data-img-src]",
        ]),
        // lazy-loaded thumbnails keep the real URL in a data attribute
        &["src", "data-img-src", "data-lazy-src"],
        IMAGE_UNAVAILABLE,
    ),
};
