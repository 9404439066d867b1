//! Product extraction from outlet page markup.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::error::ScrapeError;
use crate::models::{Locale, ProductSnapshot};

// Each selector lists several alternative markers so the parser survives
// storefront markup drift.
pub(crate) const PRODUCT_CARD_SELECTOR: &str =
    "li.product-card, div.product-card, article.product-card";
const PRODUCT_LINK_SELECTOR: &str =
    "a.product-card__link, a.product-card__image-link, a[href*='/products/']";
const PRODUCT_NAME_SELECTOR: &str = "h3.product-card__title, span.product-card__title, \
     h2.product-card__title, .product-card__name";
const PRODUCT_PRICE_SELECTOR: &str = "span.product-card__price--sale, \
     span.product-card__price--current, .product-card__price--now, .price--sale";
const PRODUCT_ORIGINAL_PRICE_SELECTOR: &str = "span.product-card__price--original, \
     span.product-card__price--was, .product-card__price--before, .price--original";
const PRODUCT_SIZE_SELECTOR: &str = "ul.product-card__sizes li, .product-card__sizes span, \
     .product-card__size-list span, .size-option";
const PRODUCT_IMAGE_SELECTOR: &str =
    "img.product-card__image, img.product-card__img, .product-card img";
const PRODUCT_CATEGORY_SELECTOR: &str =
    "span.product-card__category, .product-card__category, .product-card__type";

/// Keyword lookup for inferring a category from a product name when the card
/// carries no explicit category element. First match wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Jackets", &["jacket", "anorak", "parka", "coat", "shell"]),
    ("Pants", &["pant", "trouser", "bibs"]),
    ("Fleece", &["fleece", "midlayer"]),
    ("Base Layer", &["base layer", "wool", "merino", "superlight"]),
    ("Shirts", &["shirt", "tee", "t-shirt"]),
    ("Shorts", &["short"]),
    ("Accessories", &["hat", "cap", "glove", "beanie", "headband", "belt", "gaiter"]),
    ("Bags", &["bag", "pack", "backpack", "duffel"]),
    ("Footwear", &["boot", "shoe"]),
    ("Skirts & Dresses", &["skirt", "dress"]),
    ("Vests", &["vest", "gilet"]),
];

/// Extracts a numeric price from text like `£149.00`, `kr 1 299,-` or
/// `1.299,00`.
///
/// The separator heuristic is deliberate: two digits after a comma make the
/// comma a decimal separator, any other comma is a thousands separator, and
/// a value carrying both treats `.` as thousands and `,` as decimal.
/// Unparsable text yields `0.0`, never an error.
pub fn parse_price(text: &str) -> f64 {
    let mut cleaned = text.trim().to_string();
    for token in ["£", "$", "€", "kr", "NOK", "GBP", ",-"] {
        cleaned = cleaned.replace(token, "");
    }
    let mut cleaned = cleaned.trim().to_string();

    if cleaned.contains(',') && cleaned.contains('.') {
        // e.g. "1.299,00" -> "1299.00"
        cleaned = cleaned.replace('.', "").replace(',', ".");
    } else if cleaned.contains(',') {
        let parts: Vec<&str> = cleaned.split(',').collect();
        if parts.len() == 2 && parts[1].len() == 2 {
            // e.g. "149,00" -> "149.00"
            cleaned = cleaned.replace(',', ".");
        } else {
            // e.g. "1,299" -> "1299"
            cleaned = cleaned.replace(',', "");
        }
    }

    let cleaned = cleaned.replace([' ', '\u{a0}'], "");
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Discount percentage, clamped to >= 0 and rounded to one decimal place.
/// A non-positive original price yields zero.
pub fn discount_pct(original: f64, current: f64) -> f64 {
    if original <= 0.0 {
        return 0.0;
    }
    let discount = ((original - current) / original) * 100.0;
    (discount.max(0.0) * 10.0).round() / 10.0
}

/// Infers a category from the product name, defaulting to `Other`.
pub fn infer_category(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return category;
        }
    }
    "Other"
}

/// Parses outlet page markup into product snapshots.
///
/// A malformed individual product fragment is skipped and logged; it never
/// aborts the whole parse.
pub struct ProductParser {
    locale: Locale,
    base_url: Url,
    cards: Selector,
    link: Selector,
    name: Selector,
    price: Selector,
    original_price: Selector,
    sizes: Selector,
    image: Selector,
    category: Selector,
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(e.to_string()))
}

impl ProductParser {
    /// Creates a parser for one locale. `base_url` is the outlet origin that
    /// relative product and image links are resolved against.
    pub fn new(locale: Locale, base_url: Url) -> Result<Self, ScrapeError> {
        Ok(Self {
            locale,
            base_url,
            cards: selector(PRODUCT_CARD_SELECTOR)?,
            link: selector(PRODUCT_LINK_SELECTOR)?,
            name: selector(PRODUCT_NAME_SELECTOR)?,
            price: selector(PRODUCT_PRICE_SELECTOR)?,
            original_price: selector(PRODUCT_ORIGINAL_PRICE_SELECTOR)?,
            sizes: selector(PRODUCT_SIZE_SELECTOR)?,
            image: selector(PRODUCT_IMAGE_SELECTOR)?,
            category: selector(PRODUCT_CATEGORY_SELECTOR)?,
        })
    }

    /// Extracts all parseable products from the given markup.
    pub fn parse(&self, html: &str) -> Vec<ProductSnapshot> {
        let document = Html::parse_document(html);
        let now = Utc::now();
        let mut products = Vec::new();

        for card in document.select(&self.cards) {
            match self.parse_card(card, now) {
                Some(product) => products.push(product),
                None => {
                    let fragment: String = card.html().chars().take(200).collect();
                    tracing::warn!(%fragment, "Skipping unparseable product fragment.");
                }
            }
        }

        tracing::info!(count = products.len(), locale = %self.locale, "Products parsed.");
        products
    }

    fn parse_card(&self, card: ElementRef<'_>, now: DateTime<Utc>) -> Option<ProductSnapshot> {
        let link = card.select(&self.link).next()?;
        let href = link.value().attr("href").unwrap_or_default();
        if href.is_empty() {
            return None;
        }
        let product_url = self.resolve(href)?;

        let mut name = self.text_of(card, &self.name);
        if name.is_empty() {
            // Fall back to the link text.
            name = text_content(link);
        }
        if name.is_empty() {
            return None;
        }

        let price = card
            .select(&self.price)
            .next()
            .map(|el| parse_price(&text_content(el)))
            .unwrap_or(0.0);
        let original_price = card
            .select(&self.original_price)
            .next()
            .map(|el| parse_price(&text_content(el)))
            .unwrap_or(price);

        let available_sizes: Vec<String> = card
            .select(&self.sizes)
            .map(text_content)
            .filter(|s| !s.is_empty())
            .collect();

        let category = {
            let explicit = self.text_of(card, &self.category);
            if explicit.is_empty() { infer_category(&name).to_string() } else { explicit }
        };

        let image_url = card
            .select(&self.image)
            .next()
            .and_then(|img| {
                let src = img.value().attr("src").or_else(|| img.value().attr("data-src"))?;
                if src.is_empty() { None } else { self.resolve(src) }
            })
            .unwrap_or_default();

        Some(ProductSnapshot {
            discount_pct: discount_pct(original_price, price),
            name,
            url: product_url,
            price,
            original_price,
            available_sizes,
            category,
            image_url,
            locale: self.locale,
            scraped_at: now,
        })
    }

    fn text_of(&self, card: ElementRef<'_>, selector: &Selector) -> String {
        card.select(selector).next().map(text_content).unwrap_or_default()
    }

    fn resolve(&self, href: &str) -> Option<String> {
        if href.starts_with("http") {
            Some(href.to_string())
        } else {
            self.base_url.join(href).ok().map(Into::into)
        }
    }
}

fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ProductParser {
        ProductParser::new(Locale::EnGb, Url::parse("https://www.norrona.com").unwrap()).unwrap()
    }

    #[test]
    fn parses_uk_price_format() {
        assert_eq!(parse_price("£280.00"), 280.00);
    }

    #[test]
    fn parses_norwegian_price_format() {
        assert_eq!(parse_price("kr 3 499,-"), 3499.0);
    }

    #[test]
    fn parses_european_thousands_format() {
        assert_eq!(parse_price("1.299,00"), 1299.00);
    }

    #[test]
    fn comma_decimal_with_two_digits() {
        assert_eq!(parse_price("149,00"), 149.00);
    }

    #[test]
    fn comma_thousands_without_decimals() {
        assert_eq!(parse_price("1,299"), 1299.0);
    }

    #[test]
    fn unparsable_price_yields_zero() {
        assert_eq!(parse_price("call for price"), 0.0);
    }

    #[test]
    fn discount_is_rounded_and_clamped() {
        assert_eq!(discount_pct(400.0, 280.0), 30.0);
        assert_eq!(discount_pct(100.0, 150.0), 0.0);
        assert_eq!(discount_pct(0.0, 50.0), 0.0);
        assert_eq!(discount_pct(299.0, 199.0), 33.4);
    }

    #[test]
    fn category_inference_from_name() {
        assert_eq!(infer_category("Falketind Gore-Tex Jacket"), "Jackets");
        assert_eq!(infer_category("Femund Merino Longsleeve"), "Base Layer");
        assert_eq!(infer_category("Mystery Item"), "Other");
    }

    const PAGE: &str = r#"
        <html><body><ul>
          <li class="product-card">
            <a class="product-card__link" href="/en-GB/products/falketind-jacket">
              <h3 class="product-card__title">Falketind Gore-Tex Jacket</h3>
            </a>
            <span class="product-card__price--sale">£280.00</span>
            <span class="product-card__price--original">£400.00</span>
            <ul class="product-card__sizes"><li>S</li><li>M</li><li>L</li></ul>
            <img class="product-card__image" src="/images/falketind.jpg">
          </li>
          <li class="product-card">
            <span class="product-card__title">Card without a link</span>
          </li>
        </ul></body></html>"#;

    #[test]
    fn parses_cards_and_skips_malformed_fragments() {
        let products = parser().parse(PAGE);
        assert_eq!(products.len(), 1);

        let product = &products[0];
        assert_eq!(product.name, "Falketind Gore-Tex Jacket");
        assert_eq!(product.url, "https://www.norrona.com/en-GB/products/falketind-jacket");
        assert_eq!(product.price, 280.0);
        assert_eq!(product.original_price, 400.0);
        assert_eq!(product.discount_pct, 30.0);
        assert_eq!(product.available_sizes, vec!["S", "M", "L"]);
        assert_eq!(product.category, "Jackets");
        assert_eq!(product.image_url, "https://www.norrona.com/images/falketind.jpg");
        assert_eq!(product.locale, Locale::EnGb);
    }

    #[test]
    fn explicit_category_wins_over_inference() {
        let html = r#"
          <div class="product-card">
            <a class="product-card__link" href="/p/1"><span class="product-card__title">Trollveggen Jacket</span></a>
            <span class="product-card__category">Hardshell</span>
          </div>"#;
        let products = parser().parse(html);
        assert_eq!(products[0].category, "Hardshell");
    }

    #[test]
    fn missing_price_defaults_to_zero() {
        let html = r#"
          <div class="product-card">
            <a class="product-card__link" href="/p/2"><span class="product-card__title">Senja Shorts</span></a>
          </div>"#;
        let products = parser().parse(html);
        assert_eq!(products[0].price, 0.0);
        assert_eq!(products[0].original_price, 0.0);
        assert_eq!(products[0].discount_pct, 0.0);
    }
}
