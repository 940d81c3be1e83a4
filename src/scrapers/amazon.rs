use crate::models::{Listing, SHIPPING_NOT_SHOWN};
use scraper::{ElementRef, Html, Selector};

/// Origin prepended to relative result links
pub const AMAZON_ORIGIN: &str = "https://www.amazon.com";

/// Maximum number of listings kept from one results page
pub const MAX_LISTINGS: usize = 20;

const CARD_SELECTOR: &str = "div.s-result-item[data-component-type='s-search-result']";
const TITLE_SELECTOR: &str = "h2 span";
const PRICE_SELECTOR: &str = "span.a-price span.a-offscreen";
const SECONDARY_TEXT_SELECTOR: &str = "span.a-color-base";
const TITLE_LINK_SELECTOR: &str = "h2 a";

/// Turns an Amazon search-results page into used listings
pub struct AmazonExtractor;

impl AmazonExtractor {
    /// Extracts up to [`MAX_LISTINGS`] complete listings in page order.
    ///
    /// Never fails: the HTML parser is lenient and incomplete cards are
    /// skipped, so bad markup only yields fewer listings.
    pub fn extract(html: &str) -> Vec<Listing> {
        let document = Html::parse_document(html);

        let card_selector = match Selector::parse(CARD_SELECTOR) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::error!("Invalid card selector '{}': {}", CARD_SELECTOR, e);
                return Vec::new();
            }
        };

        let mut listings = Vec::new();
        let mut discarded = 0;

        for (index, card) in document.select(&card_selector).enumerate() {
            if listings.len() == MAX_LISTINGS {
                tracing::debug!("Reached {} listings, ignoring remaining cards", MAX_LISTINGS);
                break;
            }

            match Self::extract_listing(&card) {
                Some(listing) => {
                    tracing::trace!("Card #{}: {} ({})", index + 1, listing.title, listing.price);
                    listings.push(listing);
                }
                None => {
                    tracing::trace!("Card #{} - missing title, price or link, skipping", index + 1);
                    discarded += 1;
                }
            }
        }

        tracing::debug!("Extracted {} listings ({} cards discarded)", listings.len(), discarded);
        listings
    }

    /// Builds a listing from one card, or nothing if a required field is blank
    fn extract_listing(card: &ElementRef) -> Option<Listing> {
        let title = Self::extract_title(card);
        let price = Self::extract_price(card);
        let href = Self::extract_href(card);

        if title.is_empty() || price.is_empty() || href.is_empty() {
            return None;
        }

        Some(Listing {
            title,
            price,
            shipping: Self::extract_shipping(card),
            url: Self::build_full_url(&href),
        })
    }

    fn extract_title(card: &ElementRef) -> String {
        Self::first_match(card, TITLE_SELECTOR)
            .map(|el| Self::element_text(&el))
            .unwrap_or_default()
    }

    /// Reads the visually hidden price text of the price widget
    fn extract_price(card: &ElementRef) -> String {
        Self::first_match(card, PRICE_SELECTOR)
            .map(|el| Self::element_text(&el))
            .unwrap_or_default()
    }

    fn extract_shipping(card: &ElementRef) -> String {
        Selector::parse(SECONDARY_TEXT_SELECTOR)
            .ok()
            .and_then(|sel| {
                card.select(&sel)
                    .map(|el| Self::element_text(&el))
                    .find(|text| text.to_lowercase().contains("shipping"))
            })
            .unwrap_or_else(|| SHIPPING_NOT_SHOWN.to_string())
    }

    fn extract_href(card: &ElementRef) -> String {
        Self::first_match(card, TITLE_LINK_SELECTOR)
            .and_then(|el| el.value().attr("href"))
            .map(|href| href.trim().to_string())
            .unwrap_or_default()
    }

    /// Convert relative URL to absolute URL
    fn build_full_url(href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", AMAZON_ORIGIN, href)
        } else {
            format!("{}/{}", AMAZON_ORIGIN, href)
        }
    }

    fn first_match<'a>(card: &ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
        Selector::parse(selector)
            .ok()
            .and_then(|sel| card.select(&sel).next())
    }

    /// Text content with runs of whitespace collapsed, trimmed
    fn element_text(element: &ElementRef) -> String {
        element
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
