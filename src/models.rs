use serde::{Deserialize, Serialize};

/// Shipping text used when a card carries no shipping note
pub const SHIPPING_NOT_SHOWN: &str = "Shipping not shown";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    pub title: String,
    pub price: String, // Kept as displayed, e.g. "$129.99"
    pub shipping: String,
    pub url: String, // Always absolute
}

impl Listing {
    /// Stable key for list rendering and case-insensitive de-duplication
    pub fn key(&self) -> String {
        self.url.to_lowercase()
    }

    pub fn format_terminal_entry(&self, position: usize) -> String {
        let mut entry = format!("{:>2}. {}\n", position, self.title);
        entry.push_str(&format!("    💰 {}\n", self.price));
        entry.push_str(&format!("    📦 {}\n", self.shipping));
        entry.push_str(&format!("    🔗 {}", self.url));
        entry
    }
}

/// Drops listings whose key was already seen, keeping the first occurrence
pub fn dedup_by_key(listings: &[Listing]) -> Vec<Listing> {
    let mut seen = std::collections::HashSet::new();
    listings
        .iter()
        .filter(|listing| seen.insert(listing.key()))
        .cloned()
        .collect()
}
