/// Search endpoint of the marketplace
pub const SEARCH_ENDPOINT: &str = "https://www.amazon.com/s";

/// `rh` refinement restricting results to used-condition inventory
pub const USED_CONDITION_FILTER: &str = "p_n_condition-type%3A6461716011";

/// Builds the used-items search URL for a free-text query.
///
/// The query is form-encoded: spaces become `+`, every byte outside the
/// unreserved set is percent-encoded from its UTF-8 form.
pub fn build_search_url(query: &str) -> String {
    format!(
        "{}?k={}&rh={}",
        SEARCH_ENDPOINT,
        form_encode(query),
        USED_CONDITION_FILTER
    )
}

fn form_encode(value: &str) -> String {
    // urlencoding leaves only [A-Za-z0-9-_.~] untouched, so "%20" is always a space
    urlencoding::encode(value).replace("%20", "+")
}
