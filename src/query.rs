//! Turns raw user input into something the ingestor can act on.
//!
//! Three input shapes are accepted: a listing-detail link (`/itm/<digits>`),
//! a search-results link with its filters in the query string, and plain
//! keyword text. Anything that looks like a link but yields neither a listing
//! id nor a keyword is `Invalid` and must be rejected before any network call.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::types::{BuyingOption, Query, SortKey};

lazy_static! {
    static ref ITEM_PATH_REGEX: Regex = Regex::new(r"/itm/(\d+)").unwrap();
}

/// Classified user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedInput {
    /// Listing-detail link; carries the embedded listing id.
    ListingId(String),
    /// Search-results link with its embedded filters.
    SearchLink(Query),
    /// Plain keyword text.
    Keyword(Query),
    Invalid(String),
}

impl NormalizedInput {
    /// The search query, for either search shape.
    pub fn query(&self) -> Option<&Query> {
        match self {
            NormalizedInput::SearchLink(q) | NormalizedInput::Keyword(q) => Some(q),
            _ => None,
        }
    }
}

pub fn normalize(raw: &str) -> NormalizedInput {
    let text = raw.trim();
    if text.is_empty() {
        return NormalizedInput::Invalid("empty input".to_string());
    }
    if looks_like_link(text) {
        return normalize_link(text);
    }
    NormalizedInput::Keyword(Query::keyword(text))
}

fn looks_like_link(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.contains("ebay.com/")
}

fn normalize_link(text: &str) -> NormalizedInput {
    let with_scheme = if text.contains("://") {
        text.to_string()
    } else {
        format!("https://{text}")
    };
    let url = match Url::parse(&with_scheme) {
        Ok(u) => u,
        Err(e) => return NormalizedInput::Invalid(format!("unparseable link: {e}")),
    };

    if url.path().contains("/itm/") {
        return match ITEM_PATH_REGEX.captures(url.path()) {
            Some(caps) => NormalizedInput::ListingId(caps[1].to_string()),
            None => NormalizedInput::Invalid("listing link has no numeric item id".to_string()),
        };
    }

    search_query_from_link(&url)
        .map(NormalizedInput::SearchLink)
        .unwrap_or_else(|| NormalizedInput::Invalid("search link has no keyword".to_string()))
}

/// Reads `_nkw`/`nkw`, `LH_Auction`, `_dcat` and `_sop` from a search-results link.
fn search_query_from_link(url: &Url) -> Option<Query> {
    let mut keyword = None;
    let mut auction_only = false;
    let mut category_id = None;
    let mut sort_key = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "_nkw" | "nkw" if keyword.is_none() && !value.trim().is_empty() => {
                keyword = Some(value.trim().to_string());
            }
            "LH_Auction" => auction_only = value == "1",
            "_dcat" if !value.is_empty() => category_id = Some(value.into_owned()),
            "_sop" => sort_key = SortKey::from_sort_code(&value),
            _ => {}
        }
    }

    Some(Query {
        keyword: keyword?,
        buying_option: if auction_only { BuyingOption::Auction } else { BuyingOption::Any },
        category_id,
        sort_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_keyword_defaults_to_auction_only() {
        let input = normalize("  charizard base set  ");
        assert_eq!(input, NormalizedInput::Keyword(Query::keyword("charizard base set")));
        assert_eq!(input.query().map(|q| q.buying_option), Some(BuyingOption::Auction));
    }

    #[test]
    fn listing_link_extracts_item_id() {
        let input = normalize("https://www.ebay.com/itm/256123456789?hash=item3ba1");
        assert_eq!(input, NormalizedInput::ListingId("256123456789".to_string()));
    }

    #[test]
    fn listing_link_without_scheme_is_accepted() {
        let input = normalize("www.ebay.com/itm/1234");
        assert_eq!(input, NormalizedInput::ListingId("1234".to_string()));
    }

    #[test]
    fn listing_link_without_id_is_invalid() {
        assert!(matches!(
            normalize("https://www.ebay.com/itm/some-title-slug"),
            NormalizedInput::Invalid(_)
        ));
    }

    #[test]
    fn search_link_parses_embedded_filters() {
        let input = normalize(
            "https://www.ebay.com/sch/i.html?_nkw=pikachu+psa+10&LH_Auction=1&_dcat=183454&_sop=1",
        );
        let NormalizedInput::SearchLink(q) = input else {
            panic!("expected search query");
        };
        assert_eq!(q.keyword, "pikachu psa 10");
        assert_eq!(q.buying_option, BuyingOption::Auction);
        assert_eq!(q.category_id.as_deref(), Some("183454"));
        assert_eq!(q.sort_key, Some(SortKey::EndingSoonest));
    }

    #[test]
    fn search_link_without_auction_flag_accepts_any_and_ignores_unknown_sort() {
        let input = normalize("https://www.ebay.com/sch/i.html?_nkw=mew&_sop=7");
        let NormalizedInput::SearchLink(q) = input else {
            panic!("expected search query");
        };
        assert_eq!(q.buying_option, BuyingOption::Any);
        assert_eq!(q.sort_key, None);
        assert_eq!(q.category_id, None);
    }

    #[test]
    fn search_link_without_keyword_is_invalid() {
        assert!(matches!(
            normalize("https://www.ebay.com/sch/i.html?LH_Auction=1"),
            NormalizedInput::Invalid(_)
        ));
    }

    #[test]
    fn empty_input_is_invalid() {
        assert!(matches!(normalize("   "), NormalizedInput::Invalid(_)));
    }
}
