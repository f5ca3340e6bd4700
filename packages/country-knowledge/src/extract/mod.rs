//! Document extraction.
//!
//! - [`listing`] - country/capital stubs from listing tables
//! - [`detail`] - infobox fields and summary from a country page
//! - [`rules`] - declarative label and column rules both consume
//! - `html` - `scraper` traversals both are built on
//!
//! Nothing here touches the network.

pub mod detail;
mod html;
pub mod listing;
pub mod rules;

pub use detail::{extract_detail, truncate, ExtractedDetail, TRUNCATION_MARKER};
pub use listing::{extract_listing, Listing};
pub use rules::{FieldRule, FieldRules, ListingRules};
