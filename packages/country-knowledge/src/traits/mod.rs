//! Core trait abstractions.
//!
//! Applications plug document sources in through [`fetcher::Fetcher`].

pub mod fetcher;
