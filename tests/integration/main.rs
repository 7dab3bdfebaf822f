//! Integration tests for WSF Scraper
//!
//! Crawls run against wiremock servers; catalogs live in temp directories.

mod api_tests;
mod crawl_tests;
mod exchange_tests;
mod store_tests;
