//! Product-listing extraction from dynamically rendered search-results pages.

pub mod api;
pub mod config;
pub mod console;
pub mod crawler;
pub mod dashboard;
pub mod driver;
pub mod extract;
pub mod normalize;
pub mod product;
pub mod readiness;
pub mod selectors;
