//! Stoneyard Market Data Crate
//!
//! Upstream access layer for the stoneyard backend. Two sources exist:
//!
//! - a slow-changing **catalog API** serving the full item list in one
//!   envelope (`CatalogClient`), and
//! - a fast-changing **price API** serving per-item bazaar snapshots and
//!   auction listings (`PriceClient`).
//!
//! The price API enforces a global quota, so all outbound price calls go
//! through a single shared [`RequestPacer`] and an indefinite-retry loop
//! for HTTP 429 governed by [`BackoffPolicy`]. Both clients sit behind
//! `async_trait` seams ([`PriceSource`], [`CatalogSource`]) so the sync
//! layer can be exercised with in-memory fakes.

pub mod backoff;
pub mod catalog;
pub mod client;
pub mod errors;
pub mod models;
pub mod pacer;

pub use backoff::BackoffPolicy;
pub use catalog::{CatalogClient, CatalogSource};
pub use client::{PriceClient, PriceSource};
pub use errors::FetchError;
pub use models::{
    lowest_viable_price, top_buy_orders, top_sell_orders, AuctionListing, BazaarSnapshot,
    CatalogItem, CatalogResponse, OrderSummary,
};
pub use pacer::RequestPacer;
