// ============================================================================
// Order Book Source Interface
// Where the engine gets current listings and bids for a security
// ============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::bid::Bid;
use crate::domain::listing::Listing;

/// Supplier of current aggregate state for book assembly. The engine only
/// reads through this; mutations flow through the event-sourced repository.
pub trait OrderBookSource: Send + Sync {
    fn active_listings(&self, security_id: &str) -> Vec<Listing>;
    fn active_bids(&self, security_id: &str) -> Vec<Bid>;
}

/// In-memory source keyed by security, suitable for tests and single-process
/// deployments. Entries are whole aggregates; the book assembly step does the
/// open/expired filtering.
#[derive(Default)]
pub struct InMemoryOrderBookSource {
    listings: RwLock<HashMap<String, Vec<Listing>>>,
    bids: RwLock<HashMap<String, Vec<Bid>>>,
}

impl InMemoryOrderBookSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a listing under its security.
    pub fn upsert_listing(&self, listing: Listing) {
        let mut listings = self.listings.write();
        let entries = listings.entry(listing.security_id.clone()).or_default();
        if let Some(existing) = entries.iter_mut().find(|l| l.id == listing.id) {
            *existing = listing;
        } else {
            entries.push(listing);
        }
    }

    /// Insert or replace a bid under its security.
    pub fn upsert_bid(&self, bid: Bid) {
        let mut bids = self.bids.write();
        let entries = bids.entry(bid.security_id.clone()).or_default();
        if let Some(existing) = entries.iter_mut().find(|b| b.id == bid.id) {
            *existing = bid;
        } else {
            entries.push(bid);
        }
    }
}

impl OrderBookSource for InMemoryOrderBookSource {
    fn active_listings(&self, security_id: &str) -> Vec<Listing> {
        self.listings
            .read()
            .get(security_id)
            .cloned()
            .unwrap_or_default()
    }

    fn active_bids(&self, security_id: &str) -> Vec<Bid> {
        self.bids
            .read()
            .get(security_id)
            .cloned()
            .unwrap_or_default()
    }
}
