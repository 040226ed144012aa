// ============================================================================
// Order Book
// Matching-ready view assembled from active listings and bids
// ============================================================================
//
// The book is a derived, transient structure: it is rebuilt from aggregate
// state for each matching pass and never persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::bid::{Bid, BidKind};
use crate::domain::listing::{Listing, ListingStatus};

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Sell,
    Buy,
}

/// A flattened order-book line, independent of which aggregate it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookEntry {
    pub security_id: String,
    /// Underlying aggregate id (listing for sells, bid for buys).
    pub order_id: Uuid,
    pub user_id: String,
    pub side: Side,
    pub remaining: u64,
    /// `None` sells or buys at market.
    pub limit_price: Option<Decimal>,
    pub submitted_at: DateTime<Utc>,
    /// For sells: only accredited buyers may take this order.
    /// For buys: the buyer is accredited.
    pub accredited: bool,
    /// The order executes in a single full-quantity fill or not at all.
    pub all_or_none: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OrderBookEntry {
    /// Project an active listing onto the sell side.
    pub fn from_listing(listing: &Listing) -> Option<Self> {
        if listing.status != ListingStatus::Active || listing.shares_remaining == 0 {
            return None;
        }
        Some(Self {
            security_id: listing.security_id.clone(),
            order_id: *listing.id.as_uuid(),
            user_id: listing.seller_id.clone(),
            side: Side::Sell,
            remaining: listing.shares_remaining,
            limit_price: listing.matching_price(),
            submitted_at: listing.created_at,
            accredited: listing.accredited_only,
            all_or_none: false,
            expires_at: listing.expires_at,
        })
    }

    /// Project an open bid onto the buy side. Stop bids stay off the book
    /// until triggered.
    pub fn from_bid(bid: &Bid) -> Option<Self> {
        if !bid.status.is_open() || bid.shares_remaining == 0 {
            return None;
        }
        if !matches!(bid.kind, BidKind::Market | BidKind::Limit | BidKind::AllOrNone) {
            return None;
        }
        Some(Self {
            security_id: bid.security_id.clone(),
            order_id: *bid.id.as_uuid(),
            user_id: bid.bidder_id.clone(),
            side: Side::Buy,
            remaining: bid.shares_remaining,
            limit_price: bid.price,
            submitted_at: bid.created_at,
            accredited: bid.accredited,
            all_or_none: bid.kind == BidKind::AllOrNone,
            expires_at: bid.expires_at,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }
}

/// Compatibility check for a sell/buy pair: accreditation gating first, then
/// price crossing. A side without a limit is compatible with any price.
pub fn can_match(sell: &OrderBookEntry, buy: &OrderBookEntry) -> bool {
    if sell.accredited && !buy.accredited {
        return false;
    }
    match (sell.limit_price, buy.limit_price) {
        (Some(ask), Some(bid)) => bid >= ask,
        _ => true,
    }
}

// ============================================================================
// Book
// ============================================================================

/// All open orders for one security, both sides unsorted; algorithms apply
/// their own ordering.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub security_id: String,
    pub sells: Vec<OrderBookEntry>,
    pub buys: Vec<OrderBookEntry>,
}

impl OrderBook {
    pub fn new(security_id: &str) -> Self {
        Self {
            security_id: security_id.to_string(),
            sells: Vec::new(),
            buys: Vec::new(),
        }
    }

    /// Build the book from current aggregate state, dropping anything already
    /// past its expiration even if no expire command has run yet.
    pub fn assemble(
        security_id: &str,
        listings: &[Listing],
        bids: &[Bid],
        now: DateTime<Utc>,
    ) -> Self {
        let sells = listings
            .iter()
            .filter(|l| l.security_id == security_id)
            .filter_map(OrderBookEntry::from_listing)
            .filter(|e| !e.is_expired(now))
            .collect();
        let buys = bids
            .iter()
            .filter(|b| b.security_id == security_id)
            .filter_map(OrderBookEntry::from_bid)
            .filter(|e| !e.is_expired(now))
            .collect();
        Self {
            security_id: security_id.to_string(),
            sells,
            buys,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sells.is_empty() || self.buys.is_empty()
    }

    /// Sells in matching order: price ascending with market (unpriced) sells
    /// first, ties broken by submission time.
    pub fn sorted_sells(&self) -> Vec<OrderBookEntry> {
        let mut sells = self.sells.clone();
        sells.sort_by(|a, b| {
            price_key_asc(a.limit_price)
                .partial_cmp(&price_key_asc(b.limit_price))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        });
        sells
    }

    /// Buys in matching order: price descending with market buys first,
    /// ties broken by submission time.
    pub fn sorted_buys(&self) -> Vec<OrderBookEntry> {
        let mut buys = self.buys.clone();
        buys.sort_by(|a, b| {
            price_key_desc(a.limit_price)
                .partial_cmp(&price_key_desc(b.limit_price))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        });
        buys
    }

    /// Lowest priced ask, ignoring market sells.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.sells.iter().filter_map(|e| e.limit_price).min()
    }

    /// Highest priced bid, ignoring market buys.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.buys.iter().filter_map(|e| e.limit_price).max()
    }

    pub fn total_sell_shares(&self) -> u64 {
        self.sells.iter().map(|e| e.remaining).sum()
    }

    pub fn total_buy_shares(&self) -> u64 {
        self.buys.iter().map(|e| e.remaining).sum()
    }
}

// Market orders sort ahead of all priced orders on both sides.
fn price_key_asc(price: Option<Decimal>) -> (u8, Decimal) {
    match price {
        None => (0, Decimal::ZERO),
        Some(p) => (1, p),
    }
}

fn price_key_desc(price: Option<Decimal>) -> (u8, Decimal) {
    match price {
        None => (0, Decimal::ZERO),
        Some(p) => (1, -p),
    }
}
