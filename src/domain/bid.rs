// ============================================================================
// Bid Aggregate (buy-side order)
// A request to buy shares, filled incrementally by matching
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregate::{Aggregate, DomainEvent};
use crate::domain::listing::ListingId;
use crate::domain::trade::TradeId;
use crate::error::DomainError;

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidId(Uuid);

impl BidId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BidId {
    fn default() -> Self {
        Self(Uuid::nil())
    }
}

impl std::fmt::Display for BidId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Pricing policy of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidKind {
    /// Buy at whatever the market asks.
    Market,
    /// Buy at or below a limit price.
    Limit,
    /// Becomes a market bid once the stop price is touched.
    Stop,
    /// Becomes a limit bid once the stop price is touched.
    StopLimit,
    /// Limit bid that must be filled in full or not at all.
    AllOrNone,
}

impl BidKind {
    /// Whether bids of this kind carry a limit price.
    pub fn has_limit(&self) -> bool {
        matches!(self, BidKind::Limit | BidKind::StopLimit | BidKind::AllOrNone)
    }

    /// Whether bids of this kind carry a stop trigger.
    pub fn has_stop(&self) -> bool {
        matches!(self, BidKind::Stop | BidKind::StopLimit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidStatus {
    Active,
    PartiallyFilled,
    Filled,
    Withdrawn,
    Expired,
    Rejected,
}

impl BidStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BidStatus::Filled | BidStatus::Withdrawn | BidStatus::Expired | BidStatus::Rejected
        )
    }

    /// Statuses under which the bid still participates in matching.
    pub fn is_open(&self) -> bool {
        matches!(self, BidStatus::Active | BidStatus::PartiallyFilled)
    }
}

/// One partial fill against this bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidFill {
    pub trade_id: TradeId,
    pub shares: u64,
    pub price: Decimal,
    pub counterparty: String,
    pub filled_at: DateTime<Utc>,
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BidEvent {
    Placed {
        id: BidId,
        listing_id: Option<ListingId>,
        security_id: String,
        bidder_id: String,
        shares: u64,
        price: Option<Decimal>,
        stop_price: Option<Decimal>,
        kind: BidKind,
        accredited: bool,
        expires_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    Filled {
        fill: BidFill,
    },
    Withdrawn {
        at: DateTime<Utc>,
    },
    Expired {
        at: DateTime<Utc>,
    },
    Rejected {
        reason: String,
        at: DateTime<Utc>,
    },
    SharesChanged {
        shares: u64,
        at: DateTime<Utc>,
    },
}

impl DomainEvent for BidEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BidEvent::Placed { .. } => "bid.placed",
            BidEvent::Filled { .. } => "bid.filled",
            BidEvent::Withdrawn { .. } => "bid.withdrawn",
            BidEvent::Expired { .. } => "bid.expired",
            BidEvent::Rejected { .. } => "bid.rejected",
            BidEvent::SharesChanged { .. } => "bid.shares_changed",
        }
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Parameters for placing a new bid.
#[derive(Debug, Clone)]
pub struct PlaceBid {
    pub listing_id: Option<ListingId>,
    pub security_id: String,
    pub bidder_id: String,
    pub shares: u64,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub kind: BidKind,
    pub accredited: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Buy-side order aggregate.
///
/// Invariant: `shares_requested == shares_remaining + shares_filled`, and
/// `shares_remaining` never goes negative. The running average fill price is
/// the share-weighted average across all fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub listing_id: Option<ListingId>,
    pub security_id: String,
    pub bidder_id: String,
    pub shares_requested: u64,
    pub shares_remaining: u64,
    pub shares_filled: u64,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub kind: BidKind,
    pub status: BidStatus,
    pub accredited: bool,
    pub average_fill_price: Decimal,
    pub fills: Vec<BidFill>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Default for Bid {
    fn default() -> Self {
        Self {
            id: BidId::default(),
            listing_id: None,
            security_id: String::new(),
            bidder_id: String::new(),
            shares_requested: 0,
            shares_remaining: 0,
            shares_filled: 0,
            price: None,
            stop_price: None,
            kind: BidKind::Market,
            status: BidStatus::Active,
            accredited: false,
            average_fill_price: Decimal::ZERO,
            fills: Vec::new(),
            created_at: DateTime::<Utc>::MIN_UTC,
            expires_at: None,
            version: 0,
        }
    }
}

impl Bid {
    // ========================================================================
    // Commands
    // ========================================================================

    pub fn place(params: PlaceBid) -> Result<BidEvent, DomainError> {
        if params.security_id.is_empty() {
            return Err(DomainError::Validation("security id is required".into()));
        }
        if params.bidder_id.is_empty() {
            return Err(DomainError::Validation("bidder id is required".into()));
        }
        if params.shares == 0 {
            return Err(DomainError::Validation(
                "shares requested must be positive".into(),
            ));
        }
        if params.kind.has_limit() {
            match params.price {
                Some(p) if p > Decimal::ZERO => {}
                Some(_) => {
                    return Err(DomainError::Validation("bid price must be positive".into()))
                }
                None => {
                    return Err(DomainError::Validation(format!(
                        "{:?} bids require a price",
                        params.kind
                    )))
                }
            }
        }
        if params.kind.has_stop() {
            match params.stop_price {
                Some(p) if p > Decimal::ZERO => {}
                _ => {
                    return Err(DomainError::Validation(format!(
                        "{:?} bids require a positive stop price",
                        params.kind
                    )))
                }
            }
        }

        Ok(BidEvent::Placed {
            id: BidId::new(),
            listing_id: params.listing_id,
            security_id: params.security_id,
            bidder_id: params.bidder_id,
            shares: params.shares,
            price: params.price,
            stop_price: params.stop_price,
            kind: params.kind,
            accredited: params.accredited,
            expires_at: params.expires_at,
            at: Utc::now(),
        })
    }

    /// Record a partial fill produced by matching. The transition to `Filled`
    /// happens atomically with the fill that drains the bid.
    pub fn fill(
        &self,
        trade_id: TradeId,
        shares: u64,
        price: Decimal,
        counterparty: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<BidEvent>, DomainError> {
        if !self.status.is_open() {
            return Err(DomainError::guard(self.status, "fill"));
        }
        if shares == 0 {
            return Err(DomainError::Validation("fill must be positive".into()));
        }
        if shares > self.shares_remaining {
            return Err(DomainError::Validation(format!(
                "cannot fill {} shares: only {} remaining",
                shares, self.shares_remaining
            )));
        }
        if self.kind == BidKind::AllOrNone && shares != self.shares_remaining {
            return Err(DomainError::Validation(format!(
                "all-or-none bid requires a full fill of {} shares, got {}",
                self.shares_remaining, shares
            )));
        }
        if self.kind.has_limit() {
            if let Some(limit) = self.price {
                if price > limit {
                    return Err(DomainError::Validation(format!(
                        "fill price {} exceeds bid limit {}",
                        price, limit
                    )));
                }
            }
        }

        Ok(vec![BidEvent::Filled {
            fill: BidFill {
                trade_id,
                shares,
                price,
                counterparty: counterparty.to_string(),
                filled_at: at,
            },
        }])
    }

    pub fn withdraw(&self, at: DateTime<Utc>) -> Result<Vec<BidEvent>, DomainError> {
        if !self.status.is_open() {
            return Err(DomainError::guard(self.status, "withdraw"));
        }
        Ok(vec![BidEvent::Withdrawn { at }])
    }

    /// Externally driven expiration: the caller decides `now > expires_at`.
    pub fn expire(&self, now: DateTime<Utc>) -> Result<Vec<BidEvent>, DomainError> {
        if !self.status.is_open() {
            return Err(DomainError::guard(self.status, "expire"));
        }
        match self.expires_at {
            Some(expires_at) if now > expires_at => Ok(vec![BidEvent::Expired { at: now }]),
            Some(_) => Err(DomainError::Validation(
                "bid has not reached its expiration".into(),
            )),
            None => Err(DomainError::Validation("bid never expires".into())),
        }
    }

    pub fn reject(&self, reason: &str, at: DateTime<Utc>) -> Result<Vec<BidEvent>, DomainError> {
        if self.status != BidStatus::Active {
            return Err(DomainError::guard(self.status, "reject"));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "rejection reason is required".into(),
            ));
        }
        Ok(vec![BidEvent::Rejected {
            reason: reason.to_string(),
            at,
        }])
    }

    /// Change the requested share count. Shrinking below what has already
    /// been filled is rejected.
    pub fn change_shares(
        &self,
        shares: u64,
        at: DateTime<Utc>,
    ) -> Result<Vec<BidEvent>, DomainError> {
        if !self.status.is_open() {
            return Err(DomainError::guard(self.status, "change shares"));
        }
        if shares == 0 {
            return Err(DomainError::Validation(
                "shares requested must be positive".into(),
            ));
        }
        if shares < self.shares_filled {
            return Err(DomainError::Validation(format!(
                "cannot reduce to {} shares: {} already filled",
                shares, self.shares_filled
            )));
        }
        if shares == self.shares_requested {
            return Err(DomainError::Validation(
                "requested shares are unchanged".into(),
            ));
        }
        Ok(vec![BidEvent::SharesChanged { shares, at }])
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }
}

impl Aggregate for Bid {
    type Event = BidEvent;

    const KIND: &'static str = "bid";

    fn entity_id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn apply(&mut self, event: &BidEvent) {
        match event {
            BidEvent::Placed {
                id,
                listing_id,
                security_id,
                bidder_id,
                shares,
                price,
                stop_price,
                kind,
                accredited,
                expires_at,
                at,
            } => {
                self.id = *id;
                self.listing_id = *listing_id;
                self.security_id = security_id.clone();
                self.bidder_id = bidder_id.clone();
                self.shares_requested = *shares;
                self.shares_remaining = *shares;
                self.shares_filled = 0;
                self.price = *price;
                self.stop_price = *stop_price;
                self.kind = *kind;
                self.status = BidStatus::Active;
                self.accredited = *accredited;
                self.created_at = *at;
                self.expires_at = *expires_at;
            }
            BidEvent::Filled { fill } => {
                let prior_notional = self.average_fill_price * Decimal::from(self.shares_filled);
                let fill_notional = fill.price * Decimal::from(fill.shares);
                self.shares_remaining = self.shares_remaining.saturating_sub(fill.shares);
                self.shares_filled += fill.shares;
                self.average_fill_price =
                    (prior_notional + fill_notional) / Decimal::from(self.shares_filled);
                self.fills.push(fill.clone());
                self.status = if self.shares_remaining == 0 {
                    BidStatus::Filled
                } else {
                    BidStatus::PartiallyFilled
                };
            }
            BidEvent::Withdrawn { .. } => {
                self.status = BidStatus::Withdrawn;
            }
            BidEvent::Expired { .. } => {
                self.status = BidStatus::Expired;
            }
            BidEvent::Rejected { .. } => {
                self.status = BidStatus::Rejected;
            }
            BidEvent::SharesChanged { shares, .. } => {
                self.shares_requested = *shares;
                self.shares_remaining = shares - self.shares_filled;
            }
        }
    }
}
