// ============================================================================
// Listing Aggregate (sell-side order)
// An offer to sell a quantity of a security, consumed by matching
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregate::{Aggregate, DomainEvent};
use crate::domain::trade::TradeId;
use crate::error::DomainError;

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingId(Uuid);

impl ListingId {
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

impl Default for ListingId {
    fn default() -> Self {
        Self(Uuid::nil())
    }
}

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Pricing policy of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingKind {
    /// Sell at a fixed asking price.
    Fixed,
    /// Sell to the highest bidder at or above the reserve, if any.
    Auction,
    /// Sell at whatever the market will bear.
    Market,
    /// Sell at or above a limit price.
    Limit,
}

/// Transfer restriction attached to the offered shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictionKind {
    Rule144,
    Lockup,
    RightOfFirstRefusal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
    Active,
    Cancelled,
    Expired,
    Completed,
    Suspended,
}

impl ListingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ListingStatus::Cancelled | ListingStatus::Expired | ListingStatus::Completed
        )
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ListingEvent {
    Opened {
        id: ListingId,
        security_id: String,
        seller_id: String,
        shares: u64,
        kind: ListingKind,
        min_price: Option<Decimal>,
        reserve_price: Option<Decimal>,
        current_price: Option<Decimal>,
        restriction: Option<RestrictionKind>,
        accredited_only: bool,
        expires_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    SharesReduced {
        trade_id: TradeId,
        shares: u64,
        at: DateTime<Utc>,
    },
    Completed {
        at: DateTime<Utc>,
    },
    Cancelled {
        reason: String,
        at: DateTime<Utc>,
    },
    Expired {
        at: DateTime<Utc>,
    },
    Suspended {
        reason: String,
        at: DateTime<Utc>,
    },
    Reinstated {
        at: DateTime<Utc>,
    },
    PriceChanged {
        price: Decimal,
        at: DateTime<Utc>,
    },
}

impl DomainEvent for ListingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ListingEvent::Opened { .. } => "listing.opened",
            ListingEvent::SharesReduced { .. } => "listing.shares_reduced",
            ListingEvent::Completed { .. } => "listing.completed",
            ListingEvent::Cancelled { .. } => "listing.cancelled",
            ListingEvent::Expired { .. } => "listing.expired",
            ListingEvent::Suspended { .. } => "listing.suspended",
            ListingEvent::Reinstated { .. } => "listing.reinstated",
            ListingEvent::PriceChanged { .. } => "listing.price_changed",
        }
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Parameters for opening a new listing.
#[derive(Debug, Clone)]
pub struct OpenListing {
    pub security_id: String,
    pub seller_id: String,
    pub shares: u64,
    pub kind: ListingKind,
    pub min_price: Option<Decimal>,
    pub reserve_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub restriction: Option<RestrictionKind>,
    pub accredited_only: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Sell-side order aggregate.
///
/// Invariant: `shares_offered == shares_remaining + shares_sold`, and
/// `shares_remaining` never goes negative. Reaching zero remaining completes
/// the listing atomically with the reduction that drained it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub security_id: String,
    pub seller_id: String,
    pub shares_offered: u64,
    pub shares_remaining: u64,
    pub shares_sold: u64,
    pub kind: ListingKind,
    pub min_price: Option<Decimal>,
    pub reserve_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub restriction: Option<RestrictionKind>,
    pub accredited_only: bool,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Trades that consumed shares from this listing, in order.
    pub trade_ids: Vec<TradeId>,
    version: u64,
}

impl Default for Listing {
    fn default() -> Self {
        Self {
            id: ListingId::default(),
            security_id: String::new(),
            seller_id: String::new(),
            shares_offered: 0,
            shares_remaining: 0,
            shares_sold: 0,
            kind: ListingKind::Fixed,
            min_price: None,
            reserve_price: None,
            current_price: None,
            restriction: None,
            accredited_only: false,
            status: ListingStatus::Active,
            created_at: DateTime::<Utc>::MIN_UTC,
            expires_at: None,
            cancelled_at: None,
            completed_at: None,
            trade_ids: Vec::new(),
            version: 0,
        }
    }
}

impl Listing {
    // ========================================================================
    // Commands
    // ========================================================================

    /// Open a new listing. Returns the creation event; apply it to a default
    /// aggregate (or persist it through the repository) to obtain the state.
    pub fn open(params: OpenListing) -> Result<ListingEvent, DomainError> {
        if params.security_id.is_empty() {
            return Err(DomainError::Validation("security id is required".into()));
        }
        if params.seller_id.is_empty() {
            return Err(DomainError::Validation("seller id is required".into()));
        }
        if params.shares == 0 {
            return Err(DomainError::Validation(
                "shares offered must be positive".into(),
            ));
        }
        for (label, price) in [
            ("minimum price", params.min_price),
            ("reserve price", params.reserve_price),
            ("current price", params.current_price),
        ] {
            if let Some(p) = price {
                if p <= Decimal::ZERO {
                    return Err(DomainError::Validation(format!(
                        "{} must be positive",
                        label
                    )));
                }
            }
        }
        match params.kind {
            ListingKind::Fixed | ListingKind::Limit => {
                if params.current_price.is_none() && params.min_price.is_none() {
                    return Err(DomainError::Validation(
                        "fixed and limit listings require a price".into(),
                    ));
                }
            }
            ListingKind::Auction | ListingKind::Market => {}
        }

        Ok(ListingEvent::Opened {
            id: ListingId::new(),
            security_id: params.security_id,
            seller_id: params.seller_id,
            shares: params.shares,
            kind: params.kind,
            min_price: params.min_price,
            reserve_price: params.reserve_price,
            current_price: params.current_price,
            restriction: params.restriction,
            accredited_only: params.accredited_only,
            expires_at: params.expires_at,
            at: Utc::now(),
        })
    }

    /// Consume shares as the result of a match. Emits `Completed` in the same
    /// batch when the reduction drains the listing.
    pub fn reduce_shares(
        &self,
        trade_id: TradeId,
        shares: u64,
        at: DateTime<Utc>,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        if self.status != ListingStatus::Active {
            return Err(DomainError::guard(self.status, "reduce shares"));
        }
        if shares == 0 {
            return Err(DomainError::Validation(
                "share reduction must be positive".into(),
            ));
        }
        if shares > self.shares_remaining {
            return Err(DomainError::Validation(format!(
                "cannot reduce {} shares: only {} remaining",
                shares, self.shares_remaining
            )));
        }

        let mut events = vec![ListingEvent::SharesReduced {
            trade_id,
            shares,
            at,
        }];
        if shares == self.shares_remaining {
            events.push(ListingEvent::Completed { at });
        }
        Ok(events)
    }

    pub fn cancel(&self, reason: &str, at: DateTime<Utc>) -> Result<Vec<ListingEvent>, DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::guard(self.status, "cancel"));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "cancellation reason is required".into(),
            ));
        }
        Ok(vec![ListingEvent::Cancelled {
            reason: reason.to_string(),
            at,
        }])
    }

    /// Externally driven expiration: the caller decides `now > expires_at`.
    pub fn expire(&self, now: DateTime<Utc>) -> Result<Vec<ListingEvent>, DomainError> {
        if self.status != ListingStatus::Active {
            return Err(DomainError::guard(self.status, "expire"));
        }
        match self.expires_at {
            Some(expires_at) if now > expires_at => Ok(vec![ListingEvent::Expired { at: now }]),
            Some(_) => Err(DomainError::Validation(
                "listing has not reached its expiration".into(),
            )),
            None => Err(DomainError::Validation("listing never expires".into())),
        }
    }

    pub fn suspend(
        &self,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        if self.status != ListingStatus::Active {
            return Err(DomainError::guard(self.status, "suspend"));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "suspension reason is required".into(),
            ));
        }
        Ok(vec![ListingEvent::Suspended {
            reason: reason.to_string(),
            at,
        }])
    }

    pub fn reinstate(&self, at: DateTime<Utc>) -> Result<Vec<ListingEvent>, DomainError> {
        if self.status != ListingStatus::Suspended {
            return Err(DomainError::guard(self.status, "reinstate"));
        }
        Ok(vec![ListingEvent::Reinstated { at }])
    }

    pub fn change_price(
        &self,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Vec<ListingEvent>, DomainError> {
        if self.status != ListingStatus::Active {
            return Err(DomainError::guard(self.status, "change price"));
        }
        if price <= Decimal::ZERO {
            return Err(DomainError::Validation("price must be positive".into()));
        }
        Ok(vec![ListingEvent::PriceChanged { price, at }])
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The limit price this listing contributes to the order book, per its
    /// pricing policy. `None` means the listing sells at market.
    pub fn matching_price(&self) -> Option<Decimal> {
        match self.kind {
            ListingKind::Fixed | ListingKind::Limit => self.current_price.or(self.min_price),
            ListingKind::Auction => self.reserve_price,
            ListingKind::Market => None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }
}

impl Aggregate for Listing {
    type Event = ListingEvent;

    const KIND: &'static str = "listing";

    fn entity_id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn apply(&mut self, event: &ListingEvent) {
        match event {
            ListingEvent::Opened {
                id,
                security_id,
                seller_id,
                shares,
                kind,
                min_price,
                reserve_price,
                current_price,
                restriction,
                accredited_only,
                expires_at,
                at,
            } => {
                self.id = *id;
                self.security_id = security_id.clone();
                self.seller_id = seller_id.clone();
                self.shares_offered = *shares;
                self.shares_remaining = *shares;
                self.shares_sold = 0;
                self.kind = *kind;
                self.min_price = *min_price;
                self.reserve_price = *reserve_price;
                self.current_price = *current_price;
                self.restriction = *restriction;
                self.accredited_only = *accredited_only;
                self.status = ListingStatus::Active;
                self.created_at = *at;
                self.expires_at = *expires_at;
            }
            ListingEvent::SharesReduced {
                trade_id, shares, ..
            } => {
                self.shares_remaining = self.shares_remaining.saturating_sub(*shares);
                self.shares_sold += shares;
                self.trade_ids.push(*trade_id);
            }
            ListingEvent::Completed { at } => {
                self.status = ListingStatus::Completed;
                self.completed_at = Some(*at);
            }
            ListingEvent::Cancelled { at, .. } => {
                self.status = ListingStatus::Cancelled;
                self.cancelled_at = Some(*at);
            }
            ListingEvent::Expired { .. } => {
                self.status = ListingStatus::Expired;
            }
            ListingEvent::Suspended { .. } => {
                self.status = ListingStatus::Suspended;
            }
            ListingEvent::Reinstated { .. } => {
                self.status = ListingStatus::Active;
            }
            ListingEvent::PriceChanged { price, .. } => {
                self.current_price = Some(*price);
            }
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::domain::aggregate::replay;
    use proptest::prelude::*;

    proptest! {
        /// shares_offered == shares_remaining + shares_sold under any valid
        /// sequence of reductions, and remaining never goes negative.
        #[test]
        fn conservation_under_reductions(
            offered in 1u64..10_000,
            reductions in proptest::collection::vec(1u64..500, 0..40),
        ) {
            let event = Listing::open(OpenListing {
                security_id: "ACME".to_string(),
                seller_id: "seller1".to_string(),
                shares: offered,
                kind: ListingKind::Fixed,
                min_price: None,
                reserve_price: None,
                current_price: Some(Decimal::from(10)),
                restriction: None,
                accredited_only: false,
                expires_at: None,
            }).unwrap();
            let mut listing: Listing = replay(&[event]);

            for shares in reductions {
                match listing.reduce_shares(TradeId::new(), shares, Utc::now()) {
                    Ok(events) => listing.apply_all(&events),
                    Err(_) => {
                        // Rejected commands must leave state untouched
                        prop_assert_eq!(
                            listing.shares_offered,
                            listing.shares_remaining + listing.shares_sold
                        );
                    }
                }
                prop_assert_eq!(
                    listing.shares_offered,
                    listing.shares_remaining + listing.shares_sold
                );
            }

            if listing.shares_remaining == 0 {
                prop_assert_eq!(listing.status, ListingStatus::Completed);
            }
        }
    }
}
