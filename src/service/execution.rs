// ============================================================================
// Execution Service
// Turns match results into trades and drives settlement
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::bid::{Bid, PlaceBid};
use crate::domain::config::MatchingPolicy;
use crate::domain::listing::{Listing, OpenListing};
use crate::domain::match_result::MatchResult;
use crate::domain::trade::{PaymentRecord, Trade, TransferRecord};
use crate::engine::advanced::{MatchOutcome, RiskFilteredEngine};
use crate::error::ServiceError;
use crate::event::repository::Repository;
use crate::interfaces::order_book_source::InMemoryOrderBookSource;

/// Orchestrates the full flow: run matching, apply results to the listing,
/// bid and trade aggregates through the event-sourced repository, and expose
/// the per-trade settlement operations.
///
/// Matching for a given security is serialized so two concurrent passes
/// cannot consume the same shares; everything else relies on per-aggregate
/// optimistic concurrency.
pub struct ExecutionService {
    repository: Repository,
    engine: RiskFilteredEngine,
    source: Arc<InMemoryOrderBookSource>,
    matching_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ExecutionService {
    pub fn new(
        repository: Repository,
        engine: RiskFilteredEngine,
        source: Arc<InMemoryOrderBookSource>,
    ) -> Self {
        Self {
            repository,
            engine,
            source,
            matching_locks: Mutex::new(HashMap::new()),
        }
    }

    fn security_lock(&self, security_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.matching_locks
                .lock()
                .entry(security_id.to_string())
                .or_default(),
        )
    }

    // ========================================================================
    // Order intake
    // ========================================================================

    /// Open a listing and make it available for matching.
    pub fn open_listing(&self, params: OpenListing) -> Result<Listing, ServiceError> {
        let event = Listing::open(params)?;
        let mut listing = Listing::default();
        self.repository.persist(&mut listing, vec![event])?;
        self.source.upsert_listing(listing.clone());
        tracing::info!(listing_id = %listing.id, security_id = %listing.security_id,
            shares = listing.shares_offered, "listing opened");
        Ok(listing)
    }

    /// Place a bid and make it available for matching.
    pub fn place_bid(&self, params: PlaceBid) -> Result<Bid, ServiceError> {
        let event = Bid::place(params)?;
        let mut bid = Bid::default();
        self.repository.persist(&mut bid, vec![event])?;
        self.source.upsert_bid(bid.clone());
        tracing::info!(bid_id = %bid.id, security_id = %bid.security_id,
            shares = bid.shares_requested, "bid placed");
        Ok(bid)
    }

    /// Cancel an open listing and take it out of matching.
    pub fn cancel_listing(&self, listing_id: &str, reason: &str) -> Result<Listing, ServiceError> {
        let mut listing: Listing = self.repository.load(listing_id)?;
        let events = listing.cancel(reason, Utc::now())?;
        self.repository.persist(&mut listing, events)?;
        self.source.upsert_listing(listing.clone());
        Ok(listing)
    }

    /// Withdraw an open bid and take it out of matching.
    pub fn withdraw_bid(&self, bid_id: &str) -> Result<Bid, ServiceError> {
        let mut bid: Bid = self.repository.load(bid_id)?;
        let events = bid.withdraw(Utc::now())?;
        self.repository.persist(&mut bid, events)?;
        self.source.upsert_bid(bid.clone());
        Ok(bid)
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Preview a matching pass without committing anything.
    pub fn match_orders(
        &self,
        security_id: &str,
        policy: MatchingPolicy,
    ) -> Result<MatchOutcome, ServiceError> {
        Ok(self.engine.match_security(security_id, policy)?)
    }

    /// Run a matching pass and commit the accepted results: reduce listings,
    /// fill bids, open trades. Returns the trades created.
    ///
    /// Each result commits independently; a result that fails aggregate
    /// validation is skipped and logged rather than aborting the pass.
    pub fn run_matching(
        &self,
        security_id: &str,
        policy: MatchingPolicy,
    ) -> Result<Vec<Trade>, ServiceError> {
        let lock = self.security_lock(security_id);
        let _guard = lock.lock();

        let outcome = self.engine.match_security(security_id, policy)?;
        let mut trades = Vec::with_capacity(outcome.accepted.len());

        for result in outcome.accepted {
            match self.execute(&result) {
                Ok(trade) => trades.push(trade),
                Err(e) => {
                    tracing::warn!(
                        trade_id = %result.trade_id,
                        listing_id = %result.listing_id,
                        error = %e,
                        "match result skipped"
                    );
                }
            }
        }

        tracing::info!(
            security_id,
            policy = policy.name(),
            executed = trades.len(),
            rejected = outcome.rejected.len(),
            "matching run complete"
        );
        Ok(trades)
    }

    /// Commit one match result across its three aggregates.
    fn execute(&self, result: &MatchResult) -> Result<Trade, ServiceError> {
        let now = Utc::now();

        let mut listing: Listing = self.repository.load(&result.listing_id.to_string())?;
        let events = listing.reduce_shares(result.trade_id, result.shares, now)?;
        self.repository.persist(&mut listing, events)?;
        self.source.upsert_listing(listing);

        if let Some(bid_id) = result.bid_id {
            let mut bid: Bid = self.repository.load(&bid_id.to_string())?;
            let events = bid.fill(
                result.trade_id,
                result.shares,
                result.price,
                &result.seller_id,
                now,
            )?;
            self.repository.persist(&mut bid, events)?;
            self.source.upsert_bid(bid);
        }

        let event = Trade::from_match(result, now)?;
        let mut trade = Trade::default();
        self.repository.persist(&mut trade, vec![event])?;
        Ok(trade)
    }

    // ========================================================================
    // Settlement operations
    // ========================================================================

    fn with_trade<F>(&self, trade_id: &str, command: F) -> Result<Trade, ServiceError>
    where
        F: FnOnce(&Trade) -> Result<Vec<crate::domain::trade::TradeEvent>, crate::error::DomainError>,
    {
        let mut trade: Trade = self.repository.load(trade_id)?;
        let events = command(&trade)?;
        self.repository.persist(&mut trade, events)?;
        Ok(trade)
    }

    /// Record one party's confirmation of the trade.
    pub fn confirm_trade(&self, trade_id: &str, user_id: &str) -> Result<Trade, ServiceError> {
        self.with_trade(trade_id, |t| t.confirm(user_id, Utc::now()))
    }

    /// Move a confirmed trade into settlement.
    pub fn initiate_settlement(
        &self,
        trade_id: &str,
        escrow_account: &str,
    ) -> Result<Trade, ServiceError> {
        self.with_trade(trade_id, |t| t.initiate_settlement(escrow_account, Utc::now()))
    }

    /// Record the buyer's payment into escrow.
    pub fn record_payment(
        &self,
        trade_id: &str,
        record: PaymentRecord,
    ) -> Result<Trade, ServiceError> {
        self.with_trade(trade_id, |t| t.record_payment(record))
    }

    /// Record the seller's share transfer.
    pub fn record_transfer(
        &self,
        trade_id: &str,
        record: TransferRecord,
    ) -> Result<Trade, ServiceError> {
        self.with_trade(trade_id, |t| t.record_transfer(record))
    }

    /// Close out a trade whose payment and transfer have both completed.
    pub fn settle_trade(
        &self,
        trade_id: &str,
        final_amount: Decimal,
        fees: Decimal,
        taxes: Decimal,
    ) -> Result<Trade, ServiceError> {
        self.with_trade(trade_id, |t| t.settle(final_amount, fees, taxes, Utc::now()))
    }

    /// Mark a trade failed, recording its stage for recovery.
    pub fn fail_trade(
        &self,
        trade_id: &str,
        reason: &str,
        recovery_hint: Option<String>,
    ) -> Result<Trade, ServiceError> {
        self.with_trade(trade_id, |t| t.fail(reason, recovery_hint, Utc::now()))
    }

    /// Cancel a trade by mutual agreement, before settlement begins.
    pub fn cancel_trade(
        &self,
        trade_id: &str,
        cancelled_by: &str,
        reason: &str,
    ) -> Result<Trade, ServiceError> {
        self.with_trade(trade_id, |t| t.cancel(cancelled_by, reason, Utc::now()))
    }

    /// Load the current state of a trade.
    pub fn trade(&self, trade_id: &str) -> Result<Trade, ServiceError> {
        Ok(self.repository.load(trade_id)?)
    }

    /// Load the current state of a listing.
    pub fn listing(&self, listing_id: &str) -> Result<Listing, ServiceError> {
        Ok(self.repository.load(listing_id)?)
    }

    /// Load the current state of a bid.
    pub fn bid(&self, bid_id: &str) -> Result<Bid, ServiceError> {
        Ok(self.repository.load(bid_id)?)
    }
}
