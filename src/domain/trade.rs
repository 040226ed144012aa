// ============================================================================
// Trade Aggregate
// Settlement lifecycle of one matched buyer/seller pair
// ============================================================================
//
// State machine:
//
//   Matched -> PendingConfirmation -> Confirmed -> SettlementInitiated
//          -> PaymentReceived -> SharesTransferred -> Settled
//
// Failed is reachable from any non-terminal state; Cancelled only before
// settlement is initiated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregate::{Aggregate, DomainEvent};
use crate::domain::bid::BidId;
use crate::domain::config::MatchingPolicy;
use crate::domain::listing::ListingId;
use crate::domain::match_result::MatchResult;
use crate::error::DomainError;

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeId(Uuid);

impl TradeId {
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

impl Default for TradeId {
    fn default() -> Self {
        Self(Uuid::nil())
    }
}

impl std::fmt::Display for TradeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Matched,
    PendingConfirmation,
    Confirmed,
    SettlementInitiated,
    PaymentReceived,
    SharesTransferred,
    Settled,
    Failed,
    Cancelled,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeStatus::Settled | TradeStatus::Failed | TradeStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeParty {
    Buyer,
    Seller,
}

/// Proof of payment recorded during settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub transaction_ref: String,
    pub received_at: DateTime<Utc>,
}

/// Proof of share transfer recorded during settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub shares: u64,
    pub from: String,
    pub to: String,
    pub method: String,
    pub certificate_hash: Option<String>,
    pub transferred_at: DateTime<Utc>,
}

/// Diagnostic record of a settlement failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFailure {
    pub reason: String,
    /// The status the trade was in when it failed.
    pub stage: String,
    pub recovery_hint: Option<String>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCancellation {
    pub cancelled_by: String,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TradeEvent {
    Matched {
        id: TradeId,
        listing_id: ListingId,
        bid_id: Option<BidId>,
        buyer_id: String,
        seller_id: String,
        security_id: String,
        shares: u64,
        price: Decimal,
        total_amount: Decimal,
        settlement_date: DateTime<Utc>,
        policy: MatchingPolicy,
        at: DateTime<Utc>,
    },
    PartyConfirmed {
        party: TradeParty,
        at: DateTime<Utc>,
    },
    Confirmed {
        at: DateTime<Utc>,
    },
    SettlementInitiated {
        escrow_account: String,
        at: DateTime<Utc>,
    },
    PaymentReceived {
        record: PaymentRecord,
    },
    SharesTransferred {
        record: TransferRecord,
    },
    Settled {
        final_amount: Decimal,
        fees: Decimal,
        taxes: Decimal,
        at: DateTime<Utc>,
    },
    Failed {
        reason: String,
        stage: String,
        recovery_hint: Option<String>,
        at: DateTime<Utc>,
    },
    Cancelled {
        cancelled_by: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl DomainEvent for TradeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TradeEvent::Matched { .. } => "trade.matched",
            TradeEvent::PartyConfirmed { .. } => "trade.party_confirmed",
            TradeEvent::Confirmed { .. } => "trade.confirmed",
            TradeEvent::SettlementInitiated { .. } => "trade.settlement_initiated",
            TradeEvent::PaymentReceived { .. } => "trade.payment_received",
            TradeEvent::SharesTransferred { .. } => "trade.shares_transferred",
            TradeEvent::Settled { .. } => "trade.settled",
            TradeEvent::Failed { .. } => "trade.failed",
            TradeEvent::Cancelled { .. } => "trade.cancelled",
        }
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// A matched trade working its way through confirmation and settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub listing_id: ListingId,
    pub bid_id: Option<BidId>,
    pub buyer_id: String,
    pub seller_id: String,
    pub security_id: String,
    pub shares: u64,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub fees: Decimal,
    pub taxes: Decimal,
    pub status: TradeStatus,
    pub matched_by: Option<MatchingPolicy>,
    pub matched_at: DateTime<Utc>,
    pub settlement_date: DateTime<Utc>,
    pub buyer_confirmed_at: Option<DateTime<Utc>>,
    pub seller_confirmed_at: Option<DateTime<Utc>>,
    pub escrow_account: Option<String>,
    pub payment: Option<PaymentRecord>,
    pub transfer: Option<TransferRecord>,
    pub settled_at: Option<DateTime<Utc>>,
    pub failure: Option<TradeFailure>,
    pub cancellation: Option<TradeCancellation>,
    version: u64,
}

impl Default for Trade {
    fn default() -> Self {
        Self {
            id: TradeId::default(),
            listing_id: ListingId::default(),
            bid_id: None,
            buyer_id: String::new(),
            seller_id: String::new(),
            security_id: String::new(),
            shares: 0,
            price: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            fees: Decimal::ZERO,
            taxes: Decimal::ZERO,
            status: TradeStatus::Matched,
            matched_by: None,
            matched_at: DateTime::<Utc>::MIN_UTC,
            settlement_date: DateTime::<Utc>::MIN_UTC,
            buyer_confirmed_at: None,
            seller_confirmed_at: None,
            escrow_account: None,
            payment: None,
            transfer: None,
            settled_at: None,
            failure: None,
            cancellation: None,
            version: 0,
        }
    }
}

impl Trade {
    // ========================================================================
    // Commands
    // ========================================================================

    /// Open a trade from a match result produced by the engine.
    pub fn from_match(result: &MatchResult, now: DateTime<Utc>) -> Result<TradeEvent, DomainError> {
        if result.shares == 0 {
            return Err(DomainError::Validation(
                "trade shares must be positive".into(),
            ));
        }
        if result.price <= Decimal::ZERO {
            return Err(DomainError::Validation(
                "trade price must be positive".into(),
            ));
        }
        if result.total_amount <= Decimal::ZERO {
            return Err(DomainError::Validation(
                "trade total must be positive".into(),
            ));
        }
        if result.settlement_date < now {
            return Err(DomainError::Validation(
                "settlement date cannot be in the past".into(),
            ));
        }

        Ok(TradeEvent::Matched {
            id: result.trade_id,
            listing_id: result.listing_id,
            bid_id: result.bid_id,
            buyer_id: result.buyer_id.clone(),
            seller_id: result.seller_id.clone(),
            security_id: result.security_id.clone(),
            shares: result.shares,
            price: result.price,
            total_amount: result.total_amount,
            settlement_date: result.settlement_date,
            policy: result.policy,
            at: now,
        })
    }

    /// Record a party's confirmation. When the second party confirms, the
    /// trade advances to `Confirmed` in the same event batch. Confirming
    /// twice is a no-op.
    pub fn confirm(&self, user_id: &str, at: DateTime<Utc>) -> Result<Vec<TradeEvent>, DomainError> {
        if !matches!(
            self.status,
            TradeStatus::Matched | TradeStatus::PendingConfirmation
        ) {
            return Err(DomainError::guard(self.status, "confirm"));
        }

        let party = if user_id == self.buyer_id {
            TradeParty::Buyer
        } else if user_id == self.seller_id {
            TradeParty::Seller
        } else {
            return Err(DomainError::NotAParty(user_id.to_string()));
        };

        let already = match party {
            TradeParty::Buyer => self.buyer_confirmed_at.is_some(),
            TradeParty::Seller => self.seller_confirmed_at.is_some(),
        };
        if already {
            return Ok(vec![]);
        }

        let other_confirmed = match party {
            TradeParty::Buyer => self.seller_confirmed_at.is_some(),
            TradeParty::Seller => self.buyer_confirmed_at.is_some(),
        };

        let mut events = vec![TradeEvent::PartyConfirmed { party, at }];
        if other_confirmed {
            events.push(TradeEvent::Confirmed { at });
        }
        Ok(events)
    }

    /// Move a confirmed trade into settlement against an escrow account.
    /// Re-initiating with the same escrow account is a no-op.
    pub fn initiate_settlement(
        &self,
        escrow_account: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<TradeEvent>, DomainError> {
        if self.status == TradeStatus::SettlementInitiated
            && self.escrow_account.as_deref() == Some(escrow_account)
        {
            return Ok(vec![]);
        }
        if self.status != TradeStatus::Confirmed {
            return Err(DomainError::guard(self.status, "initiate settlement"));
        }
        if escrow_account.trim().is_empty() {
            return Err(DomainError::Validation(
                "escrow account is required".into(),
            ));
        }
        Ok(vec![TradeEvent::SettlementInitiated {
            escrow_account: escrow_account.to_string(),
            at,
        }])
    }

    /// Record the buyer's payment. A repeat of the same transaction reference
    /// is a no-op; a different reference after payment is a conflict.
    pub fn record_payment(&self, record: PaymentRecord) -> Result<Vec<TradeEvent>, DomainError> {
        if let Some(existing) = &self.payment {
            if existing.transaction_ref == record.transaction_ref {
                return Ok(vec![]);
            }
        }
        if self.status != TradeStatus::SettlementInitiated {
            return Err(DomainError::guard(self.status, "record payment"));
        }
        if record.amount <= Decimal::ZERO {
            return Err(DomainError::Validation(
                "payment amount must be positive".into(),
            ));
        }
        if record.amount < self.total_amount {
            return Err(DomainError::Validation(format!(
                "payment {} is less than trade total {}",
                record.amount, self.total_amount
            )));
        }
        if record.transaction_ref.trim().is_empty() {
            return Err(DomainError::Validation(
                "payment transaction reference is required".into(),
            ));
        }
        Ok(vec![TradeEvent::PaymentReceived { record }])
    }

    /// Record the seller's share transfer. A repeat of an identical record is
    /// a no-op.
    pub fn record_transfer(&self, record: TransferRecord) -> Result<Vec<TradeEvent>, DomainError> {
        if let Some(existing) = &self.transfer {
            if *existing == record {
                return Ok(vec![]);
            }
        }
        if self.status != TradeStatus::PaymentReceived {
            return Err(DomainError::guard(self.status, "record transfer"));
        }
        if record.shares != self.shares {
            return Err(DomainError::Validation(format!(
                "transfer of {} shares does not match trade quantity {}",
                record.shares, self.shares
            )));
        }
        if record.from != self.seller_id {
            return Err(DomainError::Validation(
                "shares must come from the seller".into(),
            ));
        }
        if record.to != self.buyer_id {
            return Err(DomainError::Validation(
                "shares must go to the buyer".into(),
            ));
        }
        Ok(vec![TradeEvent::SharesTransferred { record }])
    }

    /// Close the trade with final economics. `final_amount` replaces the
    /// matched total (fees and taxes are carried separately).
    pub fn settle(
        &self,
        final_amount: Decimal,
        fees: Decimal,
        taxes: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Vec<TradeEvent>, DomainError> {
        if self.status != TradeStatus::SharesTransferred {
            return Err(DomainError::guard(self.status, "settle"));
        }
        if final_amount <= Decimal::ZERO {
            return Err(DomainError::Validation(
                "final amount must be positive".into(),
            ));
        }
        if fees < Decimal::ZERO || taxes < Decimal::ZERO {
            return Err(DomainError::Validation(
                "fees and taxes cannot be negative".into(),
            ));
        }
        Ok(vec![TradeEvent::Settled {
            final_amount,
            fees,
            taxes,
            at,
        }])
    }

    /// Fail the trade from any non-terminal state, recording the stage it
    /// was in for recovery tooling.
    pub fn fail(
        &self,
        reason: &str,
        recovery_hint: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<TradeEvent>, DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::guard(self.status, "fail"));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "failure reason is required".into(),
            ));
        }
        Ok(vec![TradeEvent::Failed {
            reason: reason.to_string(),
            stage: format!("{:?}", self.status),
            recovery_hint,
            at,
        }])
    }

    /// Cancel by mutual agreement. Only allowed before money moves.
    pub fn cancel(
        &self,
        cancelled_by: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<TradeEvent>, DomainError> {
        if !matches!(
            self.status,
            TradeStatus::Matched | TradeStatus::PendingConfirmation | TradeStatus::Confirmed
        ) {
            return Err(DomainError::guard(self.status, "cancel"));
        }
        if cancelled_by != self.buyer_id && cancelled_by != self.seller_id {
            return Err(DomainError::NotAParty(cancelled_by.to_string()));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "cancellation reason is required".into(),
            ));
        }
        Ok(vec![TradeEvent::Cancelled {
            cancelled_by: cancelled_by.to_string(),
            reason: reason.to_string(),
            at,
        }])
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The trade needs no further processing: settled, failed, or cancelled.
    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_settled(&self) -> bool {
        self.status == TradeStatus::Settled
    }

    /// Past its settlement date without reaching a terminal state.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now > self.settlement_date
    }

    /// Coarse progress figure for settlement dashboards, 0-100.
    pub fn settlement_progress(&self) -> u8 {
        match self.status {
            TradeStatus::Matched => 10,
            TradeStatus::PendingConfirmation => 20,
            TradeStatus::Confirmed => 30,
            TradeStatus::SettlementInitiated => 50,
            TradeStatus::PaymentReceived => 75,
            TradeStatus::SharesTransferred => 90,
            TradeStatus::Settled => 100,
            TradeStatus::Failed | TradeStatus::Cancelled => 0,
        }
    }

    /// Seller proceeds after fees and taxes.
    pub fn net_amount(&self) -> Decimal {
        self.total_amount - self.fees - self.taxes
    }
}

impl Aggregate for Trade {
    type Event = TradeEvent;

    const KIND: &'static str = "trade";

    fn entity_id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn apply(&mut self, event: &TradeEvent) {
        match event {
            TradeEvent::Matched {
                id,
                listing_id,
                bid_id,
                buyer_id,
                seller_id,
                security_id,
                shares,
                price,
                total_amount,
                settlement_date,
                policy,
                at,
            } => {
                self.id = *id;
                self.listing_id = *listing_id;
                self.bid_id = *bid_id;
                self.buyer_id = buyer_id.clone();
                self.seller_id = seller_id.clone();
                self.security_id = security_id.clone();
                self.shares = *shares;
                self.price = *price;
                self.total_amount = *total_amount;
                self.settlement_date = *settlement_date;
                self.matched_by = Some(*policy);
                self.matched_at = *at;
                self.status = TradeStatus::Matched;
            }
            TradeEvent::PartyConfirmed { party, at } => {
                match party {
                    TradeParty::Buyer => self.buyer_confirmed_at = Some(*at),
                    TradeParty::Seller => self.seller_confirmed_at = Some(*at),
                }
                if self.status == TradeStatus::Matched {
                    self.status = TradeStatus::PendingConfirmation;
                }
            }
            TradeEvent::Confirmed { .. } => {
                self.status = TradeStatus::Confirmed;
            }
            TradeEvent::SettlementInitiated { escrow_account, .. } => {
                self.escrow_account = Some(escrow_account.clone());
                self.status = TradeStatus::SettlementInitiated;
            }
            TradeEvent::PaymentReceived { record } => {
                self.payment = Some(record.clone());
                self.status = TradeStatus::PaymentReceived;
            }
            TradeEvent::SharesTransferred { record } => {
                self.transfer = Some(record.clone());
                self.status = TradeStatus::SharesTransferred;
            }
            TradeEvent::Settled {
                final_amount,
                fees,
                taxes,
                at,
            } => {
                self.total_amount = *final_amount;
                self.fees = *fees;
                self.taxes = *taxes;
                self.settled_at = Some(*at);
                self.status = TradeStatus::Settled;
            }
            TradeEvent::Failed {
                reason,
                stage,
                recovery_hint,
                at,
            } => {
                self.failure = Some(TradeFailure {
                    reason: reason.clone(),
                    stage: stage.clone(),
                    recovery_hint: recovery_hint.clone(),
                    failed_at: *at,
                });
                self.status = TradeStatus::Failed;
            }
            TradeEvent::Cancelled {
                cancelled_by,
                reason,
                at,
            } => {
                self.cancellation = Some(TradeCancellation {
                    cancelled_by: cancelled_by.clone(),
                    reason: reason.clone(),
                    cancelled_at: *at,
                });
                self.status = TradeStatus::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate::replay;
    use chrono::Duration;

    fn sample_result() -> MatchResult {
        MatchResult {
            trade_id: TradeId::new(),
            listing_id: ListingId::new(),
            bid_id: Some(BidId::new()),
            buyer_id: "buyer1".to_string(),
            seller_id: "seller1".to_string(),
            security_id: "ACME".to_string(),
            shares: 100,
            price: Decimal::from(50),
            total_amount: Decimal::from(5000),
            settlement_date: Utc::now() + Duration::days(3),
            policy: MatchingPolicy::PriceTime,
        }
    }

    fn matched_trade() -> Trade {
        replay(&[Trade::from_match(&sample_result(), Utc::now()).unwrap()])
    }

    fn payment_for(trade: &Trade) -> PaymentRecord {
        PaymentRecord {
            amount: trade.total_amount,
            currency: "USD".to_string(),
            method: "wire".to_string(),
            transaction_ref: "TXN-1".to_string(),
            received_at: Utc::now(),
        }
    }

    fn transfer_for(trade: &Trade) -> TransferRecord {
        TransferRecord {
            shares: trade.shares,
            from: trade.seller_id.clone(),
            to: trade.buyer_id.clone(),
            method: "book-entry".to_string(),
            certificate_hash: Some("abc123".to_string()),
            transferred_at: Utc::now(),
        }
    }

    fn settled_trade() -> Trade {
        let mut trade = matched_trade();
        let advance = |trade: &mut Trade, events: Vec<TradeEvent>| trade.apply_all(&events);

        let e = trade.confirm("buyer1", Utc::now()).unwrap();
        advance(&mut trade, e);
        let e = trade.confirm("seller1", Utc::now()).unwrap();
        advance(&mut trade, e);
        let e = trade.initiate_settlement("escrow-9", Utc::now()).unwrap();
        advance(&mut trade, e);
        let e = trade.record_payment(payment_for(&trade)).unwrap();
        advance(&mut trade, e);
        let e = trade.record_transfer(transfer_for(&trade)).unwrap();
        advance(&mut trade, e);
        let e = trade
            .settle(
                Decimal::from(5000),
                Decimal::from(25),
                Decimal::from(10),
                Utc::now(),
            )
            .unwrap();
        advance(&mut trade, e);
        trade
    }

    /// Drive the happy path forward until the trade reaches `target`.
    fn trade_at(target: TradeStatus) -> Trade {
        let mut trade = matched_trade();
        while trade.status != target {
            let events = match trade.status {
                TradeStatus::Matched => trade.confirm("buyer1", Utc::now()).unwrap(),
                TradeStatus::PendingConfirmation => trade.confirm("seller1", Utc::now()).unwrap(),
                TradeStatus::Confirmed => {
                    trade.initiate_settlement("escrow-9", Utc::now()).unwrap()
                }
                TradeStatus::SettlementInitiated => {
                    trade.record_payment(payment_for(&trade)).unwrap()
                }
                TradeStatus::PaymentReceived => {
                    trade.record_transfer(transfer_for(&trade)).unwrap()
                }
                other => panic!("cannot drive the happy path past {:?}", other),
            };
            trade.apply_all(&events);
        }
        trade
    }

    #[test]
    fn test_happy_path_reaches_settled() {
        let trade = settled_trade();
        assert_eq!(trade.status, TradeStatus::Settled);
        assert!(trade.is_settled());
        assert!(trade.is_complete());
        assert_eq!(trade.settlement_progress(), 100);
        assert_eq!(trade.net_amount(), Decimal::from(4965));
        // Matched + 2 confirmations + Confirmed + 4 settlement events
        assert_eq!(trade.version(), 8);
    }

    #[test]
    fn test_second_confirmation_advances_state() {
        let mut trade = matched_trade();

        let events = trade.confirm("seller1", Utc::now()).unwrap();
        assert_eq!(events.len(), 1);
        trade.apply_all(&events);
        assert_eq!(trade.status, TradeStatus::PendingConfirmation);
        assert_eq!(trade.settlement_progress(), 20);

        let events = trade.confirm("buyer1", Utc::now()).unwrap();
        assert_eq!(events.len(), 2);
        trade.apply_all(&events);
        assert_eq!(trade.status, TradeStatus::Confirmed);
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let mut trade = matched_trade();
        let events = trade.confirm("buyer1", Utc::now()).unwrap();
        trade.apply_all(&events);

        let repeat = trade.confirm("buyer1", Utc::now()).unwrap();
        assert!(repeat.is_empty());
        assert_eq!(trade.status, TradeStatus::PendingConfirmation);
    }

    #[test]
    fn test_stranger_cannot_confirm() {
        let trade = matched_trade();
        let result = trade.confirm("intruder", Utc::now());
        assert!(matches!(result, Err(DomainError::NotAParty(_))));
    }

    #[test]
    fn test_settlement_requires_confirmation() {
        let trade = matched_trade();
        let result = trade.initiate_settlement("escrow-9", Utc::now());
        assert!(matches!(result, Err(DomainError::StateGuard { .. })));
    }

    #[test]
    fn test_underpayment_rejected() {
        let mut trade = matched_trade();
        for user in ["buyer1", "seller1"] {
            let e = trade.confirm(user, Utc::now()).unwrap();
            trade.apply_all(&e);
        }
        let e = trade.initiate_settlement("escrow-9", Utc::now()).unwrap();
        trade.apply_all(&e);

        let mut payment = payment_for(&trade);
        payment.amount = trade.total_amount - Decimal::ONE;
        assert!(matches!(
            trade.record_payment(payment),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_payment_idempotent_on_transaction_ref() {
        let mut trade = matched_trade();
        for user in ["buyer1", "seller1"] {
            let e = trade.confirm(user, Utc::now()).unwrap();
            trade.apply_all(&e);
        }
        let e = trade.initiate_settlement("escrow-9", Utc::now()).unwrap();
        trade.apply_all(&e);

        let payment = payment_for(&trade);
        let e = trade.record_payment(payment.clone()).unwrap();
        trade.apply_all(&e);

        let repeat = trade.record_payment(payment).unwrap();
        assert!(repeat.is_empty());
        assert_eq!(trade.status, TradeStatus::PaymentReceived);
    }

    #[test]
    fn test_transfer_must_match_parties_and_quantity() {
        let mut trade = matched_trade();
        for user in ["buyer1", "seller1"] {
            let e = trade.confirm(user, Utc::now()).unwrap();
            trade.apply_all(&e);
        }
        let e = trade.initiate_settlement("escrow-9", Utc::now()).unwrap();
        trade.apply_all(&e);
        let e = trade.record_payment(payment_for(&trade)).unwrap();
        trade.apply_all(&e);

        let mut wrong_qty = transfer_for(&trade);
        wrong_qty.shares = 99;
        assert!(trade.record_transfer(wrong_qty).is_err());

        let mut wrong_source = transfer_for(&trade);
        wrong_source.from = "someone-else".to_string();
        assert!(trade.record_transfer(wrong_source).is_err());
    }

    #[test]
    fn test_fail_records_stage() {
        let mut trade = matched_trade();
        for user in ["buyer1", "seller1"] {
            let e = trade.confirm(user, Utc::now()).unwrap();
            trade.apply_all(&e);
        }
        let e = trade.initiate_settlement("escrow-9", Utc::now()).unwrap();
        trade.apply_all(&e);

        let e = trade
            .fail("wire bounced", Some("retry payment".to_string()), Utc::now())
            .unwrap();
        trade.apply_all(&e);

        assert_eq!(trade.status, TradeStatus::Failed);
        assert_eq!(trade.settlement_progress(), 0);
        assert!(trade.is_complete());
        assert!(!trade.is_settled());
        let failure = trade.failure.as_ref().unwrap();
        assert_eq!(failure.stage, "SettlementInitiated");
    }

    #[test]
    fn test_cancel_only_before_settlement() {
        let mut trade = matched_trade();
        let e = trade.cancel("buyer1", "changed my mind", Utc::now()).unwrap();
        trade.apply_all(&e);
        assert_eq!(trade.status, TradeStatus::Cancelled);
        assert!(trade.is_complete());

        let settled = settled_trade();
        assert!(settled.cancel("buyer1", "too late", Utc::now()).is_err());
        assert!(settled.fail("too late", None, Utc::now()).is_err());
    }

    #[test]
    fn test_cancel_rejected_once_shares_move() {
        let trade = trade_at(TradeStatus::SharesTransferred);

        let result = trade.cancel("buyer1", "buyer backed out", Utc::now());
        assert!(matches!(result, Err(DomainError::StateGuard { .. })));
        assert_eq!(trade.status, TradeStatus::SharesTransferred);
        assert_eq!(trade.settlement_progress(), 90);
    }

    #[test]
    fn test_out_of_stage_commands_rejected() {
        let matched = matched_trade();
        assert!(matches!(
            matched.settle(Decimal::from(5000), Decimal::ZERO, Decimal::ZERO, Utc::now()),
            Err(DomainError::StateGuard { .. })
        ));
        assert!(matches!(
            matched.record_payment(payment_for(&matched)),
            Err(DomainError::StateGuard { .. })
        ));
        assert!(matches!(
            matched.record_transfer(transfer_for(&matched)),
            Err(DomainError::StateGuard { .. })
        ));

        let confirmed = trade_at(TradeStatus::Confirmed);
        assert!(matches!(
            confirmed.record_payment(payment_for(&confirmed)),
            Err(DomainError::StateGuard { .. })
        ));
        assert!(matches!(
            confirmed.record_transfer(transfer_for(&confirmed)),
            Err(DomainError::StateGuard { .. })
        ));

        let initiated = trade_at(TradeStatus::SettlementInitiated);
        assert!(matches!(
            initiated.record_transfer(transfer_for(&initiated)),
            Err(DomainError::StateGuard { .. })
        ));
        assert!(matches!(
            initiated.settle(Decimal::from(5000), Decimal::ZERO, Decimal::ZERO, Utc::now()),
            Err(DomainError::StateGuard { .. })
        ));
        // A different escrow account after initiation is a conflict, not a repeat
        assert!(matches!(
            initiated.initiate_settlement("escrow-other", Utc::now()),
            Err(DomainError::StateGuard { .. })
        ));
    }

    #[test]
    fn test_rebuild_from_history() {
        let open = Trade::from_match(&sample_result(), Utc::now()).unwrap();
        let mut trade: Trade = replay(std::slice::from_ref(&open));
        let mut history = vec![open];

        for user in ["buyer1", "seller1"] {
            let events = trade.confirm(user, Utc::now()).unwrap();
            trade.apply_all(&events);
            history.extend(events);
        }

        let rebuilt: Trade = replay(&history);
        assert_eq!(rebuilt.status, trade.status);
        assert_eq!(rebuilt.version(), trade.version());
        assert_eq!(rebuilt.buyer_confirmed_at, trade.buyer_confirmed_at);
    }

    #[test]
    fn test_overdue_detection() {
        let mut result = sample_result();
        result.settlement_date = Utc::now() + Duration::hours(1);
        let trade: Trade = replay(&[Trade::from_match(&result, Utc::now()).unwrap()]);

        assert!(!trade.is_overdue(Utc::now()));
        assert!(trade.is_overdue(Utc::now() + Duration::days(2)));
        assert!(!settled_trade().is_overdue(Utc::now() + Duration::days(30)));
    }
}
