// ============================================================================
// Basic Usage Example
// ============================================================================

use chrono::Utc;
use marketplace_engine::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

fn main() {
    println!("=== Marketplace Engine Example ===\n");

    // Wire up an in-memory deployment
    let source = Arc::new(InMemoryOrderBookSource::new());
    let market_data = Arc::new(StaticMarketData::with_price("ACME", Decimal::from(50)));
    let source_handle: Arc<dyn OrderBookSource> = source.clone();
    let engine = MatchingEngine::new(source_handle, market_data, MatchingConfig::default());
    let service = ExecutionService::new(
        Repository::new(Arc::new(InMemoryEventLog::new()), Arc::new(NoOpEventBus)),
        RiskFilteredEngine::new(engine, Arc::new(NoOpRiskEngine)),
        source,
    );

    // Sellers open listings at different asking prices
    println!("Opening listings...");
    for (price, shares) in [(50i64, 100u64), (51, 200), (52, 150)] {
        let listing = service
            .open_listing(OpenListing {
                security_id: "ACME".to_string(),
                seller_id: format!("seller_{}", price),
                shares,
                kind: ListingKind::Fixed,
                min_price: None,
                reserve_price: None,
                current_price: Some(Decimal::from(price)),
                restriction: None,
                accredited_only: false,
                expires_at: None,
            })
            .expect("listing should open");
        println!("  {} shares @ {} ({})", shares, price, listing.id);
    }

    // Buyers place bids
    println!("\nPlacing bids...");
    for (price, shares) in [(52i64, 120u64), (51, 100)] {
        let bid = service
            .place_bid(PlaceBid {
                listing_id: None,
                security_id: "ACME".to_string(),
                bidder_id: format!("buyer_{}", price),
                shares,
                price: Some(Decimal::from(price)),
                stop_price: None,
                kind: BidKind::Limit,
                accredited: true,
                expires_at: None,
            })
            .expect("bid should place");
        println!("  {} shares @ {} ({})", shares, price, bid.id);
    }

    // Run a price-time matching pass
    println!("\n=== Matching (price-time) ===");
    let trades = service
        .run_matching("ACME", MatchingPolicy::PriceTime)
        .expect("matching should run");

    for trade in &trades {
        println!(
            "  Trade {}: {} shares @ {} = {} ({} -> {})",
            trade.id, trade.shares, trade.price, trade.total_amount, trade.seller_id, trade.buyer_id
        );
    }

    // Walk the first trade through settlement
    let trade = &trades[0];
    let trade_id = trade.id.to_string();
    println!("\n=== Settling trade {} ===", trade_id);

    service.confirm_trade(&trade_id, &trade.buyer_id).unwrap();
    let confirmed = service.confirm_trade(&trade_id, &trade.seller_id).unwrap();
    println!("  Confirmed: {:?}", confirmed.status);

    service.initiate_settlement(&trade_id, "escrow-main").unwrap();
    service
        .record_payment(
            &trade_id,
            PaymentRecord {
                amount: trade.total_amount,
                currency: "USD".to_string(),
                method: "wire".to_string(),
                transaction_ref: format!("TXN-{}", trade_id),
                received_at: Utc::now(),
            },
        )
        .unwrap();
    service
        .record_transfer(
            &trade_id,
            TransferRecord {
                shares: trade.shares,
                from: trade.seller_id.clone(),
                to: trade.buyer_id.clone(),
                method: "book-entry".to_string(),
                certificate_hash: Some("a1b2c3".to_string()),
                transferred_at: Utc::now(),
            },
        )
        .unwrap();
    let settled = service
        .settle_trade(
            &trade_id,
            trade.total_amount,
            Decimal::from(25),
            Decimal::ZERO,
        )
        .unwrap();

    println!("  Status: {:?}", settled.status);
    println!("  Progress: {}%", settled.settlement_progress());
    println!("  Net to seller: {}", settled.net_amount());
}
