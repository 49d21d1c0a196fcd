//! End-to-end pipeline flows.
//!
//! Drives an `EventPipeline` message by message with scripted
//! collaborators, pumping its loop-back channel so spawned enrichment and
//! seeding work is applied the way the actor loop would apply it.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use alpha_infinity::config::PipelineConfig;
use alpha_infinity::data::headlines;
use alpha_infinity::market::{OrderService, OrderSide};
use alpha_infinity::pipeline::{
    EventPipeline, FeedMode, PipelineDeps, PipelineMessage, PipelineSnapshot,
};
use alpha_infinity::types::*;

use crate::mocks::{RecordingOrders, ScriptedGenerator, ScriptedMarket};

fn config() -> PipelineConfig {
    PipelineConfig {
        // Keep the background scheduler out of the way; tests tick it by hand.
        demo_interval_secs: 3600,
        ..PipelineConfig::default()
    }
}

fn build(
    mode: FeedMode,
    generator: ScriptedGenerator,
    orders: Option<Arc<RecordingOrders>>,
) -> (EventPipeline, mpsc::Receiver<PipelineMessage>) {
    let deps = PipelineDeps {
        generator: Arc::new(generator),
        market: Arc::new(ScriptedMarket::new(&[("NVDA", 100.0), ("TSLA", 200.0)])),
        orders: orders.map(|o| o as Arc<dyn OrderService>),
    };
    let (mut p, rx, _snapshot) = EventPipeline::new(config(), mode, deps, StdRng::seed_from_u64(11));
    p.handle(PipelineMessage::SetPlaying(true));
    (p, rx)
}

/// Let spawned work run, then apply whatever it sent back.
async fn pump(p: &mut EventPipeline, rx: &mut mpsc::Receiver<PipelineMessage>) {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    while let Ok(msg) = rx.try_recv() {
        if matches!(msg, PipelineMessage::SchedulerTick) {
            continue;
        }
        p.handle(msg);
    }
}

fn tick(symbol: &str, price: f64, size: f64) -> PipelineMessage {
    PipelineMessage::Tick {
        symbol: symbol.into(),
        price,
        size,
    }
}

fn market_events(s: &PipelineSnapshot) -> Vec<MarketEvent> {
    s.events
        .iter()
        .filter_map(|e| match e {
            GameEvent::Market(m) => Some(m.clone()),
            _ => None,
        })
        .collect()
}

/// Wait for the next enrichment result without applying it.
async fn hold_enrichment(rx: &mut mpsc::Receiver<PipelineMessage>) -> MarketEvent {
    loop {
        match rx.recv().await {
            Some(PipelineMessage::Enriched(event)) => return event,
            Some(_) => continue,
            None => panic!("pipeline inbox closed"),
        }
    }
}

async fn seed(p: &mut EventPipeline, rx: &mut mpsc::Receiver<PipelineMessage>, symbol: &str, price: f64) {
    p.handle(tick(symbol, price, 1.0));
    pump(p, rx).await;
}

// ---------------------------------------------------------------------------
// Live feed
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_live_cooldowns_over_a_minute_of_trades() {
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::new(), None);
    seed(&mut p, &mut rx, "NVDA", 100.0).await;
    seed(&mut p, &mut rx, "TSLA", 200.0).await;
    assert!(p.snapshot().events.is_empty());

    // NVDA +1%: first event.
    p.handle(tick("NVDA", 101.0, 200.0));
    let first = market_events(&p.snapshot());
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].symbol, "NVDA");
    assert_eq!(first[0].polarity, Polarity::Opportunity);
    assert!((first[0].value - 12.0).abs() < 1e-6);
    assert_eq!(first[0].enrichment, EnrichmentState::Provisional);

    // TSLA inside the global cooldown.
    p.handle(tick("TSLA", 196.0, 50.0));
    assert_eq!(market_events(&p.snapshot()).len(), 1);

    tokio::time::advance(Duration::from_secs(11)).await;
    p.handle(tick("TSLA", 192.0, 50.0));
    let events = market_events(&p.snapshot());
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].polarity, Polarity::Trap);
    assert!(events[1].value < 0.0);

    // NVDA again: global cooldown has passed, the symbol cooldown has not.
    tokio::time::advance(Duration::from_secs(11)).await;
    p.handle(tick("NVDA", 103.0, 200.0));
    assert_eq!(market_events(&p.snapshot()).len(), 2);

    tokio::time::advance(Duration::from_secs(40)).await;
    p.handle(tick("NVDA", 105.0, 200.0));
    assert_eq!(market_events(&p.snapshot()).len(), 3);

    pump(&mut p, &mut rx).await;
    let events = market_events(&p.snapshot());
    assert!(events.iter().all(|e| e.enrichment == EnrichmentState::Enriched));
    assert_eq!(events[0].id, first[0].id);
    assert_eq!(events[0].lane, first[0].lane);
    assert_eq!(events[0].title, "NVDA surges");
    assert_eq!(events[0].news.headline, "NVDA in the headlines");
    p.teardown();
}

#[tokio::test]
async fn test_enrichment_is_idempotent_and_ignores_unknown_ids() {
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::new(), None);
    seed(&mut p, &mut rx, "NVDA", 100.0).await;
    p.handle(tick("NVDA", 102.0, 100.0));
    pump(&mut p, &mut rx).await;

    let before = p.snapshot();
    let enriched = market_events(&before).remove(0);
    p.handle(PipelineMessage::Enriched(enriched.clone()));
    assert_eq!(p.snapshot().events, before.events);

    let mut stranger = enriched;
    stranger.id = "event-999".into();
    p.handle(PipelineMessage::Enriched(stranger));
    assert_eq!(p.snapshot().events, before.events);
    p.teardown();
}

#[tokio::test(start_paused = true)]
async fn test_slow_enrichment_for_evicted_event_is_dropped() {
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::new(), None);
    seed(&mut p, &mut rx, "NVDA", 100.0).await;
    seed(&mut p, &mut rx, "TSLA", 200.0).await;

    p.handle(tick("NVDA", 102.0, 100.0));
    let held = hold_enrichment(&mut rx).await;
    assert_eq!(held.enrichment, EnrichmentState::Enriched);

    // Fifteen newer events push the provisional one out of the list.
    let (mut nvda, mut tsla) = (102.0, 200.0);
    for i in 0..15 {
        tokio::time::advance(Duration::from_secs(61)).await;
        if i % 2 == 0 {
            tsla *= 1.02;
            p.handle(tick("TSLA", tsla, 100.0));
        } else {
            nvda *= 1.02;
            p.handle(tick("NVDA", nvda, 100.0));
        }
        pump(&mut p, &mut rx).await;
    }
    let before = p.snapshot();
    assert_eq!(before.events.len(), 15);
    assert!(before.event(&held.id).is_none());

    p.handle(PipelineMessage::Enriched(held));
    assert_eq!(p.snapshot().events, before.events);
    p.teardown();
}

#[tokio::test(start_paused = true)]
async fn test_late_enrichment_keeps_lanes_and_order() {
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::new(), None);
    seed(&mut p, &mut rx, "NVDA", 100.0).await;
    seed(&mut p, &mut rx, "TSLA", 200.0).await;

    p.handle(tick("NVDA", 102.0, 100.0));
    let held = hold_enrichment(&mut rx).await;

    tokio::time::advance(Duration::from_secs(11)).await;
    p.handle(tick("TSLA", 195.0, 100.0));
    pump(&mut p, &mut rx).await;

    let before = market_events(&p.snapshot());
    assert_eq!(before.len(), 2);
    assert_eq!(before[0].id, held.id);
    assert_eq!(before[0].enrichment, EnrichmentState::Provisional);

    p.handle(PipelineMessage::Enriched(held.clone()));
    let after = market_events(&p.snapshot());
    let ids: Vec<_> = after.iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids, vec![before[0].id.clone(), before[1].id.clone()]);
    assert_eq!(after[0].lane, before[0].lane);
    assert_eq!(after[0].enrichment, EnrichmentState::Enriched);
    assert_eq!(after[0].title, held.title);
    assert_eq!(after[1], before[1]);
    p.teardown();
}

#[tokio::test]
async fn test_generator_outage_degrades_events() {
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::failing(), None);
    seed(&mut p, &mut rx, "TSLA", 200.0).await;
    p.handle(tick("TSLA", 190.0, 10.0));
    pump(&mut p, &mut rx).await;

    let events = market_events(&p.snapshot());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "TSLA - Data Error");
    assert_eq!(events[0].enrichment, EnrichmentState::Degraded);
    assert_eq!(events[0].news.source, "scripted");
    p.teardown();
}

#[tokio::test]
async fn test_paused_pipeline_drops_ticks() {
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::new(), None);
    seed(&mut p, &mut rx, "NVDA", 100.0).await;
    p.handle(PipelineMessage::SetPlaying(false));
    p.handle(tick("NVDA", 110.0, 100.0));
    assert!(p.snapshot().events.is_empty());
    assert!(!p.snapshot().playing);
    p.teardown();
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_demo_session_respects_modifiers_cap_and_quiz_blocks() {
    let (mut p, mut rx) = build(FeedMode::Demo, ScriptedGenerator::new(), None);
    let mut seen = HashSet::new();
    let mut saw_modifier = false;
    let mut saw_block = false;

    for _ in 0..400 {
        let active = p.snapshot().modifier;
        p.handle(PipelineMessage::SchedulerTick);
        pump(&mut p, &mut rx).await;

        let snap = p.snapshot();
        assert!(snap.events.len() <= 15);
        saw_modifier |= active.is_some();

        for e in market_events(&snap) {
            if !seen.insert(e.id.clone()) {
                continue;
            }
            match active {
                Some(ModifierKind::Shock) => assert_eq!(e.polarity, Polarity::Trap),
                Some(ModifierKind::Streak) => assert_eq!(e.polarity, Polarity::Opportunity),
                None => {}
            }
            assert_eq!(e.value.signum(), e.polarity.sign());
            assert!(e.lane < 3);
        }

        if let Some(id) = snap.blocked_on.clone() {
            saw_block = true;
            let before = snap.events.clone();
            p.handle(PipelineMessage::SchedulerTick);
            assert_eq!(p.snapshot().events, before);
            p.handle(PipelineMessage::AnswerQuiz { id, answer: 0 });
            assert!(p.snapshot().blocked_on.is_none());
        }
    }

    assert!(saw_modifier, "no global modifier in 400 ticks");
    assert!(saw_block, "no mandatory quiz in 400 ticks");
    assert!(!seen.is_empty());
    p.teardown();
}

#[tokio::test]
async fn test_live_forecast_prediction_pays_reward() {
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::new(), None);

    let mut forecast = None;
    for _ in 0..50 {
        p.handle(PipelineMessage::SchedulerTick);
        pump(&mut p, &mut rx).await;
        let snap = p.snapshot();
        assert!(market_events(&snap).is_empty(), "live scheduler made a market event");
        if let Some(id) = snap.blocked_on.clone() {
            p.handle(PipelineMessage::AnswerQuiz { id, answer: 0 });
        }
        forecast = snap.events.iter().find_map(|e| match e {
            GameEvent::Forecast(f) => Some(f.clone()),
            _ => None,
        });
        if forecast.is_some() {
            break;
        }
    }
    let forecast = forecast.expect("no forecast in 50 ticks");
    assert_eq!(forecast.status, ForecastStatus::Pending);
    assert!(forecast.initial_headline.ends_with("awaits regulator decision"));
    assert!((50.0..100.0).contains(&forecast.reward));

    let gemin_before = p.snapshot().stats.gemin;
    p.handle(PipelineMessage::Predict {
        id: forecast.id.clone(),
        prediction: forecast.outcome,
    });
    p.handle(PipelineMessage::ResolveForecast(forecast.id.clone()));

    let snap = p.snapshot();
    let Some(GameEvent::Forecast(resolved)) = snap.event(&forecast.id).cloned() else {
        panic!("forecast evicted");
    };
    assert_eq!(resolved.status, ForecastStatus::Resolved);
    let resolution = resolved.resolution.unwrap();
    assert_eq!(resolution.correct, Some(true));
    assert_eq!(resolution.headline, format!("{} decision is {}", forecast.symbol, forecast.outcome));
    assert_eq!(snap.stats.gemin, gemin_before + forecast.reward.round() as u64);
    p.teardown();
}

// ---------------------------------------------------------------------------
// Trading and account
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_live_trade_places_order_then_credits() {
    let orders = Arc::new(RecordingOrders::new(Decimal::from(50_000)));
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::new(), Some(orders.clone()));
    seed(&mut p, &mut rx, "NVDA", 100.0).await;
    p.handle(tick("NVDA", 101.5, 100.0));
    pump(&mut p, &mut rx).await;
    let id = market_events(&p.snapshot())[0].id.clone();

    p.handle(PipelineMessage::SettleTrade {
        id,
        quantity: 3.0,
        stop_loss: Some(95.5),
    });
    pump(&mut p, &mut rx).await;

    let placed = orders.orders();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].symbol, "NVDA");
    assert_eq!(placed[0].side, OrderSide::Buy);
    assert_eq!(placed[0].qty, Decimal::from(3));
    assert_eq!(placed[0].stop_price, Some(Decimal::from_str("95.5").unwrap()));

    let stats = p.snapshot().stats;
    assert_eq!(stats.streak, 1);
    assert_eq!(stats.gemin, 1);
    // Live equity comes from the account, not from local settlement.
    assert_eq!(stats.equity, 100_000.0);
    p.teardown();
}

#[tokio::test]
async fn test_rejected_order_changes_nothing() {
    let orders = Arc::new(RecordingOrders::new(Decimal::from(50_000)));
    orders.set_error("insufficient buying power");
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::new(), Some(orders.clone()));
    seed(&mut p, &mut rx, "TSLA", 200.0).await;
    p.handle(tick("TSLA", 204.0, 100.0));
    pump(&mut p, &mut rx).await;
    let id = market_events(&p.snapshot())[0].id.clone();

    p.handle(PipelineMessage::SettleTrade {
        id,
        quantity: 1.0,
        stop_loss: None,
    });
    pump(&mut p, &mut rx).await;
    assert!(orders.orders().is_empty());
    assert_eq!(p.snapshot().stats.streak, 0);
    p.teardown();
}

#[tokio::test(start_paused = true)]
async fn test_start_syncs_equity_and_ticker() {
    let orders = Arc::new(RecordingOrders::new(Decimal::from_str("25000.50").unwrap()));
    let (mut p, mut rx) = build(FeedMode::Live, ScriptedGenerator::new(), Some(orders));
    p.start();
    pump(&mut p, &mut rx).await;

    let snap = p.snapshot();
    assert_eq!(snap.stats.equity, 25_000.5);
    assert_eq!(snap.headlines, vec!["Markets steady ahead of CPI".to_string()]);
    p.teardown();
}

#[tokio::test(start_paused = true)]
async fn test_ticker_falls_back_when_generator_fails() {
    let (mut p, mut rx) = build(FeedMode::Demo, ScriptedGenerator::failing(), None);
    p.start();
    pump(&mut p, &mut rx).await;
    assert_eq!(p.snapshot().headlines, headlines::fallback_ticker());
    p.teardown();
}
