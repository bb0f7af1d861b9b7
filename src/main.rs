//! Arcade perps simulation.
//!
//! Runs seeded scenarios through the engine: news shocks, player trades, a liquidation,
//! crowd rewards and the streak bonus. Set `ARENA_REALTIME=1` to also run a short round
//! against the wall clock. Log verbosity follows `RUST_LOG`.

use perps_arena::*;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    println!("Perps Arena Simulation");
    println!("Two assets, isolated margin, synthetic crowd\n");

    scenario_1_open_and_close()?;
    scenario_2_liquidation()?;
    scenario_3_news_round()?;
    scenario_4_streak_bonus()?;
    scenario_5_crowd_rewards()?;

    if std::env::var("ARENA_REALTIME").is_ok() {
        scenario_6_realtime()?;
    }

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn new_engine(seed: u64) -> Result<Engine, EngineError> {
    Engine::new(EngineConfig::seeded(seed), GameConfig::default(), Timestamp::from_millis(0))
}

/// Open, hold past the penalty window, close at a profit.
fn scenario_1_open_and_close() -> Result<(), EngineError> {
    println!("Scenario 1: Open and Close\n");

    let mut driver = TickDriver::new(new_engine(1)?);
    let open = driver
        .engine_mut()
        .open_position(Asset::BtcPerp, Side::Long, Quote::new(dec!(1000)), dec!(10))?;
    println!("  Long {} BTC @ ${}", open.fill_size, open.fill_price);
    println!("  Liquidation price: ${}", open.position.liquidation_price());

    driver.run_for(12_000);
    let mark = driver.engine().mark_price(Asset::BtcPerp);
    let close = driver.engine_mut().close_position(Asset::BtcPerp, Side::Long, dec!(1))?;
    println!("  Mark after 12s: ${}", mark.map(|p| p.to_string()).unwrap_or_default());
    println!(
        "  Closed: pnl ${}, penalty ${}, cash back ${}",
        close.realized_pnl, close.penalty, close.cash_returned
    );
    println!("  Cash: ${}\n", driver.engine().cash());
    Ok(())
}

/// A 10x long from 50,000 is liquidated once the mark crosses 45,000.
fn scenario_2_liquidation() -> Result<(), EngineError> {
    println!("Scenario 2: Liquidation\n");

    let mut engine = new_engine(2)?;
    let open = engine.open_position(Asset::BtcPerp, Side::Long, Quote::new(dec!(1000)), dec!(10))?;
    let liq = open.position.liquidation_price();
    println!(
        "  Buffer at entry: {:.2}%",
        liquidation_buffer(Side::Long, open.fill_price, liq) * dec!(100)
    );
    engine.set_index_price(Asset::BtcPerp, Price::new_unchecked(dec!(44900)));
    if let Some(mark) = engine.mark_price(Asset::BtcPerp) {
        println!("  Buffer at ${}: {:.2}%", mark, liquidation_buffer(Side::Long, mark, liq) * dec!(100));
    }

    for liq in engine.check_liquidations() {
        println!(
            "  {} {} liquidated: mark ${} crossed ${}, margin lost ${}",
            liq.asset, liq.side, liq.mark_price, liq.liquidation_price, liq.margin_lost
        );
    }
    if let Some(record) = engine.transactions().next() {
        println!("  Transaction pnl: ${}", record.pnl);
    }
    println!("  Cash: ${}\n", engine.cash());
    Ok(())
}

/// A full round of price process with news shocks.
fn scenario_3_news_round() -> Result<(), EngineError> {
    println!("Scenario 3: News Round\n");

    let mut driver = TickDriver::new(new_engine(3)?);
    let results = driver.run_for(120_000);

    let news_ticks = results
        .iter()
        .flat_map(|r| r.regimes.values())
        .filter(|regime| **regime == Regime::NewsTrigger)
        .count();
    println!("  {} ticks, {} headlines", results.len(), news_ticks);

    for event in driver.engine().events() {
        if let EventPayload::NewsTriggered(news) = &event.payload {
            println!(
                "  [{}] {} {} ({}, {}): {:.2}%",
                event.timestamp.as_millis() / 1000,
                news.asset,
                news.title,
                news.sentiment,
                news.importance,
                news.initial_change * dec!(100)
            );
        }
    }

    for asset in Asset::ALL {
        let engine = driver.engine();
        println!(
            "  {}: mark ${}, {:.3}% over 10s",
            asset,
            engine.mark_price(asset).map(|p| p.to_string()).unwrap_or_default(),
            engine.price_change_pct_default(asset)
        );
    }
    println!("  Last events:");
    for event in driver.engine().recent_events(3) {
        println!("    [{}] {:?}", event.timestamp.as_millis(), event.payload);
    }
    println!();
    Ok(())
}

/// Three winning closes unlock the bonus pump.
fn scenario_4_streak_bonus() -> Result<(), EngineError> {
    println!("Scenario 4: Streak Bonus\n");

    let mut engine = new_engine(4)?;
    for i in 1..=3 {
        engine.open_position(Asset::EthPerp, Side::Long, Quote::new(dec!(500)), dec!(5))?;
        let mark = engine.mark_price(Asset::EthPerp).map(|p| p.value()).unwrap_or_default();
        engine.set_index_price(Asset::EthPerp, Price::new_unchecked(mark + dec!(30)));
        let close = engine.close_position(Asset::EthPerp, Side::Long, dec!(1))?;
        println!("  Win {}: pnl ${}, bonus granted: {}", i, close.realized_pnl, close.bonus_granted);
    }

    engine.trigger_bonus(Asset::EthPerp, ManiaAction::Pump)?;
    if let Some(market) = engine.market(Asset::EthPerp) {
        println!("  Pump triggered: basis {}, mark ${}", market.basis, market.mark_price);
    }
    println!("  Win rate: {}%\n", engine.win_rate());
    Ok(())
}

/// Crowd positions get liquidated and pay the player.
fn scenario_5_crowd_rewards() -> Result<(), EngineError> {
    println!("Scenario 5: Crowd Rewards\n");

    // coarser 300ms ticks; the crowd still fills up within a minute
    let mut driver = TickDriver::with_interval(new_engine(5)?, 300);
    driver.run_for(60_000);

    let totals = driver.engine().crowd_totals(Asset::BtcPerp);
    println!(
        "  BTC crowd: {} long (${}), {} short (${})",
        totals.long_count, totals.long_value, totals.short_count, totals.short_value
    );
    println!("  Sentiment: {}", driver.engine().crowd_sentiment(Asset::BtcPerp));

    // a sharp move sweeps the over-levered side
    let mark = driver
        .engine()
        .mark_price(Asset::BtcPerp)
        .map(|p| p.value())
        .unwrap_or_default();
    driver
        .engine_mut()
        .set_index_price(Asset::BtcPerp, Price::floored(mark * dec!(0.85)));
    let result = driver.step();
    println!(
        "  Crash: {} crowd liquidations, reward ${}",
        result.crowd.liquidated, result.crowd.reward
    );
    let engine = driver.into_inner();
    println!("  Total rewards: ${} after {}s\n", engine.account().total_rewards, engine.time().as_millis() / 1000);
    Ok(())
}

/// A short round against the wall clock.
fn scenario_6_realtime() -> Result<(), EngineError> {
    println!("Scenario 6: Real Time\n");

    let mut game = GameConfig::default();
    game.round_duration_ms = 5_000;
    let interval = Duration::from_millis(game.tick_interval_ms.unsigned_abs());
    let mut engine = Engine::new(EngineConfig::default(), game, Timestamp::now())?;

    while !engine.is_round_over() {
        std::thread::sleep(interval);
        engine.tick(Timestamp::now());
    }
    println!(
        "  Round over: BTC ${}, ETH ${}\n",
        engine.mark_price(Asset::BtcPerp).map(|p| p.to_string()).unwrap_or_default(),
        engine.mark_price(Asset::EthPerp).map(|p| p.to_string()).unwrap_or_default()
    );
    Ok(())
}
