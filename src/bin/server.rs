use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use signal_engine::application::engine::TradingEngine;
use signal_engine::application::ml::{MlSignalService, SmartCorePredictorModel};
use signal_engine::application::risk_management::RiskManager;
use signal_engine::application::strategies::GridStrategy;
use signal_engine::config::{init_tracing, Config};
use signal_engine::domain::market::Timeframe;
use signal_engine::domain::ports::PredictBinary;
use signal_engine::infrastructure::{InMemoryCandleStore, PaperExchange};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("loading configuration")?;
    info!(symbol = %config.grid.symbol, "starting signal engine");

    let candle_store = Arc::new(InMemoryCandleStore::new());
    let exchange = Arc::new(PaperExchange::new(config.grid.symbol.clone(), config.paper.initial_balance));
    let strategy = Box::new(GridStrategy::new(config.grid.clone()));
    let risk_manager = RiskManager::new(config.risk);

    let ml_service = if std::path::Path::new(&config.ml.model_path).exists() {
        let main_model: Arc<dyn PredictBinary> =
            Arc::new(SmartCorePredictorModel::load(&config.ml.model_path, "main")?);
        Some(Arc::new(MlSignalService::new(
            candle_store.clone(),
            main_model,
            Default::default(),
            config.grid.symbol.clone(),
            Timeframe::FifteenMin,
            config.ml.lookback,
            config.ml.context_days,
            config.ml.pattern_gain_pct,
            config.ml.pattern_stop_pct,
            config.ml.pattern_horizon,
        )))
    } else {
        info!(path = %config.ml.model_path.display(), "no ML model artifact found, running without ML gating");
        None
    };

    let mut engine = TradingEngine::new(config.engine, exchange, strategy, risk_manager, ml_service);
    engine.initialize().await?;
    engine.mark_running(true);

    info!("signal engine running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;

    info!("shutdown requested");
    engine.stop().await?;
    Ok(())
}
