use crate::ensemble::Ensemble;
use crate::error::StrategyError;
use crate::ma_crossover::MACrossover;
use crate::market::MarketView;
use crate::rsi_reversion::RsiReversion;
use crate::scripted::ScriptedStrategy;
use crate::Strategy;
use configuration::Config;
use core_types::StrategyId;
use market_data::PriceProvider;
use std::sync::Arc;

/// Creates a new strategy instance based on the provided ID and configuration.
///
/// Every strategy is handed the same read-only price provider the engine uses,
/// so strategies and executions always see the same closes.
pub fn create_strategy(
    id: StrategyId,
    config: &Config,
    provider: Arc<dyn PriceProvider>,
) -> Result<Box<dyn Strategy>, StrategyError> {
    let market = MarketView::from_config(config, provider);

    // The compiler will error if a new StrategyId is added but not handled here.
    match id {
        StrategyId::MACrossover => Ok(Box::new(MACrossover::new(
            config.strategies.ma_crossover.clone(),
            market,
        )?)),
        StrategyId::RsiReversion => Ok(Box::new(RsiReversion::new(
            config.strategies.rsi_reversion.clone(),
            market,
        )?)),
        StrategyId::Scripted => {
            let Some(path) = &config.strategies.scripted.script_path else {
                return Err(StrategyError::InvalidParameters(
                    "the scripted strategy requires `strategies.scripted.script_path`".to_string(),
                ));
            };
            Ok(Box::new(ScriptedStrategy::from_path(path)?))
        }
        StrategyId::Ensemble => {
            let members: Vec<Box<dyn Strategy>> = vec![
                Box::new(MACrossover::new(
                    config.strategies.ma_crossover.clone(),
                    market.clone(),
                )?),
                Box::new(RsiReversion::new(
                    config.strategies.rsi_reversion.clone(),
                    market,
                )?),
            ];
            Ok(Box::new(Ensemble::new("ensemble", members)?))
        }
    }
}
