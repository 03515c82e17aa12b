use broker_core::types::Timeframe;

/// OANDA candle granularities bottom out at `S5` and top out at `M` (month);
/// we only ever ask for the subset our `Timeframe` enum models.
pub fn timeframe_to_granularity(tf: Timeframe) -> &'static str {
    match tf {
        Timeframe::M1 => "M1",
        Timeframe::M5 => "M5",
        Timeframe::M15 => "M15",
        Timeframe::M30 => "M30",
        Timeframe::H1 => "H1",
        Timeframe::H4 => "H4",
        Timeframe::D1 => "D",
        Timeframe::W1 => "W",
    }
}

/// OANDA's instrument notation (`EUR_USD`) differs from the `EUR/USD`
/// display form used elsewhere; adapters translate at the boundary.
pub fn to_oanda_instrument(symbol: &str) -> String {
    symbol.replace('/', "_")
}
