pub mod binance;
pub mod market_data;

pub use binance::BinanceAccountClient;
pub use market_data::MarketDataClient;
