pub mod client;
pub mod types;
pub mod window;

pub use client::ForecastClient;
pub use types::{Forecast, ForecastCollection};
