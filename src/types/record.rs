use serde::{Deserialize, Serialize};

/// One company-day observation from the historical dataset.
///
/// Records belonging to the same company form a chronological sequence;
/// the loader preserves file order, and ordering within a company is the
/// caller's responsibility. The trend label stays a string here and is
/// validated against [`crate::types::TrendClass`] during featurization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRecord {
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Market_Cap")]
    pub market_cap: f64,
    #[serde(rename = "PE_Ratio")]
    pub pe_ratio: f64,
    #[serde(rename = "Dividend_Yield")]
    pub dividend_yield: f64,
    #[serde(rename = "Volatility")]
    pub volatility: f64,
    #[serde(rename = "Sentiment_Score")]
    pub sentiment_score: f64,
    #[serde(rename = "Trend")]
    pub trend: String,
}

impl MarketRecord {
    pub fn price_range(&self) -> f64 {
        self.high - self.low
    }

    pub fn price_change(&self) -> f64 {
        self.close - self.open
    }
}
