// =============================================================================
// Projection Engine — scenario × region × live signal → yearly series
// =============================================================================
//
// Pure and total over valid keys: no I/O, no clock, no shared state.
//
// Crypto boost (revenue only), by BTC spot price:
//   price > 100 000           =>  1.20
//   85 000 < price <= 100 000 =>  1.08
//   price <= 85 000           =>  0.95
//
// Per year i in 0..3:
//   revenue = round1(base_revenue[i] × region_factor × boost)
//   users   = round0(base_users[i] × region_factor)
//
// Summaries are taken from the final year:
//   usd   = "$<revenue:.1>M"
//   local = "<CODE> <round0(revenue × exchange_rate)>M"
// =============================================================================

use serde::Serialize;

use crate::market_signal::MarketSignal;
use crate::scenario_table::{self, FIRST_YEAR, PROJECTION_YEARS};
use crate::types::{Region, Scenario};

/// Price above which the top boost tier applies (exclusive).
const BOOST_HIGH_THRESHOLD: u64 = 100_000;
/// Price above which the middle boost tier applies (exclusive).
const BOOST_MID_THRESHOLD: u64 = 85_000;

const BOOST_HIGH: f64 = 1.20;
const BOOST_MID: f64 = 1.08;
const BOOST_LOW: f64 = 0.95;

/// One projected year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearProjection {
    pub year: u16,
    /// Revenue in USD millions, rounded to one decimal.
    pub revenue: f64,
    /// Users, rounded to the nearest whole number.
    pub users: u64,
}

/// Derived projection for one scenario/region under one market signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionResult {
    pub scenario: Scenario,
    pub region: Region,
    pub crypto_boost: f64,
    pub years: [YearProjection; PROJECTION_YEARS],
    /// Final-year revenue in USD, e.g. `$11.0M`.
    pub usd_summary: String,
    /// Final-year revenue in local currency, e.g. `KES 1791M`.
    pub local_summary: String,
}

/// Revenue multiplier for the given BTC spot price.
pub fn crypto_boost(btc_price: u64) -> f64 {
    if btc_price > BOOST_HIGH_THRESHOLD {
        BOOST_HIGH
    } else if btc_price > BOOST_MID_THRESHOLD {
        BOOST_MID
    } else {
        BOOST_LOW
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round0(v: f64) -> u64 {
    v.round().max(0.0) as u64
}

/// Format a USD-millions figure for the summary line.
pub fn format_usd(revenue: f64) -> String {
    format!("${revenue:.1}M")
}

/// Format a USD-millions figure converted to local currency.
pub fn format_local(currency_code: &str, revenue: f64, exchange_rate: f64) -> String {
    format!("{currency_code} {}M", round0(revenue * exchange_rate))
}

/// Computes projections for a fixed local display currency.
#[derive(Debug, Clone)]
pub struct ProjectionEngine {
    currency_code: String,
}

impl ProjectionEngine {
    pub fn new(currency_code: impl Into<String>) -> Self {
        Self {
            currency_code: currency_code.into(),
        }
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    /// Project revenue and users for `scenario` in `region` under `signal`.
    pub fn project(&self, scenario: Scenario, region: Region, signal: &MarketSignal) -> ProjectionResult {
        let revenue_base = scenario_table::base_revenue(scenario);
        let factor = scenario_table::region_factor(region).factor;
        let boost = crypto_boost(signal.btc_price);

        let years: [YearProjection; PROJECTION_YEARS] = std::array::from_fn(|i| YearProjection {
            year: FIRST_YEAR + i as u16,
            revenue: round1(revenue_base[i] * factor * boost),
            users: round0(scenario_table::BASE_USERS[i] * factor),
        });

        let final_revenue = years[PROJECTION_YEARS - 1].revenue;

        ProjectionResult {
            scenario,
            region,
            crypto_boost: boost,
            years,
            usd_summary: format_usd(final_revenue),
            local_summary: format_local(&self.currency_code, final_revenue, signal.exchange_rate),
        }
    }
}

impl Default for ProjectionEngine {
    fn default() -> Self {
        Self::new("KES")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(btc_price: u64, exchange_rate: f64) -> MarketSignal {
        MarketSignal {
            exchange_rate,
            btc_price,
            live_users: 0,
            last_update: None,
        }
    }

    #[test]
    fn boost_tier_boundaries() {
        assert!((crypto_boost(100_001) - 1.20).abs() < 1e-12);
        assert!((crypto_boost(100_000) - 1.08).abs() < 1e-12);
        assert!((crypto_boost(85_001) - 1.08).abs() < 1e-12);
        assert!((crypto_boost(85_000) - 0.95).abs() < 1e-12);
        assert!((crypto_boost(0) - 0.95).abs() < 1e-12);
    }

    #[test]
    fn always_three_consecutive_years_from_2026() {
        let engine = ProjectionEngine::default();
        for scenario in Scenario::ALL {
            for region in Region::ALL {
                for price in [0, 85_000, 95_000, 150_000] {
                    let r = engine.project(scenario, region, &signal(price, 150.0));
                    let years: Vec<u16> = r.years.iter().map(|y| y.year).collect();
                    assert_eq!(years, vec![2026, 2027, 2028]);
                }
            }
        }
    }

    #[test]
    fn base_kenya_mid_tier_example() {
        let engine = ProjectionEngine::default();
        let r = engine.project(Scenario::Base, Region::Kenya, &signal(95_000, 162.8));
        assert!((r.years[2].revenue - 11.0).abs() < 1e-9);
        assert_eq!(r.usd_summary, "$11.0M");
        assert_eq!(r.local_summary, "KES 1791M");
        assert_eq!(r.years[0].users, 38);
        assert_eq!(r.years[2].users, 210);
    }

    #[test]
    fn best_africa_high_tier_example() {
        let engine = ProjectionEngine::default();
        let r = engine.project(Scenario::Best, Region::Africa, &signal(120_000, 162.8));
        assert!((r.years[0].revenue - 17.6).abs() < 1e-9);
        // 38 × 5.25 = 199.5 rounds up.
        assert_eq!(r.years[0].users, 200);
        assert!((r.crypto_boost - 1.20).abs() < 1e-12);
    }

    #[test]
    fn repeated_projection_is_identical() {
        let engine = ProjectionEngine::default();
        let s = signal(99_999, 129.37);
        let a = engine.project(Scenario::Downside, Region::EastAfrica, &s);
        let b = engine.project(Scenario::Downside, Region::EastAfrica, &s);
        assert_eq!(a, b);
        for (x, y) in a.years.iter().zip(b.years.iter()) {
            assert_eq!(x.revenue.to_bits(), y.revenue.to_bits());
        }
    }

    #[test]
    fn larger_region_strictly_increases_every_year() {
        let engine = ProjectionEngine::default();
        for scenario in Scenario::ALL {
            for price in [50_000, 90_000, 200_000] {
                let s = signal(price, 160.0);
                let results: Vec<ProjectionResult> = Region::ALL
                    .iter()
                    .map(|&region| engine.project(scenario, region, &s))
                    .collect();
                for pair in results.windows(2) {
                    for i in 0..PROJECTION_YEARS {
                        assert!(pair[1].years[i].revenue > pair[0].years[i].revenue);
                        assert!(pair[1].years[i].users > pair[0].years[i].users);
                    }
                }
            }
        }
    }

    #[test]
    fn users_ignore_crypto_boost() {
        let engine = ProjectionEngine::default();
        let low = engine.project(Scenario::Base, Region::EastAfrica, &signal(10_000, 160.0));
        let high = engine.project(Scenario::Base, Region::EastAfrica, &signal(500_000, 160.0));
        for i in 0..PROJECTION_YEARS {
            assert_eq!(low.years[i].users, high.years[i].users);
            assert!(high.years[i].revenue > low.years[i].revenue);
        }
    }

    #[test]
    fn local_summary_uses_configured_currency() {
        let engine = ProjectionEngine::new("UGX");
        let r = engine.project(Scenario::Downside, Region::Kenya, &signal(80_000, 3700.0));
        // 6.8 × 0.95 = 6.46 -> 6.5; 6.5 × 3700 = 24050
        assert_eq!(r.usd_summary, "$6.5M");
        assert_eq!(r.local_summary, "UGX 24050M");
    }
}
