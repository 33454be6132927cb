// =============================================================================
// Scenario Table & Region Factors — static model inputs
// =============================================================================
//
// Base revenue per scenario (USD millions) for the three projection years,
// plus the user-count trajectory (thousands) shared by every scenario.
//
//   scenario   2026   2027   2028
//   best        2.8    7.2   14.8
//   base        2.2    5.1   10.2
//   downside    1.6    3.4    6.8
//   users        38     98    210
//
// Region factors scale both revenue and users uniformly across all years.
// =============================================================================

use serde::Serialize;

use crate::types::{Region, Scenario};

/// Number of projected years.
pub const PROJECTION_YEARS: usize = 3;

/// Calendar year of the first projected entry.
pub const FIRST_YEAR: u16 = 2026;

/// Base user counts per year, shared across scenarios.
pub const BASE_USERS: [f64; PROJECTION_YEARS] = [38.0, 98.0, 210.0];

/// Base revenue (USD millions) per year for `scenario`.
pub fn base_revenue(scenario: Scenario) -> [f64; PROJECTION_YEARS] {
    match scenario {
        Scenario::Best => [2.8, 7.2, 14.8],
        Scenario::Base => [2.2, 5.1, 10.2],
        Scenario::Downside => [1.6, 3.4, 6.8],
    }
}

/// Display name and multiplicative scale for an expansion region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionFactor {
    pub name: &'static str,
    pub factor: f64,
}

/// Look up the static factor entry for `region`.
pub fn region_factor(region: Region) -> RegionFactor {
    match region {
        Region::Kenya => RegionFactor {
            name: "Kenya Only",
            factor: 1.0,
        },
        Region::EastAfrica => RegionFactor {
            name: "East Africa",
            factor: 2.7,
        },
        Region::Africa => RegionFactor {
            name: "Pan-Africa",
            factor: 5.25,
        },
    }
}

// =============================================================================
// Catalog (served to the dashboard so it never hardcodes the tables)
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioEntry {
    pub id: Scenario,
    pub base_revenue: [f64; PROJECTION_YEARS],
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionEntry {
    pub id: Region,
    pub name: &'static str,
    pub factor: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub first_year: u16,
    pub base_users: [f64; PROJECTION_YEARS],
    pub scenarios: Vec<ScenarioEntry>,
    pub regions: Vec<RegionEntry>,
}

/// Build the full scenario/region catalog.
pub fn catalog() -> Catalog {
    Catalog {
        first_year: FIRST_YEAR,
        base_users: BASE_USERS,
        scenarios: Scenario::ALL
            .iter()
            .map(|&id| ScenarioEntry {
                id,
                base_revenue: base_revenue(id),
            })
            .collect(),
        regions: Region::ALL
            .iter()
            .map(|&id| {
                let rf = region_factor(id);
                RegionEntry {
                    id,
                    name: rf.name,
                    factor: rf.factor,
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factors_are_at_least_one_and_increase_with_region_size() {
        let factors: Vec<f64> = Region::ALL.iter().map(|&r| region_factor(r).factor).collect();
        assert!(factors.iter().all(|&f| f >= 1.0));
        assert!(factors.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn scenarios_are_ordered_best_over_downside() {
        let best = base_revenue(Scenario::Best);
        let base = base_revenue(Scenario::Base);
        let down = base_revenue(Scenario::Downside);
        for i in 0..PROJECTION_YEARS {
            assert!(best[i] > base[i]);
            assert!(base[i] > down[i]);
        }
    }

    #[test]
    fn catalog_lists_every_key() {
        let c = catalog();
        assert_eq!(c.scenarios.len(), 3);
        assert_eq!(c.regions.len(), 3);
        assert_eq!(c.regions[2].name, "Pan-Africa");
        assert!((c.regions[1].factor - 2.7).abs() < 1e-12);
    }
}
