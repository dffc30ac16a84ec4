//! Census metric catalogue and radius bands.
//!
//! Each required base metric is stored once per radius band as
//! `{metric}_{radius}`. A record is complete when every one of those
//! columns holds a value.

use std::fmt;

/// One of the five catchment distances census statistics are reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RadiusBand(u32);

impl RadiusBand {
    /// Bands in the order the census artifact reports them (one row each).
    pub const ALL: [RadiusBand; 5] = [
        RadiusBand(5),
        RadiusBand(10),
        RadiusBand(15),
        RadiusBand(20),
        RadiusBand(25),
    ];

    pub fn miles(self) -> u32 {
        self.0
    }

    /// Band reported on artifact row `index`, if any.
    pub fn for_row(index: usize) -> Option<RadiusBand> {
        Self::ALL.get(index).copied()
    }

    /// Space-separated radius list as the census form expects it.
    pub fn form_value() -> String {
        Self::ALL
            .iter()
            .map(|b| b.0.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for RadiusBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A census statistic and the artifact header names it may appear under.
#[derive(Debug, Clone, Copy)]
pub struct BaseMetric {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

impl BaseMetric {
    /// Column name for this metric in the given band.
    pub fn field(&self, band: RadiusBand) -> String {
        format!("{}_{}", self.name, band)
    }

    /// True if `header` names this metric.
    pub fn matches(&self, header: &str) -> bool {
        let header = header.trim();
        header == self.name || self.aliases.iter().any(|a| *a == header)
    }
}

macro_rules! metric {
    ($name:literal $(, $alias:literal)*) => {
        BaseMetric { name: $name, aliases: &[$($alias),*] }
    };
}

/// Metrics required in every radius band.
pub const BASE_METRICS: &[BaseMetric] = &[
    metric!("TotPop", "Total population"),
    metric!("Age0_4", "Age 0-4"),
    metric!("Age5_9", "Age 5-9"),
    metric!("Age10_14", "Age 10-14"),
    metric!("Age15_19", "Age 15-19"),
    metric!("Age20_24", "Age 20-24"),
    metric!("Age25_34", "Age 25-34"),
    metric!("Age35_44", "Age 35-44"),
    metric!("Age45_54", "Age 45-54"),
    metric!("Age55_59", "Age 55-59"),
    metric!("Age60_64", "Age 60-64"),
    metric!("Age65_74", "Age 65-74"),
    metric!("Age75_84", "Age 75-84"),
    metric!("Over85", "Age 85+", "Age 85 and over"),
    metric!("TotHUs", "Total housing units"),
    metric!("OccHUs", "Occupied housing units"),
    metric!("OwnerOcc", "Owner occupied"),
    metric!("RenterOcc", "Renter occupied"),
    metric!("MedianHHInc", "Median household income"),
    metric!("MedianGrossRent", "Median gross rent"),
    metric!("AvgGrossRent", "Average gross rent", "Mean gross rent"),
    metric!(
        "CashRentOver30Pct",
        "Cash rent over 30 pct of income",
        "Cash rent over 30% of income"
    ),
];

/// Reported once per artifact (first row) rather than per band.
pub const MOBILE_HOMES_PER_K: BaseMetric =
    metric!("MobileHomesPerK", "Mobile Homes per 1000 Housing Units");

/// Every `{metric}_{radius}` column the completeness template requires,
/// grouped by band.
pub fn required_fields() -> Vec<String> {
    RadiusBand::ALL
        .iter()
        .flat_map(|band| BASE_METRICS.iter().map(move |m| m.field(*band)))
        .collect()
}
