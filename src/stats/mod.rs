//! Statistic kinds, per-worker counters and percentages.
//!
//! - [`StatType`] names what a row counts and carries its percentage rule.
//! - [`Accumulator`] is the counter map a worker fills while parsing.
//! - [`AggregatedResult`] is the reduced, trace-level statistics.
//! - [`percentage`] turns counts into on-demand percentages.

pub mod accumulator;
pub mod percentage;
pub mod result;

pub use accumulator::Accumulator;
pub use percentage::{CategoryTotals, Percentage, PercentageScope, RatedRow, format_percentage};
pub use result::AggregatedResult;

use serde::{Deserialize, Serialize};

/// How a category's percentages are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denominator {
    /// Relative to the sum of all rows of the same category in scope
    CategoryTotal,
    /// Counts only; percentages are not applicable
    Unrated,
}

/// The kind of a statistic row.
///
/// Serialized by name (`api_calls`, `render_states`, ...). Names this version
/// doesn't know are kept as [`StatType::Other`] so a newer document survives
/// an import and export unchanged. Ordering follows declaration order, which
/// is also the order rows are written in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatType {
    ApiCalls,
    DeviceTypes,
    BehaviorFlags,
    PresentParameters,
    RenderStates,
    QueryTypes,
    Formats,
    Pools,
    DeviceFlags,
    FeatureLevels,
    RasterizerStates,
    BlendStates,
    Usage,
    BindFlags,
    Other(String),
}

impl StatType {
    /// Every kind this version knows, in row order.
    pub const KNOWN: [StatType; 14] = [
        StatType::ApiCalls,
        StatType::DeviceTypes,
        StatType::BehaviorFlags,
        StatType::PresentParameters,
        StatType::RenderStates,
        StatType::QueryTypes,
        StatType::Formats,
        StatType::Pools,
        StatType::DeviceFlags,
        StatType::FeatureLevels,
        StatType::RasterizerStates,
        StatType::BlendStates,
        StatType::Usage,
        StatType::BindFlags,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            StatType::ApiCalls => "api_calls",
            StatType::DeviceTypes => "device_types",
            StatType::BehaviorFlags => "behavior_flags",
            StatType::PresentParameters => "present_parameters",
            StatType::RenderStates => "render_states",
            StatType::QueryTypes => "query_types",
            StatType::Formats => "formats",
            StatType::Pools => "pools",
            StatType::DeviceFlags => "device_flags",
            StatType::FeatureLevels => "feature_levels",
            StatType::RasterizerStates => "rasterizer_states",
            StatType::BlendStates => "blend_states",
            StatType::Usage => "usage",
            StatType::BindFlags => "bind_flags",
            StatType::Other(name) => name,
        }
    }

    pub fn denominator(&self) -> Denominator {
        match self {
            StatType::ApiCalls | StatType::RenderStates | StatType::QueryTypes => {
                Denominator::CategoryTotal
            }
            _ => Denominator::Unrated,
        }
    }
}

impl std::fmt::Display for StatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for StatType {
    fn from(name: &str) -> Self {
        // Older uploads spell it the way the first web importer did
        if name == "rastizer_states" {
            return StatType::RasterizerStates;
        }
        Self::KNOWN
            .into_iter()
            .find(|known| known.as_str() == name)
            .unwrap_or_else(|| StatType::Other(name.to_string()))
    }
}

impl From<String> for StatType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<StatType> for String {
    fn from(stat_type: StatType) -> Self {
        stat_type.as_str().to_string()
    }
}

impl std::str::FromStr for StatType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// One statistic row of a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRow {
    pub stat_type: StatType,
    pub stat_name: String,
    pub stat_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("api_calls", StatType::ApiCalls)]
    #[case("render_states", StatType::RenderStates)]
    #[case("rastizer_states", StatType::RasterizerStates)]
    #[case("rasterizer_states", StatType::RasterizerStates)]
    #[case("mesh_shaders", StatType::Other("mesh_shaders".into()))]
    fn test_stat_type_from_name(#[case] name: &str, #[case] expected: StatType) {
        assert_eq!(StatType::from(name), expected);
    }

    #[test]
    fn test_known_names_round_trip() {
        for stat_type in StatType::KNOWN {
            assert_eq!(StatType::from(stat_type.as_str()), stat_type);
        }
    }

    #[test]
    fn test_denominator_rules() {
        let rated: Vec<_> = StatType::KNOWN
            .into_iter()
            .filter(|t| t.denominator() == Denominator::CategoryTotal)
            .collect();
        assert_eq!(
            rated,
            vec![StatType::ApiCalls, StatType::RenderStates, StatType::QueryTypes]
        );
        assert_eq!(
            StatType::Other("x".into()).denominator(),
            Denominator::Unrated
        );
    }

    #[test]
    fn test_unknown_kinds_sort_after_known() {
        assert!(StatType::BindFlags < StatType::Other("a".into()));
        assert!(StatType::ApiCalls < StatType::RenderStates);
    }
}
