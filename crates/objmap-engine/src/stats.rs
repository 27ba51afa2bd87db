//! Mapping statistics.
//!
//! The engine reports counters through a [`StatisticsSink`]. [`Statistics`]
//! is the in-memory sink; [`NoopStatistics`] discards everything and is the
//! default.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter kinds reported by the engine. Times are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatisticType {
    MappingSuccessCount,
    MappingFailureCount,
    MappingTime,
    FieldMappingSuccessCount,
    FieldMappingFailureCount,
    FieldMappingFailureIgnoredCount,
    CustomConverterSuccessCount,
    CustomConverterTime,
}

impl StatisticType {
    pub const ALL: [StatisticType; 8] = [
        Self::MappingSuccessCount,
        Self::MappingFailureCount,
        Self::MappingTime,
        Self::FieldMappingSuccessCount,
        Self::FieldMappingFailureCount,
        Self::FieldMappingFailureIgnoredCount,
        Self::CustomConverterSuccessCount,
        Self::CustomConverterTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MappingSuccessCount => "mapping_success_count",
            Self::MappingFailureCount => "mapping_failure_count",
            Self::MappingTime => "mapping_time",
            Self::FieldMappingSuccessCount => "field_mapping_success_count",
            Self::FieldMappingFailureCount => "field_mapping_failure_count",
            Self::FieldMappingFailureIgnoredCount => "field_mapping_failure_ignored_count",
            Self::CustomConverterSuccessCount => "custom_converter_success_count",
            Self::CustomConverterTime => "custom_converter_time",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Destination for engine counters.
pub trait StatisticsSink: Send + Sync {
    fn increment(&self, kind: StatisticType, amount: u64);
}

/// Sink that drops all counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatistics;

impl StatisticsSink for NoopStatistics {
    fn increment(&self, _kind: StatisticType, _amount: u64) {}
}

/// Thread-safe in-memory counters.
#[derive(Debug, Default)]
pub struct Statistics {
    counters: [AtomicU64; 8],
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: StatisticType) -> u64 {
        self.counters[kind.index()].load(Ordering::Relaxed)
    }

    /// All counters keyed by name.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        StatisticType::ALL
            .iter()
            .map(|kind| (kind.as_str(), self.get(*kind)))
            .collect()
    }

    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl StatisticsSink for Statistics {
    fn increment(&self, kind: StatisticType, amount: u64) {
        self.counters[kind.index()].fetch_add(amount, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset() {
        let stats = Statistics::new();
        stats.increment(StatisticType::FieldMappingSuccessCount, 2);
        stats.increment(StatisticType::FieldMappingSuccessCount, 1);
        stats.increment(StatisticType::MappingTime, 15);

        assert_eq!(stats.get(StatisticType::FieldMappingSuccessCount), 3);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot["mapping_time"], 15);
        assert_eq!(snapshot.len(), StatisticType::ALL.len());

        stats.reset();
        assert!(stats.snapshot().values().all(|v| *v == 0));
    }
}
