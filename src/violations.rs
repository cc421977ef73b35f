// src/violations.rs
//
// Violation taxonomy, the fixed violation→fine table, and cross-frame
// aggregation.
//
// Fine policy: one fine per UNIQUE violation kind per sequence. Repeated
// detection of the same violation across many frames of one incident must
// not multiply the penalty; per_violation_frequency still records raw
// occurrence counts for reporting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::types::FrameResult;

/// The fixed set of traffic infractions this system can report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    NoHelmet,
    TripleRiding,
    RedLight,
    Overspeeding,
    NoLicense,
    MobileUse,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::NoHelmet => "no_helmet",
            ViolationKind::TripleRiding => "triple_riding",
            ViolationKind::RedLight => "red_light",
            ViolationKind::Overspeeding => "overspeeding",
            ViolationKind::NoLicense => "no_license",
            ViolationKind::MobileUse => "mobile_use",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FineEntry {
    pub fine: u32,
    pub description: &'static str,
}

/// Violation → fine mapping. Built once at process start and passed by
/// reference; read-only afterwards, safe for unsynchronized concurrent reads.
#[derive(Debug, Clone)]
pub struct ViolationTable {
    entries: BTreeMap<ViolationKind, FineEntry>,
}

impl ViolationTable {
    /// The standard fine schedule.
    pub fn standard() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            ViolationKind::NoHelmet,
            FineEntry {
                fine: 500,
                description: "Riding without helmet",
            },
        );
        entries.insert(
            ViolationKind::TripleRiding,
            FineEntry {
                fine: 1000,
                description: "Triple riding violation",
            },
        );
        entries.insert(
            ViolationKind::RedLight,
            FineEntry {
                fine: 1000,
                description: "Red light violation",
            },
        );
        entries.insert(
            ViolationKind::Overspeeding,
            FineEntry {
                fine: 2000,
                description: "Overspeeding violation",
            },
        );
        entries.insert(
            ViolationKind::NoLicense,
            FineEntry {
                fine: 5000,
                description: "Driving without license",
            },
        );
        entries.insert(
            ViolationKind::MobileUse,
            FineEntry {
                fine: 1000,
                description: "Using mobile while driving",
            },
        );
        Self { entries }
    }

    pub fn fine_for(&self, kind: ViolationKind) -> u32 {
        self.entries.get(&kind).map(|e| e.fine).unwrap_or(0)
    }

    pub fn description_for(&self, kind: ViolationKind) -> &'static str {
        self.entries
            .get(&kind)
            .map(|e| e.description)
            .unwrap_or("Traffic violation")
    }

    /// Sum of fines for each kind, counted once per unique kind.
    pub fn total_fine(&self, kinds: &[ViolationKind]) -> u32 {
        let mut seen: Vec<ViolationKind> = Vec::new();
        let mut total = 0;
        for &kind in kinds {
            if !seen.contains(&kind) {
                seen.push(kind);
                total += self.fine_for(kind);
            }
        }
        total
    }
}

/// Violation kinds derivable from a single frame's helmet analysis.
pub fn violations_for_frame(result: &FrameResult) -> Vec<ViolationKind> {
    if result.people_without_helmets > 0 {
        vec![ViolationKind::NoHelmet]
    } else {
        Vec::new()
    }
}

/// Deduplicated, fine-computed summary of one or more analyzed frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceReport {
    pub frame_results: Vec<FrameResult>,
    /// Union of per-frame violation kinds, sorted, deduplicated.
    pub unique_violations: Vec<ViolationKind>,
    /// Raw occurrence counts across all frames (NOT deduplicated).
    pub per_violation_frequency: BTreeMap<ViolationKind, u32>,
    /// One fine per unique kind, never multiplied by frequency.
    pub total_fine: u32,
}

pub struct ViolationAggregator<'a> {
    table: &'a ViolationTable,
}

impl<'a> ViolationAggregator<'a> {
    pub fn new(table: &'a ViolationTable) -> Self {
        Self { table }
    }

    /// Aggregate helmet analysis results across an ordered frame sequence.
    /// A single image is simply a sequence of length 1.
    pub fn aggregate(&self, frames: &[FrameResult]) -> SequenceReport {
        self.aggregate_with_external(frames, &[])
    }

    /// Aggregate with additional per-frame violation kinds supplied by
    /// external collaborators (triple-riding counters, signal cameras, ...).
    /// `external` may be empty or hold one kind-list per frame; the
    /// aggregator is agnostic to where a kind came from; it only
    /// deduplicates and sums fines.
    pub fn aggregate_with_external(
        &self,
        frames: &[FrameResult],
        external: &[Vec<ViolationKind>],
    ) -> SequenceReport {
        let mut frequency: BTreeMap<ViolationKind, u32> = BTreeMap::new();

        for (i, frame) in frames.iter().enumerate() {
            let mut kinds = violations_for_frame(frame);
            if let Some(extra) = external.get(i) {
                kinds.extend(extra.iter().copied());
            }
            for kind in kinds {
                *frequency.entry(kind).or_insert(0) += 1;
            }
        }

        let unique_violations: Vec<ViolationKind> = frequency.keys().copied().collect();
        let total_fine = unique_violations
            .iter()
            .map(|&k| self.table.fine_for(k))
            .sum();

        info!(
            "🧾 Sequence aggregated: {} frame(s), {} unique violation(s), fine ₹{}",
            frames.len(),
            unique_violations.len(),
            total_fine,
        );

        SequenceReport {
            frame_results: frames.to_vec(),
            unique_violations,
            per_violation_frequency: frequency,
            total_fine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame_result(people_without_helmets: usize) -> FrameResult {
        let person_count = people_without_helmets.max(1);
        FrameResult {
            person_count,
            people_with_helmets: person_count - people_without_helmets,
            people_without_helmets,
            has_violation: people_without_helmets > 0,
            aggregate_confidence: 50.0,
            assessments: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_standard_fine_schedule() {
        let table = ViolationTable::standard();
        assert_eq!(table.fine_for(ViolationKind::NoHelmet), 500);
        assert_eq!(table.fine_for(ViolationKind::Overspeeding), 2000);
        assert_eq!(table.fine_for(ViolationKind::NoLicense), 5000);
        assert_eq!(
            table.description_for(ViolationKind::NoHelmet),
            "Riding without helmet"
        );
    }

    #[test]
    fn test_violations_for_frame() {
        assert_eq!(
            violations_for_frame(&frame_result(1)),
            vec![ViolationKind::NoHelmet]
        );
        assert!(violations_for_frame(&frame_result(0)).is_empty());
    }

    #[test]
    fn test_fine_deduplicated_across_frames() {
        // 3 frames all flagging no_helmet: the fine is charged once, not 3x.
        let table = ViolationTable::standard();
        let frames = vec![frame_result(1), frame_result(2), frame_result(1)];
        let report = ViolationAggregator::new(&table).aggregate(&frames);

        assert_eq!(report.unique_violations, vec![ViolationKind::NoHelmet]);
        assert_eq!(report.total_fine, 500);
        assert_eq!(
            report.per_violation_frequency.get(&ViolationKind::NoHelmet),
            Some(&3)
        );
    }

    #[test]
    fn test_frequency_counts_only_flagging_frames() {
        // Frames 1 and 3 flag no_helmet, frame 2 does not.
        let table = ViolationTable::standard();
        let frames = vec![frame_result(1), frame_result(0), frame_result(1)];
        let report = ViolationAggregator::new(&table).aggregate(&frames);

        assert_eq!(report.unique_violations, vec![ViolationKind::NoHelmet]);
        assert_eq!(
            report.per_violation_frequency.get(&ViolationKind::NoHelmet),
            Some(&2)
        );
        assert_eq!(report.total_fine, 500);
    }

    #[test]
    fn test_external_kinds_merge_into_aggregate() {
        let table = ViolationTable::standard();
        let frames = vec![frame_result(1), frame_result(0)];
        let external = vec![vec![ViolationKind::TripleRiding], vec![]];
        let report =
            ViolationAggregator::new(&table).aggregate_with_external(&frames, &external);

        assert_eq!(
            report.unique_violations,
            vec![ViolationKind::NoHelmet, ViolationKind::TripleRiding]
        );
        assert_eq!(report.total_fine, 500 + 1000);
    }

    #[test]
    fn test_empty_sequence_has_no_violations() {
        let table = ViolationTable::standard();
        let report = ViolationAggregator::new(&table).aggregate(&[]);
        assert!(report.unique_violations.is_empty());
        assert_eq!(report.total_fine, 0);
    }

    #[test]
    fn test_total_fine_helper_dedups() {
        let table = ViolationTable::standard();
        let kinds = vec![
            ViolationKind::NoHelmet,
            ViolationKind::NoHelmet,
            ViolationKind::RedLight,
        ];
        assert_eq!(table.total_fine(&kinds), 500 + 1000);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ViolationKind::NoHelmet).unwrap();
        assert_eq!(json, "\"no_helmet\"");
        let json = serde_json::to_string(&ViolationKind::MobileUse).unwrap();
        assert_eq!(json, "\"mobile_use\"");
    }
}
