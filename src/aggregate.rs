//! Corpus-level rollup of detection records

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::FailurePolicy;
use crate::models::{CorpusStatistics, DetectionRecord, GroupStatistics};

#[derive(Debug, Default)]
struct Accumulator {
    images: usize,
    detections: usize,
    compliant: usize,
    failed: usize,
    confidence_sum: f64,
    confidence_count: usize,
}

impl Accumulator {
    fn add(&mut self, record: &DetectionRecord, policy: FailurePolicy) {
        if record.is_failed() {
            self.failed += 1;
            if policy == FailurePolicy::Exclude {
                return;
            }
        }

        self.images += 1;
        self.detections += record.detection_count();
        if record.is_compliant() {
            self.compliant += 1;
            for b in record.boxes() {
                self.confidence_sum += b.confidence as f64;
                self.confidence_count += 1;
            }
        }
    }

    fn compliance_rate(&self) -> f64 {
        if self.images == 0 {
            0.0
        } else {
            self.compliant as f64 / self.images as f64 * 100.0
        }
    }

    fn average_confidence(&self) -> f64 {
        if self.confidence_count == 0 {
            0.0
        } else {
            self.confidence_sum / self.confidence_count as f64
        }
    }

    fn group_statistics(&self) -> GroupStatistics {
        GroupStatistics {
            images: self.images,
            detections: self.detections,
            compliant_images: self.compliant,
            failed_images: self.failed,
            compliance_rate: self.compliance_rate(),
            average_confidence: self.average_confidence(),
        }
    }
}

/// Aggregate with the default policy (failed images count as non-compliant).
pub fn aggregate<'a, I>(records: I) -> CorpusStatistics
where
    I: IntoIterator<Item = &'a DetectionRecord>,
{
    aggregate_with(records, FailurePolicy::CountAsNonCompliant)
}

/// Fold records into corpus statistics in a single pass.
///
/// The average confidence is taken over every individual box, so an image
/// with many low-confidence boxes weighs more than one with a single box.
pub fn aggregate_with<'a, I>(records: I, policy: FailurePolicy) -> CorpusStatistics
where
    I: IntoIterator<Item = &'a DetectionRecord>,
{
    let mut total = Accumulator::default();
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();

    for record in records {
        total.add(record, policy);
        // Excluded failures still register their group so store counts stay stable.
        groups
            .entry(record.image().group.clone())
            .or_default()
            .add(record, policy);
    }

    let stats = CorpusStatistics {
        total_images: total.images,
        total_detections: total.detections,
        total_groups: groups.len(),
        compliant_images: total.compliant,
        non_compliant_images: total.images - total.compliant,
        failed_images: total.failed,
        compliance_rate: total.compliance_rate(),
        average_confidence: total.average_confidence(),
        groups: groups
            .iter()
            .map(|(key, acc)| (key.clone(), acc.group_statistics()))
            .collect(),
    };

    debug!(
        images = stats.total_images,
        detections = stats.total_detections,
        compliance_rate = stats.compliance_rate,
        "aggregated corpus statistics"
    );
    stats
}

/// The `n` most recently modified records, newest first, ties by path.
pub fn most_recent<'a, I>(records: I, n: usize) -> Vec<&'a DetectionRecord>
where
    I: IntoIterator<Item = &'a DetectionRecord>,
{
    let mut sorted: Vec<&DetectionRecord> = records.into_iter().collect();
    sorted.sort_by(|a, b| {
        b.image()
            .modified
            .cmp(&a.image().modified)
            .then_with(|| a.image().path.cmp(&b.image().path))
    });
    sorted.truncate(n);
    sorted
}
