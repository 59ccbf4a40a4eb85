//! Deterministic total order over task entries, plus weighted tie-breaking.
//!
//! The sort is recomputed from scratch every polling tick against a read-only
//! snapshot. Weighting never overrides priority or timing: it only shuffles
//! contiguous runs of otherwise-equal, opt-in candidates, weighting each by
//! how rarely it has run so no candidate monopolizes a tie.

use std::cmp::Ordering;

use chrono::Duration;
use rand::{Rng, RngCore};

use crate::condition::EvalContext;
use crate::entry::TaskEntry;

/// Precomputed sort keys for one entry, most significant first.
struct SortKey<'a> {
    entry: &'a TaskEntry,
    due: bool,
    /// Next trigger truncated to whole seconds. Sub-second differences are
    /// noise from condition re-arming, not scheduling intent.
    trigger_secs: Option<i64>,
}

impl<'a> SortKey<'a> {
    fn new(entry: &'a TaskEntry, ctx: &EvalContext<'_>) -> Self {
        Self {
            entry,
            due: entry.is_due(ctx),
            trigger_secs: entry.next_trigger().map(|t| t.timestamp()),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        let a = self.entry;
        let b = other.entry;
        b.enabled
            .cmp(&a.enabled)
            .then(b.is_running.cmp(&a.is_running))
            .then(other.due.cmp(&self.due))
            .then(compare_triggers(self.trigger_secs, other.trigger_secs))
            .then(b.priority.cmp(&a.priority))
            .then(a.is_default.cmp(&b.is_default))
            .then(a.allow_random_scheduling.cmp(&b.allow_random_scheduling))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Earlier trigger first; entries with no trigger instant sort after those
/// that have one.
fn compare_triggers(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Produce the scheduling order for a snapshot of entries.
///
/// With `apply_weighting`, contiguous runs of random-eligible entries that
/// share priority, default status, and a trigger bucket within `group_window`
/// are re-ordered by weighted sampling without replacement. Entries that did
/// not opt in keep their stable-sort position.
pub fn order<'a>(
    entries: &'a [TaskEntry],
    ctx: &EvalContext<'_>,
    apply_weighting: bool,
    group_window: Duration,
    rng: &mut dyn RngCore,
) -> Vec<&'a TaskEntry> {
    let mut keys: Vec<SortKey<'a>> = entries.iter().map(|e| SortKey::new(e, ctx)).collect();
    keys.sort_by(SortKey::compare);

    if apply_weighting {
        for (start, len) in weight_groups(&keys, group_window) {
            reorder_by_scarcity(&mut keys[start..start + len], rng);
        }
    }

    keys.into_iter().map(|k| k.entry).collect()
}

/// Convenience wrapper: the plain deterministic order with no weighting.
pub fn sort_entries<'a>(entries: &'a [TaskEntry], ctx: &EvalContext<'_>) -> Vec<&'a TaskEntry> {
    let mut keys: Vec<SortKey<'a>> = entries.iter().map(|e| SortKey::new(e, ctx)).collect();
    keys.sort_by(SortKey::compare);
    keys.into_iter().map(|k| k.entry).collect()
}

/// Trigger bucket for grouping: instants rounded down to the minute. Entries
/// with no trigger share one bucket.
fn minute_bucket(trigger_secs: Option<i64>) -> Option<i64> {
    trigger_secs.map(|s| s - s.rem_euclid(60))
}

/// Find maximal contiguous runs of two or more random-eligible entries that
/// share priority and default status and whose minute buckets all fall within
/// `window` of the run's first bucket. Returns (start, len) pairs.
fn weight_groups(keys: &[SortKey<'_>], window: Duration) -> Vec<(usize, usize)> {
    let window_secs = window.num_seconds().max(0);
    let mut groups = Vec::new();
    let mut i = 0;
    while i < keys.len() {
        let head = &keys[i];
        if !head.entry.allow_random_scheduling {
            i += 1;
            continue;
        }
        let head_bucket = minute_bucket(head.trigger_secs);
        let mut j = i + 1;
        while j < keys.len() {
            let next = &keys[j];
            if !next.entry.allow_random_scheduling
                || next.entry.priority != head.entry.priority
                || next.entry.is_default != head.entry.is_default
                || !buckets_close(head_bucket, minute_bucket(next.trigger_secs), window_secs)
            {
                break;
            }
            j += 1;
        }
        if j - i >= 2 {
            groups.push((i, j - i));
        }
        i = j.max(i + 1);
    }
    groups
}

fn buckets_close(a: Option<i64>, b: Option<i64>, window_secs: i64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() <= window_secs,
        (None, None) => true,
        _ => false,
    }
}

/// Weight of an entry within its group: entries that have run less often get
/// proportionally more weight, with the laggard always weighted at least 2
/// and the group leader at least 1.
fn scarcity_weight(run_count: u64, max_in_group: u64) -> u64 {
    (max_in_group + 1) - run_count + 1
}

/// Re-order a group in place by repeated weighted sampling without
/// replacement.
fn reorder_by_scarcity(group: &mut [SortKey<'_>], rng: &mut dyn RngCore) {
    let max_runs = group
        .iter()
        .map(|k| k.entry.run_count)
        .max()
        .unwrap_or(0);

    for slot in 0..group.len().saturating_sub(1) {
        let remaining = &group[slot..];
        let total: u64 = remaining
            .iter()
            .map(|k| scarcity_weight(k.entry.run_count, max_runs))
            .sum();
        let mut roll = rng.gen_range(0..total);
        let mut picked = 0;
        for (idx, key) in remaining.iter().enumerate() {
            let weight = scarcity_weight(key.entry.run_count, max_runs);
            if roll < weight {
                picked = idx;
                break;
            }
            roll -= weight;
        }
        group.swap(slot, slot + picked);
    }
}
