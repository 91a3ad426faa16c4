// src/tiers/mod.rs
// Tier promotion and consolidation, run on demand (CLI or scheduled).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::Result;
use crate::record::{MemoryRecord, RecordStatus};
use crate::store::{Tier, TierStores};

const WORKING_MAX_AGE: i64 = 24 * 3600;
const SHORT_TERM_PROMOTE_AGE: i64 = 7 * 24 * 3600;
const SHORT_TERM_ARCHIVE_AGE: i64 = 28 * 24 * 3600;
const USEFULNESS_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Default)]
pub struct PromotionReport {
    pub working_to_short_term: usize,
    pub short_term_to_long_term: usize,
    pub short_term_archived: usize,
    pub dry_run: bool,
}

/// Runs the full promotion sweep. Only records whose `createdAt` precedes
/// `sweep_start` are considered, so records written during the sweep itself
/// are left for the next run.
pub async fn promote(stores: &mut TierStores, sweep_start: DateTime<Utc>, dry_run: bool) -> Result<PromotionReport> {
    let mut report = PromotionReport { dry_run, ..Default::default() };

    let working_candidates: Vec<MemoryRecord> = stores
        .tier(Tier::Working)
        .index()
        .active()
        .filter(|r| r.created_at < sweep_start)
        .filter(|r| sweep_start.signed_duration_since(r.created_at) > Duration::seconds(WORKING_MAX_AGE))
        .cloned()
        .collect();

    for record in &working_candidates {
        report.working_to_short_term += 1;
        if !dry_run {
            let mut promoted = record.clone();
            promoted.promoted_from = Some("working".to_string());
            promoted.promoted_at = Some(Utc::now());
            stores.tier_mut(Tier::ShortTerm).append(promoted).await?;
            stores.tier_mut(Tier::Working).soft_delete(&record.id).await?;
        }
    }

    let short_term_candidates: Vec<MemoryRecord> = stores
        .tier(Tier::ShortTerm)
        .index()
        .active()
        .filter(|r| r.created_at < sweep_start)
        .cloned()
        .collect();

    for record in &short_term_candidates {
        let age = sweep_start.signed_duration_since(record.created_at);
        if age > Duration::seconds(SHORT_TERM_PROMOTE_AGE) && record.usefulness() >= USEFULNESS_THRESHOLD {
            report.short_term_to_long_term += 1;
            if !dry_run {
                let mut promoted = record.clone();
                promoted.promoted_from = Some("short-term".to_string());
                promoted.promoted_at = Some(Utc::now());
                stores.tier_mut(Tier::LongTerm).append(promoted).await?;
                stores.tier_mut(Tier::ShortTerm).soft_delete(&record.id).await?;
            }
        } else if age > Duration::seconds(SHORT_TERM_ARCHIVE_AGE) {
            report.short_term_archived += 1;
            if !dry_run {
                stores.tier_mut(Tier::ShortTerm).soft_delete(&record.id).await?;
            }
        }
    }

    if !dry_run {
        stores.tier_mut(Tier::Working).compact(true).await?;
        stores.tier_mut(Tier::ShortTerm).compact(true).await?;
        info!(
            to_short_term = report.working_to_short_term,
            to_long_term = report.short_term_to_long_term,
            archived = report.short_term_archived,
            "promotion sweep complete"
        );
    }

    Ok(report)
}

#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    pub groups_merged: usize,
    pub records_deleted: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub tag: String,
    pub frequency: usize,
}

/// Merges near-duplicates across every fixed tier: a group is keyed by
/// `type:summary[:100]` regardless of which tier each member currently
/// lives in, one keeper survives per group, and the rest are soft-deleted
/// in whichever tier they happen to be in.
pub async fn consolidate(stores: &mut TierStores, dry_run: bool) -> Result<ConsolidationReport> {
    let mut report = ConsolidationReport { dry_run, ..Default::default() };

    let mut groups: HashMap<String, Vec<(Tier, MemoryRecord)>> = HashMap::new();
    for tier in stores.fixed_tiers() {
        for record in stores.tier(tier).index().active() {
            groups.entry(record.duplicate_key()).or_default().push((tier, record.clone()));
        }
    }

    let mut touched_tiers: std::collections::HashSet<Tier> = std::collections::HashSet::new();

    for (_, mut group) in groups {
        if group.len() < 2 {
            continue;
        }
        group.sort_by(|(_, a), (_, b)| {
            b.usefulness()
                .partial_cmp(&a.usefulness())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });

        let (keeper_tier, mut keeper) = group[0].clone();
        let duplicates = &group[1..];

        for (_, dup) in duplicates {
            keeper.tags.extend(dup.tags.iter().cloned());
            keeper.merged_from.push(dup.id.clone());
        }
        keeper.usage_success_rate = (keeper.usage_success_rate + 0.05 * duplicates.len() as f64).min(1.0);

        report.groups_merged += 1;
        report.records_deleted += duplicates.len();

        if !dry_run {
            stores.tier_mut(keeper_tier).update(&keeper.id, serde_json::to_value(&keeper)?).await?;
            touched_tiers.insert(keeper_tier);
            for (dup_tier, dup) in duplicates {
                stores.tier_mut(*dup_tier).soft_delete(&dup.id).await?;
                touched_tiers.insert(*dup_tier);
            }
        }
    }

    if !dry_run {
        for tier in touched_tiers {
            stores.tier_mut(tier).compact(true).await?;
        }
    }

    Ok(report)
}

/// Read-only: counts tags over active records across all tiers; a tag with
/// count >= 3 is reported as a recurring pattern.
pub fn surface_patterns(stores: &TierStores) -> Vec<Pattern> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for tier in stores.fixed_tiers() {
        for record in stores.tier(tier).index().active() {
            if record.status != RecordStatus::Active {
                continue;
            }
            for tag in &record.tags {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
    }
    let mut patterns: Vec<Pattern> =
        counts.into_iter().filter(|(_, count)| *count >= 3).map(|(tag, frequency)| Pattern { tag, frequency }).collect();
    patterns.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    patterns
}
