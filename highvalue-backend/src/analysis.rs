// Analysis aggregator: runs the segment queries on one connection and
// derives the summary and optional event effects.

use crate::error::AnalyticsError;
use crate::models::{
    AnalysisResult, Bucket, EventEffect, Pagination, SegmentKind, SegmentSummary,
    UserActivityRecord,
};
use crate::segmentation::{EventEffectQuery, SegmentQuery, SegmentationCriteria};
use crate::store::ActivityConnection;
use tracing::info;

/// (label, min, max) for net bet buckets
const NET_BET_BUCKETS: &[(&str, i64, Option<i64>)] = &[
    ("0-49999", 0, Some(49_999)),
    ("50000-99999", 50_000, Some(99_999)),
    ("100000-499999", 100_000, Some(499_999)),
    ("500000-999999", 500_000, Some(999_999)),
    ("1000000+", 1_000_000, None),
];

const INACTIVITY_BUCKETS: &[(&str, i64, Option<i64>)] = &[
    ("0-6", 0, Some(6)),
    ("7-29", 7, Some(29)),
    ("30-89", 30, Some(89)),
    ("90-364", 90, Some(364)),
    ("365+", 365, None),
];

fn empty_buckets(ranges: &[(&str, i64, Option<i64>)]) -> Vec<Bucket> {
    ranges.iter()
        .map(|(label, min, max)| Bucket {
            label: label.to_string(),
            min: *min,
            max: *max,
            count: 0,
        })
        .collect()
}

fn tally(buckets: &mut [Bucket], value: i64) {
    // Negative net bet (refunds) lands in the lowest bucket.
    let value = value.max(0);
    if let Some(bucket) = buckets.iter_mut().find(|b| b.contains(value)) {
        bucket.count += 1;
    }
}

/// Single pass over the segment.
pub fn summarize(segment: &[UserActivityRecord]) -> SegmentSummary {
    let mut net_bet_distribution = empty_buckets(NET_BET_BUCKETS);
    let mut inactivity_distribution = empty_buckets(INACTIVITY_BUCKETS);
    let mut net_bet_total = 0i64;
    let mut active_count = 0u64;
    let mut dormant_count = 0u64;

    for record in segment {
        net_bet_total += record.net_bet;
        match record.segment {
            SegmentKind::Active => active_count += 1,
            SegmentKind::Dormant => dormant_count += 1,
        }
        tally(&mut net_bet_distribution, record.net_bet);
        tally(&mut inactivity_distribution, record.inactive_days);
    }

    let count = segment.len() as u64;
    let average_net_bet = if count == 0 {
        0.0
    } else {
        ((net_bet_total as f64 / count as f64) * 100.0).round() / 100.0
    };

    SegmentSummary {
        count,
        net_bet_total,
        average_net_bet,
        active_count,
        dormant_count,
        net_bet_distribution,
        inactivity_distribution,
    }
}

/// Split `limit` rows across segments round-robin, in selection order, never
/// giving a segment more rows than it has.
fn share_limit(limit: usize, available: &[usize]) -> Vec<usize> {
    let mut shares = vec![0; available.len()];
    let mut remaining = limit;
    while remaining > 0 {
        let mut granted = false;
        for (share, have) in shares.iter_mut().zip(available) {
            if remaining == 0 {
                break;
            }
            if *share < *have {
                *share += 1;
                remaining -= 1;
                granted = true;
            }
        }
        if !granted {
            break;
        }
    }
    shares
}

/// Run every selected segment, merge, summarize and optionally attach
/// event effects. `limit` caps the merged segment. Queries run sequentially
/// on `conn`; the caller owns its release.
pub async fn analyze(
    conn: &mut dyn ActivityConnection,
    criteria: &SegmentationCriteria,
) -> Result<AnalysisResult, AnalyticsError> {
    let mut blocks = Vec::new();
    for kind in criteria.selection.kinds() {
        let query = SegmentQuery::new(*kind, criteria);
        let records = conn.fetch_segment(&query).await?;
        info!(
            "{} segment: {} users (minNetBet={}, threshold={}d)",
            kind.as_str(),
            records.len(),
            criteria.min_net_bet,
            criteria.threshold_days
        );
        blocks.push(records);
    }

    let available: Vec<usize> = blocks.iter().map(Vec::len).collect();
    let shares = share_limit(criteria.limit as usize, &available);
    let mut segment = Vec::new();
    for (mut records, share) in blocks.into_iter().zip(shares) {
        records.truncate(share);
        segment.extend(records);
    }

    let event_effects = if criteria.show_details {
        Some(event_effects(conn, criteria, &segment).await?)
    } else {
        None
    };

    let summary = summarize(&segment);

    Ok(AnalysisResult {
        reference_date: criteria.reference_date,
        threshold_days: criteria.threshold_days,
        min_net_bet: criteria.min_net_bet,
        segment,
        summary,
        event_effects,
    })
}

/// One page of a single segment plus its pagination block.
pub async fn analyze_page(
    conn: &mut dyn ActivityConnection,
    kind: SegmentKind,
    criteria: &SegmentationCriteria,
) -> Result<(AnalysisResult, Pagination), AnalyticsError> {
    let query = SegmentQuery::new(kind, criteria);
    let total = conn.count_segment(&query).await?;
    let segment = conn.fetch_segment(&query).await?;

    info!(
        "{} segment page {}: {} of {} users",
        kind.as_str(),
        criteria.page,
        segment.len(),
        total
    );

    let event_effects = if criteria.show_details {
        Some(event_effects(conn, criteria, &segment).await?)
    } else {
        None
    };

    let summary = summarize(&segment);
    let result = AnalysisResult {
        reference_date: criteria.reference_date,
        threshold_days: criteria.threshold_days,
        min_net_bet: criteria.min_net_bet,
        segment,
        summary,
        event_effects,
    };

    Ok((result, Pagination::new(criteria.page, criteria.limit, total)))
}

async fn event_effects(
    conn: &mut dyn ActivityConnection,
    criteria: &SegmentationCriteria,
    segment: &[UserActivityRecord],
) -> Result<Vec<EventEffect>, AnalyticsError> {
    if segment.is_empty() {
        return Ok(Vec::new());
    }

    let user_ids = segment.iter().map(|r| r.user_id.clone()).collect();
    let query = EventEffectQuery::new(criteria, user_ids);
    let rows = conn.fetch_event_effects(&query).await?;

    Ok(rows.into_iter().map(EventEffect::from).collect())
}
