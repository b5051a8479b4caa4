//! Inclusive block ranges and the small algebra the query builder needs:
//! clipping a list of per-range entries by an outer bound, and merging
//! overlapping entries into disjoint sorted segments.

use alloy::primitives::BlockNumber;
use serde::{Deserialize, Serialize};

/// An inclusive block-number interval.
///
/// `to == None` means the range is unbounded above; the default range
/// covers the whole chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: BlockNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<BlockNumber>,
}

impl BlockRange {
    /// Creates a bounded range.
    ///
    /// # Panics
    ///
    /// Panics if `from > to`.
    #[must_use]
    pub const fn new(from: BlockNumber, to: BlockNumber) -> Self {
        assert!(from <= to, "range start must not exceed range end");
        Self { from, to: Some(to) }
    }

    /// Creates a range unbounded above.
    #[must_use]
    pub const fn open(from: BlockNumber) -> Self {
        Self { from, to: None }
    }

    /// Whether `number` lies within this range.
    #[must_use]
    pub fn contains(&self, number: BlockNumber) -> bool {
        number >= self.from && self.to.is_none_or(|to| number <= to)
    }

    /// The intersection of two ranges, or `None` if they do not overlap.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let from = self.from.max(other.from);
        let to = match (self.to, other.to) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        };
        match to {
            Some(to) if from > to => None,
            to => Some(Self { from, to }),
        }
    }
}

/// Restricts `entries` to the part overlapping `outer`, intersecting each
/// range with the outer bound. Entries that fall entirely outside are
/// dropped; ordering is preserved.
pub(crate) fn clip_ranges<T: Clone>(
    entries: &[(BlockRange, T)],
    outer: BlockRange,
) -> Vec<(BlockRange, T)> {
    entries
        .iter()
        .filter_map(|(range, payload)| {
            range.intersect(&outer).map(|clipped| (clipped, payload.clone()))
        })
        .collect()
}

/// Merges an unordered list of `(range, payload)` entries into an ordered
/// list of disjoint segments covering the union of the inputs.
///
/// The output is segmented at every input endpoint; each segment's payload
/// is the fold of all input payloads whose range contains the segment,
/// applied in input order. Adjacent segments with equal payloads are
/// coalesced.
pub(crate) fn merge_range_requests<T, F>(
    entries: &[(BlockRange, T)],
    merge: F,
) -> Vec<(BlockRange, T)>
where
    T: Clone + PartialEq,
    F: Fn(T, &T) -> T,
{
    let mut points: Vec<BlockNumber> = Vec::new();
    let mut open_ended = false;
    for (range, _) in entries {
        points.push(range.from);
        match range.to {
            // an entry ending at u64::MAX has no segment after it
            Some(to) if to < BlockNumber::MAX => points.push(to + 1),
            Some(_) => {}
            None => open_ended = true,
        }
    }
    points.sort_unstable();
    points.dedup();

    let mut segments: Vec<(BlockRange, T)> = Vec::new();
    for (i, &start) in points.iter().enumerate() {
        let segment = match points.get(i + 1) {
            Some(&next) => BlockRange::new(start, next - 1),
            None if open_ended => BlockRange::open(start),
            None => BlockRange::new(start, BlockNumber::MAX),
        };

        let mut payload: Option<T> = None;
        for (range, entry) in entries {
            if range.contains(segment.from) {
                payload = Some(match payload {
                    None => entry.clone(),
                    Some(acc) => merge(acc, entry),
                });
            }
        }

        let Some(payload) = payload else { continue };

        // coalesce with the previous segment when contiguous and equal
        if let Some((last_range, last_payload)) = segments.last_mut()
            && *last_payload == payload
            && last_range.to == Some(segment.from - 1)
        {
            last_range.to = segment.to;
            continue;
        }
        segments.push((segment, payload));
    }

    segments
}
