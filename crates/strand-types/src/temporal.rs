//! Instants and as-of lookup over a `valid_since`-ordered timeline.

use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};

use crate::entry::StorageEntry;
use crate::error::EntryError;

/// Current UTC instant at the precision every backend can persist (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// An instant later than any version will ever be committed at.
///
/// Looking a name up as of this sentinel yields its open entry, if any.
pub fn far_future() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// The `valid_since` for a version committed at `now` after `previous`.
///
/// Strictly after the previous version even when two commits land in the
/// same microsecond or the wall clock steps backwards.
pub fn next_valid_since(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}

/// Position of the last item whose `since` key is at or before `as_of`.
///
/// `items` must be sorted ascending by `since`. An exact hit returns that
/// index; otherwise the insertion point minus one, or `None` when the
/// insertion point is 0 (everything starts after `as_of`).
pub fn locate<T>(
    items: &[T],
    as_of: DateTime<Utc>,
    since: impl Fn(&T) -> DateTime<Utc>,
) -> Option<usize> {
    match items.binary_search_by(|item| since(item).cmp(&as_of)) {
        Ok(index) => Some(index),
        Err(0) => None,
        Err(insertion) => Some(insertion - 1),
    }
}

/// The entry valid at `as_of` in an ascending timeline, if any.
///
/// The predecessor found by [`locate`] only qualifies if it had not yet
/// been closed as of `as_of`.
pub fn entry_at(entries: &[StorageEntry], as_of: DateTime<Utc>) -> Option<&StorageEntry> {
    locate(entries, as_of, StorageEntry::valid_since)
        .map(|index| &entries[index])
        .filter(|entry| entry.is_valid_at(as_of))
}

/// Check that an ascending timeline for one name is well formed.
///
/// Sorted by `valid_since`, intervals do not overlap, and only the last
/// entry may be open.
pub fn verify_timeline(entries: &[StorageEntry]) -> Result<(), EntryError> {
    for pair in entries.windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        let overlap = match earlier.valid_until() {
            None => true,
            Some(until) => earlier.valid_since() >= later.valid_since() || until > later.valid_since(),
        };
        if overlap {
            return Err(EntryError::Overlap {
                name: later.name().to_string(),
                at: later.valid_since(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentDigest, PendingEntry};
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    fn entry(since: DateTime<Utc>, until: Option<DateTime<Utc>>) -> StorageEntry {
        let mut entry = PendingEntry::new("doc", 1, ContentDigest::new(vec![0; 32]), since).into_entry();
        if let Some(until) = until {
            entry.close(until).unwrap();
        }
        entry
    }

    fn three_versions() -> Vec<StorageEntry> {
        vec![
            entry(at(10, 0), Some(at(11, 0))),
            entry(at(11, 0), Some(at(12, 0))),
            entry(at(12, 0), None),
        ]
    }

    // -----------------------------------------------------------------------
    // locate
    // -----------------------------------------------------------------------

    #[test]
    fn locate_exact_hit() {
        let entries = three_versions();
        assert_eq!(locate(&entries, at(11, 0), StorageEntry::valid_since), Some(1));
    }

    #[test]
    fn locate_between_returns_predecessor() {
        let entries = three_versions();
        assert_eq!(locate(&entries, at(11, 30), StorageEntry::valid_since), Some(1));
    }

    #[test]
    fn locate_before_everything_is_none() {
        let entries = three_versions();
        assert_eq!(locate(&entries, at(9, 0), StorageEntry::valid_since), None);
    }

    #[test]
    fn locate_empty_is_none() {
        let entries: Vec<StorageEntry> = Vec::new();
        assert_eq!(locate(&entries, at(9, 0), StorageEntry::valid_since), None);
    }

    // -----------------------------------------------------------------------
    // entry_at
    // -----------------------------------------------------------------------

    #[test]
    fn entry_at_picks_containing_interval() {
        let entries = three_versions();
        assert_eq!(entry_at(&entries, at(11, 30)).unwrap().valid_since(), at(11, 0));
        assert_eq!(entry_at(&entries, at(10, 0)).unwrap().valid_since(), at(10, 0));
        assert_eq!(entry_at(&entries, at(13, 0)).unwrap().valid_since(), at(12, 0));
        assert!(entry_at(&entries, at(9, 0)).is_none());
    }

    #[test]
    fn entry_at_skips_predecessor_closed_before_as_of() {
        // A gap: the only version was closed at 11:00 with nothing after it.
        let entries = vec![entry(at(10, 0), Some(at(11, 0)))];
        assert!(entry_at(&entries, at(10, 59)).is_some());
        assert!(entry_at(&entries, at(11, 0)).is_none());
        assert!(entry_at(&entries, at(12, 0)).is_none());
    }

    #[test]
    fn far_future_finds_open_entry() {
        let entries = three_versions();
        let open = entry_at(&entries, far_future()).unwrap();
        assert!(open.is_open());
    }

    // -----------------------------------------------------------------------
    // next_valid_since
    // -----------------------------------------------------------------------

    #[test]
    fn next_valid_since_uses_now_when_ahead() {
        assert_eq!(next_valid_since(Some(at(10, 0)), at(11, 0)), at(11, 0));
        assert_eq!(next_valid_since(None, at(11, 0)), at(11, 0));
    }

    #[test]
    fn next_valid_since_bumps_on_tie_or_skew() {
        let bumped = at(10, 0) + Duration::microseconds(1);
        assert_eq!(next_valid_since(Some(at(10, 0)), at(10, 0)), bumped);
        assert_eq!(next_valid_since(Some(at(10, 0)), at(9, 0)), bumped);
    }

    #[test]
    fn now_has_microsecond_precision() {
        let instant = now();
        assert_eq!(instant.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn far_future_is_after_now() {
        assert!(far_future() > now());
    }

    // -----------------------------------------------------------------------
    // verify_timeline
    // -----------------------------------------------------------------------

    #[test]
    fn verify_accepts_well_formed_timeline() {
        assert!(verify_timeline(&three_versions()).is_ok());
        assert!(verify_timeline(&[]).is_ok());
    }

    #[test]
    fn verify_rejects_two_open_entries() {
        let entries = vec![entry(at(10, 0), None), entry(at(11, 0), None)];
        assert!(matches!(verify_timeline(&entries), Err(EntryError::Overlap { .. })));
    }

    #[test]
    fn verify_rejects_overlapping_intervals() {
        let entries = vec![entry(at(10, 0), Some(at(11, 30))), entry(at(11, 0), None)];
        assert!(verify_timeline(&entries).is_err());
    }

    #[test]
    fn verify_rejects_unsorted_timeline() {
        let entries = vec![entry(at(11, 0), Some(at(11, 0))), entry(at(10, 0), None)];
        assert!(verify_timeline(&entries).is_err());
    }

    // -----------------------------------------------------------------------
    // Property: binary search agrees with a linear scan
    // -----------------------------------------------------------------------

    proptest::proptest! {
        #[test]
        fn entry_at_matches_linear_scan(
            gaps in proptest::collection::vec(1i64..10_000, 1..20),
            probe in 0i64..250_000,
        ) {
            let base = at(0, 0);
            let mut since = base;
            let mut entries = Vec::new();
            for gap in &gaps {
                since += Duration::seconds(*gap);
                entries.push(entry(since, None));
            }
            for i in 0..entries.len() - 1 {
                let next = entries[i + 1].valid_since();
                entries[i].close(next).unwrap();
            }
            proptest::prop_assert!(verify_timeline(&entries).is_ok());

            let as_of = base + Duration::seconds(probe);
            let expected = entries.iter().find(|e| e.is_valid_at(as_of));
            proptest::prop_assert_eq!(entry_at(&entries, as_of), expected);
        }
    }
}
