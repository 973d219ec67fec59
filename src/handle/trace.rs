//! Live-record accounting
//!
//! Every record created through [`Handle`](super::Handle) is counted here
//! for the lifetime of the current thread, and labelled records are
//! additionally tracked per label. Purely diagnostic: leak hunts and
//! tests read the counters, nothing in the kernel depends on them.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

thread_local! {
    static LIVE: RefCell<LiveRecords> = RefCell::new(LiveRecords::default());
}

#[derive(Default)]
struct LiveRecords {
    total: usize,
    by_label: FxHashMap<String, usize>,
}

pub(crate) fn record_created(label: Option<&str>) {
    LIVE.with(|live| {
        let mut live = live.borrow_mut();
        live.total += 1;
        if let Some(label) = label {
            *live.by_label.entry(label.to_owned()).or_insert(0) += 1;
            log::trace!("record `{label}` created");
        }
    });
}

pub(crate) fn record_destroyed(label: Option<&str>) {
    LIVE.with(|live| {
        let mut live = live.borrow_mut();
        live.total = live.total.saturating_sub(1);
        if let Some(label) = label {
            if let Some(count) = live.by_label.get_mut(label) {
                *count -= 1;
                if *count == 0 {
                    live.by_label.remove(label);
                }
            }
            log::trace!("record `{label}` decayed");
        }
    });
}

/// Number of records currently alive on this thread.
#[must_use]
pub fn live_records() -> usize {
    LIVE.with(|live| live.borrow().total)
}

/// Number of live records created under `label`.
#[must_use]
pub fn live_with_label(label: &str) -> usize {
    LIVE.with(|live| live.borrow().by_label.get(label).copied().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use crate::handle::Handle;

    use super::*;

    #[test]
    fn test_total_follows_record_lifetime() {
        let before = live_records();

        let a = Handle::new(1_u32);
        let b = Handle::new(2_u32);
        assert_eq!(live_records(), before + 2);

        // clones share a record and must not be counted again
        let c = a.clone();
        assert_eq!(live_records(), before + 2);

        drop(a);
        drop(c);
        assert_eq!(live_records(), before + 1);
        drop(b);
        assert_eq!(live_records(), before);
    }

    #[test]
    fn test_labelled_records_tracked_per_label() {
        assert_eq!(live_with_label("trace-mesh"), 0);

        let a = Handle::with_label("trace-mesh", vec![1.0_f32]);
        let b = Handle::with_label("trace-mesh", vec![2.0_f32]);
        let other = Handle::with_label("trace-texture", 0_u8);
        assert_eq!(live_with_label("trace-mesh"), 2);
        assert_eq!(live_with_label("trace-texture"), 1);

        drop(a);
        assert_eq!(live_with_label("trace-mesh"), 1);
        drop(b);
        drop(other);
        assert_eq!(live_with_label("trace-mesh"), 0);
        assert_eq!(live_with_label("trace-texture"), 0);
    }
}
