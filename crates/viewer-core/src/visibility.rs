//! Current-page tracking from intersection reports.
//!
//! Pages report how much of them intersects the scroll container. A report
//! that crosses one of the configured thresholds (or is the first for that
//! page) restarts a debounce timer; when the timer expires the page with the
//! largest intersection ratio becomes current. Ties go to the lower page
//! number, and when nothing intersects the previous current page is kept.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Observation {
    ratio: f32,
    bucket: usize,
}

#[derive(Debug)]
pub struct VisibilityTracker {
    thresholds: Vec<f32>,
    debounce: Duration,
    observed: BTreeMap<u32, Option<Observation>>,
    deadline: Option<Instant>,
    current: u32,
}

impl VisibilityTracker {
    pub fn new(mut thresholds: Vec<f32>, debounce: Duration) -> Self {
        thresholds.retain(|t| t.is_finite());
        thresholds.sort_by(f32::total_cmp);
        thresholds.dedup();

        Self {
            thresholds,
            debounce,
            observed: BTreeMap::new(),
            deadline: None,
            current: 1,
        }
    }

    /// Replace the observed set with `pages`; earlier reports are forgotten.
    pub fn observe<I>(&mut self, pages: I)
    where
        I: IntoIterator<Item = u32>,
    {
        self.observed = pages.into_iter().map(|page| (page, None)).collect();
        self.deadline = None;
    }

    /// Stop observing everything and drop any pending notification.
    pub fn unobserve_all(&mut self) {
        self.observed.clear();
        self.deadline = None;
    }

    /// Forget everything and go back to page 1.
    pub fn reset(&mut self) {
        self.unobserve_all();
        self.current = 1;
    }

    pub fn is_observing(&self, page_number: u32) -> bool {
        self.observed.contains_key(&page_number)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Record `page_number`'s intersection ratio at `now`.
    ///
    /// Returns `true` if the report counts as a notification and restarted
    /// the debounce timer. Reports for pages not being observed are ignored.
    pub fn report(&mut self, page_number: u32, ratio: f32, now: Instant) -> bool {
        let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
        let bucket = self.bucket(ratio);

        let Some(slot) = self.observed.get_mut(&page_number) else {
            return false;
        };

        let notify = slot.map_or(true, |previous| previous.bucket != bucket);
        *slot = Some(Observation { ratio, bucket });

        if notify {
            self.deadline = Some(now + self.debounce);
        }
        notify
    }

    /// Settle the current page if the debounce timer has expired by `now`.
    ///
    /// Returns the new current page when it changed.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;

        let page = self.most_visible()?;
        if page == self.current {
            return None;
        }

        log::debug!("current page {} -> {page}", self.current);
        self.current = page;
        Some(page)
    }

    /// Make `page_number` current right away and drop any pending notification.
    ///
    /// Used when a navigation lands on a page that ties with its neighbours.
    /// Returns the new current page when it changed; unobserved pages are ignored.
    pub fn settle_on(&mut self, page_number: u32) -> Option<u32> {
        if !self.is_observing(page_number) {
            return None;
        }
        self.deadline = None;
        if page_number == self.current {
            return None;
        }

        log::debug!("current page {} -> {page_number} (navigation)", self.current);
        self.current = page_number;
        Some(page_number)
    }

    /// Observed page with the largest intersection ratio, lowest page on ties
    pub fn most_visible(&self) -> Option<u32> {
        let mut best: Option<(u32, f32)> = None;

        for (&page, observation) in &self.observed {
            let Some(observation) = observation else { continue };
            if observation.ratio <= 0.0 {
                continue;
            }
            if best.map_or(true, |(_, ratio)| observation.ratio > ratio) {
                best = Some((page, observation.ratio));
            }
        }

        best.map(|(page, _)| page)
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Index of the threshold band `ratio` falls into; 0 means not intersecting.
    fn bucket(&self, ratio: f32) -> usize {
        if ratio <= 0.0 {
            return 0;
        }
        1 + self.thresholds.iter().filter(|&&t| t > 0.0 && ratio >= t).count()
    }
}
