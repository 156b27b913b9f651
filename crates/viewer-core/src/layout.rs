//! Vertical page column geometry and smooth scrolling.

use std::time::{Duration, Instant};

/// The scroll container: pages stacked top to bottom, each followed by
/// `page_spacing_px` of margin. Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollLayout {
    pub viewport_height_px: f32,
    pub scroll_offset_px: f32,
    pub page_heights_px: Vec<f32>,
    pub page_spacing_px: f32,
}

impl Default for ScrollLayout {
    fn default() -> Self {
        Self {
            viewport_height_px: 0.0,
            scroll_offset_px: 0.0,
            page_heights_px: Vec::new(),
            page_spacing_px: 16.0,
        }
    }
}

impl ScrollLayout {
    pub fn page_count(&self) -> u32 {
        self.page_heights_px.len() as u32
    }

    pub fn set_page_height(&mut self, page_number: u32, height_px: f32) {
        if let Some(slot) = page_number
            .checked_sub(1)
            .and_then(|index| self.page_heights_px.get_mut(index as usize))
        {
            *slot = height_px.max(0.0);
        }
    }

    pub fn page_start_offset(&self, page_number: u32) -> f32 {
        let mut cursor = 0.0;

        for (index, page_height) in self.page_heights_px.iter().enumerate() {
            if index as u32 + 1 >= page_number {
                return cursor;
            }
            cursor += page_height + self.page_spacing_px;
        }

        cursor
    }

    pub fn content_height(&self) -> f32 {
        self.page_heights_px.iter().map(|height| height + self.page_spacing_px).sum()
    }

    pub fn max_scroll(&self) -> f32 {
        (self.content_height() - self.viewport_height_px).max(0.0)
    }

    pub fn clamp_offset(&self, offset: f32) -> f32 {
        if offset.is_finite() {
            offset.clamp(0.0, self.max_scroll())
        } else {
            0.0
        }
    }

    /// Offset that puts the top of `page_number` at the top of the viewport,
    /// as far as the content allows
    pub fn scroll_target(&self, page_number: u32) -> f32 {
        self.clamp_offset(self.page_start_offset(page_number))
    }

    /// Whether all of a painted page lies inside the viewport
    pub fn is_fully_visible(&self, page_number: u32) -> bool {
        let Some(&height) = page_number
            .checked_sub(1)
            .and_then(|index| self.page_heights_px.get(index as usize))
        else {
            return false;
        };

        let top = self.page_start_offset(page_number);
        height > 0.0
            && top >= self.scroll_offset_px
            && top + height <= self.scroll_offset_px + self.viewport_height_px
    }

    /// Fraction of `page_number`'s box inside the viewport
    pub fn intersection_ratio(&self, page_number: u32) -> f32 {
        let Some(&height) = page_number
            .checked_sub(1)
            .and_then(|index| self.page_heights_px.get(index as usize))
        else {
            return 0.0;
        };
        if height <= 0.0 {
            return 0.0;
        }

        let top = self.page_start_offset(page_number);
        let bottom = top + height;
        let view_top = self.scroll_offset_px;
        let view_bottom = view_top + self.viewport_height_px;

        let visible = (bottom.min(view_bottom) - top.max(view_top)).max(0.0);
        (visible / height).clamp(0.0, 1.0)
    }
}

/// An eased scroll from one offset to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnimation {
    from: f32,
    to: f32,
    started: Instant,
    duration: Duration,
}

impl ScrollAnimation {
    pub fn new(from: f32, to: f32, started: Instant, duration: Duration) -> Self {
        Self { from, to, started, duration }
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn offset_at(&self, now: Instant) -> f32 {
        let progress = self.progress(now);
        self.from + (self.to - self.from) * ease_in_out_cubic(progress)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}

fn ease_in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column() -> ScrollLayout {
        ScrollLayout {
            viewport_height_px: 900.0,
            scroll_offset_px: 0.0,
            page_heights_px: vec![1000.0, 1000.0, 1000.0],
            page_spacing_px: 100.0,
        }
    }

    #[test]
    fn page_offsets_include_spacing() {
        let layout = column();

        assert_eq!(layout.page_start_offset(1), 0.0);
        assert_eq!(layout.page_start_offset(3), 2200.0);
        assert_eq!(layout.content_height(), 3300.0);
        assert_eq!(layout.max_scroll(), 2400.0);
    }

    #[test]
    fn intersection_tracks_scroll_window() {
        let mut layout = column();
        assert_eq!(layout.intersection_ratio(1), 0.9);
        assert_eq!(layout.intersection_ratio(2), 0.0);

        layout.scroll_offset_px = 1500.0;
        assert_eq!(layout.intersection_ratio(1), 0.0);
        assert_eq!(layout.intersection_ratio(2), 0.6);
        assert_eq!(layout.intersection_ratio(3), 0.2);
        assert_eq!(layout.intersection_ratio(4), 0.0);
    }

    #[test]
    fn unpainted_pages_never_intersect() {
        let layout = ScrollLayout {
            viewport_height_px: 800.0,
            page_heights_px: vec![0.0, 0.0],
            ..ScrollLayout::default()
        };
        assert_eq!(layout.intersection_ratio(1), 0.0);
        assert_eq!(layout.max_scroll(), 0.0);
    }

    #[test]
    fn scroll_target_is_clamped_to_content() {
        let layout = column();
        assert_eq!(layout.scroll_target(2), 1100.0);
        assert_eq!(layout.scroll_target(3), 2200.0);
        assert_eq!(layout.clamp_offset(-5.0), 0.0);
        assert_eq!(layout.clamp_offset(9000.0), 2400.0);
    }

    #[test]
    fn short_last_page_target_stops_at_max_scroll() {
        let layout = ScrollLayout { page_heights_px: vec![1000.0, 1000.0, 400.0], ..column() };

        assert_eq!(layout.max_scroll(), 1800.0);
        assert_eq!(layout.page_start_offset(3), 2200.0);
        assert_eq!(layout.scroll_target(3), 1800.0);

        let at_bottom = ScrollLayout { scroll_offset_px: 1800.0, ..layout };
        assert!(at_bottom.is_fully_visible(3));
        assert!(!at_bottom.is_fully_visible(2));
        assert!(!at_bottom.is_fully_visible(4));
    }

    #[test]
    fn animation_eases_to_target() {
        let start = Instant::now();
        let animation = ScrollAnimation::new(0.0, 1000.0, start, Duration::from_millis(300));

        assert_eq!(animation.offset_at(start), 0.0);
        assert_eq!(animation.offset_at(start + Duration::from_millis(150)), 500.0);
        assert!(!animation.is_finished(start + Duration::from_millis(299)));
        assert_eq!(animation.offset_at(start + Duration::from_millis(300)), 1000.0);
        assert!(animation.is_finished(start + Duration::from_secs(1)));
    }

    #[test]
    fn zero_duration_jumps() {
        let start = Instant::now();
        let animation = ScrollAnimation::new(40.0, 10.0, start, Duration::ZERO);
        assert_eq!(animation.offset_at(start), 10.0);
        assert!(animation.is_finished(start));
    }
}
