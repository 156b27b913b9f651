//! Viewport-aware priority assignment for page render jobs
//!
//! Pages are prioritized as follows:
//! 1. Visible pages (intersecting the scroll container)
//! 2. Adjacent pages (within `adjacent_radius` of the current page)
//! 3. Everything else

use crate::priority::JobPriority;

/// Priority calculator for page render jobs
///
/// # Example
///
/// ```
/// use viewer_scheduler::{JobPriority, PriorityCalculator};
///
/// let calculator = PriorityCalculator::new(3);
/// assert_eq!(calculator.calculate_page_priority(3, 0.6), JobPriority::Visible);
/// assert_eq!(calculator.calculate_page_priority(5, 0.0), JobPriority::Adjacent);
/// assert_eq!(calculator.calculate_page_priority(9, 0.0), JobPriority::Background);
/// ```
#[derive(Debug, Clone)]
pub struct PriorityCalculator {
    current_page: u32,
    adjacent_radius: u32,
}

impl PriorityCalculator {
    /// Create a calculator centred on a 1-based `current_page`
    pub fn new(current_page: u32) -> Self {
        Self {
            current_page,
            adjacent_radius: 2,
        }
    }

    /// Set how many pages either side of the current page count as adjacent
    pub fn with_adjacent_radius(mut self, adjacent_radius: u32) -> Self {
        self.adjacent_radius = adjacent_radius;
        self
    }

    /// Priority for painting `page_number` given its intersection ratio
    pub fn calculate_page_priority(&self, page_number: u32, intersection_ratio: f32) -> JobPriority {
        if intersection_ratio > 0.0 {
            return JobPriority::Visible;
        }

        if page_number.abs_diff(self.current_page) <= self.adjacent_radius {
            return JobPriority::Adjacent;
        }

        JobPriority::Background
    }
}
