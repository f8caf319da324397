use opencv::core::Point;
use std::collections::VecDeque;

const PREALLOCATED_POINTS: usize = 256;

/// Bounded, newest-first history of ball centers.
///
/// `None` entries mark frames where no ball was found; they break the drawn
/// trail instead of being skipped over.
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    points: VecDeque<Option<Point>>,
    capacity: usize,
}

impl TrailBuffer {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity.min(PREALLOCATED_POINTS)),
            capacity,
        }
    }

    pub fn push(&mut self, point: Option<Point>) {
        if self.points.len() == self.capacity {
            self.points.pop_back();
        }
        self.points.push_front(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn front(&self) -> Option<Option<Point>> {
        self.points.front().copied()
    }

    pub fn get(&self, index: usize) -> Option<Option<Point>> {
        self.points.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<Point>> + '_ {
        self.points.iter().copied()
    }

    /// Adjacent pairs `(index, newer, older)` where both points are present.
    /// `index` is the position of the older point.
    pub fn segments(&self) -> impl Iterator<Item = (usize, Point, Point)> + '_ {
        (1..self.points.len()).filter_map(move |i| match (self.points[i - 1], self.points[i]) {
            (Some(newer), Some(older)) => Some((i, newer, older)),
            _ => None,
        })
    }

    pub fn thickness(&self, index: usize) -> i32 {
        trail_thickness(self.capacity, index)
    }
}

/// Line width for the segment ending at `index`: `floor(sqrt(C / (i + 1)) * 2.5)`.
pub fn trail_thickness(capacity: usize, index: usize) -> i32 {
    ((capacity as f64 / (index as f64 + 1.0)).sqrt() * 2.5).floor() as i32
}
