use std::collections::VecDeque;

use crate::models::Coordinates;

/// Bounded history of the positions a single session has reported.
///
/// Kept per session for diagnostics only; nothing reads it across sessions.
#[derive(Debug, Clone)]
pub struct LocationTrail {
    points: VecDeque<Coordinates>,
    capacity: usize,
}

impl LocationTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Record a position, evicting the oldest once full
    pub fn push(&mut self, point: Coordinates) {
        if self.capacity == 0 {
            return;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn last(&self) -> Option<Coordinates> {
        self.points.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coordinates> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64) -> Coordinates {
        Coordinates { x, y }
    }

    #[test]
    fn test_trail_evicts_oldest() {
        let mut trail = LocationTrail::new(2);
        trail.push(at(1.0, 1.0));
        trail.push(at(2.0, 2.0));
        trail.push(at(3.0, 3.0));

        let points: Vec<_> = trail.iter().copied().collect();
        assert_eq!(points, vec![at(2.0, 2.0), at(3.0, 3.0)]);
        assert_eq!(trail.last(), Some(at(3.0, 3.0)));
    }

    #[test]
    fn test_zero_capacity_disables_trail() {
        let mut trail = LocationTrail::new(0);
        trail.push(at(1.0, 1.0));
        assert!(trail.is_empty());
    }
}
