/// The struct allows defining the proximity constraints for detections compared across frames.
///
/// The constraint defines how far the detections may be from each other for a certain frame gap
/// to still become a candidate pair. The distance is measured in Nx(R_1+R_2), where
/// * `N` is the float number that defines the expected maximal distance;
/// * `R_1` - radius of the circle surrounding the first bounding box;
/// * `R_2` - radius of the circle surrounding the second bounding box.
///
/// The constraint with the smallest frame gap that is not lower than the pair's gap applies.
/// Gaps beyond the last constraint are not limited.
///
#[derive(Default, Debug, Clone)]
pub struct SpatioTemporalConstraints {
    constraints: Vec<(u32, f32)>,
}

impl SpatioTemporalConstraints {
    /// Allows adding new constraints to the constraints engine
    ///
    /// # Parameters
    /// * `constraints` - slice of tuples (frame_delta, max_allowed_distance)
    ///
    pub fn constraints(mut self, constraints: &[(u32, f32)]) -> Self {
        self.add_constraints(constraints.to_vec());
        self
    }
}

impl SpatioTemporalConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn add_constraints(&mut self, constraints: Vec<(u32, f32)>) {
        for (delta, max_distance) in constraints {
            assert!(
                max_distance > 0.0,
                "The distance is expected to be a positive float"
            );
            self.constraints.push((delta, max_distance));
        }
        self.constraints.sort_by(|(e1, _), (e2, _)| e1.cmp(e2));
        self.constraints.dedup_by(|(e1, _), (e2, _)| *e1 == *e2);
    }

    pub fn validate(&self, frame_delta: u32, dist: f32) -> bool {
        let constraint = self.constraints.iter().find(|(d, _)| *d >= frame_delta);

        match constraint {
            None => true,
            Some((_, max_dist)) => dist <= *max_dist,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::lookup::spatio_temporal_constraints::SpatioTemporalConstraints;

    #[test]
    fn test() {
        let mut spc = SpatioTemporalConstraints::default();
        spc.add_constraints(vec![(1, 0.5), (2, 1.0), (3, 2.0), (4, 4.0)]);
        spc.add_constraints(vec![(3, 2.5), (4, 4.5), (7, 8.5)]);

        assert!(spc.validate(0, 0.4));
        assert!(spc.validate(1, 0.4));
        assert!(!spc.validate(1, 0.6));

        assert!(spc.validate(6, 7.0));
        assert!(!spc.validate(6, 9.0));

        assert!(spc.validate(7, 8.4));
        assert!(spc.validate(7, 8.5));
        assert!(!spc.validate(7, 8.7));

        assert!(spc.validate(9, 8.7));
        assert!(spc.validate(9, 100.0));
    }

    #[test]
    fn empty_accepts_everything() {
        let spc = SpatioTemporalConstraints::new();
        assert!(spc.is_empty());
        assert!(spc.validate(1, 1000.0));
    }
}
