//! World dynamics.
//!
//! The integrator is a black box to the kernel: given a rover's control
//! vector it advances the pose for one tick and refreshes the land-cover
//! termination flag. The shipped engine attenuates commanded velocity on
//! uphill grades read from the terrain raster.

use crate::simulation::rover::Rover;
use crate::terrain::GridMap;

/// Advances a rover's pose for one tick.
pub trait DynamicsEngine {
    fn integrate(&self, rover: &mut Rover, terrain: &GridMap, landcover: &GridMap, dt: f64);
}

/// Kinematic integrator with uphill slope resistance.
pub struct SlopePhysics {
    /// Land-cover classes a rover cannot traverse.
    impassable_classes: Vec<i64>,
}

impl SlopePhysics {
    pub fn new(impassable_classes: Vec<i64>) -> Self {
        SlopePhysics { impassable_classes }
    }

    /// Velocity attenuation factor for the grade between two positions:
    /// `1 / (1 + grade)` uphill, unchanged downhill or on flat ground.
    fn slope_factor(&self, terrain: &GridMap, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
        let run = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if run == 0.0 {
            return 1.0;
        }
        let (Some(h0), Some(h1)) = (terrain.value_at(x0, y0), terrain.value_at(x1, y1)) else {
            return 1.0;
        };
        let grade = (h1 - h0) / run;
        if grade > 0.0 { 1.0 / (1.0 + grade) } else { 1.0 }
    }
}

impl DynamicsEngine for SlopePhysics {
    fn integrate(&self, rover: &mut Rover, terrain: &GridMap, landcover: &GridMap, dt: f64) {
        let (x, y) = rover.pose();
        let (vx, vy) = rover.velocity();

        let target_x = x + vx * dt;
        let target_y = y + vy * dt;
        let factor = self.slope_factor(terrain, x, y, target_x, target_y);
        let new_x = x + vx * factor * dt;
        let new_y = y + vy * factor * dt;
        rover.set_pose(new_x, new_y);

        // Leaving the mapped area counts as impassable ground
        let impassable = match landcover.value_at(new_x, new_y) {
            Some(class) => self.impassable_classes.contains(&(class.round() as i64)),
            None => true,
        };
        rover.set_landcover_termination(impassable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::rover::Rover;
    use crate::terrain::GridMap;

    fn flat_grid(value: f64) -> GridMap {
        GridMap::from_cells(10, 10, 0.0, 0.0, 100.0, vec![value; 100]).unwrap()
    }

    fn rover_at(x: f64, y: f64, vx: f64, vy: f64) -> Rover {
        let mut rover = Rover::new(1, x, y, vec![(x, 1000.0)]);
        rover.set_control(vx, vy, (vx * vx + vy * vy).sqrt());
        rover
    }

    #[test]
    fn flat_ground_integrates_plain_kinematics() {
        let terrain = flat_grid(10.0);
        let landcover = flat_grid(1.0);
        let engine = SlopePhysics::new(vec![9]);
        let mut rover = rover_at(500.0, 500.0, 1.0, 2.0);
        engine.integrate(&mut rover, &terrain, &landcover, 0.5);
        let (x, y) = rover.pose();
        assert!((x - 500.5).abs() < 1e-12);
        assert!((y - 501.0).abs() < 1e-12);
        assert!(!rover.landcover_termination());
    }

    #[test]
    fn uphill_slows_the_rover_down() {
        // Elevation climbs 100 m per 100 m northing: grade 1 going north
        let mut cells = Vec::with_capacity(100);
        for row in 0..10 {
            // Row 0 is the northern edge
            let elevation = (9 - row) as f64 * 100.0;
            cells.extend(std::iter::repeat(elevation).take(10));
        }
        let terrain = GridMap::from_cells(10, 10, 0.0, 0.0, 100.0, cells).unwrap();
        let landcover = flat_grid(1.0);
        let engine = SlopePhysics::new(vec![]);

        let mut climbing = rover_at(500.0, 150.0, 0.0, 2.0);
        engine.integrate(&mut climbing, &terrain, &landcover, 50.0);
        let (_, y_up) = climbing.pose();

        let mut descending = rover_at(500.0, 850.0, 0.0, -2.0);
        engine.integrate(&mut descending, &terrain, &landcover, 50.0);
        let (_, y_down) = descending.pose();

        assert!(y_up - 150.0 < 100.0, "uphill advance was not attenuated");
        assert!((850.0 - y_down - 100.0).abs() < 1e-9, "downhill advance should be unattenuated");
    }

    #[test]
    fn impassable_class_raises_termination() {
        let terrain = flat_grid(0.0);
        let landcover = flat_grid(9.0);
        let engine = SlopePhysics::new(vec![9]);
        let mut rover = rover_at(500.0, 500.0, 0.0, 1.0);
        engine.integrate(&mut rover, &terrain, &landcover, 0.1);
        assert!(rover.landcover_termination());
    }

    #[test]
    fn leaving_the_map_raises_termination() {
        let terrain = flat_grid(0.0);
        let landcover = flat_grid(1.0);
        let engine = SlopePhysics::new(vec![]);
        let mut rover = rover_at(500.0, 999.0, 0.0, 100.0);
        engine.integrate(&mut rover, &terrain, &landcover, 1.0);
        assert!(rover.landcover_termination());
    }
}
