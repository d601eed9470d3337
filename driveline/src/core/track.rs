use anyhow::{bail, Result};
use glam::DVec3;
use serde::Deserialize;
use std::f64::consts::TAU;

/// * `name` - Track name
/// * `segment_count` - Number of waypoints on the center line
/// * `inner_radius` - (m) Radius of the inner track edge
/// * `outer_radius` - (m) Radius of the outer track edge
/// * `z_compression` - Squash factor applied to the z extent of the oval (1.0 = circle)
/// * `start_line_frac` - Position of the start/finish line as a fraction of a lap
/// * `look_ahead_count` - Number of waypoints the steering target lies ahead of the closest one
/// * `hysteresis_margin` - (m) Width of the re-arm band below the start line used by lap detection
#[derive(Debug, Deserialize, Clone)]
pub struct TrackPars {
    pub name: String,
    pub segment_count: usize,
    pub inner_radius: f64,
    pub outer_radius: f64,
    #[serde(default = "default_z_compression")]
    pub z_compression: f64,
    #[serde(default = "default_start_line_frac")]
    pub start_line_frac: f64,
    #[serde(default = "default_look_ahead_count")]
    pub look_ahead_count: usize,
    #[serde(default = "default_hysteresis_margin")]
    pub hysteresis_margin: f64,
}

fn default_z_compression() -> f64 {
    1.0
}

fn default_start_line_frac() -> f64 {
    0.25
}

fn default_look_ahead_count() -> usize {
    4
}

fn default_hysteresis_margin() -> f64 {
    1.0
}

#[derive(Debug)]
pub struct Track {
    pub name: String,
    pub segment_count: usize,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub center_radius: f64,
    pub track_width: f64,
    pub z_compression: f64,
    pub look_ahead_count: usize,
    pub hysteresis_margin: f64,
    pub circumference: f64,
    pub start_line_s: f64,
    waypoints: Vec<DVec3>,
    cum_dists: Vec<f64>,
}

impl Track {
    pub fn new(track_pars: &TrackPars) -> Result<Track> {
        if track_pars.segment_count < 3 {
            bail!(
                "Track must have at least 3 waypoints, but segment_count is {}!",
                track_pars.segment_count
            )
        }

        if track_pars.inner_radius <= 0.0 || track_pars.outer_radius <= track_pars.inner_radius {
            bail!(
                "Track radii must fulfill 0 < inner_radius < outer_radius, but are {:.3}m/{:.3}m!",
                track_pars.inner_radius,
                track_pars.outer_radius
            )
        }

        if track_pars.z_compression <= 0.0 {
            bail!(
                "Oval z compression must be positive, but is {:.3}!",
                track_pars.z_compression
            )
        }

        if !(0.0..1.0).contains(&track_pars.start_line_frac) {
            bail!(
                "Start line fraction must be in [0.0, 1.0[, but is {:.3}!",
                track_pars.start_line_frac
            )
        }

        if track_pars.look_ahead_count == 0 {
            bail!("Look-ahead count must be at least 1!")
        }

        if track_pars.hysteresis_margin <= 0.0 {
            bail!(
                "Start line hysteresis margin must be positive, but is {:.3}m!",
                track_pars.hysteresis_margin
            )
        }

        // generate the closed center line, waypoint 0 at angle 0
        let center_radius = 0.5 * (track_pars.inner_radius + track_pars.outer_radius);
        let no_waypoints = track_pars.segment_count;
        let mut waypoints: Vec<DVec3> = Vec::with_capacity(no_waypoints);

        for i in 0..no_waypoints {
            let theta = i as f64 / no_waypoints as f64 * TAU;
            waypoints.push(DVec3::new(
                center_radius * theta.sin(),
                0.0,
                center_radius * theta.cos() * track_pars.z_compression,
            ));
        }

        // accumulate segment lengths, cum_dists[i] is the distance covered up to waypoint i
        let mut cum_dists: Vec<f64> = Vec::with_capacity(no_waypoints + 1);
        cum_dists.push(0.0);

        for i in 0..no_waypoints {
            let seg_len = waypoints[i].distance(waypoints[(i + 1) % no_waypoints]);
            cum_dists.push(cum_dists[i] + seg_len);
        }

        let circumference = *cum_dists.last().unwrap();
        let start_line_s = track_pars.start_line_frac * circumference;

        // the re-arm band must stay on one side of the s = 0 seam, otherwise the lap
        // detection cannot distinguish wrap-around from line jitter
        if start_line_s < track_pars.hysteresis_margin
            || start_line_s + track_pars.hysteresis_margin >= circumference
        {
            bail!(
                "Start line at {:.3}m with a {:.3}m hysteresis margin wraps the s = 0 seam \
                 (circumference {:.3}m)!",
                start_line_s,
                track_pars.hysteresis_margin,
                circumference
            )
        }

        Ok(Track {
            name: track_pars.name.to_owned(),
            segment_count: track_pars.segment_count,
            inner_radius: track_pars.inner_radius,
            outer_radius: track_pars.outer_radius,
            center_radius,
            track_width: track_pars.outer_radius - track_pars.inner_radius,
            z_compression: track_pars.z_compression,
            look_ahead_count: track_pars.look_ahead_count,
            hysteresis_margin: track_pars.hysteresis_margin,
            circumference,
            start_line_s,
            waypoints,
            cum_dists,
        })
    }

    /// The method returns the index of the waypoint closest to the given position. Ties are
    /// broken by the lowest index.
    pub fn closest_waypoint_index(&self, position: DVec3) -> usize {
        let mut idx_min = 0;
        let mut dist_min = f64::INFINITY;

        for (i, waypoint) in self.waypoints.iter().enumerate() {
            let dist = waypoint.distance_squared(position);

            if dist < dist_min {
                dist_min = dist;
                idx_min = i;
            }
        }

        idx_min
    }

    /// The method returns the waypoint look_ahead_count indices ahead of the given one,
    /// wrapping around the closed path.
    pub fn look_ahead_waypoint(&self, index: usize, look_ahead_count: usize) -> DVec3 {
        self.waypoints[(index + look_ahead_count) % self.waypoints.len()]
    }

    pub fn waypoint(&self, index: usize) -> DVec3 {
        self.waypoints[index % self.waypoints.len()]
    }

    /// The method returns the forward-progress coordinate s in [0.0, circumference[ for the
    /// given position, i.e., the distance along the center line to the point closest to the
    /// car. Both segments adjacent to the closest waypoint are considered so that s does not
    /// jump ahead while the car is still approaching the waypoint.
    pub fn progress_at(&self, position: DVec3) -> f64 {
        let no_waypoints = self.waypoints.len();
        let idx_closest = self.closest_waypoint_index(position);
        let idx_prev = (idx_closest + no_waypoints - 1) % no_waypoints;

        let (s_fwd, dist_fwd) = self.project_on_segment(idx_closest, position);
        let (s_back, dist_back) = self.project_on_segment(idx_prev, position);

        if dist_back < dist_fwd {
            s_back
        } else {
            s_fwd
        }
    }

    /// The method returns the point on the center line at the given forward-progress
    /// coordinate (wrapped into [0.0, circumference[).
    pub fn point_at(&self, s: f64) -> DVec3 {
        let (idx, frac) = self.segment_at(s);
        let wp_a = self.waypoints[idx];
        let wp_b = self.waypoints[(idx + 1) % self.waypoints.len()];
        wp_a + (wp_b - wp_a) * frac
    }

    /// The method returns the unit driving direction of the center line at the given
    /// forward-progress coordinate.
    pub fn tangent_at(&self, s: f64) -> DVec3 {
        let (idx, _) = self.segment_at(s);
        let wp_a = self.waypoints[idx];
        let wp_b = self.waypoints[(idx + 1) % self.waypoints.len()];
        (wp_b - wp_a).normalize()
    }

    /// The method wraps an arbitrary s coordinate (also negative, e.g. grid positions behind
    /// the start line) into [0.0, circumference[.
    pub fn wrap_s(&self, s: f64) -> f64 {
        let s_wrapped = s % self.circumference;

        if s_wrapped < 0.0 {
            s_wrapped + self.circumference
        } else {
            s_wrapped
        }
    }

    fn segment_at(&self, s: f64) -> (usize, f64) {
        let s_wrapped = self.wrap_s(s);

        // linear scan is fine, the waypoint count is small
        for i in 0..self.waypoints.len() {
            if s_wrapped < self.cum_dists[i + 1] {
                let seg_len = self.cum_dists[i + 1] - self.cum_dists[i];
                return (i, (s_wrapped - self.cum_dists[i]) / seg_len);
            }
        }

        (self.waypoints.len() - 1, 1.0)
    }

    fn project_on_segment(&self, idx: usize, position: DVec3) -> (f64, f64) {
        let wp_a = self.waypoints[idx];
        let wp_b = self.waypoints[(idx + 1) % self.waypoints.len()];
        let seg = wp_b - wp_a;

        let frac = ((position - wp_a).dot(seg) / seg.length_squared()).clamp(0.0, 1.0);
        let foot = wp_a + seg * frac;
        let s = self.cum_dists[idx] + seg.length() * frac;

        (self.wrap_s(s), foot.distance(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_pars() -> TrackPars {
        TrackPars {
            name: "test_oval".to_string(),
            segment_count: 64,
            inner_radius: 10.5,
            outer_radius: 15.0,
            z_compression: 0.8,
            start_line_frac: 0.25,
            look_ahead_count: 4,
            hysteresis_margin: 1.0,
        }
    }

    #[test]
    fn construction_is_deterministic() {
        let track_a = Track::new(&test_pars()).unwrap();
        let track_b = Track::new(&test_pars()).unwrap();

        for i in 0..track_a.segment_count {
            assert_eq!(track_a.waypoint(i), track_b.waypoint(i));
        }
        assert_eq!(track_a.circumference, track_b.circumference);
    }

    #[test]
    fn look_ahead_wraps_around_the_closed_path() {
        let track = Track::new(&test_pars()).unwrap();
        let position = DVec3::new(3.0, 0.0, 11.0);
        let idx = track.closest_waypoint_index(position);

        // a full lap of look-ahead lands on the same waypoint as no look-ahead
        assert_eq!(
            track.look_ahead_waypoint(idx, track.segment_count),
            track.look_ahead_waypoint(idx, 0)
        );
    }

    #[test]
    fn closest_waypoint_is_exact_on_waypoints() {
        let track = Track::new(&test_pars()).unwrap();

        for i in 0..track.segment_count {
            assert_eq!(track.closest_waypoint_index(track.waypoint(i)), i);
        }
    }

    #[test]
    fn closest_waypoint_ties_break_to_lowest_index() {
        let track = Track::new(&test_pars()).unwrap();

        // the z compression pulls the z-extreme waypoints 0 and 32 equally close to the
        // oval center; the scan must keep the first one found
        let idx = track.closest_waypoint_index(DVec3::ZERO);
        assert_eq!(idx, 0);
    }

    #[test]
    fn progress_increases_along_the_loop() {
        let track = Track::new(&test_pars()).unwrap();
        let mut s_prev = track.progress_at(track.waypoint(0));

        for i in 1..track.segment_count {
            let s = track.progress_at(track.waypoint(i));
            assert!(s > s_prev, "progress must increase from waypoint to waypoint");
            s_prev = s;
        }
    }

    #[test]
    fn point_at_and_progress_at_are_inverse() {
        let track = Track::new(&test_pars()).unwrap();

        for &s in &[0.0, 7.5, 33.3, track.circumference - 0.25] {
            assert_relative_eq!(track.progress_at(track.point_at(s)), s, epsilon = 1e-9);
        }
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let mut pars = test_pars();
        pars.segment_count = 2;
        assert!(Track::new(&pars).is_err());

        let mut pars = test_pars();
        pars.inner_radius = 16.0;
        assert!(Track::new(&pars).is_err());

        let mut pars = test_pars();
        pars.z_compression = 0.0;
        assert!(Track::new(&pars).is_err());

        let mut pars = test_pars();
        pars.start_line_frac = 0.0;
        assert!(
            Track::new(&pars).is_err(),
            "hysteresis band around s = 0 must be rejected"
        );
    }

    #[test]
    fn wrap_s_maps_negative_grid_positions() {
        let track = Track::new(&test_pars()).unwrap();
        let s = track.wrap_s(-5.0);
        assert_relative_eq!(s, track.circumference - 5.0, epsilon = 1e-12);
    }
}
