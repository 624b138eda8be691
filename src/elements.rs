//! Mean orbital elements with J2 secular drift.
//!
//! This is the element set the analytical sampler advances between
//! samples. Only secular J2 rates are modelled: RAAN and argument of
//! perigee regress, the mean anomaly advances at the J2-perturbed mean
//! motion, and a/e/i stay fixed.

use serde::{Deserialize, Serialize};
use crate::constants::*;

/// Mean Keplerian elements at an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanElements {
    /// Mean semi-major axis (km)
    pub a: f64,
    /// Mean eccentricity
    pub e: f64,
    /// Mean inclination (rad)
    pub i: f64,
    /// Mean RAAN (rad)
    pub raan: f64,
    /// Mean argument of perigee (rad)
    pub aop: f64,
    /// Mean anomaly (rad)
    pub ma: f64,
    /// Epoch (seconds since J2000)
    pub epoch: f64,
}

impl MeanElements {
    /// Build from angles given in degrees.
    pub fn from_degrees(
        a: f64,
        e: f64,
        i_deg: f64,
        raan_deg: f64,
        aop_deg: f64,
        ma_deg: f64,
        epoch: f64,
    ) -> Self {
        Self {
            a,
            e,
            i: i_deg * DEG2RAD,
            raan: raan_deg * DEG2RAD,
            aop: aop_deg * DEG2RAD,
            ma: ma_deg * DEG2RAD,
            epoch,
        }
    }

    /// Keplerian mean motion (rad/s).
    pub fn mean_motion(&self) -> f64 {
        (MU_EARTH / self.a.powi(3)).sqrt()
    }

    /// Orbital period (seconds).
    pub fn period(&self) -> f64 {
        TAU / self.mean_motion()
    }

    /// Perigee radius (km).
    pub fn perigee_radius(&self) -> f64 {
        self.a * (1.0 - self.e)
    }

    /// J2 secular drift rate of RAAN (rad/s).
    ///
    /// dΩ/dt = -3/2 * n * J2 * (R_E/p)² * cos(i)
    pub fn raan_rate(&self) -> f64 {
        let p = self.a * (1.0 - self.e.powi(2));
        -1.5 * self.mean_motion() * J2 * (R_EARTH / p).powi(2) * self.i.cos()
    }

    /// J2 secular drift rate of argument of perigee (rad/s).
    ///
    /// dω/dt = 3/2 * n * J2 * (R_E/p)² * (2 - 5/2 sin²i)
    pub fn aop_rate(&self) -> f64 {
        let p = self.a * (1.0 - self.e.powi(2));
        1.5 * self.mean_motion() * J2 * (R_EARTH / p).powi(2) * (2.0 - 2.5 * self.i.sin().powi(2))
    }

    /// J2-perturbed mean motion (rad/s).
    pub fn mean_motion_j2(&self) -> f64 {
        let eta = (1.0 - self.e.powi(2)).sqrt();
        let ratio = R_EARTH / self.a;
        self.mean_motion()
            * (1.0 + 1.5 * J2 * ratio.powi(2) * (1.0 - 1.5 * self.i.sin().powi(2)) / eta.powi(3))
    }

    /// Advance the elements by `dt` seconds (negative goes backwards).
    pub fn propagate(&self, dt: f64) -> MeanElements {
        MeanElements {
            raan: normalize_angle(self.raan + self.raan_rate() * dt),
            aop: normalize_angle(self.aop + self.aop_rate() * dt),
            ma: normalize_angle(self.ma + self.mean_motion_j2() * dt),
            epoch: self.epoch + dt,
            ..*self
        }
    }

    /// Elements at an absolute epoch.
    pub fn at_epoch(&self, epoch: f64) -> MeanElements {
        self.propagate(epoch - self.epoch)
    }
}

/// Osculating inclination (rad) of a Cartesian state, from h = r × v.
///
/// Returns 0 for a degenerate (rectilinear) state.
pub fn inclination_of(r: &[f64; 3], v: &[f64; 3]) -> f64 {
    let h = [
        r[1] * v[2] - r[2] * v[1],
        r[2] * v[0] - r[0] * v[2],
        r[0] * v[1] - r[1] * v[0],
    ];
    let h_mag = (h[0].powi(2) + h[1].powi(2) + h[2].powi(2)).sqrt();
    if h_mag < 1e-12 {
        return 0.0;
    }
    (h[2] / h_mag).clamp(-1.0, 1.0).acos()
}

/// Normalize angle to [0, 2π).
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % TAU;
    if a < 0.0 { a + TAU } else { a }
}
