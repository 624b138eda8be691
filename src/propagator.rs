//! Cartesian states from mean elements.
//!
//! The sampler advances [`MeanElements`] analytically (J2 secular) and
//! converts them to an ECI [`StateVector`] here. This is a screening-grade
//! model; it stands in for a full propagator at the sampler boundary.
use crate::constants::*;
use crate::elements::MeanElements;
use crate::trajectory::norm;
use serde::{Deserialize, Serialize};

/// Cartesian state vector in ECI frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    /// Position (km): [x, y, z]
    pub r: [f64; 3],
    /// Velocity (km/s): [vx, vy, vz]
    pub v: [f64; 3],
    /// Epoch (seconds since J2000)
    pub epoch: f64,
}

impl StateVector {
    pub fn new(r: [f64; 3], v: [f64; 3], epoch: f64) -> Self {
        Self { r, v, epoch }
    }

    /// Position magnitude (km).
    pub fn r_mag(&self) -> f64 {
        norm(&self.r)
    }

    pub fn is_finite(&self) -> bool {
        self.r.iter().chain(self.v.iter()).all(|x| x.is_finite()) && self.epoch.is_finite()
    }

    /// Keplerian elements (true anomaly `nu`) to ECI position/velocity.
    pub fn from_keplerian(a: f64, e: f64, i: f64, raan: f64, aop: f64, nu: f64, epoch: f64) -> Self {
        let p = a * (1.0 - e.powi(2));
        let radius = p / (1.0 + e * nu.cos());
        let speed_factor = (MU_EARTH / p).sqrt();

        // Perifocal position and velocity
        let r_pqw = [radius * nu.cos(), radius * nu.sin()];
        let v_pqw = [-speed_factor * nu.sin(), speed_factor * (e + nu.cos())];

        let (so, co) = raan.sin_cos();
        let (sw, cw) = aop.sin_cos();
        let (si, ci) = i.sin_cos();

        // First two columns of the PQW -> ECI rotation (third is unused, z_pqw = 0)
        let p_hat = [co * cw - so * sw * ci, so * cw + co * sw * ci, sw * si];
        let q_hat = [-co * sw - so * cw * ci, -so * sw + co * cw * ci, cw * si];

        let mut r = [0.0; 3];
        let mut v = [0.0; 3];
        for k in 0..3 {
            r[k] = p_hat[k] * r_pqw[0] + q_hat[k] * r_pqw[1];
            v[k] = p_hat[k] * v_pqw[0] + q_hat[k] * v_pqw[1];
        }

        StateVector { r, v, epoch }
    }

    /// Convert mean elements (mean anomaly → true anomaly) at their own epoch.
    pub fn from_mean_elements(elem: &MeanElements) -> Self {
        let nu = mean_to_true_anomaly(elem.ma, elem.e, 1e-12, 50);
        Self::from_keplerian(elem.a, elem.e, elem.i, elem.raan, elem.aop, nu, elem.epoch)
    }
}

/// Why an element set cannot produce a usable state, if it cannot.
pub fn degeneracy(elem: &MeanElements) -> Option<&'static str> {
    if !(elem.a.is_finite() && elem.e.is_finite() && elem.i.is_finite()) {
        return Some("non-finite elements");
    }
    if elem.a <= 0.0 {
        return Some("non-positive semi-major axis");
    }
    if !(0.0..1.0).contains(&elem.e) {
        return Some("eccentricity outside [0, 1)");
    }
    if elem.perigee_radius() < R_EARTH {
        return Some("perigee below Earth's surface");
    }
    None
}

/// Solve Kepler's equation M = E - e sin(E) for eccentric anomaly.
fn mean_to_eccentric_anomaly(m: f64, e: f64, tol: f64, max_iter: usize) -> f64 {
    let mut ea = if e < 0.8 { m } else { std::f64::consts::PI };

    for _ in 0..max_iter {
        let delta = (ea - e * ea.sin() - m) / (1.0 - e * ea.cos());
        ea -= delta;
        if delta.abs() < tol {
            break;
        }
    }
    ea
}

/// Convert mean anomaly to true anomaly.
fn mean_to_true_anomaly(m: f64, e: f64, tol: f64, max_iter: usize) -> f64 {
    let ea = mean_to_eccentric_anomaly(m, e, tol, max_iter);
    2.0 * ((1.0 + e).sqrt() * (ea / 2.0).sin()).atan2((1.0 - e).sqrt() * (ea / 2.0).cos())
}
