//! Physical constants and fixed screening / maneuver policy values.

/// Earth gravitational parameter (km³/s²) — WGS84
pub const MU_EARTH: f64 = 398600.4418;

/// Earth equatorial radius (km) — WGS84
pub const R_EARTH: f64 = 6378.137;

/// Earth J2 zonal harmonic — WGS84/EGM96
pub const J2: f64 = 1.08262668e-3;

/// Seconds per solar day
pub const SOLAR_DAY: f64 = 86400.0;

/// Two pi
pub const TAU: f64 = std::f64::consts::TAU;

/// Degrees to radians
pub const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

/// Radians to degrees
pub const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;

// ── Risk classification ──

/// Below this miss distance (km) a conjunction is CRITICAL.
pub const CRITICAL_DISTANCE_KM: f64 = 5.0;

/// Below this miss distance (km) a conjunction is HIGH.
pub const HIGH_DISTANCE_KM: f64 = 25.0;

/// Below this miss distance (km) a conjunction is MEDIUM.
pub const MEDIUM_DISTANCE_KM: f64 = 50.0;

/// At or beyond this distance (km) the geometric probability is zero
/// and no learned score is requested.
pub const PROBABILITY_CUTOFF_KM: f64 = 100.0;

/// e-folding length (km) of the geometric probability decay.
pub const PROBABILITY_SCALE_KM: f64 = 10.0;

// ── Maneuver policy ──

/// Hard post-maneuver separation floor (km).
pub const SAFE_SEPARATION_KM: f64 = 25.0;

/// Default per-axis and total delta-v limit (m/s).
pub const DEFAULT_MAX_DELTA_V: f64 = 10.0;

/// Default optimizer iteration budget.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default optimizer seed: a small prograde (along-track) burn (m/s).
pub const DEFAULT_INITIAL_GUESS: [f64; 3] = [0.0, 2.0, 0.0];

/// Plans above this magnitude (m/s) are split into primary + correction burns.
pub const SPLIT_BURN_THRESHOLD: f64 = 5.0;

/// Share of the delta-v given to the primary burn of a split schedule.
pub const PRIMARY_BURN_FRACTION: f64 = 0.6;

/// Lead time of the primary burn ahead of the execution epoch (s).
pub const PRIMARY_BURN_LEAD_S: f64 = 600.0;

/// Primary burn duration (s).
pub const PRIMARY_BURN_DURATION_S: u32 = 30;

/// Correction burn duration (s).
pub const CORRECTION_BURN_DURATION_S: u32 = 20;

/// Single-burn duration per m/s of delta-v (s).
pub const SINGLE_BURN_SECONDS_PER_MS: f64 = 10.0;
