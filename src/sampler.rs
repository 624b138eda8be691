//! Trajectory Sampler boundary and the analytical catalog that implements it.
//!
//! The core never propagates orbits itself. It asks a [`TrajectorySampler`]
//! for fixed-step trajectories and single states. [`Catalog`] is the
//! implementation shipped with the crate: mean elements advanced with J2
//! secular rates, converted to Cartesian on demand.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::elements::MeanElements;
use crate::propagator::{degeneracy, StateVector};
use crate::tle::Tle;
use crate::trajectory::{ObjectId, Trajectory, TrajectorySample};

/// Failures reported by a sampler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error("Object {0} is not in the catalog")]
    UnknownObject(ObjectId),

    #[error("Invalid sampling window: {0}")]
    InvalidWindow(String),

    #[error("Object {id} has a degenerate orbit: {reason}")]
    Degenerate { id: ObjectId, reason: String },
}

/// Source of sampled trajectories and point states.
///
/// Implementations guarantee that consecutive samples are `step_minutes`
/// apart and that a non-negative window yields
/// `floor(duration_hours * 60 / step_minutes) + 1` samples.
pub trait TrajectorySampler: Send + Sync {
    fn sample(
        &self,
        id: ObjectId,
        start_epoch: f64,
        duration_hours: f64,
        step_minutes: u32,
    ) -> Result<Trajectory, SamplerError>;

    fn state_at(&self, id: ObjectId, epoch: f64) -> Result<StateVector, SamplerError>;
}

/// Number of samples in a window, end inclusive.
pub fn sample_count(duration_hours: f64, step_minutes: u32) -> Result<usize, SamplerError> {
    if !duration_hours.is_finite() || duration_hours < 0.0 {
        return Err(SamplerError::InvalidWindow(format!(
            "duration must be a non-negative number of hours, got {duration_hours}"
        )));
    }
    if step_minutes == 0 {
        return Err(SamplerError::InvalidWindow("step must be at least one minute".into()));
    }
    Ok((duration_hours * 60.0 / step_minutes as f64).floor() as usize + 1)
}

/// Broad object class, used to skip debris-on-debris pairs in a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Payload,
    RocketBody,
    Debris,
    Unknown,
}

impl ObjectKind {
    /// Guess the class from a catalog name.
    pub fn from_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        if upper.contains("DEB") {
            ObjectKind::Debris
        } else if upper.contains("R/B") {
            ObjectKind::RocketBody
        } else {
            ObjectKind::Payload
        }
    }
}

/// Identity of a tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
}

impl TrackedObject {
    pub fn new(id: ObjectId, name: impl Into<String>, kind: ObjectKind) -> Self {
        Self { id, name: name.into(), kind }
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    object: TrackedObject,
    elements: MeanElements,
}

/// Element catalog sampled with J2 secular propagation.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<ObjectId, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from parsed TLEs. Later sets replace earlier ones
    /// with the same NORAD ID.
    pub fn from_tles(tles: &[Tle]) -> Self {
        let mut catalog = Self::new();
        for tle in tles {
            let name = tle.name.clone().unwrap_or_else(|| format!("NORAD {}", tle.norad_id));
            let kind = ObjectKind::from_name(&name);
            catalog.insert(TrackedObject::new(tle.norad_id, name, kind), tle.to_mean_elements());
        }
        catalog
    }

    /// Insert or replace an object.
    pub fn insert(&mut self, object: TrackedObject, elements: MeanElements) {
        self.entries.insert(object.id, CatalogEntry { object, elements });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked objects in ascending ID order.
    pub fn objects(&self) -> Vec<TrackedObject> {
        self.entries.values().map(|e| e.object.clone()).collect()
    }

    fn entry(&self, id: ObjectId) -> Result<&CatalogEntry, SamplerError> {
        self.entries.get(&id).ok_or(SamplerError::UnknownObject(id))
    }
}

impl TrajectorySampler for Catalog {
    fn sample(
        &self,
        id: ObjectId,
        start_epoch: f64,
        duration_hours: f64,
        step_minutes: u32,
    ) -> Result<Trajectory, SamplerError> {
        let count = sample_count(duration_hours, step_minutes)?;
        let step_s = step_minutes as f64 * 60.0;

        let samples = (0..count)
            .map(|k| {
                self.state_at(id, start_epoch + k as f64 * step_s)
                    .map(TrajectorySample::from)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Trajectory::new(id, step_minutes, samples))
    }

    fn state_at(&self, id: ObjectId, epoch: f64) -> Result<StateVector, SamplerError> {
        let entry = self.entry(id)?;
        if let Some(reason) = degeneracy(&entry.elements) {
            return Err(SamplerError::Degenerate { id, reason: reason.to_string() });
        }

        let state = StateVector::from_mean_elements(&entry.elements.at_epoch(epoch));
        if !state.is_finite() {
            return Err(SamplerError::Degenerate {
                id,
                reason: "propagation produced a non-finite state".into(),
            });
        }
        Ok(state)
    }
}
