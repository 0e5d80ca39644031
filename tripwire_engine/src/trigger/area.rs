//! Area triggers: axis-aligned boxes in a 3D integer grid with enter and
//! exit scripts.
//!
//! Areas may not overlap. Creation checks the requested box against every
//! registered area and refuses with the full set of conflicts, so the
//! operator sees everything in the way at once rather than one name per
//! attempt.

use crate::context::{ActivationContext, TriggerKind};
use crate::runtime::Runtime;
use crate::trigger::{Trigger, TriggerStoreError};
use log::info;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// An integer grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vec3 {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Vec3 {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// An axis-aligned box with inclusive bounds. Corners are normalized per
/// axis at construction, so callers may pass any two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    min: Vec3,
    max: Vec3,
}

impl Region {
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn contains(&self, p: Vec3) -> bool {
        self.min.x <= p.x
            && p.x <= self.max.x
            && self.min.y <= p.y
            && p.y <= self.max.y
            && self.min.z <= p.z
            && p.z <= self.max.z
    }

    /// Inclusive-bound overlap test; boxes that share a single face, edge, or
    /// corner cell overlap.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }
}

/// Rejections from the area store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AreaError {
    #[error("region overlaps existing area(s): {}", .0.join(", "))]
    Overlap(Vec<String>),
    #[error(transparent)]
    Store(#[from] TriggerStoreError),
}

struct Area {
    region: Region,
    enabled: bool,
    enter: Option<Trigger>,
    exit: Option<Trigger>,
}

/// Which edge of an area a movement crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    Enter,
    Exit,
}

/// Name-keyed store of non-overlapping areas and their scripts.
pub struct AreaTriggerManager {
    rt: Arc<Runtime>,
    areas: Mutex<HashMap<String, Area>>,
}

impl AreaTriggerManager {
    pub fn new(rt: Arc<Runtime>) -> Self {
        Self {
            rt,
            areas: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new area with no scripts yet.
    ///
    /// # Errors
    /// [`AreaError::Overlap`] listing every conflicting area,
    /// [`TriggerStoreError::Conflict`] on a duplicate name.
    pub fn create(&self, name: &str, region: Region) -> Result<(), AreaError> {
        let mut areas = self.lock();
        if areas.contains_key(name) {
            return Err(TriggerStoreError::Conflict(name.to_string()).into());
        }
        let conflicts = conflicts_in(&areas, &region);
        if !conflicts.is_empty() {
            return Err(AreaError::Overlap(conflicts));
        }
        areas.insert(
            name.to_string(),
            Area {
                region,
                enabled: true,
                enter: None,
                exit: None,
            },
        );
        info!("created area trigger '{name}' spanning {} to {}", region.min(), region.max());
        Ok(())
    }

    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn delete(&self, name: &str) -> Result<(), TriggerStoreError> {
        self.lock()
            .remove(name)
            .map(|_| info!("deleted area trigger '{name}'"))
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))
    }

    /// Enabled areas whose region overlaps `region`, sorted by name. A query
    /// over an existing area's own region includes that area.
    pub fn conflicting_areas(&self, region: &Region) -> Vec<String> {
        conflicts_in(&self.lock(), region)
    }

    /// Disabled areas neither fire nor block new areas from claiming their
    /// space.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), TriggerStoreError> {
        let mut areas = self.lock();
        let area = areas
            .get_mut(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        area.enabled = enabled;
        Ok(())
    }

    /// The enabled area containing `point`, if any. Non-overlap makes this
    /// unique.
    pub fn area_at(&self, point: Vec3) -> Option<String> {
        self.lock()
            .iter()
            .find(|(_, area)| area.enabled && area.region.contains(point))
            .map(|(name, _)| name.clone())
    }

    /// # Errors
    /// [`TriggerStoreError::NotFound`] for an unknown area,
    /// [`TriggerStoreError::Compile`] when the source does not compile (the
    /// previous script, if any, is kept).
    pub fn set_enter_script(&self, name: &str, source: &str) -> Result<(), TriggerStoreError> {
        self.set_script(name, source, Crossing::Enter)
    }

    /// # Errors
    /// Same as [`Self::set_enter_script`].
    pub fn set_exit_script(&self, name: &str, source: &str) -> Result<(), TriggerStoreError> {
        self.set_script(name, source, Crossing::Exit)
    }

    fn set_script(&self, name: &str, source: &str, crossing: Crossing) -> Result<(), TriggerStoreError> {
        let kind = match crossing {
            Crossing::Enter => TriggerKind::AreaEnter,
            Crossing::Exit => TriggerKind::AreaExit,
        };
        let trigger = Trigger::compile(format!("{name}/{kind}"), kind, source)?;
        let mut areas = self.lock();
        let area = areas
            .get_mut(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        match crossing {
            Crossing::Enter => area.enter = Some(trigger),
            Crossing::Exit => area.exit = Some(trigger),
        }
        Ok(())
    }

    /// Feed one movement step. Fires the exit script of the area left and
    /// the enter script of the area entered, when those differ.
    pub fn movement(&self, ctx: &Arc<dyn ActivationContext>, from: Vec3, to: Vec3) {
        let (left, entered) = {
            let areas = self.lock();
            let find = |p: Vec3| {
                areas
                    .iter()
                    .find(|(_, area)| area.enabled && area.region.contains(p))
                    .map(|(name, _)| name.clone())
            };
            (find(from), find(to))
        };
        if left == entered {
            return;
        }
        if let Some(name) = left {
            self.fire(&name, Crossing::Exit, ctx);
        }
        if let Some(name) = entered {
            self.fire(&name, Crossing::Enter, ctx);
        }
    }

    fn fire(&self, name: &str, crossing: Crossing, ctx: &Arc<dyn ActivationContext>) {
        let trigger = {
            let areas = self.lock();
            let Some(area) = areas.get(name) else { return };
            match crossing {
                Crossing::Enter => area.enter.clone(),
                Crossing::Exit => area.exit.clone(),
            }
        };
        if let Some(trigger) = trigger {
            trigger.activate(ctx.clone(), &self.rt);
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Area>> {
        self.areas.lock().expect("area table lock poisoned")
    }
}

fn conflicts_in(areas: &HashMap<String, Area>, region: &Region) -> Vec<String> {
    let mut conflicts: Vec<String> = areas
        .iter()
        .filter(|(_, area)| area.enabled && area.region.overlaps(region))
        .map(|(name, _)| name.clone())
        .collect();
    conflicts.sort();
    conflicts
}
