//! Reference managers invoked by a garbage collector.
//!
//! A reference manager is a callback a collector runs at fixed points of every collection.
//! Managers typically own objects whose reachability is decided elsewhere (for example by
//! data kept in extension blocks) and use the phases to renew, transfer or break their
//! holds. This module only provides the registry and the dispatch protocol; no collector is
//! implemented here.
//!
//! # Phases
//!
//! Managers are called once per [`GcPhase`], in installation order:
//!
//! 1. [`GcPhase::Start`] - nothing is marked yet
//! 2. [`GcPhase::MarkEnd`] - marking finished, holds are renewed
//! 3. [`GcPhase::AnalysisEnd`] - reachability known, the traverse hook is available
//! 4. [`GcPhase::RescueEnd`] - items may still be rescued
//! 5. [`GcPhase::CollectStart`] - holds on unreachable items are broken
//! 6. [`GcPhase::Done`] - collection complete
//!
//! # Examples
//!
//! ```rust
//! use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};
//! use objlayout::{GcInfo, GcPhase, ReferenceManager, ReferenceManagers};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ReferenceManager for Counter {
//!     fn on_phase(&self, _info: &GcInfo<'_>) -> objlayout::Result<()> {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!         Ok(())
//!     }
//! }
//!
//! let managers = ReferenceManagers::new();
//! let counter = Arc::new(Counter(AtomicUsize::new(0)));
//! let id = managers.install(counter.clone())?;
//!
//! managers.dispatch(&GcInfo::new(2, GcPhase::Start))?;
//! assert_eq!(counter.0.load(Ordering::Relaxed), 1);
//! assert!(managers.remove(id)?);
//! # Ok::<(), objlayout::Error>(())
//! ```

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};

use strum::{Display, EnumCount, EnumIter, FromRepr};

use crate::{object::ManagedObject, Error, Result};

/// The point of a collection at which managers are called
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount, FromRepr,
)]
#[repr(u8)]
pub enum GcPhase {
    /// Start of collection, no values marked
    Start = 0,
    /// End of the marking phase
    MarkEnd = 1,
    /// End of the reachability phase, managers examine relationships
    AnalysisEnd = 2,
    /// End of the rescue window
    RescueEnd = 3,
    /// Start of the collection phase
    CollectStart = 4,
    /// Collection complete
    Done = 5,
}

/// Callback applied to an object during a phase
pub type VisitFn<'a> = &'a (dyn Fn(&dyn ManagedObject) -> Result<()> + Sync);

/// Query whether an object is collectable in the current phase
pub type CollectableFn<'a> = &'a (dyn Fn(&dyn ManagedObject) -> bool + Sync);

/// Walk the objects referenced by an object, applying the given visitor to each
pub type TraverseFn<'a> =
    &'a (dyn Fn(&dyn ManagedObject, &dyn Fn(&dyn ManagedObject) -> Result<()>) -> Result<()>
         + Sync);

/// State and hooks of a single collection phase, passed to every manager.
#[derive(Clone, Copy)]
pub struct GcInfo<'a> {
    generation: u32,
    phase: GcPhase,
    visit: Option<VisitFn<'a>>,
    is_collectable: Option<CollectableFn<'a>>,
    traverse: Option<TraverseFn<'a>>,
}

impl<'a> GcInfo<'a> {
    /// Describe `phase` of a collection of `generation`, without hooks
    #[must_use]
    pub fn new(generation: u32, phase: GcPhase) -> Self {
        GcInfo {
            generation,
            phase,
            visit: None,
            is_collectable: None,
            traverse: None,
        }
    }

    /// Attach the visit hook of this phase
    #[must_use]
    pub fn with_visit(mut self, visit: VisitFn<'a>) -> Self {
        self.visit = Some(visit);
        self
    }

    /// Attach the collectability query of this phase
    #[must_use]
    pub fn with_is_collectable(mut self, is_collectable: CollectableFn<'a>) -> Self {
        self.is_collectable = Some(is_collectable);
        self
    }

    /// Attach the traverse hook. It is only exposed during [`GcPhase::AnalysisEnd`].
    #[must_use]
    pub fn with_traverse(mut self, traverse: TraverseFn<'a>) -> Self {
        self.traverse = Some(traverse);
        self
    }

    /// The generation being collected
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The current phase
    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    /// The visit hook, if the collector provides one for this phase
    pub fn visit(&self) -> Option<VisitFn<'a>> {
        self.visit
    }

    /// The collectability query, if available in this phase
    pub fn is_collectable(&self) -> Option<CollectableFn<'a>> {
        self.is_collectable
    }

    /// The traverse hook; `None` outside of [`GcPhase::AnalysisEnd`]
    pub fn traverse(&self) -> Option<TraverseFn<'a>> {
        match self.phase {
            GcPhase::AnalysisEnd => self.traverse,
            _ => None,
        }
    }

    /// Build the error a manager reports when it fails in this phase
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::ReferenceManager {
            phase: self.phase,
            message: message.into(),
        }
    }
}

impl std::fmt::Debug for GcInfo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcInfo")
            .field("generation", &self.generation)
            .field("phase", &self.phase)
            .field("visit", &self.visit.is_some())
            .field("is_collectable", &self.is_collectable.is_some())
            .field("traverse", &self.traverse().is_some())
            .finish()
    }
}

/// A callback run by the collector at every phase.
pub trait ReferenceManager: Send + Sync {
    /// Handle one phase of a collection
    ///
    /// # Errors
    /// Any error aborts the dispatch of the current phase; see [`GcInfo::error`].
    fn on_phase(&self, info: &GcInfo<'_>) -> Result<()>;
}

/// Identifies an installed manager for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId(u64);

impl std::fmt::Display for ManagerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "manager#{}", self.0)
    }
}

/// Registry of reference managers, called in installation order.
pub struct ReferenceManagers {
    managers: RwLock<Vec<(ManagerId, Arc<dyn ReferenceManager>)>>,
    next_id: AtomicU64,
}

impl ReferenceManagers {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        ReferenceManagers {
            managers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Install `manager` behind all previously installed ones.
    ///
    /// The same manager may be installed more than once; each installation is called.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the registry lock is poisoned.
    pub fn install(&self, manager: Arc<dyn ReferenceManager>) -> Result<ManagerId> {
        let id = ManagerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        write_lock!(self.managers).push((id, manager));
        log::debug!("installed reference {id}");
        Ok(id)
    }

    /// Remove a previously installed manager.
    ///
    /// Returns `false` if `id` is not installed.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the registry lock is poisoned.
    pub fn remove(&self, id: ManagerId) -> Result<bool> {
        let mut managers = write_lock!(self.managers);
        let Some(position) = managers.iter().position(|(installed, _)| *installed == id) else {
            return Ok(false);
        };
        managers.remove(position);
        log::debug!("removed reference {id}");
        Ok(true)
    }

    /// Number of installed managers
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the registry lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(read_lock!(self.managers).len())
    }

    /// Returns `true` if no manager is installed
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the registry lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(read_lock!(self.managers).is_empty())
    }

    /// Call every installed manager for the phase described by `info`.
    ///
    /// Managers run in installation order on a snapshot of the registry, so a manager may
    /// install or remove managers without deadlocking; such changes apply to the next
    /// dispatch.
    ///
    /// # Errors
    /// Returns the first error reported by a manager; later managers are not called.
    pub fn dispatch(&self, info: &GcInfo<'_>) -> Result<()> {
        let snapshot: Vec<(ManagerId, Arc<dyn ReferenceManager>)> =
            read_lock!(self.managers).clone();

        for (id, manager) in snapshot {
            if let Err(error) = manager.on_phase(info) {
                log::warn!("reference {id} failed during {}: {error}", info.phase());
                return Err(error);
            }
        }
        Ok(())
    }
}

impl Default for ReferenceManagers {
    fn default() -> Self {
        Self::new()
    }
}
