use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::coords::{GeometryError, Quad};

/// How updates reach the quad the draw pass reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BufferingMode {
    /// Writes land in a standby buffer which is then swapped in.
    #[default]
    Double,
    /// Writes copy into the active buffer in place.
    Single,
}

/// Progress of an update through the store. Observable as `Idle` outside the guard.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Updating,
    SwapPending,
}

#[derive(Debug)]
struct Buffers {
    quads: [Quad; 2],
    active: usize,
    phase: UpdatePhase,
    generation: u64,
}

impl Buffers {
    fn active(&self) -> &Quad {
        &self.quads[self.active]
    }
}

/// Double-buffered foreground quad.
///
/// Writers and the draw pass share one short critical section, so a reader
/// holding [`GeometryStore::read`] always sees a whole quad from a single update.
#[derive(Debug)]
pub struct GeometryStore {
    mode: BufferingMode,
    inner: Mutex<Buffers>,
}

impl GeometryStore {
    pub fn new(mode: BufferingMode, initial: Quad) -> Self {
        Self {
            mode,
            inner: Mutex::new(Buffers {
                quads: [initial, initial],
                active: 0,
                phase: UpdatePhase::Idle,
                generation: 0,
            }),
        }
    }

    pub fn mode(&self) -> BufferingMode {
        self.mode
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        // The critical sections only copy plain floats, so a poisoned lock still
        // guards a whole quad.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the quad with 12 NDC floats.
    ///
    /// Any other length is rejected and leaves the store untouched.
    pub fn set_coordinates(&self, coords: &[f32]) -> Result<u64, GeometryError> {
        let quad = Quad::from_slice(coords)?;
        Ok(self.set_quad(quad))
    }

    /// Installs `quad` and returns the new generation.
    pub fn set_quad(&self, quad: Quad) -> u64 {
        let mut b = self.lock();

        b.phase = UpdatePhase::Updating;
        match self.mode {
            BufferingMode::Double => {
                let standby = 1 - b.active;
                b.quads[standby] = quad;
                b.phase = UpdatePhase::SwapPending;
                b.active = standby;
            }
            BufferingMode::Single => {
                let active = b.active;
                b.quads[active] = quad;
            }
        }
        b.generation += 1;
        b.phase = UpdatePhase::Idle;

        log::trace!("geometry generation {} (buffer {})", b.generation, b.active);
        b.generation
    }

    /// Copy of the active quad.
    pub fn current_buffer(&self) -> Quad {
        *self.lock().active()
    }

    /// Number of accepted updates so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn phase(&self) -> UpdatePhase {
        self.lock().phase
    }

    /// Holds off writers until the guard is dropped.
    pub fn read(&self) -> GeometryRead<'_> {
        GeometryRead { guard: self.lock() }
    }
}

/// Read guard over the active quad.
pub struct GeometryRead<'a> {
    guard: MutexGuard<'a, Buffers>,
}

impl GeometryRead<'_> {
    pub fn quad(&self) -> &Quad {
        self.guard.active()
    }

    pub fn generation(&self) -> u64 {
        self.guard.generation
    }
}
