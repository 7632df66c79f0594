//! Handle table behind the opaque C pointers.
//!
//! A C handle is a token, not an address: the slot index and the generation
//! the slot had when the handle was issued. Released slots are reused with a
//! new generation, so a stale token is recognized instead of reaching another
//! component.
//!
//! Both fields share one `usize`, so each holds `usize::BITS / 2` bits. A slot
//! whose generation reaches the maximum is retired instead of reused, and
//! `insert` fails once every slot index is taken. Generations never wrap.

use super::raw::{PortLease, RawPort};
use crate::component::ComponentHandle;
use crate::error::{ComponentError, Result};
use std::sync::Arc;

/// Opaque handle value given to C
pub type Token = usize;

const GENERATION_BITS: u32 = usize::BITS / 2;
const GENERATION_MASK: usize = (1 << GENERATION_BITS) - 1;

fn encode(index: usize, generation: usize) -> Token {
    ((index + 1) << GENERATION_BITS) | generation
}

fn decode(token: Token) -> Option<(usize, usize)> {
    let index = (token >> GENERATION_BITS).checked_sub(1)?;
    Some((index, token & GENERATION_MASK))
}

struct Entry {
    handle: Arc<ComponentHandle>,
    /// Port table most recently returned by `cpy_get`
    lease: Option<PortLease>,
}

#[derive(Default)]
struct Slot {
    /// Generation of the current or most recent entry; 0 before first use
    generation: usize,
    entry: Option<Entry>,
}

/// Live component handles and their port leases
pub struct HandleRegistry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    max_slots: usize,
    max_generation: usize,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry {
    pub fn new() -> Self {
        // `index + 1` and the generation must each fit in GENERATION_BITS
        Self::with_limits(GENERATION_MASK, GENERATION_MASK)
    }

    fn with_limits(max_slots: usize, max_generation: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            max_slots,
            max_generation,
        }
    }

    /// Register a handle and issue its token. Fails when no slot is free and
    /// the table cannot grow.
    pub fn insert(&mut self, handle: Arc<ComponentHandle>) -> Result<Token> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < self.max_slots => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
            None => {
                return Err(ComponentError::Load(format!(
                    "handle table is full ({} slots)",
                    self.max_slots
                )))
            }
        };

        let slot = &mut self.slots[index];
        slot.generation += 1;
        slot.entry = Some(Entry {
            handle,
            lease: None,
        });
        Ok(encode(index, slot.generation))
    }

    /// The handle behind `token`
    pub fn get(&self, token: Token) -> Result<Arc<ComponentHandle>> {
        self.entry(token).map(|entry| entry.handle.clone())
    }

    /// Unregister `token`, dropping its lease. The slot can be reused.
    pub fn remove(&mut self, token: Token) -> Result<Arc<ComponentHandle>> {
        self.entry(token)?;
        let (index, _) = decode(token).ok_or_else(|| unknown(token))?;
        let slot = &mut self.slots[index];
        let entry = slot.entry.take().ok_or_else(|| unknown(token))?;
        if slot.generation < self.max_generation {
            self.free.push(index);
        } else {
            tracing::debug!("Retiring handle slot {}", index);
        }
        Ok(entry.handle)
    }

    /// Replace the lease of `token`, returning the new array for C.
    ///
    /// The previous lease is freed. An empty lease yields a null array.
    pub fn install_lease(
        &mut self,
        token: Token,
        lease: Option<PortLease>,
    ) -> Result<(*mut RawPort, usize)> {
        let entry = self.entry_mut(token)?;
        let parts = lease
            .as_ref()
            .map(|l| (l.as_ptr(), l.len()))
            .unwrap_or((std::ptr::null_mut(), 0));
        entry.lease = lease;
        Ok(parts)
    }

    /// Free the lease whose array is `ports`. Returns `false` when no live
    /// lease has that array.
    ///
    /// Leases are matched by address. A stale pointer whose address the
    /// allocator has since given to a live lease frees that lease.
    pub fn release_lease(&mut self, ports: *const RawPort) -> bool {
        for entry in self.slots.iter_mut().filter_map(|s| s.entry.as_mut()) {
            if entry
                .lease
                .as_ref()
                .is_some_and(|l| l.as_ptr() as *const RawPort == ports)
            {
                entry.lease = None;
                return true;
            }
        }
        false
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, token: Token) -> Result<&Entry> {
        let (index, generation) = decode(token).ok_or_else(|| unknown(token))?;
        let slot = self.slots.get(index).ok_or_else(|| unknown(token))?;
        match &slot.entry {
            Some(entry) if slot.generation == generation => Ok(entry),
            _ if generation != 0 && generation <= slot.generation => {
                Err(ComponentError::UseAfterRelease)
            }
            _ => Err(unknown(token)),
        }
    }

    fn entry_mut(&mut self, token: Token) -> Result<&mut Entry> {
        self.entry(token)?;
        let (index, _) = decode(token).ok_or_else(|| unknown(token))?;
        self.slots[index]
            .entry
            .as_mut()
            .ok_or_else(|| unknown(token))
    }
}

fn unknown(token: Token) -> ComponentError {
    ComponentError::InvalidArgument(format!("{:#x} is not a component handle", token))
}
