//! Native memory.
//!
//! A [`NativeMemory`] is a heap of regions addressed by non-zero `u64`
//! addresses. Two kinds exist:
//!
//! - the host heap ([`NativeMemory::host`], [`NativeMemory::global`]) hands
//!   out real process memory, so its addresses can be passed to native code;
//! - a simulated heap ([`NativeMemory::new`]) is a private byte region
//!   starting at [`HEAP_BASE`], used to marshal calls for ABIs other than the
//!   host's.
//!
//! Every access is checked against the live regions of the heap. An
//! [`Arena`] owns the regions it allocates and releases them when it is
//! closed; liveness of the segments it handed out is tracked by its
//! [`Scope`], which every segment access checks first.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for memory access
//! - `segment`: bounds-checked views ([`MemorySegment`])
//! - `value`: dynamically typed scalar values ([`Value`])
//! - `buffer`: low-level slice helpers and scalar encoding

pub(crate) mod buffer;
mod error;
mod segment;
mod value;

pub use buffer::align_to;
pub use error::MemoryError;
pub use segment::MemorySegment;
pub use value::Value;

use std::alloc::Layout;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use crate::layout::{MemoryLayout, ValueLayout};

/// Address of the first byte of every simulated heap. Address 0 is never
/// mapped.
pub const HEAP_BASE: u64 = 0x1_0000;

static GLOBAL_MEMORY: Lazy<NativeMemory> = Lazy::new(NativeMemory::host);
static GLOBAL_SCOPE: Lazy<Scope> = Lazy::new(Scope::new);

#[derive(Debug, Clone, Copy)]
struct Region {
    size: u64,
    align: u64,
    /// Allocated by this heap, as opposed to foreign memory mapped into it.
    owned: bool,
}

impl Region {
    /// Bytes reserved for the region; empty regions still take one byte so
    /// that every allocation has a distinct address.
    fn footprint(&self) -> u64 {
        self.size.max(1)
    }

    fn host_layout(&self) -> Option<Layout> {
        let size = usize::try_from(self.footprint()).ok()?;
        let align = usize::try_from(self.align).ok()?;
        Layout::from_size_align(size, align).ok()
    }
}

enum Backing {
    Simulated(Vec<u8>),
    Host,
}

struct Heap {
    backing: Backing,
    /// Live regions keyed by start address. Regions never overlap.
    regions: BTreeMap<u64, Region>,
}

impl Heap {
    fn is_host(&self) -> bool {
        matches!(self.backing, Backing::Host)
    }

    /// First gap in the simulated address space that fits `footprint` bytes.
    fn first_fit(&self, footprint: u64, align: u64) -> Option<u64> {
        let mut cursor = HEAP_BASE;
        for (&start, region) in &self.regions {
            let candidate = align_to(cursor, align);
            if candidate.checked_add(footprint)? <= start {
                return Some(candidate);
            }
            cursor = cursor.max(start.checked_add(region.footprint())?);
        }
        Some(align_to(cursor, align))
    }

    fn allocate(&mut self, size: u64, align: u64) -> Result<u64, MemoryError> {
        let region = Region {
            size,
            align: align.max(1),
            owned: true,
        };
        let address = if self.is_host() {
            let layout = region
                .host_layout()
                .ok_or(MemoryError::InvalidAllocation { size, align })?;
            // SAFETY: the layout has a non-zero size.
            let pointer = unsafe { std::alloc::alloc_zeroed(layout) };
            if pointer.is_null() {
                return Err(MemoryError::AllocationFailed { size });
            }
            pointer as u64
        } else {
            let address = self
                .first_fit(region.footprint(), region.align)
                .ok_or(MemoryError::AllocationOverflow { size })?;
            let start = usize::try_from(address - HEAP_BASE).map_err(|_| MemoryError::AllocationOverflow { size })?;
            let end = usize::try_from(region.footprint())
                .ok()
                .and_then(|n| start.checked_add(n))
                .ok_or(MemoryError::AllocationOverflow { size })?;
            if let Backing::Simulated(bytes) = &mut self.backing {
                if bytes.len() < end {
                    bytes.resize(end, 0);
                }
                if let Some(reused) = bytes.get_mut(start..end) {
                    reused.fill(0);
                }
            }
            address
        };
        self.regions.insert(address, region);
        Ok(address)
    }

    fn release(&mut self, address: u64) -> Result<(), MemoryError> {
        let region = self
            .regions
            .remove(&address)
            .ok_or(MemoryError::UnmappedAddress { address, len: 0 })?;
        match &mut self.backing {
            Backing::Host if region.owned => {
                if let Some(layout) = region.host_layout() {
                    // SAFETY: the region was allocated by `alloc_zeroed` with
                    // this layout and has just been removed from the map.
                    unsafe { std::alloc::dealloc(address as *mut u8, layout) };
                }
            }
            Backing::Host => {}
            Backing::Simulated(bytes) => {
                let end = self
                    .regions
                    .iter()
                    .next_back()
                    .map(|(&start, r)| start + r.footprint() - HEAP_BASE)
                    .unwrap_or_default();
                bytes.truncate(usize::try_from(end).unwrap_or(bytes.len()));
            }
        }
        Ok(())
    }

    /// Check that `[address, address + len)` lies inside one live region.
    fn check_mapped(&self, address: u64, len: u64) -> Result<(), MemoryError> {
        if address == 0 {
            return Err(MemoryError::NullAddress);
        }
        let unmapped = MemoryError::UnmappedAddress { address, len };
        let end = address.checked_add(len).ok_or(unmapped.clone())?;
        match self.regions.range(..=address).next_back() {
            Some((&start, region)) if end <= start.saturating_add(region.size) => Ok(()),
            _ => Err(unmapped),
        }
    }

    fn read(&self, address: u64, len: u64) -> Result<Vec<u8>, MemoryError> {
        self.check_mapped(address, len)?;
        let count = usize::try_from(len).map_err(|_| MemoryError::UnmappedAddress { address, len })?;
        match &self.backing {
            Backing::Host => {
                // SAFETY: the range lies inside a live region, which is either
                // an allocation of this heap or foreign memory the caller
                // vouched for in `Arena::map_foreign`.
                let bytes = unsafe { std::slice::from_raw_parts(address as *const u8, count) };
                Ok(bytes.to_vec())
            }
            Backing::Simulated(bytes) => {
                let start = usize::try_from(address - HEAP_BASE).unwrap_or(usize::MAX);
                Ok(buffer::read_slice(bytes, start, count)?.to_vec())
            }
        }
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), MemoryError> {
        self.check_mapped(address, data.len() as u64)?;
        match &mut self.backing {
            Backing::Host => {
                // SAFETY: as in `read`; the heap's write lock is held, so no
                // other access through this heap overlaps the copy.
                unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), address as *mut u8, data.len()) };
                Ok(())
            }
            Backing::Simulated(bytes) => {
                let start = usize::try_from(address - HEAP_BASE).unwrap_or(usize::MAX);
                buffer::write_slice(bytes, start, data)
            }
        }
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        if !self.is_host() {
            return;
        }
        for (&address, region) in &self.regions {
            if let (true, Some(layout)) = (region.owned, region.host_layout()) {
                // SAFETY: owned regions were allocated with this layout, and
                // the last handle to the heap is going away.
                unsafe { std::alloc::dealloc(address as *mut u8, layout) };
            }
        }
    }
}

/// A byte-addressable native heap.
///
/// Cloning yields another handle to the same heap.
#[derive(Clone)]
pub struct NativeMemory {
    heap: Arc<RwLock<Heap>>,
}

impl NativeMemory {
    fn with_backing(backing: Backing) -> Self {
        Self {
            heap: Arc::new(RwLock::new(Heap {
                backing,
                regions: BTreeMap::new(),
            })),
        }
    }

    /// A fresh simulated heap. Its addresses start at [`HEAP_BASE`] and are
    /// not valid pointers in this process.
    pub fn new() -> Self {
        Self::with_backing(Backing::Simulated(Vec::new()))
    }

    /// A fresh heap of real process memory.
    pub fn host() -> Self {
        Self::with_backing(Backing::Host)
    }

    /// The process-wide host heap used by [`Arena::new`].
    pub fn global() -> Self {
        GLOBAL_MEMORY.clone()
    }

    /// True when addresses of this heap are real pointers.
    pub fn is_host(&self) -> bool {
        self.heap.read().is_host()
    }

    /// Reserve `size` zeroed bytes aligned to `align` and return their address.
    pub fn allocate(&self, size: u64, align: u64) -> Result<u64, MemoryError> {
        self.heap.write().allocate(size, align)
    }

    /// Release the region starting at `address`. Owned memory is freed;
    /// foreign memory is only unmapped.
    pub fn free(&self, address: u64) -> Result<(), MemoryError> {
        self.heap.write().release(address)
    }

    /// Copy `len` bytes starting at `address` out of the heap.
    pub fn read(&self, address: u64, len: u64) -> Result<Vec<u8>, MemoryError> {
        self.heap.read().read(address, len)
    }

    pub fn write(&self, address: u64, data: &[u8]) -> Result<(), MemoryError> {
        self.heap.write().write(address, data)
    }

    /// True when `[address, address + len)` lies inside one live region.
    pub fn is_mapped(&self, address: u64, len: u64) -> bool {
        self.heap.read().check_mapped(address, len).is_ok()
    }

    /// Bytes held by live allocations, not counting mapped foreign memory.
    pub fn allocated_bytes(&self) -> u64 {
        self.heap
            .read()
            .regions
            .values()
            .filter(|r| r.owned)
            .map(Region::footprint)
            .sum()
    }

    /// Extent of the simulated address space in use; zero for host heaps.
    pub fn heap_size(&self) -> u64 {
        match &self.heap.read().backing {
            Backing::Simulated(bytes) => bytes.len() as u64,
            Backing::Host => 0,
        }
    }

    /// View `size` bytes at a raw `address`, owned by `scope`.
    pub fn segment(&self, address: u64, size: u64, scope: Scope) -> Result<MemorySegment, MemoryError> {
        if address == 0 {
            return Err(MemoryError::NullAddress);
        }
        Ok(MemorySegment::new(self.clone(), scope, address, size))
    }

    /// View at `address` with no upper bound other than the address space.
    ///
    /// Used when following pointers whose target extent is not known.
    pub fn unbounded(&self, address: u64) -> Result<MemorySegment, MemoryError> {
        self.segment(address, u64::MAX - address, Scope::global())
    }

    /// Make `[address, address + size)` of host memory accessible.
    ///
    /// # Safety
    ///
    /// The range must be valid for reads and writes until it is released.
    unsafe fn map_foreign(&self, address: u64, size: u64) -> Result<(), MemoryError> {
        let mut heap = self.heap.write();
        let unmapped = MemoryError::UnmappedAddress { address, len: size };
        if !heap.is_host() || address == 0 {
            return Err(unmapped);
        }
        let end = address.checked_add(size.max(1)).ok_or(unmapped.clone())?;
        let before = heap.regions.range(..=address).next_back();
        let overlaps_before = before.is_some_and(|(&start, r)| start + r.footprint() > address);
        let overlaps_after = heap.regions.range(address..end).next().is_some();
        if overlaps_before || overlaps_after {
            return Err(unmapped);
        }
        heap.regions.insert(
            address,
            Region {
                size,
                align: 1,
                owned: false,
            },
        );
        Ok(())
    }
}

impl Default for NativeMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NativeMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heap = self.heap.read();
        let kind = if heap.is_host() { "host" } else { "simulated" };
        f.debug_struct("NativeMemory")
            .field("kind", &kind)
            .field("regions", &heap.regions.len())
            .finish()
    }
}

type CloseHook = Box<dyn FnOnce() + Send>;

struct ScopeState {
    alive: AtomicBool,
    on_close: Mutex<Vec<CloseHook>>,
}

/// Validity scope shared by every segment allocated from one arena.
#[derive(Clone)]
pub struct Scope {
    state: Arc<ScopeState>,
}

impl Scope {
    fn new() -> Self {
        Self {
            state: Arc::new(ScopeState {
                alive: AtomicBool::new(true),
                on_close: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The scope that is never closed.
    pub fn global() -> Self {
        GLOBAL_SCOPE.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Acquire)
    }

    pub fn check_alive(&self) -> Result<(), MemoryError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(MemoryError::ScopeClosed)
        }
    }

    /// Run `hook` when the scope closes, or now if it already has.
    pub(crate) fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let mut hooks = self.state.on_close.lock();
            if self.is_alive() {
                hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }

    fn close(&self) {
        let hooks = {
            let mut hooks = self.state.on_close.lock();
            if !self.state.alive.swap(false, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *hooks)
        };
        for hook in hooks {
            hook();
        }
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("alive", &self.is_alive()).finish()
    }
}

/// Allocator whose segments all become inaccessible when it is closed.
///
/// Closing (or dropping) an arena runs its scope's close hooks, then
/// releases every region it allocated or mapped.
#[derive(Debug)]
pub struct Arena {
    memory: NativeMemory,
    scope: Scope,
    regions: Mutex<Vec<u64>>,
}

impl Arena {
    /// An arena over the process-wide host heap.
    pub fn new() -> Self {
        Self::with_memory(NativeMemory::global())
    }

    pub fn with_memory(memory: NativeMemory) -> Self {
        Self {
            memory,
            scope: Scope::new(),
            regions: Mutex::new(Vec::new()),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn memory(&self) -> &NativeMemory {
        &self.memory
    }

    /// Zero-initialised segment of `size` bytes aligned to `align`.
    pub fn allocate(&self, size: u64, align: u64) -> Result<MemorySegment, MemoryError> {
        self.scope.check_alive()?;
        let address = self.memory.allocate(size, align)?;
        self.regions.lock().push(address);
        Ok(MemorySegment::new(
            self.memory.clone(),
            self.scope.clone(),
            address,
            size,
        ))
    }

    pub fn allocate_layout(&self, layout: &MemoryLayout) -> Result<MemorySegment, MemoryError> {
        self.allocate(layout.byte_size(), layout.byte_alignment())
    }

    /// Segment holding a single value of `layout`.
    pub fn allocate_value(&self, layout: &ValueLayout, value: Value) -> Result<MemorySegment, MemoryError> {
        let segment = self.allocate(layout.byte_size(), layout.byte_alignment())?;
        segment.set(layout, 0, value)?;
        Ok(segment)
    }

    /// Segment holding a copy of `bytes`.
    pub fn allocate_bytes(&self, bytes: &[u8], align: u64) -> Result<MemorySegment, MemoryError> {
        let segment = self.allocate(bytes.len() as u64, align)?;
        segment.write_bytes(0, bytes)?;
        Ok(segment)
    }

    /// Segment over `size` bytes of memory this arena did not allocate, such
    /// as a pointer returned by a native function. The range is unmapped
    /// again when the arena closes.
    ///
    /// Fails on a simulated heap, and when the range overlaps memory that is
    /// already mapped.
    ///
    /// # Safety
    ///
    /// `[address, address + size)` must stay valid for reads and writes
    /// until this arena is closed.
    pub unsafe fn map_foreign(&self, address: u64, size: u64) -> Result<MemorySegment, MemoryError> {
        self.scope.check_alive()?;
        // SAFETY: forwarded from the caller.
        unsafe { self.memory.map_foreign(address, size)? };
        self.regions.lock().push(address);
        Ok(MemorySegment::new(
            self.memory.clone(),
            self.scope.clone(),
            address,
            size,
        ))
    }

    /// Close the arena. Every segment it allocated fails on access afterwards.
    pub fn close(self) {
        drop(self);
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.scope.close();
        for address in self.regions.get_mut().drain(..) {
            // Only fails if the region is already gone.
            let _ = self.memory.free(address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_aligned_and_non_null() {
        let memory = NativeMemory::new();
        let a = memory.allocate(3, 1).unwrap();
        let b = memory.allocate(8, 8).unwrap();
        assert_eq!(a, HEAP_BASE);
        assert_eq!(b % 8, 0);
        assert!(b >= a + 3);
    }

    #[test]
    fn test_null_and_unmapped_reads() {
        let memory = NativeMemory::new();
        assert_eq!(memory.read(0, 1).unwrap_err(), MemoryError::NullAddress);
        assert!(matches!(
            memory.read(HEAP_BASE, 1),
            Err(MemoryError::UnmappedAddress { .. })
        ));
        let a = memory.allocate(4, 4).unwrap();
        assert!(matches!(
            memory.read(a, 5),
            Err(MemoryError::UnmappedAddress { .. })
        ));
    }

    #[test]
    fn test_closed_arena_rejects_access() {
        let arena = Arena::with_memory(NativeMemory::new());
        let segment = arena.allocate_value(&ValueLayout::INT, Value::Int(5)).unwrap();
        assert_eq!(segment.get(&ValueLayout::INT, 0).unwrap(), Value::Int(5));
        arena.close();
        assert_eq!(
            segment.get(&ValueLayout::INT, 0).unwrap_err(),
            MemoryError::ScopeClosed
        );
    }

    #[test]
    fn test_closed_arenas_give_their_memory_back() {
        let memory = NativeMemory::new();
        let mut addresses = Vec::new();
        for _ in 0..4 {
            let arena = Arena::with_memory(memory.clone());
            addresses.push(arena.allocate(1 << 20, 16).unwrap().address());
            assert_eq!(memory.heap_size(), 1 << 20);
            arena.close();
        }
        assert!(addresses.iter().all(|a| *a == HEAP_BASE));
        assert!(!memory.is_mapped(HEAP_BASE, 1));
        assert_eq!(memory.heap_size(), 0);
        assert_eq!(memory.allocated_bytes(), 0);
    }

    #[test]
    fn test_freed_gap_is_reused_and_zeroed() {
        let memory = NativeMemory::new();
        let a = memory.allocate(16, 8).unwrap();
        let b = memory.allocate(16, 8).unwrap();
        memory.write(a, &[0xff; 16]).unwrap();
        memory.free(a).unwrap();
        let c = memory.allocate(8, 8).unwrap();
        assert_eq!(c, a);
        assert_eq!(memory.read(c, 8).unwrap(), vec![0; 8]);
        assert!(memory.is_mapped(b, 16));
        assert!(matches!(memory.free(a + 1), Err(MemoryError::UnmappedAddress { .. })));
    }

    #[test]
    fn test_host_arena_frees_on_close() {
        let memory = NativeMemory::host();
        let arena = Arena::with_memory(memory.clone());
        let segment = arena.allocate_value(&ValueLayout::LONG, Value::Long(-9)).unwrap();
        let address = segment.address();
        assert!(memory.is_host());
        assert_eq!(address % 8, 0);
        assert_eq!(memory.allocated_bytes(), 8);
        assert_eq!(segment.get(&ValueLayout::LONG, 0).unwrap(), Value::Long(-9));
        arena.close();
        assert_eq!(memory.allocated_bytes(), 0);
        assert!(!memory.is_mapped(address, 8));
    }

    #[test]
    fn test_foreign_memory_is_mapped_for_the_arena_lifetime() {
        let mut backing = vec![1u8, 2, 3, 4];
        let address = backing.as_mut_ptr() as u64;
        let memory = NativeMemory::host();
        let arena = Arena::with_memory(memory.clone());
        let segment = unsafe { arena.map_foreign(address, 4) }.unwrap();
        assert_eq!(segment.to_bytes().unwrap(), vec![1, 2, 3, 4]);
        segment.write_bytes(3, &[9]).unwrap();
        assert!(unsafe { arena.map_foreign(address + 2, 4) }.is_err());
        assert_eq!(memory.allocated_bytes(), 0);
        arena.close();
        assert!(!memory.is_mapped(address, 4));
        assert_eq!(backing, vec![1, 2, 3, 9]);

        let simulated = Arena::with_memory(NativeMemory::new());
        assert!(unsafe { simulated.map_foreign(address, 4) }.is_err());
    }

    #[test]
    fn test_close_hooks_run_once() {
        let arena = Arena::with_memory(NativeMemory::new());
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        arena.scope().on_close(move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        });
        let scope = arena.scope().clone();
        arena.close();
        scope.close();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        let late = Arc::clone(&count);
        scope.on_close(move || {
            late.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_global_scope_is_shared() {
        assert_eq!(Scope::global(), Scope::global());
        assert!(Scope::global().is_alive());
    }
}
