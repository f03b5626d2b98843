//! Downcall and upcall bridges.
//!
//! A [`Linker`] is the context object for one platform: it owns the ABI
//! choice, the calling sequence cache, the upcall stub registry and the
//! [`NativeInvoker`] that performs the machine-level transition. Create one
//! at startup and pass it to the code that needs native calls.
//!
//! A linker for the host platform calls real native code through
//! [`HostInvoker`], and its upcall stubs are native function pointers.
//! [`Linker::loopback`] builds a linker for any platform whose downcalls
//! can only reach its own upcall stubs, which exercises every ABI's
//! register and stack assignment without native code.
//!
//! # Example
//!
//! ```ignore
//! let linker = Linker::loopback(Platform::new(Arch::S390x, Os::Linux))?;
//! let arena = Arena::new();
//! let add = linker.upcall_stub(
//!     |args, _| Some(Value::Int(args[0].as_i64()? as i32 + args[1].as_i64()? as i32)),
//!     &"(i4i4)i4".parse()?,
//!     &arena,
//! )?;
//! let handle = linker.downcall_handle(&"(i4i4)i4".parse()?, &LinkerOptions::default())?;
//! assert_eq!(handle.invoke(add.address(), &arena, &[1.into(), 2.into()])?, Some(Value::Int(3)));
//! ```

mod downcall;
mod error;
mod frame;
mod host;
mod upcall;

pub use downcall::DowncallHandle;
pub use error::LinkerError;
pub use frame::CallFrame;
pub use host::HostInvoker;
pub use upcall::{UPCALL_STUB_BASE, UpcallDispatcher, UpcallStub, UpcallTarget};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::abi::{Abi, CallingSequence, FunctionDescriptor, LinkerOptions, Platform};
use crate::config::{Config, LookupConfig};
use crate::logging::{debug, info, warn};
use crate::lookup::{DynamicLibraryLoader, SystemLookup};
use crate::memory::{Arena, Value};

use upcall::UpcallRegistry;

/// Performs the actual transfer of control to native code.
///
/// The frame holds every argument register and the outgoing stack area on
/// entry; the invoker writes the return registers back into it. `arena` is
/// the memory the caller marshalled struct copies and return buffers into.
pub trait NativeInvoker: Send + Sync {
    fn invoke(
        &self,
        target: u64,
        sequence: &CallingSequence,
        frame: &mut CallFrame,
        arena: &Arena,
    ) -> Result<(), LinkerError>;
}

type SequenceKey = (FunctionDescriptor, LinkerOptions);

/// Foreign function linker for one platform.
pub struct Linker {
    platform: Platform,
    abi: Abi,
    cache_sequences: bool,
    sequences: Mutex<HashMap<SequenceKey, Arc<CallingSequence>>>,
    invoker: Arc<dyn NativeInvoker>,
    /// Upcall stubs are libffi closures rather than synthetic addresses.
    native_stubs: bool,
    upcalls: UpcallRegistry,
    lookup: LookupConfig,
}

impl Linker {
    /// A linker for `platform`. On the host platform downcalls reach real
    /// native code; elsewhere this is [`Linker::loopback`].
    pub fn new(platform: Platform) -> Result<Self, LinkerError> {
        let mut linker = Self::loopback(platform)?;
        if Platform::host() == Some(platform) {
            match HostInvoker::new() {
                Ok(host) => {
                    linker.invoker = Arc::new(host);
                    linker.native_stubs = true;
                    info!(%platform, "linker calls native code");
                }
                Err(_err) => {
                    warn!(error = %_err, "host calls unavailable, using loopback");
                }
            }
        }
        Ok(linker)
    }

    /// A linker for `platform` whose downcalls can only reach its own
    /// upcall stubs.
    pub fn loopback(platform: Platform) -> Result<Self, LinkerError> {
        let abi = Abi::for_platform(platform)?;
        let upcalls = UpcallRegistry::new();
        info!(%platform, %abi, "linker created");
        Ok(Self {
            platform,
            abi,
            cache_sequences: true,
            sequences: Mutex::new(HashMap::new()),
            invoker: Arc::new(UpcallDispatcher::new(upcalls.clone())),
            native_stubs: false,
            upcalls,
            lookup: LookupConfig::default(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, crate::Error> {
        let mut linker = Self::new(config.platform()?)?;
        linker.cache_sequences = config.linker.cache_sequences;
        linker.lookup = config.lookup.clone();
        Ok(linker)
    }

    /// Replace the invoker used by downcall handles created afterwards.
    pub fn with_invoker(mut self, invoker: Arc<dyn NativeInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    /// The loopback invoker over this linker's upcall stubs.
    pub fn upcall_dispatcher(&self) -> UpcallDispatcher {
        UpcallDispatcher::new(self.upcalls.clone())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn abi(&self) -> Abi {
        self.abi
    }

    /// True when downcalls reach real native code.
    pub fn is_native(&self) -> bool {
        self.native_stubs
    }

    /// The calling sequence for a signature, arranged once and then shared.
    pub fn calling_sequence(
        &self,
        descriptor: &FunctionDescriptor,
        options: &LinkerOptions,
    ) -> Result<Arc<CallingSequence>, LinkerError> {
        if !self.cache_sequences {
            return Ok(Arc::new(self.abi.arrange(descriptor, options)?));
        }
        let key = (descriptor.clone(), *options);
        if let Some(sequence) = self.sequences.lock().get(&key) {
            debug!(%descriptor, "calling sequence cache hit");
            return Ok(Arc::clone(sequence));
        }
        // Arrange outside the lock; a racing thread may arrange the same
        // signature, and the first insertion wins.
        let sequence = Arc::new(self.abi.arrange(descriptor, options)?);
        debug!(abi = %self.abi, %descriptor, stack = sequence.stack_size(), "arranged calling sequence");
        Ok(Arc::clone(self.sequences.lock().entry(key).or_insert(sequence)))
    }

    /// A bridge for calling native functions of this signature.
    pub fn downcall_handle(
        &self,
        descriptor: &FunctionDescriptor,
        options: &LinkerOptions,
    ) -> Result<DowncallHandle, LinkerError> {
        let sequence = self.calling_sequence(descriptor, options)?;
        Ok(DowncallHandle::new(sequence, Arc::clone(&self.invoker)))
    }

    /// A native function pointer that calls `target`. The stub stays valid
    /// until `arena` is closed; a native stub is freed then, and calling it
    /// afterwards is undefined behaviour.
    pub fn upcall_stub<F>(&self, target: F, descriptor: &FunctionDescriptor, arena: &Arena) -> Result<UpcallStub, LinkerError>
    where
        F: Fn(&[Value], &Arena) -> Option<Value> + Send + Sync + 'static,
    {
        arena.scope().check_alive()?;
        let sequence = self.calling_sequence(descriptor, &LinkerOptions::default())?;
        let stub = self.upcalls.register(sequence, Arc::new(target), arena, self.native_stubs)?;
        debug!(address = stub.address(), %descriptor, "upcall stub created");
        Ok(stub)
    }

    /// Number of upcall stubs whose arena is still open.
    pub fn upcall_stub_count(&self) -> usize {
        self.upcalls.len()
    }

    /// Symbols of the platform's C library.
    pub fn default_lookup(&self) -> SystemLookup {
        SystemLookup::new(self.platform, &self.lookup, &DynamicLibraryLoader)
    }

    /// Number of cached calling sequences.
    pub fn cached_sequences(&self) -> usize {
        self.sequences.lock().len()
    }
}

impl std::fmt::Debug for Linker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linker")
            .field("platform", &self.platform)
            .field("abi", &self.abi)
            .field("cache_sequences", &self.cache_sequences)
            .field("native", &self.native_stubs)
            .finish()
    }
}
