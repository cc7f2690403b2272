//! RT-safe garbage collection for engine resources
//!
//! A global `basedrop` collector runs on its own thread. Resources created
//! with [`gc_handle`] (such as a replacement `Convolver` wrapped in
//! `basedrop::Owned`) are not freed where they are dropped: the drop only
//! enqueues the pointer, and the collector thread releases the memory later.
//! This keeps `free` off the audio thread when an impulse response is swapped.
//!
//! ```ignore
//! use basedrop::Owned;
//! use lowlat_core::engine::gc::gc_handle;
//!
//! let convolver = Owned::new(&gc_handle()?, Convolver::new(&ir, 512)?);
//! // Dropped on the audio thread, freed on the GC thread
//! drop(convolver);
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// How often the collector thread reclaims deferred drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to the collector, or `None` if its thread failed to start
static GC_HANDLE: OnceLock<Option<Handle>> = OnceLock::new();

/// Spawn the collector thread and wait for its handle
fn init_gc() -> Option<Handle> {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it is created and kept on this thread
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }

            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    if let Err(e) = spawned {
        log::error!("Failed to spawn audio GC thread: {}", e);
        return None;
    }

    rx.recv().ok()
}

/// Get a handle for creating `Owned<T>` / `Shared<T>` allocations
///
/// The collector thread is started on first use.
pub fn gc_handle() -> EngineResult<Handle> {
    GC_HANDLE
        .get_or_init(init_gc)
        .clone()
        .ok_or(EngineError::CollectorUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Owned;

    #[test]
    fn test_handle_is_available() {
        let first = gc_handle();
        let second = gc_handle();
        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[test]
    fn test_owned_value_usable_and_droppable() {
        let handle = gc_handle().unwrap();
        let mut buffer = Owned::new(&handle, vec![0.0f32; 4096]);
        buffer[10] = 1.0;
        assert_eq!(buffer.iter().sum::<f32>(), 1.0);
        drop(buffer);
    }
}
