//! Lock-free SPSC ring channel for moving samples between threads
//!
//! A fixed-capacity queue with one producer and one consumer. It carries
//! bulk sample data (host I/O thread ↔ audio thread) where a per-element
//! command queue would be too coarse.
//!
//! # Memory Ordering
//!
//! Each side owns one cursor and only ever reads the other side's cursor:
//!
//! - `write` copies data into free slots, then publishes the advanced write
//!   cursor with a **Release** store. `read` loads the write cursor with
//!   **Acquire**, so every slot covered by that cursor is visible before
//!   the consumer touches it.
//! - `read` copies data out, then publishes the advanced read cursor with a
//!   **Release** store. `write` loads the read cursor with **Acquire**, so
//!   the consumer has finished with freed slots before the producer reuses them.
//! - A side's own cursor is loaded **Relaxed**: nobody else stores to it.
//!
//! # Real-Time Safety
//!
//! - **No allocations**: storage is allocated once by [`ring_channel`]
//! - **Wait-free**: `write`, `read` and `available` are a bounded number of
//!   atomic operations plus at most two `memcpy`s, with no retry loops
//! - **Single-producer single-consumer**: enforced by the type system, since
//!   neither half is `Clone` and both transfer methods take `&mut self`
//!
//! # Usage
//!
//! ```ignore
//! let (mut tx, mut rx) = ring_channel::<f32>(8192)?;
//!
//! // Producer thread
//! let written = tx.write(&input_block);
//!
//! // Consumer thread (audio callback)
//! let read = rx.read(&mut output_block);
//! ```

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;

use crate::error::{EngineError, EngineResult};

/// Storage and cursors shared by both halves
///
/// Cursors increase monotonically (wrapping at `usize::MAX`) and are mapped
/// into the buffer with `mask`. One slot always stays empty, so at most
/// `capacity - 1` elements are live and `write == read` means empty.
struct RingInner<T> {
    write_pos: CachePadded<AtomicUsize>,
    read_pos: CachePadded<AtomicUsize>,
    buffer: Box<[UnsafeCell<T>]>,
    mask: usize,
}

// SAFETY: the producer only writes slots outside [read, write) and the
// consumer only reads slots inside it; the acquire/release pairs on the
// cursors order those accesses. T: Send because elements move between threads.
unsafe impl<T: Send> Sync for RingInner<T> {}

impl<T: Copy> RingInner<T> {
    #[inline]
    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    fn base_ptr(&self) -> *mut T {
        UnsafeCell::raw_get(self.buffer.as_ptr())
    }

    #[inline]
    fn occupied(&self, write: usize, read: usize) -> usize {
        write.wrapping_sub(read) & self.mask
    }

    /// Copy `src` into the buffer starting at `start`, wrapping at the end
    ///
    /// # Safety
    /// The `src.len()` slots from `start` must be free (owned by the producer).
    #[inline]
    unsafe fn copy_in(&self, start: usize, src: &[T]) {
        let tail = src.len().min(self.capacity() - start);
        let base = self.base_ptr();
        std::ptr::copy_nonoverlapping(src.as_ptr(), base.add(start), tail);
        std::ptr::copy_nonoverlapping(src.as_ptr().add(tail), base, src.len() - tail);
    }

    /// Copy `dst.len()` elements out of the buffer starting at `start`
    ///
    /// # Safety
    /// The `dst.len()` slots from `start` must be live (owned by the consumer).
    #[inline]
    unsafe fn copy_out(&self, start: usize, dst: &mut [T]) {
        let tail = dst.len().min(self.capacity() - start);
        let base = self.base_ptr();
        std::ptr::copy_nonoverlapping(base.add(start), dst.as_mut_ptr(), tail);
        std::ptr::copy_nonoverlapping(base, dst.as_mut_ptr().add(tail), dst.len() - tail);
    }
}

/// Create a ring channel with `capacity` slots
///
/// `capacity` must be a power of two and at least 2; `capacity - 1`
/// elements can be queued at once. Allocates, so call this before the
/// audio thread starts.
pub fn ring_channel<T: Copy + Default + Send>(
    capacity: usize,
) -> EngineResult<(RingProducer<T>, RingConsumer<T>)> {
    if capacity < 2 || !capacity.is_power_of_two() {
        return Err(EngineError::InvalidRingCapacity(capacity));
    }

    let buffer: Box<[UnsafeCell<T>]> = (0..capacity).map(|_| UnsafeCell::new(T::default())).collect();
    let inner = Arc::new(RingInner {
        write_pos: CachePadded::new(AtomicUsize::new(0)),
        read_pos: CachePadded::new(AtomicUsize::new(0)),
        buffer,
        mask: capacity - 1,
    });

    Ok((
        RingProducer {
            inner: Arc::clone(&inner),
        },
        RingConsumer { inner },
    ))
}

/// Writing half of a ring channel
pub struct RingProducer<T> {
    inner: Arc<RingInner<T>>,
}

impl<T: Copy> RingProducer<T> {
    /// Copy as many elements of `data` as fit, returning the count written
    ///
    /// Never blocks. A short count means the channel was full; the unwritten
    /// tail of `data` is left to the caller.
    pub fn write(&mut self, data: &[T]) -> usize {
        let inner = &*self.inner;
        let write = inner.write_pos.load(Ordering::Relaxed);
        // Acquire: pairs with the consumer's Release in `read`
        let read = inner.read_pos.load(Ordering::Acquire);

        let free = read.wrapping_sub(write).wrapping_sub(1) & inner.mask;
        let count = data.len().min(free);
        if count == 0 {
            return 0;
        }

        // SAFETY: `count <= free`, so every target slot is outside the live range
        unsafe { inner.copy_in(write & inner.mask, &data[..count]) };

        // Release: publishes the copied slots to the consumer's Acquire in `read`
        inner
            .write_pos
            .store(write.wrapping_add(count), Ordering::Release);
        count
    }

    /// Number of elements that can be written right now
    pub fn free_space(&self) -> usize {
        let inner = &*self.inner;
        let write = inner.write_pos.load(Ordering::Relaxed);
        let read = inner.read_pos.load(Ordering::Acquire);
        read.wrapping_sub(write).wrapping_sub(1) & inner.mask
    }

    /// Number of elements currently queued
    pub fn available(&self) -> usize {
        let inner = &*self.inner;
        let write = inner.write_pos.load(Ordering::Relaxed);
        let read = inner.read_pos.load(Ordering::Acquire);
        inner.occupied(write, read)
    }

    /// Total slot count (one more than the usable capacity)
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

/// Reading half of a ring channel
pub struct RingConsumer<T> {
    inner: Arc<RingInner<T>>,
}

impl<T: Copy> RingConsumer<T> {
    /// Copy up to `dest.len()` queued elements into `dest`, returning the count read
    ///
    /// Never blocks. Elements come out in the order they were written;
    /// `dest[count..]` is left untouched.
    pub fn read(&mut self, dest: &mut [T]) -> usize {
        let inner = &*self.inner;
        let read = inner.read_pos.load(Ordering::Relaxed);
        // Acquire: pairs with the producer's Release in `write`
        let write = inner.write_pos.load(Ordering::Acquire);

        let count = dest.len().min(inner.occupied(write, read));
        if count == 0 {
            return 0;
        }

        // SAFETY: `count <= occupied`, so every source slot is live
        unsafe { inner.copy_out(read & inner.mask, &mut dest[..count]) };

        // Release: hands the slots back to the producer's Acquire in `write`
        inner
            .read_pos
            .store(read.wrapping_add(count), Ordering::Release);
        count
    }

    /// Number of elements currently queued
    pub fn available(&self) -> usize {
        let inner = &*self.inner;
        let read = inner.read_pos.load(Ordering::Relaxed);
        let write = inner.write_pos.load(Ordering::Acquire);
        inner.occupied(write, read)
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Total slot count (one more than the usable capacity)
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_capacity_four_holds_three() {
        let (mut tx, mut rx) = ring_channel::<i32>(4).unwrap();

        assert_eq!(tx.write(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(rx.available(), 3);

        let mut out = [0; 5];
        assert_eq!(rx.read(&mut out), 3);
        assert_eq!(&out[..3], &[1, 2, 3]);
        assert_eq!(rx.available(), 0);
    }

    #[test]
    fn test_invalid_capacity() {
        for capacity in [0, 1, 3, 6, 100] {
            assert_eq!(
                ring_channel::<f32>(capacity).err(),
                Some(EngineError::InvalidRingCapacity(capacity)),
                "capacity {} should be rejected",
                capacity
            );
        }
        assert!(ring_channel::<f32>(2).is_ok());
    }

    #[test]
    fn test_empty_read_and_full_write() {
        let (mut tx, mut rx) = ring_channel::<f32>(8).unwrap();

        let mut out = [9.0; 4];
        assert_eq!(rx.read(&mut out), 0);
        assert_eq!(out, [9.0; 4], "empty read must leave destination untouched");

        assert_eq!(tx.write(&[1.0; 7]), 7);
        assert_eq!(tx.free_space(), 0);
        assert_eq!(tx.write(&[2.0]), 0);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let (mut tx, mut rx) = ring_channel::<u32>(8).unwrap();
        let mut out = [0u32; 8];

        // Advance the cursors so the next write straddles the buffer end
        assert_eq!(tx.write(&[0, 1, 2, 3, 4]), 5);
        assert_eq!(rx.read(&mut out[..5]), 5);

        assert_eq!(tx.write(&[10, 11, 12, 13, 14, 15]), 6);
        assert_eq!(rx.read(&mut out[..6]), 6);
        assert_eq!(&out[..6], &[10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_interleaved_fifo_never_exceeds_capacity() {
        let (mut tx, mut rx) = ring_channel::<u32>(16).unwrap();
        let mut next_write = 0u32;
        let mut next_read = 0u32;
        let mut total_written = 0usize;
        let mut total_read = 0usize;
        let mut seed = 0x1234_5678u32;

        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let write_len = (seed >> 24) as usize % 11;
            let read_len = (seed >> 16) as usize % 9;

            let data: Vec<u32> = (0..write_len as u32).map(|i| next_write + i).collect();
            let written = tx.write(&data);
            next_write += written as u32;
            total_written += written;
            assert!(tx.available() <= tx.capacity() - 1);

            let mut out = vec![0u32; read_len];
            let read = rx.read(&mut out);
            for &value in &out[..read] {
                assert_eq!(value, next_read, "FIFO order violated");
                next_read += 1;
            }
            total_read += read;
            assert!(total_read <= total_written);
            assert!(rx.available() <= rx.capacity() - 1);
        }
    }

    #[test]
    fn test_threaded_transfer() {
        const TOTAL: u32 = 200_000;
        let (mut tx, mut rx) = ring_channel::<u32>(256).unwrap();

        let producer = thread::spawn(move || {
            let mut next = 0u32;
            let mut chunk = [0u32; 37];
            while next < TOTAL {
                let len = chunk.len().min((TOTAL - next) as usize);
                for (i, slot) in chunk[..len].iter_mut().enumerate() {
                    *slot = next + i as u32;
                }
                let written = tx.write(&chunk[..len]);
                next += written as u32;
                if written == 0 {
                    thread::yield_now();
                }
            }
        });

        let mut expected = 0u32;
        let mut out = [0u32; 64];
        while expected < TOTAL {
            let read = rx.read(&mut out);
            for &value in &out[..read] {
                assert_eq!(value, expected);
                expected += 1;
            }
            if read == 0 {
                thread::yield_now();
            }
        }

        producer.join().unwrap();
        assert!(rx.is_empty());
    }
}
