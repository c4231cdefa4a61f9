/*!
 * Shared test doubles
 */

#![allow(dead_code)]

use mempressure::{Bytes, ProcessMemory, UsageSource};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Replays a scripted series of process readings; the last one repeats
#[derive(Default)]
pub struct SequenceSource {
    process: Mutex<VecDeque<Bytes>>,
    last: Mutex<Bytes>,
    gpu: Bytes,
    footprint: Mutex<VecDeque<Bytes>>,
    pub process_reads: AtomicUsize,
    pub gpu_reads: AtomicUsize,
}

impl SequenceSource {
    pub fn new(process: &[Bytes]) -> Arc<Self> {
        Arc::new(Self {
            process: Mutex::new(process.iter().copied().collect()),
            ..Default::default()
        })
    }

    pub fn with_gpu(process: &[Bytes], gpu: Bytes) -> Arc<Self> {
        Arc::new(Self {
            process: Mutex::new(process.iter().copied().collect()),
            gpu,
            ..Default::default()
        })
    }

    pub fn with_footprints(process: &[Bytes], footprints: &[Bytes]) -> Arc<Self> {
        Arc::new(Self {
            process: Mutex::new(process.iter().copied().collect()),
            footprint: Mutex::new(footprints.iter().copied().collect()),
            ..Default::default()
        })
    }

    pub fn process_reads(&self) -> usize {
        self.process_reads.load(Ordering::SeqCst)
    }

    pub fn gpu_reads(&self) -> usize {
        self.gpu_reads.load(Ordering::SeqCst)
    }
}

impl UsageSource for SequenceSource {
    fn sample_process_memory(&self) -> ProcessMemory {
        self.process_reads.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock();
        if let Some(next) = self.process.lock().pop_front() {
            *last = next;
        }
        ProcessMemory {
            resident_bytes: *last,
            swap_bytes: 0,
        }
    }

    fn sample_gpu_memory(&self) -> Bytes {
        self.gpu_reads.fetch_add(1, Ordering::SeqCst);
        self.gpu
    }

    fn sample_footprint(&self) -> Bytes {
        self.footprint.lock().pop_front().unwrap_or(0)
    }
}
