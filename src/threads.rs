
//! Worker threads for compressing and decompressing blocks of pixels.
//!
//! Each file captures a pool when it is opened. By default, this is the process-wide pool,
//! configured with `set_global_thread_count`. Stream access and the transfer
//! of pixels to the frame buffer always happen on the calling thread.

use crate::error::{Error, UnitResult, Result};

#[cfg(feature = "rayon")]
use std::sync::{Arc, Mutex, PoisonError};


/// A set of threads that compress or decompress blocks.
/// Without threads, all work happens on the calling thread.
#[derive(Clone, Debug, Default)]
pub struct WorkerPool {
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon_core::ThreadPool>>,
}

#[cfg(feature = "rayon")]
static GLOBAL_POOL: Mutex<Option<WorkerPool>> = Mutex::new(None);


/// Configure the number of worker threads that files opened afterwards will use.
/// Zero means that all work happens on the calling thread.
/// Files that are already open keep their threads.
///
/// Calls from different threads are serialized, but a file opened concurrently
/// may observe either the previous or the new setting.
pub fn set_global_thread_count(count: usize) -> UnitResult {
    validate_thread_count(count)?;

    #[cfg(feature = "rayon")] {
        let pool = WorkerPool::new(count)?;
        *GLOBAL_POOL.lock().unwrap_or_else(PoisonError::into_inner) = Some(pool);
        tracing::debug!(count, "configured global worker threads");
        Ok(())
    }

    #[cfg(not(feature = "rayon"))] {
        if count == 0 { Ok(()) }
        else { Err(Error::unsupported("worker threads require the `rayon` feature")) }
    }
}

fn validate_thread_count(count: usize) -> UnitResult {
    if count > i32::MAX as usize {
        Err(Error::invalid(format!("thread count {} is too large", count)))
    }
    else {
        Ok(())
    }
}


impl WorkerPool {

    /// A pool with the specified number of threads.
    /// Zero threads means that all work happens on the calling thread.
    pub fn new(thread_count: usize) -> Result<Self> {
        validate_thread_count(thread_count)?;

        if thread_count == 0 {
            return Ok(Self::sequential());
        }

        #[cfg(feature = "rayon")] {
            let pool = rayon_core::ThreadPoolBuilder::new()
                .num_threads(thread_count)
                .thread_name(|index| format!("exr-bridge worker {}", index))
                .build()
                .map_err(|error| Error::invalid(format!("cannot start worker threads: {}", error)))?;

            Ok(WorkerPool { pool: Some(Arc::new(pool)) })
        }

        #[cfg(not(feature = "rayon"))] {
            Err(Error::unsupported("worker threads require the `rayon` feature"))
        }
    }

    /// Do all work on the calling thread.
    pub fn sequential() -> Self {
        Self::default()
    }

    /// The pool configured by `set_global_thread_count`.
    /// Before the first configuration, this is sequential.
    pub fn global() -> Self {
        #[cfg(feature = "rayon")] {
            GLOBAL_POOL.lock().unwrap_or_else(PoisonError::into_inner)
                .clone().unwrap_or_default()
        }

        #[cfg(not(feature = "rayon"))] {
            Self::sequential()
        }
    }

    /// Number of worker threads. Zero if all work happens on the calling thread.
    pub fn thread_count(&self) -> usize {
        #[cfg(feature = "rayon")] {
            self.pool.as_ref().map_or(0, |pool| pool.current_num_threads())
        }

        #[cfg(not(feature = "rayon"))] {
            0
        }
    }

    /// How many blocks should be processed together to keep all threads busy.
    pub(crate) fn batch_size(&self) -> usize {
        (self.thread_count() * 2).max(1)
    }

    /// Apply the function to each item, possibly on multiple threads.
    /// The results are in the order of the items.
    pub(crate) fn map<T: Send, R: Send>(&self, items: Vec<T>, function: impl Sync + Fn(T) -> R) -> Vec<R> {
        #[cfg(feature = "rayon")] {
            if let Some(pool) = self.pool.as_ref().filter(|_| items.len() > 1) {
                return map_in_pool(pool, items, function);
            }
        }

        items.into_iter().map(function).collect()
    }
}

#[cfg(feature = "rayon")]
fn map_in_pool<T: Send, R: Send>(pool: &rayon_core::ThreadPool, items: Vec<T>, function: impl Sync + Fn(T) -> R) -> Vec<R> {
    let function = &function;
    let mut results: Vec<Option<R>> = items.iter().map(|_| None).collect();

    pool.scope(|scope| {
        for (item, result) in items.into_iter().zip(results.iter_mut()) {
            scope.spawn(move |_| *result = Some(function(item)));
        }
    });

    // the scope only returns after every spawned closure has completed
    results.into_iter().flatten().collect()
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn too_many_threads(){
        let count = i32::MAX as usize + 1;
        assert!(matches!(WorkerPool::new(count), Err(Error::Invalid(_))));
        assert!(set_global_thread_count(count).is_err());
    }

    #[test]
    fn sequential_map_keeps_order(){
        let pool = WorkerPool::sequential();
        assert_eq!(pool.thread_count(), 0);
        assert_eq!(pool.batch_size(), 1);
        assert_eq!(pool.map(vec![1, 2, 3], |value| value * 10), vec![10, 20, 30]);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_map_keeps_order(){
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.thread_count(), 3);

        let items: Vec<u64> = (0 .. 100).collect();
        let results = pool.map(items, |value| value * value);
        assert_eq!(results, (0 .. 100_u64).map(|value| value * value).collect::<Vec<_>>());
    }
}
