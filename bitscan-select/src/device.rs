/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The execution substrate for the selection kernel.
//!
//! A [`Device`] owns a Rayon thread pool that plays the role of an accelerator's grid of
//! execution groups. A [`Stream`] is an in-order queue of launches against a device:
//! launching returns a [`Pending`] handle immediately, and the host observes completion by
//! calling [`Stream::synchronize`] or [`Pending::wait`].

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::JoinHandle,
};

use rayon::ThreadPool;

use crate::{
    config::{DeviceConfig, LaunchConfig},
    kernel::{self, TopK},
    matrix::{DeviceMatrix, DeviceVector, MatrixView},
    SelectError,
};

////////////
// Device //
////////////

/// A pool of worker threads on which kernels execute.
#[derive(Debug, Clone)]
pub struct Device {
    pool: Arc<ThreadPool>,
    config: DeviceConfig,
}

impl Device {
    /// Start a device with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::DeviceUnavailable`] if the worker threads cannot be started.
    pub fn new(config: DeviceConfig) -> Result<Self, SelectError> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("bitscan-device-{i}"));
        if let Some(num_threads) = config.num_threads {
            builder = builder.num_threads(num_threads.get());
        }

        let pool = builder
            .build()
            .map_err(|err| SelectError::DeviceUnavailable(err.to_string()))?;

        tracing::debug!(
            num_threads = pool.current_num_threads(),
            lanes = config.launch.lanes().get(),
            tile = config.launch.tile().get(),
            "device started"
        );

        Ok(Self {
            pool: Arc::new(pool),
            config,
        })
    }

    /// Return the number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Return the configuration the device was started with.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Run [`kernel::fused_bias_topk`] on the device and block until it completes.
    pub fn fused_bias_topk(
        &self,
        distances: MatrixView<'_, f32>,
        bias: &[f32],
        k: usize,
    ) -> Result<TopK, SelectError> {
        let launch = self.config.launch;
        self.pool
            .install(|| kernel::fused_bias_topk(distances, bias, k, &launch))
    }

    /// Create a new stream on this device.
    pub fn stream(&self) -> Result<Stream, SelectError> {
        Stream::new(self)
    }
}

////////////
// Stream //
////////////

type Job = Box<dyn FnOnce() + Send>;

struct Progress {
    inflight: usize,
    error: Option<SelectError>,
}

struct StreamState {
    progress: Mutex<Progress>,
    idle: Condvar,
}

impl StreamState {
    // Jobs never panic while holding the lock, but a poisoned lock would still hold a
    // consistent `Progress`.
    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Retire one launch. Only the first error since the last synchronize is retained.
    fn finish(&self, error: Option<SelectError>) {
        let mut progress = self.lock();
        if progress.error.is_none() {
            progress.error = error;
        }
        progress.inflight -= 1;
        if progress.inflight == 0 {
            self.idle.notify_all();
        }
    }
}

/// An in-order queue of kernel launches.
///
/// Launches execute one after another in submission order, each using the whole device.
/// Dropping a stream blocks until every launch already submitted has completed.
pub struct Stream {
    sender: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    state: Arc<StreamState>,
    pool: Arc<ThreadPool>,
    launch: LaunchConfig,
}

impl Stream {
    /// Create a stream on `device`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::DeviceUnavailable`] if the stream's worker cannot be spawned.
    pub fn new(device: &Device) -> Result<Self, SelectError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = std::thread::Builder::new()
            .name("bitscan-stream".into())
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })
            .map_err(|err| SelectError::DeviceUnavailable(err.to_string()))?;

        tracing::debug!("stream created");
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            state: Arc::new(StreamState {
                progress: Mutex::new(Progress {
                    inflight: 0,
                    error: None,
                }),
                idle: Condvar::new(),
            }),
            pool: Arc::clone(&device.pool),
            launch: device.config.launch,
        })
    }

    /// Enqueue `kernel` and return a handle to its result.
    ///
    /// The kernel runs inside the device pool with the stream's launch configuration. A
    /// panic in the kernel is reported as [`SelectError::LaunchFailed`].
    pub(crate) fn launch<T, F>(&self, kernel: F) -> Result<Pending<T>, SelectError>
    where
        T: Send + 'static,
        F: FnOnce(&LaunchConfig) -> Result<T, SelectError> + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(SelectError::StreamClosed)?;
        let (result_sender, receiver) = mpsc::sync_channel(1);
        let state = Arc::clone(&self.state);
        let pool = Arc::clone(&self.pool);
        let launch = self.launch;

        let job: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(|| pool.install(|| kernel(&launch))))
                .unwrap_or_else(|payload| Err(SelectError::from_panic(payload)));

            let error = result.as_ref().err().cloned();
            if let Some(err) = &error {
                tracing::debug!(%err, "launch failed");
            }

            // The caller is free to drop its `Pending` without waiting.
            let _ = result_sender.send(result);
            state.finish(error);
        });

        self.state.lock().inflight += 1;
        if sender.send(job).is_err() {
            self.state.finish(None);
            return Err(SelectError::StreamClosed);
        }
        Ok(Pending { receiver })
    }

    /// Block until every launch submitted so far has completed.
    ///
    /// # Errors
    ///
    /// Returns the first execution error raised by a launch since the previous call to
    /// `synchronize`. The error is cleared once reported.
    pub fn synchronize(&self) -> Result<(), SelectError> {
        let guard = self.state.lock();
        let mut progress = self
            .state
            .idle
            .wait_while(guard, |progress| progress.inflight != 0)
            .unwrap_or_else(PoisonError::into_inner);

        match progress.error.take() {
            Some(err) => {
                tracing::debug!(%err, "stream synchronized with error");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain its queue and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("stream worker exited abnormally");
            }
        }
        tracing::debug!("stream destroyed");
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("inflight", &self.state.lock().inflight)
            .field("launch", &self.launch)
            .finish()
    }
}

/// The eventual result of a launch.
#[derive(Debug)]
#[must_use = "a pending launch does nothing unless waited on or synchronized"]
pub struct Pending<T> {
    receiver: mpsc::Receiver<Result<T, SelectError>>,
}

impl<T> Pending<T> {
    /// Block until the launch completes and return its result.
    pub fn wait(self) -> Result<T, SelectError> {
        self.receiver
            .recv()
            .unwrap_or(Err(SelectError::StreamClosed))
    }
}

////////////
// Select //
////////////

/// Launch the fused bias-add + top-k kernel on `stream`.
///
/// Arguments are validated before anything is enqueued. The inputs are shared with the
/// launch and cannot change until it completes.
///
/// # Errors
///
/// Returns [`SelectError::InvalidArgument`] immediately if `k` is zero, if `k` exceeds the
/// number of columns of `distances`, or if `bias` does not have one entry per column.
/// Execution errors are reported by [`Stream::synchronize`] and [`Pending::wait`].
pub fn select(
    stream: &Stream,
    distances: &DeviceMatrix,
    bias: &DeviceVector,
    k: usize,
) -> Result<Pending<TopK>, SelectError> {
    kernel::check_arguments(distances.ncols(), bias.len(), k)?;

    let distances = distances.clone();
    let bias = bias.clone();
    stream.launch(move |config| {
        kernel::fused_bias_topk(distances.view(), bias.as_slice(), k, config)
    })
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn device() -> Device {
        let launch = LaunchConfig::builder().lanes(4).tile(8).build().unwrap();
        Device::new(DeviceConfig::new(NonZeroUsize::new(2), launch)).unwrap()
    }

    fn random_matrix(rng: &mut StdRng, nrows: usize, ncols: usize) -> DeviceMatrix {
        let data: Vec<f32> = (0..nrows * ncols)
            .map(|_| rng.random_range(0..50) as f32)
            .collect();
        DeviceMatrix::try_from(data, nrows, ncols).unwrap()
    }

    #[test]
    fn device_threads() {
        let device = device();
        assert_eq!(device.num_threads(), 2);
        assert_eq!(device.config().launch.lanes().get(), 4);
    }

    #[test]
    fn select_example() {
        let device = device();
        let stream = device.stream().unwrap();

        let distances = DeviceMatrix::try_from(vec![5.0f32, 1.0, 4.0, 1.0, 3.0], 1, 5).unwrap();
        let bias = DeviceVector::new(vec![0.0f32; 5]);

        let pending = select(&stream, &distances, &bias, 2).unwrap();
        stream.synchronize().unwrap();
        let topk = pending.wait().unwrap();
        assert_eq!(topk.distances(), &[1.0, 1.0]);
        assert_eq!(topk.indices(), &[1, 3]);
    }

    #[test]
    fn invalid_arguments_are_reported_at_launch() {
        let device = device();
        let stream = device.stream().unwrap();

        let distances = DeviceMatrix::try_from(vec![0.0f32; 10], 2, 5).unwrap();
        let bias = DeviceVector::new(vec![0.0f32; 5]);

        let err = select(&stream, &distances, &bias, 6).unwrap_err();
        assert!(matches!(err, SelectError::InvalidArgument(_)), "{err}");

        let short = DeviceVector::new(vec![0.0f32; 4]);
        let err = select(&stream, &distances, &short, 2).unwrap_err();
        assert!(matches!(err, SelectError::InvalidArgument(_)), "{err}");

        // Nothing was enqueued.
        stream.synchronize().unwrap();
    }

    #[test]
    fn many_launches_one_synchronize() {
        let device = device();
        let stream = device.stream().unwrap();
        let mut rng = StdRng::seed_from_u64(0x1d44_8f02_b7e9_c35a);

        let launches: Vec<_> = (0..8)
            .map(|i| {
                let ncols = 10 + 7 * i;
                let distances = random_matrix(&mut rng, 3, ncols);
                let bias = DeviceVector::new(vec![1.0f32; ncols]);
                let pending = select(&stream, &distances, &bias, 5).unwrap();
                (distances, pending)
            })
            .collect();

        stream.synchronize().unwrap();
        for (distances, pending) in launches {
            let topk = pending.wait().unwrap();
            let expected = device
                .fused_bias_topk(distances.view(), &vec![1.0; distances.ncols()], 5)
                .unwrap();
            assert_eq!(topk.indices(), expected.indices());
            assert_eq!(topk.distances(), expected.distances());
        }
    }

    #[test]
    fn execution_errors_surface_at_synchronize() {
        let device = device();
        let stream = device.stream().unwrap();

        let failed = stream
            .launch(|_| -> Result<(), SelectError> { Err(SelectError::OutOfMemory { bytes: 64 }) })
            .unwrap();
        let panicked = stream
            .launch(|_| -> Result<(), SelectError> { panic!("lane fault") })
            .unwrap();
        let ok = stream.launch(|config| Ok(config.lanes().get())).unwrap();

        // The first error is reported, then cleared.
        assert_eq!(
            stream.synchronize().unwrap_err(),
            SelectError::OutOfMemory { bytes: 64 }
        );
        stream.synchronize().unwrap();

        assert_eq!(
            failed.wait().unwrap_err(),
            SelectError::OutOfMemory { bytes: 64 }
        );
        assert_eq!(
            panicked.wait().unwrap_err(),
            SelectError::LaunchFailed("lane fault".into())
        );
        assert_eq!(ok.wait().unwrap(), 4);
    }

    #[test]
    fn pending_outlives_stream() {
        let device = device();
        let distances = DeviceMatrix::try_from(vec![3.0f32, 2.0, 1.0], 1, 3).unwrap();
        let bias = DeviceVector::new(vec![0.0f32; 3]);

        let pending = {
            let stream = device.stream().unwrap();
            select(&stream, &distances, &bias, 1).unwrap()
        };
        let topk = pending.wait().unwrap();
        assert_eq!(topk.indices(), &[2]);
    }

    #[test]
    fn launches_are_deterministic() {
        let device = device();
        let stream = device.stream().unwrap();
        let mut rng = StdRng::seed_from_u64(0xa0f3_62c8_1e5d_9b47);

        let distances = random_matrix(&mut rng, 16, 300);
        let bias = DeviceVector::new(
            (0..300)
                .map(|_| rng.random_range(0..4) as f32)
                .collect::<Vec<_>>(),
        );

        let first = select(&stream, &distances, &bias, 20).unwrap();
        let second = select(&stream, &distances, &bias, 20).unwrap();
        stream.synchronize().unwrap();

        let (first, second) = (first.wait().unwrap(), second.wait().unwrap());
        assert_eq!(first.indices(), second.indices());
        assert_eq!(first.distances(), second.distances());
    }
}
