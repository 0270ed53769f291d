use std::sync::Arc;

use log::info;
use rand::{SeedableRng, rngs::StdRng};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use crate::{MlErr, Result};

/// Gates the behaviour of the stochastic layers and whether layers keep the metadata needed
/// by the backward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

impl Mode {
    pub fn is_train(self) -> bool {
        self == Mode::Train
    }
}

/// Where the numeric work of a forward/backward pass runs.
///
/// `Threads` fans the per-sample work of a batch out on a dedicated pool. Every reduction across
/// samples is still done sequentially, in sample order, so both devices give the same numbers.
#[derive(Debug, Clone)]
pub enum Device {
    Host,
    Threads(Arc<ThreadPool>),
}

impl Device {
    /// Creates a new `Device`.
    ///
    /// # Arguments
    /// * `threads` - The amount of worker threads of the accelerator pool, `0` means the host.
    ///
    /// # Returns
    /// The device or `MlErr::DeviceUnavailable` if the pool could not be spawned.
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Ok(Self::Host);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ml-device-{i}"))
            .build()
            .map_err(|e| MlErr::DeviceUnavailable(e.to_string()))?;

        Ok(Self::Threads(Arc::new(pool)))
    }

    /// Same as `Device::new` but recovers from an unavailable device by using the host.
    pub fn with_fallback(threads: usize) -> Self {
        match Self::new(threads) {
            Ok(device) => device,
            Err(e) => {
                info!("{e}, falling back to the host processor");
                Self::Host
            }
        }
    }

    /// Returns the amount of threads doing the work.
    pub fn threads(&self) -> usize {
        match self {
            Self::Host => 1,
            Self::Threads(pool) => pool.current_num_threads(),
        }
    }

    /// Computes `f(i)` for every sample index `i` in `0..n`, keeping the order of the results.
    pub fn map_samples<T, F>(&self, n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        match self {
            Self::Host => (0..n).map(f).collect(),
            Self::Threads(pool) => pool.install(|| (0..n).into_par_iter().map(f).collect()),
        }
    }
}

/// Everything a pass through the model needs besides the parameters and the data: the device
/// doing the work, the random state of the stochastic layers and the current mode.
#[derive(Debug)]
pub struct ExecutionContext {
    device: Device,
    rng: StdRng,
    mode: Mode,
}

impl ExecutionContext {
    /// Creates a new `ExecutionContext` in evaluation mode.
    ///
    /// # Arguments
    /// * `device` - The device doing the numeric work.
    /// * `seed` - The seed for the random number generator, if `None` it's seeded from the os.
    pub fn new(device: Device, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            device,
            rng,
            mode: Mode::Eval,
        }
    }

    /// A host context with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(Device::Host, Some(seed))
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
