use alloc::{boxed::Box, sync::Arc};
use core::sync::atomic::{AtomicU8, Ordering};

use once_cell::race::OnceBox;

// LAZY-LOAD LATCH
// ================================================================================================

const ABSENT: u8 = 0;
const LOADING: u8 = 1;
const READY: u8 = 2;

/// A 3-state load latch guarding one lazily-decoded value.
///
/// The latch advances only absent → loading → ready. The first caller to claim the latch runs the
/// initializer; concurrent callers spin until the value is ready. A failed initialization releases
/// the latch back to absent so a later caller can retry.
pub struct Latch<T> {
    state: AtomicU8,
    slot: OnceBox<Arc<T>>,
}

impl<T> Latch<T> {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ABSENT),
            slot: OnceBox::new(),
        }
    }

    /// Returns the value if it has been initialized.
    pub fn get(&self) -> Option<Arc<T>> {
        if self.state.load(Ordering::Acquire) == READY {
            self.slot.get().cloned()
        } else {
            None
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Returns the value, running `init` if this latch has not been initialized yet.
    ///
    /// Exactly one caller runs `init`; others spin until the latch reaches ready. Once ready, every
    /// call returns a clone of the same `Arc`.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        loop {
            match self.state.compare_exchange(ABSENT, LOADING, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => match init() {
                    Ok(value) => {
                        let value = Arc::new(value);
                        let _ = self.slot.set(Box::new(value.clone()));
                        self.state.store(READY, Ordering::Release);
                        return Ok(value);
                    },
                    Err(err) => {
                        self.state.store(ABSENT, Ordering::Release);
                        return Err(err);
                    },
                },
                Err(LOADING) => core::hint::spin_loop(),
                Err(_) => return Ok(self.slot.get().expect("ready latch holds a value").clone()),
            }
        }
    }
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_latch_returns_same_value() {
        let latch: Latch<u32> = Latch::new();
        assert!(latch.get().is_none());

        let first = latch.get_or_try_init(|| Ok::<_, ()>(7)).unwrap();
        let second = latch.get_or_try_init(|| Ok::<_, ()>(11)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 7);
        assert!(latch.is_ready());
    }

    #[test]
    fn failed_init_releases_the_latch() {
        let latch: Latch<u32> = Latch::new();
        assert_eq!(latch.get_or_try_init(|| Err::<u32, &str>("boom")), Err("boom"));
        assert!(!latch.is_ready());
        assert_eq!(*latch.get_or_try_init(|| Ok::<_, &str>(3)).unwrap(), 3);
    }

    #[test]
    fn concurrent_readers_observe_one_initialization() {
        use std::{sync::atomic::AtomicUsize, thread};

        let latch: Latch<u32> = Latch::new();
        let runs = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let value = latch
                        .get_or_try_init(|| {
                            runs.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, ()>(42)
                        })
                        .unwrap();
                    assert_eq!(*value, 42);
                });
            }
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
