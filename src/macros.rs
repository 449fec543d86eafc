// Shared helper macros for the crate's caches and builders.
#![allow(unused_macros)]

/// Acquires a `Mutex`, mapping poisoning to [`crate::Error::LockError`].
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}

/// Returns early with [`crate::Error::RecursionLimit`] once `$depth` exceeds `$max`.
macro_rules! check_depth {
    ($depth:expr, $max:expr) => {
        if $depth > $max {
            return Err(crate::Error::RecursionLimit($max));
        }
    };
}
