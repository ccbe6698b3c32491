#![allow(unused_macros)]

/// Helper macro for locking items, propagating a poisoned lock as [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut rng = lock!(self.ids);
///  let id = rng.u32(..);
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let managers = read_lock!(self.managers);
///  println!("{}", managers.len());
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut managers = write_lock!(self.managers);
///  managers.push(entry);
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().map_err(|_| crate::Error::LockError)?
    };
}
