use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Exclusive advisory lock held for the duration of an invocation that touches
/// the managed container, so two runs cannot interleave stop and start.
pub struct InvocationLock {
    lock_file: File,
}

impl InvocationLock {
    /// Take the lock or fail immediately with [`CoreError::Busy`].
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { lock_file: file }),
            Err(_) => Err(CoreError::Busy(lock_path.display().to_string())),
        }
    }
}

impl Drop for InvocationLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("nested").join("run.lock");

        let _lock = InvocationLock::acquire(&lock_path).unwrap();
        assert!(lock_path.exists());
    }

    #[test]
    fn second_acquire_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("run.lock");

        let _lock = InvocationLock::acquire(&lock_path).unwrap();
        let err = InvocationLock::acquire(&lock_path).err().unwrap();
        assert!(matches!(err, CoreError::Busy(_)));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("run.lock");

        {
            let _lock = InvocationLock::acquire(&lock_path).unwrap();
        }

        assert!(InvocationLock::acquire(&lock_path).is_ok());
    }
}
