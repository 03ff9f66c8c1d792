// Shared memory backend abstraction
// Heap storage for a single process, file-backed mmap for two processes

use std::fmt::Debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::aligned::page_size;
use super::region::RegionView;
use super::retry::RetryPolicy;
use crate::error::{QueueError, Result};

/// Size of the zero chunk appended while growing a backing file.
pub const EXTEND_CHUNK: usize = 64 * 1024;

/// Permission bits for a new backing file, before the process umask.
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Memory that a ring buffer (and its sync header) can live in.
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the start of the region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the region in bytes
    fn size(&self) -> usize;

    /// Get the underlying OS handle, if any
    fn raw_handle(&self) -> RawHandle;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawHandle {
    /// Unix file descriptor of the mapped file
    Fd(i32),
    /// Private heap allocation, no handle to share
    Heap,
}

/// A read-write `MAP_SHARED` mapping of the first `size` bytes of a file.
pub struct MappedFile {
    ptr: *mut u8,
    size: usize,
    file: File,
    path: PathBuf,
    unlink_on_drop: bool,
}

unsafe impl Send for MappedFile {}
unsafe impl Sync for MappedFile {}

impl MappedFile {
    /// Create a fresh backing file of at least `min_size` bytes and map it.
    ///
    /// A file left behind by an earlier run is removed first so no stale
    /// counters survive into the new region.
    pub fn create(path: &Path, min_size: usize, unlink_on_drop: bool) -> Result<Self> {
        Self::create_with_mode(path, min_size, unlink_on_drop, DEFAULT_FILE_MODE)
    }

    /// [`MappedFile::create`] with explicit permission bits (still masked by
    /// the umask). Ignored on platforms without unix permissions.
    pub fn create_with_mode(path: &Path, min_size: usize, unlink_on_drop: bool, mode: u32) -> Result<Self> {
        match fs::remove_file(path) {
            Ok(()) => log::debug!("[SPSC] removed stale backing file {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(QueueError::io(path, e)),
        }

        let mut file = open_options(Some(mode))
            .open(path)
            .map_err(|e| QueueError::io(path, e))?;

        let len = extend_with_zeros(&mut file, min_size as u64).map_err(|e| QueueError::io(path, e))?;
        log::debug!(
            "[SPSC] created backing file {} ({} bytes, minimum {})",
            path.display(),
            len,
            min_size
        );

        Self::map(file, path, min_size, unlink_on_drop)
    }

    /// Map an existing file that has already reached `min_size` bytes.
    pub fn open(path: &Path, min_size: usize) -> Result<Self> {
        let file = open_options(None)
            .open(path)
            .map_err(|e| QueueError::io(path, e))?;

        let file_size = file.metadata().map_err(|e| QueueError::io(path, e))?.len();
        if file_size < min_size as u64 {
            return Err(QueueError::RegionTooSmall {
                needed: min_size,
                available: file_size as usize,
            });
        }

        Self::map(file, path, min_size, false)
    }

    /// Block until `path` exists and is at least `min_size` bytes, then map it.
    pub fn wait_and_open(path: &Path, min_size: usize, policy: &RetryPolicy) -> Result<Self> {
        policy.run("backing file", || match fs::metadata(path) {
            Ok(meta) if meta.len() >= min_size as u64 => Ok(Some(())),
            Ok(meta) => {
                log::debug!(
                    "[SPSC] {} has {} of {} bytes, waiting",
                    path.display(),
                    meta.len(),
                    min_size
                );
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(QueueError::io(path, e)),
        })?;
        Self::open(path, min_size)
    }

    #[cfg(unix)]
    fn map(file: File, path: &Path, size: usize, unlink_on_drop: bool) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(QueueError::io(path, io::Error::last_os_error()));
        }

        Ok(Self {
            ptr: ptr as *mut u8,
            size,
            file,
            path: path.to_path_buf(),
            unlink_on_drop,
        })
    }

    #[cfg(not(unix))]
    fn map(_file: File, path: &Path, _size: usize, _unlink_on_drop: bool) -> Result<Self> {
        Err(QueueError::io(
            path,
            io::Error::new(io::ErrorKind::Unsupported, "file mappings only supported on unix"),
        ))
    }

    /// Page the whole mapping in before the hot path touches it.
    pub fn load(&self) -> Result<()> {
        #[cfg(unix)]
        unsafe {
            if libc::madvise(self.ptr as *mut libc::c_void, self.size, libc::MADV_WILLNEED) != 0 {
                log::debug!(
                    "[SPSC] madvise(WILLNEED) failed on {}: {}",
                    self.path.display(),
                    io::Error::last_os_error()
                );
            }
        }
        RegionView::of(self)?.touch_pages(page_size());
        log::debug!("[SPSC] {} resident ({} bytes)", self.path.display(), self.size);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_len(&self) -> Result<u64> {
        Ok(self
            .file
            .metadata()
            .map_err(|e| QueueError::io(&self.path, e))?
            .len())
    }

    /// Whether `path` still names the file this mapping was made from.
    ///
    /// False once the file has been removed or replaced by a new one.
    pub fn is_current(&self) -> Result<bool> {
        let on_disk = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(QueueError::io(&self.path, e)),
        };
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let mapped = self.file.metadata().map_err(|e| QueueError::io(&self.path, e))?;
            Ok(mapped.dev() == on_disk.dev() && mapped.ino() == on_disk.ino())
        }
        #[cfg(not(unix))]
        {
            let _ = on_disk;
            Ok(true)
        }
    }

    pub(crate) fn unlinks_on_drop(&self) -> bool {
        self.unlink_on_drop
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.size);
        }
        if self.unlink_on_drop {
            if let Err(e) = fs::remove_file(&self.path) {
                log::debug!("[SPSC] could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

impl SharedMemoryBackend for MappedFile {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            RawHandle::Fd(self.file.as_raw_fd())
        }
        #[cfg(not(unix))]
        {
            RawHandle::Heap
        }
    }
}

impl Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_mapped_file(self, f)
    }
}

/// Grow `file` to at least `min_len` bytes by appending zero-filled chunks.
///
/// Returns the resulting length. Files already long enough are left alone.
pub fn extend_with_zeros(file: &mut File, min_len: u64) -> io::Result<u64> {
    let mut len = file.metadata()?.len();
    if len >= min_len {
        return Ok(len);
    }

    let chunk = vec![0u8; EXTEND_CHUNK];
    file.seek(SeekFrom::End(0))?;
    while len < min_len {
        file.write_all(&chunk)?;
        len += EXTEND_CHUNK as u64;
    }
    file.sync_all()?;
    Ok(len)
}

fn open_options(create_mode: Option<u32>) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true).write(true);
    if let Some(_mode) = create_mode {
        options.create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(_mode);
        }
    }
    options
}
