//! FUSE filesystem implementation.
//!
//! One flat directory (inode 1) whose entries are exactly the cache's
//! current key set. The cache is consulted on every operation: reads see
//! remote broadcasts the moment they land, and a lookup miss falls through
//! to a peer fetch. Writes are write-through: splice, store, then broadcast
//! the full new contents without waiting on any send.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyWrite, Request, TimeOrNow,
};
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::cache::ContentCache;
use crate::network::exchange::ExchangeService;

use super::{lookup_or_fetch, FsError};

/// Inode of the single virtual directory.
const ROOT_INO: u64 = 1;

/// Attribute TTL handed to the kernel. Zero: entry sizes change underneath
/// us whenever a broadcast lands, so the kernel must not cache attributes.
const ATTR_TTL: Duration = Duration::from_secs(0);

/// Stable inode for a content name: the first 8 bytes of its blake3 digest.
/// Inodes 0 and 1 are reserved.
pub(crate) fn ino_for_name(name: &str) -> u64 {
    let digest = blake3::hash(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    let ino = u64::from_le_bytes(bytes);
    if ino <= ROOT_INO {
        ino + 2
    } else {
        ino
    }
}

/// Splice `data` into `buf` at `offset`, zero-padding any gap past the
/// current end.
pub(crate) fn splice_at(buf: &mut Vec<u8>, offset: usize, data: &[u8]) {
    let end = offset + data.len();
    if end > buf.len() {
        buf.resize(end, 0);
    }
    buf[offset..end].copy_from_slice(data);
}

/// The filesystem bridge adapter.
pub struct CacheFs {
    /// Content cache, the single source of truth.
    cache: Arc<ContentCache>,
    /// Exchange service for miss fetches and write broadcasts.
    exchange: Arc<ExchangeService>,
    /// Names seen via lookup/readdir/create, by inode. The kernel addresses
    /// files by inode; this maps back to the cache key.
    names: HashMap<u64, String>,
    /// Tokio runtime handle for async work from the FUSE dispatch thread.
    runtime: Handle,
}

impl CacheFs {
    /// Create a bridge over a node's cache and exchange service.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(cache: Arc<ContentCache>, exchange: Arc<ExchangeService>) -> Result<Self, FsError> {
        let runtime = Handle::try_current()
            .map_err(|e| FsError::MountFailed(format!("no tokio runtime: {}", e)))?;
        Ok(Self {
            cache,
            exchange,
            names: HashMap::new(),
            runtime,
        })
    }

    fn now() -> SystemTime {
        SystemTime::now()
    }

    fn dir_attr(&self) -> FileAttr {
        let now = Self::now();
        FileAttr {
            ino: ROOT_INO,
            size: 0,
            blocks: 0,
            atime: now,
            mtime: now,
            ctime: now,
            crtime: UNIX_EPOCH,
            kind: FileType::Directory,
            perm: 0o755,
            nlink: 2,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }

    fn file_attr(&self, ino: u64, size: u64) -> FileAttr {
        let now = Self::now();
        FileAttr {
            ino,
            size,
            blocks: (size + 511) / 512,
            atime: now,
            mtime: now,
            ctime: now,
            crtime: UNIX_EPOCH,
            kind: FileType::RegularFile,
            perm: 0o644,
            nlink: 1,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }

    /// Record a name so later inode-addressed calls can find it.
    fn register(&mut self, name: &str) -> u64 {
        let ino = ino_for_name(name);
        self.names.insert(ino, name.to_string());
        ino
    }

    fn name_of(&self, ino: u64) -> Option<String> {
        self.names.get(&ino).cloned()
    }
}

impl Filesystem for CacheFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let name = match name.to_str() {
            Some(n) => n,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        // Cache hit, or fetch from peers and fill the cache.
        let size = match self.cache.entry_len(name) {
            Some(len) => len,
            None => {
                let exchange = self.exchange.clone();
                let fetched = self
                    .runtime
                    .block_on(async { lookup_or_fetch(&exchange, name).await });
                match fetched {
                    Some(data) => data.len() as u64,
                    None => {
                        reply.error(libc::ENOENT);
                        return;
                    }
                }
            }
        };

        let ino = self.register(name);
        reply.entry(&ATTR_TTL, &self.file_attr(ino, size), 0);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        if ino == ROOT_INO {
            reply.attr(&ATTR_TTL, &self.dir_attr());
            return;
        }
        let Some(name) = self.name_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.cache.entry_len(&name) {
            Some(size) => reply.attr(&ATTR_TTL, &self.file_attr(ino, size)),
            None => reply.error(libc::ENOENT),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(name) = self.name_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let Some(new_size) = size else {
            // Nothing this filesystem tracks changed; report current state.
            match self.cache.entry_len(&name) {
                Some(len) => reply.attr(&ATTR_TTL, &self.file_attr(ino, len)),
                None => reply.error(libc::ENOENT),
            }
            return;
        };

        let mut buf = self.cache.get(&name).unwrap_or_default();
        buf.resize(new_size as usize, 0);
        if !self.cache.put(&name, buf) {
            reply.error(libc::ENOSPC);
            return;
        }
        trace!(name = %name, size = new_size, "truncated");
        reply.attr(&ATTR_TTL, &self.file_attr(ino, new_size));
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        if ino != ROOT_INO {
            reply.error(libc::ENOTDIR);
            return;
        }

        let mut keys = self.cache.keys();
        keys.sort();

        let mut entries: Vec<(u64, FileType, String)> = vec![
            (ROOT_INO, FileType::Directory, ".".to_string()),
            (ROOT_INO, FileType::Directory, "..".to_string()),
        ];
        for key in keys {
            let ino = self.register(&key);
            entries.push((ino, FileType::RegularFile, key));
        }

        for (i, (e_ino, kind, name)) in entries.iter().enumerate().skip(offset as usize) {
            if reply.add(*e_ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let name = match name.to_str() {
            Some(n) => n,
            None => {
                reply.error(libc::EINVAL);
                return;
            }
        };

        // Empty entry goes in immediately: visible to listings before any
        // bytes are written.
        if !self.cache.put(name, Vec::new()) {
            reply.error(libc::ENOSPC);
            return;
        }
        let ino = self.register(name);
        trace!(name = %name, "created");
        reply.created(&ATTR_TTL, &self.file_attr(ino, 0), 0, 0, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(name) = self.name_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        // Always re-read from the cache so concurrent broadcasts updating
        // this name are observed.
        match self.cache.get(&name) {
            Some(data) => {
                let off = offset.max(0) as usize;
                if off >= data.len() {
                    reply.data(&[]);
                    return;
                }
                let end = (off + size as usize).min(data.len());
                reply.data(&data[off..end]);
            }
            None => reply.error(libc::ENOENT),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(name) = self.name_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let mut buf = self.cache.get(&name).unwrap_or_default();
        splice_at(&mut buf, offset.max(0) as usize, data);

        if !self.cache.put(&name, buf.clone()) {
            reply.error(libc::ENOSPC);
            return;
        }
        trace!(name = %name, offset, bytes = data.len(), total = buf.len(), "wrote");
        reply.written(data.len() as u32);

        // Propagate the full new contents to peers; the write itself does
        // not wait for any send.
        let exchange = self.exchange.clone();
        self.runtime.spawn(async move {
            exchange.broadcast_file(&name, buf).await;
        });
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let name = match name.to_str() {
            Some(n) => n,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        if self.cache.delete(name) {
            debug!(name = %name, "removed");
            reply.ok();
        } else {
            reply.error(libc::ENOENT);
        }
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        // Every mutation is already written through to the cache.
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice_overwrite_in_place() {
        let mut buf = b"hello world".to_vec();
        splice_at(&mut buf, 6, b"skiff");
        assert_eq!(buf, b"hello skiff");
    }

    #[test]
    fn test_splice_grows_buffer() {
        let mut buf = b"abc".to_vec();
        splice_at(&mut buf, 3, b"def");
        assert_eq!(buf, b"abcdef");
    }

    #[test]
    fn test_splice_zero_pads_gap() {
        let mut buf = b"ab".to_vec();
        splice_at(&mut buf, 5, b"xy");
        assert_eq!(buf, b"ab\0\0\0xy");
    }

    #[test]
    fn test_splice_into_empty() {
        let mut buf = Vec::new();
        splice_at(&mut buf, 0, b"data");
        assert_eq!(buf, b"data");
    }

    #[test]
    fn test_ino_stable_and_reserved() {
        let a = ino_for_name("file-a");
        assert_eq!(a, ino_for_name("file-a"));
        assert!(a > ROOT_INO);

        let names = ["a", "b", "config.toml", "nested.name.txt", ""];
        for name in names {
            let ino = ino_for_name(name);
            assert!(ino > ROOT_INO, "inode for {:?} collides with reserved", name);
        }
    }

    #[test]
    fn test_ino_distinct_for_distinct_names() {
        assert_ne!(ino_for_name("a"), ino_for_name("b"));
        assert_ne!(ino_for_name("file1"), ino_for_name("file2"));
    }
}
