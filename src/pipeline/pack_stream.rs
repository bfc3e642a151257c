//! Shared archive source and bounded pack stream views.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Error, Result};

struct SourceState<R> {
    reader: R,
    /// Known position of `reader`, `None` until the first seek.
    position: Option<u64>,
}

/// The archive source, shared between the header parser and every pack
/// stream view of a folder being decoded.
///
/// Reads go through a mutex-guarded reader that remembers its position, so
/// a view only seeks when another view moved the reader in between.
pub struct SharedSource<R> {
    inner: Arc<Mutex<SourceState<R>>>,
}

impl<R> Clone for SharedSource<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> std::fmt::Debug for SharedSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSource").finish_non_exhaustive()
    }
}

impl<R: Read + Seek> SharedSource<R> {
    /// Wraps `reader`. Its current position is not trusted.
    pub fn new(reader: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SourceState {
                reader,
                position: None,
            })),
        }
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, SourceState<R>>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("archive source lock poisoned"))
    }

    /// Reads up to `buf.len()` bytes at `offset`.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock()?;
        if state.position != Some(offset) {
            state.position = None;
            state.reader.seek(SeekFrom::Start(offset))?;
        }
        let n = state.reader.read(buf)?;
        state.position = Some(offset + n as u64);
        Ok(n)
    }

    /// Fills `buf` from `offset`, reporting a short source as
    /// [`Error::Truncated`].
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8], what: &str) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let pos = offset + filled as u64;
            match self.read_at(pos, &mut buf[filled..]) {
                Ok(0) => return Err(Error::truncated(pos, what)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Total length of the source.
    pub fn len(&self) -> io::Result<u64> {
        let mut state = self.lock()?;
        state.position = None;
        state.reader.seek(SeekFrom::End(0))
    }

    /// A bounded reader over `size` bytes starting at `offset`.
    pub fn view(&self, offset: u64, size: u64) -> PackStreamReader<R> {
        PackStreamReader {
            source: self.clone(),
            offset,
            remaining: size,
        }
    }

    /// Returns the reader if no other handle or view is alive.
    pub fn into_inner(self) -> Option<R> {
        Arc::into_inner(self.inner)
            .and_then(|mutex| mutex.into_inner().ok())
            .map(|state| state.reader)
    }
}

/// A bounded view of one pack stream.
///
/// Reading past the end of the source before `size` bytes were delivered
/// fails with an [`io::Error`] wrapping [`Error::Truncated`], which the
/// pipeline reports as archive-fatal.
pub struct PackStreamReader<R> {
    source: SharedSource<R>,
    offset: u64,
    remaining: u64,
}

impl<R> PackStreamReader<R> {
    /// Bytes not yet read from the view.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read + Seek> Read for PackStreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.source.read_at(self.offset, &mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::other(Error::truncated(
                self.offset,
                format!("pack stream ends {} bytes early", self.remaining),
            )));
        }
        self.offset += n as u64;
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Counts seeks so tests can observe when a view repositions the source.
    struct CountingSeeks {
        inner: Cursor<Vec<u8>>,
        seeks: Arc<Mutex<usize>>,
    }

    impl Read for CountingSeeks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Seek for CountingSeeks {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            *self.seeks.lock().unwrap() += 1;
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_view_reads_its_range() {
        let source = SharedSource::new(Cursor::new((0u8..100).collect::<Vec<_>>()));
        let mut out = Vec::new();
        source.view(10, 5).read_to_end(&mut out).unwrap();
        assert_eq!(out, [10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_interleaved_views() {
        let source = SharedSource::new(Cursor::new((0u8..100).collect::<Vec<_>>()));
        let mut a = source.view(0, 4);
        let mut b = source.view(50, 4);
        let mut byte = [0u8; 1];
        let mut got = Vec::new();
        for _ in 0..4 {
            a.read_exact(&mut byte).unwrap();
            got.push(byte[0]);
            b.read_exact(&mut byte).unwrap();
            got.push(byte[0]);
        }
        assert_eq!(got, [0, 50, 1, 51, 2, 52, 3, 53]);
    }

    #[test]
    fn test_sequential_reads_do_not_seek() {
        let seeks = Arc::new(Mutex::new(0));
        let source = SharedSource::new(CountingSeeks {
            inner: Cursor::new(vec![7u8; 64]),
            seeks: Arc::clone(&seeks),
        });
        let mut view = source.view(8, 32);
        let mut buf = [0u8; 4];
        for _ in 0..8 {
            view.read_exact(&mut buf).unwrap();
        }
        assert_eq!(*seeks.lock().unwrap(), 1);
    }

    #[test]
    fn test_short_source_is_truncated() {
        let source = SharedSource::new(Cursor::new(vec![0u8; 10]));
        let mut out = Vec::new();
        let err = source.view(4, 20).read_to_end(&mut out).unwrap_err();
        let inner = err.into_inner().unwrap().downcast::<Error>().unwrap();
        assert!(matches!(*inner, Error::Truncated { offset: 10, .. }));
    }

    #[test]
    fn test_read_exact_at() {
        let source = SharedSource::new(Cursor::new(b"0123456789".to_vec()));
        let mut buf = [0u8; 3];
        source.read_exact_at(4, &mut buf, "test").unwrap();
        assert_eq!(&buf, b"456");
        let mut big = [0u8; 8];
        let err = source.read_exact_at(5, &mut big, "test").unwrap_err();
        assert!(matches!(err, Error::Truncated { offset: 10, .. }));
        assert_eq!(source.len().unwrap(), 10);
    }

    #[test]
    fn test_into_inner_requires_sole_owner() {
        let source = SharedSource::new(Cursor::new(vec![1u8]));
        let view = source.view(0, 1);
        let source = match Arc::try_unwrap(source.inner) {
            Ok(_) => panic!("view still holds the source"),
            Err(inner) => SharedSource { inner },
        };
        drop(view);
        assert!(source.into_inner().is_some());
    }
}
