//! Bundle output stream.
//!
//! The stream is pull-based: nothing is produced until the consumer
//! asks, so a stream that is never polled costs nothing beyond the
//! build that already ran. It yields the bundle in fixed-size chunks
//! and, for a failed build without an error callback, yields the
//! single [`BuildError`] as its only item.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::BuildError;

/// Size of one output chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// The output of one build, consumable as an [`Iterator`] or as a
/// [`futures::Stream`] of `Result<Vec<u8>, BuildError>` items.
#[derive(Debug)]
pub struct BundleStream {
    chunks: VecDeque<Vec<u8>>,
    error: Option<BuildError>,
}

impl BundleStream {
    /// A stream over finished bundle bytes, split into chunks.
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        let chunks = bytes
            .chunks(CHUNK_SIZE)
            .map(<[u8]>::to_vec)
            .collect::<VecDeque<_>>();
        Self { chunks, error: None }
    }

    /// A stream that ends immediately with no items. Used when a
    /// build failure was already delivered to an error callback.
    pub(crate) fn empty() -> Self {
        Self {
            chunks: VecDeque::new(),
            error: None,
        }
    }

    /// A stream whose only item is the build error.
    pub(crate) fn failed(error: BuildError) -> Self {
        Self {
            chunks: VecDeque::new(),
            error: Some(error),
        }
    }

    /// Drain the stream into a single byte vector, surfacing the
    /// build error if the build failed.
    pub fn into_bytes(self) -> Result<Vec<u8>, BuildError> {
        let mut bytes = Vec::new();
        for chunk in self {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes)
    }
}

impl Iterator for BundleStream {
    type Item = Result<Vec<u8>, BuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(chunk) = self.chunks.pop_front() {
            return Some(Ok(chunk));
        }
        self.error.take().map(Err)
    }
}

impl futures::Stream for BundleStream {
    type Item = Result<Vec<u8>, BuildError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_bytes_in_order() {
        let stream = BundleStream::from_bytes(vec![1u8; CHUNK_SIZE + 10]);
        let chunks: Vec<_> = stream.map(Result::unwrap).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), CHUNK_SIZE);
        assert_eq!(chunks[1].len(), 10);
    }

    #[test]
    fn failed_stream_yields_exactly_one_error() {
        let mut stream = BundleStream::failed(BuildError::InvalidConfig("bad".to_string()));
        assert!(matches!(stream.next(), Some(Err(_))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn empty_stream_ends_immediately() {
        let mut stream = BundleStream::empty();
        assert!(stream.next().is_none());
    }

    #[test]
    fn into_bytes_reassembles_the_bundle() {
        let bytes: Vec<u8> = (0..200_000).map(|i| (i % 251) as u8).collect();
        let stream = BundleStream::from_bytes(bytes.clone());
        assert_eq!(stream.into_bytes().unwrap(), bytes);
    }
}
