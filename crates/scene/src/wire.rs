//! Little-endian cursor helpers shared by all blob encoders/decoders.
//!
//! Every read checks the remaining length first, so a truncated or lying
//! blob surfaces as `CorruptSceneData` instead of a panic.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::SceneError;
use crate::model::BlobKind;

pub(crate) struct BlobWriter {
    buf: BytesMut,
}

impl BlobWriter {
    pub(crate) fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub(crate) fn u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub(crate) fn bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub(crate) fn i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub(crate) fn f32(&mut self, v: f32) {
        self.buf.put_f32_le(v);
    }

    /// Element counts are written as `i32`.
    pub(crate) fn count(&mut self, n: usize) {
        self.i32(i32::try_from(n).unwrap_or(i32::MAX));
    }

    pub(crate) fn f32s(&mut self, values: &[f32]) {
        for v in values {
            self.f32(*v);
        }
    }

    pub(crate) fn i32s(&mut self, values: &[i32]) {
        for v in values {
            self.i32(*v);
        }
    }

    pub(crate) fn bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Fixed-width ASCII field, truncated or zero padded to `width`.
    pub(crate) fn fixed_ascii(&mut self, text: &str, width: usize) {
        let mut written = 0;
        for ch in text.chars().take(width) {
            self.buf.put_u8(if ch.is_ascii() { ch as u8 } else { b'?' });
            written += 1;
        }
        self.buf.put_bytes(0, width - written);
    }

    /// `i32` length followed by the ASCII bytes.
    pub(crate) fn prefixed_ascii(&mut self, text: &str) {
        let encoded: Vec<u8> = text
            .chars()
            .map(|ch| if ch.is_ascii() { ch as u8 } else { b'?' })
            .collect();
        self.count(encoded.len());
        self.buf.put_slice(&encoded);
    }

    pub(crate) fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

pub(crate) struct BlobReader<'a> {
    blob: BlobKind,
    data: &'a [u8],
}

impl<'a> BlobReader<'a> {
    pub(crate) fn new(blob: BlobKind, data: &'a [u8]) -> Self {
        Self { blob, data }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn corrupt(&self, reason: impl Into<String>) -> SceneError {
        SceneError::corrupt(self.blob, reason)
    }

    fn need(&self, n: usize, what: &str) -> Result<(), SceneError> {
        if self.data.len() < n {
            Err(self.corrupt(format!(
                "truncated {what}: need {n} bytes, {} left",
                self.data.len()
            )))
        } else {
            Ok(())
        }
    }

    pub(crate) fn u8(&mut self, what: &str) -> Result<u8, SceneError> {
        self.need(1, what)?;
        Ok(self.data.get_u8())
    }

    pub(crate) fn bool(&mut self, what: &str) -> Result<bool, SceneError> {
        Ok(self.u8(what)? != 0)
    }

    pub(crate) fn i32(&mut self, what: &str) -> Result<i32, SceneError> {
        self.need(4, what)?;
        Ok(self.data.get_i32_le())
    }

    pub(crate) fn f32(&mut self, what: &str) -> Result<f32, SceneError> {
        self.need(4, what)?;
        Ok(self.data.get_f32_le())
    }

    /// Reads an element count and checks that `count * elem_width` bytes are
    /// actually present before anything is allocated.
    pub(crate) fn count(&mut self, what: &str, elem_width: usize) -> Result<usize, SceneError> {
        let raw = self.i32(what)?;
        let count = usize::try_from(raw)
            .map_err(|_| self.corrupt(format!("negative {what} count {raw}")))?;
        let bytes = count
            .checked_mul(elem_width)
            .ok_or_else(|| self.corrupt(format!("{what} count {count} overflows")))?;
        self.need(bytes, what)?;
        Ok(count)
    }

    pub(crate) fn f32_array<const N: usize>(&mut self, what: &str) -> Result<[f32; N], SceneError> {
        self.need(N * 4, what)?;
        let mut out = [0.0; N];
        for v in &mut out {
            *v = self.data.get_f32_le();
        }
        Ok(out)
    }

    pub(crate) fn i32_array<const N: usize>(&mut self, what: &str) -> Result<[i32; N], SceneError> {
        self.need(N * 4, what)?;
        let mut out = [0; N];
        for v in &mut out {
            *v = self.data.get_i32_le();
        }
        Ok(out)
    }

    /// `count` groups of `N` floats.
    pub(crate) fn f32_groups<const N: usize>(
        &mut self,
        count: usize,
        what: &str,
    ) -> Result<Vec<[f32; N]>, SceneError> {
        let total = count
            .checked_mul(N * 4)
            .ok_or_else(|| self.corrupt(format!("{what} count {count} overflows")))?;
        self.need(total, what)?;
        (0..count).map(|_| self.f32_array::<N>(what)).collect()
    }

    pub(crate) fn i32_groups<const N: usize>(
        &mut self,
        count: usize,
        what: &str,
    ) -> Result<Vec<[i32; N]>, SceneError> {
        let total = count
            .checked_mul(N * 4)
            .ok_or_else(|| self.corrupt(format!("{what} count {count} overflows")))?;
        self.need(total, what)?;
        (0..count).map(|_| self.i32_array::<N>(what)).collect()
    }

    pub(crate) fn i32_vec(&mut self, count: usize, what: &str) -> Result<Vec<i32>, SceneError> {
        Ok(self
            .i32_groups::<1>(count, what)?
            .into_iter()
            .map(|[v]| v)
            .collect())
    }

    pub(crate) fn byte_vec(&mut self, count: usize, what: &str) -> Result<Vec<u8>, SceneError> {
        self.need(count, what)?;
        let out = self.data[..count].to_vec();
        self.data.advance(count);
        Ok(out)
    }

    pub(crate) fn fixed_ascii(&mut self, width: usize, what: &str) -> Result<String, SceneError> {
        let raw = self.byte_vec(width, what)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    pub(crate) fn prefixed_ascii(&mut self, what: &str) -> Result<String, SceneError> {
        let len = self.count(what, 1)?;
        let raw = self.byte_vec(len, what)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    pub(crate) fn expect_end(&self) -> Result<(), SceneError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(self.corrupt(format!("{} trailing bytes", self.data.len())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ascii_pads_and_truncates() {
        let mut w = BlobWriter::new();
        w.fixed_ascii("abc", 5);
        w.fixed_ascii("abcdef", 4);
        w.fixed_ascii("ä", 2);
        let bytes = w.finish();
        assert_eq!(&bytes[..], b"abc\0\0abcd?\0");

        let mut r = BlobReader::new(BlobKind::Nodes, &bytes);
        assert_eq!(r.fixed_ascii(5, "name").unwrap(), "abc");
        assert_eq!(r.fixed_ascii(4, "name").unwrap(), "abcd");
        assert_eq!(r.fixed_ascii(2, "name").unwrap(), "?");
        assert!(r.is_empty());
    }

    #[test]
    fn count_rejects_negative_and_oversized() {
        let mut w = BlobWriter::new();
        w.i32(-2);
        let bytes = w.finish();
        let mut r = BlobReader::new(BlobKind::Objects, &bytes);
        assert!(r.count("vertex", 12).unwrap_err().is_corrupt());

        let mut w = BlobWriter::new();
        w.i32(1_000_000);
        w.f32(1.0);
        let bytes = w.finish();
        let mut r = BlobReader::new(BlobKind::Objects, &bytes);
        assert!(matches!(
            r.count("vertex", 12),
            Err(SceneError::CorruptSceneData {
                blob: BlobKind::Objects,
                ..
            })
        ));
    }

    #[test]
    fn reads_fail_on_truncation() {
        let bytes = [1u8, 2, 3];
        let mut r = BlobReader::new(BlobKind::Header, &bytes);
        assert!(r.i32("factor").is_err());
        assert_eq!(r.remaining(), 3);
        assert_eq!(r.u8("byte").unwrap(), 1);
        assert!(r.expect_end().is_err());
    }
}
