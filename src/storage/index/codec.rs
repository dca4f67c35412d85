use crate::common::rid::Rid;
use crate::storage::index::generic_key::GenericKey;
use byteorder::{ByteOrder, LittleEndian};

/// Fixed-width on-page encoding for the keys and values stored inside hash bucket pages.
///
/// Pages are persisted as raw little-endian byte images, so every stored type must map to a
/// stable, padding-free layout of exactly `ENCODED_SIZE` bytes.
pub trait FixedSizeCodec: Clone + PartialEq + Send + Sync + 'static {
    /// Number of bytes this type occupies inside a page.
    const ENCODED_SIZE: usize;

    /// Writes the value into the first `ENCODED_SIZE` bytes of `buf`.
    fn encode_into(&self, buf: &mut [u8]);

    /// Reads a value back from the first `ENCODED_SIZE` bytes of `buf`.
    fn decode_from(buf: &[u8]) -> Self;
}

impl FixedSizeCodec for i32 {
    const ENCODED_SIZE: usize = 4;

    fn encode_into(&self, buf: &mut [u8]) {
        LittleEndian::write_i32(buf, *self);
    }

    fn decode_from(buf: &[u8]) -> Self {
        LittleEndian::read_i32(buf)
    }
}

impl FixedSizeCodec for u32 {
    const ENCODED_SIZE: usize = 4;

    fn encode_into(&self, buf: &mut [u8]) {
        LittleEndian::write_u32(buf, *self);
    }

    fn decode_from(buf: &[u8]) -> Self {
        LittleEndian::read_u32(buf)
    }
}

impl FixedSizeCodec for i64 {
    const ENCODED_SIZE: usize = 8;

    fn encode_into(&self, buf: &mut [u8]) {
        LittleEndian::write_i64(buf, *self);
    }

    fn decode_from(buf: &[u8]) -> Self {
        LittleEndian::read_i64(buf)
    }
}

impl FixedSizeCodec for u64 {
    const ENCODED_SIZE: usize = 8;

    fn encode_into(&self, buf: &mut [u8]) {
        LittleEndian::write_u64(buf, *self);
    }

    fn decode_from(buf: &[u8]) -> Self {
        LittleEndian::read_u64(buf)
    }
}

impl FixedSizeCodec for Rid {
    const ENCODED_SIZE: usize = 8;

    fn encode_into(&self, buf: &mut [u8]) {
        LittleEndian::write_i32(&mut buf[0..4], self.get_page_id());
        LittleEndian::write_u32(&mut buf[4..8], self.get_slot_num());
    }

    fn decode_from(buf: &[u8]) -> Self {
        Rid::new(LittleEndian::read_i32(&buf[0..4]), LittleEndian::read_u32(&buf[4..8]))
    }
}

impl<const N: usize> FixedSizeCodec for GenericKey<N> {
    const ENCODED_SIZE: usize = N;

    fn encode_into(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(self.as_bytes());
    }

    fn decode_from(buf: &[u8]) -> Self {
        let mut key = GenericKey::new();
        key.set_from_bytes(&buf[..N]);
        key
    }
}
