/// A generic fixed-width key used for indexing with opaque data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GenericKey<const N: usize> {
    /// The fixed-size array holding the key data.
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    /// Creates a new `GenericKey` with zeroed data.
    pub fn new() -> Self {
        Self { data: [0; N] }
    }

    /// Sets the key data from a slice of bytes. Bytes beyond `N` are ignored; a shorter slice
    /// leaves the tail zeroed.
    pub fn set_from_bytes(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(N);
        self.data[..len].copy_from_slice(&bytes[..len]);
    }

    /// Sets the key data from an integer, little-endian.
    pub fn set_from_integer(&mut self, value: i64) {
        self.data = [0; N];
        let bytes = value.to_le_bytes();
        let len = bytes.len().min(N);
        self.data[..len].copy_from_slice(&bytes[..len]);
    }

    /// Returns a reference to the key's byte data.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self::new()
    }
}
