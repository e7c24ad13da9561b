//! Codec Module
//!
//! Translates typed keys and values to and from the byte sequences stored on
//! disk.
//!
//! ## Responsibilities
//! - `Codec`: variable-length encoding used for hash table keys and values
//! - `FixedCodec`: fixed-width encoding used for array elements
//! - Stable codec identifiers, recorded in the control file of kept stores
//!
//! Codecs are chosen at compile time by the key and value types. Types without
//! a built-in codec can be wrapped in [`Bincode`] when they implement serde.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Variable-length byte codec for a type
pub trait Codec: Sized {
    /// Identifier written to the control file of kept stores
    const ID: &'static str;

    /// Append the serialized form of `self` to `out`
    fn encode(&self, out: &mut BytesMut) -> Result<()>;

    /// Rebuild a value from its serialized form
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Serialize into a standalone buffer
    fn to_bytes(&self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        self.encode(&mut out)?;
        Ok(out.freeze())
    }
}

/// Fixed-width codec, for elements of a [`FixedArray`](crate::array::FixedArray)
pub trait FixedCodec: Sized {
    /// Encoded width in bytes
    const SIZE: usize;

    /// Write exactly `SIZE` bytes into `buf`
    fn encode_fixed(&self, buf: &mut [u8]);

    /// Read a value from exactly `SIZE` bytes
    fn decode_fixed(buf: &[u8]) -> Self;
}

// =============================================================================
// Numeric Codecs
// =============================================================================

macro_rules! numeric_codec {
    ($($ty:ty => $id:literal),* $(,)?) => {
        $(
            impl FixedCodec for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode_fixed(&self, buf: &mut [u8]) {
                    buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn decode_fixed(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&buf[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }
            }

            impl Codec for $ty {
                const ID: &'static str = $id;

                fn encode(&self, out: &mut BytesMut) -> Result<()> {
                    out.put_slice(&self.to_le_bytes());
                    Ok(())
                }

                fn decode(bytes: &[u8]) -> Result<Self> {
                    expect_width(bytes, <$ty as FixedCodec>::SIZE, $id)?;
                    Ok(<$ty as FixedCodec>::decode_fixed(bytes))
                }
            }
        )*
    };
}

numeric_codec! {
    u8 => "u8",
    u16 => "u16-le",
    u32 => "u32-le",
    u64 => "u64-le",
    u128 => "u128-le",
    i8 => "i8",
    i16 => "i16-le",
    i32 => "i32-le",
    i64 => "i64-le",
    i128 => "i128-le",
    f32 => "f32-le",
    f64 => "f64-le",
}

fn expect_width(bytes: &[u8], width: usize, id: &str) -> Result<()> {
    if bytes.len() != width {
        return Err(StoreError::Serialization(format!(
            "{} codec expects {} bytes, got {}",
            id,
            width,
            bytes.len()
        )));
    }
    Ok(())
}

impl FixedCodec for bool {
    const SIZE: usize = 1;

    fn encode_fixed(&self, buf: &mut [u8]) {
        buf[0] = u8::from(*self);
    }

    fn decode_fixed(buf: &[u8]) -> Self {
        buf[0] != 0
    }
}

impl Codec for bool {
    const ID: &'static str = "bool";

    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        out.put_u8(u8::from(*self));
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(StoreError::Serialization(format!(
                "invalid bool encoding: {:?}",
                bytes
            ))),
        }
    }
}

// =============================================================================
// Byte and String Codecs
// =============================================================================

impl Codec for String {
    const ID: &'static str = "utf8";

    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        out.put_slice(self.as_bytes());
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StoreError::Serialization(format!("invalid UTF-8: {}", e)))
    }
}

impl Codec for Vec<u8> {
    const ID: &'static str = "raw";

    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        out.put_slice(self);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl Codec for Bytes {
    const ID: &'static str = "raw";

    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        out.put_slice(self);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

// =============================================================================
// Serde Codec
// =============================================================================

/// Wrapper giving any serde type a bincode-backed [`Codec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bincode<T>(pub T);

impl<T> Bincode<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Every `Bincode<T>` shares the ID `"bincode"`, so reopening a kept store
/// cannot tell `Bincode<A>` from `Bincode<B>`. Use a dedicated [`Codec`] impl
/// with its own ID when the payload type must be checked.
impl<T: Serialize + DeserializeOwned> Codec for Bincode<T> {
    const ID: &'static str = "bincode";

    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        bincode::serialize_into(out.writer(), &self.0)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map(Bincode)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Compare two values by their serialized bytes rather than by value equality
pub fn byte_compare<T: Codec>(a: &T, b: &T) -> Result<bool> {
    Ok(a.to_bytes()? == b.to_bytes()?)
}
