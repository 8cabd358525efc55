// Copyright 2021-2022 CipherSwap Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

//! Strict binary encoding shared by both swap participants. Everything that ends up hashed into a
//! contract id, a transfer prefix or a Fiat-Shamir transcript goes through [`Encodable`] so that
//! two independent implementations derive the same bytes.
//!
//! Foreign curve types implement [`CanonicalBytes`] with their native 32-byte encoding; the
//! encoder wraps them with a length prefix when they are embedded in a larger structure.

use hex::encode as hex_encode;
use thiserror::Error;
use uuid::Uuid;

use std::error;
use std::io;
use std::str;

/// Encoding and decoding errors.
#[derive(Error, Debug)]
pub enum Error {
    /// The discriminant read does not map to any known variant.
    #[error("Unknown consensus type")]
    UnknownType,
    /// The type is not the one expected.
    #[error("Type mismatch, the given type does not match the expected one")]
    TypeMismatch,
    /// And I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// A generic parsing error.
    #[error("Parsing error: {0}")]
    ParseFailed(&'static str),
    /// Any Consensus error not part of this list.
    #[error("Consensus error: {0}")]
    Other(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    /// Creates a new error of type [`Self::Other`] with an arbitrary payload. Useful to carry
    /// lower-level errors.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Self::Other(error.into())
    }

    /// Consumes the `Error`, returning its inner error (if any).
    ///
    /// If this [`enum@Error`] was constructed via [`new`] then this function will return [`Some`],
    /// otherwise it will return [`None`].
    ///
    /// [`new`]: Error::new
    pub fn into_inner(self) -> Option<Box<dyn error::Error + Send + Sync>> {
        match self {
            Self::Other(error) => Some(error),
            _ => None,
        }
    }
}

/// Data represented in a canonical bytes format, without any length prefix. Implemented on the
/// curve types (points, scalars, key images) embedded in swap and transfer structures.
pub trait CanonicalBytes {
    /// Returns the canonical bytes representation of the element.
    fn as_canonical_bytes(&self) -> Vec<u8>;

    /// Parse a supposedly canonical bytes representation of an element and return it, return an
    /// error if not canonical.
    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, Error>
    where
        Self: Sized;
}

/// Encode an object into a vector of bytes. The vector can be [`deserialize`]d to retrieve the
/// data.
pub fn serialize<T: Encodable + ?Sized>(data: &T) -> Vec<u8> {
    let mut encoder = Vec::new();
    let len = data
        .consensus_encode(&mut encoder)
        .expect("in-memory writers never fail");
    debug_assert_eq!(len, encoder.len());
    encoder
}

/// Encode an object into a hex-encoded string.
pub fn serialize_hex<T: Encodable + ?Sized>(data: &T) -> String {
    hex_encode(serialize(data))
}

/// Deserialize an object from a slice of bytes, fails if the slice is not consumed entirely.
pub fn deserialize<T: Decodable>(data: &[u8]) -> Result<T, Error> {
    let (rv, consumed) = deserialize_partial(data)?;

    if consumed == data.len() {
        Ok(rv)
    } else {
        Err(Error::ParseFailed(
            "data not consumed entirely when explicitly deserializing",
        ))
    }
}

/// Deserialize an object from a slice of bytes and return the number of bytes consumed.
pub fn deserialize_partial<T: Decodable>(data: &[u8]) -> Result<(T, usize), Error> {
    let mut decoder = io::Cursor::new(data);
    let rv = Decodable::consensus_decode(&mut decoder)?;
    let consumed = decoder.position() as usize;

    Ok((rv, consumed))
}

/// Data which can be encoded in a consensus-consistent way.
pub trait Encodable {
    /// Encode an object with a well-defined format, returns the number of bytes written. The only
    /// errors returned are errors propagated from the writer.
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error>;
}

/// Data which can be decoded in a consensus-consistent way.
pub trait Decodable: Sized {
    /// Decode an object with a well-defined format
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, Error>;
}

impl<T> Encodable for Vec<T>
where
    T: Encodable,
{
    #[inline]
    fn consensus_encode<S: io::Write>(&self, s: &mut S) -> Result<usize, io::Error> {
        if self.len() > u16::MAX as usize {
            return Err(io::Error::new(io::ErrorKind::Other, "Value is too long"));
        }
        let mut len = (self.len() as u16).consensus_encode(s)?;
        for t in self {
            len += t.consensus_encode(s)?;
        }
        Ok(len)
    }
}

impl<T> Decodable for Vec<T>
where
    T: Decodable,
{
    #[inline]
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, Error> {
        let len = u16::consensus_decode(d)?;
        let mut ret = Vec::<T>::with_capacity(len as usize);
        for _ in 0..len {
            ret.push(Decodable::consensus_decode(d)?);
        }
        Ok(ret)
    }
}

macro_rules! impl_fixed_array {
    ($len: expr) => {
        impl Encodable for [u8; $len] {
            #[inline]
            fn consensus_encode<S: io::Write>(&self, s: &mut S) -> Result<usize, io::Error> {
                s.write_all(&self[..])?;
                Ok($len)
            }
        }

        impl Decodable for [u8; $len] {
            #[inline]
            fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, Error> {
                let mut buffer = [0u8; $len];
                d.read_exact(&mut buffer)?;
                Ok(buffer)
            }
        }
    };
}

impl_fixed_array!(8);
impl_fixed_array!(16);
impl_fixed_array!(32);

macro_rules! impl_le_integer {
    ($int: ty, $size: expr) => {
        impl Encodable for $int {
            #[inline]
            fn consensus_encode<S: io::Write>(&self, s: &mut S) -> Result<usize, io::Error> {
                s.write_all(&self.to_le_bytes())?;
                Ok($size)
            }
        }

        impl Decodable for $int {
            #[inline]
            fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, Error> {
                let mut buffer = [0u8; $size];
                d.read_exact(&mut buffer)?;
                Ok(<$int>::from_le_bytes(buffer))
            }
        }
    };
}

impl_le_integer!(u8, 1);
impl_le_integer!(u16, 2);
impl_le_integer!(u32, 4);
impl_le_integer!(u64, 8);
impl_le_integer!(u128, 16);

/// Decode a length-prefixed byte vector from a reader.
#[macro_export]
macro_rules! unwrap_vec_ref {
    ($reader: ident) => {{
        let v: Vec<u8> = $crate::consensus::Decodable::consensus_decode($reader)?;
        v
    }};
}

impl Encodable for bool {
    #[inline]
    fn consensus_encode<S: io::Write>(&self, s: &mut S) -> Result<usize, io::Error> {
        (*self as u8).consensus_encode(s)
    }
}

impl Decodable for bool {
    #[inline]
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, Error> {
        match u8::consensus_decode(d)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::UnknownType),
        }
    }
}

impl<T> Encodable for Option<T>
where
    T: Encodable,
{
    #[inline]
    fn consensus_encode<S: io::Write>(&self, s: &mut S) -> Result<usize, io::Error> {
        match self {
            Some(t) => {
                s.write_all(&[1u8])?;
                let len = t.consensus_encode(s)?;
                Ok(1 + len)
            }
            None => s.write_all(&[0u8]).map(|_| 1),
        }
    }
}

impl<T> Decodable for Option<T>
where
    T: Decodable,
{
    #[inline]
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, Error> {
        match u8::consensus_decode(d)? {
            1u8 => Ok(Some(Decodable::consensus_decode(d)?)),
            0u8 => Ok(None),
            _ => Err(Error::UnknownType),
        }
    }
}

impl Encodable for String {
    #[inline]
    fn consensus_encode<S: io::Write>(&self, s: &mut S) -> Result<usize, io::Error> {
        Vec::<u8>::from(self.as_bytes()).consensus_encode(s)
    }
}

impl Decodable for String {
    #[inline]
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, Error> {
        Ok(str::from_utf8(unwrap_vec_ref!(d).as_ref())
            .map_err(Error::new)?
            .into())
    }
}

impl Encodable for Uuid {
    #[inline]
    fn consensus_encode<S: io::Write>(&self, s: &mut S) -> Result<usize, io::Error> {
        self.as_bytes().consensus_encode(s)
    }
}

impl Decodable for Uuid {
    #[inline]
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, Error> {
        let bytes: [u8; 16] = Decodable::consensus_decode(d)?;
        Ok(Uuid::from_bytes(bytes))
    }
}

/// Implements `StrictEncode` and `StrictDecode` for a type through its consensus encoding.
#[macro_export]
macro_rules! impl_strict_encoding {
    ($thing:ty) => {
        impl ::strict_encoding::StrictEncode for $thing {
            fn strict_encode<E: ::std::io::Write>(
                &self,
                mut e: E,
            ) -> Result<usize, ::strict_encoding::Error> {
                $crate::consensus::Encodable::consensus_encode(self, &mut e)
                    .map_err(::strict_encoding::Error::from)
            }
        }

        impl ::strict_encoding::StrictDecode for $thing {
            fn strict_decode<D: ::std::io::Read>(
                mut d: D,
            ) -> Result<Self, ::strict_encoding::Error> {
                $crate::consensus::Decodable::consensus_decode(&mut d)
                    .map_err(|e| ::strict_encoding::Error::DataIntegrityError(e.to_string()))
            }
        }
    };
}

/// Implements [`Encodable`] and [`Decodable`] for a type implementing [`CanonicalBytes`], the
/// canonical bytes are length prefixed.
#[macro_export]
macro_rules! impl_canonical_encoding {
    ($thing:ty) => {
        impl $crate::consensus::Encodable for $thing {
            fn consensus_encode<W: ::std::io::Write>(
                &self,
                writer: &mut W,
            ) -> Result<usize, ::std::io::Error> {
                let bytes = $crate::consensus::CanonicalBytes::as_canonical_bytes(self);
                $crate::consensus::Encodable::consensus_encode(&bytes, writer)
            }
        }

        impl $crate::consensus::Decodable for $thing {
            fn consensus_decode<D: ::std::io::Read>(
                d: &mut D,
            ) -> Result<Self, $crate::consensus::Error> {
                let bytes = $crate::unwrap_vec_ref!(d);
                $crate::consensus::CanonicalBytes::from_canonical_bytes(&bytes)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endianness_test() {
        assert_eq!(&[0xef, 0xbe, 0xad, 0xde], &serialize(&0xdeadbeefu32)[..]);
        assert_eq!(
            deserialize::<u32>(&[0xef, 0xbe, 0xad, 0xde]).unwrap(),
            0xdeadbeef
        );
        assert_eq!(serialize(&1u128).len(), 16);
        assert_eq!(serialize(&1u128)[0], 0x01);
    }

    #[test]
    fn length_prefixed_vec() {
        let vec: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef];
        // len of 4 as u16 in little endian = 0400
        assert_eq!(serialize_hex(&vec), "0400deadbeef");
        let vec = vec![0x41; u16::MAX.into()];
        assert_eq!(deserialize::<Vec<u8>>(&serialize(&vec)[..]).unwrap(), vec);
        let too_long = vec![0x41u8; u16::MAX as usize + 1];
        assert!(too_long.consensus_encode(&mut Vec::new()).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        assert!(deserialize::<u16>(&[0x01, 0x00, 0xff]).is_err());
        let (value, consumed) = deserialize_partial::<u16>(&[0x01, 0x00, 0xff]).unwrap();
        assert_eq!(value, 1);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn invalid_option_and_bool_tags() {
        assert!(matches!(
            deserialize::<Option<u8>>(&[0x02, 0x00]),
            Err(Error::UnknownType)
        ));
        assert!(matches!(deserialize::<bool>(&[0x07]), Err(Error::UnknownType)));
        assert_eq!(deserialize::<Option<u8>>(&[0x00]).unwrap(), None);
    }

    #[test]
    fn uuid_is_sixteen_raw_bytes() {
        let id = Uuid::new_v4();
        let bytes = serialize(&id);
        assert_eq!(&bytes[..], id.as_bytes());
        assert_eq!(deserialize::<Uuid>(&bytes).unwrap(), id);
    }
}
