//! Variable-length bit set identifying which entity properties a packet
//! carries.
//!
//! The wire form is big-endian bit-packed: an N-byte encoding leads with N-1
//! one-bits and a zero terminator (MSB-first), and the remaining bit
//! positions are flag presence bits in ascending property order. Decoders
//! tolerate trailing zero bytes, which lets an encoder reserve the block at
//! one length and later clear bits in place.

use bytes::Bytes;

use crate::error::{EntityDataError, EntityDataResult};

/// An ordered set of entity-property indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFlags {
    words: Vec<u64>,
}

impl PropertyFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_has_property(&mut self, id: impl Into<u16>, value: bool) {
        let index = id.into() as usize;
        let word = index / 64;
        if value {
            if self.words.len() <= word {
                self.words.resize(word + 1, 0);
            }
            self.words[word] |= 1 << (index % 64);
        } else if word < self.words.len() {
            self.words[word] &= !(1 << (index % 64));
        }
    }

    pub fn get_has_property(&self, id: impl Into<u16>) -> bool {
        let index = id.into() as usize;
        self.words
            .get(index / 64)
            .is_some_and(|word| word >> (index % 64) & 1 == 1)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    /// Highest set flag index, if any.
    pub fn max_flag(&self) -> Option<u16> {
        for (i, word) in self.words.iter().enumerate().rev() {
            if *word != 0 {
                return Some((i * 64 + 63 - word.leading_zeros() as usize) as u16);
            }
        }
        None
    }

    /// Set flag indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            (0..64)
                .filter(move |bit| word >> bit & 1 == 1)
                .map(move |bit| (i * 64 + bit) as u16)
        })
    }

    /// Set union.
    pub fn union_with(&mut self, other: &PropertyFlags) {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, other_word) in self.words.iter_mut().zip(&other.words) {
            *word |= other_word;
        }
    }

    /// Set difference: removes every flag present in `other`.
    pub fn difference_with(&mut self, other: &PropertyFlags) {
        for (word, other_word) in self.words.iter_mut().zip(&other.words) {
            *word &= !other_word;
        }
    }

    /// Bytes the natural encoding of this set occupies.
    pub fn encoded_size(&self) -> usize {
        let Some(max_flag) = self.max_flag() else {
            return 1;
        };
        let flag_bits = max_flag as usize + 1;
        let mut bytes = 1;
        while flag_bits + bytes > bytes * 8 {
            bytes += 1;
        }
        bytes
    }

    /// Encodes at the natural length.
    pub fn encode(&self) -> Bytes {
        let mut out = vec![0u8; self.encoded_size()];
        self.write_encoded(&mut out);
        Bytes::from(out)
    }

    /// Encodes into a caller-sized block: the header claims `out.len()`
    /// bytes and unused flag positions stay zero. The set's highest flag
    /// must fit, i.e. `out.len() >= encoded_size()`.
    pub fn write_encoded(&self, out: &mut [u8]) {
        out.fill(0);
        let len = out.len();
        debug_assert!(len >= self.encoded_size());

        for bit in 0..len - 1 {
            out[bit / 8] |= 0x80 >> (bit % 8);
        }
        for flag in self.iter() {
            let bit = len + flag as usize;
            if bit < len * 8 {
                out[bit / 8] |= 0x80 >> (bit % 8);
            }
        }
    }

    /// Decodes a set from the front of `bytes`, returning it with the number
    /// of bytes consumed.
    pub fn decode(bytes: &[u8]) -> EntityDataResult<(Self, usize)> {
        if bytes.is_empty() {
            return Err(EntityDataError::Truncated {
                need: 1,
                offset: 0,
                have: 0,
            });
        }

        let mut len = 1;
        'outer: for byte in bytes {
            for shift in (0..8).rev() {
                if byte >> shift & 1 == 1 {
                    len += 1;
                } else {
                    break 'outer;
                }
            }
        }

        if bytes.len() < len {
            return Err(EntityDataError::Truncated {
                need: len,
                offset: 0,
                have: bytes.len(),
            });
        }

        let mut flags = PropertyFlags::new();
        for bit in len..len * 8 {
            if bytes[bit / 8] >> (7 - bit % 8) & 1 == 1 {
                flags.set_has_property((bit - len) as u16, true);
            }
        }

        Ok((flags, len))
    }
}

impl FromIterator<u16> for PropertyFlags {
    fn from_iter<T: IntoIterator<Item = u16>>(iter: T) -> Self {
        let mut flags = PropertyFlags::new();
        for id in iter {
            flags.set_has_property(id, true);
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_encodes_to_one_zero_byte() {
        let flags = PropertyFlags::new();
        assert_eq!(&flags.encode()[..], &[0u8]);
        let (decoded, read) = PropertyFlags::decode(&[0]).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(read, 1);
    }

    #[test]
    fn known_block_layout() {
        // Flags 17 and 84 need 13 bytes: 12 lead ones, terminator, then the
        // flag bits offset by the 13-bit header.
        let flags: PropertyFlags = [17u16, 84].into_iter().collect();
        assert_eq!(flags.encoded_size(), 13);
        assert_eq!(
            &flags.encode()[..],
            &[
                0xFF, 0xF0, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40
            ]
        );
    }

    #[test]
    fn encode_decode_identity() {
        for set in [
            vec![0u16],
            vec![6],
            vec![7],
            vec![0, 1, 2, 3],
            vec![17, 84],
            vec![84],
            vec![126],
            vec![2, 40, 91, 126],
            (0..127).collect::<Vec<u16>>(),
        ] {
            let flags: PropertyFlags = set.iter().copied().collect();
            let encoded = flags.encode();
            let (decoded, read) = PropertyFlags::decode(&encoded).unwrap();
            assert_eq!(decoded, flags, "set {:?}", set);
            assert_eq!(read, encoded.len());
        }
    }

    #[test]
    fn decode_tolerates_trailing_zero_bytes() {
        let flags: PropertyFlags = [84u16].into_iter().collect();
        let mut block = vec![0u8; 13];
        flags.write_encoded(&mut block);
        block.extend_from_slice(&[0, 0, 0]);
        let (decoded, read) = PropertyFlags::decode(&block).unwrap();
        assert_eq!(decoded, flags);
        assert_eq!(read, 13);
    }

    #[test]
    fn fixed_length_block_survives_bit_clearing() {
        let requested: PropertyFlags = [17u16, 84].into_iter().collect();
        let mut block = vec![0u8; requested.encoded_size()];

        let written: PropertyFlags = [84u16].into_iter().collect();
        written.write_encoded(&mut block);
        assert_eq!(
            block,
            vec![0xFF, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40]
        );

        let (decoded, _) = PropertyFlags::decode(&block).unwrap();
        assert_eq!(decoded, written);
    }

    #[test]
    fn union_and_difference() {
        let mut a: PropertyFlags = [1u16, 5, 90].into_iter().collect();
        let b: PropertyFlags = [5u16, 7].into_iter().collect();

        a.union_with(&b);
        assert!(a.get_has_property(7u16));

        a.difference_with(&b);
        assert!(!a.get_has_property(5u16));
        assert!(!a.get_has_property(7u16));
        assert!(a.get_has_property(90u16));
    }

    #[test]
    fn truncated_block_is_an_error() {
        let flags: PropertyFlags = [84u16].into_iter().collect();
        let encoded = flags.encode();
        assert!(matches!(
            PropertyFlags::decode(&encoded[..encoded.len() - 1]),
            Err(EntityDataError::Truncated { .. })
        ));
    }
}
