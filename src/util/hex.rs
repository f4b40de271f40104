//! Converting octets to hex strings.

use std::str;


/// Encodes a octet sequence as a hex string.
///
/// The function uses `dest` as the buffer for encoding which therefore must
/// be exactly twice the length of `src`. It returns a reference to this
/// buffer as a `&str`.
///
/// # Panics
///
/// The function panics if `dest` is shorter than twice the length of `src`.
pub fn encode<'a>(src: &[u8], dest: &'a mut [u8]) -> &'a str {
    let dest = &mut dest[..src.len() * 2];
    for (s, d) in src.iter().zip(dest.chunks_mut(2)) {
        d[0] = DIGITS[usize::from(s >> 4)];
        d[1] = DIGITS[usize::from(s & 0x0F)];
    }
    // DIGITS only contains ASCII characters.
    unsafe { str::from_utf8_unchecked(dest) }
}

/// Encodes a octet sequence as a newly allocated uppercase hex string.
pub fn encode_upper(src: &[u8]) -> String {
    let mut buf = vec![0u8; src.len() * 2];
    encode(src, &mut buf).to_string()
}

const DIGITS: &[u8] = b"0123456789ABCDEF";


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_into_buffer() {
        let mut buf = [0u8; 8];
        assert_eq!(encode(b"\x00\xff\x0a\xbc", &mut buf), "00FF0ABC");
    }

    #[test]
    fn encode_upper_empty() {
        assert_eq!(encode_upper(b""), "");
    }

    #[test]
    #[should_panic]
    fn encode_short_buffer() {
        let mut buf = [0u8; 3];
        encode(b"\x01\x02", &mut buf);
    }
}
