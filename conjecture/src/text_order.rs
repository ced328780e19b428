use std::sync::LazyLock;

// Bytewise order is a poor way to compare human-readable output: it sorts
// control characters first. This is the canonical "niceness" order instead:
// digits, then letters interleaved by case, then space, then punctuation
// roughly by how structural it is, with control characters dead last.
// Bytes outside ASCII keep their own value.
const CHR_ORDER: &[u8] = b"0123456789\
AaBbCcDdEeFfGgHhIiJjKkLlMmNnOoPpQqRrSsTtUuVvWwXxYyZz \
_-=~\"':;,.?!(){}[]<>*+/&|%#$@\\^`\t\n\r\
\x00\x01\x02\x03\x04\x05\x06\x07\x08\
\x0b\x0c\x0e\x0f\x10\x11\x12\x13\x14\
\x15\x16\x17\x18\x19\x1a\x1b\x1c\x1d\x1e\x1f";

/// Rank of every byte under the canonical text order. A permutation of
/// `0..=255`; bytes `>= 127` map to themselves.
pub static TEXT_BYTE_ORDER: LazyLock<[u8; 256]> = LazyLock::new(|| {
    let mut order = [0u8; 256];
    for (rank, &byte) in CHR_ORDER.iter().enumerate() {
        order[byte as usize] = rank as u8;
    }
    for byte in 127..256usize {
        order[byte] = byte as u8;
    }
    order
});

/// The position of `byte` in the canonical text order.
pub fn text_rank(byte: u8) -> u8 {
    TEXT_BYTE_ORDER[byte as usize]
}
