pub const FNV_BASIS : u64 = 0xcbf2_9ce4_8422_2325;
pub const FNV_PRIME : u64 = 0x0000_0100_0000_01b3;

/// Seeded FNV-1a over a byte string.
///
/// We aren't interested in strong cryptography, but rather a cheap mix
/// that is stable for the lifetime of the table that owns the seed.
pub fn sum64(seed: u64, bytes: &[u8]) -> u64 {
   let mut hash = FNV_BASIS ^ seed;
   for &byte in bytes {
      hash ^= byte as u64;
      hash = hash.wrapping_mul(FNV_PRIME);
   }
   hash
}
