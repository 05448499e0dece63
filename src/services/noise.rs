/// Deterministic per-product jitter in `[0, 1)`.
///
/// Mixes the low 32 bits of the product id with the session seed through a
/// xorshift32 round (<<13, >>17, <<5). Same inputs always give the same bits;
/// a different seed reshuffles every product. Not suitable for anything
/// security-related.
pub fn noise(item_id: i64, session_seed: u32) -> f64 {
    let mut x = (item_id as u32) ^ session_seed;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    // 2^32 as divisor keeps u32::MAX strictly below 1.0
    f64::from(x) / (f64::from(u32::MAX) + 1.0)
}
