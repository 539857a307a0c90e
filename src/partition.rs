use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroU32;

/// Map a key to its partition id in `0..max_partitions`.
///
/// The key's hash is scrambled with the murmur3 64-bit finalizer before the
/// modulo, so keys whose hashes differ only in high bits still spread
/// across partitions. The result is stable for a given key within one build.
///
/// 将 key 映射到 `0..max_partitions` 范围内的分区 id。
/// 在取模之前用 murmur3 64 位终结函数打散 key 的哈希，
/// 使只有高位不同的哈希也能分散到不同分区。
pub fn assign_to_partition<K: Hash + ?Sized>(key: &K, max_partitions: NonZeroU32) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let scrambled = fmix64(hasher.finish());
    // The remainder is < max_partitions, which fits in u32.
    (scrambled % u64::from(max_partitions.get())) as u32
}

#[inline]
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_in_range_and_stable() {
        let max = NonZeroU32::new(16).unwrap();
        for key in 0..1000u64 {
            let p = assign_to_partition(&key, max);
            assert!(p < 16);
            assert_eq!(p, assign_to_partition(&key, max));
        }
    }

    #[test]
    fn single_partition_takes_everything() {
        let max = NonZeroU32::new(1).unwrap();
        assert_eq!(assign_to_partition("any", max), 0);
        assert_eq!(assign_to_partition(&42i32, max), 0);
    }

    #[test]
    fn keys_spread_over_partitions() {
        let max = NonZeroU32::new(8).unwrap();
        let mut seen = [false; 8];
        for key in 0..256u32 {
            seen[assign_to_partition(&key, max) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
