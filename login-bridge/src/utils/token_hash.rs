//! ptlogin 令牌哈希
//!
//! 两个哈希共用同一递推: `acc = acc + (acc << 5) + c`,
//! 按 UTF-16 码元迭代,在 32 位有符号整数上自然回绕,结果取低 31 位。
//! 仅用于协议令牌,不具备任何密码学强度。

/// 掩码: 保留低 31 位
const TOKEN_MASK: i32 = 0x7fff_ffff;

/// `hash_b` 的初始值
const GTK_SEED: i32 = 5381;

fn rolling_hash(input: &str, seed: i32) -> u32 {
    let acc = input.encode_utf16().fold(seed, |acc, unit| {
        acc.wrapping_add(acc.wrapping_shl(5))
            .wrapping_add(i32::from(unit))
    });
    (acc & TOKEN_MASK) as u32
}

/// 轮询令牌哈希 (初始值 0)
///
/// `hash_a(qrsig)` 即每次调用 ptqrlogin 时必须携带的 `ptqrtoken`。
pub fn hash_a(input: &str) -> u32 {
    rolling_hash(input, 0)
}

/// g_tk 哈希 (初始值 5381)
pub fn hash_b(input: &str) -> u32 {
    rolling_hash(input, GTK_SEED)
}

/// 根据 `p_skey` (或 `skey`) 计算空间类接口所需的 `g_tk`
pub fn g_tk(p_skey: &str) -> u32 {
    hash_b(p_skey)
}
