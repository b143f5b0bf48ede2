//! Integer helpers and the position hashes that drive every procedural choice.
//!
//! All arithmetic here wraps; the hashes must stay bit-exact across platforms.

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;
const MIX_MUL_1: u64 = 0xbf58_476d_1ce4_e5b9;
const MIX_MUL_2: u64 = 0x94d0_49bb_1331_11eb;
const Y_MUL: u64 = 0xc2b2_ae3d_27d4_eb4f;

/// Mathematical floor of `a / b`. Returns 0 when `b == 0`.
pub fn floor_div(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    a.div_euclid(b)
}

/// Non-negative remainder for positive `b`. Returns 0 when `b == 0`.
pub fn modulo(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    a.rem_euclid(b)
}

/// SplitMix64 finaliser.
pub fn mix64(z: u64) -> u64 {
    let mut z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(MIX_MUL_1);
    z = (z ^ (z >> 27)).wrapping_mul(MIX_MUL_2);
    z ^ (z >> 31)
}

// Coordinates are truncated to 32 bits then zero-extended.
fn lane(v: i64) -> u64 {
    u64::from(v as i32 as u32)
}

pub fn hash2(seed: i64, x: i64, z: i64) -> u64 {
    let h = (seed as u64)
        ^ lane(x).wrapping_mul(GOLDEN_GAMMA)
        ^ lane(z).wrapping_mul(MIX_MUL_1);
    mix64(h)
}

pub fn hash3(seed: i64, x: i64, y: i64, z: i64) -> u64 {
    let h = (seed as u64)
        ^ lane(x).wrapping_mul(GOLDEN_GAMMA)
        ^ lane(y).wrapping_mul(Y_MUL)
        ^ lane(z).wrapping_mul(MIX_MUL_1);
    mix64(h)
}

pub fn clamp_permille(v: i32) -> i32 {
    v.clamp(0, 1000)
}

/// `(base * scale + 500) / 1000`, capped at 1000. A non-positive scale is the identity.
pub fn scale_permille(base: u64, scale: i32) -> u64 {
    let scale = if scale <= 0 { 1000 } else { scale as u64 };
    let scaled = (base.saturating_mul(scale) + 500) / 1000;
    scaled.min(1000)
}
