//! Gradient noise shared by the CPU layers and the aurora shader.
//!
//! The CPU functions and [`NOISE_WGSL`] implement the same simplex variant
//! (mod-289 permutation polynomial, 7x7 gradient ring) and the same fractal
//! sum: each octave doubles the frequency and halves the weight. The terrain
//! samples the CPU version a few hundred times per regeneration, the aurora
//! fragment shader samples the WGSL version several times per pixel. Results
//! agree in character but are not bit-identical across the two.
//!
//! All functions are pure and return values in roughly `[-1, 1]`.

use glam::{Vec2, Vec3, Vec4};

#[inline]
fn mod289_3(x: Vec3) -> Vec3 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

#[inline]
fn mod289_4(x: Vec4) -> Vec4 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

#[inline]
fn permute4(x: Vec4) -> Vec4 {
    mod289_4((x * 34.0 + Vec4::ONE) * x)
}

#[inline]
fn taylor_inv_sqrt4(r: Vec4) -> Vec4 {
    Vec4::splat(1.792_842_9) - 0.853_734_7 * r
}

#[inline]
fn step3(edge: Vec3, x: Vec3) -> Vec3 {
    Vec3::new(
        if x.x < edge.x { 0.0 } else { 1.0 },
        if x.y < edge.y { 0.0 } else { 1.0 },
        if x.z < edge.z { 0.0 } else { 1.0 },
    )
}

#[inline]
fn step4(edge: Vec4, x: Vec4) -> Vec4 {
    Vec4::new(
        if x.x < edge.x { 0.0 } else { 1.0 },
        if x.y < edge.y { 0.0 } else { 1.0 },
        if x.z < edge.z { 0.0 } else { 1.0 },
        if x.w < edge.w { 0.0 } else { 1.0 },
    )
}

/// 3D simplex noise in roughly `[-1, 1]`.
pub fn noise3(v: Vec3) -> f32 {
    const C: Vec2 = Vec2::new(1.0 / 6.0, 1.0 / 3.0);
    const D: Vec4 = Vec4::new(0.0, 0.5, 1.0, 2.0);

    // First corner
    let mut i = (v + Vec3::splat(v.dot(Vec3::splat(C.y)))).floor();
    let x0 = v - i + Vec3::splat(i.dot(Vec3::splat(C.x)));

    // Other corners
    let g = step3(Vec3::new(x0.y, x0.z, x0.x), x0);
    let l = Vec3::ONE - g;
    let l_zxy = Vec3::new(l.z, l.x, l.y);
    let i1 = g.min(l_zxy);
    let i2 = g.max(l_zxy);

    let x1 = x0 - i1 + Vec3::splat(C.x);
    let x2 = x0 - i2 + Vec3::splat(C.y);
    let x3 = x0 - Vec3::splat(D.y);

    // Permutations
    i = mod289_3(i);
    let p = permute4(
        permute4(
            permute4(Vec4::splat(i.z) + Vec4::new(0.0, i1.z, i2.z, 1.0))
                + Vec4::splat(i.y)
                + Vec4::new(0.0, i1.y, i2.y, 1.0),
        ) + Vec4::splat(i.x)
            + Vec4::new(0.0, i1.x, i2.x, 1.0),
    );

    // Gradients on a 7x7 ring
    let n_ = 0.142_857_15_f32;
    let ns = Vec3::new(n_ * D.w - D.x, n_ * D.y - D.z, n_ * D.z - D.x);

    let j = p - 49.0 * (p * ns.z * ns.z).floor();
    let x_ = (j * ns.z).floor();
    let y_ = (j - 7.0 * x_).floor();

    let x = x_ * ns.x + Vec4::splat(ns.y);
    let y = y_ * ns.x + Vec4::splat(ns.y);
    let h = Vec4::ONE - x.abs() - y.abs();

    let b0 = Vec4::new(x.x, x.y, y.x, y.y);
    let b1 = Vec4::new(x.z, x.w, y.z, y.w);

    let s0 = b0.floor() * 2.0 + Vec4::ONE;
    let s1 = b1.floor() * 2.0 + Vec4::ONE;
    let sh = -step4(h, Vec4::ZERO);

    let a0 = Vec4::new(b0.x, b0.z, b0.y, b0.w)
        + Vec4::new(s0.x, s0.z, s0.y, s0.w) * Vec4::new(sh.x, sh.x, sh.y, sh.y);
    let a1 = Vec4::new(b1.x, b1.z, b1.y, b1.w)
        + Vec4::new(s1.x, s1.z, s1.y, s1.w) * Vec4::new(sh.z, sh.z, sh.w, sh.w);

    let mut p0 = Vec3::new(a0.x, a0.y, h.x);
    let mut p1 = Vec3::new(a0.z, a0.w, h.y);
    let mut p2 = Vec3::new(a1.x, a1.y, h.z);
    let mut p3 = Vec3::new(a1.z, a1.w, h.w);

    let norm = taylor_inv_sqrt4(Vec4::new(p0.dot(p0), p1.dot(p1), p2.dot(p2), p3.dot(p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    // Mix final noise value
    let m = (Vec4::splat(0.6) - Vec4::new(x0.dot(x0), x1.dot(x1), x2.dot(x2), x3.dot(x3)))
        .max(Vec4::ZERO);
    let m = m * m;
    42.0 * (m * m).dot(Vec4::new(p0.dot(x0), p1.dot(x1), p2.dot(x2), p3.dot(x3)))
}

/// 2D simplex noise, the `z = 0` slice of [`noise3`].
#[inline]
pub fn noise2(p: Vec2) -> f32 {
    noise3(p.extend(0.0))
}

/// Fractal Brownian motion over [`noise3`].
pub fn fbm3(p: Vec3, octaves: u32) -> f32 {
    let mut value = 0.0;
    let mut amplitude = 0.5;
    let mut pos = p;
    for _ in 0..octaves {
        value += amplitude * noise3(pos);
        pos *= 2.0;
        amplitude *= 0.5;
    }
    value
}

/// Fractal Brownian motion over [`noise2`].
#[inline]
pub fn fbm2(p: Vec2, octaves: u32) -> f32 {
    fbm3(p.extend(0.0), octaves)
}

/// WGSL source for the same noise functions.
///
/// Defines `noise3`, `noise2`, `fbm3` and `fbm2` with the signatures of the
/// CPU versions (octave counts are `i32` in WGSL).
pub const NOISE_WGSL: &str = r#"
// Gradient noise helpers
fn mod289_3(x: vec3<f32>) -> vec3<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn mod289_4(x: vec4<f32>) -> vec4<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn permute4(x: vec4<f32>) -> vec4<f32> {
    return mod289_4(((x * 34.0) + 1.0) * x);
}

fn taylor_inv_sqrt4(r: vec4<f32>) -> vec4<f32> {
    return 1.79284291400159 - 0.85373472095314 * r;
}

// 3D Simplex noise
fn noise3(v: vec3<f32>) -> f32 {
    let C = vec2<f32>(1.0/6.0, 1.0/3.0);
    let D = vec4<f32>(0.0, 0.5, 1.0, 2.0);

    // First corner
    var i = floor(v + dot(v, vec3(C.y)));
    let x0 = v - i + dot(i, vec3(C.x));

    // Other corners
    let g = step(x0.yzx, x0.xyz);
    let l = 1.0 - g;
    let i1 = min(g.xyz, l.zxy);
    let i2 = max(g.xyz, l.zxy);

    let x1 = x0 - i1 + C.x;
    let x2 = x0 - i2 + C.y;
    let x3 = x0 - D.yyy;

    // Permutations
    i = mod289_3(i);
    let p = permute4(permute4(permute4(
        i.z + vec4<f32>(0.0, i1.z, i2.z, 1.0))
      + i.y + vec4<f32>(0.0, i1.y, i2.y, 1.0))
      + i.x + vec4<f32>(0.0, i1.x, i2.x, 1.0));

    // Gradients
    let n_ = 0.142857142857;
    let ns = n_ * D.wyz - D.xzx;

    let j = p - 49.0 * floor(p * ns.z * ns.z);

    let x_ = floor(j * ns.z);
    let y_ = floor(j - 7.0 * x_);

    let x = x_ * ns.x + ns.yyyy;
    let y = y_ * ns.x + ns.yyyy;
    let h = 1.0 - abs(x) - abs(y);

    let b0 = vec4<f32>(x.xy, y.xy);
    let b1 = vec4<f32>(x.zw, y.zw);

    let s0 = floor(b0) * 2.0 + 1.0;
    let s1 = floor(b1) * 2.0 + 1.0;
    let sh = -step(h, vec4<f32>(0.0));

    let a0 = b0.xzyw + s0.xzyw * sh.xxyy;
    let a1 = b1.xzyw + s1.xzyw * sh.zzww;

    var p0 = vec3<f32>(a0.xy, h.x);
    var p1 = vec3<f32>(a0.zw, h.y);
    var p2 = vec3<f32>(a1.xy, h.z);
    var p3 = vec3<f32>(a1.zw, h.w);

    // Normalize gradients
    let norm = taylor_inv_sqrt4(vec4<f32>(dot(p0,p0), dot(p1,p1), dot(p2,p2), dot(p3,p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    // Mix final noise value
    var m = max(0.6 - vec4<f32>(dot(x0,x0), dot(x1,x1), dot(x2,x2), dot(x3,x3)), vec4<f32>(0.0));
    m = m * m;
    return 42.0 * dot(m*m, vec4<f32>(dot(p0,x0), dot(p1,x1), dot(p2,x2), dot(p3,x3)));
}

// 2D Simplex noise (z = 0 slice)
fn noise2(p: vec2<f32>) -> f32 {
    return noise3(vec3<f32>(p, 0.0));
}

// Fractal Brownian Motion - 3D
fn fbm3(p: vec3<f32>, octaves: i32) -> f32 {
    var value = 0.0;
    var amplitude = 0.5;
    var pos = p;
    for (var i = 0; i < octaves; i++) {
        value += amplitude * noise3(pos);
        pos *= 2.0;
        amplitude *= 0.5;
    }
    return value;
}

// Fractal Brownian Motion - 2D
fn fbm2(p: vec2<f32>, octaves: i32) -> f32 {
    return fbm3(vec3<f32>(p, 0.0), octaves);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, scale: f32) -> impl Iterator<Item = Vec3> {
        (0..n).flat_map(move |i| {
            (0..n).map(move |j| {
                Vec3::new(i as f32 * scale + 0.13, j as f32 * scale - 7.7, (i + j) as f32 * 0.21)
            })
        })
    }

    #[test]
    fn test_noise_is_deterministic() {
        let p = Vec3::new(1.25, -3.5, 0.75);
        assert_eq!(noise3(p), noise3(p));
        assert_eq!(noise2(p.truncate()), noise2(p.truncate()));
    }

    #[test]
    fn test_noise_range() {
        for p in grid(40, 0.37) {
            let n = noise3(p);
            assert!(n.is_finite());
            assert!((-1.05..=1.05).contains(&n), "noise3({p}) = {n}");
        }
    }

    #[test]
    fn test_noise_is_not_constant() {
        let values: Vec<f32> = grid(10, 0.5).map(noise3).collect();
        let min = values.iter().cloned().fold(f32::MAX, f32::min);
        let max = values.iter().cloned().fold(f32::MIN, f32::max);
        assert!(max - min > 0.5);
    }

    #[test]
    fn test_noise_is_continuous() {
        // Small steps in input give small steps in output
        let mut p = Vec3::new(0.3, 0.1, 2.0);
        let mut last = noise3(p);
        for _ in 0..500 {
            p += Vec3::new(0.001, 0.0007, 0.0003);
            let n = noise3(p);
            assert!((n - last).abs() < 0.05);
            last = n;
        }
    }

    #[test]
    fn test_noise2_matches_z_slice() {
        let p = Vec2::new(4.2, -1.1);
        assert_eq!(noise2(p), noise3(Vec3::new(4.2, -1.1, 0.0)));
    }

    #[test]
    fn test_fbm_zero_octaves_is_zero() {
        assert_eq!(fbm3(Vec3::new(1.0, 2.0, 3.0), 0), 0.0);
    }

    #[test]
    fn test_fbm_bounded_by_weight_sum() {
        // Weights 0.5 + 0.25 + 0.125 + 0.0625 < 1
        for p in grid(20, 0.61) {
            let v = fbm3(p, 4);
            assert!(v.abs() <= 1.0, "fbm3({p}) = {v}");
        }
    }

    #[test]
    fn test_fbm_first_octave_is_half_noise() {
        let p = Vec2::new(0.77, 1.9);
        assert!((fbm2(p, 1) - 0.5 * noise2(p)).abs() < 1e-6);
    }
}
