//! Threshold secret sharing over GF(256)
//!
//! Splits a byte secret into N shards with reconstruction threshold K.
//! Each secret byte is protected by its own random polynomial of degree
//! K-1 whose constant term is the secret byte; shard i carries the
//! evaluations at x = i plus that x-coordinate as its trailing byte.
//! Any K shards reconstruct the secret exactly via Lagrange interpolation
//! at zero; fewer than K reveal nothing about it.

use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};
use crate::types::Shard;

/// Split `secret` into `n` shards, any `k` of which reconstruct it
pub fn split(secret: &[u8], n: u8, k: u8) -> Result<Vec<Shard>> {
    if secret.is_empty() {
        return Err(CoreError::ShareCorrupt("cannot split an empty secret".to_string()));
    }
    if k < 2 || k > n {
        return Err(CoreError::InvalidThreshold { threshold: k, count: n });
    }

    let mut rng = rand::rngs::OsRng;
    let mut shards: Vec<Vec<u8>> = (0..n)
        .map(|_| Vec::with_capacity(secret.len() + 1))
        .collect();

    // One random polynomial per secret byte; coefficient 0 is the byte itself
    let mut coeffs = Zeroizing::new(vec![0u8; k as usize]);
    for &byte in secret {
        coeffs[0] = byte;
        rng.fill_bytes(&mut coeffs[1..]);

        for (i, shard) in shards.iter_mut().enumerate() {
            let x = (i + 1) as u8;
            shard.push(gf256::eval(&coeffs, x));
        }
    }

    Ok(shards
        .into_iter()
        .enumerate()
        .map(|(i, mut bytes)| {
            bytes.push((i + 1) as u8);
            Shard::new(bytes)
        })
        .collect())
}

/// Reconstruct the secret from `k` shards.
///
/// Only the first `k` supplied shards participate in interpolation. A
/// well-formed but wrong shard is not detectable here; callers verify the
/// reconstructed secret against independent state.
pub fn combine(shards: &[Shard], k: u8) -> Result<Zeroizing<Vec<u8>>> {
    if shards.len() < k as usize {
        return Err(CoreError::ShareCountInsufficient {
            needed: k as usize,
            got: shards.len(),
        });
    }

    let quorum = &shards[..k as usize];
    let len = quorum[0].len();
    if len < 2 {
        return Err(CoreError::ShareCorrupt("shard too short".to_string()));
    }
    if quorum.iter().any(|s| s.len() != len) {
        return Err(CoreError::ShareCorrupt("shard length mismatch".to_string()));
    }

    let xs: Vec<u8> = quorum
        .iter()
        .map(|s| s.as_bytes()[len - 1])
        .collect();
    if xs.contains(&0) {
        return Err(CoreError::ShareCorrupt("zero x-coordinate".to_string()));
    }
    for (i, x) in xs.iter().enumerate() {
        if xs[..i].contains(x) {
            return Err(CoreError::ShareCorrupt("duplicate x-coordinate".to_string()));
        }
    }

    let mut secret = Zeroizing::new(vec![0u8; len - 1]);
    let mut points = vec![(0u8, 0u8); quorum.len()];
    for (i, byte) in secret.iter_mut().enumerate() {
        for (p, shard) in points.iter_mut().zip(quorum) {
            *p = (shard.as_bytes()[len - 1], shard.as_bytes()[i]);
        }
        *byte = gf256::interpolate_at_zero(&points);
    }

    Ok(secret)
}

/// Arithmetic in GF(2^8) with the AES reduction polynomial
mod gf256 {
    /// Carry-less multiplication modulo x^8 + x^4 + x^3 + x + 1
    pub fn mul(mut a: u8, mut b: u8) -> u8 {
        let mut out = 0u8;
        while b != 0 {
            if b & 1 != 0 {
                out ^= a;
            }
            let carry = a & 0x80;
            a <<= 1;
            if carry != 0 {
                a ^= 0x1b;
            }
            b >>= 1;
        }
        out
    }

    /// Multiplicative inverse via a^254; zero maps to zero
    pub fn inv(a: u8) -> u8 {
        let mut out = a;
        for _ in 0..253 {
            out = mul(out, a);
        }
        out
    }

    pub fn div(a: u8, b: u8) -> u8 {
        mul(a, inv(b))
    }

    /// Horner evaluation of a polynomial given in increasing-degree order
    pub fn eval(coeffs: &[u8], x: u8) -> u8 {
        let mut acc = 0u8;
        for &c in coeffs.iter().rev() {
            acc = mul(acc, x) ^ c;
        }
        acc
    }

    /// Lagrange interpolation of f(0) from (x, y) points with distinct
    /// non-zero x values
    pub fn interpolate_at_zero(points: &[(u8, u8)]) -> u8 {
        let mut acc = 0u8;
        for (i, &(xi, yi)) in points.iter().enumerate() {
            let mut num = 1u8;
            let mut den = 1u8;
            for (j, &(xj, _)) in points.iter().enumerate() {
                if i != j {
                    num = mul(num, xj);
                    // Subtraction is XOR in GF(2^8)
                    den = mul(den, xj ^ xi);
                }
            }
            acc ^= mul(div(num, den), yi);
        }
        acc
    }

}
