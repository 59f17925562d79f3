//! SchnorrQ signatures over the FourQ curve.
//!
//! FourQ is the twisted Edwards curve `-x^2 + y^2 = 1 + d*x^2*y^2` over `GF(p^2)`,
//! `p = 2^127 - 1`, `i^2 = -1`. Points are encoded as the 32-byte little-endian `y` coordinate
//! (`y0` then `y1`) with the sign of `x` in the top bit. Scalars are reduced modulo the
//! prime subgroup order using only their low 256 bits.
//!
//! Scalar multiplication processes every bit with a masked select, but field inversion and
//! point decoding are not constant time.

use zeroize::Zeroizing;

use crate::digest::k12;

/// Field prime `2^127 - 1`.
const P: u128 = u128::MAX >> 1;
/// Inverse of two modulo `P`.
const HALF: u128 = 1 << 126;

/// Prime subgroup order, little-endian 64-bit limbs.
const ORDER: Scalar = Scalar([
    0x2FB2_540E_C776_8CE7,
    0xDFBD_004D_FE0F_7999,
    0xF053_9782_9CBC_14E5,
    0x0029_CBC1_4E5E_0A72,
]);

/// Curve parameter `d`.
const CURVE_D: Fp2 = Fp2 {
    re: 0x0000_0000_0000_00E4_0000_0000_0000_0142,
    im: 0x5E47_2F84_6657_E0FC_B382_1488_F1FC_0C8D,
};

/// Affine `x` of the generator.
const GENERATOR_X: Fp2 = Fp2 {
    re: 0x1A34_7223_7C2F_B305_2865_92AD_7B38_33AA,
    im: 0x1E1F_553F_2878_AA9C_9686_9FB3_60AC_77F6,
};

/// Affine `y` of the generator.
const GENERATOR_Y: Fp2 = Fp2 {
    re: 0x0E3F_EE9B_A120_785A_B924_A246_2BCB_B287,
    im: 0x6E1C_4AF8_630E_0242_49A7_C344_844C_8B5C,
};

/// Encoded point size.
pub(crate) const POINT_LEN: usize = 32;
/// Signature size: encoded commitment followed by the response scalar.
pub(crate) const SIGNATURE_LEN: usize = 64;

/// Folds a value below `2^128` into `[0, P)`.
const fn fp_reduce(value: u128) -> u128 {
    let folded = (value & P).wrapping_add(value >> 127);
    if folded >= P {
        folded.wrapping_sub(P)
    } else {
        folded
    }
}

/// Sum in `GF(p)`.
const fn fp_add(a: u128, b: u128) -> u128 {
    fp_reduce(a.wrapping_add(b))
}

/// Negation in `GF(p)`.
const fn fp_neg(a: u128) -> u128 {
    fp_reduce(P.wrapping_sub(a))
}

/// Difference in `GF(p)`.
const fn fp_sub(a: u128, b: u128) -> u128 {
    fp_add(a, fp_neg(b))
}

/// Full 256-bit product as `(high, low)`.
const fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    let a0 = a as u64 as u128;
    let a1 = a >> 64;
    let b0 = b as u64 as u128;
    let b1 = b >> 64;
    let ll = a0.wrapping_mul(b0);
    let lh = a0.wrapping_mul(b1);
    let hl = a1.wrapping_mul(b0);
    let hh = a1.wrapping_mul(b1);
    let mid = (ll >> 64)
        .wrapping_add(lh as u64 as u128)
        .wrapping_add(hl as u64 as u128);
    let low = (ll as u64 as u128) | ((mid as u64 as u128) << 64);
    let high = hh
        .wrapping_add(lh >> 64)
        .wrapping_add(hl >> 64)
        .wrapping_add(mid >> 64);
    (high, low)
}

/// Product in `GF(p)`.
const fn fp_mul(a: u128, b: u128) -> u128 {
    let (high, low) = mul_wide(a, b);
    // 2^127 = 1 and 2^128 = 2 modulo P; high < 2^126.
    fp_reduce(
        (low & P)
            .wrapping_add(low >> 127)
            .wrapping_add(high << 1),
    )
}

/// `base^exponent` in `GF(p)`.
fn fp_pow(base: u128, exponent: u128) -> u128 {
    let mut result = 1_u128;
    for bit in (0..128).rev() {
        result = fp_mul(result, result);
        if (exponent >> bit) & 1 == 1 {
            result = fp_mul(result, base);
        }
    }
    result
}

/// Inverse by Fermat; zero maps to zero.
fn fp_inv(a: u128) -> u128 {
    fp_pow(a, P.wrapping_sub(2))
}

/// Square root in `GF(p)`, when one exists.
fn fp_sqrt(a: u128) -> Option<u128> {
    let root = fp_pow(a, (P >> 2).wrapping_add(1));
    (fp_mul(root, root) == a).then_some(root)
}

/// Element `re + im*i` of `GF(p^2)`, both halves fully reduced.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Fp2 {
    /// Real half.
    re: u128,
    /// Imaginary half.
    im: u128,
}

impl Fp2 {
    /// Additive identity.
    const ZERO: Self = Self { re: 0, im: 0 };
    /// Multiplicative identity.
    const ONE: Self = Self { re: 1, im: 0 };

    /// Sum.
    const fn add(self, other: Self) -> Self {
        Self {
            re: fp_add(self.re, other.re),
            im: fp_add(self.im, other.im),
        }
    }

    /// Difference.
    const fn sub(self, other: Self) -> Self {
        Self {
            re: fp_sub(self.re, other.re),
            im: fp_sub(self.im, other.im),
        }
    }

    /// Negation.
    const fn neg(self) -> Self {
        Self {
            re: fp_neg(self.re),
            im: fp_neg(self.im),
        }
    }

    /// Product.
    const fn mul(self, other: Self) -> Self {
        Self {
            re: fp_sub(fp_mul(self.re, other.re), fp_mul(self.im, other.im)),
            im: fp_add(fp_mul(self.re, other.im), fp_mul(self.im, other.re)),
        }
    }

    /// Square.
    const fn square(self) -> Self {
        self.mul(self)
    }

    /// Inverse through the norm `re^2 + im^2`.
    fn inv(self) -> Self {
        let norm = fp_inv(fp_add(fp_mul(self.re, self.re), fp_mul(self.im, self.im)));
        Self {
            re: fp_mul(self.re, norm),
            im: fp_neg(fp_mul(self.im, norm)),
        }
    }

    /// Square root, when one exists.
    fn sqrt(self) -> Option<Self> {
        let norm_root = fp_sqrt(fp_add(
            fp_mul(self.re, self.re),
            fp_mul(self.im, self.im),
        ))?;
        for delta in [
            fp_mul(fp_add(self.re, norm_root), HALF),
            fp_mul(fp_sub(self.re, norm_root), HALF),
        ] {
            if let Some(re) = fp_sqrt(delta)
                && re != 0
            {
                let candidate = Self {
                    re,
                    im: fp_mul(self.im, fp_inv(fp_add(re, re))),
                };
                if candidate.square() == self {
                    return Some(candidate);
                }
            }
        }
        if self.im == 0 {
            return fp_sqrt(fp_neg(self.re)).map(|im| Self { re: 0, im });
        }
        None
    }

    /// Bit 126 of the first nonzero half.
    const fn sign(self) -> u8 {
        let half = if self.re != 0 { self.re } else { self.im };
        ((half >> 126) & 1) as u8
    }

    /// Picks `other` when `mask` is all ones, `self` when it is zero.
    const fn select(self, other: Self, mask: u128) -> Self {
        Self {
            re: (self.re & !mask) | (other.re & mask),
            im: (self.im & !mask) | (other.im & mask),
        }
    }
}

/// Point in extended twisted Edwards coordinates, `x = X/Z`, `y = Y/Z`, `T = XY/Z`.
#[derive(Debug, Clone, Copy)]
struct Point {
    /// Projective `X`.
    x: Fp2,
    /// Projective `Y`.
    y: Fp2,
    /// Projective `Z`.
    z: Fp2,
    /// Auxiliary `T`.
    t: Fp2,
}

impl Point {
    /// Neutral element.
    const IDENTITY: Self = Self {
        x: Fp2::ZERO,
        y: Fp2::ONE,
        z: Fp2::ONE,
        t: Fp2::ZERO,
    };

    /// Lifts affine coordinates.
    const fn from_affine(x: Fp2, y: Fp2) -> Self {
        Self {
            x,
            y,
            z: Fp2::ONE,
            t: x.mul(y),
        }
    }

    /// Base point of the prime subgroup.
    const fn generator() -> Self {
        Self::from_affine(GENERATOR_X, GENERATOR_Y)
    }

    /// Unified addition for `a = -1`; complete on FourQ, so it also doubles.
    const fn add(self, other: Self) -> Self {
        let a = self.y.sub(self.x).mul(other.y.sub(other.x));
        let b = self.y.add(self.x).mul(other.y.add(other.x));
        let c = self.t.mul(CURVE_D.add(CURVE_D)).mul(other.t);
        let zz = self.z.mul(other.z);
        let d = zz.add(zz);
        let e = b.sub(a);
        let f = d.sub(c);
        let g = d.add(c);
        let h = b.add(a);
        Self {
            x: e.mul(f),
            y: g.mul(h),
            z: f.mul(g),
            t: e.mul(h),
        }
    }

    /// Picks `other` when `mask` is all ones, `self` when it is zero.
    const fn select(self, other: Self, mask: u128) -> Self {
        Self {
            x: self.x.select(other.x, mask),
            y: self.y.select(other.y, mask),
            z: self.z.select(other.z, mask),
            t: self.t.select(other.t, mask),
        }
    }

    /// `scalar * self` over all 256 scalar bits.
    fn mul(self, scalar: &Scalar) -> Self {
        let mut acc = Self::IDENTITY;
        for bit in (0..256).rev() {
            acc = acc.add(acc);
            let mask = 0_u128.wrapping_sub(u128::from(scalar.bit(bit)));
            acc = acc.select(acc.add(self), mask);
        }
        acc
    }

    /// Affine `(x, y)`.
    fn to_affine(self) -> (Fp2, Fp2) {
        let z_inv = self.z.inv();
        (self.x.mul(z_inv), self.y.mul(z_inv))
    }

    /// Compressed 32-byte form.
    fn encode(self) -> [u8; POINT_LEN] {
        let (x, y) = self.to_affine();
        let mut out = [0_u8; POINT_LEN];
        let (low, high) = out.split_at_mut(16);
        low.copy_from_slice(&y.re.to_le_bytes());
        high.copy_from_slice(&(y.im | (u128::from(x.sign()) << 127)).to_le_bytes());
        out
    }

    /// Recovers a point from its compressed form, rejecting non-canonical `y` and points off
    /// the curve.
    fn decode(bytes: &[u8; POINT_LEN]) -> Option<Self> {
        let (low, high) = split_halves(bytes);
        let re = u128::from_le_bytes(low);
        let raw_im = u128::from_le_bytes(high);
        let im = raw_im & P;
        if re >= P || im >= P {
            return None;
        }
        let sign = (raw_im >> 127) as u8;
        let y = Fp2 { re, im };
        let y2 = y.square();
        let u = y2.sub(Fp2::ONE);
        let v = CURVE_D.mul(y2).add(Fp2::ONE);
        let mut x = u.mul(v.inv()).sqrt()?;
        if x.sign() != sign {
            x = x.neg();
        }
        let point = Self::from_affine(x, y);
        point.is_on_curve().then_some(point)
    }

    /// Checks the curve equation in affine form.
    fn is_on_curve(self) -> bool {
        let (x, y) = self.to_affine();
        let x2 = x.square();
        let y2 = y.square();
        y2.sub(x2) == Fp2::ONE.add(CURVE_D.mul(x2).mul(y2))
    }
}

/// Splits 32 bytes into two little-endian 16-byte halves.
fn split_halves(bytes: &[u8; 32]) -> ([u8; 16], [u8; 16]) {
    let mut low = [0_u8; 16];
    let mut high = [0_u8; 16];
    for (dst, src) in low.iter_mut().zip(bytes.iter()) {
        *dst = *src;
    }
    for (dst, src) in high.iter_mut().zip(bytes.iter().skip(16)) {
        *dst = *src;
    }
    (low, high)
}

/// Scalar below the subgroup order, little-endian 64-bit limbs.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Scalar(
    /// Limbs, least significant first.
    [u64; 4],
);

impl Scalar {
    /// Zero.
    const ZERO: Self = Self([0; 4]);
    /// One.
    const ONE: Self = Self([1, 0, 0, 0]);

    /// Reduces the low 32 bytes of `bytes` modulo the order.
    fn from_bytes_mod_order(bytes: &[u8]) -> Self {
        let mut acc = Self::ZERO;
        for byte in bytes.iter().take(32).rev() {
            for bit in (0..8).rev() {
                acc = acc.add_mod(acc);
                if (byte >> bit) & 1 == 1 {
                    acc = acc.add_mod(Self::ONE);
                }
            }
        }
        acc
    }

    /// Little-endian bytes.
    fn to_bytes(self) -> [u8; 32] {
        let mut out = [0_u8; 32];
        for (chunk, limb) in out.chunks_exact_mut(8).zip(self.0) {
            chunk.copy_from_slice(&limb.to_le_bytes());
        }
        out
    }

    /// Bit `index`, counting from the least significant.
    fn bit(&self, index: usize) -> u8 {
        self.0
            .get(index / 64)
            .map_or(0, |limb| ((limb >> (index % 64)) & 1) as u8)
    }

    /// Limb-wise sum and final carry.
    fn carrying_add(self, other: Self) -> (Self, bool) {
        let mut out = [0_u64; 4];
        let mut carry = false;
        for ((dst, a), b) in out.iter_mut().zip(self.0).zip(other.0) {
            let (sum, c1) = a.overflowing_add(b);
            let (sum, c2) = sum.overflowing_add(u64::from(carry));
            *dst = sum;
            carry = c1 | c2;
        }
        (Self(out), carry)
    }

    /// Limb-wise difference and final borrow.
    fn borrowing_sub(self, other: Self) -> (Self, bool) {
        let mut out = [0_u64; 4];
        let mut borrow = false;
        for ((dst, a), b) in out.iter_mut().zip(self.0).zip(other.0) {
            let (diff, b1) = a.overflowing_sub(b);
            let (diff, b2) = diff.overflowing_sub(u64::from(borrow));
            *dst = diff;
            borrow = b1 | b2;
        }
        (Self(out), borrow)
    }

    /// Sum modulo the order; both inputs must already be reduced.
    fn add_mod(self, other: Self) -> Self {
        let (sum, _) = self.carrying_add(other);
        let (reduced, borrow) = sum.borrowing_sub(ORDER);
        if borrow { sum } else { reduced }
    }

    /// Difference modulo the order; both inputs must already be reduced.
    fn sub_mod(self, other: Self) -> Self {
        let (diff, borrow) = self.borrowing_sub(other);
        if borrow { diff.carrying_add(ORDER).0 } else { diff }
    }

    /// Product modulo the order by double-and-add.
    fn mul_mod(self, other: Self) -> Self {
        let mut acc = Self::ZERO;
        for bit in (0..256).rev() {
            acc = acc.add_mod(acc);
            if other.bit(bit) == 1 {
                acc = acc.add_mod(self);
            }
        }
        acc
    }
}

/// Derives the encoded public key for a 32-byte private key.
pub(crate) fn public_key(private_key: &[u8; 32]) -> [u8; POINT_LEN] {
    let scalar = Scalar::from_bytes_mod_order(private_key);
    Point::generator().mul(&scalar).encode()
}

/// Signs a 32-byte digest.
///
/// The nonce is derived from the upper half of `K12(subseed)` and the digest; the lower half is
/// the private key.
pub(crate) fn sign(
    subseed: &[u8; 32],
    public_key: &[u8; POINT_LEN],
    digest: &[u8; 32],
) -> [u8; SIGNATURE_LEN] {
    let expanded = Zeroizing::new(k12::<64>(subseed));
    let mut nonce_input = Zeroizing::new(Vec::with_capacity(64));
    nonce_input.extend(expanded.iter().skip(32));
    nonce_input.extend_from_slice(digest);
    let nonce = Scalar::from_bytes_mod_order(&k12::<64>(&nonce_input));
    let commitment = Point::generator().mul(&nonce).encode();

    let challenge = challenge(&commitment, public_key, digest);
    let secret = Scalar::from_bytes_mod_order(expanded.as_slice());
    let response = nonce.sub_mod(secret.mul_mod(challenge));

    let mut signature = [0_u8; SIGNATURE_LEN];
    let (head, tail) = signature.split_at_mut(POINT_LEN);
    head.copy_from_slice(&commitment);
    tail.copy_from_slice(&response.to_bytes());
    signature
}

/// Verifies a signature produced by [`sign`].
pub(crate) fn verify(
    public_key: &[u8; POINT_LEN],
    digest: &[u8; 32],
    signature: &[u8; SIGNATURE_LEN],
) -> bool {
    if public_key[15] & 0x80 != 0
        || signature[15] & 0x80 != 0
        || signature[62] & 0xC0 != 0
        || signature[63] != 0
    {
        return false;
    }
    let Some(key_point) = Point::decode(public_key) else {
        return false;
    };
    let mut commitment = [0_u8; POINT_LEN];
    let mut response = [0_u8; 32];
    for (dst, src) in commitment.iter_mut().zip(signature.iter()) {
        *dst = *src;
    }
    for (dst, src) in response.iter_mut().zip(signature.iter().skip(POINT_LEN)) {
        *dst = *src;
    }
    let challenge = challenge(&commitment, public_key, digest);
    let response = Scalar(limbs(&response));
    let expected = Point::generator()
        .mul(&response)
        .add(key_point.mul(&challenge));
    expected.encode() == commitment
}

/// `K12(commitment || public key || digest)` reduced modulo the order.
fn challenge(
    commitment: &[u8; POINT_LEN],
    public_key: &[u8; POINT_LEN],
    digest: &[u8; 32],
) -> Scalar {
    let mut input = Vec::with_capacity(96);
    input.extend_from_slice(commitment);
    input.extend_from_slice(public_key);
    input.extend_from_slice(digest);
    Scalar::from_bytes_mod_order(&k12::<64>(&input))
}

/// Little-endian limbs of 32 bytes, without reduction.
fn limbs(bytes: &[u8; 32]) -> [u64; 4] {
    let mut out = [0_u64; 4];
    for (limb, chunk) in out.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut word = [0_u8; 8];
        word.copy_from_slice(chunk);
        *limb = u64::from_le_bytes(word);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex32(text: &str) -> [u8; 32] {
        let mut out = [0_u8; 32];
        for (index, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&text[index * 2..index * 2 + 2], 16).expect("hex");
        }
        out
    }

    #[test]
    fn generator_lies_on_curve_with_prime_order() {
        let generator = Point::generator();
        assert!(generator.is_on_curve());
        let (x, _) = generator.mul(&ORDER).to_affine();
        assert_eq!(x, Fp2::ZERO);
    }

    #[test]
    fn field_inverse_and_sqrt_agree() {
        let value = Fp2 {
            re: 0x1234_5678_9abc_def0,
            im: P - 7,
        };
        assert_eq!(value.mul(value.inv()), Fp2::ONE);
        let root = value.square().sqrt().expect("square has a root");
        assert_eq!(root.square(), value.square());
    }

    #[test]
    fn points_round_trip_through_encoding() {
        for seed in 1_u8..8 {
            let scalar = Scalar::from_bytes_mod_order(&k12::<32>(&[seed]));
            let encoded = Point::generator().mul(&scalar).encode();
            let decoded = Point::decode(&encoded).expect("decode");
            assert_eq!(decoded.encode(), encoded);
        }
    }

    #[test]
    fn scalar_reduction_wraps_at_order() {
        let order_plus_one = ORDER.carrying_add(Scalar::ONE).0.to_bytes();
        assert_eq!(Scalar::from_bytes_mod_order(&order_plus_one), Scalar::ONE);
        let minus_one = Scalar::ONE.sub_mod(Scalar([2, 0, 0, 0]));
        assert_eq!(minus_one.add_mod(Scalar::ONE), Scalar::ZERO);
    }

    #[test]
    fn signature_matches_reference_vector() {
        let subseed = k12::<32>(
            &"xpsxzzfqvaohzzwlbofvqkqeemzhnrscpeeokoumekfodtgzmwghtqm"
                .bytes()
                .map(|letter| letter - b'a')
                .collect::<Vec<_>>(),
        );
        let key = public_key(&k12::<32>(&subseed));
        assert_eq!(
            key,
            hex32("2cf1c1beda9fa7fcaeb74f1010d6e72fe16a48672639eb8fb677632f8ec5fe45")
        );

        let digest = k12::<32>(b"hm25");
        let signature = sign(&subseed, &key, &digest);
        let (commitment, response) = signature.split_at(32);
        assert_eq!(
            commitment,
            hex32("2bb023b29f039f2556da36622db80f20f19f0f64d0d8cd48e3c5b3275e1cdf59")
        );
        assert_eq!(
            response,
            hex32("35aa6b5630e7336187fda6b06353b126207e9219da0f489e616f60bc85032600")
        );
        assert!(verify(&key, &digest, &signature));

        let mut tampered = signature;
        tampered[40] ^= 1;
        assert!(!verify(&key, &digest, &tampered));
        assert!(!verify(&key, &k12::<32>(b"x"), &signature));
    }
}
