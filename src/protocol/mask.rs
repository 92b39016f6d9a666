#![allow(clippy::cast_ptr_alignment, clippy::ptr_as_ptr)]

/// XORs `payload` with `mask_key`, starting at key byte `start`.
///
/// Returns the key index the next chunk of the same payload has to start at, so a
/// payload can be (un)masked piece by piece as it arrives.
pub(crate) fn apply_mask(payload: &mut [u8], mask_key: [u8; 4], start: usize) -> usize {
    let start = start % 4;
    let next = (start + payload.len()) % 4;

    // finish the partial key word by hand, the rest is aligned to key byte 0
    let lead = payload.len().min((4 - start) % 4);
    let (head, body) = payload.split_at_mut(lead);
    for (b, k) in head.iter_mut().zip(&mask_key[start..]) {
        *b ^= k;
    }
    mask_aligned(body, mask_key);
    next
}

/// Masks a whole payload from key byte 0.
pub(crate) fn mask(payload: &mut [u8], mask_key: [u8; 4]) { mask_aligned(payload, mask_key); }

fn mask_aligned(payload: &mut [u8], mask_key: [u8; 4]) {
    #[cfg(all(target_arch = "x86_64", feature = "simd_masking"))]
    if is_x86_feature_detected!("avx2") {
        // SAFETY: avx2 support was just detected
        let tail = unsafe { mask_avx2(payload, mask_key) };
        mask_words(tail, mask_key);
        return;
    }

    mask_words(payload, mask_key);
}

// Masks 32-byte blocks and returns the unmasked tail. 32 is a multiple of 4, so
// the tail starts back at key byte 0.
#[cfg(all(target_arch = "x86_64", feature = "simd_masking"))]
#[target_feature(enable = "avx2")]
unsafe fn mask_avx2(payload: &mut [u8], mask_key: [u8; 4]) -> &mut [u8] {
    use std::arch::x86_64::{
        __m256i, _mm256_loadu_si256, _mm256_set1_epi32, _mm256_storeu_si256, _mm256_xor_si256,
    };

    let key = _mm256_set1_epi32(i32::from_ne_bytes(mask_key));
    let mut blocks = payload.chunks_exact_mut(32);
    for block in &mut blocks {
        let ptr = block.as_mut_ptr() as *mut __m256i;
        // SAFETY: `block` is exactly 32 bytes and unaligned access is used
        unsafe { _mm256_storeu_si256(ptr, _mm256_xor_si256(_mm256_loadu_si256(ptr), key)) };
    }
    blocks.into_remainder()
}

fn mask_words(payload: &mut [u8], mask_key: [u8; 4]) {
    let key = u32::from_ne_bytes(mask_key);
    let mut words = payload.chunks_exact_mut(4);
    for word in &mut words {
        let masked = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]) ^ key;
        word.copy_from_slice(&masked.to_ne_bytes());
    }
    for (b, k) in words.into_remainder().iter_mut().zip(mask_key) {
        *b ^= k;
    }
}
