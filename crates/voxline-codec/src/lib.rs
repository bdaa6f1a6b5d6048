// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Stateless audio codec primitives shared by every transport adapter.
//!
//! Sample format throughout the crate is 16-bit signed little-endian mono
//! PCM ("PCM16"). Conversions never allocate more than their output buffer
//! and never hold state between calls — callers may invoke these functions
//! from any task without synchronization.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("buffer length {0} is not a multiple of 2 (not whole PCM16 samples)")]
    OddByteLength(usize),
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Standard G.711 µ-law segment boundaries: the biased magnitude doubles
/// its range every segment, giving eight segments of exponentially coarser
/// quantization as amplitude grows.
const SEG_END: [i32; 8] = [0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF, 0x1FFF, 0x3FFF, 0x7FFF];

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

fn segment_for(biased_magnitude: i32) -> usize {
    SEG_END
        .iter()
        .position(|&end| biased_magnitude <= end)
        .unwrap_or(7)
}

/// Encode a single PCM16 sample to a µ-law byte.
pub fn encode_sample(sample: i16) -> u8 {
    let sign: i32 = if sample < 0 { 0x80 } else { 0x00 };
    // Negate in the wider i32 domain so i16::MIN doesn't overflow.
    let mut magnitude = (sample as i32).abs();
    if magnitude > CLIP {
        magnitude = CLIP;
    }
    magnitude += BIAS;

    let seg = segment_for(magnitude);
    let mantissa = (magnitude >> (seg + 3)) & 0x0F;
    let ulaw_byte = !(sign | ((seg as i32) << 4) | mantissa);
    ulaw_byte as u8
}

/// Decode a single µ-law byte to a PCM16 sample.
///
/// Reconstructs the segment midpoint: the inverse of `encode_sample`'s
/// `magnitude >> (seg + 3)` quantization, then removes the encode bias.
pub fn decode_sample(ulaw: u8) -> i16 {
    let u = !ulaw as i32;
    let sign = u & 0x80;
    let seg = ((u >> 4) & 0x07) as usize;
    let mantissa = u & 0x0F;

    let seg_base = if seg == 0 { 0 } else { SEG_END[seg - 1] + 1 };
    let step = 1i32 << (seg + 3);
    let biased_magnitude = seg_base + mantissa * step + step / 2;
    let magnitude = (biased_magnitude - BIAS).max(0);

    let sample = if sign != 0 { -magnitude } else { magnitude };
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Convert a buffer of µ-law bytes to PCM16LE bytes (one input byte per
/// output sample, so the output is twice the input length).
pub fn mulaw_to_pcm16(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 2);
    for &b in input {
        out.extend_from_slice(&decode_sample(b).to_le_bytes());
    }
    out
}

/// Convert a buffer of PCM16LE bytes to µ-law bytes.
pub fn pcm16_to_mulaw(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let samples = bytes_to_samples(input)?;
    Ok(samples.into_iter().map(encode_sample).collect())
}

fn bytes_to_samples(input: &[u8]) -> Result<Vec<i16>, CodecError> {
    if input.len() % 2 != 0 {
        return Err(CodecError::OddByteLength(input.len()));
    }
    Ok(input
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Linearly resample PCM16LE audio from `from_rate` Hz to `to_rate` Hz.
///
/// Output length is `floor(in_samples * to_rate / from_rate)`. When
/// `from_rate == to_rate` the input is returned unchanged (byte-exact
/// identity, not merely approximately equal).
pub fn resample_linear(input: &[u8], from_rate: u32, to_rate: u32) -> Result<Vec<u8>, CodecError> {
    if from_rate == to_rate {
        return Ok(input.to_vec());
    }
    let samples = bytes_to_samples(input)?;
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    let in_len = samples.len();
    let out_len = (in_len as u64 * to_rate as u64 / from_rate as u64) as usize;
    let mut out = Vec::with_capacity(out_len);
    let ratio = from_rate as f64 / to_rate as f64;
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f64;
        let s0 = samples[idx.min(in_len - 1)] as f64;
        let s1 = samples[(idx + 1).min(in_len - 1)] as f64;
        let interpolated = s0 + (s1 - s0) * frac;
        out.push(interpolated.round() as i16);
    }
    Ok(samples_to_bytes(&out))
}

/// Decode base64 µ-law audio and upsample/downsample it to PCM16 at
/// `to_rate`. Convenience wrapper for telephony transports that receive
/// base64 µ-law@8kHz frames and need PCM16@16kHz for STT.
pub fn base64_mulaw_to_pcm16(data: &str, from_rate: u32, to_rate: u32) -> Result<Vec<u8>, CodecError> {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let mulaw_bytes = STANDARD.decode(data)?;
    let pcm = mulaw_to_pcm16(&mulaw_bytes);
    resample_linear(&pcm, from_rate, to_rate)
}

/// Resample PCM16 down to `to_rate`, encode to µ-law, and base64 it.
/// Convenience wrapper for the telephony outbound path.
pub fn pcm16_to_base64_mulaw(pcm: &[u8], from_rate: u32, to_rate: u32) -> Result<String, CodecError> {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let resampled = resample_linear(pcm, from_rate, to_rate)?;
    let mulaw = pcm16_to_mulaw(&resampled)?;
    Ok(STANDARD.encode(mulaw))
}
