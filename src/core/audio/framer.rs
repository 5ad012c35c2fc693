//! Audio frame conversions between the engine wire format and playable forms.
//!
//! The engine emits mono 16-bit little-endian PCM as base64 inside JSON
//! control messages. This module turns that payload into normalized float
//! samples for direct playback, or into a minimal single-channel WAV buffer
//! that a generic audio player accepts.
//!
//! Locally captured audio travels the other way as opaque binary frames and
//! is never touched here: whatever container the capture device produced is
//! forwarded unmodified.
//!
//! All functions are pure and stateless. A failed decode affects only the
//! frame in question.

use base64::prelude::*;

use crate::core::error::{SessionError, SessionResult};

/// Sample rate assumed when the engine omits `sample_rate_hz`.
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 24_000;

const BYTES_PER_SAMPLE: u16 = 2;
const NUM_CHANNELS: u16 = 1;

/// Decode a base64 payload into raw PCM bytes, validating the encoding.
///
/// Fails with [`SessionError::MalformedAudio`] when the base64 is invalid or
/// the decoded byte length is not a multiple of 2 (PCM16 frames are whole
/// samples). A zero-length payload is valid and decodes to zero samples;
/// whether to play silence is the sink's decision.
pub fn decode_pcm(base64_payload: &str) -> SessionResult<Vec<u8>> {
    let pcm = BASE64_STANDARD
        .decode(base64_payload)
        .map_err(|e| SessionError::MalformedAudio(format!("invalid base64: {e}")))?;
    if pcm.len() % 2 != 0 {
        return Err(SessionError::MalformedAudio(format!(
            "odd byte length {} is not whole PCM16 samples",
            pcm.len()
        )));
    }
    Ok(pcm)
}

/// Convert raw PCM16LE bytes into normalized float samples in [-1, 1].
///
/// Each sample is `int16 / 32768`, clamped. The byte slice length must be
/// even; callers validate with [`decode_pcm`] first. A trailing odd byte, if
/// one slips through, is ignored by the exact-chunk iteration.
pub fn pcm_to_samples(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|pair| {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            (sample as f32 / 32_768.0).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Decode a base64 PCM16 payload straight into normalized float samples.
pub fn decode_to_samples(base64_payload: &str) -> SessionResult<Vec<f32>> {
    let pcm = decode_pcm(base64_payload)?;
    Ok(pcm_to_samples(&pcm))
}

/// Wrap raw PCM16 mono bytes in a 44-byte RIFF/WAVE header.
///
/// Header sizes, byte rate and block alignment are computed exactly from
/// `sample_rate` and the payload length; players reject or mis-speed the
/// audio otherwise.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_size = pcm.len() as u32;
    let file_size = 36 + data_size; // 44-byte header minus 8 for RIFF+size

    let mut buf = Vec::with_capacity(44 + pcm.len());

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt sub-chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // sub-chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&NUM_CHANNELS.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    let byte_rate = sample_rate * NUM_CHANNELS as u32 * BYTES_PER_SAMPLE as u32;
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    let block_align = NUM_CHANNELS * BYTES_PER_SAMPLE;
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&(BYTES_PER_SAMPLE * 8).to_le_bytes()); // bits per sample

    // data sub-chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    buf.extend_from_slice(pcm);

    buf
}

/// Wrap a base64 PCM16 payload in a playable WAV container.
///
/// Validates the payload the same way as [`decode_to_samples`].
pub fn wrap_as_container(base64_payload: &str, sample_rate: u32) -> SessionResult<Vec<u8>> {
    let pcm = decode_pcm(base64_payload)?;
    Ok(pcm_to_wav(&pcm, sample_rate))
}
