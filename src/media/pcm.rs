//! PCM sample conversion and transport byte encoding.
//!
//! Audio arrives from the OS as 32-bit float samples in [-1, 1] and leaves
//! over the wire as base64-encoded 16-bit signed little-endian PCM. All
//! functions here are pure.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Mime descriptor attached to every outgoing audio chunk.
pub const AUDIO_PCM_MIME: &str = "audio/pcm;rate=24000";

/// Converts float samples to 16-bit signed PCM.
///
/// Each sample is clamped to [-1, 1], then scaled asymmetrically to match the
/// signed 16-bit range: negative values by 32768, non-negative by 32767,
/// truncating toward zero. Out-of-range input is clamped, never rejected.
pub fn float_to_int16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            let s = sample.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

/// Serializes 16-bit PCM samples to little-endian bytes.
pub fn int16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Encodes raw bytes to the transport-safe text form (standard base64).
///
/// Round-trips exactly with [`decode_from_transport`] for all byte sequences.
pub fn encode_for_transport(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes the transport text form back to raw bytes.
///
/// # Errors
/// - If the input is not valid base64
pub fn decode_from_transport(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_full_scale_samples_asymmetrically() {
        let samples = float_to_int16(&[-1.0, 0.0, 1.0]);
        assert_eq!(samples, vec![-32768, 0, 32767]);
    }

    #[test]
    fn converts_half_scale_samples() {
        let samples = float_to_int16(&[-0.5, 0.5]);
        assert_eq!(samples, vec![-16384, 16383]);
    }

    #[test]
    fn clamps_out_of_range_input() {
        // Out-of-range input must behave exactly like the clamped value
        assert_eq!(float_to_int16(&[-3.5]), float_to_int16(&[-1.0]));
        assert_eq!(float_to_int16(&[2.0]), float_to_int16(&[1.0]));
        assert_eq!(float_to_int16(&[f32::INFINITY]), float_to_int16(&[1.0]));
    }

    #[test]
    fn little_endian_byte_layout() {
        assert_eq!(int16_to_le_bytes(&[0x0102, -1]), vec![0x02, 0x01, 0xff, 0xff]);
    }

    #[test]
    fn transport_encoding_round_trips_empty_and_single() {
        for bytes in [vec![], vec![0x00u8], vec![0xff]] {
            let encoded = encode_for_transport(&bytes);
            assert_eq!(decode_from_transport(&encoded).unwrap(), bytes);
        }
    }

    #[test]
    fn transport_encoding_round_trips_all_byte_values() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        let encoded = encode_for_transport(&bytes);
        assert_eq!(decode_from_transport(&encoded).unwrap(), bytes);
    }

    #[test]
    fn transport_encoding_round_trips_large_buffer() {
        let bytes: Vec<u8> = (0..2_000_000u32).map(|i| (i % 251) as u8).collect();
        let encoded = encode_for_transport(&bytes);
        assert_eq!(decode_from_transport(&encoded).unwrap(), bytes);
    }
}
