use crate::animation::audio::AudioBuffer;

const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

/// Encode `buffer` as a 16-bit PCM RIFF/WAVE file.
///
/// Samples are clamped to `[-1, 1]`; negative values scale by `0x8000`, positive by `0x7FFF`.
pub fn encode_wav(buffer: &AudioBuffer) -> Vec<u8> {
    let channels = buffer.channels.max(1);
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = buffer.sample_rate * u32::from(block_align);
    let data_len = (buffer.frames() * usize::from(channels) * 2) as u32;

    let mut out = Vec::with_capacity(HEADER_LEN + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    let used = buffer.frames() * usize::from(channels);
    for &s in &buffer.samples[..used] {
        out.extend_from_slice(&sample_to_i16(s).to_le_bytes());
    }
    out
}

fn sample_to_i16(s: f32) -> i16 {
    let s = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}
