use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::{TTSError, TTSResult};

/// Encode mono samples as a self-contained 16-bit PCM WAV file.
///
/// Samples are peak-normalized before quantization; silent input is written
/// as-is. An empty slice yields a valid WAV with no frames.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> TTSResult<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let peak = samples
        .iter()
        .filter(|s| s.is_finite())
        .fold(0.0f32, |acc, s| acc.max(s.abs()));
    let gain = if peak > 0.0 { 1.0 / peak } else { 1.0 };

    let mut buffer = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer =
            WavWriter::new(&mut buffer, spec).map_err(|e| TTSError::Encoding(e.to_string()))?;

        for sample in samples {
            let value = if sample.is_finite() { sample * gain } else { 0.0 };
            let quantized = (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(quantized)
                .map_err(|e| TTSError::Encoding(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| TTSError::Encoding(e.to_string()))?;
    }

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_encoded_wav_is_readable() {
        let samples: Vec<f32> = (0..2400).map(|i| (i as f32 * 0.05).sin() * 0.25).collect();
        let bytes = encode_wav(&samples, 24_000).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len() as usize, samples.len());
    }

    #[test]
    fn test_peak_normalization() {
        let samples = vec![0.0, 0.1, -0.2, 0.05];
        let bytes = encode_wav(&samples, 16_000).unwrap();

        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();

        let peak = decoded.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert_eq!(peak, i16::MAX as u16);
        assert!(decoded[2] < 0);
    }

    #[test]
    fn test_silence_and_non_finite() {
        let bytes = encode_wav(&[0.0, f32::NAN, 0.0], 24_000).unwrap();
        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.samples::<i16>().all(|s| s.unwrap() == 0));
    }

    #[test]
    fn test_empty_input() {
        let bytes = encode_wav(&[], 24_000).unwrap();
        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
    }
}
