use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Frames fed to the resampler per call.
pub const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits a slice of audio samples into fixed-size chunks, zero-padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Creates a new ring buffer on the heap for shared audio data.
pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Interprets little-endian PCM16 bytes as samples normalized to [-1.0, 1.0].
/// A trailing odd byte is ignored.
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / 32768.0).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Scales every sample by `volume`, keeping the result in range.
pub fn apply_volume(samples: &mut [f32], volume: f32) {
    let volume = volume.clamp(0.0, 1.0);
    for sample in samples.iter_mut() {
        *sample = (*sample * volume).clamp(-1.0, 1.0);
    }
}

/// Resamples a whole mono clip. Equal rates return the input untouched.
pub fn resample_all(samples: &[f32], in_rate: f64, out_rate: f64) -> anyhow::Result<Vec<f32>> {
    if (in_rate - out_rate).abs() < f64::EPSILON {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(in_rate, out_rate, RESAMPLER_CHUNK_SIZE)?;
    let chunk_size = resampler.input_frames_next();
    let mut out = Vec::with_capacity((samples.len() as f64 * out_rate / in_rate) as usize + 1);
    for chunk in split_for_chunks(samples, chunk_size) {
        let resampled = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_bytes_decode_to_normalized_samples() {
        let bytes = [0x00, 0x00, 0x00, 0x40, 0x00, 0x80, 0xff];
        assert_eq!(pcm16_to_f32(&bytes), vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn volume_scales_and_clamps() {
        let mut samples = vec![1.0, -0.5, 0.2];
        apply_volume(&mut samples, 0.5);
        assert_eq!(samples, vec![0.5, -0.25, 0.1]);

        let mut loud = vec![0.8];
        apply_volume(&mut loud, 3.0);
        assert_eq!(loud, vec![0.8]);
    }

    #[test]
    fn chunks_are_padded_to_size() {
        let chunks = split_for_chunks(&[1.0, 2.0, 3.0], 2);
        assert_eq!(chunks, vec![vec![1.0, 2.0], vec![3.0, 0.0]]);
    }

    #[test]
    fn resampling_scales_the_clip_length() {
        let samples = vec![0.0; 24_000];
        assert_eq!(resample_all(&samples, 24_000.0, 24_000.0).unwrap().len(), 24_000);

        let doubled = resample_all(&samples, 24_000.0, 48_000.0).unwrap();
        assert!((46_000..=50_000).contains(&doubled.len()), "{}", doubled.len());
    }
}
