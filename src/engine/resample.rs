//! Sample rate conversion
//!
//! Band-limited sinc interpolation through rubato. Output length is rounded
//! so the converted audio lasts as long in time as the input, and the
//! filter delay is trimmed so the output lines up with the input.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::error::{Result, SpotmixError};

/// Sinc filter length in taps
const SINC_LEN: usize = 128;

fn sinc_parameters() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Resample every channel from `source_rate` to `target_rate`
///
/// All channels must have the same length.
pub fn resample_channels(
    channels: &[Vec<f32>],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<f32>>> {
    if source_rate == 0 || target_rate == 0 {
        return Err(SpotmixError::InvalidField {
            field: "sample_rate",
            reason: format!("cannot resample {} Hz to {} Hz", source_rate, target_rate),
        });
    }
    let frames = channels.first().map_or(0, Vec::len);
    if frames == 0 {
        return Ok(vec![Vec::new(); channels.len()]);
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let target_len = (frames as f64 * ratio).round() as usize;

    // Trailing zeros flush the delayed tail out of the filter
    let chunk = frames + SINC_LEN;
    let padded: Vec<Vec<f32>> = channels
        .iter()
        .map(|ch| {
            let mut padded = Vec::with_capacity(chunk);
            padded.extend_from_slice(ch);
            padded.resize(chunk, 0.0);
            padded
        })
        .collect();

    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, sinc_parameters(), chunk, channels.len()).map_err(
            |e| {
                SpotmixError::invalid_audio(
                    format!("cannot resample {} Hz to {} Hz", source_rate, target_rate),
                    e,
                )
            },
        )?;
    let output = resampler
        .process(&padded, None)
        .map_err(|e| SpotmixError::invalid_audio("resampling failed", e))?;
    let delay = resampler.output_delay();

    debug!(
        "Resampled {} frames at {} Hz to {} frames at {} Hz",
        frames, source_rate, target_len, target_rate
    );

    Ok(output
        .into_iter()
        .map(|ch| {
            let mut aligned: Vec<f32> = ch.into_iter().skip(delay).take(target_len).collect();
            aligned.resize(target_len, 0.0);
            aligned
        })
        .collect())
}
