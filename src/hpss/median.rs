// 1-D median filters over a frame-major spectrogram
//
// Windows are truncated at the edges. Even-sized truncated windows use the
// upper median.

fn median(values: &mut [f32]) -> f32 {
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

/// Median along the time axis (across frames) for every bin
pub fn median_filter_time(
    src: &[f32],
    dst: &mut [f32],
    bins: usize,
    frames: usize,
    kernel: usize,
    scratch: &mut Vec<f32>,
) {
    let half = kernel / 2;
    for bin in 0..bins {
        for frame in 0..frames {
            let lo = frame.saturating_sub(half);
            let hi = (frame + half).min(frames - 1);
            scratch.clear();
            scratch.extend((lo..=hi).map(|f| src[f * bins + bin]));
            dst[frame * bins + bin] = median(scratch);
        }
    }
}

/// Median along the frequency axis (across bins) for every frame
pub fn median_filter_freq(
    src: &[f32],
    dst: &mut [f32],
    bins: usize,
    frames: usize,
    kernel: usize,
    scratch: &mut Vec<f32>,
) {
    let half = kernel / 2;
    for frame in 0..frames {
        let row = &src[frame * bins..(frame + 1) * bins];
        for bin in 0..bins {
            let lo = bin.saturating_sub(half);
            let hi = (bin + half).min(bins - 1);
            scratch.clear();
            scratch.extend_from_slice(&row[lo..=hi]);
            dst[frame * bins + bin] = median(scratch);
        }
    }
}
