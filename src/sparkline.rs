// Sparkline Encoder
// Compresses a numeric series into a short string of block glyphs.

/// Glyph alphabet, lowest to highest
pub const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Full block used when every sampled value is equal
pub const SOLID: char = '█';

pub const DEFAULT_MAX_LEN: usize = 20;

/// Pick at most `max_len` points by uniform stride
///
/// Indices are `floor(i * len / max_len)`; no averaging, and repeated indices
/// are kept.
pub fn downsample(values: &[f64], max_len: usize) -> Vec<f64> {
    if values.len() <= max_len {
        return values.to_vec();
    }

    let step = values.len() as f64 / max_len as f64;
    (0..max_len)
        .map(|i| (i as f64 * step) as usize)
        .map(|idx| values[idx.min(values.len() - 1)])
        .collect()
}

/// Glyph index for `value` within `[min, max]`, clamped to the alphabet
fn quantize(value: f64, min: f64, range: f64) -> usize {
    let norm = (value - min) / range;
    // NaN casts to 0
    let idx = (norm * (GLYPHS.len() - 1) as f64).floor() as usize;
    idx.min(GLYPHS.len() - 1)
}

/// Encode `values` as a sparkline of at most `max_len` glyphs
///
/// Empty input (or `max_len == 0`) gives an empty string. When all sampled
/// values are equal the result is one full block per sampled value.
pub fn encode(values: &[f64], max_len: usize) -> String {
    if values.is_empty() || max_len == 0 {
        return String::new();
    }

    let data = downsample(values, max_len);

    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == min {
        return std::iter::repeat(SOLID).take(data.len()).collect();
    }

    data.iter()
        .map(|v| GLYPHS[quantize(*v, min, max - min)])
        .collect()
}

/// `encode` with the default width
pub fn encode_default(values: &[f64]) -> String {
    encode(values, DEFAULT_MAX_LEN)
}

/// Reusable encoder carrying a configured width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparklineEncoder {
    pub max_len: usize,
}

impl SparklineEncoder {
    pub fn new(max_len: usize) -> Self {
        SparklineEncoder { max_len }
    }

    pub fn encode(&self, values: &[f64]) -> String {
        encode(values, self.max_len)
    }
}

impl Default for SparklineEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heights(spark: &str) -> Vec<usize> {
        spark
            .chars()
            .map(|c| GLYPHS.iter().position(|g| *g == c).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(encode(&[], 20), "");
        assert_eq!(encode(&[1.0, 2.0], 0), "");
    }

    #[test]
    fn test_single_value_is_one_solid_block() {
        assert_eq!(encode(&[5.0], 20), "█");
        assert_eq!(encode(&[-3.25], 20), "█");
        assert_eq!(encode(&[0.0], 1), "█");
    }

    #[test]
    fn test_flat_series_repeats_per_element_not_max_len() {
        assert_eq!(encode(&[3.0, 3.0, 3.0, 3.0, 3.0], 20), "█████");
    }

    #[test]
    fn test_flat_long_series_is_capped_by_downsampling() {
        let flat = vec![7.0; 50];
        assert_eq!(encode(&flat, 20).chars().count(), 20);
    }

    #[test]
    fn test_two_point_extremes() {
        assert_eq!(encode(&[0.0, 100.0], 20), "▁█");
        assert_eq!(encode(&[100.0, 0.0], 20), "█▁");
    }

    #[test]
    fn test_max_maps_to_last_glyph() {
        let spark = encode(&[1.0, 2.0, 3.0], 20);
        assert_eq!(spark.chars().last(), Some('█'));
        assert_eq!(spark.chars().next(), Some('▁'));
    }

    #[test]
    fn test_monotonic_long_series() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let spark = encode(&values, 20);

        assert_eq!(spark.chars().count(), 20);
        let h = heights(&spark);
        assert!(h.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {spark}");
        assert_eq!(h[0], 0);
    }

    #[test]
    fn test_downsample_indices() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        // step = 2.5 -> indices 0, 2, 5, 7
        assert_eq!(downsample(&values, 4), vec![0.0, 2.0, 5.0, 7.0]);
        // short input untouched
        assert_eq!(downsample(&values[..3], 4), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_quantization_buckets() {
        // one value inside each bucket of [0, 7]
        let values = [0.0, 1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.0];
        assert_eq!(encode(&values, 20), "▁▂▃▄▅▆▇█");
    }

    #[test]
    fn test_deterministic() {
        let values = [4.0, 1.0, 9.0, 2.5, 9.0, 0.0];
        assert_eq!(encode(&values, 20), encode(&values, 20));
        assert_eq!(encode(&values, 20).chars().count(), 6);
    }

    #[test]
    fn test_encoder_uses_configured_width() {
        let values: Vec<f64> = (0..30).map(f64::from).collect();
        assert_eq!(SparklineEncoder::new(5).encode(&values).chars().count(), 5);
        assert_eq!(SparklineEncoder::default().encode(&values).chars().count(), 20);
        assert_eq!(encode_default(&values), SparklineEncoder::default().encode(&values));
    }
}
