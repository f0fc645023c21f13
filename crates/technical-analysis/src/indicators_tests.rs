#[cfg(test)]
mod tests {
    use super::super::indicators::*;

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    #[test]
    fn test_rsi_basic() {
        let prices = sample_prices();
        let result = rsi(&prices, RSI_PERIOD);

        assert_eq!(result.len(), prices.len() - RSI_PERIOD);
        for &value in &result {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_rsi_first_value_uses_simple_averages() {
        let prices = sample_prices();
        let result = rsi(&prices, RSI_PERIOD);

        // Wilder's reference series: first RSI(14) over these closes is ~70.46
        assert!((result[0] - 70.46).abs() < 0.05);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        assert!(rsi(&[1.0, 2.0, 3.0], RSI_PERIOD).is_empty());
        assert!(rsi(&[1.0; 14], RSI_PERIOD).is_empty());
        assert_eq!(rsi(&[1.0; 15], RSI_PERIOD).len(), 1);
        assert!(rsi(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_rsi_uptrend_saturates() {
        let uptrend: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let result = rsi(&uptrend, RSI_PERIOD);

        assert_eq!(result.len(), 26);
        assert!(result.iter().all(|&v| v == 100.0));
    }

    #[test]
    fn test_rsi_downtrend_goes_to_zero() {
        let downtrend: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let result = rsi(&downtrend, RSI_PERIOD);

        assert!(result.iter().all(|&v| v < 1e-9));
    }

    #[test]
    fn test_rsi_flat_prices() {
        // no losses at all reads as fully overbought
        let result = rsi(&[50.0; 20], RSI_PERIOD);
        assert!(result.iter().all(|&v| v == 100.0));
    }

    #[test]
    fn test_display_series_lines_up_with_prices() {
        let prices = sample_prices();
        let series = rsi_display_series(&prices, RSI_PERIOD);

        assert_eq!(series.len(), prices.len());
        assert!(series[..RSI_PERIOD].iter().all(|&v| v == RSI_SENTINEL));
        assert_eq!(&series[RSI_PERIOD..], rsi(&prices, RSI_PERIOD).as_slice());
    }

    #[test]
    fn test_display_series_edge_cases() {
        assert!(rsi_display_series(&[], RSI_PERIOD).is_empty());

        let short = rsi_display_series(&[1.0, 2.0, 3.0], RSI_PERIOD);
        assert_eq!(short, vec![RSI_SENTINEL; 3]);
    }
}
