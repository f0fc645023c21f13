/// Lookback used for the replay chart's RSI pane.
pub const RSI_PERIOD: usize = 14;

/// Placeholder plotted for bars that precede the first RSI value.
pub const RSI_SENTINEL: f64 = 0.0;

/// Relative Strength Index with Wilder smoothing.
///
/// The first value comes from the plain average gain/loss over the first `period`
/// price changes; each later value folds in one more change. Returns
/// `data.len() - period` values, or nothing when `data` holds `period` points or fewer.
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period + 1 {
        return vec![];
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);

    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut rsi_values = Vec::with_capacity(data.len() - period);
    rsi_values.push(rsi_value(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        rsi_values.push(rsi_value(avg_gain, avg_loss));
    }

    rsi_values
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// RSI aligned one-to-one with `data`: the leading `period` points hold [`RSI_SENTINEL`].
pub fn rsi_display_series(data: &[f64], period: usize) -> Vec<f64> {
    if data.is_empty() {
        return vec![];
    }
    let values = rsi(data, period);
    let mut series = vec![RSI_SENTINEL; data.len() - values.len()];
    series.extend(values);
    series
}
