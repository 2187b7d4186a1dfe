//! Per-step candidate selection.

use ndarray::ArrayView1;

/// Collect the labels worth extending with at one time step.
///
/// Labels are taken in order of decreasing probability (ties by lower id),
/// at most `cutoff_top_n` of them, stopping early once their cumulative
/// probability reaches `cutoff_prob`. Probabilities come back as natural
/// logs; zero maps to `ln(f32::MIN_POSITIVE)` instead of `-inf`.
pub(crate) fn pruned_log_probs(
    row: ArrayView1<f32>,
    cutoff_prob: f32,
    cutoff_top_n: usize,
    out: &mut Vec<(u32, f64)>,
) {
    out.clear();
    let mut order: Vec<(u32, f32)> = row
        .iter()
        .enumerate()
        .map(|(i, &p)| (i as u32, p))
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let limit = cutoff_top_n.min(order.len());
    let mut cumulative = 0.0f64;
    for &(label, p) in &order[..limit] {
        out.push((label, f64::from(p + f32::MIN_POSITIVE).ln()));
        cumulative += f64::from(p);
        if cutoff_prob < 1.0 && cumulative >= f64::from(cutoff_prob) {
            break;
        }
    }
}
