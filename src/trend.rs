//! Year-by-year publication trend from cumulative window counts.
//!
//! The literature index only answers "how many in the last N days", so per-year
//! counts are differences of cumulative windows: year k (0 = current) is
//! `cum[k] - cum[k-1]`, floored at zero. Year 0 reuses the run's recent-window
//! count instead of its own difference.

use crate::report::YearCount;

/// Cumulative windows queried for the trend, one per year.
pub const TREND_WINDOWS_DAYS: [u32; 5] = [365, 730, 1095, 1460, 1825];

/// `cumulative[i]` is the count for `TREND_WINDOWS_DAYS[i]`. Output is oldest year first.
pub fn yearly_counts(current_year: i32, recent_count: u64, cumulative: &[u64]) -> Vec<YearCount> {
    let mut out = Vec::with_capacity(cumulative.len());
    for k in 0..cumulative.len() {
        let count = if k == 0 {
            recent_count
        } else {
            cumulative[k].saturating_sub(cumulative[k - 1])
        };
        out.push(YearCount {
            year: current_year - k as i32,
            count,
        });
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differences_of_cumulative_windows() {
        let ys = yearly_counts(2026, 12, &[15, 40, 70, 71, 100]);
        let pairs: Vec<(i32, u64)> = ys.iter().map(|y| (y.year, y.count)).collect();
        assert_eq!(
            pairs,
            vec![(2022, 29), (2023, 1), (2024, 30), (2025, 25), (2026, 12)]
        );
    }

    #[test]
    fn non_monotonic_windows_floor_at_zero() {
        let ys = yearly_counts(2026, 3, &[10, 8, 20]);
        assert_eq!(ys[1].count, 0);
        assert_eq!(ys[0].count, 12);
    }

    #[test]
    fn empty_input_yields_no_years() {
        assert!(yearly_counts(2026, 5, &[]).is_empty());
    }
}
