// =============================================================================
// Local extrema with a minimum horizontal distance
// =============================================================================
//
// A sample is a candidate peak when it is strictly greater than both of its
// neighbours (the first and last samples never qualify). Candidates are then
// accepted greedily from the highest down; any remaining candidate closer than
// `min_distance` samples to an accepted one is discarded. Equal heights are
// visited left to right, so the earlier sample wins a tie.

/// Indices of local maxima in `values`, ascending.
pub fn find_peaks(values: &[f64], min_distance: usize) -> Vec<usize> {
    let candidates: Vec<usize> = (1..values.len().saturating_sub(1))
        .filter(|&i| values[i] > values[i - 1] && values[i] > values[i + 1])
        .collect();

    if min_distance <= 1 || candidates.len() < 2 {
        return candidates;
    }

    // Highest first; stable sort keeps earlier indices ahead on ties.
    let mut by_height = candidates.clone();
    by_height.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    let mut accepted: Vec<usize> = Vec::with_capacity(candidates.len());
    for idx in by_height {
        if accepted.iter().all(|&kept| idx.abs_diff(kept) >= min_distance) {
            accepted.push(idx);
        }
    }

    accepted.sort_unstable();
    accepted
}

/// Indices of local minima in `values`, ascending.
pub fn find_troughs(values: &[f64], min_distance: usize) -> Vec<usize> {
    let negated: Vec<f64> = values.iter().map(|v| -v).collect();
    find_peaks(&negated, min_distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_never_peaks() {
        assert!(find_peaks(&[5.0, 1.0, 5.0], 1).is_empty());
        assert!(find_peaks(&[], 1).is_empty());
        assert!(find_peaks(&[1.0], 1).is_empty());
    }

    #[test]
    fn plateaus_are_not_strict_peaks() {
        assert!(find_peaks(&[1.0, 3.0, 3.0, 1.0], 1).is_empty());
    }

    #[test]
    fn distance_keeps_the_taller_peak() {
        //            0    1    2    3    4    5    6
        let v = [0.0, 2.0, 0.0, 5.0, 0.0, 1.0, 0.0];
        assert_eq!(find_peaks(&v, 1), vec![1, 3, 5]);
        assert_eq!(find_peaks(&v, 3), vec![3]);
        assert_eq!(find_peaks(&v, 2), vec![1, 3, 5]);
    }

    #[test]
    fn equal_heights_keep_the_earlier_peak() {
        let v = [0.0, 4.0, 0.0, 4.0, 0.0];
        assert_eq!(find_peaks(&v, 3), vec![1]);
    }

    #[test]
    fn troughs_mirror_peaks() {
        let v = [5.0, 1.0, 5.0, 3.0, 5.0];
        assert_eq!(find_troughs(&v, 1), vec![1, 3]);
        assert_eq!(find_troughs(&v, 5), vec![1]);
    }
}
