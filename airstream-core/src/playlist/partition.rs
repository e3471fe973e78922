/// Splits `files` into at most `max_streams` contiguous chunks of
/// `ceil(len / max_streams)` items; the last chunk may be shorter.
pub fn divide_into_streams<T: Clone>(files: &[T], max_streams: usize) -> Vec<Vec<T>> {
    if files.is_empty() || max_streams == 0 {
        return Vec::new();
    }
    let per_stream = files.len().div_ceil(max_streams);
    files
        .chunks(per_stream)
        .take(max_streams)
        .map(<[T]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_count_and_sizes_follow_ceiling_rule() {
        for total in 0..40usize {
            for max in 1..12usize {
                let files = (0..total).collect::<Vec<_>>();
                let groups = divide_into_streams(&files, max);
                if total == 0 {
                    assert!(groups.is_empty());
                    continue;
                }
                let per = total.div_ceil(max);
                assert_eq!(groups.len(), total.div_ceil(per), "total={total} max={max}");
                assert!(groups.len() <= max);
                let (last, head) = groups.split_last().unwrap();
                assert!(head.iter().all(|group| group.len() == per));
                assert!(!last.is_empty() && last.len() <= per);
                assert_eq!(groups.concat(), files);
            }
        }
    }

    #[test]
    fn fewer_groups_when_files_run_out() {
        let files = vec!["a", "b", "c", "d", "e"];
        let groups = divide_into_streams(&files, 4);
        assert_eq!(groups, vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]);
    }

    #[test]
    fn zero_streams_yields_nothing() {
        assert!(divide_into_streams(&[1, 2, 3], 0).is_empty());
    }
}
