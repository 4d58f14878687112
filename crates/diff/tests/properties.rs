use diff_engine::{
    char_edit_script, compute_diff, Budget, DiffLineKind, DiffOptions, HighlightKind, LineDiff,
    LineMatching,
};
use diff_engine::myers::Limits;
use proptest::prelude::*;

/// Texts built from a small pool of lines so that diffs share content
fn text() -> impl Strategy<Value = String> {
    let pool = vec![
        "fn main() {",
        "}",
        "",
        "    let x = 1;",
        "    let x = 2;",
        "    println!(\"{x}\");",
        "héllo wörld",
        "hello world",
        "// TODO",
    ];
    prop::collection::vec(prop::sample::select(pool), 0..24).prop_map(|lines| lines.join("\n"))
}

fn line(max: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!['a', 'b', 'c', ' ', 'é', '字']), 0..max)
        .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #[test]
    fn line_script_round_trips(old in text(), new in text()) {
        let diff = LineDiff::compute(&old, &new, LineMatching::default(), &Limits::unlimited())
            .unwrap();
        let (old_lines, new_lines) = (diff.old_lines(), diff.new_lines());
        prop_assert!(diff.script().covers(old_lines.len(), new_lines.len()));
        prop_assert_eq!(diff.script().apply(old_lines, new_lines), new_lines.to_vec());
    }

    #[test]
    fn char_script_round_trips(old in line(40), new in line(40), cleanup in any::<bool>()) {
        let old: Vec<char> = old.chars().collect();
        let new: Vec<char> = new.chars().collect();
        let script = char_edit_script(&old, &new, cleanup, &Budget::unlimited()).unwrap();
        prop_assert!(script.covers(old.len(), new.len()));
        prop_assert_eq!(script.apply(&old, &new), new);
    }

    #[test]
    fn identical_texts_have_no_hunks(text in text()) {
        let result = compute_diff(&text, &text, &DiffOptions::default()).unwrap();
        prop_assert!(result.hunks.is_empty());
        prop_assert_eq!(result.stats.changes, 0);
    }

    #[test]
    fn hunk_headers_match_their_lines(old in text(), new in text(), context in 0usize..4) {
        let options = DiffOptions::default().context_lines(context);
        let result = compute_diff(&old, &new, &options).unwrap();

        let mut previous_end = None;
        for hunk in &result.hunks {
            let old_side: Vec<usize> =
                hunk.lines.iter().filter_map(|l| l.old_line_number).collect();
            let new_side: Vec<usize> =
                hunk.lines.iter().filter_map(|l| l.new_line_number).collect();
            prop_assert_eq!(old_side.len(), hunk.old_lines);
            prop_assert_eq!(new_side.len(), hunk.new_lines);

            // Line numbers run consecutively through the hunk's range
            let expected_old: Vec<usize> = hunk.old_range().map(|i| i + 1).collect();
            let expected_new: Vec<usize> = hunk.new_range().map(|i| i + 1).collect();
            prop_assert_eq!(old_side, expected_old);
            prop_assert_eq!(new_side, expected_new);

            if let Some(end) = previous_end {
                prop_assert!(hunk.old_range().start > end);
            }
            previous_end = Some(hunk.old_range().end);
        }
    }

    #[test]
    fn stats_agree_with_lines(old in text(), new in text()) {
        let result = compute_diff(&old, &new, &DiffOptions::default()).unwrap();
        let changed = || result.lines().filter(|l| l.kind != DiffLineKind::Context);
        let additions = changed().filter(|l| l.in_new()).count();
        let deletions = changed().filter(|l| l.in_old()).count();
        prop_assert_eq!(result.stats.additions, additions);
        prop_assert_eq!(result.stats.deletions, deletions);
        prop_assert_eq!(result.stats.changes, additions + deletions);
        prop_assert_eq!(result.has_changes(), result.stats.changes > 0);
    }

    #[test]
    fn highlight_ranges_are_well_formed(old in text(), new in text()) {
        let result = compute_diff(&old, &new, &DiffOptions::default()).unwrap();
        for line in result.lines() {
            let Some(ranges) = &line.highlight_ranges else {
                prop_assert!(line.kind != DiffLineKind::Modified);
                continue;
            };
            prop_assert_eq!(line.kind, DiffLineKind::Modified);
            let expected_kind = if line.in_old() {
                HighlightKind::Removed
            } else {
                HighlightKind::Added
            };
            let len = line.content.chars().count();
            for range in ranges {
                prop_assert!(range.start < range.end && range.end <= len);
                prop_assert_eq!(range.kind, expected_kind);
            }
            // Sorted, disjoint and never touching
            for pair in ranges.windows(2) {
                prop_assert!(pair[0].end < pair[1].start);
            }
        }
    }

    #[test]
    fn results_are_deterministic(old in text(), new in text()) {
        let first = compute_diff(&old, &new, &DiffOptions::default()).unwrap();
        let second = compute_diff(&old, &new, &DiffOptions::default()).unwrap();
        prop_assert_eq!(first.hunks, second.hunks);
        prop_assert_eq!(first.stats, second.stats);
    }
}
