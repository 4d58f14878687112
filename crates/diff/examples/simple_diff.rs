use anyhow::Result;
use diff_engine::{compute_diff, unified_diff, DiffLine, DiffLineKind, DiffOptions};

/// Wrap the highlighted spans of a modified line in ANSI colors
fn colorize(line: &DiffLine) -> String {
    let chars: Vec<char> = line.content.chars().collect();
    let color = if line.in_old() { "\x1b[41m" } else { "\x1b[42m" };

    let mut out = String::new();
    let mut pos = 0;
    for range in line.highlights() {
        out.extend(&chars[pos..range.start]);
        out.push_str(color);
        out.extend(&chars[range.to_range()]);
        out.push_str("\x1b[0m");
        pos = range.end;
    }
    out.extend(&chars[pos..]);
    out
}

fn main() -> Result<()> {
    // Two sample texts to compare
    let text1 = "This is the first line.\nHere is the second line.\nAnd the third line.\n";
    let text2 = "This is the first line.\nThis is a completely different second line.\n\
                 And the third line.\nPlus a new fourth line.\n";

    // Generate a unified diff
    println!("Unified diff:");
    print!("{}", unified_diff(text1, text2, 1)?);

    let result = compute_diff(text1, text2, &DiffOptions::default())?;

    // Print diff statistics
    println!("\nDiff statistics:");
    println!("  Total hunks: {}", result.hunks.len());
    println!("  Added lines: {}", result.stats.additions);
    println!("  Deleted lines: {}", result.stats.deletions);
    println!("  Change runs: {}", result.metadata.changes_count);
    println!("  Took: {:.3}ms", result.metadata.calculation_time_ms);

    // Print hunks with character highlights
    println!("\nHunks with highlights:");
    for hunk in &result.hunks {
        println!("{}", hunk.header());
        for line in &hunk.lines {
            match line.kind {
                DiffLineKind::Context => println!("  {}", line.content),
                DiffLineKind::Removed => println!("\x1b[31m- {}\x1b[0m", line.content),
                DiffLineKind::Added => println!("\x1b[32m+ {}\x1b[0m", line.content),
                DiffLineKind::Modified => println!("{} {}", line.prefix(), colorize(line)),
            }
        }
    }

    // Show example of comparing different file versions
    println!("\nExample of comparing different versions of a file:");
    let file1 = r#"fn main() {
    println!("Hello, world!");
}
"#;

    let file2 = r#"fn main() {
    // Add a greeting with name
    let name = "Rust";
    println!("Hello, {}!", name);
}
"#;

    println!("Unified diff:");
    print!("{}", unified_diff(file1, file2, 1)?);

    Ok(())
}
