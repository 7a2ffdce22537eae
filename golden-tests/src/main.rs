use anyhow::{Context, bail};
use clap::Parser;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const TESTS_ROOT: &str = "golden-tests/tests";
const EXPECTED_STDOUT_FILE: &str = "expected-stdout";
const EXPECTED_REPLAY_LOG_FILE: &str = "expected-replay-log";
/// Where test cases passing `--replay-log` are expected to store it
const REPLAY_LOG_FILE: &str = "replay-log.json";

#[derive(Parser)]
#[command(about = "Runs tsn-workbench against the recorded golden outputs")]
struct GoldenOpt {
    /// Records the actual output of every case as its new expectation
    #[arg(long)]
    bless: bool,
}

struct TestCase {
    dir: PathBuf,
    args: String,
}

/// The two outputs of a workbench run that are checked against recorded expectations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Output {
    Stdout,
    ReplayLog,
}

impl Output {
    fn expected_file(self) -> &'static str {
        match self {
            Output::Stdout => EXPECTED_STDOUT_FILE,
            Output::ReplayLog => EXPECTED_REPLAY_LOG_FILE,
        }
    }
}

impl Display for Output {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Output::Stdout => write!(f, "stdout"),
            Output::ReplayLog => write!(f, "replay log"),
        }
    }
}

/// The output of a workbench run that differs from what was recorded before
#[derive(Default)]
struct Mismatch {
    stdout_diff: Option<String>,
    replay_log_diff: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let options = GoldenOpt::parse();

    let mut test_dirs = Vec::new();
    for entry in fs::read_dir(TESTS_ROOT).context("golden tests root directory not found")? {
        let path = entry?.path();
        if path.is_dir() {
            test_dirs.push(path);
        } else {
            println!(
                "skipping path `{}` because it's not a directory",
                path.display()
            );
        }
    }

    // Cases run one after the other, in a stable order
    test_dirs.sort();

    let mut errored = false;
    for dir in test_dirs {
        let name = dir.display().to_string();
        let outcome =
            load_test_case(dir).and_then(|test_case| run_tsn_workbench(test_case, options.bless));
        match outcome {
            Ok(None) if options.bless => println!("{name}: recorded"),
            Ok(None) => println!("{name}: ✅"),
            Ok(Some(mismatch)) => {
                println!("Golden test `{name}` produced unexpected output");
                if let Some(diff) = mismatch.replay_log_diff {
                    println!("{diff}");
                }
                if let Some(diff) = mismatch.stdout_diff {
                    println!("{diff}");
                }
                errored = true;
            }
            Err(e) => {
                println!("Error running golden test `{name}`");
                println!("{e:?}");
                errored = true;
            }
        }
    }

    if errored {
        bail!("one or more golden tests failed");
    }

    Ok(())
}

fn load_test_case(dir: PathBuf) -> anyhow::Result<TestCase> {
    let args_path = dir.join("args");
    let args = fs::read_to_string(&args_path)
        .with_context(|| format!("no `args` file found at `{}`", args_path.display()))?;
    Ok(TestCase { dir, args })
}

fn read_if_present(path: &Path) -> anyhow::Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }

    fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))
        .map(Some)
}

/// Compares the actual output against its recorded expectation
///
/// A missing expectation is an error, unless `bless` is set, in which case the actual output
/// becomes the new expectation.
fn compare_or_bless(
    dir: &Path,
    output: Output,
    actual: &str,
    bless: bool,
) -> anyhow::Result<Option<String>> {
    let expected_path = dir.join(output.expected_file());
    let expected = read_if_present(&expected_path)?;

    if bless {
        if expected.as_deref() != Some(actual) {
            fs::write(&expected_path, actual.as_bytes())
                .with_context(|| format!("failed to persist `{}`", expected_path.display()))?;
        }
        return Ok(None);
    }

    match expected {
        Some(expected) if expected == actual => Ok(None),
        Some(expected) => Ok(Some(diff::diff_to_string(output, &expected, actual))),
        None => bail!(
            "no expected {output} found at `{}` (rerun with `--bless` to record it)",
            expected_path.display()
        ),
    }
}

fn run_tsn_workbench(test_case: TestCase, bless: bool) -> anyhow::Result<Option<Mismatch>> {
    // A leftover log from a previous case must not be mistaken for this one's
    if Path::new(REPLAY_LOG_FILE).is_file() {
        fs::remove_file(REPLAY_LOG_FILE).context("failed to remove stale replay log")?;
    }

    let output = Command::new("cargo")
        .arg("run")
        .arg("--release")
        .arg("--bin")
        .arg("tsn-workbench")
        .arg("--")
        .args(test_case.args.split_whitespace())
        .output()
        .context("tsn-workbench process crashed")?;

    // Fatal simulation errors still produce a report, so the exit status is not checked
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut mismatch = Mismatch {
        stdout_diff: compare_or_bless(&test_case.dir, Output::Stdout, &stdout, bless)?,
        ..Mismatch::default()
    };

    let replay_log = read_if_present(Path::new(REPLAY_LOG_FILE))?;
    let replay_log_expected = test_case.dir.join(EXPECTED_REPLAY_LOG_FILE).is_file();
    if replay_log.is_some() || replay_log_expected {
        let replay_log = replay_log.unwrap_or_default();
        mismatch.replay_log_diff =
            compare_or_bless(&test_case.dir, Output::ReplayLog, &replay_log, bless)?;
    }

    if mismatch.stdout_diff.is_some() || mismatch.replay_log_diff.is_some() {
        Ok(Some(mismatch))
    } else {
        Ok(None)
    }
}

mod diff {
    use crate::Output;
    use console::{Style, style};
    use similar::{ChangeTag, TextDiff};
    use std::fmt::{self, Write};

    struct Line(Option<usize>);

    impl fmt::Display for Line {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self.0 {
                None => write!(f, "    "),
                Some(idx) => write!(f, "{:<4}", idx + 1),
            }
        }
    }

    /// Renders the hunks in which the actual output departs from the expected one, each headed
    /// by the output it belongs to and the line ranges it covers
    pub fn diff_to_string(output: Output, expected: &str, actual: &str) -> String {
        let mut rendered = String::new();
        let diff = TextDiff::from_lines(expected, actual);

        _ = writeln!(rendered, "{}", style(format!("--- expected {output}")).red());
        _ = writeln!(rendered, "{}", style(format!("+++ actual {output}")).green());

        for group in diff.grouped_ops(3) {
            let (Some(first), Some(last)) = (group.first(), group.last()) else {
                continue;
            };

            let header = format!(
                "@@ {output}: expected lines {}-{}, actual lines {}-{} @@",
                first.old_range().start + 1,
                last.old_range().end,
                first.new_range().start + 1,
                last.new_range().end,
            );
            _ = writeln!(rendered, "{}", style(header).cyan());

            for op in &group {
                for change in diff.iter_inline_changes(op) {
                    let (sign, s) = match change.tag() {
                        ChangeTag::Delete => ("-", Style::new().red()),
                        ChangeTag::Insert => ("+", Style::new().green()),
                        ChangeTag::Equal => (" ", Style::new().dim()),
                    };
                    _ = write!(
                        rendered,
                        "{}{} |{}",
                        style(Line(change.old_index())).dim(),
                        style(Line(change.new_index())).dim(),
                        s.apply_to(sign).bold(),
                    );
                    for (emphasized, value) in change.iter_strings_lossy() {
                        if emphasized {
                            _ = write!(rendered, "{}", s.apply_to(value).underlined().on_black());
                        } else {
                            _ = write!(rendered, "{}", s.apply_to(value));
                        }
                    }
                    if change.missing_newline() {
                        _ = writeln!(rendered);
                    }
                }
            }
        }

        rendered
    }
}
