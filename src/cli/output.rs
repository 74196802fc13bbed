//! Handles all user-facing output for the CLI.
//!
//! Writers are generic over [`WriteColor`] so the same code renders to a
//! colored terminal or to an in-memory buffer.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

// ============================================================================
// CORE OUTPUT FUNCTIONS: User-facing CLI output utilities
// ============================================================================

/// Prints the pending artifacts found under `root`.
pub fn print_pending(root: &Path, pending: &[PathBuf]) {
    let mut stdout = stdout();
    let _ = write_pending(&mut stdout, root, pending);
}

/// Prints the line diff between an approved artifact and its candidate.
pub fn print_artifact_diff(approved_path: &Path, approved: Option<&str>, pending: &str) {
    let mut stdout = stdout();
    let _ = write_artifact_diff(&mut stdout, approved_path, approved, pending);
}

pub fn print_approved(from: &Path, to: &Path) {
    let mut stdout = stdout();
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = write!(stdout, "approved");
    let _ = stdout.reset();
    let _ = writeln!(stdout, " {} -> {}", from.display(), to.display());
}

pub fn write_pending<W: WriteColor>(out: &mut W, root: &Path, pending: &[PathBuf]) -> io::Result<()> {
    if pending.is_empty() {
        return writeln!(out, "No pending artifacts under {}.", root.display());
    }
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    writeln!(out, "{} pending artifact(s):", pending.len())?;
    out.reset()?;
    for path in pending {
        let shown = path.strip_prefix(root).unwrap_or(path);
        writeln!(out, "  {}", shown.display())?;
    }
    Ok(())
}

pub fn write_artifact_diff<W: WriteColor>(
    out: &mut W,
    approved_path: &Path,
    approved: Option<&str>,
    pending: &str,
) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    match approved {
        Some(_) => writeln!(out, "--- {}", approved_path.display())?,
        None => writeln!(out, "--- {} (missing)", approved_path.display())?,
    }
    out.reset()?;
    let changeset = Changeset::new(approved.unwrap_or(""), pending, "\n");
    write_diff(out, &changeset.diffs)
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn stdout() -> StandardStream {
    let choice = if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn write_diff<W: WriteColor>(out: &mut W, diffs: &[Difference]) -> io::Result<()> {
    for diff in diffs {
        let (marker, color, text) = match diff {
            Difference::Same(x) => (' ', None, x),
            Difference::Add(x) => ('+', Some(Color::Green), x),
            Difference::Rem(x) => ('-', Some(Color::Red), x),
        };
        if text.is_empty() {
            continue;
        }
        match color {
            Some(color) => out.set_color(ColorSpec::new().set_fg(Some(color)))?,
            None => out.reset()?,
        }
        for line in text.lines() {
            writeln!(out, "{marker}{line}")?;
        }
    }
    out.reset()
}

#[cfg(test)]
mod tests {
    use termcolor::Buffer;

    use super::*;

    fn rendered(buffer: Buffer) -> String {
        String::from_utf8(buffer.into_inner()).unwrap()
    }

    #[test]
    fn diff_marks_added_and_removed_lines() {
        let mut buffer = Buffer::no_color();
        write_artifact_diff(
            &mut buffer,
            Path::new("a-approved.json"),
            Some("{\n  \"a\": 1\n}"),
            "{\n  \"a\": 2\n}",
        )
        .unwrap();
        let text = rendered(buffer);
        assert!(text.starts_with("--- a-approved.json\n"));
        assert!(text.contains("-  \"a\": 1\n"));
        assert!(text.contains("+  \"a\": 2\n"));
        assert!(text.contains(" {\n"));
    }

    #[test]
    fn missing_approved_shows_everything_as_added() {
        let mut buffer = Buffer::no_color();
        write_artifact_diff(&mut buffer, Path::new("x-approved.json"), None, "[\n  1\n]").unwrap();
        assert_eq!(
            rendered(buffer),
            "--- x-approved.json (missing)\n+[\n+  1\n+]\n"
        );
    }

    #[test]
    fn pending_paths_are_relative_to_root() {
        let mut buffer = Buffer::no_color();
        let root = Path::new("/snap");
        write_pending(&mut buffer, root, &[root.join("abc/def-not-approved.json")]).unwrap();
        assert_eq!(rendered(buffer), "1 pending artifact(s):\n  abc/def-not-approved.json\n");
    }
}
