//! Summary of a finished batch, printed to stderr.

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    time::Duration,
};

use metafetch_lib::BatchResult;
use pad::{Alignment, PadStr};

use crate::formatters::color::{BOLD_PINK, DIM, color, color_for_code};

// Maximum padding for each entry in the final statistics output
const MAX_PADDING: usize = 20;

fn write_stat(f: &mut fmt::Formatter, title: &str, stat: usize, newline: bool) -> fmt::Result {
    let fill = title.chars().count();
    f.write_str(title)?;
    f.write_str(
        &stat
            .to_string()
            .pad(MAX_PADDING.saturating_sub(fill), '.', Alignment::Right, false),
    )?;

    if newline {
        f.write_str("\n")?;
    }

    Ok(())
}

#[derive(Debug, Default)]
pub(crate) struct FetchStats {
    total: usize,
    successful: usize,
    errors: usize,
    error_counts: BTreeMap<Option<u16>, usize>,
    duration: Duration,
    cancelled: bool,
}

impl FetchStats {
    pub(crate) fn new(result: &BatchResult, duration: Duration, cancelled: bool) -> Self {
        FetchStats {
            total: result.len(),
            successful: result.metadata().len(),
            errors: result.errors().len(),
            error_counts: result.error_counts(),
            // whole seconds are precise enough for humans
            duration: Duration::from_secs(duration.as_secs()),
            cancelled,
        }
    }
}

impl Display for FetchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = "-".repeat(MAX_PADDING + 1);

        write!(f, "\u{1f4dd} Summary")?; // 📝
        color!(f, DIM, " (in {})", humantime::format_duration(self.duration))?;
        writeln!(f)?;
        writeln!(f, "{separator}")?;
        write_stat(f, "\u{1f50d} Total", self.total, true)?; // 🔍
        write_stat(f, "\u{2705} Successful", self.successful, true)?; // ✅
        write_stat(f, "\u{1f6ab} Errors", self.errors, false)?; // 🚫

        for (code, count) in &self.error_counts {
            let title = code.map_or_else(|| "transport".to_string(), |code| code.to_string());
            let style = color_for_code(*code);
            write!(f, "\n  ")?;
            write!(f, "{}", style.apply_to(&title))?;
            let fill = title.chars().count() + 2;
            f.write_str(
                &count
                    .to_string()
                    .pad(MAX_PADDING.saturating_sub(fill), '.', Alignment::Right, false),
            )?;
        }

        if self.cancelled {
            color!(f, BOLD_PINK, "\n\n{}", "Cancelled before all requests finished")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn result() -> BatchResult {
        serde_json::from_value(json!({
            "metadata": [{"id": "a"}, {"id": "b"}],
            "errors": [
                {"id": "c", "code": 404, "message": "File not found: c."},
                {"id": "d", "code": 404, "message": "File not found: d."},
                {"id": "e", "code": null, "message": "connection refused"},
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_counts() {
        let stats = FetchStats::new(&result(), Duration::from_millis(2500), false);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.errors, 3);
        assert_eq!(stats.error_counts.get(&Some(404)), Some(&2));
        assert_eq!(stats.error_counts.get(&None), Some(&1));
        assert_eq!(stats.duration, Duration::from_secs(2));
    }

    #[test]
    fn test_display() {
        console::set_colors_enabled(false);
        let stats = FetchStats::new(&result(), Duration::from_secs(61), true);
        let output = stats.to_string();

        assert!(output.starts_with("\u{1f4dd} Summary (in 1m 1s)\n"));
        assert!(output.contains("\u{1f50d} Total............5\n"));
        assert!(output.contains("\u{1f6ab} Errors...........3"));
        assert!(output.contains("\n  404..............2"));
        assert!(output.contains("\n  transport........1"));
        assert!(output.ends_with("Cancelled before all requests finished"));
    }
}
