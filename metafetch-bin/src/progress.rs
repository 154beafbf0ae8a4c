use indicatif::{ProgressBar as Bar, ProgressStyle};
use metafetch_lib::Completion;
use std::sync::LazyLock;

use crate::formatters::color::{PINK, color_for_code};

#[derive(Clone)]
struct ProgressConfig {
    template: &'static str,
    progress_chars: &'static str,
}

const CONFIG: ProgressConfig = ProgressConfig {
    template: "{pos}/{len:.238} {bar:.162/238} {elapsed_precise:.dim} {wide_msg}",
    progress_chars: "━ ━",
};

static STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::with_template(CONFIG.template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(CONFIG.progress_chars)
});

/// Report progress to the CLI.
///
/// The bar is drawn on stderr, so it never ends up in piped output.
#[derive(Clone)]
pub(crate) struct Progress {
    bar: Option<Bar>,
}

impl Progress {
    pub(crate) fn new(total: usize, hide_bar: bool) -> Self {
        let bar = (!hide_bar).then(|| {
            let bar = Bar::new(total as u64).with_style(STYLE.clone());
            bar.set_message("Fetching metadata");
            bar
        });
        Progress { bar }
    }

    /// Tick once for a finished request
    pub(crate) fn update(&self, completion: &Completion) {
        self.with_bar(|bar| {
            bar.inc(1);
            if let Completion::Failure { key, code, message } = completion {
                let code = code.map_or_else(|| "ERR".to_string(), |code| code.to_string());
                bar.println(format!(
                    "{} {key}: {message}",
                    color_for_code(completion.code()).apply_to(format!("[{code}]"))
                ));
            }
        });
    }

    pub(crate) fn finish(&self, cancelled: bool) {
        self.with_bar(|bar| {
            if cancelled {
                bar.abandon_with_message(PINK.apply_to("Cancelled").to_string());
            } else {
                bar.finish_and_clear();
            }
        });
    }

    fn with_bar<F>(&self, action: F)
    where
        F: FnOnce(&Bar),
    {
        if let Some(bar) = &self.bar {
            action(bar);
        }
    }
}
