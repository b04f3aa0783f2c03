//! Segment file naming.
//!
//! Templates are plain text with `%{name}` or `%{name=argument}` placeholders:
//!
//! | placeholder | expands to |
//! |-------------|------------|
//! | `%{date=FMT}` | period start, UTC, formatted with chrono's strftime `FMT` |
//! | `%{date}` | period start as `%Y%m%dT%H%M%S` |
//! | `%{count}` | a per-generator counter starting at 1 |
//! | `%{title}` | the stream title |
//!
//! Unknown placeholders and invalid date formats are left as written.

use chrono::format::{Item, StrftimeItems};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use crate::context::StreamContext;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\{([a-z]+)(?:=([^}]*))?\}").expect("placeholder pattern is valid")
});

const DEFAULT_DATE_FORMAT: &str = "%Y%m%dT%H%M%S";
const DEFAULT_EXTENSION: &str = "ts";

/// Turns a template and the current context into a file name.
pub trait FilenameGenerator: Send + Sync {
    fn generate(&self, template: &str, ctx: &StreamContext) -> String;
}

/// Expands the placeholders documented at module level.
#[derive(Debug, Default)]
pub struct TemplateFilenameGenerator {
    counter: AtomicU64,
}

impl TemplateFilenameGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FilenameGenerator for TemplateFilenameGenerator {
    fn generate(&self, template: &str, ctx: &StreamContext) -> String {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) + 1;

        let expanded = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
            let argument = caps.get(2).map(|m| m.as_str());
            match &caps[1] {
                "date" => {
                    let format = argument.unwrap_or(DEFAULT_DATE_FORMAT);
                    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                        tracing::warn!(format, "Invalid date format in filename template");
                        caps[0].to_string()
                    } else {
                        ctx.period_start.format(format).to_string()
                    }
                }
                "count" => count.to_string(),
                "title" => ctx.stream.title.clone(),
                _ => caps[0].to_string(),
            }
        });

        let mut name = sanitize(&expanded);
        if Path::new(&name).extension().is_none() {
            name.push('.');
            name.push_str(DEFAULT_EXTENSION);
        }
        name
    }
}

/// Replace characters that are not safe in file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
