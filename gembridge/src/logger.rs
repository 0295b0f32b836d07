use std::fmt::Write;

use jiff::{Zoned, tz::TimeZone};
use log::{Level, Record};
use logforth::{
    append::Stdout,
    diagnostic::Diagnostic,
    layout::{JsonLayout, Layout},
};

use crate::args::{Args, LogStyle};

/// One line per event: UTC timestamp, level, emitting component, message.
///
/// The component is the crate part of the log target (`relay`, `server`,
/// `access_log`, ...), so relay and boundary messages can be told apart
/// without the full module path.
#[derive(Debug, Clone, Copy)]
struct TextLayout {
    colored: bool,
}

impl TextLayout {
    fn level(self, level: Level) -> String {
        if !self.colored {
            return format!("{level:>5}");
        }

        let color = match level {
            Level::Error => 31,
            Level::Warn => 33,
            Level::Info => 32,
            Level::Debug => 34,
            Level::Trace => 35,
        };

        format!("\x1b[{color}m{level:>5}\x1b[0m")
    }

    fn line(self, timestamp: &Zoned, record: &Record<'_>) -> Result<String, std::fmt::Error> {
        let mut output = String::new();
        let component = record.target().split("::").next().unwrap_or_default();

        write!(output, "{} ", timestamp.strftime("%Y-%m-%dT%H:%M:%S%.6fZ"))?;
        write!(output, "{}  ", self.level(record.level()))?;

        if !component.is_empty() {
            write!(output, "{component}: ")?;
        }

        write!(output, "{}", record.args())?;

        Ok(output)
    }
}

impl Layout for TextLayout {
    fn format(&self, record: &Record<'_>, _diagnostics: &[Box<dyn Diagnostic>]) -> anyhow::Result<Vec<u8>> {
        let now = Zoned::now().with_time_zone(TimeZone::UTC);

        Ok(self.line(&now, record)?.into_bytes())
    }
}

pub(super) fn init(args: &Args) {
    logforth::builder()
        .dispatch(|d| {
            let d = d.filter(args.log_level.env_filter());

            match args.log_style {
                LogStyle::Color => d.append(Stdout::default().with_layout(TextLayout { colored: true })),
                LogStyle::Text => d.append(Stdout::default().with_layout(TextLayout { colored: false })),
                LogStyle::Json => d.append(Stdout::default().with_layout(JsonLayout::default())),
            }
        })
        .apply();
}
