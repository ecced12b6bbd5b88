use chrono::Local;
use console::style;
use std::fmt::{self as std_fmt, Debug};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Sets up console logging. `level` is overridable through `RUST_LOG`.
pub fn setup_logging(level: &str, show_timestamps: bool, colored: bool) -> crate::utils::Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let formatter = CleanFormatter::new(show_timestamps, colored);
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(false) // level rendering happens in the custom formatter
        .event_format(formatter);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// How prominent a message is in the batch narrative. Drives the tree
/// prefix and styling, keyed on message content so call sites stay plain
/// `info!`/`warn!` macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessingLevel {
    Root,
    Stage,
    Step,
    Detail,
}

fn determine_processing_level(message: &str) -> ProcessingLevel {
    // Root: one per batch item
    if message.starts_with("Calibrating pair") || message.starts_with("Merging ") {
        return ProcessingLevel::Root;
    }
    if message.contains("Found") && message.contains("video file(s)") {
        return ProcessingLevel::Root;
    }

    // Stage: batch milestones
    if (message.contains("Matched") && message.contains("pair(s)"))
        || message.starts_with("Rendered ")
        || message.contains("Merge finished")
        || message.contains("Calibration finished")
        || message.contains("Calibration aborted")
    {
        return ProcessingLevel::Stage;
    }

    // Step: per-pair progress
    if message.starts_with("Paired ")
        || message.contains("calibration record")
        || (message.contains("Extracted") && message.contains("preview"))
        || message.contains("aligning by start timecode")
    {
        return ProcessingLevel::Step;
    }

    ProcessingLevel::Detail
}

/// ffmpeg/libx265 banner lines that reach the log through stderr relays and
/// add nothing to the batch narrative.
fn should_show_message(message: &str) -> bool {
    let noise_patterns = [
        "Invalid Block Addition value",
        "Could not find codec parameters for stream",
        "Consider increasing the value for the 'analyzeduration'",
        "x265 [info]: HEVC encoder version",
        "x265 [info]: build info",
        "x265 [info]: using cpu capabilities",
        "x265 [info]: Thread pool created",
        "x265 [info]: tools:",
    ];

    !noise_patterns
        .iter()
        .any(|pattern| message.contains(pattern))
}

fn format_level(level: &Level, use_color: bool) -> String {
    if !use_color {
        match *level {
            Level::ERROR => "ERROR".to_string(),
            Level::WARN => "WARN ".to_string(),
            Level::INFO => "".to_string(), // hide INFO prefix for cleaner output
            Level::DEBUG => "DEBUG".to_string(),
            Level::TRACE => "TRACE".to_string(),
        }
    } else {
        match *level {
            Level::ERROR => style("ERROR").red().bold().to_string(),
            Level::WARN => style("WARN ").yellow().to_string(),
            Level::INFO => "".to_string(),
            Level::DEBUG => style("DEBUG").blue().to_string(),
            Level::TRACE => style("TRACE").magenta().to_string(),
        }
    }
}

fn get_tree_prefix(level: ProcessingLevel) -> &'static str {
    match level {
        ProcessingLevel::Root => "▶",
        ProcessingLevel::Stage => "●",
        ProcessingLevel::Step => " ",
        ProcessingLevel::Detail => " ",
    }
}

fn style_message(message: &str, level: ProcessingLevel, use_color: bool) -> String {
    if !use_color {
        return message.to_string();
    }
    match level {
        ProcessingLevel::Root => style(message).bold().cyan().to_string(),
        ProcessingLevel::Stage => style(message).bold().green().to_string(),
        ProcessingLevel::Step => style(message).cyan().to_string(),
        ProcessingLevel::Detail => style(message).dim().to_string(),
    }
}

struct CleanFormatter {
    show_timestamps: bool,
    use_color: bool,
}

impl CleanFormatter {
    fn new(show_timestamps: bool, use_color: bool) -> Self {
        Self {
            show_timestamps,
            use_color,
        }
    }

    fn format_message(&self, message: &str, metadata_level: &Level) -> String {
        let level = determine_processing_level(message);
        let prefix = get_tree_prefix(level);
        let level_indicator = format_level(metadata_level, self.use_color);
        let styled = style_message(message, level, self.use_color);

        if level_indicator.is_empty() {
            format!("{} {}", prefix, styled)
        } else {
            format!("{} {} {}", prefix, level_indicator, styled)
        }
    }
}

impl<S, N> FormatEvent<S, N> for CleanFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std_fmt::Result {
        let metadata = event.metadata();
        let message = {
            let mut visitor = MessageVisitor::default();
            event.record(&mut visitor);
            visitor.message
        };

        if !should_show_message(&message) {
            return Ok(());
        }

        let mut output = String::new();

        if self.show_timestamps {
            let now = Local::now();
            let timestamp = if self.use_color {
                style(now.format("%H:%M:%S").to_string()).dim().to_string()
            } else {
                now.format("%H:%M:%S").to_string()
            };
            output.push_str(&format!("[{}] ", timestamp));
        }

        output.push_str(&self.format_message(&message, metadata.level()));

        writeln!(writer, "{}", output)
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value).trim_matches('"').to_string();
        }
    }
}
