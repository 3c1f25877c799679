//! Command-line interface for vision_launch

use argh::FromArgs;
use std::time::Duration;

/// Launch the vision stack: camera source, face detection and optional RViz2
#[derive(FromArgs, Debug)]
pub struct LaunchArgs {
    /// optional launch file (default: built-in vision launch), followed by
    /// argument overrides in the form key:=value
    #[argh(positional)]
    pub launch: Vec<String>,

    /// override launch arguments (format: key:=value)
    #[argh(option, short = 'a', from_str_fn(parse_arg_override))]
    pub arg: Vec<(String, String)>,

    /// show launch plan without executing
    #[argh(switch)]
    pub dry_run: bool,

    /// output format for --dry-run: text, json (default: text)
    #[argh(option, default = "PlanFormat::Text", from_str_fn(parse_plan_format))]
    pub format: PlanFormat,

    /// list the declared launch arguments and exit
    #[argh(switch)]
    pub show_args: bool,

    /// validate launch file and exit
    #[argh(switch)]
    pub validate: bool,

    /// time to wait for each process after SIGTERM, in milliseconds
    #[argh(option, default = "5000")]
    pub shutdown_timeout_ms: u64,

    /// log level (error, warn, info, debug, trace)
    #[argh(option, short = 'l', default = "String::from(\"info\")")]
    pub log_level: String,
}

/// Output format of `--dry-run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Text,
    Json,
}

fn parse_plan_format(s: &str) -> Result<PlanFormat, String> {
    match s {
        "text" => Ok(PlanFormat::Text),
        "json" => Ok(PlanFormat::Json),
        _ => Err(format!("Invalid format '{}'. Expected 'text' or 'json'", s)),
    }
}

/// Parse argument override in format "key:=value"
fn parse_arg_override(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, ":=").collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!(
            "Invalid argument format '{}'. Expected 'key:=value'",
            s
        ));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

impl LaunchArgs {
    /// Launch file path given on the command line, if any
    pub fn launch_file(&self) -> Result<Option<&str>, String> {
        let mut files = self.launch.iter().filter(|item| !item.contains(":="));
        let file = files.next().map(String::as_str);
        if let Some(extra) = files.next() {
            return Err(format!(
                "Unexpected positional argument '{}'. Expected a single launch file",
                extra
            ));
        }
        Ok(file)
    }

    /// Argument overrides, positional ones first, then `-a` options
    pub fn arg_overrides(&self) -> Result<Vec<(String, String)>, String> {
        let mut overrides = Vec::new();
        for item in self.launch.iter().filter(|item| item.contains(":=")) {
            overrides.push(parse_arg_override(item)?);
        }
        overrides.extend(self.arg.iter().cloned());
        Ok(overrides)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Normalized log level filter
    pub fn log_filter(&self) -> &'static str {
        match self.log_level.to_lowercase().as_str() {
            "error" => "error",
            "warn" => "warn",
            "debug" => "debug",
            "trace" => "trace",
            _ => "info",
        }
    }
}
