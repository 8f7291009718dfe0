use anyhow::Result;
use colored::Colorize;
use log::Level;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    #[default]
    Default,
    Verbose,
    Quiet,
    Silent,
}

impl LogLevel {
    const fn level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Default => log::LevelFilter::Info,
            LogLevel::Verbose => log::LevelFilter::Debug,
            LogLevel::Quiet => log::LevelFilter::Error,
            LogLevel::Silent => log::LevelFilter::Off,
        }
    }
}

pub fn set_up_logging(level: LogLevel) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| match record.level() {
            Level::Error => out.finish(format_args!(
                "{}{} {message}",
                "error".red().bold(),
                ":".bold()
            )),
            Level::Warn => out.finish(format_args!(
                "{}{} {message}",
                "warning".yellow().bold(),
                ":".bold()
            )),
            Level::Info | Level::Debug | Level::Trace => out.finish(format_args!(
                "{}{} {message}",
                record.level().to_string().to_lowercase().bold(),
                ":".bold()
            )),
        })
        .level(level.level_filter())
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}
