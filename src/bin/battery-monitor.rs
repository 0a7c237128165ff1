use clap::Parser;
use log::info;
use msgbox::IconType;
use battery_monitor::{init_logging, run};
use battery_monitor::config::types::ConfigOverrides;
use battery_monitor::error::{error_msgbox, AppRunError, ConfigError};

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Shows the battery state of a Nicla board, read over Bluetooth LE", long_about = None)]
struct Args {
    /// Do not open a window; connect right away and print the battery state on every update
    #[arg(long)]
    headless: bool,

    /// Subscribe to notifications from the device instead of polling it
    #[arg(long, conflicts_with = "poll_interval_ms")]
    notify: bool,

    /// Interval between reads when polling, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// How long to look for a battery monitor after pressing connect, in milliseconds
    #[arg(long)]
    scan_timeout_ms: Option<u64>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            use_polling: if self.notify { Some(false) } else { None },
            poll_interval_ms: self.poll_interval_ms,
            scan_timeout_ms: self.scan_timeout_ms,
        }
    }
}

fn main() -> Result<(), AppRunError> {
    let args = Args::parse();

    init_logging();
    info!(concat!("Battery Monitor ", env!("CARGO_PKG_VERSION")));

    match run(args.headless, args.overrides()) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            let message = "This application has already been started";
            if args.headless {
                eprintln!("{}", message);
            } else {
                msgbox::create(
                    concat!("Battery Monitor ", env!("CARGO_PKG_VERSION")),
                    message,
                    IconType::Error,
                ).expect("Could not create msgbox");
            }
            Ok(())
        },
        Err(err) => {
            if args.headless {
                eprintln!("Unexpected error: {}", err);
            } else {
                error_msgbox("Unexpected error", &err);
            }
            Err(err)
        }
        Ok(_) => Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_disables_polling() {
        let args = Args::parse_from(["battery-monitor", "--headless", "--notify"]);
        assert!(args.headless);
        assert_eq!(args.overrides().use_polling, Some(false));
    }

    #[test]
    fn poll_interval_override() {
        let args = Args::parse_from(["battery-monitor", "--poll-interval-ms", "1000"]);
        let overrides = args.overrides();
        assert_eq!(overrides.use_polling, None);
        assert_eq!(overrides.poll_interval_ms, Some(1000));
    }

    #[test]
    fn notify_conflicts_with_poll_interval() {
        let result = Args::try_parse_from(["battery-monitor", "--notify", "--poll-interval-ms", "1000"]);
        assert!(result.is_err());
    }
}
