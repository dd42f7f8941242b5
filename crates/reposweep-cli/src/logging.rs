//! Logger setup.

use console::style;
use env_logger::Builder;
use log::Level;
use log::LevelFilter;
use std::io::Write;

/// Crates whose records follow the requested level; everything else is
/// held at `Warn`. `RUST_LOG` still overrides both.
const OWN_MODULES: &[&str] = &["reposweep", "reposweep_core"];

pub fn setup_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Warn);
    for module in OWN_MODULES {
        builder.filter_module(module, level);
    }
    builder
        .parse_default_env()
        .format(|buf, record| {
            let name = style("reposweep").cyan();
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = if record.level() == Level::Warn {
                        style("WARN").yellow()
                    } else {
                        style("ERROR").red()
                    };
                    let path = style(record.target()).white();
                    format!("[{name} {level_str} {path}] {}", record.args())
                }
                Level::Debug | Level::Trace => {
                    format!("[{name} {}] {}", style(record.target()).dim(), record.args())
                }
                Level::Info => format!("[{name}] {}", record.args()),
            };
            writeln!(buf, "{line}")
        })
        .init();
}
