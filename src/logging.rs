use std::io::Write;

use env_logger::{Builder, Env};
use log::Level;

/// Inicializa env_logger con nivel `info` por defecto (sobrescribible con RUST_LOG).
/// Llamadas repetidas no hacen nada.
pub fn init_logger() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let level_color = match record.level() {
                Level::Error => "\x1b[31m\x1b[1m",
                Level::Warn => "\x1b[33m\x1b[1m",
                Level::Info => "\x1b[32m\x1b[1m",
                Level::Debug => "\x1b[36m\x1b[1m",
                Level::Trace => "\x1b[90m\x1b[1m",
            };
            writeln!(
                buf,
                "{}{} {}\x1b[0m [{}] {}",
                buf.timestamp_millis(),
                level_color,
                record.level(),
                record.target(),
                record.args(),
            )
        })
        .try_init();
}
