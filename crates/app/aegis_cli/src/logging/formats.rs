use flexi_logger::{DeferredNow, style};
use log::{Level, Record};

/// `LEVEL message`, with the module path added for debug and trace records.
pub fn cli_format(
    w: &mut dyn std::io::Write,
    _now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    let level = record.level();
    let styled = style(level).paint(format!("{level:<5}"));
    match level {
        Level::Debug | Level::Trace => write!(
            w,
            "{styled} [{}] {}",
            record.module_path().unwrap_or("<unnamed>"),
            record.args()
        ),
        _ => write!(w, "{styled} {}", record.args()),
    }
}
