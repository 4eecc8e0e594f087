pub(crate) mod command;
pub(crate) mod control;
pub(crate) mod scan;
pub(crate) mod send;
pub(crate) mod ui;

use std::io;

use serde::Serialize;

pub use self::command::{Args, Command, FakeArgs, LogLevel, OutputFormat};
pub use self::control::{BotArgs, BotCommand, CurtainAction, CurtainArgs};
pub use self::scan::ScanArgs;
pub use self::send::SendArgs;

/// Writes one value as a single JSON line.
pub(crate) fn write_json_line<W, T>(out: &mut W, value: &T) -> anyhow::Result<()>
where
    W: io::Write,
    T: Serialize + ?Sized,
{
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
