//! Opaque trace/event sink. §1 scopes log formatting out of the core; the
//! core only needs somewhere to emit events. The default sink routes
//! through the `log` facade, matching the rest of the ambient stack
//! (see `SPEC_FULL.md`); `-t`/`-i` raise the effective level rather than the
//! core owning a print buffer.

/// An executed instruction, reported when instruction tracing (`-i`) is on.
#[derive(Debug, Clone, Copy)]
pub struct InstructionEvent {
    pub pc: u64,
    pub raw: u32,
    pub compressed: bool,
}

/// Sink for emulator trace events. The default [`LogSink`] is almost always
/// what callers want; tests substitute a recording sink to assert on
/// emitted events without depending on `log`'s global state.
pub trait TraceSink {
    fn syscall(&mut self, _name: &str, _args: [i64; 6], _result: i64) {}
    fn instruction(&mut self, _event: InstructionEvent) {}
    fn message(&mut self, _text: &str) {}
}

/// Routes all events through the `log` crate.
#[derive(Debug, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn syscall(&mut self, name: &str, args: [i64; 6], result: i64) {
        log::trace!(
            "syscall {name}({:#x}, {:#x}, {:#x}, {:#x}, {:#x}, {:#x}) = {result}",
            args[0],
            args[1],
            args[2],
            args[3],
            args[4],
            args[5]
        );
    }

    fn instruction(&mut self, event: InstructionEvent) {
        log::trace!(
            "{:#018x}: {:#010x}{}",
            event.pc,
            event.raw,
            if event.compressed { " (c)" } else { "" }
        );
    }

    fn message(&mut self, text: &str) {
        log::debug!("{text}");
    }
}

/// Sink used by tests: records every call instead of going through `log`.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub messages: Vec<String>,
}

impl TraceSink for RecordingSink {
    fn message(&mut self, text: &str) {
        self.messages.push(text.to_owned());
    }
}
