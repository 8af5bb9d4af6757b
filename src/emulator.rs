//! Ties together the register file, memory image, mmap arena, and syscall
//! process state into the one context the interpreter and dispatcher share
//! (§9 "global state" note: no process-wide statics, one struct passed by
//! mutable borrow).

use std::time::Instant;

use crate::cpu::execute::{self, StepOutcome};
use crate::cpu::Cpu;
use crate::elf::{Loaded, Target};
use crate::error::{EmulatorFault, ExitStatus};
use crate::memory::Image;
use crate::mmap::Arena;
use crate::syscall::ProcessState;
use crate::trace::{LogSink, TraceSink};

/// The two bits the run loop checks once per instruction (§5).
#[derive(Debug, Default, Clone, Copy)]
pub struct StateWord {
    pub trace_enabled: bool,
    pub stop_requested: bool,
}

/// Why [`Emulator::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Exited(i32),
    Stopped,
}

pub struct Emulator {
    pub cpu: Cpu,
    pub image: Image,
    pub mmap: Arena,
    pub process: ProcessState,
    pub state: StateWord,
    pub sink: Box<dyn TraceSink>,
    pub start_time: Instant,
    pub target: Target,

    pub brk_offset: u64,
    pub end_of_data: u64,
    pub bottom_of_stack: u64,
}

impl Emulator {
    /// Builds the running process state from a freshly loaded image (§4.F
    /// step 7): PC at the entry point, registers zeroed except `sp`.
    #[must_use]
    pub fn from_loaded(loaded: Loaded) -> Self {
        let mut cpu = Cpu::new(loaded.entry);
        cpu.set_reg(2, loaded.initial_sp); // x2 == sp

        Self {
            cpu,
            image: loaded.image,
            mmap: loaded.mmap,
            process: ProcessState::new(loaded.target),
            state: StateWord::default(),
            sink: Box::new(LogSink),
            start_time: Instant::now(),
            target: loaded.target,
            brk_offset: loaded.end_of_data,
            end_of_data: loaded.end_of_data,
            bottom_of_stack: loaded.bottom_of_stack,
        }
    }

    pub fn enable_trace(&mut self, instructions: bool) {
        self.state.trace_enabled = true;
        self.process.trace_instructions = instructions;
    }

    pub fn request_stop(&mut self) {
        self.state.stop_requested = true;
    }

    /// Runs until the guest exits, an external stop is requested, or a
    /// fault occurs. `cycle_budget` of `None` runs unboundedly.
    pub fn run(&mut self, cycle_budget: Option<u64>) -> Result<RunOutcome, EmulatorFault> {
        loop {
            if self.state.stop_requested {
                return Ok(RunOutcome::Stopped);
            }
            if let Some(budget) = cycle_budget {
                if self.cpu.cycle >= budget {
                    return Ok(RunOutcome::Stopped);
                }
            }
            match execute::step(self)? {
                StepOutcome::Continue => {}
                StepOutcome::Exit(status) => return Ok(RunOutcome::Exited(status)),
            }
        }
    }

    /// Validates the stack-pointer invariants of §8 before a fault would
    /// otherwise surface as a confusing memory error.
    pub fn check_stack_pointer(&self) -> Result<(), EmulatorFault> {
        let sp = self.cpu.reg(2);
        if sp % 16 != 0 {
            return Err(EmulatorFault::Misaligned { sp });
        }
        if sp < self.bottom_of_stack || sp >= self.image.end() {
            return Err(EmulatorFault::StackOutOfBounds {
                sp,
                low: self.bottom_of_stack,
                high: self.image.end(),
            });
        }
        Ok(())
    }
}

impl From<ExitStatus> for RunOutcome {
    fn from(value: ExitStatus) -> Self {
        match value {
            ExitStatus::Exited(code) => Self::Exited(code),
            ExitStatus::Stopped => Self::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::numbers;

    // [code 0x10000..0x11000) [brk 0x11000..0x18000) [stack 0x18000..0x20000)
    // [mmap 0x20000..0x28000), matching the relative ordering of §3's
    // layout diagram even though nothing here is ELF-loaded.
    const CODE_BASE: u64 = 0x1_0000;
    const CODE_SIZE: u64 = 0x1000;
    const BOTTOM_OF_STACK: u64 = 0x1_8000;
    const IMAGE_SIZE: u64 = 0x2_8000;
    const STACK_TOP: u64 = 0x2_0000 - 16;
    const MMAP_BASE: u64 = 0x2_0000;
    const MMAP_LEN: u64 = 0x8000;

    fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
        let imm12 = (imm as u32) & 0xFFF;
        (imm12 << 20) | (rs1 << 15) | (rd << 7) | 0x13
    }

    fn lui(rd: u32, target_page_aligned: u64) -> u32 {
        let imm20 = ((target_page_aligned >> 12) & 0xF_FFFF) as u32;
        (imm20 << 12) | (rd << 7) | 0x37
    }

    const ECALL: u32 = 0x73;
    const A0: u32 = 10;
    const A7: u32 = 17;

    fn harness(code: &[u32]) -> Emulator {
        let mut image = Image::new(CODE_BASE, IMAGE_SIZE as usize);
        for (i, word) in code.iter().enumerate() {
            image.write_u32(CODE_BASE + i as u64 * 4, *word).unwrap();
        }
        let mut cpu = Cpu::new(CODE_BASE);
        cpu.set_reg(2, STACK_TOP);
        Emulator {
            cpu,
            image,
            mmap: Arena::new(MMAP_BASE, MMAP_LEN),
            process: ProcessState::new(Target::RiscV64),
            state: StateWord::default(),
            sink: Box::new(crate::trace::RecordingSink::default()),
            start_time: Instant::now(),
            target: Target::RiscV64,
            brk_offset: CODE_BASE + CODE_SIZE,
            end_of_data: CODE_BASE + CODE_SIZE,
            bottom_of_stack: BOTTOM_OF_STACK,
        }
    }

    fn exit_with(code: i32) -> [u32; 3] {
        [addi(A0, 0, code), addi(A7, 0, numbers::EXIT as i32), ECALL]
    }

    #[test]
    fn trivial_exit_reports_guest_status() {
        let emu = &mut harness(&exit_with(7));
        assert_eq!(emu.run(None).unwrap(), RunOutcome::Exited(7));
    }

    #[test]
    fn brk_query_with_zero_returns_current_offset_unmodified() {
        let code = [addi(A0, 0, 0), addi(A7, 0, numbers::BRK as i32), ECALL];
        let mut emu = harness(&code);
        let initial = emu.brk_offset;
        let outcome = emu.run(Some(3)).unwrap();
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(emu.cpu.reg(A0), initial);
        assert_eq!(emu.brk_offset, initial);
    }

    #[test]
    fn brk_grows_within_bounds() {
        let target = CODE_BASE + CODE_SIZE + 0x1000;
        let code = [
            lui(A0, target),
            addi(A7, 0, numbers::BRK as i32),
            ECALL,
            addi(A0, 0, 42),
            addi(A7, 0, numbers::EXIT as i32),
            ECALL,
        ];
        let mut emu = harness(&code);
        assert_eq!(emu.run(None).unwrap(), RunOutcome::Exited(42));
        assert_eq!(emu.brk_offset, target);
    }

    #[test]
    fn brk_request_past_the_stack_is_rejected() {
        let target = BOTTOM_OF_STACK + 0x1000;
        let code = [lui(A0, target), addi(A7, 0, numbers::BRK as i32), ECALL];
        let mut emu = harness(&code);
        let initial = emu.brk_offset;
        emu.run(Some(3)).unwrap();
        assert_eq!(emu.brk_offset, initial);
    }

    #[test]
    fn mmap_then_munmap_round_trips_through_ecall() {
        const LENGTH: u64 = 0x1000;
        let code = [
            addi(A0, 0, 0),    // addr = NULL
            lui(11, LENGTH),   // length (page-aligned, needs the full 20-bit field)
            addi(12, 0, 0),    // prot (ignored)
            addi(13, 0, 0x22), // MAP_PRIVATE(0x2)|MAP_ANONYMOUS(0x20)
            addi(14, 0, -1),   // fd
            addi(15, 0, 0),    // offset
            addi(A7, 0, numbers::MMAP as i32),
            ECALL,
        ];
        let mut emu = harness(&code);
        let outcome = emu.run(Some(8)).unwrap();
        assert_eq!(outcome, RunOutcome::Stopped);
        let mapped = emu.cpu.reg(A0);
        assert_eq!(mapped, MMAP_BASE);
        assert_eq!(emu.mmap.entries().len(), 1);

        let free_code = [
            lui(11, LENGTH),
            addi(A7, 0, numbers::MUNMAP as i32),
            ECALL,
        ];
        let mut freeing = harness(&free_code);
        freeing.cpu.set_reg(A0, mapped);
        freeing.run(Some(3)).unwrap();
        assert_eq!(freeing.cpu.reg(A0), 0);
    }

    #[test]
    fn write_syscall_reports_bytes_written_to_stdout() {
        let message = b"hello\n";
        let msg_addr = CODE_BASE + CODE_SIZE; // page-aligned, lands in the brk region
        let code = [
            addi(A0, 0, 1), // fd = stdout
            lui(11, msg_addr),
            addi(12, 0, message.len() as i32),
            addi(A7, 0, numbers::WRITE as i32),
            ECALL,
        ];
        let mut emu = harness(&code);
        emu.image.write_bytes(msg_addr, message).unwrap();
        let outcome = emu.run(Some(5)).unwrap();
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(emu.cpu.reg(A0), message.len() as u64);
    }

    #[test]
    fn cycle_counter_advances_once_per_instruction() {
        let mut emu = harness(&exit_with(0));
        emu.run(None).unwrap();
        assert_eq!(emu.cpu.cycle, 3);
    }

    #[test]
    fn stack_pointer_starts_aligned_and_in_bounds() {
        let emu = harness(&exit_with(0));
        emu.check_stack_pointer().unwrap();
    }
}
