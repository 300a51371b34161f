//! The reference back-end: [`Target`] over the bundled instruction-set
//! simulator.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crate::arch;
use crate::sim::Simulator;
use crate::sim::StopEvent;
use crate::sim::DEFAULT_MEM_SIZE;
use crate::sim::SIGTRAP;
use crate::target::MatchKind;
use crate::target::ResetKind;
use crate::target::ResumeMode;
use crate::target::StopReason;
use crate::target::Target;
use crate::target::TargetError;
use crate::target::TargetResult;
use crate::trace::TraceFlags;

pub struct GdbSim {
    sim: Simulator,
    /// Cycle counter mirrored for the process-wide
    /// [`timestamp`](crate::targets::timestamp) hook.
    shared_cycles: Arc<AtomicU64>,
}

impl GdbSim {
    /// Construction performs a cold reset: open the simulator in debug mode
    /// and create a fresh inferior.
    pub fn new(flags: &TraceFlags) -> GdbSim {
        if flags.contains(TraceFlags::VCD) {
            log::warn!("gdbsim cannot generate a VCD; ignoring --trace vcd");
        }

        let mut target = GdbSim {
            sim: Simulator::open(DEFAULT_MEM_SIZE),
            shared_cycles: Arc::new(AtomicU64::new(0)),
        };
        target.cold_open();
        target
    }

    /// The cycle counter in the form the process-wide timestamp hook wants.
    pub fn clock(&self) -> &Arc<AtomicU64> {
        &self.shared_cycles
    }

    /// Tear down the previous simulator instance (dropping it is the
    /// shutdown) and bring up a new one with a fresh inferior.
    fn cold_open(&mut self) {
        self.sim = Simulator::open(DEFAULT_MEM_SIZE);
        self.sim.create_inferior();
        self.publish_cycles();
    }

    fn publish_cycles(&self) {
        self.shared_cycles
            .store(self.sim.cycle_count(), Ordering::Relaxed);
    }

    fn fetch_u16(&self, addr: u32) -> Option<u16> {
        let mut buf = [0u8; 2];
        (self.sim.read(addr, &mut buf) == 2).then(|| u16::from_le_bytes(buf))
    }

    fn fetch_u32(&self, addr: u32) -> Option<u32> {
        let mut buf = [0u8; 4];
        (self.sim.read(addr, &mut buf) == 4).then(|| u32::from_le_bytes(buf))
    }

    /// Execute a single instruction and classify the stop.
    ///
    /// A core sat on ECALL is not stepped at all: the program counter is
    /// nudged past it and the stop is reported as a syscall, so the engine
    /// can run the File-I/O exchange.
    fn do_one_step(&mut self) -> TargetResult<StopReason> {
        let step_addr = self.sim.pc();

        if self.fetch_u32(step_addr) == Some(arch::ECALL) {
            self.sim.set_pc(step_addr.wrapping_add(4));
            return Ok(StopReason::Syscall);
        }

        let event = self.sim.step();
        self.publish_cycles();

        match event {
            StopEvent::Stopped(SIGTRAP) => {
                // Stopped looking at an EBREAK (either width) means we hit a
                // breakpoint; anything else is a completed step.
                if self.fetch_u16(step_addr) == Some(arch::C_EBREAK) {
                    return Ok(StopReason::SwBreak);
                }
                if self.fetch_u32(step_addr) == Some(arch::EBREAK) {
                    return Ok(StopReason::SwBreak);
                }
                Ok(StopReason::Stepped)
            }
            StopEvent::Exited(code) => Ok(StopReason::Exited(code)),
            StopEvent::Signalled(signo) => Ok(StopReason::Signalled(signo)),
            StopEvent::Stopped(signo) => Err(TargetError::Fatal(format!(
                "simulator stopped with unexpected signal {signo}"
            ))),
        }
    }

    /// Step until something other than a completed step, or until the
    /// wall-clock budget runs out.
    fn do_run_to_break(&mut self, timeout: Option<Duration>) -> TargetResult<StopReason> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let res = self.do_one_step()?;
            if res != StopReason::Stepped {
                return Ok(res);
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(StopReason::Timeout);
                }
            }
        }
    }
}

impl Target for GdbSim {
    fn reset(&mut self, kind: ResetKind) -> TargetResult<()> {
        let (cycles, instret) = (self.sim.cycle_count(), self.sim.instr_count());
        self.cold_open();

        if kind == ResetKind::Warm {
            self.sim.restore_counters(cycles, instret);
            self.publish_cycles();
        }
        Ok(())
    }

    fn read_register(&mut self, reg: usize) -> TargetResult<u32> {
        self.sim
            .read_register(reg)
            .ok_or(TargetError::BadRegister)
    }

    fn write_register(&mut self, reg: usize, value: u32) -> TargetResult<()> {
        self.sim
            .write_register(reg, value)
            .ok_or(TargetError::BadRegister)
    }

    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) -> TargetResult<usize> {
        Ok(self.sim.read(addr, buf))
    }

    fn write_memory(&mut self, addr: u32, data: &[u8]) -> TargetResult<usize> {
        Ok(self.sim.write(addr, data))
    }

    fn resume(&mut self, mode: ResumeMode, timeout: Option<Duration>) -> TargetResult<StopReason> {
        match mode {
            ResumeMode::Step => self.do_one_step(),
            ResumeMode::Continue => self.do_run_to_break(timeout),
        }
    }

    fn insert_matchpoint(
        &mut self,
        addr: u32,
        kind: MatchKind,
        _len: usize,
    ) -> TargetResult<bool> {
        // The simulator has no debug unit to plant matchpoints in; declining
        // sends the engine down the memory-breakpoint path.
        log::trace!(target: "break", "gdbsim declines {kind:?} at {addr:#x}");
        Ok(false)
    }

    fn remove_matchpoint(
        &mut self,
        _addr: u32,
        _kind: MatchKind,
        _len: usize,
    ) -> TargetResult<bool> {
        Ok(false)
    }

    fn cycle_count(&self) -> u64 {
        self.sim.cycle_count()
    }

    fn instr_count(&self) -> u64 {
        self.sim.instr_count()
    }

    fn command(&mut self, cmd: &str, _out: &mut dyn std::fmt::Write) -> TargetResult<bool> {
        log::debug!("gdbsim has no back-end commands; \"{cmd}\" unhandled");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> GdbSim {
        GdbSim::new(&TraceFlags::empty())
    }

    #[test]
    fn step_over_plain_instruction() {
        let mut t = fresh();
        // addi x1, x0, 5
        t.write_memory(0, &0x0050_0093u32.to_le_bytes()).unwrap();
        let reason = t.resume(ResumeMode::Step, None).unwrap();
        assert_eq!(reason, StopReason::Stepped);
        assert_eq!(t.read_register(1).unwrap(), 5);
    }

    #[test]
    fn step_onto_ebreak_reports_swbreak() {
        let mut t = fresh();
        t.write_memory(0, &arch::EBREAK.to_le_bytes()).unwrap();
        let reason = t.resume(ResumeMode::Step, None).unwrap();
        assert_eq!(reason, StopReason::SwBreak);
        assert_eq!(t.read_register(arch::PC_REGNUM).unwrap(), 0);
    }

    #[test]
    fn ecall_advances_pc_and_reports_syscall() {
        let mut t = fresh();
        t.write_memory(0, &arch::ECALL.to_le_bytes()).unwrap();
        let reason = t.resume(ResumeMode::Step, None).unwrap();
        assert_eq!(reason, StopReason::Syscall);
        assert_eq!(t.read_register(arch::PC_REGNUM).unwrap(), 4);
    }

    #[test]
    fn continue_runs_to_breakpoint() {
        let mut t = fresh();
        // addi x1, x0, 1 ; addi x1, x1, 1 ; ebreak
        t.write_memory(0, &0x0010_0093u32.to_le_bytes()).unwrap();
        t.write_memory(4, &0x0010_8093u32.to_le_bytes()).unwrap();
        t.write_memory(8, &arch::EBREAK.to_le_bytes()).unwrap();
        let reason = t.resume(ResumeMode::Continue, None).unwrap();
        assert_eq!(reason, StopReason::SwBreak);
        assert_eq!(t.read_register(1).unwrap(), 2);
        assert_eq!(t.read_register(arch::PC_REGNUM).unwrap(), 8);
    }

    #[test]
    fn continue_times_out_on_a_spin() {
        let mut t = fresh();
        // j 0 (jal x0, 0)
        t.write_memory(0, &0x0000_006fu32.to_le_bytes()).unwrap();
        let reason = t
            .resume(ResumeMode::Continue, Some(Duration::from_millis(5)))
            .unwrap();
        assert_eq!(reason, StopReason::Timeout);
    }

    #[test]
    fn cold_reset_zeroes_counters_warm_preserves() {
        let mut t = fresh();
        t.write_memory(0, &0x0010_0093u32.to_le_bytes()).unwrap();
        t.resume(ResumeMode::Step, None).unwrap();
        assert_eq!(t.instr_count(), 1);

        t.reset(ResetKind::Warm).unwrap();
        assert_eq!(t.instr_count(), 1);

        t.reset(ResetKind::Cold).unwrap();
        assert_eq!(t.instr_count(), 0);
        assert_eq!(t.cycle_count(), 0);
    }

    #[test]
    fn unknown_register_is_rejected() {
        let mut t = fresh();
        assert!(matches!(
            t.read_register(77),
            Err(TargetError::BadRegister)
        ));
    }
}
