/*
 * x86_64 Context Switching
 *
 * Threads are switched by swapping kernel stacks. The switch routine pushes
 * the System V callee-saved registers (rbp, rbx, r12-r15) on the outgoing
 * stack, stores RSP into the outgoing context, loads the incoming RSP and
 * pops the same registers back. Caller-saved registers are already spilled
 * by the compiler around the call, and the interrupted user/kernel state of
 * a preempted thread sits further up its own stack in the interrupt frame.
 *
 * STACK OF A THREAD THAT HAS NEVER RUN:
 * =====================================
 *
 * High Address  [stack top, 16-byte aligned]
 *               [sched_thread_trampoline]   <- popped by `ret`
 *               [rbp = 0]
 *               [rbx = 0]
 *               [r12 = entry]
 *               [r13 = arg]
 *               [r14 = exit hook]
 *               [r15 = 0]                   <- saved RSP
 * Low Address   [...]
 *
 * The trampoline moves r12/r13/r14 into argument registers and calls
 * thread_start, which enables interrupts (the switch ran with them off),
 * runs the entry function and finally calls the exit hook.
 */

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::interrupts::X86Irq;
use crate::arch::InterruptControl;
use crate::config::THREAD_STACK_SIZE;
use crate::error::SchedError;
use crate::scheduler::ThreadEntry;

core::arch::global_asm!(
    ".global sched_switch_context",
    "sched_switch_context:",
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "mov [rdi], rsp",
    "mov rsp, [rsi]",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    "ret",
    "",
    ".global sched_thread_trampoline",
    "sched_thread_trampoline:",
    "mov rdi, r12",
    "mov rsi, r13",
    "mov rdx, r14",
    "call {start}",
    "ud2",
    start = sym thread_start,
);

unsafe extern "C" {
    fn sched_switch_context(prev_rsp: *mut u64, next_rsp: *const u64);
    fn sched_thread_trampoline();
}

/// First Rust code executed by a new thread
extern "C" fn thread_start(entry: usize, arg: usize, exit: usize) -> ! {
    // SAFETY: the values were produced from these exact fn pointer types in
    // X86Context::for_thread.
    let entry: ThreadEntry = unsafe { core::mem::transmute(entry) };
    let exit: fn() -> ! = unsafe { core::mem::transmute(exit) };

    X86Irq::enable();
    entry(arg);
    exit()
}

/// Saved kernel stack of a thread
///
/// `rsp` must stay the first field: the switch routine stores through the
/// context pointer directly.
#[repr(C)]
#[derive(Debug, Default)]
pub struct X86Context {
    rsp: u64,
    stack: Option<Box<[u8]>>,
}

impl X86Context {
    /// Allocate a stack and lay out the first-switch frame
    ///
    /// # Arguments
    /// * `entry` - Thread body
    /// * `arg` - Value passed to `entry`
    /// * `exit` - Called if `entry` returns; must never return itself
    pub fn for_thread(entry: ThreadEntry, arg: usize, exit: fn() -> !) -> Result<Self, SchedError> {
        let mut stack: Vec<u8> = Vec::new();
        stack
            .try_reserve_exact(THREAD_STACK_SIZE)
            .map_err(|_| SchedError::ContextAlloc)?;
        stack.resize(THREAD_STACK_SIZE, 0);
        let mut stack = stack.into_boxed_slice();

        let top = (stack.as_mut_ptr() as u64 + THREAD_STACK_SIZE as u64) & !0xF;
        let frame: [u64; 7] = [
            0,                                       // r15
            exit as usize as u64,                    // r14
            arg as u64,                              // r13
            entry as usize as u64,                   // r12
            0,                                       // rbx
            0,                                       // rbp
            sched_thread_trampoline as usize as u64, // return address
        ];
        let rsp = top - (frame.len() * 8) as u64;

        // SAFETY: [rsp, top) lies inside the freshly allocated stack.
        unsafe {
            core::ptr::copy_nonoverlapping(frame.as_ptr(), rsp as *mut u64, frame.len());
        }

        Ok(Self {
            rsp,
            stack: Some(stack),
        })
    }

    /// Size of the owned stack (0 for a CPU's boot/idle context)
    pub fn stack_size(&self) -> usize {
        self.stack.as_ref().map_or(0, |s| s.len())
    }
}

/// Swap kernel stacks
///
/// # Safety
/// Interrupts must be disabled, `prev` and `next` must be valid and
/// distinct, and `next` must hold a stack saved by this routine or built by
/// `X86Context::for_thread`.
pub unsafe fn switch(prev: *mut X86Context, next: *const X86Context) {
    unsafe { sched_switch_context(&raw mut (*prev).rsp, &raw const (*next).rsp) }
}
