/*
 * Thread Descriptors and the Thread Arena
 *
 * Threads live in a fixed-capacity arena and are named by their slot index
 * (ThreadId). Run-queue links are indices too: `next`/`prev` of a queued
 * thread name either a neighbouring thread or the level's sentinel head.
 * The links record a position only; the arena alone owns descriptors, and a
 * slot is freed only by reaping a terminated thread.
 *
 * An unlinked thread's `next` and `prev` both point at itself, so "is this
 * thread on a list" never depends on a separate flag going stale.
 */

use core::fmt;

use heapless::Vec;

use super::runqueue::RunQueueNodes;
use super::types::{CpuId, Priority, TimeSliceTicks};
use crate::config::MAX_THREADS;
use crate::error::{InvariantViolation, SchedError};

/// Thread identifier (arena slot index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.0)
    }
}

/// Thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Waiting in a run-queue
    Runnable,
    /// Current on some CPU (still linked at the head of its level)
    Running,
    /// Waiting for an event, not in any run-queue
    Blocked,
    /// Finished, waiting to be reaped
    Terminated,
}

impl ThreadState {
    /// Edges of the thread state machine
    pub const fn can_become(self, to: ThreadState) -> bool {
        use ThreadState::*;
        matches!(
            (self, to),
            (Runnable, Running)
                | (Running, Runnable)
                | (Running, Blocked)
                | (Running, Terminated)
                | (Blocked, Runnable)
        )
    }
}

/// One end of a run-queue link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// Sentinel head of the level the link belongs to
    Head,
    Thread(ThreadId),
}

/// Structural position in a circular priority list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub next: Node,
    pub prev: Node,
}

impl Link {
    /// Empty level: the head points at itself
    pub const EMPTY_HEAD: Link = Link {
        next: Node::Head,
        prev: Node::Head,
    };

    /// Unlinked thread: both ends point back at the thread
    pub const fn unlinked(tid: ThreadId) -> Link {
        Link {
            next: Node::Thread(tid),
            prev: Node::Thread(tid),
        }
    }

    pub fn is_unlinked(&self, tid: ThreadId) -> bool {
        *self == Link::unlinked(tid)
    }
}

/// Thread descriptor
///
/// `C` is the platform's saved context (stack pointer and owned stack on
/// x86_64). The scheduler never looks inside it.
pub struct Thread<C> {
    pub id: ThreadId,
    pub name: &'static str,
    pub priority: Priority,
    pub state: ThreadState,
    pub context: C,

    // Run-queue position
    pub links: Link,
    pub on_rq: Option<CpuId>,

    /// CPU whose run-queue receives this thread on wake-up
    pub home_cpu: CpuId,

    /// Still executing or not yet fully switched out; the descriptor and its
    /// stack must stay put until this clears
    pub on_cpu: bool,

    pub timeslice: TimeSliceTicks,

    // Accounting
    pub ticks_run: u64,
    pub switches_in: u64,

    // Set by exit_current, handed to whoever reaps the thread
    pub exit_code: Option<i32>,
}

impl<C> Thread<C> {
    pub fn new(
        id: ThreadId,
        name: &'static str,
        priority: Priority,
        home_cpu: CpuId,
        context: C,
        timeslice: TimeSliceTicks,
    ) -> Self {
        Self {
            id,
            name,
            priority,
            state: ThreadState::Runnable,
            context,
            links: Link::unlinked(id),
            on_rq: None,
            home_cpu,
            on_cpu: false,
            timeslice,
            ticks_run: 0,
            switches_in: 0,
            exit_code: None,
        }
    }

    /// Move along the state machine, aborting on an edge that does not exist
    pub fn transition(&mut self, to: ThreadState) {
        sched_assert!(
            self.state.can_become(to),
            InvariantViolation::IllegalTransition {
                tid: self.id,
                from: self.state,
                to,
            }
        );
        self.state = to;
    }

    pub fn info(&self) -> ThreadInfo {
        ThreadInfo {
            id: self.id,
            name: self.name,
            priority: self.priority,
            state: self.state,
            home_cpu: self.home_cpu,
            queued_on: self.on_rq,
            on_cpu: self.on_cpu,
            ticks_run: self.ticks_run,
            switches_in: self.switches_in,
            exit_code: self.exit_code,
        }
    }
}

impl<C> fmt::Debug for Thread<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority.0)
            .field("state", &self.state)
            .field("on_rq", &self.on_rq)
            .finish()
    }
}

/// Snapshot of a thread for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: &'static str,
    pub priority: Priority,
    pub state: ThreadState,
    pub home_cpu: CpuId,
    pub queued_on: Option<CpuId>,
    pub on_cpu: bool,
    pub ticks_run: u64,
    pub switches_in: u64,
    pub exit_code: Option<i32>,
}

/// Fixed-capacity thread arena
pub struct ThreadTable<C> {
    slots: Vec<Option<Thread<C>>, MAX_THREADS>,
    live: usize,
}

impl<C> ThreadTable<C> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    /// Store a new thread in the first free slot
    ///
    /// `build` receives the id the thread will have.
    pub fn insert(
        &mut self,
        build: impl FnOnce(ThreadId) -> Thread<C>,
    ) -> Result<ThreadId, SchedError> {
        let index = match self.slots.iter().position(Option::is_none) {
            Some(index) => index,
            None => {
                self.slots
                    .push(None)
                    .map_err(|_| SchedError::TooManyThreads)?;
                self.slots.len() - 1
            }
        };

        let tid = ThreadId(index as u32);
        self.slots[index] = Some(build(tid));
        self.live += 1;
        Ok(tid)
    }

    /// Free a slot, returning the descriptor
    pub fn remove(&mut self, tid: ThreadId) -> Option<Thread<C>> {
        let thread = self.slots.get_mut(tid.index())?.take()?;
        self.live -= 1;
        Some(thread)
    }

    pub fn get(&self, tid: ThreadId) -> Option<&Thread<C>> {
        self.slots.get(tid.index())?.as_ref()
    }

    pub fn get_mut(&mut self, tid: ThreadId) -> Option<&mut Thread<C>> {
        self.slots.get_mut(tid.index())?.as_mut()
    }

    /// Number of live descriptors
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thread<C>> {
        self.slots.iter().flatten()
    }

    /// Descriptor that the run-queue structure says must exist
    fn node(&self, tid: ThreadId) -> &Thread<C> {
        match self.get(tid) {
            Some(thread) => thread,
            None => invariant_violation!(InvariantViolation::UnknownThread(tid)),
        }
    }

    fn node_mut(&mut self, tid: ThreadId) -> &mut Thread<C> {
        match self.get_mut(tid) {
            Some(thread) => thread,
            None => invariant_violation!(InvariantViolation::UnknownThread(tid)),
        }
    }
}

impl<C> Default for ThreadTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RunQueueNodes for ThreadTable<C> {
    fn contains(&self, tid: ThreadId) -> bool {
        self.get(tid).is_some()
    }

    fn priority_of(&self, tid: ThreadId) -> Priority {
        self.node(tid).priority
    }

    fn link(&self, tid: ThreadId) -> Link {
        self.node(tid).links
    }

    fn set_link(&mut self, tid: ThreadId, link: Link) {
        self.node_mut(tid).links = link;
    }

    fn queued_on(&self, tid: ThreadId) -> Option<CpuId> {
        self.node(tid).on_rq
    }

    fn set_queued(&mut self, tid: ThreadId, cpu: Option<CpuId>) {
        self.node_mut(tid).on_rq = cpu;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(id: ThreadId) -> Thread<()> {
        Thread::new(id, "t", Priority(1), CpuId::BSP, (), TimeSliceTicks(3))
    }

    #[test]
    fn new_thread_is_runnable_and_self_linked() {
        let t = thread(ThreadId(7));
        assert_eq!(t.state, ThreadState::Runnable);
        assert!(t.links.is_unlinked(ThreadId(7)));
        assert_eq!(t.on_rq, None);
        assert!(!t.on_cpu);
    }

    #[test]
    fn slots_are_reused_after_remove() {
        let mut table = ThreadTable::<()>::new();
        let a = table.insert(thread).unwrap();
        let b = table.insert(thread).unwrap();
        assert_eq!((a, b), (ThreadId(0), ThreadId(1)));
        assert_eq!(table.len(), 2);

        assert!(table.remove(a).is_some());
        assert!(table.remove(a).is_none());
        assert_eq!(table.len(), 1);

        let c = table.insert(thread).unwrap();
        assert_eq!(c, ThreadId(0));
        assert_eq!(table.get(c).unwrap().id, c);
    }

    #[test]
    fn arena_reports_exhaustion() {
        let mut table = ThreadTable::<()>::new();
        for _ in 0..MAX_THREADS {
            table.insert(thread).unwrap();
        }
        assert_eq!(table.insert(thread), Err(SchedError::TooManyThreads));
    }

    #[test]
    fn state_machine_edges() {
        use ThreadState::*;
        assert!(Runnable.can_become(Running));
        assert!(Running.can_become(Blocked));
        assert!(Blocked.can_become(Runnable));
        assert!(!Blocked.can_become(Running));
        assert!(!Terminated.can_become(Runnable));
        assert!(!Runnable.can_become(Terminated));
    }

    #[test]
    #[should_panic(expected = "illegal transition of Thread(2): Terminated -> Runnable")]
    fn illegal_transition_panics() {
        let mut t = thread(ThreadId(2));
        t.transition(ThreadState::Running);
        t.transition(ThreadState::Terminated);
        t.transition(ThreadState::Runnable);
    }
}
