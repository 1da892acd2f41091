/*
 * O(1) Priority Run-Queue
 *
 * LAYOUT:
 * =======
 *
 *   bitmap:  0 0 1 0 1 0 ...          (bit p set <=> level p non-empty)
 *   heads:  [H0] [H1] [H2]-> T4 <-> T9 <-> (back to H2)
 *                     [H4]-> T1 <-> (back to H4)
 *
 * Each level is a circular doubly linked list threaded through the thread
 * descriptors, closed by a sentinel head stored here. Links are ThreadIds,
 * so the descriptors can live in any arena that implements RunQueueNodes.
 *
 * COST:
 * =====
 *
 * - enqueue_tail / enqueue_head: three link updates plus a bit set
 * - dequeue: two link updates, bit cleared when the level empties
 * - pick_next: find-first-set on the bitmap, then the level's first thread
 *
 * No operation locks anything. The owner (the per-CPU IrqSpinLock) is held
 * by the caller, which may batch several operations in one critical section.
 *
 * Every operation ends with an O(1) consistency check of the level it
 * touched. Corruption (double enqueue, dequeue of an absent thread, bitmap
 * disagreeing with a list) is fatal: the scheduler cannot make a trustworthy
 * decision from a broken queue. `verify` runs the full O(n) check.
 */

use super::bitmap::PriorityBitmap;
use super::thread::{Link, Node, ThreadId};
use super::types::{CpuId, Priority};
use crate::error::InvariantViolation;

/// Thread storage seen by a run-queue
///
/// Lookups of ids the run-queue reached through its own links are expected
/// to succeed; implementations abort on an unknown id.
pub trait RunQueueNodes {
    fn contains(&self, tid: ThreadId) -> bool;
    fn priority_of(&self, tid: ThreadId) -> Priority;
    fn link(&self, tid: ThreadId) -> Link;
    fn set_link(&mut self, tid: ThreadId, link: Link);
    fn queued_on(&self, tid: ThreadId) -> Option<CpuId>;
    fn set_queued(&mut self, tid: ThreadId, cpu: Option<CpuId>);
}

/// Per-CPU run-queue with `N` priority levels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQueue<const N: usize> {
    cpu: CpuId,
    heads: [Link; N],
    bitmap: PriorityBitmap,
    level_len: [u32; N],
    nr_queued: usize,
}

impl<const N: usize> RunQueue<N> {
    const LEVELS_FIT: () = assert!(
        N > 0 && N <= PriorityBitmap::CAPACITY,
        "run-queue levels must fit the priority bitmap"
    );

    /// Empty run-queue owned by `cpu`
    pub const fn new(cpu: CpuId) -> Self {
        let () = Self::LEVELS_FIT;
        Self {
            cpu,
            heads: [Link::EMPTY_HEAD; N],
            bitmap: PriorityBitmap::new(),
            level_len: [0; N],
            nr_queued: 0,
        }
    }

    pub fn cpu(&self) -> CpuId {
        self.cpu
    }

    /// Insert at the tail of the thread's priority level
    pub fn enqueue_tail<Q: RunQueueNodes + ?Sized>(&mut self, nodes: &mut Q, tid: ThreadId) {
        let level = self.admit(nodes, tid);
        let tail = self.heads[level].prev;
        self.link_between(nodes, level, tid, tail, Node::Head);
    }

    /// Insert at the head of the thread's priority level
    ///
    /// The thread becomes the next pick of its level, ahead of every thread
    /// already waiting there.
    pub fn enqueue_head<Q: RunQueueNodes + ?Sized>(&mut self, nodes: &mut Q, tid: ThreadId) {
        let level = self.admit(nodes, tid);
        let first = self.heads[level].next;
        self.link_between(nodes, level, tid, Node::Head, first);
    }

    /// Unlink a queued thread
    ///
    /// The thread's links point back at itself afterwards.
    pub fn dequeue<Q: RunQueueNodes + ?Sized>(&mut self, nodes: &mut Q, tid: ThreadId) {
        sched_assert!(
            nodes.queued_on(tid) == Some(self.cpu),
            InvariantViolation::NotQueued { tid, cpu: self.cpu }
        );
        let level = self.level_of(nodes, tid);

        let Link { next, prev } = nodes.link(tid);
        let me = Node::Thread(tid);
        sched_assert!(
            self.link_of(nodes, level, prev).next == me && self.link_of(nodes, level, next).prev == me,
            InvariantViolation::BrokenLink { cpu: self.cpu, level }
        );

        self.set_next(nodes, level, prev, next);
        self.set_prev(nodes, level, next, prev);
        nodes.set_link(tid, Link::unlinked(tid));
        nodes.set_queued(tid, None);

        self.level_len[level] -= 1;
        self.nr_queued -= 1;
        if self.heads[level].next == Node::Head {
            self.bitmap.clear(level);
        }
        self.check_level(level);
    }

    /// First thread of the most urgent non-empty level, left in place
    ///
    /// `None` means the CPU has nothing to run (idle).
    pub fn pick_next(&self) -> Option<ThreadId> {
        let level = self.bitmap.first_set()?;
        match self.heads[level].next {
            Node::Thread(tid) => Some(tid),
            Node::Head => invariant_violation!(InvariantViolation::BitmapDesync {
                cpu: self.cpu,
                level,
                bit_set: true,
            }),
        }
    }

    /// Most urgent non-empty level
    pub fn highest_priority(&self) -> Option<Priority> {
        self.bitmap.first_set().map(|level| Priority(level as u8))
    }

    pub fn first_at(&self, priority: Priority) -> Option<ThreadId> {
        match self.heads.get(priority.index())?.next {
            Node::Thread(tid) => Some(tid),
            Node::Head => None,
        }
    }

    pub fn last_at(&self, priority: Priority) -> Option<ThreadId> {
        match self.heads.get(priority.index())?.prev {
            Node::Thread(tid) => Some(tid),
            Node::Head => None,
        }
    }

    /// Threads of one level in pick order
    pub fn iter_level<'a, Q: RunQueueNodes + ?Sized>(
        &'a self,
        nodes: &'a Q,
        priority: Priority,
    ) -> impl Iterator<Item = ThreadId> + 'a {
        let mut cursor = self
            .heads
            .get(priority.index())
            .map_or(Node::Head, |head| head.next);
        core::iter::from_fn(move || match cursor {
            Node::Head => None,
            Node::Thread(tid) => {
                cursor = nodes.link(tid).next;
                Some(tid)
            }
        })
    }

    /// Number of queued threads
    pub fn len(&self) -> usize {
        self.nr_queued
    }

    pub fn is_empty(&self) -> bool {
        self.nr_queued == 0
    }

    pub fn level_len(&self, priority: Priority) -> usize {
        self.level_len.get(priority.index()).map_or(0, |n| *n as usize)
    }

    pub fn bitmap(&self) -> &PriorityBitmap {
        &self.bitmap
    }

    /// Full structural check of every level
    ///
    /// Walks each list forwards, checking back links, level membership,
    /// queue ownership, the level counters and the bitmap.
    pub fn verify<Q: RunQueueNodes + ?Sized>(&self, nodes: &Q) -> Result<(), InvariantViolation> {
        let cpu = self.cpu;
        for level in 0..N {
            let mut counted = 0usize;
            let mut prev = Node::Head;
            let mut cursor = self.heads[level].next;

            while let Node::Thread(tid) = cursor {
                if counted > self.nr_queued {
                    return Err(InvariantViolation::BrokenLink { cpu, level });
                }
                if !nodes.contains(tid) {
                    return Err(InvariantViolation::UnknownThread(tid));
                }
                if nodes.priority_of(tid).index() != level {
                    return Err(InvariantViolation::WrongLevel { tid, level });
                }
                if nodes.queued_on(tid) != Some(cpu) {
                    return Err(InvariantViolation::NotQueued { tid, cpu });
                }
                let link = nodes.link(tid);
                if link.prev != prev {
                    return Err(InvariantViolation::BrokenLink { cpu, level });
                }
                counted += 1;
                prev = cursor;
                cursor = link.next;
            }

            if self.heads[level].prev != prev {
                return Err(InvariantViolation::BrokenLink { cpu, level });
            }
            let recorded = self.level_len[level] as usize;
            if counted != recorded {
                return Err(InvariantViolation::LevelCount { cpu, level, counted, recorded });
            }
            let bit_set = self.bitmap.test(level);
            if bit_set != (counted > 0) {
                return Err(InvariantViolation::BitmapDesync { cpu, level, bit_set });
            }
        }
        Ok(())
    }

    /// Validate an enqueue request and return the target level
    fn admit<Q: RunQueueNodes + ?Sized>(&self, nodes: &Q, tid: ThreadId) -> usize {
        if let Some(queued_on) = nodes.queued_on(tid) {
            invariant_violation!(InvariantViolation::DoubleEnqueue { tid, queued_on });
        }
        sched_assert!(
            nodes.link(tid).is_unlinked(tid),
            InvariantViolation::DoubleEnqueue { tid, queued_on: self.cpu }
        );
        self.level_of(nodes, tid)
    }

    fn level_of<Q: RunQueueNodes + ?Sized>(&self, nodes: &Q, tid: ThreadId) -> usize {
        let priority = nodes.priority_of(tid);
        sched_assert!(
            priority.index() < N,
            InvariantViolation::PriorityOutOfRange { tid, priority }
        );
        priority.index()
    }

    fn link_between<Q: RunQueueNodes + ?Sized>(
        &mut self,
        nodes: &mut Q,
        level: usize,
        tid: ThreadId,
        prev: Node,
        next: Node,
    ) {
        let me = Node::Thread(tid);
        nodes.set_link(tid, Link { next, prev });
        self.set_next(nodes, level, prev, me);
        self.set_prev(nodes, level, next, me);
        nodes.set_queued(tid, Some(self.cpu));

        self.level_len[level] += 1;
        self.nr_queued += 1;
        self.bitmap.set(level);
        self.check_level(level);
    }

    fn link_of<Q: RunQueueNodes + ?Sized>(&self, nodes: &Q, level: usize, node: Node) -> Link {
        match node {
            Node::Head => self.heads[level],
            Node::Thread(tid) => nodes.link(tid),
        }
    }

    fn set_next<Q: RunQueueNodes + ?Sized>(&mut self, nodes: &mut Q, level: usize, node: Node, next: Node) {
        match node {
            Node::Head => self.heads[level].next = next,
            Node::Thread(tid) => {
                let mut link = nodes.link(tid);
                link.next = next;
                nodes.set_link(tid, link);
            }
        }
    }

    fn set_prev<Q: RunQueueNodes + ?Sized>(&mut self, nodes: &mut Q, level: usize, node: Node, prev: Node) {
        match node {
            Node::Head => self.heads[level].prev = prev,
            Node::Thread(tid) => {
                let mut link = nodes.link(tid);
                link.prev = prev;
                nodes.set_link(tid, link);
            }
        }
    }

    /// O(1) agreement of one level's head, counter and bitmap bit
    fn check_level(&self, level: usize) {
        let head = self.heads[level];
        let empty = head.next == Node::Head;
        sched_assert!(
            empty == (head.prev == Node::Head),
            InvariantViolation::BrokenLink { cpu: self.cpu, level }
        );
        let bit_set = self.bitmap.test(level);
        sched_assert!(
            bit_set != empty,
            InvariantViolation::BitmapDesync { cpu: self.cpu, level, bit_set }
        );
        let recorded = self.level_len[level] as usize;
        sched_assert!(
            empty == (recorded == 0),
            InvariantViolation::LevelCount {
                cpu: self.cpu,
                level,
                counted: usize::from(!empty),
                recorded,
            }
        );
    }
}
