/*
 * Multi-CPU Scenarios
 *
 * Cross-CPU work always goes through the target's run-queue lock followed
 * by a reschedule IPI; these tests check both halves of that protocol.
 */

use std::sync::Arc;
use std::thread;
use std::vec::Vec;

use super::{HostScheduler, scheduler, spawn_on};
use crate::arch::host::set_current_cpu;
use crate::{CpuId, SchedConfig, SchedError, SwitchOutcome, ThreadId, ThreadState};

const CPU0: CpuId = CpuId::BSP;
const CPU1: CpuId = CpuId(1);

fn two_cpus() -> HostScheduler {
    let sched = scheduler(SchedConfig::DEFAULT.with_cpus(2));
    sched.bring_up_cpu(CPU1, 0x11).unwrap();
    sched
}

#[test]
fn secondary_cpus_come_online_once() {
    let sched = scheduler(SchedConfig::DEFAULT.with_cpus(3));
    sched.bring_up_cpu(CPU1, 0x11).unwrap();

    assert_eq!(sched.bring_up_cpu(CPU1, 0x11), Err(SchedError::CpuAlreadyOnline(CPU1)));
    assert_eq!(sched.bring_up_cpu(CpuId(3), 0x33), Err(SchedError::InvalidCpu(CpuId(3))));
    assert_eq!(sched.init_bsp(0), Err(SchedError::CpuAlreadyOnline(CPU0)));
    assert_eq!(sched.stats(CpuId(2)), Err(SchedError::CpuOffline(CpuId(2))));

    // Nothing to check is not the same as consistent
    assert_eq!(sched.verify(CpuId(2)), Err(SchedError::CpuOffline(CpuId(2))));
    assert_eq!(sched.verify(CpuId(3)), Err(SchedError::InvalidCpu(CpuId(3))));
    assert_eq!(sched.verify(CPU1), Ok(()));

    let stats = sched.stats(CPU1).unwrap();
    assert!(stats.online);
    assert_eq!(stats.apic_id, 0x11);
    assert_eq!(stats.current, None);
    assert_eq!(sched.platform().online_cpus(), [(CPU0, 0), (CPU1, 0x11)]);
}

#[test]
fn this_cpu_comes_from_the_platform() {
    let sched = two_cpus();
    set_current_cpu(CPU1);
    assert_eq!(sched.this_cpu(), CPU1);
    set_current_cpu(CPU0);
    assert_eq!(sched.this_cpu(), CPU0);
}

#[test]
fn remote_spawn_kicks_target_with_ipi() {
    let sched = two_cpus();
    let a = spawn_on(&sched, CPU0, CPU1, 5, 0);
    assert_eq!(sched.platform().take_ipis(), [CPU1]);

    assert_eq!(
        sched.on_reschedule_ipi(CPU1).unwrap(),
        SwitchOutcome::Switched { from: None, to: Some(a) }
    );
    assert_eq!(sched.platform().acks(), 1);
    assert_eq!(sched.current(CPU1).unwrap(), Some(a));
    assert_eq!(sched.current(CPU0).unwrap(), None);

    // Not more urgent than a: no interruption
    spawn_on(&sched, CPU0, CPU1, 9, 0);
    assert!(sched.platform().take_ipis().is_empty());

    // More urgent: interrupt CPU 1
    let c = spawn_on(&sched, CPU0, CPU1, 1, 0);
    assert_eq!(sched.platform().take_ipis(), [CPU1]);
    assert_eq!(
        sched.on_reschedule_ipi(CPU1).unwrap(),
        SwitchOutcome::Switched { from: Some(a), to: Some(c) }
    );
}

#[test]
fn wake_lands_on_home_cpu() {
    let sched = two_cpus();
    let a = spawn_on(&sched, CPU1, CPU1, 5, 0);
    assert!(sched.platform().take_ipis().is_empty());
    sched.on_timer_tick(CPU1).unwrap();
    assert_eq!(sched.current(CPU1).unwrap(), Some(a));

    sched.block_current(CPU1).unwrap();
    assert_eq!(sched.current(CPU1).unwrap(), None);

    sched.wake(CPU0, a).unwrap();
    assert_eq!(sched.platform().take_ipis(), [CPU1]);
    let info = sched.thread_info(a).unwrap();
    assert_eq!(info.queued_on, Some(CPU1));
    assert_eq!(info.state, ThreadState::Runnable);
    assert_eq!(sched.stats(CPU0).unwrap().queued, 0);
}

#[test]
fn migrate_moves_only_waiting_threads() {
    let sched = two_cpus();
    let a = spawn_on(&sched, CPU0, CPU0, 5, 0);
    let b = spawn_on(&sched, CPU0, CPU0, 5, 0);
    sched.on_timer_tick(CPU0).unwrap();
    assert_eq!(sched.current(CPU0).unwrap(), Some(a));

    assert_eq!(sched.migrate(CPU0, a, CPU1), Err(SchedError::ThreadRunning(a)));

    sched.migrate(CPU0, b, CPU1).unwrap();
    let info = sched.thread_info(b).unwrap();
    assert_eq!(info.home_cpu, CPU1);
    assert_eq!(info.queued_on, Some(CPU1));
    assert_eq!(sched.platform().take_ipis(), [CPU1]);

    // Already there
    sched.migrate(CPU0, b, CPU1).unwrap();
    assert!(sched.platform().take_ipis().is_empty());

    assert_eq!(sched.stats(CPU0).unwrap().queued, 1);
    assert_eq!(sched.stats(CPU1).unwrap().queued, 1);
    assert_eq!(sched.verify(CPU0), Ok(()));
    assert_eq!(sched.verify(CPU1), Ok(()));
}

#[test]
fn preempted_thread_migrates_once_switched_out() {
    let sched = two_cpus();
    let config_ticks = sched.config().timeslice_ticks;
    let a = spawn_on(&sched, CPU0, CPU0, 5, 0);
    let b = spawn_on(&sched, CPU0, CPU0, 5, 0);
    for _ in 0..=config_ticks {
        sched.on_timer_tick(CPU0).unwrap();
    }
    assert_eq!(sched.current(CPU0).unwrap(), Some(b));

    // a was just switched out and may still be saving its registers
    assert_eq!(sched.migrate(CPU0, a, CPU1), Err(SchedError::ThreadRunning(a)));

    // Any later scheduler entry on CPU 0 finishes that switch
    assert_eq!(sched.on_reschedule_ipi(CPU0).unwrap(), SwitchOutcome::Continued);
    sched.migrate(CPU0, a, CPU1).unwrap();
    assert_eq!(sched.thread_info(a).unwrap().home_cpu, CPU1);
}

#[test]
fn migrate_rejects_blocked_threads() {
    let sched = two_cpus();
    let a = spawn_on(&sched, CPU0, CPU0, 5, 0);
    sched.on_timer_tick(CPU0).unwrap();
    sched.block_current(CPU0).unwrap();
    sched.on_timer_tick(CPU0).unwrap();

    assert_eq!(
        sched.migrate(CPU0, a, CPU1),
        Err(SchedError::InvalidState { tid: a, state: ThreadState::Blocked })
    );
}

#[test]
fn balance_evens_out_run_queues() {
    let sched = two_cpus();
    let ids: Vec<ThreadId> = [5, 5, 6, 7]
        .into_iter()
        .map(|prio| spawn_on(&sched, CPU0, CPU0, prio, 0))
        .collect();

    assert_eq!(sched.balance(CPU1), Ok(Some(ids[0])));
    assert_eq!(sched.balance(CPU1), Ok(Some(ids[1])));
    assert_eq!(sched.balance(CPU1), Ok(None));
    assert_eq!(sched.balance(CPU0), Ok(None));

    assert_eq!(sched.stats(CPU0).unwrap().queued, 2);
    assert_eq!(sched.stats(CPU1).unwrap().queued, 2);
    assert_eq!(sched.thread_info(ids[0]).unwrap().home_cpu, CPU1);
    assert_eq!(sched.verify(CPU0), Ok(()));
    assert_eq!(sched.verify(CPU1), Ok(()));

    // The puller is the calling CPU: flag only, no IPI
    assert!(sched.platform().take_ipis().is_empty());
    assert!(sched.on_timer_tick(CPU1).unwrap().switched());
}

#[test]
fn balance_never_pulls_the_running_thread() {
    let sched = two_cpus();
    let a = spawn_on(&sched, CPU0, CPU0, 1, 0);
    let b = spawn_on(&sched, CPU0, CPU0, 5, 0);
    spawn_on(&sched, CPU0, CPU0, 5, 0);
    sched.on_timer_tick(CPU0).unwrap();
    assert_eq!(sched.current(CPU0).unwrap(), Some(a));

    assert_eq!(sched.balance(CPU1), Ok(Some(b)));
}

#[test]
fn two_cpus_drive_the_scheduler_concurrently() {
    const ROUNDS: usize = 100;

    let sched = Arc::new(two_cpus());
    let workers: Vec<_> = [CPU0, CPU1]
        .into_iter()
        .map(|me| {
            let sched = sched.clone();
            thread::spawn(move || {
                set_current_cpu(me);
                let other = if me == CPU0 { CPU1 } else { CPU0 };
                for round in 0..ROUNDS {
                    let target = if round % 2 == 0 { me } else { other };
                    spawn_on(&sched, me, target, (round % 8) as u8, round);
                    sched.on_timer_tick(me).unwrap();
                    if round % 3 == 0 && sched.current(me).unwrap().is_some() {
                        sched.exit_current(me, round as i32).unwrap();
                    }
                    if round % 5 == 0 {
                        sched.balance(me).unwrap();
                    }
                    sched.on_reschedule_ipi(me).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(sched.verify(CPU0), Ok(()));
    assert_eq!(sched.verify(CPU1), Ok(()));
    assert_eq!(sched.thread_count(), 2 * ROUNDS);

    let mut live = [0usize; 2];
    for id in 0..(2 * ROUNDS) as u32 {
        let info = sched.thread_info(ThreadId(id)).unwrap();
        match info.state {
            ThreadState::Terminated => assert_eq!(info.queued_on, None),
            state => {
                assert_ne!(state, ThreadState::Blocked);
                assert_eq!(info.queued_on, Some(info.home_cpu));
                live[info.home_cpu.as_usize()] += 1;
            }
        }
    }
    assert_eq!(sched.stats(CPU0).unwrap().queued, live[0]);
    assert_eq!(sched.stats(CPU1).unwrap().queued, live[1]);
}
