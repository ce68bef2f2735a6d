//! Integration tests for overlapping scheduler calls.
//!
//! Whatever order the calls land in, the index must match the platform
//! queue for every task, with at most one entry per trigger kind.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, Utc};
use taskalert_core::{
    Config, InMemoryGateway, NotificationGateway, ReminderPolicy, ScheduleIndex, Scheduler,
    StaticPermission, Task, TaskStatus,
};
use taskalert_core::storage::MemoryStore;

fn scheduler(gw: Arc<InMemoryGateway>) -> Arc<Scheduler> {
    Arc::new(Scheduler::new(
        gw,
        ScheduleIndex::new(MemoryStore::new()),
        &Config::default(),
        &mut StaticPermission(true),
    ))
}

fn due_task(id: &str) -> Task {
    let mut task = Task::new(id, "Concurrent");
    task.status = TaskStatus::InProgress;
    task.due_date = Some(Utc::now() + Duration::days(3));
    task.reminder = Some(ReminderPolicy::OneDay);
    task
}

fn assert_consistent(s: &Scheduler, gw: &InMemoryGateway, task_id: &str) {
    let indexed: HashSet<_> = s
        .entries_for(task_id)
        .into_iter()
        .map(|e| e.handle)
        .collect();
    let pending: HashSet<_> = gw
        .list_pending()
        .unwrap()
        .into_iter()
        .filter(|p| p.payload.task_id == task_id)
        .map(|p| p.handle)
        .collect();
    assert_eq!(indexed, pending, "index and gateway disagree for {task_id}");

    let kinds: Vec<_> = s.entries_for(task_id).into_iter().map(|e| e.kind).collect();
    let unique: HashSet<_> = kinds.iter().collect();
    assert_eq!(kinds.len(), unique.len(), "duplicate kinds for {task_id}");
}

#[test]
fn reconcile_and_cancel_same_task_stay_consistent() {
    for _ in 0..50 {
        let gw = Arc::new(InMemoryGateway::new());
        let s = scheduler(gw.clone());
        let task = due_task("a");
        let barrier = Arc::new(Barrier::new(2));

        let reconciler = {
            let (s, barrier, task) = (s.clone(), barrier.clone(), task.clone());
            thread::spawn(move || {
                barrier.wait();
                s.reconcile(&task).unwrap();
            })
        };
        let canceler = {
            let (s, barrier) = (s.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                s.cancel("a").unwrap();
            })
        };
        reconciler.join().unwrap();
        canceler.join().unwrap();

        assert_consistent(&s, &gw, "a");
        let n = s.entries_for("a").len();
        assert!(n == 0 || n == 2, "unexpected entry count {n}");
    }
}

#[test]
fn many_tasks_in_parallel() {
    let gw = Arc::new(InMemoryGateway::new());
    let s = scheduler(gw.clone());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let s = s.clone();
            thread::spawn(move || {
                let task = due_task(&format!("task-{i}"));
                for _ in 0..10 {
                    s.reconcile(&task).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for i in 0..8 {
        let id = format!("task-{i}");
        assert_eq!(s.entries_for(&id).len(), 2);
        assert_consistent(&s, &gw, &id);
    }
    assert_eq!(gw.pending_count(), 16);
}

#[test]
fn restore_racing_reconcile_leaves_no_duplicates() {
    for _ in 0..20 {
        let gw = Arc::new(InMemoryGateway::new());
        let s = scheduler(gw.clone());
        let tasks: Vec<Task> = (0..4).map(|i| due_task(&format!("t{i}"))).collect();
        for t in &tasks {
            s.reconcile(t).unwrap();
        }
        let barrier = Arc::new(Barrier::new(2));

        let restorer = {
            let (s, barrier, tasks) = (s.clone(), barrier.clone(), tasks.clone());
            thread::spawn(move || {
                barrier.wait();
                s.restore_all(&tasks).unwrap();
            })
        };
        let reconciler = {
            let (s, barrier, tasks) = (s.clone(), barrier.clone(), tasks.clone());
            thread::spawn(move || {
                barrier.wait();
                for t in &tasks {
                    s.reconcile(t).unwrap();
                }
            })
        };
        restorer.join().unwrap();
        reconciler.join().unwrap();

        for t in &tasks {
            assert_consistent(&s, &gw, &t.id);
        }
    }
}
