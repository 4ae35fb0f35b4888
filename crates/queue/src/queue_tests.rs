// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const VIS: Duration = Duration::from_secs(30);

fn queue() -> StageQueue<&'static str> {
    StageQueue::new("test-queue", 3)
}

#[test]
fn fifo_for_single_consumer() {
    let q = queue();
    q.push_all(["a", "b", "c"]);
    let now = Instant::now();

    let a = q.try_receive(VIS, now).unwrap();
    let b = q.try_receive(VIS, now).unwrap();
    assert_eq!(a.payload, "a");
    assert_eq!(b.payload, "b");
    assert_eq!(a.delivery, 1);

    assert!(q.ack(&a));
    assert!(q.ack(&b));
    assert_eq!(q.try_receive(VIS, now).unwrap().payload, "c");
}

#[test]
fn empty_queue_yields_nothing() {
    let q = queue();
    assert!(q.try_receive(VIS, Instant::now()).is_none());
}

#[test]
fn nack_redelivers_with_bumped_delivery() {
    let q = queue();
    q.push("a");
    let now = Instant::now();

    let first = q.try_receive(VIS, now).unwrap();
    q.nack(&first);

    let second = q.try_receive(VIS, now).unwrap();
    assert_eq!(second.payload, "a");
    assert_eq!(second.delivery, 2);
}

#[test]
fn expired_lease_redelivers() {
    let q = queue();
    q.push("a");
    let now = Instant::now();

    let lease = q.try_receive(VIS, now).unwrap();
    assert_eq!(q.redeliver_expired(now + VIS), 1);

    // The original ack is late; the item must still be deliverable
    assert!(!q.ack(&lease));
    let again = q.try_receive(VIS, now).unwrap();
    assert_eq!(again.payload, "a");
    assert_eq!(again.delivery, 2);
}

#[test]
fn unexpired_lease_stays_in_flight() {
    let q = queue();
    q.push("a");
    let now = Instant::now();

    let _lease = q.try_receive(VIS, now).unwrap();
    assert_eq!(q.redeliver_expired(now + VIS / 2), 0);
    assert_eq!(q.stats().in_flight, 1);
}

#[test]
fn release_requeues_without_burning_budget() {
    let q = queue();
    q.push("a");
    let now = Instant::now();

    // Far past the failure budget: releases never dead-letter
    for expected_delivery in 1..=10 {
        let lease = q.try_receive(VIS, now).unwrap();
        assert_eq!(lease.delivery, expected_delivery);
        q.release(&lease);
    }

    assert!(q.dead_items().is_empty());
    assert_eq!(q.stats().depth, 1);

    // A subsequent nack still counts against the budget
    let lease = q.try_receive(VIS, now).unwrap();
    q.nack(&lease);
    let lease = q.try_receive(VIS, now).unwrap();
    assert_eq!(lease.delivery, 12);
}

#[test]
fn release_after_expiry_is_a_no_op() {
    let q = queue();
    q.push("a");
    let now = Instant::now();

    let lease = q.try_receive(VIS, now).unwrap();
    assert_eq!(q.redeliver_expired(now + VIS), 1);
    q.release(&lease);

    // Exactly one copy remains deliverable
    assert_eq!(q.stats().depth, 1);
    assert!(q.try_receive(VIS, now).is_some());
    assert!(q.try_receive(VIS, now).is_none());
}

#[test]
fn dead_letters_after_failure_budget() {
    let q = queue();
    q.push("a");
    let now = Instant::now();

    for _ in 0..3 {
        let lease = q.try_receive(VIS, now).unwrap();
        q.nack(&lease);
    }

    assert!(q.try_receive(VIS, now).is_none());
    assert_eq!(q.dead_items(), vec!["a"]);
    let stats = q.stats();
    assert_eq!(stats.dead, 1);
    assert_eq!(stats.depth, 0);
    assert_eq!(stats.in_flight, 0);
}

#[test]
fn stats_reflect_lifecycle() {
    let q = queue();
    q.push_all(["a", "b"]);
    assert_eq!(q.stats().depth, 2);
    assert_eq!(q.published(), 2);

    let lease = q.try_receive(VIS, Instant::now()).unwrap();
    let stats = q.stats();
    assert_eq!(stats.depth, 1);
    assert_eq!(stats.in_flight, 1);

    q.ack(&lease);
    assert_eq!(q.stats().in_flight, 0);
}

#[tokio::test]
async fn receive_wakes_on_push() {
    let q = std::sync::Arc::new(StageQueue::new("wake", 3));
    let q2 = std::sync::Arc::clone(&q);

    let consumer =
        tokio::spawn(async move { q2.receive(VIS, Instant::now).await.payload });

    // Give the consumer a chance to park first
    tokio::task::yield_now().await;
    q.push("a");

    assert_eq!(consumer.await.unwrap(), "a");
}

#[tokio::test]
async fn receive_wakes_on_redelivery() {
    let q = std::sync::Arc::new(StageQueue::<&str>::new("wake-redeliver", 3));
    q.push("a");
    let now = Instant::now();
    let lease = q.try_receive(VIS, now).unwrap();

    let q2 = std::sync::Arc::clone(&q);
    let consumer =
        tokio::spawn(async move { q2.receive(VIS, Instant::now).await.payload });

    tokio::task::yield_now().await;
    drop(lease);
    q.redeliver_expired(now + VIS);

    assert_eq!(consumer.await.unwrap(), "a");
}
