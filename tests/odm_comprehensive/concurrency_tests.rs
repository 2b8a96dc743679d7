//! Concurrent access to shared records

use crate::test_utils::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_saves_of_distinct_records() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let db = Arc::clone(&test.db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..10 {
                    db.save(&user(&format!("t{}_{}", t, i), i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(test.engine().document_count("users"), threads * 10);
    assert_eq!(test.db.read_all_from_cache::<User>().unwrap().len(), threads * 10);
}

#[test]
fn test_overlapping_batches_do_not_deadlock() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let shared: Vec<Shared<User>> = (0..6).map(|i| user(&format!("s{}", i), i)).collect();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&test.db);
            let mut batch = shared.clone();
            // Each thread sees the batch in a different order
            batch.rotate_left(t);
            if t % 2 == 1 {
                batch.reverse();
            }
            thread::spawn(move || {
                for _ in 0..20 {
                    db.save_many(&batch).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(test.engine().document_count("users"), shared.len());
    assert!(shared.iter().all(|u| !u.is_write_locked()));
}

#[test]
#[ignore]
fn stress_update_and_save_same_record() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let counter = user("counter", 0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = Arc::clone(&test.db);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..500 {
                    counter.update(|u| u.age += 1);
                    db.save(&counter).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.read().age, 4000);
    let stored = stored_user(&test, &counter).unwrap();
    assert_eq!(stored.get("user_age"), Some(&Value::Int(4000)));
}
