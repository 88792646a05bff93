//! Fixed-size worker pool over a work queue. Scoped threads pull items
//! from a shared channel; a worker owns each item end-to-end, so nothing
//! asynchronous crosses workers and no completion order is guaranteed.

use std::sync::mpsc;
use std::sync::Mutex;

/// Process `items` with up to `threads` workers, applying `work` to each.
/// Blocks until every item has been processed.
pub fn for_each_parallel<T, F>(items: Vec<T>, threads: usize, work: F)
where
    T: Send,
    F: Fn(T) + Sync,
{
    if items.is_empty() {
        return;
    }
    let threads = threads.max(1).min(items.len());

    let (tx, rx) = mpsc::channel();
    for item in items {
        // Send on an open channel with the receiver alive cannot fail.
        let _ = tx.send(item);
    }
    drop(tx);
    let rx = Mutex::new(rx);

    std::thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| loop {
                let item = match rx.lock() {
                    Ok(guard) => guard.recv(),
                    Err(_) => return,
                };
                match item {
                    Ok(item) => work(item),
                    Err(_) => return, // queue drained
                }
            });
        }
    });
}
