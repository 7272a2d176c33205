//! Console output buffer for one server.
//!
//! Lines arrive concurrently from the stdout and stderr readers. Every append
//! happens under a single lock, so lines are never torn or merged, and the
//! broadcast to subscribers is issued while the lock is held so that
//! subscribers see the same order as the buffer.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::models::{LogEntry, LogSeverity};

const BROADCAST_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Line(LogEntry),
    Cleared,
}

struct SinkInner {
    /// Cumulative text, one line per `\n`.
    text: String,
    line_count: usize,
    /// Display-facing ring, oldest evicted first.
    recent: VecDeque<LogEntry>,
    display_cap: usize,
    next_seq: u64,
}

pub struct LogSink {
    inner: Mutex<SinkInner>,
    tx: broadcast::Sender<LogEvent>,
}

impl LogSink {
    pub fn new(display_cap: usize) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Mutex::new(SinkInner {
                text: String::new(),
                line_count: 0,
                recent: VecDeque::with_capacity(display_cap.min(4096)),
                display_cap: display_cap.max(1),
                next_seq: 0,
            }),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkInner> {
        // A panicking subscriber must not take the console down with it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends one line. Blank input is ignored.
    pub fn append(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        let mut inner = self.lock();
        let entry = LogEntry {
            seq: inner.next_seq,
            text: line.to_string(),
            severity: LogSeverity::classify(line),
        };
        inner.next_seq += 1;

        inner.text.push_str(line);
        inner.text.push('\n');
        inner.line_count += 1;

        if inner.recent.len() >= inner.display_cap {
            inner.recent.pop_front();
        }
        inner.recent.push_back(entry.clone());

        let _ = self.tx.send(LogEvent::Line(entry));
    }

    /// Empties the buffer and tells subscribers to reset their view.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.text.clear();
        inner.line_count = 0;
        inner.recent.clear();
        let _ = self.tx.send(LogEvent::Cleared);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> String {
        self.lock().text.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().text.lines().map(String::from).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().line_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<LogEntry> {
        let inner = self.lock();
        let skip = inner.recent.len().saturating_sub(count);
        inner.recent.iter().skip(skip).cloned().collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lock().text.contains(needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lines_come_back_in_submission_order() {
        let sink = LogSink::new(1000);
        for i in 0..50 {
            sink.append(&format!("line {}", i));
        }
        let lines = sink.lines();
        assert_eq!(lines.len(), 50);
        assert_eq!(lines[0], "line 0");
        assert_eq!(lines[49], "line 49");
    }

    #[test]
    fn blank_input_is_ignored() {
        let sink = LogSink::new(10);
        sink.append("");
        sink.append("   ");
        sink.append("\t");
        assert!(sink.is_empty());
        assert_eq!(sink.snapshot(), "");
    }

    #[test]
    fn display_ring_evicts_oldest() {
        let sink = LogSink::new(3);
        for i in 0..5 {
            sink.append(&format!("l{}", i));
        }
        let recent: Vec<_> = sink.recent(10).into_iter().map(|e| e.text).collect();
        assert_eq!(recent, vec!["l2", "l3", "l4"]);
        // cumulative buffer keeps everything
        assert_eq!(sink.len(), 5);
    }

    #[test]
    fn clear_resets_and_notifies() {
        let sink = LogSink::new(10);
        let mut rx = sink.subscribe();
        sink.append("hello");
        sink.clear();
        assert!(sink.is_empty());
        assert!(sink.recent(10).is_empty());
        assert!(matches!(rx.try_recv(), Ok(LogEvent::Line(e)) if e.text == "hello"));
        assert_eq!(rx.try_recv().unwrap(), LogEvent::Cleared);
    }

    #[test]
    fn two_producers_never_tear_lines() {
        let sink = Arc::new(LogSink::new(100));
        let per_producer = 2000;

        let handles: Vec<_> = ["out", "err"]
            .into_iter()
            .map(|tag| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..per_producer {
                        sink.append(&format!("{}-{:05}-payload", tag, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let lines = sink.lines();
        assert_eq!(lines.len(), per_producer * 2);
        assert!(lines.iter().all(|l| l.ends_with("-payload") && l.len() == 17));

        // per-stream order survives interleaving
        for tag in ["out", "err"] {
            let ours: Vec<_> = lines.iter().filter(|l| l.starts_with(tag)).collect();
            assert_eq!(ours.len(), per_producer);
            assert!(ours.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn entries_carry_severity() {
        let sink = LogSink::new(10);
        sink.append("[Server thread/WARN]: Can't keep up!");
        assert_eq!(sink.recent(1)[0].severity, LogSeverity::Warning);
    }
}
