use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::{Arc, Mutex},
};

use serde::Serialize;

use crate::{
    clock::ClockHandle,
    source::{Source, Subscription},
    Element, Recorded,
};

/// Writes observed events to a file in JSON Lines format.
///
/// Each delivered event is written as a JSON object on its own line, stamped
/// with the virtual time it occurred at, making the output easy to diff and
/// stream. Events are flushed immediately for reliability (not optimized for
/// high-throughput).
///
/// # Example
///
/// ```ignore
/// let trace = TraceWriter::create("run.jsonl")?;
/// h.retain(trace.attach(&output, h.clock_handle()));
/// ```
#[derive(Debug)]
pub struct TraceWriter {
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl TraceWriter {
    /// Create a trace writer that writes to the specified path.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(TraceWriter {
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    /// Subscribe to `source` and write every subsequent event as one JSON
    /// line. Keep the returned subscription alive for as long as tracing
    /// should continue.
    pub fn attach<T: Element + Serialize>(
        &self,
        source: &impl Source<T>,
        handle: ClockHandle,
    ) -> Subscription {
        let writer = Arc::clone(&self.writer);
        source.subscribe(Box::new(move |event| {
            let recorded = Recorded::new(handle.now(), event);
            let mut writer = writer.lock().expect("trace writer poisoned");
            if let Err(e) = serde_json::to_writer(&mut *writer, &recorded) {
                tracing::warn!("trace writer failed to serialize event: {}", e);
            }
            let _ = writer.write_all(b"\n");
            let _ = writer.flush();
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Sink, StreamEvent, Subject, VirtualClock};
    use std::io::Read;

    #[test]
    fn writes_one_json_line_per_event() {
        let path = std::env::temp_dir().join("metronome_trace_test.jsonl");
        let trace = TraceWriter::create(&path).expect("failed to create trace writer");

        let clock = VirtualClock::new();
        let subject = Subject::<String>::new();
        let sub = trace.attach(&subject, clock.handle());

        let feed = subject.clone();
        clock.schedule_at(100, move || feed.accept(StreamEvent::Next("hello".to_string())));
        let feed = subject.clone();
        clock.schedule_at(200, move || feed.accept(StreamEvent::Completed));
        clock
            .advance_until_quiescent(1_000, std::time::Duration::from_secs(1))
            .unwrap();
        sub.dispose();

        let mut file = File::open(&path).expect("failed to open trace file");
        let mut content = String::new();
        file.read_to_string(&mut content)
            .expect("failed to read trace file");

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"time\":100"));
        assert!(lines[0].contains("hello"));
        assert!(lines[1].contains("Completed"));

        let _ = std::fs::remove_file(&path);
    }
}
