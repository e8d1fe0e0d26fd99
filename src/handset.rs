//! Handset events read line by line from stdin or a file.
//!
//! Each non-blank line names one event: `up` when the handset is lifted,
//! `down` when it is replaced, `quit` to shut the recorder down. Reaching the
//! end of the input counts as `quit`.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandsetEvent {
    Lifted,
    Replaced,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown handset event '{0}' (expected up, down or quit)")]
pub struct UnknownEvent(pub String);

/// Parse one input line. Blank lines yield `None`.
pub fn parse_event(line: &str) -> Result<Option<HandsetEvent>, UnknownEvent> {
    let word = line.trim();
    if word.is_empty() {
        return Ok(None);
    }
    let event = match word.to_ascii_lowercase().as_str() {
        "up" | "lift" | "lifted" | "u" => HandsetEvent::Lifted,
        "down" | "hangup" | "replaced" | "d" => HandsetEvent::Replaced,
        "quit" | "exit" | "q" => HandsetEvent::Quit,
        _ => return Err(UnknownEvent(word.to_string())),
    };
    Ok(Some(event))
}

/// Open `path` for reading, or stdin when no path is given.
pub fn open_event_source(path: Option<&Path>) -> Result<Box<dyn BufRead + Send>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open event file {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Read events on a `Handset` thread and forward them over a bounded channel.
///
/// The thread sends `Quit` when the input ends or fails, then exits. It also
/// exits early once the receiver is dropped.
pub fn spawn_event_reader(
    reader: Box<dyn BufRead + Send>,
    capacity: usize,
) -> io::Result<(Receiver<HandsetEvent>, JoinHandle<()>)> {
    let (tx, rx) = bounded(capacity.max(1));
    let handle = thread::Builder::new()
        .name("Handset".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(error = %err, "failed to read handset events");
                        break;
                    }
                };
                match parse_event(&line) {
                    Ok(Some(event)) => {
                        debug!(?event, "handset event");
                        if tx.send(event).is_err() {
                            return;
                        }
                        if event == HandsetEvent::Quit {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!("{err}"),
                }
            }
            info!("handset input closed");
            let _ = tx.send(HandsetEvent::Quit);
        })?;
    Ok((rx, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn events_from(input: &str) -> Vec<HandsetEvent> {
        events_from_reader(Box::new(Cursor::new(input.to_string())))
    }

    fn events_from_reader(reader: Box<dyn BufRead + Send>) -> Vec<HandsetEvent> {
        let (rx, handle) = spawn_event_reader(reader, 4).unwrap();
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
            events.push(event);
        }
        handle.join().unwrap();
        events
    }

    #[test]
    fn parses_event_aliases() {
        for word in ["up", "lift", "lifted", "u", " UP \n"] {
            assert_eq!(parse_event(word), Ok(Some(HandsetEvent::Lifted)), "{word:?}");
        }
        for word in ["down", "hangup", "replaced", "d", "Down"] {
            assert_eq!(parse_event(word), Ok(Some(HandsetEvent::Replaced)), "{word:?}");
        }
        for word in ["quit", "exit", "q"] {
            assert_eq!(parse_event(word), Ok(Some(HandsetEvent::Quit)), "{word:?}");
        }
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_event(""), Ok(None));
        assert_eq!(parse_event("   \t"), Ok(None));
    }

    #[test]
    fn unknown_words_are_rejected() {
        let err = parse_event("ring").unwrap_err();
        assert_eq!(err, UnknownEvent("ring".to_string()));
        assert!(err.to_string().contains("ring"));
    }

    #[test]
    fn reader_forwards_events_and_quits_at_eof() {
        assert_eq!(
            events_from("up\n\nbogus\ndown\n"),
            vec![
                HandsetEvent::Lifted,
                HandsetEvent::Replaced,
                HandsetEvent::Quit
            ]
        );
    }

    #[test]
    fn reader_stops_after_quit() {
        assert_eq!(
            events_from("up\nquit\ndown\n"),
            vec![HandsetEvent::Lifted, HandsetEvent::Quit]
        );
    }

    #[test]
    fn missing_event_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.txt");
        let err = open_event_source(Some(path.as_path())).err().unwrap();
        assert!(err.to_string().contains("failed to open event file"));
    }

    #[test]
    fn event_file_is_read_line_by_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.txt");
        std::fs::write(&path, "lift\nhangup\n").unwrap();
        let reader = open_event_source(Some(path.as_path())).unwrap();
        assert_eq!(
            events_from_reader(reader),
            vec![
                HandsetEvent::Lifted,
                HandsetEvent::Replaced,
                HandsetEvent::Quit
            ]
        );
    }
}
