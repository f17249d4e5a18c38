//! Cooperative cancellation of child processes.
//!
//! The binary raises an [`Interrupt`] from its signal handler; adapters that
//! spawn processes poll it, kill the child and return, so the run unwinds
//! normally and every scoped resource (checkouts, the target lock) is
//! released.

use std::io::{self, Read};
use std::process::{Child, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared "stop now" flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wait for `child`, collecting piped output.
///
/// Returns `Ok(None)` when the interrupt was raised first; the child has
/// then been killed and reaped. Its output readers are left detached, since
/// a grandchild may still hold the pipes open.
pub fn wait_with_output(mut child: Child, interrupt: &Interrupt) -> io::Result<Option<Output>> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if interrupt.is_raised() {
            debug!(pid = child.id(), "Interrupted, killing child process");
            // Already exited between the two checks is fine.
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Some(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    }))
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::time::Instant;

    #[test]
    fn clones_share_the_flag() {
        let interrupt = Interrupt::new();
        let observer = interrupt.clone();
        assert!(!observer.is_raised());
        interrupt.raise();
        assert!(observer.is_raised());
    }

    #[cfg(unix)]
    #[test]
    fn completed_child_output_is_collected() {
        let child = Command::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let output = wait_with_output(child, &Interrupt::new()).unwrap().unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, b"err\n");
    }

    #[cfg(unix)]
    #[test]
    fn raised_interrupt_kills_a_long_child() {
        let child = Command::new("sh")
            .args(["-c", "sleep 30"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let interrupt = Interrupt::new();
        let raiser = interrupt.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            raiser.raise();
        });

        let start = Instant::now();
        assert!(wait_with_output(child, &interrupt).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
