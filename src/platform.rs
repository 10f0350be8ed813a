use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::fmt;
use std::io;
use std::process;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

// Cross-platform signal handling
#[cfg(unix)]
use signal_hook::{consts::SIGINT, consts::SIGTERM, iterator::Signals};

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

use crate::logging::Logger;

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    Timeout = 124,    // same as timeout(1)
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Why a run stopped dispatching early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Timeout,
    Interrupted,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Timeout => f.write_str("timeout exceeded"),
            CancelReason::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// One-shot broadcast latch shared by the dispatcher, the deadline watchdog
/// and the signal handler.
///
/// Only the first `cancel` records a reason. Once fired, [`receiver`] is
/// permanently ready (disconnected), so it can sit in a `select!` next to a
/// blocking send.
///
/// [`receiver`]: CancelSignal::receiver
#[derive(Clone)]
pub struct CancelSignal {
    inner: Arc<CancelInner>,
}

struct CancelInner {
    reason: OnceLock<CancelReason>,
    trigger: Mutex<Option<Sender<()>>>,
    fired: Receiver<()>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (trigger, fired) = bounded(0);
        Self {
            inner: Arc::new(CancelInner {
                reason: OnceLock::new(),
                trigger: Mutex::new(Some(trigger)),
                fired,
            }),
        }
    }

    /// Fire the latch. Returns true only for the call that actually fired it.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        if self.inner.reason.set(reason).is_err() {
            return false;
        }
        let trigger = self
            .inner
            .trigger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(trigger);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.inner.reason.get().copied()
    }

    /// Never yields a message; becomes ready when the latch fires
    pub fn receiver(&self) -> &Receiver<()> {
        &self.inner.fired
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("reason", &self.reason())
            .finish()
    }
}

/// Wall-clock limit for a run. Fires the cancel latch unless disarmed first.
pub struct Deadline {
    disarm: Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl Deadline {
    pub fn arm(
        timeout: Duration,
        cancel: CancelSignal,
        logger: Arc<dyn Logger>,
    ) -> io::Result<Self> {
        let (disarm, disarmed) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("memload-deadline".to_string())
            .spawn(move || {
                select! {
                    recv(disarmed) -> _ => {}
                    recv(crossbeam_channel::after(timeout)) -> _ => {
                        if cancel.cancel(CancelReason::Timeout) {
                            logger.error(format_args!(
                                "Timeout of {} exceeded, no new files will be dispatched",
                                humantime::format_duration(timeout)
                            ));
                        }
                    }
                }
            })?;
        Ok(Self { disarm, handle })
    }

    pub fn disarm(self) {
        drop(self.disarm);
        let _ = self.handle.join();
    }
}

/// Signal handler for graceful shutdown
///
/// The first SIGINT/SIGTERM fires the cancel latch so dispatch stops while
/// in-flight files finish; a second one exits immediately.
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    /// Initialize signal handling - cross-platform
    pub fn new(cancel: CancelSignal, logger: Arc<dyn Logger>) -> io::Result<Self> {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGINT, SIGTERM])?;

            let handle = thread::Builder::new()
                .name("memload-signals".to_string())
                .spawn(move || {
                    for sig in signals.forever() {
                        let exit_code = if sig == SIGTERM {
                            ExitCode::SignalTerm
                        } else {
                            ExitCode::SignalInt
                        };
                        if cancel.cancel(CancelReason::Interrupted) {
                            logger.error(format_args!(
                                "Interrupted, waiting for in-flight files (signal again to exit now)"
                            ));
                        } else {
                            exit_code.exit();
                        }
                    }
                })?;

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            // Windows signal handling using flag-based approach
            let term_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
            flag::register(SIGINT, Arc::clone(&term_flag))?;

            let handle = thread::Builder::new()
                .name("memload-signals".to_string())
                .spawn(move || loop {
                    thread::sleep(Duration::from_millis(100));
                    if term_flag.swap(false, std::sync::atomic::Ordering::Relaxed) {
                        if cancel.cancel(CancelReason::Interrupted) {
                            logger.error(format_args!(
                                "Interrupted, waiting for in-flight files (signal again to exit now)"
                            ));
                        } else {
                            ExitCode::SignalInt.exit();
                        }
                    }
                })?;

            Ok(SignalHandler { _handle: handle })
        }
    }
}
