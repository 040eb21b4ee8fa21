//! Unix specific definitions
use std::cell::UnsafeCell;
use std::io::{self, Write};
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Once;

use log::debug;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::termios::{self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices, Termios};

use super::ByteRead;
use crate::error::Result;

/// Check whether stdin and stdout are both connected to a terminal.
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 && libc::isatty(libc::STDOUT_FILENO) != 0 }
}

/// Check if the current terminal can provide a rich line-editing interface.
pub fn is_supported() -> bool {
    !super::is_unsupported_term()
}

nix::ioctl_read_bad!(win_size, libc::TIOCGWINSZ, libc::winsize);

/// Current terminal width in columns, if it can be queried.
pub fn terminal_width() -> Option<usize> {
    let mut size: libc::winsize = unsafe { std::mem::zeroed() };
    match unsafe { win_size(libc::STDOUT_FILENO, &mut size) } {
        Ok(0) if size.ws_col > 0 => Some(size.ws_col as usize),
        _ => None,
    }
}

/// Switch the console to UTF-8. Nothing to do here; Unix terminals speak
/// UTF-8 already.
pub fn set_utf8() {}

/// Write `buf` to stdout and flush.
pub fn write_and_flush(buf: &[u8]) -> Result<()> {
    let mut out = io::stdout();
    out.write_all(buf)?;
    out.flush()?;
    Ok(())
}

/// Sticky window-resize flag, set from the SIGWINCH handler and consumed by
/// the input loop.
static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);

pub fn take_resize_pending() -> bool {
    RESIZE_PENDING.swap(false, Ordering::SeqCst)
}

// Rust std::io::Stdin is buffered with no way to know if bytes are
// available. So we use low-level stuff instead...
pub struct StdinReader {
    buf: [u8; 1],
}

pub fn stdin_reader() -> StdinReader {
    StdinReader { buf: [0; 1] }
}

impl ByteRead for StdinReader {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        loop {
            let res = unsafe {
                libc::read(
                    libc::STDIN_FILENO,
                    self.buf.as_mut_ptr() as *mut libc::c_void,
                    1,
                )
            };
            if res == -1 {
                let error = io::Error::last_os_error();
                if error.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(error.into());
            }
            if res == 0 {
                return Ok(None); // EOF
            }
            return Ok(Some(self.buf[0]));
        }
    }
}

// -- crash-safe terminal restoration ---------------------------------------

/// Process-wide copy of the pre-raw terminal state, written once on the
/// first raw-mode entry so the signal handlers can restore the terminal
/// without reaching into any editor.
struct TermSlot(UnsafeCell<MaybeUninit<libc::termios>>);
unsafe impl Sync for TermSlot {}

static SAVED_TERMSTATE: TermSlot = TermSlot(UnsafeCell::new(MaybeUninit::uninit()));
static TERMSTATE_SET: AtomicBool = AtomicBool::new(false);

fn emergency_restore() {
    if TERMSTATE_SET.load(Ordering::Acquire) {
        unsafe {
            libc::tcsetattr(
                libc::STDIN_FILENO,
                libc::TCSAFLUSH,
                (*SAVED_TERMSTATE.0.get()).as_ptr(),
            );
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum HandlerKind {
    /// Record the resize and keep going.
    Winch,
    /// Restore the terminal; a chained handler that returns keeps us alive.
    Graceful,
    /// Restore the terminal and die re-raising the signal.
    Crash,
}

static SIGNALS: [(Signal, HandlerKind); 8] = [
    (Signal::SIGWINCH, HandlerKind::Winch),
    (Signal::SIGTERM, HandlerKind::Graceful),
    (Signal::SIGQUIT, HandlerKind::Graceful),
    (Signal::SIGHUP, HandlerKind::Graceful),
    (Signal::SIGSEGV, HandlerKind::Crash),
    (Signal::SIGABRT, HandlerKind::Crash),
    (Signal::SIGBUS, HandlerKind::Crash),
    (Signal::SIGFPE, HandlerKind::Crash),
];

/// Saved previous disposition per entry in `SIGNALS`; written while
/// installing (single-threaded), read from handlers.
struct PrevSlot(UnsafeCell<Option<SigAction>>);
unsafe impl Sync for PrevSlot {}

static PREVIOUS: [PrevSlot; 8] = [const { PrevSlot(UnsafeCell::new(None)) }; 8];

static INSTALL_COUNT: AtomicUsize = AtomicUsize::new(0);
static ATEXIT_ONCE: Once = Once::new();

fn signal_index(sig: libc::c_int) -> Option<usize> {
    SIGNALS.iter().position(|&(s, _)| s as libc::c_int == sig)
}

/// Invoke the previously installed handler, if there was a real one.
fn call_previous(
    sig: libc::c_int,
    info: *mut libc::siginfo_t,
    ucontext: *mut libc::c_void,
) -> bool {
    let Some(i) = signal_index(sig) else {
        return false;
    };
    let Some(previous) = (unsafe { *PREVIOUS[i].0.get() }) else {
        return false;
    };
    match previous.handler() {
        SigHandler::SigDfl | SigHandler::SigIgn => false,
        SigHandler::Handler(f) => {
            f(sig);
            true
        }
        SigHandler::SigAction(f) => {
            f(sig, info, ucontext);
            true
        }
    }
}

/// Put back the saved disposition (or the default) before re-raising.
fn restore_disposition(sig: libc::c_int) {
    let previous = signal_index(sig).and_then(|i| unsafe { *PREVIOUS[i].0.get() });
    let action = match previous {
        Some(prev) if !matches!(prev.handler(), SigHandler::SigIgn) => prev,
        _ => SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty()),
    };
    if let Ok(signal) = Signal::try_from(sig) {
        let _ = unsafe { signal::sigaction(signal, &action) };
    }
}

extern "C" fn winch_handler(
    sig: libc::c_int,
    info: *mut libc::siginfo_t,
    ucontext: *mut libc::c_void,
) {
    RESIZE_PENDING.store(true, Ordering::SeqCst);
    call_previous(sig, info, ucontext);
}

extern "C" fn graceful_handler(
    sig: libc::c_int,
    info: *mut libc::siginfo_t,
    ucontext: *mut libc::c_void,
) {
    emergency_restore();
    // If the previous handler was called and returned, we return too
    if call_previous(sig, info, ucontext) {
        return;
    }
    restore_disposition(sig);
    unsafe {
        libc::kill(libc::getpid(), sig);
        libc::_exit(128 + sig);
    }
}

extern "C" fn crash_handler(
    sig: libc::c_int,
    info: *mut libc::siginfo_t,
    ucontext: *mut libc::c_void,
) {
    let _ = (info, ucontext);
    emergency_restore();
    restore_disposition(sig);
    unsafe {
        libc::kill(libc::getpid(), sig);
        libc::_exit(128 + sig);
    }
}

extern "C" fn atexit_restore() {
    emergency_restore();
}

extern "C" {
    fn atexit(cb: extern "C" fn()) -> libc::c_int;
}

/// Register emergency exit and signal handlers; nested raw-mode sessions
/// share one installation.
fn install_emergency_handlers() {
    if INSTALL_COUNT.fetch_add(1, Ordering::SeqCst) > 0 {
        return;
    }
    ATEXIT_ONCE.call_once(|| unsafe {
        atexit(atexit_restore);
    });
    for (i, &(sig, kind)) in SIGNALS.iter().enumerate() {
        let handler = match kind {
            HandlerKind::Winch => winch_handler,
            HandlerKind::Graceful => graceful_handler,
            HandlerKind::Crash => crash_handler,
        };
        let mut flags = SaFlags::SA_SIGINFO;
        if kind == HandlerKind::Winch {
            flags |= SaFlags::SA_RESTART;
        }
        let action = SigAction::new(SigHandler::SigAction(handler), flags, SigSet::empty());
        match unsafe { signal::sigaction(sig, &action) } {
            Ok(previous) => {
                if matches!(previous.handler(), SigHandler::SigIgn) {
                    // leave ignored signals ignored
                    let _ = unsafe { signal::sigaction(sig, &previous) };
                    unsafe { *PREVIOUS[i].0.get() = None };
                } else {
                    unsafe { *PREVIOUS[i].0.get() = Some(previous) };
                }
            }
            Err(e) => {
                debug!(target: "rawline", "cannot install handler for {sig:?}: {e}");
                unsafe { *PREVIOUS[i].0.get() = None };
            }
        }
    }
}

/// Restore handlers previously installed, on the last raw-mode exit.
fn restore_emergency_handlers() {
    let count = INSTALL_COUNT.load(Ordering::SeqCst);
    if count == 0 {
        return;
    }
    if INSTALL_COUNT.fetch_sub(1, Ordering::SeqCst) > 1 {
        return;
    }
    for (i, &(sig, _)) in SIGNALS.iter().enumerate() {
        if let Some(previous) = unsafe { (*PREVIOUS[i].0.get()).take() } {
            let _ = unsafe { signal::sigaction(sig, &previous) };
        }
    }
}

// -- raw mode ---------------------------------------------------------------

/// Saved terminal state, returned by [`enable_raw_mode`].
pub struct RawMode {
    termios: Termios,
}

/// Enable RAW mode for the terminal.
pub fn enable_raw_mode() -> Result<RawMode> {
    let original_mode = termios::tcgetattr(io::stdin())?;
    let mut raw = original_mode.clone();
    // disable BREAK interrupt, CR to NL conversion on input,
    // input parity check, strip high bit (bit 8), output flow control
    raw.input_flags &= !(InputFlags::BRKINT
        | InputFlags::ICRNL
        | InputFlags::INPCK
        | InputFlags::ISTRIP
        | InputFlags::IXON);
    // disable all output processing
    raw.output_flags &= !OutputFlags::OPOST;
    // character-size mark (8 bits)
    raw.control_flags |= ControlFlags::CS8;
    // disable echoing, canonical mode, extended input processing and signals
    raw.local_flags &=
        !(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::IEXTEN | LocalFlags::ISIG);
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1; // One character-at-a-time input
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0; // with blocking read
    termios::tcsetattr(io::stdin(), SetArg::TCSAFLUSH, &raw)?;

    if !TERMSTATE_SET.load(Ordering::Acquire) {
        let saved: libc::termios = original_mode.clone().into();
        unsafe { (*SAVED_TERMSTATE.0.get()).write(saved) };
        TERMSTATE_SET.store(true, Ordering::Release);
    }
    install_emergency_handlers();
    debug!(target: "rawline", "raw mode enabled");
    Ok(RawMode {
        termios: original_mode,
    })
}

impl RawMode {
    /// Disable RAW mode for the terminal.
    pub fn disable_raw_mode(&self) -> Result<()> {
        termios::tcsetattr(io::stdin(), SetArg::TCSAFLUSH, &self.termios)?;
        // a carriage return puts us back on the left hand side
        write_and_flush(b"\r")?;
        restore_emergency_handlers();
        debug!(target: "rawline", "raw mode disabled");
        Ok(())
    }
}
