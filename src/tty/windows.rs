//! Windows specific definitions

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use log::debug;
use windows_sys::Win32::Foundation::{BOOL, FALSE, HANDLE, INVALID_HANDLE_VALUE, TRUE};
use windows_sys::Win32::System::Console::{
    GetConsoleMode, GetConsoleScreenBufferInfo, GetStdHandle, ReadConsoleInputW, SetConsoleCP,
    SetConsoleCtrlHandler, SetConsoleMode, SetConsoleOutputCP, CONSOLE_MODE,
    CONSOLE_SCREEN_BUFFER_INFO, ENABLE_ECHO_INPUT, ENABLE_LINE_INPUT, ENABLE_PROCESSED_INPUT,
    ENABLE_VIRTUAL_TERMINAL_INPUT, ENABLE_VIRTUAL_TERMINAL_PROCESSING, INPUT_RECORD, KEY_EVENT,
    KEY_EVENT_RECORD, LEFT_ALT_PRESSED, LEFT_CTRL_PRESSED, RIGHT_ALT_PRESSED, RIGHT_CTRL_PRESSED,
    SHIFT_PRESSED, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE, WINDOW_BUFFER_SIZE_EVENT,
};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    VK_BACK, VK_DELETE, VK_DOWN, VK_END, VK_HOME, VK_LEFT, VK_NEXT, VK_PRIOR, VK_RETURN, VK_RIGHT,
    VK_UP,
};

use super::ByteRead;
use crate::error::Result;

const CP_UTF8: u32 = 65001;

fn conin() -> HANDLE {
    unsafe { GetStdHandle(STD_INPUT_HANDLE) }
}

fn conout() -> HANDLE {
    unsafe { GetStdHandle(STD_OUTPUT_HANDLE) }
}

fn console_mode(handle: HANDLE) -> Option<CONSOLE_MODE> {
    let mut mode: CONSOLE_MODE = 0;
    if handle == INVALID_HANDLE_VALUE || unsafe { GetConsoleMode(handle, &mut mode) } == FALSE {
        None
    } else {
        Some(mode)
    }
}

/// Check whether stdin and stdout are both consoles.
pub fn is_tty() -> bool {
    console_mode(conin()).is_some() && console_mode(conout()).is_some()
}

/// The Windows console always understands our escape sequences once virtual
/// terminal processing is on.
pub fn is_supported() -> bool {
    true
}

/// Current console width in columns, if it can be queried.
pub fn terminal_width() -> Option<usize> {
    let mut info: CONSOLE_SCREEN_BUFFER_INFO = unsafe { std::mem::zeroed() };
    if unsafe { GetConsoleScreenBufferInfo(conout(), &mut info) } == FALSE {
        return None;
    }
    Some((info.srWindow.Right - info.srWindow.Left + 1) as usize)
}

/// Put both console code pages into UTF-8.
pub fn set_utf8() {
    unsafe {
        SetConsoleCP(CP_UTF8);
        SetConsoleOutputCP(CP_UTF8);
    }
}

/// Write `buf` to stdout and flush.
pub fn write_and_flush(buf: &[u8]) -> Result<()> {
    let mut out = io::stdout();
    out.write_all(buf)?;
    out.flush()?;
    Ok(())
}

static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);

pub fn take_resize_pending() -> bool {
    RESIZE_PENDING.swap(false, Ordering::SeqCst)
}

// -- crash-safe console restoration -----------------------------------------

static SAVED_MODES_SET: AtomicBool = AtomicBool::new(false);
static SAVED_CONIN_MODE: AtomicU32 = AtomicU32::new(0);
static SAVED_CONOUT_MODE: AtomicU32 = AtomicU32::new(0);
static INSTALL_COUNT: AtomicUsize = AtomicUsize::new(0);

extern "system" fn console_ctrl_handler(_ctrl_type: u32) -> BOOL {
    if SAVED_MODES_SET.load(Ordering::Acquire) {
        unsafe {
            SetConsoleMode(conin(), SAVED_CONIN_MODE.load(Ordering::Acquire));
            SetConsoleMode(conout(), SAVED_CONOUT_MODE.load(Ordering::Acquire));
        }
    }
    FALSE // allow default behavior
}

fn install_emergency_handlers() {
    if INSTALL_COUNT.fetch_add(1, Ordering::SeqCst) > 0 {
        return;
    }
    unsafe {
        SetConsoleCtrlHandler(Some(console_ctrl_handler), TRUE);
    }
}

fn restore_emergency_handlers() {
    let count = INSTALL_COUNT.load(Ordering::SeqCst);
    if count == 0 || INSTALL_COUNT.fetch_sub(1, Ordering::SeqCst) > 1 {
        return;
    }
    unsafe {
        SetConsoleCtrlHandler(Some(console_ctrl_handler), FALSE);
    }
}

// -- raw mode ----------------------------------------------------------------

/// Saved console state, returned by [`enable_raw_mode`].
pub struct RawMode {
    conin_mode: CONSOLE_MODE,
    conout_mode: CONSOLE_MODE,
}

/// Enable RAW mode for the console: no cooked line input, no echo, no
/// Ctrl-C processing, virtual terminal sequences both ways.
pub fn enable_raw_mode() -> Result<RawMode> {
    let last_err = || crate::error::Error::Io(io::Error::last_os_error());

    let conin_mode = console_mode(conin()).ok_or_else(last_err)?;
    let raw_in = (conin_mode & !(ENABLE_LINE_INPUT | ENABLE_ECHO_INPUT | ENABLE_PROCESSED_INPUT))
        | ENABLE_VIRTUAL_TERMINAL_INPUT;
    if unsafe { SetConsoleMode(conin(), raw_in) } == FALSE {
        return Err(last_err());
    }

    let conout_mode = console_mode(conout()).ok_or_else(last_err)?;
    let raw_out = conout_mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING;
    if unsafe { SetConsoleMode(conout(), raw_out) } == FALSE {
        return Err(last_err());
    }

    if !SAVED_MODES_SET.load(Ordering::Acquire) {
        SAVED_CONIN_MODE.store(conin_mode, Ordering::Release);
        SAVED_CONOUT_MODE.store(conout_mode, Ordering::Release);
        SAVED_MODES_SET.store(true, Ordering::Release);
    }
    install_emergency_handlers();
    debug!(target: "rawline", "raw mode enabled");
    Ok(RawMode {
        conin_mode,
        conout_mode,
    })
}

impl RawMode {
    /// Disable RAW mode for the console.
    pub fn disable_raw_mode(&self) -> Result<()> {
        unsafe {
            SetConsoleMode(conin(), self.conin_mode);
            SetConsoleMode(conout(), self.conout_mode);
        }
        write_and_flush(b"\r")?;
        restore_emergency_handlers();
        debug!(target: "rawline", "raw mode disabled");
        Ok(())
    }
}

// -- input translation -------------------------------------------------------

/// Console input reader: translates key events into the same POSIX-style
/// byte stream the Unix reader produces, so the decoder stays
/// single-platform.
pub struct ConsoleReader {
    buf: [u8; 16],
    len: usize,
    pos: usize,
}

pub fn stdin_reader() -> ConsoleReader {
    ConsoleReader {
        buf: [0; 16],
        len: 0,
        pos: 0,
    }
}

/// Virtual key codes with fixed escape-sequence translations.
static VK_TABLE: [(u16, &[u8]); 10] = [
    (VK_BACK, b"\x08"),
    (VK_DELETE, b"\x7f"),
    (VK_UP, b"\x1b[A"),
    (VK_DOWN, b"\x1b[B"),
    (VK_RIGHT, b"\x1b[C"),
    (VK_LEFT, b"\x1b[D"),
    (VK_HOME, b"\x1b[H"),
    (VK_END, b"\x1b[F"),
    (VK_PRIOR, b"\x1b[5~"), // Page Up
    (VK_NEXT, b"\x1b[6~"),  // Page Down
];

fn read_key_event() -> Option<KEY_EVENT_RECORD> {
    let mut rec: INPUT_RECORD = unsafe { std::mem::zeroed() };
    let mut count = 0;
    loop {
        if unsafe { ReadConsoleInputW(conin(), &mut rec, 1, &mut count) } == FALSE || count == 0 {
            return None;
        }
        if u32::from(rec.EventType) == WINDOW_BUFFER_SIZE_EVENT as u32 {
            RESIZE_PENDING.store(true, Ordering::SeqCst);
            continue;
        }
        if u32::from(rec.EventType) == KEY_EVENT as u32 {
            let key = unsafe { rec.Event.KeyEvent };
            if key.bKeyDown != FALSE {
                return Some(key);
            }
        }
    }
}

fn push_utf8(out: &mut [u8; 16], len: &mut usize, c: char) {
    let mut buf = [0u8; 4];
    for &b in c.encode_utf8(&mut buf).as_bytes() {
        out[*len] = b;
        *len += 1;
    }
}

/// Translate one key event into POSIX bytes; returns the number written.
fn translate_key_event(key: &KEY_EVENT_RECORD, out: &mut [u8; 16]) -> usize {
    let vk = key.wVirtualKeyCode;
    let wc = unsafe { key.uChar.UnicodeChar };
    let mods = key.dwControlKeyState;
    let mut len = 0;

    // Return: CR commits, LF (Ctrl held) asks for a newline
    if vk == VK_RETURN {
        out[0] = if mods & (LEFT_CTRL_PRESSED | RIGHT_CTRL_PRESSED) != 0 {
            b'\n'
        } else {
            b'\r'
        };
        return 1;
    }

    // Shift-arrows select
    if mods & SHIFT_PRESSED != 0 && (vk == VK_LEFT || vk == VK_RIGHT) {
        let seq: &[u8] = if vk == VK_LEFT {
            b"\x1b[1;2D"
        } else {
            b"\x1b[1;2C"
        };
        out[..seq.len()].copy_from_slice(seq);
        return seq.len();
    }

    for &(code, seq) in &VK_TABLE {
        if code == vk {
            out[..seq.len()].copy_from_slice(seq);
            return seq.len();
        }
    }

    // Ctrl + letter
    if mods & (LEFT_CTRL_PRESSED | RIGHT_CTRL_PRESSED) != 0 && (0x41..=0x5A).contains(&vk) {
        out[0] = (vk - 0x40) as u8;
        return 1;
    }

    // Alt prefixes the character with ESC
    if mods & (LEFT_ALT_PRESSED | RIGHT_ALT_PRESSED) != 0 {
        out[len] = 0x1b;
        len += 1;
    }

    if wc != 0 {
        if (0xD800..=0xDBFF).contains(&wc) {
            // high surrogate; need the next key event for the low half
            let Some(next) = read_key_event() else {
                return 0;
            };
            let wc2 = unsafe { next.uChar.UnicodeChar };
            if (0xDC00..=0xDFFF).contains(&wc2) {
                if let Some(c) = char::decode_utf16([wc, wc2]).next().and_then(|r| r.ok()) {
                    push_utf8(out, &mut len, c);
                }
            }
        } else if let Some(c) = char::decode_utf16([wc]).next().and_then(|r| r.ok()) {
            push_utf8(out, &mut len, c);
        }
    }

    len
}

impl ByteRead for ConsoleReader {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        if self.pos < self.len {
            let b = self.buf[self.pos];
            self.pos += 1;
            return Ok(Some(b));
        }
        loop {
            let Some(key) = read_key_event() else {
                return Ok(None);
            };
            self.len = translate_key_event(&key, &mut self.buf);
            self.pos = 0;
            if self.len > 0 {
                self.pos = 1;
                return Ok(Some(self.buf[0]));
            }
        }
    }
}
