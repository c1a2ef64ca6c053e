// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::debug;

const KEY_POLL: Duration = Duration::from_millis(50);

/// Source of out-of-band interrupt requests while a node command runs.
///
/// The shell arms the source before it starts polling a node and disarms it
/// once the command is done, so line input and interrupt detection never
/// compete for the terminal.
pub trait InterruptSource {
    fn arm(&mut self);

    /// Returns `true` once per interrupt request.
    fn interrupted(&mut self) -> bool;

    fn disarm(&mut self);
}

/// Watches the keyboard in raw mode on a background thread.
///
/// Raw mode turns Ctrl+C into a plain key event, which is forwarded through a
/// channel instead of killing the process.
pub struct InputHandle {
    rx: mpsc::Receiver<()>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl InputHandle {
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let worker = thread::spawn(move || {
            if let Err(e) = enable_raw_mode() {
                debug!("Keyboard watcher disabled: {e}");
                return;
            }
            while !stop_flag.load(Ordering::Relaxed) {
                match event::poll(KEY_POLL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(_) => break,
                }
                if let Ok(Event::Key(key_event)) = event::read() {
                    let is_ctrl_c = key_event.code == KeyCode::Char('c')
                        && key_event.modifiers.contains(KeyModifiers::CONTROL);

                    if is_ctrl_c
                        && key_event.kind == KeyEventKind::Press
                        && tx.send(()).is_err()
                    {
                        break;
                    }
                }
            }
            let _ = disable_raw_mode();
        });

        Self {
            rx,
            stop,
            worker: Some(worker),
        }
    }

    pub fn should_interrupt(&self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        let _ = disable_raw_mode();
    }
}

/// Interrupts typed as Ctrl+C on the controlling terminal.
#[derive(Default)]
pub struct KeyboardInterrupts {
    handle: Option<InputHandle>,
}

impl InterruptSource for KeyboardInterrupts {
    fn arm(&mut self) {
        if self.handle.is_none() {
            self.handle = Some(InputHandle::start());
        }
    }

    fn interrupted(&mut self) -> bool {
        self.handle.as_ref().is_some_and(InputHandle::should_interrupt)
    }

    fn disarm(&mut self) {
        self.handle = None;
    }
}

/// For non-interactive input (pipes, scripts): never interrupts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInterrupts;

impl InterruptSource for NoInterrupts {
    fn arm(&mut self) {}

    fn interrupted(&mut self) -> bool {
        false
    }

    fn disarm(&mut self) {}
}
