// Executor thread owning the composer and surface; redraws are coalesced

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{bounded, unbounded, Sender};
use parking_lot::Mutex;

use crate::core::display_context::DisplayContext;
use crate::error::{RenderError, RenderResult};

type Job = Box<dyn FnOnce(&mut DisplayContext) + Send>;

enum Message {
    Run(Job),
    Redraw,
    Shutdown,
}

pub struct DisplayThread {
    tx: Sender<Message>,
    redraw_pending: Arc<AtomicBool>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DisplayThread {
    pub fn spawn(mut context: DisplayContext) -> RenderResult<Self> {
        let (tx, rx) = unbounded::<Message>();
        let redraw_pending = Arc::new(AtomicBool::new(false));
        let pending = Arc::clone(&redraw_pending);

        let handle = thread::Builder::new()
            .name("display".into())
            .spawn(move || {
                log::debug!("display thread started");
                for message in rx {
                    match message {
                        Message::Run(job) => job(&mut context),
                        Message::Redraw => {
                            pending.store(false, Ordering::Release);
                            if let Err(err) = context.draw_frame() {
                                log::warn!("frame failed: {err}");
                            }
                        }
                        Message::Shutdown => break,
                    }
                }
                context.composer.release();
                log::debug!("display thread stopped");
            })
            .map_err(|_| RenderError::DisplayThreadGone)?;

        Ok(Self {
            tx,
            redraw_pending,
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Run `f` on the display thread and wait for its result.
    ///
    /// Must not be called from a display job; that would wait on itself.
    pub fn run<R, F>(&self, f: F) -> RenderResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut DisplayContext) -> R + Send + 'static,
    {
        debug_assert!(!self.is_display_thread(), "display job waiting on itself");
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(Message::Run(Box::new(move |ctx| {
                let _ = reply_tx.send(f(ctx));
            })))
            .map_err(|_| RenderError::DisplayThreadGone)?;
        reply_rx.recv().map_err(|_| RenderError::DisplayThreadGone)
    }

    /// Ask for one more frame; a no-op while a redraw is already queued
    pub fn request_redraw(&self) {
        if !self.redraw_pending.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(Message::Redraw);
        }
    }

    pub fn is_display_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Stop the loop after the jobs already queued and join the thread
    pub fn shutdown(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let _ = self.tx.send(Message::Shutdown);
        if handle.join().is_err() {
            log::error!("display thread panicked");
        }
    }
}

impl Drop for DisplayThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
