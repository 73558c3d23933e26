// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    mem,
    sync::Arc,
    time::{Duration, Instant},
    vec::Vec,
};

use parking_lot::{Condvar, Mutex};

use super::{Error, Timing};
use crate::rtu::MAX_FRAME_LEN;

#[derive(Debug)]
enum Completed {
    Frame(Vec<u8>),
    Overflow,
}

/// Splits a timestamped byte stream into frames.
#[derive(Debug)]
pub struct Framer {
    timing: Timing,
    buf: Vec<u8>,
    last: Option<Instant>,
    overflow: bool,
    skip: usize,
    completed: Option<Completed>,
}

impl Framer {
    #[must_use]
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            buf: Vec::with_capacity(MAX_FRAME_LEN),
            last: None,
            overflow: false,
            skip: 0,
            completed: None,
        }
    }

    #[must_use]
    pub const fn timing(&self) -> Timing {
        self.timing
    }

    /// Add a byte received at `now`.
    pub fn push(&mut self, byte: u8, now: Instant) {
        if self.skip > 0 {
            self.skip -= 1;
            return;
        }
        if let Some(last) = self.last {
            let gap = now.saturating_duration_since(last);
            if gap >= self.timing.frame_timeout {
                self.finish();
            } else if gap > self.timing.char_timeout {
                log::trace!("Tolerating gap of {gap:?} within frame");
            }
        }
        self.last = Some(now);
        if self.overflow {
            return;
        }
        if self.buf.len() >= MAX_FRAME_LEN {
            log::warn!("Frame exceeds {MAX_FRAME_LEN} bytes");
            self.overflow = true;
            self.buf.clear();
            return;
        }
        self.buf.push(byte);
    }

    /// Take the first completed frame.
    ///
    /// The current frame is completed if the line has been silent for the
    /// frame timeout at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Result<Vec<u8>, Error>> {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) >= self.timing.frame_timeout {
                self.finish();
                self.last = None;
            }
        }
        self.completed.take().map(|completed| match completed {
            Completed::Frame(frame) => Ok(frame),
            Completed::Overflow => Err(Error::Overflow),
        })
    }

    /// The instant at which the current frame completes, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.last.map(|last| last + self.timing.frame_timeout)
    }

    /// Drop the next `count` received bytes.
    pub fn skip(&mut self, count: usize) {
        self.skip = count;
    }

    /// Discard all received bytes and frames.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.last = None;
        self.overflow = false;
        self.skip = 0;
        self.completed = None;
    }

    fn finish(&mut self) {
        let completed = if self.overflow {
            Completed::Overflow
        } else if self.buf.is_empty() {
            return;
        } else {
            Completed::Frame(mem::replace(&mut self.buf, Vec::with_capacity(MAX_FRAME_LEN)))
        };
        self.overflow = false;
        if self.completed.is_some() {
            log::debug!("Dropping frame received before the previous one was taken");
            return;
        }
        self.completed = Some(completed);
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) framer: Mutex<Framer>,
    pub(crate) ready: Condvar,
}

impl Shared {
    pub(crate) fn new(timing: Timing) -> Arc<Self> {
        Arc::new(Self {
            framer: Mutex::new(Framer::new(timing)),
            ready: Condvar::new(),
        })
    }

    /// Wait for a completed frame until `deadline`.
    pub(crate) fn wait_frame(&self, deadline: Instant) -> Result<Vec<u8>, Error> {
        let mut framer = self.framer.lock();
        loop {
            let now = Instant::now();
            if let Some(received) = framer.poll(now) {
                return received;
            }
            if now >= deadline {
                framer.clear();
                return Err(Error::Timeout);
            }
            let wake = framer.deadline().map_or(deadline, |at| at.min(deadline));
            // Wake up slightly after the frame deadline.
            self.ready.wait_until(&mut framer, wake + Duration::from_micros(50));
        }
    }
}

/// Receive side of a [`Link`](super::Link).
#[derive(Debug, Clone)]
pub struct RxHandle {
    shared: Arc<Shared>,
}

impl RxHandle {
    pub(crate) const fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Push a received byte.
    pub fn push(&self, byte: u8) {
        self.shared.framer.lock().push(byte, Instant::now());
        self.shared.ready.notify_one();
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        let mut framer = self.shared.framer.lock();
        for &byte in bytes {
            framer.push(byte, Instant::now());
        }
        drop(framer);
        self.shared.ready.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> Timing {
        Timing {
            char_time: Duration::from_millis(1),
            char_timeout: Duration::from_micros(1500),
            frame_timeout: Duration::from_micros(3500),
        }
    }

    fn feed(framer: &mut Framer, bytes: &[u8], start: Instant, step: Duration) -> Instant {
        let mut now = start;
        for &byte in bytes {
            framer.push(byte, now);
            now += step;
        }
        now - step
    }

    #[test]
    fn frame_completes_after_silence() {
        let mut framer = Framer::new(timing());
        let t0 = Instant::now();
        let last = feed(&mut framer, &[0x01, 0x03, 0x02], t0, Duration::from_millis(1));
        assert!(framer.poll(last + Duration::from_millis(3)).is_none());
        assert_eq!(framer.deadline(), Some(last + timing().frame_timeout));
        let frame = framer.poll(last + timing().frame_timeout).unwrap().unwrap();
        assert_eq!(frame, [0x01, 0x03, 0x02]);
        assert!(framer.poll(last + Duration::from_secs(1)).is_none());
        assert_eq!(framer.deadline(), None);
    }

    #[test]
    fn tolerate_gap_shorter_than_frame_timeout() {
        let mut framer = Framer::new(timing());
        let t0 = Instant::now();
        let last = feed(&mut framer, &[0x01, 0x02, 0x03], t0, Duration::from_millis(3));
        let frame = framer.poll(last + Duration::from_millis(4)).unwrap().unwrap();
        assert_eq!(frame, [0x01, 0x02, 0x03]);
    }

    #[test]
    fn keep_first_unclaimed_frame() {
        let mut framer = Framer::new(timing());
        let t0 = Instant::now();
        let last = feed(&mut framer, &[0xAA, 0xBB], t0, Duration::from_millis(1));
        let t1 = last + Duration::from_millis(10);
        let last = feed(&mut framer, &[0xCC], t1, Duration::from_millis(1));
        let t2 = last + Duration::from_millis(10);
        let last = feed(&mut framer, &[0xDD], t2, Duration::from_millis(1));
        let later = last + Duration::from_millis(10);
        assert_eq!(framer.poll(later).unwrap().unwrap(), [0xAA, 0xBB]);
        assert!(framer.poll(later).is_none());
    }

    #[test]
    fn new_frame_after_claimed_one() {
        let mut framer = Framer::new(timing());
        let t0 = Instant::now();
        let last = feed(&mut framer, &[0xAA], t0, Duration::from_millis(1));
        assert_eq!(framer.poll(last + Duration::from_millis(5)).unwrap().unwrap(), [0xAA]);
        let t1 = last + Duration::from_millis(6);
        let last = feed(&mut framer, &[0xBB, 0xCC], t1, Duration::from_millis(1));
        assert_eq!(framer.poll(last + Duration::from_millis(5)).unwrap().unwrap(), [0xBB, 0xCC]);
    }

    #[test]
    fn overflow() {
        let mut framer = Framer::new(timing());
        let t0 = Instant::now();
        let bytes = [0x55; MAX_FRAME_LEN + 1];
        let last = feed(&mut framer, &bytes, t0, Duration::from_micros(100));
        assert!(matches!(
            framer.poll(last + Duration::from_millis(5)),
            Some(Err(Error::Overflow))
        ));
        let t1 = last + Duration::from_millis(6);
        let last = feed(&mut framer, &[0x01], t1, Duration::from_millis(1));
        assert_eq!(framer.poll(last + Duration::from_millis(5)).unwrap().unwrap(), [0x01]);
    }

    #[test]
    fn max_frame_len_is_accepted() {
        let mut framer = Framer::new(timing());
        let bytes = [0x55; MAX_FRAME_LEN];
        let last = feed(&mut framer, &bytes, Instant::now(), Duration::from_micros(100));
        let frame = framer.poll(last + Duration::from_millis(5)).unwrap().unwrap();
        assert_eq!(frame.len(), MAX_FRAME_LEN);
    }

    #[test]
    fn skip_and_clear() {
        let mut framer = Framer::new(timing());
        let t0 = Instant::now();
        framer.skip(2);
        let last = feed(&mut framer, &[0x01, 0x02, 0x03], t0, Duration::from_millis(1));
        assert_eq!(framer.poll(last + Duration::from_millis(5)).unwrap().unwrap(), [0x03]);
        let last = feed(&mut framer, &[0x04], last + Duration::from_millis(6), Duration::from_millis(1));
        framer.clear();
        assert!(framer.poll(last + Duration::from_millis(5)).is_none());
    }

    #[test]
    fn wait_frame_times_out() {
        let shared = Shared::new(timing());
        let rx = RxHandle::new(Arc::clone(&shared));
        rx.push(0x01);
        let frame = shared.wait_frame(Instant::now() + Duration::from_millis(100)).unwrap();
        assert_eq!(frame, [0x01]);
        let result = shared.wait_frame(Instant::now() + Duration::from_millis(10));
        assert!(matches!(result, Err(Error::Timeout)));
    }
}
