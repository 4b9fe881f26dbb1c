//! Per-socket outbound queue: `N_PRIORITY` FIFO lanes plus frame packing (§4.C).

use std::collections::VecDeque;

use crate::frame;

/// A priority-lane outbound queue for one socket.
///
/// `PRIORITIES` is the compile-time lane count (§6 `priority_count`); smaller
/// index means higher priority, matching the in-band priority byte of the
/// wire frame.
#[derive(Debug)]
pub struct WriterQueue<const PRIORITIES: usize> {
    lanes: [VecDeque<Vec<u8>>; PRIORITIES],
    current: Option<CurrentFrame>,
}

#[derive(Debug)]
struct CurrentFrame {
    bytes: Vec<u8>,
    sent: usize,
}

impl<const PRIORITIES: usize> WriterQueue<PRIORITIES> {
    pub fn new() -> Self {
        WriterQueue {
            lanes: std::array::from_fn(|_| VecDeque::new()),
            current: None,
        }
    }

    /// Total bytes currently queued across all lanes plus the in-flight frame.
    pub fn queued_len(&self) -> usize {
        let lanes: usize = self.lanes.iter().flatten().map(Vec::len).sum();
        let current = self.current.as_ref().map(|f| f.bytes.len() - f.sent).unwrap_or(0);
        lanes + current
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.lanes.iter().all(VecDeque::is_empty)
    }

    /// Append `bytes` to the chosen priority lane. Panics if `priority` is
    /// outside `0..PRIORITIES` — callers validate against `priority_count()`
    /// before enqueueing (§6 treats this as a compile-time bound).
    pub fn enqueue(&mut self, priority: u8, bytes: Vec<u8>) {
        assert!(!bytes.is_empty(), "writer queue never enqueues an empty item");
        self.lanes[priority as usize].push_back(bytes);
    }

    /// Return the current frame to send, packing a new one from the
    /// highest-priority non-empty lane if none is in flight. `max_frame_bytes`
    /// bounds the *total* frame size including header/footer; a lane item
    /// longer than that is fragmented across consecutive frames (§4.C).
    pub fn acquire_frame(&mut self, max_frame_bytes: usize) -> Option<&[u8]> {
        if self.current.is_none() {
            let max_body = max_frame_bytes.saturating_sub(frame::FRAME_OVERHEAD);
            for (priority, lane) in self.lanes.iter_mut().enumerate() {
                let Some(front) = lane.front_mut() else { continue };

                let take = front.len().min(max_body).max(1).min(front.len());
                let body: Vec<u8> = front.drain(..take).collect();
                if front.is_empty() {
                    lane.pop_front();
                }

                let packed = frame::pack(priority as u8, &body);
                self.current = Some(CurrentFrame { bytes: packed, sent: 0 });
                break;
            }
        }

        self.current.as_ref().map(|f| &f.bytes[f.sent..])
    }

    /// Record that `n` bytes of the current frame were transmitted. Never
    /// crosses a frame boundary: `n` is clamped to what remains of the
    /// current frame.
    pub fn shift(&mut self, n: usize) {
        if let Some(frame) = &mut self.current {
            frame.sent = (frame.sent + n).min(frame.bytes.len());
            if frame.sent == frame.bytes.len() {
                self.current = None;
            }
        }
    }

    pub const fn priority_count(&self) -> usize {
        PRIORITIES
    }
}

impl<const PRIORITIES: usize> Default for WriterQueue<PRIORITIES> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_lane_drains_first() {
        let mut q: WriterQueue<3> = WriterQueue::new();
        q.enqueue(2, b"low".to_vec());
        q.enqueue(0, b"high".to_vec());

        let frame = q.acquire_frame(1024).unwrap().to_vec();
        let parsed = frame::parse(&frame).unwrap().unwrap();
        assert_eq!(parsed.priority, 0);
        assert_eq!(parsed.body, b"high");
    }

    #[test]
    fn partial_send_resumes_without_crossing_frame_boundary() {
        let mut q: WriterQueue<3> = WriterQueue::new();
        q.enqueue(1, b"hello world".to_vec());

        let first = q.acquire_frame(1024).unwrap().to_vec();
        q.shift(3);
        let still_current = q.acquire_frame(1024).unwrap();
        assert_eq!(still_current, &first[3..]);
    }

    #[test]
    fn frame_completes_and_next_acquire_gets_new_frame() {
        let mut q: WriterQueue<3> = WriterQueue::new();
        q.enqueue(1, b"first".to_vec());
        q.enqueue(1, b"second".to_vec());

        let first = q.acquire_frame(1024).unwrap().len();
        q.shift(first);

        let second = q.acquire_frame(1024).unwrap().to_vec();
        let parsed = frame::parse(&second).unwrap().unwrap();
        assert_eq!(parsed.body, b"second");
    }

    #[test]
    fn oversized_item_fragments_across_frames_same_priority() {
        let mut q: WriterQueue<3> = WriterQueue::new();
        let item = vec![0x42; 100];
        q.enqueue(1, item.clone());

        let max_frame = frame::FRAME_OVERHEAD + 40;
        let first = q.acquire_frame(max_frame).unwrap().len();
        q.shift(first);

        let second = q.acquire_frame(max_frame).unwrap().to_vec();
        let parsed = frame::parse(&second).unwrap().unwrap();
        assert_eq!(parsed.priority, 1);
        assert!(parsed.body.len() <= 40);
    }

    #[test]
    fn empty_queue_yields_no_frame() {
        let mut q: WriterQueue<3> = WriterQueue::new();
        assert!(q.acquire_frame(1024).is_none());
        assert!(q.is_empty());
    }
}
