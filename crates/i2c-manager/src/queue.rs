use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::request::Request;

/// Intrusive FIFO of pending requests, linked through each request's `next`
/// field. Both ends are O(1).
pub(crate) struct RequestQueue<'a, M: RawMutex> {
    head: Option<&'a Request<'a, M>>,
    tail: Option<&'a Request<'a, M>>,
}

impl<'a, M: RawMutex> RequestQueue<'a, M> {
    pub(crate) const fn new() -> Self {
        Self { head: None, tail: None }
    }

    pub(crate) fn enqueue(&mut self, request: &'a Request<'a, M>) {
        request.set_next(None);
        match self.tail {
            Some(tail) => tail.set_next(Some(request)),
            None => self.head = Some(request),
        }
        self.tail = Some(request);
    }

    pub(crate) fn dequeue(&mut self) -> Option<&'a Request<'a, M>> {
        let head = self.head?;
        self.head = head.take_next();
        if self.head.is_none() {
            self.tail = None;
        }
        Some(head)
    }

    pub(crate) fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(request) = cursor {
            count += 1;
            cursor = request.next();
        }
        count
    }
}
