/// Fixed-capacity sample buffer with an explicit fill count. Until the
/// buffer is warm, readers see only the samples actually pushed; a slot
/// that was never written is never observable.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: Vec<f64>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Capacity is fixed for the buffer's lifetime and must be nonzero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer needs a nonzero capacity");
        Self {
            buf: vec![0.0; capacity],
            head: 0,
            len: 0,
        }
    }

    /// Appends a sample, overwriting the oldest once full.
    pub fn push(&mut self, value: f64) {
        self.buf[self.head] = value;
        self.head = (self.head + 1) % self.buf.len();
        if self.len < self.buf.len() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Whether a full window of samples has been collected.
    pub fn is_warm(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Samples in arrival order, oldest first, filled region only.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let cap = self.buf.len();
        let start = if self.len < cap { 0 } else { self.head };
        (0..self.len).map(move |i| self.buf[(start + i) % cap])
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
