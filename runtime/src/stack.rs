use alloc::{sync::Arc, vec::Vec};

use ribose_core::Transducer;

use crate::value::Value;

// TRANSDUCER FRAME
// ================================================================================================

/// One transducer activation: the transducer, its resume state (premultiplied row offset), the
/// `count` countdown, and the field the next `paste` appends to.
pub struct TransducerFrame {
    pub transducer: Arc<Transducer>,
    pub state: usize,
    pub countdown: Option<(u64, u32)>,
    pub selected: usize,
    /// First slot this frame owns in the shared value pool.
    pub base: usize,
}

// TRANSDUCER STACK
// ================================================================================================

/// The stack of transducer activations plus the flat field-value pool.
///
/// Each frame owns a contiguous run of `field_count` slots; push allocates (and clears) the next
/// run, pop releases it. Slots are recycled across activations without shrinking.
pub struct TransducerStack {
    frames: Vec<TransducerFrame>,
    values: Vec<Value>,
    field_count: usize,
}

impl TransducerStack {
    pub fn new(field_count: usize) -> Self {
        Self {
            frames: Vec::new(),
            values: Vec::new(),
            field_count,
        }
    }

    pub fn push(&mut self, transducer: Arc<Transducer>) {
        let base = self.frames.len() * self.field_count;
        if self.values.len() < base + self.field_count {
            self.values.resize_with(base + self.field_count, Value::new);
        }
        for slot in &mut self.values[base..base + self.field_count] {
            slot.clear();
        }
        self.frames.push(TransducerFrame {
            transducer,
            state: 0,
            countdown: None,
            selected: 0,
            base,
        });
    }

    pub fn pop(&mut self) -> Option<TransducerFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&TransducerFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut TransducerFrame> {
        self.frames.last_mut()
    }

    pub fn frame_mut(&mut self, depth: usize) -> &mut TransducerFrame {
        &mut self.frames[depth]
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// The transducer names on the stack, bottom-up, for diagnostics.
    pub fn trace(&self) -> Vec<&str> {
        self.frames.iter().map(|frame| frame.transducer.name()).collect()
    }

    // FIELD ACCESS
    // --------------------------------------------------------------------------------------------

    /// The current frame's append target.
    #[inline(always)]
    pub fn selected_value_mut(&mut self) -> &mut Value {
        let frame = self.frames.last().expect("active frame");
        &mut self.values[frame.base + frame.selected]
    }

    /// One field slot of the current frame.
    pub fn field(&self, ordinal: usize) -> &Value {
        let frame = self.frames.last().expect("active frame");
        &self.values[frame.base + ordinal]
    }

    pub fn field_mut(&mut self, ordinal: usize) -> &mut Value {
        let frame = self.frames.last().expect("active frame");
        &mut self.values[frame.base + ordinal]
    }

    /// Clears every field slot of the current frame.
    pub fn clear_fields(&mut self) {
        let frame = self.frames.last().expect("active frame");
        let range = frame.base..frame.base + self.field_count;
        for slot in &mut self.values[range] {
            slot.clear();
        }
    }
}
