use alloc::{
    boxed::Box,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use core::fmt::Write as _;

use ribose_core::{
    BUILT_IN_EFFECTORS, BuiltinParam, EFFECT_INPUT, EFFECT_NONE, EFFECT_PAUSE, EFFECT_SIGNAL,
    EFFECT_START, EFFECT_STOP, EFFECT_STOPPED, Effect, OutToken, SIGNAL_BASE, Signal, Token,
    action_effector, action_parameter, cell_action, cell_state, compile_builtin_parameter,
    effect_signal, effector, errors::ModelError, is_parametric, signal_of_effect,
};

use crate::{
    errors::{DomainError, EffectorError, RuntimeError, TargetBindingError},
    input::InputStack,
    metrics::Metrics,
    model::Model,
    output::Output,
    stack::TransducerStack,
    target::{HostEffector, HostTarget},
};

// STATUS
// ================================================================================================

/// The transductor's scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The transducer stack is empty.
    Stopped,
    /// A transducer is stacked but no input is available.
    Paused,
    /// Input and a transducer are both available.
    Runnable,
}

// MATCH MODE
// ================================================================================================

/// The active trap, if any. Product preserves its cursor across input-exhaustion suspensions.
#[derive(Clone, Copy)]
enum MatchMode {
    None,
    Sum { mask: [u64; 4] },
    Product { parameter: usize, cursor: usize },
    Scan { byte: u8 },
}

#[inline(always)]
fn mask_contains(mask: &[u64; 4], byte: u8) -> bool {
    mask[(byte >> 6) as usize] >> (byte & 63) & 1 == 1
}

// TRANSDUCTION STATE
// ================================================================================================

/// The mutable transduction state effectors operate on: the input and transducer stacks, field
/// values, the output sink, the active match mode, and metrics.
pub struct Transduction {
    pub(crate) input: InputStack,
    pub(crate) stack: TransducerStack,
    pub(crate) output: Box<dyn Output>,
    pub(crate) out_enabled: bool,
    mode: MatchMode,
    pub(crate) prologue: Option<u32>,
    pub(crate) error_input: i64,
    pub(crate) metrics: Metrics,
}

impl Transduction {
    /// Switches the append target of the current frame.
    pub fn select(&mut self, ordinal: u32) {
        if let Some(frame) = self.stack.top_mut() {
            frame.selected = ordinal as usize;
        }
    }

    /// The bytes of one field of the current frame.
    pub fn field(&self, ordinal: u32) -> &[u8] {
        self.stack.field(ordinal as usize).as_slice()
    }

    /// Appends bytes to the selected field.
    pub fn append(&mut self, bytes: &[u8]) {
        self.stack.selected_value_mut().extend(bytes);
    }

    /// Pushes bytes as a fresh input frame.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.push(bytes, bytes.len());
    }

    /// Writes to the output sink, honoring the out-enabled flag.
    pub fn write_output(&mut self, bytes: &[u8]) -> Result<(), EffectorError> {
        if self.out_enabled {
            self.output.write_all(bytes)?;
            self.metrics.bytes_written += bytes.len() as u64;
        }
        Ok(())
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

// TRANSDUCTOR
// ================================================================================================

const NIL_ACTION: i32 = 1;
const PASTE_ACTION: i32 = effector::PASTE as i32;

/// A single-threaded cooperative interpreter driving compiled transducers from a model against a
/// target.
pub struct Transductor<T: HostTarget> {
    model: Arc<Model>,
    target: T,
    host: Vec<Box<dyn HostEffector<T>>>,
    /// Typed built-in parameters, indexed by built-in ordinal then parameter index.
    builtin_params: Vec<Vec<BuiltinParam>>,
    tx: Transduction,
}

impl<T: HostTarget> Transductor<T> {
    /// Binds a loaded model to a target and an output sink.
    ///
    /// Binding verifies the model's target name and effector list against the target, compiles
    /// every effector parameter, and reads the `RIBOSE_OUT_ENABLED` gate.
    pub fn bind(
        model: Arc<Model>,
        target: T,
        output: Box<dyn Output>,
    ) -> Result<Self, TargetBindingError> {
        if model.target_name() != target.name() {
            return Err(ModelError::TargetMismatch {
                model: model.target_name().to_string(),
                target: target.name().to_string(),
            }
            .into());
        }

        // the model's effector namespace must match built-ins + host effectors, by ordinal
        let mut expected: Vec<String> =
            BUILT_IN_EFFECTORS.iter().map(|name| name.to_string()).collect();
        expected.extend(target.effector_names().iter().map(|name| name.to_string()));
        let declared: Vec<String> = model
            .maps()
            .effectors
            .iter()
            .map(|(_, name)| String::from_utf8_lossy(name).into_owned())
            .collect();
        if declared.len() != expected.len() {
            return Err(TargetBindingError::EffectorCount {
                model: declared.len(),
                target: target.name().to_string(),
                target_count: expected.len(),
            });
        }
        for (ordinal, (declared, expected)) in declared.iter().zip(&expected).enumerate() {
            if declared != expected {
                return Err(TargetBindingError::EffectorMismatch {
                    ordinal: ordinal as u32,
                    model: declared.clone(),
                    target: expected.clone(),
                });
            }
        }

        // pre-compile built-in parameters into their typed forms
        let mut builtin_params: Vec<Vec<BuiltinParam>> =
            (0..BUILT_IN_EFFECTORS.len()).map(|_| Vec::new()).collect();
        for (ordinal, raw_params) in
            model.parameters().iter().enumerate().take(BUILT_IN_EFFECTORS.len())
        {
            for raw in raw_params {
                let tokens: Vec<Token> = raw.iter().map(|bytes| Token::parse(bytes)).collect();
                let param = compile_builtin_parameter(ordinal as u32, &tokens, model.maps())
                    .map_err(|source| TargetBindingError::Parameter {
                        effector: BUILT_IN_EFFECTORS[ordinal].to_string(),
                        source,
                    })?;
                builtin_params[ordinal].push(param);
            }
        }

        // hand host effectors their parameters
        let mut host = target.effectors();
        for (index, host_effector) in host.iter_mut().enumerate() {
            let ordinal = BUILT_IN_EFFECTORS.len() + index;
            let raw_params = model.parameters().get(ordinal).map(Vec::as_slice).unwrap_or(&[]);
            host_effector.allocate_parameters(raw_params.len());
            for (parameter, raw) in raw_params.iter().enumerate() {
                let tokens: Vec<Token> = raw.iter().map(|bytes| Token::parse(bytes)).collect();
                host_effector.compile_parameter(parameter, &tokens).map_err(|source| {
                    TargetBindingError::HostParameter {
                        effector: host_effector.name().to_string(),
                        parameter,
                        source,
                    }
                })?;
            }
        }

        let field_count = model.field_count();
        Ok(Self {
            model,
            target,
            host,
            builtin_params,
            tx: Transduction {
                input: InputStack::new(),
                stack: TransducerStack::new(field_count),
                output,
                out_enabled: out_enabled_from_env(),
                mode: MatchMode::None,
                prologue: None,
                error_input: -1,
                metrics: Metrics::default(),
            },
        })
    }

    // PUBLIC CONTRACT
    // --------------------------------------------------------------------------------------------

    pub fn status(&self) -> Status {
        if self.tx.stack.is_empty() {
            Status::Stopped
        } else if self.tx.input.is_empty() && self.tx.prologue.is_none() {
            Status::Paused
        } else {
            Status::Runnable
        }
    }

    /// Pushes an input frame holding a copy of `bytes`, clipped to `limit`.
    pub fn push(&mut self, bytes: &[u8], limit: usize) {
        self.tx.input.push(bytes, limit);
    }

    /// Records a prologue signal consumed as the first token of the next `run`.
    pub fn signal(&mut self, signal: Signal) -> Result<(), EffectorError> {
        if !self.tx.input.is_empty() {
            return Err(EffectorError::PrologueWithInput);
        }
        self.tx.prologue = Some(signal.as_u32());
        Ok(())
    }

    /// Loads the named transducer (lazily) and pushes a fresh frame selecting the anonymous
    /// field.
    pub fn start(&mut self, name: &str) -> Result<(), RuntimeError> {
        let transducer = self.model.transducer_named(name)?;
        self.tx.stack.push(transducer);
        self.tx.error_input = -1;
        Ok(())
    }

    /// Clears both stacks, the match mode, and any pending prologue.
    pub fn stop(&mut self) {
        self.tx.stack.clear();
        self.tx.input.clear();
        self.tx.mode = MatchMode::None;
        self.tx.prologue = None;
        self.tx.error_input = -1;
    }

    /// Hands a reusable byte buffer back to the input stack's allocator.
    pub fn recycle(&mut self, buffer: Vec<u8>) {
        self.tx.input.recycle(buffer);
    }

    pub fn metrics(&self) -> Metrics {
        let mut metrics = self.tx.metrics;
        metrics.bytes_read = self.tx.input.bytes_read();
        metrics.bytes_allocated = self.tx.input.bytes_allocated();
        metrics
    }

    /// The bytes of one field of the current frame, for hosts and tests.
    pub fn field(&self, ordinal: u32) -> Option<&[u8]> {
        if self.tx.stack.is_empty() {
            None
        } else {
            Some(self.tx.stack.field(ordinal as usize).as_slice())
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Overrides the `RIBOSE_OUT_ENABLED` gate.
    pub fn set_output_enabled(&mut self, enabled: bool) {
        self.tx.out_enabled = enabled;
    }

    // MAIN LOOP
    // --------------------------------------------------------------------------------------------

    /// Runs the transduction until it pauses, stops, or fails.
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> Result<Status, RuntimeError> {
        if self.tx.stack.is_empty() {
            return Ok(self.status());
        }
        let mut signal: Option<u32> = None;

        'transducer: loop {
            let Some(frame) = self.tx.stack.top() else {
                return Ok(Status::Stopped);
            };
            let transducer = frame.transducer.clone();
            let mut state = frame.state;
            let filter = transducer.input_filter();
            let matrix = transducer.matrix();
            let pool = transducer.effector_vectors();

            loop {
                // 1. token fetch: raised signal, prologue, then the input stack
                let mut token = match signal.take().or_else(|| self.tx.prologue.take()) {
                    // an out-of-range signal (a host effector contract violation) lands on nul
                    Some(signal) if (signal as usize) < filter.len() => signal as usize,
                    Some(_) => Signal::NUL.ordinal(),
                    None => match self.tx.input.peek() {
                        Some(frame) => {
                            let byte = frame.data[frame.pos];
                            frame.pos += 1;
                            byte as usize
                        },
                        None => {
                            self.tx.stack.top_mut().expect("active frame").state = state;
                            return Ok(Status::Paused);
                        },
                    },
                };

                // 2. trap absorption
                if token < SIGNAL_BASE && !matches!(self.tx.mode, MatchMode::None) {
                    match self.tx.mode {
                        MatchMode::Sum { mask } => {
                            if mask_contains(&mask, token as u8) {
                                self.tx.metrics.sum.bytes += 1;
                                loop {
                                    let Some(frame) = self.tx.input.peek() else {
                                        self.tx.stack.top_mut().expect("active frame").state =
                                            state;
                                        return Ok(Status::Paused);
                                    };
                                    let data = &frame.data[frame.pos..frame.limit];
                                    let mut absorbed = 0;
                                    while absorbed < data.len()
                                        && mask_contains(&mask, data[absorbed])
                                    {
                                        absorbed += 1;
                                    }
                                    frame.pos += absorbed;
                                    self.tx.metrics.sum.bytes += absorbed as u64;
                                    if absorbed < data.len() {
                                        token = frame.data[frame.pos] as usize;
                                        frame.pos += 1;
                                        break;
                                    }
                                }
                            }
                            self.tx.mode = MatchMode::None;
                        },
                        MatchMode::Product { parameter, mut cursor } => {
                            let BuiltinParam::Product(pattern) =
                                &self.builtin_params[effector::MPRODUCT as usize][parameter]
                            else {
                                unreachable!("product parameter is typed at bind");
                            };
                            loop {
                                if token != pattern[cursor] as usize {
                                    self.tx.error_input = token as i64;
                                    self.tx.metrics.errors += 1;
                                    self.tx.mode = MatchMode::None;
                                    token = Signal::NUL.ordinal();
                                    break;
                                }
                                cursor += 1;
                                self.tx.metrics.product.bytes += 1;
                                if cursor == pattern.len() {
                                    // the last matched byte re-enters the matrix; the rewritten
                                    // endpoint cell consumes it
                                    self.tx.mode = MatchMode::None;
                                    break;
                                }
                                let Some(frame) = self.tx.input.peek() else {
                                    self.tx.mode = MatchMode::Product { parameter, cursor };
                                    self.tx.stack.top_mut().expect("active frame").state = state;
                                    return Ok(Status::Paused);
                                };
                                token = frame.data[frame.pos] as usize;
                                frame.pos += 1;
                            }
                        },
                        MatchMode::Scan { byte } => {
                            if token != byte as usize {
                                self.tx.metrics.scan.bytes += 1;
                                loop {
                                    let Some(frame) = self.tx.input.peek() else {
                                        self.tx.stack.top_mut().expect("active frame").state =
                                            state;
                                        return Ok(Status::Paused);
                                    };
                                    let data = &frame.data[frame.pos..frame.limit];
                                    let mut skipped = 0;
                                    while skipped < data.len() && data[skipped] != byte {
                                        skipped += 1;
                                    }
                                    frame.pos += skipped;
                                    self.tx.metrics.scan.bytes += skipped as u64;
                                    if skipped < data.len() {
                                        token = byte as usize;
                                        frame.pos += 1;
                                        break;
                                    }
                                }
                            }
                            self.tx.mode = MatchMode::None;
                        },
                        MatchMode::None => unreachable!(),
                    }
                }

                // 3. inner fast path: paste and nil cells spin without dispatch
                let mut action;
                loop {
                    let cell = matrix[state + filter[token] as usize];
                    state = cell_state(cell);
                    action = cell_action(cell);
                    if action == PASTE_ACTION {
                        self.tx.stack.selected_value_mut().push_byte(token as u8);
                    } else if action != NIL_ACTION {
                        break;
                    }
                    match self.tx.input.peek() {
                        Some(frame) => {
                            token = frame.data[frame.pos] as usize;
                            frame.pos += 1;
                        },
                        None => {
                            self.tx.stack.top_mut().expect("active frame").state = state;
                            return Ok(Status::Paused);
                        },
                    }
                }

                // 4. effector dispatch
                if action == 0 {
                    // inline nul: raise the domain-error signal, or fail on the second arrival
                    if token == Signal::NUL.ordinal() {
                        return Err(self.domain_error(&transducer, state).into());
                    }
                    if token == Signal::EOS.ordinal() {
                        self.tx.stack.clear();
                        return Ok(Status::Stopped);
                    }
                    self.tx.error_input = token as i64;
                    self.tx.metrics.errors += 1;
                    signal = Some(Signal::NUL.as_u32());
                    continue;
                }

                let depth_before = self.tx.stack.depth();
                let mut effect: Effect = EFFECT_NONE;
                let mut raised: u32 = 0;
                if action > 0 {
                    let invoked = if is_parametric(action) {
                        self.invoke_parametric(
                            action_effector(action),
                            action_parameter(action),
                            token,
                        )?
                    } else {
                        self.invoke_scalar(action as u32, token)?
                    };
                    if invoked & EFFECT_SIGNAL != 0 {
                        raised = signal_of_effect(invoked);
                    }
                    effect = invoked & 0xFFFF;
                } else {
                    // 5. vector walk: run every element to the terminating 0
                    let mut offset = (-action) as usize;
                    loop {
                        let element = pool[offset];
                        offset += 1;
                        if element == 0 {
                            break;
                        }
                        let invoked = if element > 0 {
                            self.invoke_scalar(element as u32, token)?
                        } else {
                            let parameter = pool[offset] as u32;
                            offset += 1;
                            self.invoke_parametric((-element) as u32, parameter, token)?
                        };
                        if invoked & EFFECT_SIGNAL != 0 {
                            raised = signal_of_effect(invoked);
                        }
                        effect |= invoked & 0xFFFF;
                    }
                }

                if effect & EFFECT_SIGNAL != 0 {
                    signal = Some(raised);
                }
                if effect & EFFECT_STOPPED != 0 {
                    return Ok(Status::Stopped);
                }
                if effect & EFFECT_START != 0 {
                    self.tx.stack.frame_mut(depth_before - 1).state = state;
                    continue 'transducer;
                }
                if effect & EFFECT_STOP != 0 {
                    continue 'transducer;
                }
                if effect & EFFECT_PAUSE != 0 {
                    self.tx.stack.top_mut().expect("active frame").state = state;
                    return Ok(Status::Paused);
                }
                // EFFECT_INPUT needs no action: every fetch re-peeks the input stack
            }
        }
    }

    // BUILT-IN EFFECTORS
    // --------------------------------------------------------------------------------------------

    fn invoke_scalar(&mut self, ordinal: u32, token: usize) -> Result<Effect, RuntimeError> {
        match ordinal {
            effector::NUL | effector::NIL => {
                Err(EffectorError::SentinelInvocation(ordinal).into())
            },
            effector::PASTE => {
                self.tx.stack.selected_value_mut().push_byte(token as u8);
                Ok(EFFECT_NONE)
            },
            effector::SELECT => {
                self.tx.stack.top_mut().expect("active frame").selected = 0;
                Ok(EFFECT_NONE)
            },
            effector::COPY => Err(EffectorError::InvalidScalarInvocation("copy").into()),
            effector::CUT => Err(EffectorError::InvalidScalarInvocation("cut").into()),
            effector::CLEAR => {
                self.tx.stack.selected_value_mut().clear();
                Ok(EFFECT_NONE)
            },
            effector::COUNT => {
                let frame = self.tx.stack.top_mut().expect("active frame");
                match frame.countdown {
                    Some((n, signal)) if n <= 1 => {
                        frame.countdown = None;
                        Ok(effect_signal(Signal::from(signal)))
                    },
                    Some((n, signal)) => {
                        frame.countdown = Some((n - 1, signal));
                        Ok(EFFECT_NONE)
                    },
                    None => Err(EffectorError::InvalidScalarInvocation("count").into()),
                }
            },
            effector::SIGNAL => Err(EffectorError::InvalidScalarInvocation("signal").into()),
            effector::IN => {
                let tx = &mut self.tx;
                let frame = tx.stack.top().expect("active frame");
                let bytes = tx.stack.field(frame.selected).as_slice();
                tx.input.push(bytes, bytes.len());
                Ok(EFFECT_INPUT)
            },
            effector::OUT => {
                let tx = &mut self.tx;
                if tx.out_enabled {
                    let frame = tx.stack.top().expect("active frame");
                    let bytes = tx.stack.field(frame.selected).as_slice();
                    tx.output.write_all(bytes).map_err(RuntimeError::Effector)?;
                    tx.metrics.bytes_written += bytes.len() as u64;
                }
                Ok(EFFECT_NONE)
            },
            effector::MARK => {
                self.tx.input.mark();
                Ok(EFFECT_INPUT)
            },
            effector::RESET => {
                self.tx.input.reset()?;
                Ok(EFFECT_INPUT)
            },
            effector::START => Err(EffectorError::InvalidScalarInvocation("start").into()),
            effector::PAUSE => Ok(EFFECT_PAUSE),
            effector::STOP => {
                self.tx.stack.pop();
                Ok(if self.tx.stack.is_empty() { EFFECT_STOPPED } else { EFFECT_STOP })
            },
            effector::MSUM | effector::MPRODUCT | effector::MSCAN => {
                Err(EffectorError::InvalidScalarInvocation("match effector").into())
            },
            _ => {
                let index = ordinal as usize - BUILT_IN_EFFECTORS.len();
                let host_effector = self
                    .host
                    .get_mut(index)
                    .ok_or(EffectorError::UnknownParameter { effector: ordinal, parameter: 0 })?;
                host_effector.invoke(&mut self.target, &mut self.tx).map_err(Into::into)
            },
        }
    }

    fn invoke_parametric(
        &mut self,
        ordinal: u32,
        parameter: u32,
        _token: usize,
    ) -> Result<Effect, RuntimeError> {
        if ordinal as usize >= BUILT_IN_EFFECTORS.len() {
            let index = ordinal as usize - BUILT_IN_EFFECTORS.len();
            let host_effector = self
                .host
                .get_mut(index)
                .ok_or(EffectorError::UnknownParameter { effector: ordinal, parameter })?;
            return host_effector
                .invoke_parameterized(&mut self.target, &mut self.tx, parameter as usize)
                .map_err(Into::into);
        }

        let param = self.builtin_params[ordinal as usize]
            .get(parameter as usize)
            .ok_or(EffectorError::UnknownParameter { effector: ordinal, parameter })?;

        match (ordinal, param) {
            (effector::PASTE, BuiltinParam::Tokens(tokens)) => {
                for token in tokens {
                    match token {
                        OutToken::Literal(bytes) => {
                            self.tx.stack.selected_value_mut().extend(bytes);
                        },
                        OutToken::Field(field) => {
                            let bytes = self.tx.stack.field(*field as usize).as_slice().to_vec();
                            self.tx.stack.selected_value_mut().extend(&bytes);
                        },
                    }
                }
                Ok(EFFECT_NONE)
            },
            (effector::SELECT, BuiltinParam::Field(field)) => {
                if *field == 1 {
                    return Err(EffectorError::AllFieldsSentinel.into());
                }
                self.tx.stack.top_mut().expect("active frame").selected = *field as usize;
                Ok(EFFECT_NONE)
            },
            (effector::COPY, BuiltinParam::Field(field)) => {
                if *field == 1 {
                    return Err(EffectorError::AllFieldsSentinel.into());
                }
                let bytes = self.tx.stack.field(*field as usize).as_slice().to_vec();
                self.tx.stack.selected_value_mut().extend(&bytes);
                Ok(EFFECT_NONE)
            },
            (effector::CUT, BuiltinParam::Field(field)) => {
                if *field == 1 {
                    return Err(EffectorError::AllFieldsSentinel.into());
                }
                let bytes = self.tx.stack.field(*field as usize).as_slice().to_vec();
                self.tx.stack.field_mut(*field as usize).clear();
                self.tx.stack.selected_value_mut().extend(&bytes);
                Ok(EFFECT_NONE)
            },
            (effector::CLEAR, BuiltinParam::Field(field)) => {
                if *field == 1 {
                    self.tx.stack.clear_fields();
                } else {
                    self.tx.stack.field_mut(*field as usize).clear();
                }
                Ok(EFFECT_NONE)
            },
            (effector::COUNT, BuiltinParam::Count { n, signal }) => {
                self.tx.stack.top_mut().expect("active frame").countdown = Some((*n, *signal));
                Ok(EFFECT_NONE)
            },
            (effector::SIGNAL, BuiltinParam::Signal(signal)) => {
                Ok(effect_signal(Signal::from(*signal)))
            },
            (effector::IN, BuiltinParam::Tokens(tokens)) => {
                // frames pop in reverse push order, so push back-to-front
                for token in tokens.iter().rev() {
                    let tx = &mut self.tx;
                    match token {
                        OutToken::Literal(bytes) => tx.input.push(bytes, bytes.len()),
                        OutToken::Field(field) => {
                            let bytes = tx.stack.field(*field as usize).as_slice();
                            tx.input.push(bytes, bytes.len());
                        },
                    }
                }
                Ok(EFFECT_INPUT)
            },
            (effector::OUT, BuiltinParam::Tokens(tokens)) => {
                let tx = &mut self.tx;
                if tx.out_enabled {
                    for token in tokens {
                        let bytes = match token {
                            OutToken::Literal(bytes) => bytes.as_slice(),
                            OutToken::Field(field) => tx.stack.field(*field as usize).as_slice(),
                        };
                        tx.output.write_all(bytes).map_err(RuntimeError::Effector)?;
                        tx.metrics.bytes_written += bytes.len() as u64;
                    }
                }
                Ok(EFFECT_NONE)
            },
            (effector::START, BuiltinParam::Transducer(ordinal)) => {
                let transducer = self.model.transducer(*ordinal)?;
                self.tx.stack.push(transducer);
                Ok(EFFECT_START)
            },
            (effector::MSUM, BuiltinParam::SumMask(mask)) => {
                if !matches!(self.tx.mode, MatchMode::None) {
                    return Err(EffectorError::TrapModeActive("msum").into());
                }
                self.tx.mode = MatchMode::Sum { mask: *mask };
                self.tx.metrics.sum.count += 1;
                Ok(EFFECT_NONE)
            },
            (effector::MPRODUCT, BuiltinParam::Product(_)) => {
                if !matches!(self.tx.mode, MatchMode::None) {
                    return Err(EffectorError::TrapModeActive("mproduct").into());
                }
                self.tx.mode = MatchMode::Product {
                    parameter: parameter as usize,
                    cursor: 0,
                };
                self.tx.metrics.product.count += 1;
                Ok(EFFECT_NONE)
            },
            (effector::MSCAN, BuiltinParam::Scan(byte)) => {
                if !matches!(self.tx.mode, MatchMode::None) {
                    return Err(EffectorError::TrapModeActive("mscan").into());
                }
                self.tx.mode = MatchMode::Scan { byte: *byte };
                self.tx.metrics.scan.count += 1;
                Ok(EFFECT_NONE)
            },
            _ => Err(EffectorError::NotParameterized(
                BUILT_IN_EFFECTORS.get(ordinal as usize).unwrap_or(&"?").to_string(),
            )
            .into()),
        }
    }

    // DIAGNOSTICS
    // --------------------------------------------------------------------------------------------

    /// Renders the domain-error diagnostic: the offending byte, its equivalence class, the
    /// transducer stack, and nearby input bytes.
    fn domain_error(&self, transducer: &ribose_core::Transducer, state: usize) -> DomainError {
        let state_index = transducer.state_index(state);
        let offending = self.tx.error_input;
        let class = if (0..self.model.signal_limit() as i64).contains(&offending) {
            transducer.input_filter()[offending as usize] as i64
        } else {
            -1
        };
        let mut context = String::new();
        for byte in self.tx.input.context_bytes(16) {
            let _ = write!(&mut context, "{byte:02x} ");
        }
        DomainError(alloc::format!(
            "transducer '{}' state {state_index} has no transition for input {offending:#x} \
             (class {class}); transducer stack [{}]; input near [{}]",
            transducer.name(),
            self.tx.stack.trace().join(" "),
            context.trim_end(),
        ))
    }
}

#[cfg(feature = "std")]
fn out_enabled_from_env() -> bool {
    !matches!(std::env::var("RIBOSE_OUT_ENABLED").as_deref(), Ok("false"))
}

#[cfg(not(feature = "std"))]
fn out_enabled_from_env() -> bool {
    true
}
