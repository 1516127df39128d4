//! End-to-end transduction scenarios: automata are compiled in memory and driven through a real
//! transductor.

use std::{cell::RefCell, rc::Rc, sync::Arc};

use pretty_assertions::assert_eq;
use ribose_compiler::{compile_to_vec, inr::save_stream};
use ribose_core::{BaseTarget, EFFECT_NONE, Effect, Signal, Target, errors::ModelError};
use ribose_runtime::{
    HostEffector, HostTarget, Model, Output, Status, Transduction, Transductor,
    errors::{EffectorError, RuntimeError},
};

// HARNESS
// ================================================================================================

#[derive(Clone, Default)]
struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }
}

impl Output for SharedOutput {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), EffectorError> {
        self.0.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }
}

fn model_of(transitions: &[(u32, u32, i32, Vec<u8>)]) -> Arc<Model> {
    let borrowed: Vec<(u32, u32, i32, &[u8])> =
        transitions.iter().map(|(f, t, tape, s)| (*f, *t, *tape, s.as_slice())).collect();
    let stream = save_stream(3, &borrowed);
    let image = compile_to_vec(&BaseTarget, [("Test", stream.as_slice())]).expect("compile");
    Arc::new(Model::load(image).expect("load"))
}

fn transductor_of(
    transitions: &[(u32, u32, i32, Vec<u8>)],
) -> (Transductor<BaseTarget>, SharedOutput) {
    let output = SharedOutput::default();
    let mut transductor =
        Transductor::bind(model_of(transitions), BaseTarget, Box::new(output.clone()))
            .expect("bind");
    transductor.set_output_enabled(true);
    (transductor, output)
}

fn t(from: u32, to: u32, tape: i32, symbol: &[u8]) -> (u32, u32, i32, Vec<u8>) {
    (from, to, tape, symbol.to_vec())
}

/// `paste` on every byte at the start state, plus an optional eos tail.
fn passthrough(with_eos: bool) -> Vec<(u32, u32, i32, Vec<u8>)> {
    let mut transitions = Vec::new();
    for byte in 0u16..=255 {
        transitions.push(t(0, 10, 0, &[byte as u8]));
    }
    transitions.push(t(10, 0, 1, b"paste"));
    if with_eos {
        transitions.push(t(0, 20, 0, b"eos"));
        transitions.push(t(20, 21, 1, b"out"));
        transitions.push(t(21, 22, 1, b"stop"));
    }
    transitions
}

// SCENARIO 1: PASTE PASSTHROUGH
// ================================================================================================

#[test]
fn paste_passthrough_copies_input_to_output() {
    let (mut transductor, output) = transductor_of(&passthrough(true));
    transductor.start("Test").unwrap();
    transductor.push(b"abc", usize::MAX);
    assert_eq!(transductor.run().unwrap(), Status::Paused);
    assert_eq!(transductor.field(0), Some(b"abc".as_slice()));

    transductor.signal(Signal::EOS).unwrap();
    assert_eq!(transductor.run().unwrap(), Status::Stopped);
    assert_eq!(output.bytes(), b"abc");
}

#[test]
fn eos_is_idempotent_without_eos_transitions() {
    let run_with = |eos: bool| {
        let (mut transductor, output) = transductor_of(&passthrough(false));
        transductor.start("Test").unwrap();
        transductor.push(b"abc", usize::MAX);
        let mut status = transductor.run().unwrap();
        if eos {
            transductor.signal(Signal::EOS).unwrap();
            status = transductor.run().unwrap();
        }
        (status, output.bytes())
    };

    let (paused, bytes) = run_with(false);
    let (stopped, bytes_with_eos) = run_with(true);
    assert_eq!(paused, Status::Paused);
    assert_eq!(stopped, Status::Stopped);
    assert_eq!(bytes, bytes_with_eos);
}

// SCENARIO 2: FIELD COPY
// ================================================================================================

#[test]
fn named_field_copy_extracts_the_prefix() {
    let mut transitions = Vec::new();
    for byte in 0u16..=255 {
        if byte as u8 != b',' {
            transitions.push(t(0, 10, 0, &[byte as u8]));
        }
    }
    transitions.push(t(10, 0, 1, b"paste"));
    // on ',': select the name field, move the pasted prefix into it, re-select the anonymous one
    transitions.push(t(0, 30, 0, b","));
    transitions.push(t(30, 31, 1, b"select"));
    transitions.push(t(31, 32, 2, b"~name"));
    transitions.push(t(32, 33, 1, b"copy"));
    transitions.push(t(33, 34, 2, b"~0"));
    transitions.push(t(34, 35, 1, b"clear"));
    transitions.push(t(35, 36, 2, b"~0"));
    transitions.push(t(36, 37, 1, b"select"));
    // on eos: emit the name field
    transitions.push(t(0, 20, 0, b"eos"));
    transitions.push(t(20, 21, 1, b"out"));
    transitions.push(t(21, 22, 2, b"~name"));
    transitions.push(t(22, 23, 1, b"stop"));

    let (mut transductor, output) = transductor_of(&transitions);
    transductor.start("Test").unwrap();
    transductor.push(b"kim,briggs", usize::MAX);
    assert_eq!(transductor.run().unwrap(), Status::Paused);
    transductor.signal(Signal::EOS).unwrap();
    assert_eq!(transductor.run().unwrap(), Status::Stopped);
    assert_eq!(output.bytes(), b"kim");
}

// SCENARIO 3: MSCAN ACCELERATION
// ================================================================================================

#[test]
fn scan_trap_absorbs_bytes_until_the_newline() {
    let mut transitions = vec![t(0, 2, 0, b"nil")];
    for byte in (0u16..=255).filter(|&b| b as u8 != b'\n') {
        transitions.push(t(2, 2, 0, &[byte as u8]));
    }
    transitions.push(t(2, 3, 0, b"\n"));
    transitions.push(t(3, 4, 1, b"out"));
    transitions.push(t(4, 5, 1, b"stop"));

    let (mut transductor, output) = transductor_of(&transitions);
    transductor.start("Test").unwrap();
    transductor.signal(Signal::NIL).unwrap();
    let mut input = vec![b'x'; 10_000];
    input.push(b'\n');
    transductor.push(&input, usize::MAX);

    assert_eq!(transductor.run().unwrap(), Status::Stopped);
    let metrics = transductor.metrics();
    assert_eq!(metrics.scan.count, 1);
    assert!(metrics.scan.bytes >= 10_000, "absorbed {}", metrics.scan.bytes);
    assert_eq!(output.bytes(), b"");
}

#[test]
fn scan_trap_survives_frame_exhaustion() {
    let mut transitions = vec![t(0, 2, 0, b"nil")];
    for byte in (0u16..=255).filter(|&b| b as u8 != b'\n') {
        transitions.push(t(2, 2, 0, &[byte as u8]));
    }
    transitions.push(t(2, 3, 0, b"\n"));
    transitions.push(t(3, 4, 1, b"stop"));

    let (mut transductor, _) = transductor_of(&transitions);
    transductor.start("Test").unwrap();
    transductor.signal(Signal::NIL).unwrap();
    transductor.push(b"aaaa", usize::MAX);
    assert_eq!(transductor.run().unwrap(), Status::Paused);

    // the trap stays armed across the suspension
    transductor.push(b"bb\n", usize::MAX);
    assert_eq!(transductor.run().unwrap(), Status::Stopped);
    assert_eq!(transductor.metrics().scan.bytes, 6);
}

// SCENARIO 4: MPRODUCT ACCELERATION
// ================================================================================================

#[test]
fn product_trap_matches_the_literal_and_raises_the_signal() {
    let mut transitions = vec![t(0, 2, 0, b"nil")];
    // 2 -H-> 3 -T-> 4 -T-> 5 -P-> 6 -/-> 7 -1-> 8 -.-> 9, then '1' raises http11
    let chain = b"HTTP/1.";
    for (offset, byte) in chain.iter().enumerate() {
        let from = 2 + offset as u32;
        transitions.push(t(from, from + 1, 0, &[*byte]));
    }
    transitions.push(t(9, 10, 0, b"1"));
    transitions.push(t(10, 11, 1, b"signal"));
    transitions.push(t(11, 12, 2, b"!http11"));
    transitions.push(t(12, 13, 0, b"http11"));
    transitions.push(t(13, 14, 1, b"pause"));

    let (mut transductor, _) = transductor_of(&transitions);
    transductor.start("Test").unwrap();
    transductor.signal(Signal::NIL).unwrap();
    transductor.push(b"HTTP/1.1rest", usize::MAX);

    assert_eq!(transductor.run().unwrap(), Status::Paused);
    let metrics = transductor.metrics();
    assert_eq!(metrics.product.count, 1);
    assert_eq!(metrics.product.bytes, 7);
    // the match and the signal consumed "HTTP/1.1" only; "rest" stays on the input stack
    assert_eq!(metrics.bytes_read, 8);
    assert_eq!(transductor.status(), Status::Runnable);
}

#[test]
fn product_trap_mismatch_raises_nul() {
    let mut transitions = vec![t(0, 2, 0, b"nil")];
    for (offset, byte) in b"HTTP/1.".iter().enumerate() {
        let from = 2 + offset as u32;
        transitions.push(t(from, from + 1, 0, &[*byte]));
    }
    transitions.push(t(9, 9, 0, b"1"));

    let (mut transductor, _) = transductor_of(&transitions);
    transductor.start("Test").unwrap();
    transductor.signal(Signal::NIL).unwrap();
    transductor.push(b"HTXX", usize::MAX);

    let err = transductor.run().unwrap_err();
    let RuntimeError::Domain(domain) = err else { panic!("expected domain error") };
    assert!(domain.0.contains("0x58"), "diagnostic names the byte: {}", domain.0);
    assert_eq!(transductor.metrics().errors, 1);
}

// SCENARIO 5: COUNT SIGNAL
// ================================================================================================

#[test]
fn countdown_raises_its_signal_after_ten_bytes() {
    let mut transitions = vec![t(0, 10, 0, b"nil")];
    transitions.push(t(10, 11, 1, b"count"));
    transitions.push(t(11, 12, 2, b"10"));
    transitions.push(t(12, 13, 2, b"stop"));
    // loop state 13: every byte pastes then counts down
    for byte in 0u16..=255 {
        transitions.push(t(13, 20, 0, &[byte as u8]));
    }
    transitions.push(t(20, 21, 1, b"paste"));
    transitions.push(t(21, 13, 1, b"count"));
    // the raised signal drains the field and stops
    transitions.push(t(13, 30, 0, b"stop"));
    transitions.push(t(30, 31, 1, b"out"));
    transitions.push(t(31, 32, 1, b"stop"));

    let (mut transductor, output) = transductor_of(&transitions);
    transductor.start("Test").unwrap();
    transductor.signal(Signal::NIL).unwrap();
    transductor.push(b"ABCDEFGHIJKLMNO", usize::MAX);

    assert_eq!(transductor.run().unwrap(), Status::Stopped);
    // ten bytes pasted; the stop signal preempted the eleventh
    assert_eq!(output.bytes(), b"ABCDEFGHIJ");
    assert_eq!(transductor.metrics().bytes_read, 10);
}

// SCENARIO 6: DOMAIN ERROR
// ================================================================================================

#[test]
fn unhandled_byte_raises_nul_then_fails() {
    let transitions = vec![t(0, 2, 0, b"a")];
    let (mut transductor, _) = transductor_of(&transitions);
    transductor.start("Test").unwrap();
    transductor.push(&[0xFF], usize::MAX);

    let err = transductor.run().unwrap_err();
    let RuntimeError::Domain(domain) = err else { panic!("expected domain error") };
    assert!(domain.0.contains("state 0"), "{}", domain.0);
    assert!(domain.0.contains("0xff"), "{}", domain.0);
    assert!(domain.0.contains("Test"), "{}", domain.0);
    assert_eq!(transductor.metrics().errors, 1);
}

#[test]
fn nul_recovery_transition_consumes_the_error() {
    // state 0 accepts 'a'; anything else raises nul, which a recovery edge absorbs and pastes '?'
    let mut transitions = vec![t(0, 2, 0, b"a")];
    transitions.push(t(0, 4, 0, b"nul"));
    transitions.push(t(4, 5, 1, b"paste"));
    transitions.push(t(5, 6, 2, b"?"));
    transitions.push(t(0, 7, 0, b"eos"));
    transitions.push(t(7, 8, 1, b"out"));
    transitions.push(t(8, 9, 1, b"stop"));

    let (mut transductor, output) = transductor_of(&transitions);
    transductor.start("Test").unwrap();
    transductor.push(b"x", usize::MAX);
    assert_eq!(transductor.run().unwrap(), Status::Paused);
    transductor.signal(Signal::EOS).unwrap();
    assert_eq!(transductor.run().unwrap(), Status::Stopped);
    assert_eq!(output.bytes(), b"?");
    assert_eq!(transductor.metrics().errors, 1);
}

// MARK / RESET
// ================================================================================================

#[test]
fn mark_and_reset_replay_input_through_a_second_pass() {
    // phase 1: mark, paste three bytes into ~0, then reset; phase 2: re-consume the replayed
    // bytes into ~name; finally emit both fields
    let mut transitions = vec![
        t(0, 10, 0, b"nil"),
        t(10, 11, 1, b"mark"),
        t(11, 12, 1, b"count"),
        t(12, 13, 2, b"3"),
        t(13, 14, 2, b"done"),
    ];
    for byte in [b'a', b'b', b'c'] {
        transitions.push(t(14, 20, 0, &[byte]));
    }
    transitions.push(t(20, 21, 1, b"paste"));
    transitions.push(t(21, 14, 1, b"count"));
    transitions.push(t(14, 30, 0, b"done"));
    transitions.push(t(30, 31, 1, b"reset"));
    transitions.push(t(31, 32, 1, b"select"));
    transitions.push(t(32, 33, 2, b"~name"));
    transitions.push(t(33, 34, 1, b"count"));
    transitions.push(t(34, 35, 2, b"3"));
    transitions.push(t(35, 36, 2, b"done2"));
    for byte in [b'a', b'b', b'c'] {
        transitions.push(t(36, 40, 0, &[byte]));
    }
    transitions.push(t(40, 41, 1, b"paste"));
    transitions.push(t(41, 36, 1, b"count"));
    transitions.push(t(36, 50, 0, b"done2"));
    transitions.push(t(50, 51, 1, b"out"));
    transitions.push(t(51, 52, 2, b"~0"));
    transitions.push(t(52, 53, 2, b"~name"));
    transitions.push(t(53, 54, 1, b"stop"));

    let (mut transductor, output) = transductor_of(&transitions);
    transductor.start("Test").unwrap();
    transductor.signal(Signal::NIL).unwrap();
    transductor.push(b"abc", usize::MAX);

    assert_eq!(transductor.run().unwrap(), Status::Stopped);
    // both passes saw the same three bytes
    assert_eq!(output.bytes(), b"abcabc");
    assert_eq!(transductor.metrics().bytes_read, 6);
}

// NESTED TRANSDUCERS
// ================================================================================================

#[test]
fn started_transducer_runs_until_it_stops_back_to_its_caller() {
    // Outer starts Inner on nil and finishes on eos; Inner pastes until '!' then emits and stops
    let outer = vec![
        t(0, 10, 0, b"nil"),
        t(10, 11, 1, b"start"),
        t(11, 12, 2, b"@Inner"),
        t(12, 13, 0, b"eos"),
        t(13, 14, 1, b"out"),
        t(14, 15, 1, b"stop"),
    ];
    let mut inner = Vec::new();
    for byte in 0u16..=255 {
        if byte as u8 != b'!' {
            inner.push(t(0, 10, 0, &[byte as u8]));
        }
    }
    inner.push(t(10, 0, 1, b"paste"));
    inner.push(t(0, 20, 0, b"!"));
    inner.push(t(20, 21, 1, b"out"));
    inner.push(t(21, 22, 1, b"stop"));

    let streams: Vec<(String, Vec<u8>)> = [("Inner", inner), ("Outer", outer)]
        .into_iter()
        .map(|(name, transitions)| {
            let borrowed: Vec<(u32, u32, i32, &[u8])> = transitions
                .iter()
                .map(|(f, t, tape, s)| (*f, *t, *tape, s.as_slice()))
                .collect();
            (name.to_string(), save_stream(3, &borrowed))
        })
        .collect();
    let image = compile_to_vec(
        &BaseTarget,
        streams.iter().map(|(name, stream)| (name.as_str(), stream.as_slice())),
    )
    .expect("compile");

    let output = SharedOutput::default();
    let mut transductor = Transductor::bind(
        Arc::new(Model::load(image).unwrap()),
        BaseTarget,
        Box::new(output.clone()),
    )
    .unwrap();
    transductor.start("Outer").unwrap();
    transductor.signal(Signal::NIL).unwrap();
    transductor.push(b"hi!", usize::MAX);

    assert_eq!(transductor.run().unwrap(), Status::Paused);
    transductor.signal(Signal::EOS).unwrap();
    assert_eq!(transductor.run().unwrap(), Status::Stopped);
    // Inner's frame owned the pasted bytes; Outer's anonymous field stayed empty
    assert_eq!(output.bytes(), b"hi");
}

#[test]
fn disabled_output_gate_suppresses_out() {
    let (mut transductor, output) = transductor_of(&passthrough(true));
    transductor.set_output_enabled(false);
    transductor.start("Test").unwrap();
    transductor.push(b"abc", usize::MAX);
    transductor.run().unwrap();
    transductor.signal(Signal::EOS).unwrap();
    assert_eq!(transductor.run().unwrap(), Status::Stopped);
    assert_eq!(output.bytes(), b"");
}

// MODEL LOADING AND BINDING
// ================================================================================================

#[test]
fn stopped_transductor_runs_to_no_effect() {
    let (mut transductor, _) = transductor_of(&passthrough(true));
    transductor.stop();
    assert_eq!(transductor.run().unwrap(), Status::Stopped);
}

#[test]
fn unknown_transducer_is_refused() {
    let (mut transductor, _) = transductor_of(&passthrough(true));
    let err = transductor.start("Nope").unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Model(ModelError::UnknownTransducer(name)) if name == "Nope"
    ));
}

#[test]
fn lazy_transducer_loads_once() {
    let model = model_of(&passthrough(true));
    let first = model.transducer(0).unwrap();
    let second = model.transducer(0).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn unsupported_model_version_is_refused() {
    let owned = passthrough(true);
    let borrowed: Vec<(u32, u32, i32, &[u8])> = owned
        .iter()
        .map(|(f, t, tape, s)| (*f, *t, *tape, s.as_slice()))
        .collect();
    let stream = save_stream(3, &borrowed);
    let mut image = compile_to_vec(&BaseTarget, [("Test", stream.as_slice())]).unwrap();
    // the version string sits after the 8-byte index offset and a 4-byte length
    let version_at = 8 + 4;
    image[version_at] = b'X';
    assert!(matches!(Model::load(image), Err(ModelError::UnsupportedVersion(_))));
}

#[test]
fn target_name_mismatch_is_refused_at_bind() {
    struct OtherTarget;
    impl Target for OtherTarget {
        fn name(&self) -> &str {
            "OtherTarget"
        }
    }
    impl HostTarget for OtherTarget {}

    let model = model_of(&passthrough(true));
    let result = Transductor::bind(model, OtherTarget, Box::new(SharedOutput::default()));
    assert!(result.is_err());
}

// HOST EFFECTORS
// ================================================================================================

#[derive(Default)]
struct TickTarget {
    ticks: Rc<RefCell<u32>>,
}

impl Target for TickTarget {
    fn name(&self) -> &str {
        "TickTarget"
    }

    fn effector_names(&self) -> Vec<&str> {
        vec!["tick"]
    }
}

impl HostTarget for TickTarget {
    fn effectors(&self) -> Vec<Box<dyn HostEffector<Self>>> {
        vec![Box::new(TickEffector)]
    }
}

struct TickEffector;

impl HostEffector<TickTarget> for TickEffector {
    fn name(&self) -> &str {
        "tick"
    }

    fn invoke(
        &mut self,
        target: &mut TickTarget,
        _tx: &mut Transduction,
    ) -> Result<Effect, EffectorError> {
        *target.ticks.borrow_mut() += 1;
        Ok(EFFECT_NONE)
    }
}

#[test]
fn host_effectors_dispatch_through_the_bound_target() {
    let transitions = vec![
        t(0, 2, 0, b"a"),
        t(2, 3, 1, b"tick"),
    ];
    let borrowed: Vec<(u32, u32, i32, &[u8])> =
        transitions.iter().map(|(f, t, tape, s)| (*f, *t, *tape, s.as_slice())).collect();
    let stream = save_stream(3, &borrowed);
    let target = TickTarget::default();
    let ticks = target.ticks.clone();
    let image = compile_to_vec(&target, [("Test", stream.as_slice())]).unwrap();

    let model = Arc::new(Model::load(image).unwrap());
    let mut transductor =
        Transductor::bind(model, target, Box::new(SharedOutput::default())).unwrap();
    transductor.start("Test").unwrap();
    transductor.push(b"aaa", usize::MAX);
    assert_eq!(transductor.run().unwrap(), Status::Paused);
    assert_eq!(*ticks.borrow(), 3);
}
