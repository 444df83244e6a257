// Integration tests for the sketch interpreter: control API and command stream

use sketchrun::commands::{Command, CommandKind, Primitive, RequestKind};
use sketchrun::config::Config;
use sketchrun::interpreter::{ExecutionContext, ExecutionState, Interpreter};
use sketchrun::parser::{codec, parse_sketch, ParsedSketch};

const BLINK: &str = r#"
    void setup() { pinMode(13, OUTPUT); }
    void loop() {
        digitalWrite(13, HIGH);
        delay(1000);
        digitalWrite(13, LOW);
        delay(1000);
    }
"#;

fn parse(source: &str) -> ParsedSketch {
    parse_sketch(source).expect("Parsing failed")
}

fn config(iterations: u64) -> Config {
    Config::default().with_max_loop_iterations(iterations)
}

fn kinds(commands: &[Command]) -> Vec<CommandKind> {
    commands.iter().map(|c| c.kind.clone()).collect()
}

fn run_to_end(source: &str, iterations: u64) -> (ExecutionState, Vec<CommandKind>) {
    let sketch = parse(source);
    let mut interp = Interpreter::new(&sketch.program, config(iterations)).with_macros(sketch.macros);
    let state = interp.run_with(|_| Primitive::Int(0));
    (state, kinds(interp.commands()))
}

#[test]
fn test_blink_command_stream() {
    let (state, commands) = run_to_end(BLINK, 2);
    assert_eq!(state, ExecutionState::Complete);

    let mut expected = vec![
        CommandKind::ProgramStart,
        CommandKind::PinMode { pin: 13, mode: 1 },
    ];
    for _ in 0..2 {
        expected.extend([
            CommandKind::DigitalWrite { pin: 13, value: 1 },
            CommandKind::Delay { ms: 1000 },
            CommandKind::DigitalWrite { pin: 13, value: 0 },
            CommandKind::Delay { ms: 1000 },
        ]);
    }
    expected.push(CommandKind::LoopLimitReached { iterations: 2 });
    expected.push(CommandKind::ProgramEnd);

    assert_eq!(commands, expected);
}

#[test]
fn test_sequence_numbers_are_contiguous() {
    let sketch = parse(BLINK);
    let mut interp = Interpreter::new(&sketch.program, config(3));
    interp.start();
    interp.run_until_blocked();

    for (index, command) in interp.commands().iter().enumerate() {
        assert_eq!(command.seq, index as u64);
    }
}

#[test]
fn test_loop_bound_then_nothing() {
    let sketch = parse(BLINK);
    let mut interp = Interpreter::new(&sketch.program, config(5));
    interp.start();
    assert_eq!(interp.run_until_blocked(), ExecutionState::Complete);

    let commands = kinds(interp.commands());
    let writes = commands
        .iter()
        .filter(|k| matches!(k, CommandKind::DigitalWrite { .. }))
        .count();
    assert_eq!(writes, 10);
    assert_eq!(
        &commands[commands.len() - 2..],
        &[CommandKind::LoopLimitReached { iterations: 5 }, CommandKind::ProgramEnd]
    );

    let before = interp.commands().len();
    assert!(!interp.tick());
    assert!(!interp.step());
    interp.stop();
    assert_eq!(interp.commands().len(), before);
    assert_eq!(interp.state(), ExecutionState::Complete);
}

#[test]
fn test_determinism() {
    let source = r#"
        int total = 0;
        void loop() {
            total += random(100);
            Serial.println(total);
        }
    "#;
    let first = run_to_end(source, 4);
    let second = run_to_end(source, 4);
    assert_eq!(first, second);
}

#[test]
fn test_analog_read_resumes_into_declaration() {
    let sketch = parse("int v = analogRead(A0);");
    let mut interp = Interpreter::new(&sketch.program, config(3)).with_macros(sketch.macros);
    interp.start();
    assert_eq!(interp.run_until_blocked(), ExecutionState::WaitingForResponse);

    let request = interp.commands().last().cloned().expect("request command");
    let CommandKind::AnalogReadRequest { request_id, pin } = request.kind else {
        panic!("expected an analog read request, got {:?}", request.kind);
    };
    assert_eq!(pin, 14);
    assert_eq!(interp.pending_request().map(|p| p.request_id), Some(request_id));

    // Nothing happens until the host answers
    let before = interp.commands().len();
    assert!(!interp.tick());
    assert_eq!(interp.commands().len(), before);

    assert!(interp.resume_with_value(request_id, Primitive::Int(742)));
    let after = &interp.commands()[before..];
    assert_eq!(
        after[0].kind,
        CommandKind::VarSet {
            name: "v".to_string(),
            value: Primitive::Int(742),
        }
    );
    assert_eq!(after[0].seq, request.seq + 1);
    assert_eq!(interp.run_until_blocked(), ExecutionState::Complete);
}

#[test]
fn test_stop_while_waiting() {
    let source = "void loop() { int v = analogRead(A0); Serial.println(v); }";
    let sketch = parse(source);
    let mut interp = Interpreter::new(&sketch.program, config(3)).with_macros(sketch.macros);
    interp.start();
    interp.run_until_blocked();
    let request_id = interp.pending_request().expect("pending request").request_id;

    interp.stop();
    assert_eq!(interp.state(), ExecutionState::Idle);
    assert!(interp.pending_request().is_none());
    assert!(interp.context().is_none());

    let before = interp.commands().len();
    assert!(!interp.resume_with_value(request_id, Primitive::Int(1)));
    interp.stop();
    assert_eq!(interp.commands().len(), before);

    // A new run starts from scratch with fresh request ids
    assert!(interp.start());
    assert_eq!(interp.commands()[0].kind, CommandKind::ProgramStart);
    interp.run_until_blocked();
    let next_id = interp.pending_request().expect("pending request").request_id;
    assert_ne!(next_id, request_id);
}

#[test]
fn test_stale_response_ignored() {
    let source = "void loop() { unsigned long t = millis(); }";
    let sketch = parse(source);
    let mut interp = Interpreter::new(&sketch.program, config(2));
    interp.start();
    interp.run_until_blocked();
    let request_id = interp.pending_request().expect("pending request").request_id;

    assert!(!interp.resume_with_value(request_id + 1000, Primitive::Int(5)));
    assert!(interp.resume_with_value(request_id, Primitive::Int(5)));
    let before = interp.commands().len();
    assert!(!interp.resume_with_value(request_id, Primitive::Int(5)));
    assert_eq!(interp.commands().len(), before);
}

#[test]
fn test_stepwise_matches_running() {
    let source = r#"
        int count = 0;
        void setup() { Serial.begin(9600); }
        void loop() {
            for (int i = 0; i < 2; i++) {
                count = count + i;
            }
            Serial.println(count);
        }
    "#;
    let sketch = parse(source);

    let mut running = Interpreter::new(&sketch.program, config(3));
    running.start();
    running.run_until_blocked();

    for steps in [1, 3, 7] {
        let mut stepping = Interpreter::new(&sketch.program, config(3));
        for _ in 0..steps {
            assert!(stepping.step());
            assert_eq!(stepping.state(), ExecutionState::Paused);
        }
        assert!(stepping.resume());
        stepping.run_until_blocked();
        assert_eq!(stepping.commands(), running.commands());
    }
}

#[test]
fn test_step_through_request_lands_paused() {
    let source = "void setup() { int v = analogRead(A0); Serial.println(v); }";
    let sketch = parse(source);
    let mut interp = Interpreter::new(&sketch.program, config(1));

    assert!(interp.step());
    assert_eq!(interp.state(), ExecutionState::WaitingForResponse);
    let pending = interp.pending_request().cloned().expect("pending request");
    assert_eq!(pending.resume_target, ExecutionState::Paused);

    assert!(interp.resume_with_value(pending.request_id, Primitive::Int(742)));
    assert_eq!(interp.state(), ExecutionState::Paused);
    assert_eq!(
        interp.commands().last().map(|c| c.kind.clone()),
        Some(CommandKind::VarSet {
            name: "v".to_string(),
            value: Primitive::Int(742),
        })
    );

    // The rest of setup() is the last unit; there is no loop()
    assert!(interp.step());
    assert_eq!(interp.state(), ExecutionState::Complete);
    assert_eq!(
        &kinds(interp.commands())[interp.commands().len() - 2..],
        &[
            CommandKind::SerialPrintln {
                text: "742".to_string()
            },
            CommandKind::ProgramEnd,
        ]
    );
}

#[test]
fn test_pause_while_waiting_retargets() {
    let source = "void loop() { int d = digitalRead(2); digitalWrite(13, d); }";
    let sketch = parse(source);
    let mut interp = Interpreter::new(&sketch.program, config(1));
    interp.start();
    interp.run_until_blocked();
    let request_id = interp.pending_request().expect("pending request").request_id;

    assert!(interp.pause());
    assert!(interp.resume_with_value(request_id, Primitive::Int(1)));
    assert_eq!(interp.state(), ExecutionState::Paused);
    assert!(interp.resume());
    assert_eq!(interp.run_until_blocked(), ExecutionState::Complete);
    assert!(kinds(interp.commands()).contains(&CommandKind::DigitalWrite { pin: 13, value: 1 }));
}

#[test]
fn test_static_local_persists() {
    let source = r#"
        int counter() {
            static int c = 0;
            c++;
            return c;
        }
        int fresh() {
            int c = 0;
            c++;
            return c;
        }
        void loop() {
            Serial.println(counter());
            Serial.println(fresh());
        }
    "#;
    let (_, commands) = run_to_end(source, 3);
    let lines: Vec<String> = commands
        .into_iter()
        .filter_map(|k| match k {
            CommandKind::SerialPrintln { text } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(lines, ["1", "1", "2", "1", "3", "1"]);
}

#[test]
fn test_iteration_cap_is_fatal() {
    let sketch = parse("void setup() { int n = 0; while (true) { n++; } }");
    let mut cfg = config(1);
    cfg.max_inner_iterations = Some(50);
    let mut interp = Interpreter::new(&sketch.program, cfg);
    interp.start();
    assert_eq!(interp.run_until_blocked(), ExecutionState::Error);

    match &interp.commands().last().expect("error command").kind {
        CommandKind::Error { kind, line, .. } => {
            assert_eq!(kind, "IterationCapExceeded");
            assert_eq!(*line, 1);
        }
        other => panic!("expected an error command, got {:?}", other),
    }
    let sets = kinds(interp.commands())
        .iter()
        .filter(|k| matches!(k, CommandKind::VarSet { name, .. } if name == "n"))
        .count();
    // One for the declaration, one per completed iteration
    assert_eq!(sets, 51);
}

#[test]
fn test_library_routing() {
    let source = r#"
        Servo arm;
        Adafruit_NeoPixel strip(16, 6, NEO_GRB);
        void setup() {
            arm.attach(9);
            int pos = arm.read();
            uint32_t red = strip.Color(255, 0, 0);
            strip.setPixelColor(0, red);
        }
    "#;
    let sketch = parse(source);
    let mut interp = Interpreter::new(&sketch.program, config(1)).with_macros(sketch.macros);
    let mut asked = Vec::new();
    let state = interp.run_with(|kind| {
        asked.push(kind.clone());
        Primitive::Int(90)
    });
    assert_eq!(state, ExecutionState::Complete);
    assert_eq!(
        asked,
        vec![RequestKind::LibraryMethod {
            class: "Servo".to_string(),
            object: "arm".to_string(),
            method: "read".to_string(),
            args: Vec::new(),
        }]
    );

    let commands = kinds(interp.commands());
    assert!(matches!(
        &commands[1],
        CommandKind::LibraryObjectCreated { class, name, args } if class == "Servo" && name == "arm" && args.is_empty()
    ));
    assert!(matches!(
        &commands[2],
        CommandKind::LibraryObjectCreated { name, args, .. } if name == "strip" && args.len() == 3
    ));
    assert!(commands.contains(&CommandKind::LibraryMethodCall {
        class: "Servo".to_string(),
        object: "arm".to_string(),
        method: "attach".to_string(),
        args: vec![Primitive::Int(9)],
    }));
    assert!(commands.contains(&CommandKind::VarSet {
        name: "pos".to_string(),
        value: Primitive::Int(90),
    }));
    assert!(commands.contains(&CommandKind::LibraryMethodCall {
        class: "Adafruit_NeoPixel".to_string(),
        object: "strip".to_string(),
        method: "setPixelColor".to_string(),
        args: vec![Primitive::Int(0), Primitive::Int(0xFF0000)],
    }));
}

#[test]
fn test_unrouted_method_is_error() {
    let (state, commands) = run_to_end("Servo arm; void setup() { arm.spin(); }", 1);
    assert_eq!(state, ExecutionState::Error);
    assert!(matches!(
        commands.last(),
        Some(CommandKind::Error { kind, .. }) if kind == "UnsupportedConstruct"
    ));
}

#[test]
fn test_context_serializes_mid_request() {
    let source = r#"
        struct Point { int x; int y; };
        Point origin = {1, 2};
        int readings[3];
        void loop() {
            for (int i = 0; i < 3; i++) {
                readings[i] = analogRead(A0 + i);
            }
        }
    "#;
    let sketch = parse(source);
    let mut interp = Interpreter::new(&sketch.program, config(1)).with_macros(sketch.macros);
    interp.start();
    interp.run_until_blocked();
    let pending = interp.pending_request().cloned().expect("pending request");
    interp.resume_with_value(pending.request_id, Primitive::Int(10));
    interp.run_until_blocked();

    let ctx = interp.context().expect("live context");
    let json = serde_json::to_string(ctx).expect("serialize context");
    let restored: ExecutionContext = serde_json::from_str(&json).expect("deserialize context");
    assert_eq!(&restored, ctx);
}

#[test]
fn test_decoded_ast_runs_identically() {
    let sketch = parse(BLINK);
    let bytes = codec::encode(&sketch.program);
    let decoded = codec::decode(&bytes).expect("Decoding failed");
    assert_eq!(decoded, sketch.program);

    let mut original = Interpreter::new(&sketch.program, config(2));
    original.start();
    original.run_until_blocked();
    let mut replayed = Interpreter::new(&decoded, config(2));
    replayed.start();
    replayed.run_until_blocked();
    assert_eq!(original.commands(), replayed.commands());
}

#[test]
fn test_listener_sees_every_command() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let sketch = parse(BLINK);
    let mut interp = Interpreter::new(&sketch.program, config(1));
    interp.add_listener(Box::new(move |command: &Command| sink.borrow_mut().push(command.clone())));
    interp.start();
    interp.run_until_blocked();

    assert_eq!(seen.borrow().as_slice(), interp.commands());
}
