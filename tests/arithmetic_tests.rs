// Language semantics as seen through Serial output and error commands

use sketchrun::commands::{CommandKind, Primitive};
use sketchrun::config::Config;
use sketchrun::interpreter::{ExecutionState, Interpreter};
use sketchrun::parser::parse_sketch;

/// Run `setup()` of `source` and collect everything it printed with `println`.
fn printed(source: &str) -> Vec<String> {
    let (state, commands) = run(source);
    assert_eq!(state, ExecutionState::Complete, "run failed: {:?}", commands.last());
    commands
        .into_iter()
        .filter_map(|kind| match kind {
            CommandKind::SerialPrintln { text } => Some(text),
            _ => None,
        })
        .collect()
}

fn run(source: &str) -> (ExecutionState, Vec<CommandKind>) {
    let sketch = parse_sketch(source).expect("Parsing failed");
    let config = Config::default().with_max_loop_iterations(1);
    let mut interp = Interpreter::new(&sketch.program, config).with_macros(sketch.macros);
    let state = interp.run_with(|_| Primitive::Int(0));
    (state, interp.commands().iter().map(|c| c.kind.clone()).collect())
}

/// Kind name of the `Error` command a failing sketch ends with.
fn error_kind(source: &str) -> String {
    let (state, commands) = run(source);
    assert_eq!(state, ExecutionState::Error);
    match commands.last() {
        Some(CommandKind::Error { kind, .. }) => kind.clone(),
        other => panic!("expected an error command, got {:?}", other),
    }
}

#[test]
fn test_integer_arithmetic_and_wrapping() {
    let source = r#"
        void setup() {
            byte b = 250;
            b += 10;
            Serial.println(b);
            Serial.println(7 / 2);
            Serial.println(-7 / 2);
            Serial.println(-7 % 3);
            unsigned long u = 0;
            u--;
            Serial.println(u);
            int big = 2147483647;
            big++;
            Serial.println(big);
            char c = 'A';
            Serial.println(c + 1);
            Serial.println(1 << 4);
        }
    "#;
    assert_eq!(
        printed(source),
        ["4", "3", "-3", "-1", "4294967295", "-2147483648", "66", "16"]
    );
}

#[test]
fn test_floating_point_and_casts() {
    let source = r#"
        void setup() {
            float f = 10 / 4.0;
            Serial.println(f);
            Serial.println((int)3.99);
            Serial.println(3.14159, 3);
            double half = 1.0 / 2;
            Serial.println(half * 3);
            int n = 7.9;
            Serial.println(n);
        }
    "#;
    assert_eq!(printed(source), ["2.50", "3", "3.142", "1.50", "7"]);
}

#[test]
fn test_print_formats() {
    let source = r#"
        void setup() {
            Serial.println(255, HEX);
            Serial.println(8, OCT);
            Serial.println(5, BIN);
            Serial.println(-1, HEX);
            Serial.println('x');
            Serial.println(true);
            Serial.println();
        }
    "#;
    assert_eq!(printed(source), ["FF", "10", "101", "FFFFFFFF", "x", "1", ""]);
}

#[test]
fn test_math_builtins() {
    let source = r#"
        void setup() {
            Serial.println(map(512, 0, 1023, 0, 255));
            Serial.println(constrain(300, 0, 255));
            Serial.println(min(3, -4));
            Serial.println(max(3, -4));
            Serial.println(abs(-12));
            Serial.println(sq(9));
            Serial.println(round(2.5));
            Serial.println(sqrt(16));
            Serial.println(bitRead(6, 1));
            Serial.println(highByte(0x1234));
            Serial.println(lowByte(0x1234));
        }
    "#;
    assert_eq!(
        printed(source),
        ["127", "255", "-4", "3", "12", "81", "3", "4.00", "1", "18", "52"]
    );
}

#[test]
fn test_strings() {
    let source = r#"
        void setup() {
            String name = "robot";
            String label = "id=" + String(42);
            Serial.println(label);
            Serial.println(name.length());
            Serial.println(name.substring(1, 3));
            Serial.println(name.indexOf('b'));
            Serial.println(name.charAt(0));
            Serial.println(name.equals("robot"));
            Serial.println(String(255, HEX));
            String digits = "12abc";
            Serial.println(digits.toInt() + 1);
            char word[] = "hey";
            Serial.println(word);
            Serial.println(word[1]);
        }
    "#;
    assert_eq!(
        printed(source),
        ["id=42", "5", "ob", "2", "r", "1", "ff", "13", "hey", "e"]
    );
}

#[test]
fn test_pointers_and_structs() {
    let source = r#"
        struct Point { int x; int y; };
        int arr[5] = {1, 2, 3, 4, 5};

        void setup() {
            int *p = arr;
            p = p + 2;
            *p = 42;
            Serial.println(arr[2]);
            Serial.println(*(p - 1));
            int *q = &arr[4];
            Serial.println(q - p);

            Point pt = {3, 4};
            Point *pp = &pt;
            pp->x = 10;
            Serial.println(pt.x + pt.y);
            Serial.println(sizeof(arr));
            Serial.println(sizeof(Point));
        }
    "#;
    assert_eq!(printed(source), ["42", "2", "2", "14", "20", "8"]);
}

#[test]
fn test_functions_and_recursion() {
    let source = r#"
        int factorial(int n) {
            if (n <= 1) {
                return 1;
            }
            return n * factorial(n - 1);
        }

        void bump(int value) {
            value = value + 1;
        }

        float half(int n) {
            return n / 2.0;
        }

        void setup() {
            Serial.println(factorial(5));
            int x = 1;
            bump(x);
            Serial.println(x);
            Serial.println(half(3));
        }
    "#;
    assert_eq!(printed(source), ["120", "1", "1.50"]);
}

#[test]
fn test_control_flow() {
    let source = r#"
        int calls = 0;

        bool touch() {
            calls++;
            return true;
        }

        void setup() {
            for (int i = 0; i < 4; i++) {
                switch (i) {
                    case 0:
                        Serial.print("a");
                    case 1:
                        Serial.print("b");
                        break;
                    case 2:
                        Serial.print("c");
                        break;
                    default:
                        Serial.print("d");
                }
            }
            Serial.println();

            int sum = 0;
            for (int i = 0; i < 10; i++) {
                if (i % 2) {
                    continue;
                }
                if (i > 6) {
                    break;
                }
                sum += i;
            }
            Serial.println(sum);

            int n = 0;
            do {
                n++;
            } while (n < 3);
            Serial.println(n);

            if (false && touch()) {
                Serial.println("unreachable");
            }
            if (true || touch()) {
                Serial.println(calls);
            }
            Serial.println(n > 2 ? 100 : 200);
        }
    "#;
    assert_eq!(printed(source), ["", "12", "3", "0", "100"]);

    let (_, commands) = run(source);
    let letters: String = commands
        .iter()
        .filter_map(|kind| match kind {
            CommandKind::SerialPrint { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(letters, "abbcd");
}

#[test]
fn test_macros_and_constants() {
    let source = r#"
        #define LED 13
        #define RATE 9600
        #define GREETING "hello"
        const int limit = LED + 1;

        void setup() {
            Serial.begin(RATE);
            pinMode(LED, OUTPUT);
            Serial.println(GREETING);
            Serial.println(limit);
            Serial.println(A3);
        }
    "#;
    let (_, commands) = run(source);
    assert!(commands.contains(&CommandKind::SerialBegin { baud: 9600 }));
    assert!(commands.contains(&CommandKind::PinMode { pin: 13, mode: 1 }));
    assert_eq!(printed(source), ["hello", "14", "17"]);
}

#[test]
fn test_var_set_names_elements() {
    let source = r#"
        int leds[3];
        void setup() {
            leds[1] = 7;
        }
    "#;
    let (_, commands) = run(source);
    assert!(commands.contains(&CommandKind::VarSet {
        name: "leds[1]".to_string(),
        value: Primitive::Int(7),
    }));
}

#[test]
fn test_runtime_errors() {
    assert_eq!(
        error_kind("void setup() { int z = 0; int y = 10 / z; }"),
        "DivisionByZero"
    );
    assert_eq!(error_kind("void setup() { x = 1; }"), "UndefinedVariable");
    assert_eq!(error_kind("void setup() { launch(); }"), "UndefinedFunction");
    assert_eq!(
        error_kind("const int k = 1; void setup() { k = 2; }"),
        "ConstAssignment"
    );
    assert_eq!(
        error_kind("int a[3]; void setup() { a[3] = 1; }"),
        "ArrayIndexOutOfBounds"
    );
    assert_eq!(
        error_kind("void setup() { int *p = 0; *p = 1; }"),
        "NullDereference"
    );
    assert_eq!(
        error_kind("int f(int a) { return a; } void setup() { f(1, 2); }"),
        "ArgumentCountMismatch"
    );
    assert_eq!(
        error_kind("void setup() { int a = 1; int a = 2; }"),
        "DuplicateDeclaration"
    );
    assert_eq!(
        error_kind("struct P { int x; }; void setup() { P p; int n = p + 1; }"),
        "TypeMismatch"
    );
}

#[test]
fn test_error_is_last_command() {
    let (state, commands) = run("void setup() { Serial.println(1 / 0); } void loop() { delay(1); }");
    assert_eq!(state, ExecutionState::Error);
    assert!(matches!(
        commands.last(),
        Some(CommandKind::Error { kind, line: 1, .. }) if kind == "DivisionByZero"
    ));
    assert!(!commands.iter().any(|k| matches!(k, CommandKind::Delay { .. })));
    assert!(!commands.contains(&CommandKind::ProgramEnd));
}

#[test]
fn test_pointer_to_expired_local() {
    let source = r#"
        int *p;
        void keep() { int a = 5; p = &a; }
        void reuse() { int b = 9; Serial.println(*p); }
        void setup() { keep(); reuse(); }
    "#;
    assert_eq!(error_kind(source), "NullDereference");

    let live = r#"
        void set(int *q) { int other = 1; *q = 3 + other; }
        void setup() {
            int x = 0;
            set(&x);
            Serial.println(x);
        }
    "#;
    assert_eq!(printed(live), ["4"]);
}

#[test]
fn test_char_arrays_as_strings() {
    let source = r#"
        char buf[] = "hi";

        void show(String message) {
            Serial.println(message);
        }

        void setup() {
            String s = buf;
            Serial.println(s);
            s = s + buf;
            Serial.println(s);
            s += buf;
            Serial.println(s.length());
            String t = "<" + String(buf) + ">";
            Serial.println(t);
            show(buf);
            Serial.println(s == "hihihi");
        }
    "#;
    assert_eq!(printed(source), ["hi", "hihi", "6", "<hi>", "hi", "1"]);
}

#[test]
fn test_pointer_bounds_report_array_size() {
    for source in [
        "int arr[5]; void setup() { int *p = arr; p = p - 1; }",
        "int arr[5]; void setup() { int *p = &arr[2]; int v = p[-3]; }",
        "int arr[5]; void setup() { int *p = arr; p--; }",
    ] {
        let (state, commands) = run(source);
        assert_eq!(state, ExecutionState::Error);
        match commands.last() {
            Some(CommandKind::Error { kind, message, .. }) => {
                assert_eq!(kind, "ArrayIndexOutOfBounds");
                assert!(message.contains("Index -1 out of bounds for size 5"), "{}", message);
            }
            other => panic!("expected an error command, got {:?}", other),
        }
    }
}
