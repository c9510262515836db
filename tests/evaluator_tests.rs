use lento::error::{ErrorCode, ErrorKind, LentoError};
use lento::runner::{interpret, Session};
use lento::value::Value;
use pretty_assertions::assert_eq;
use std::rc::Rc;

fn eval(source: &str) -> Value {
    match interpret(source) {
        Ok(value) => value,
        Err(error) => panic!("unexpected error in {:?}: {}", source, error),
    }
}

fn eval_err(source: &str) -> LentoError {
    match interpret(source) {
        Ok(value) => panic!("expected {:?} to fail, got {}", source, value),
        Err(error) => error,
    }
}

fn num(n: f64) -> Value {
    Value::Number(n)
}

fn nums(values: &[f64]) -> Value {
    Value::array(values.iter().copied().map(Value::Number).collect())
}

// ----------------------------------------------------------------------
// Precedence and associativity
// ----------------------------------------------------------------------

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(eval("2 + 3 * 4;"), num(14.0));
    assert_eq!(eval("(2 + 3) * 4;"), num(20.0));
    assert_eq!(eval("1 + 10 % 4 * 2;"), num(5.0));
}

#[test]
fn subtraction_is_left_associative() {
    assert_eq!(eval("10 - 3 - 2;"), num(5.0));
    assert_eq!(eval("100 / 10 / 5;"), num(2.0));
}

#[test]
fn assignment_is_right_associative() {
    assert_eq!(eval("var x; var y; x = y = 5; [x, y];"), nums(&[5.0, 5.0]));
}

#[test]
fn unary_binds_tighter_than_binary() {
    assert_eq!(eval("-2 * 3;"), num(-6.0));
    // (not false) and false
    assert_eq!(eval("not false and false;"), Value::Boolean(false));
}

// ----------------------------------------------------------------------
// Scoping
// ----------------------------------------------------------------------

#[test]
fn block_declarations_do_not_escape() {
    let error = eval_err("var x = 1; { var y = 2; } y;");
    assert_eq!(error.code, ErrorCode::UndefinedVariable);
    assert_eq!(error.message, "Cannot resolve variable 'y'");
}

#[test]
fn nested_block_assignment_mutates_outer_binding() {
    assert_eq!(eval("var x = 1; { x = 2; } x;"), num(2.0));
    assert_eq!(eval("var x = 1; { { x = x + 10; } } x;"), num(11.0));
}

#[test]
fn redeclaration_in_nested_block_shadows() {
    assert_eq!(eval("var x = 1; { var x = 2; x = 3; } x;"), num(1.0));
}

#[test]
fn for_loop_variable_is_scoped_to_the_loop() {
    let error = eval_err("for (var i = 0; i < 3; i++) { } i;");
    assert_eq!(error.code, ErrorCode::UndefinedVariable);
}

#[test]
fn natives_can_be_shadowed_in_inner_scopes() {
    assert_eq!(eval("{ var len = 3; len; }"), num(3.0));
    assert_eq!(eval("{ var len = 3; } len(\"ab\");"), num(2.0));
}

// ----------------------------------------------------------------------
// Closures
// ----------------------------------------------------------------------

#[test]
fn closures_retain_parameters_after_return() {
    let source = "
        fn make(n) {
            fn get() { return n; }
            return get;
        }
        var a = make(1);
        var b = make(2);
        [a(), b(), a()];
    ";
    assert_eq!(eval(source), nums(&[1.0, 2.0, 1.0]));
}

#[test]
fn functions_declared_in_a_loop_share_their_body() {
    let source = "
        var made = [];
        for (var i = 0; i < 3; i++) {
            fn step() { return i; }
            push(made, step);
        }
        made;
    ";
    let made = match eval(source) {
        Value::Array(elements) => {
            let items = elements.borrow().clone();
            items
        }
        other => panic!("expected an array, got {}", other),
    };
    let functions: Vec<_> = made
        .iter()
        .map(|value| match value {
            Value::Function(function) => function.clone(),
            other => panic!("expected a function, got {}", other),
        })
        .collect();

    assert_eq!(functions.len(), 3);
    assert!(Rc::ptr_eq(&functions[0].body, &functions[2].body));
    assert!(!Rc::ptr_eq(&functions[0], &functions[1]));
    assert!(!Rc::ptr_eq(&functions[0].closure, &functions[1].closure));
}

#[test]
fn closures_from_separate_calls_do_not_share_state() {
    let source = "
        fn counter() {
            var count = 0;
            fn next() { count += 1; return count; }
            return next;
        }
        var a = counter();
        var b = counter();
        a(); a(); b();
        [a(), b()];
    ";
    assert_eq!(eval(source), nums(&[3.0, 2.0]));
}

#[test]
fn functions_recurse_through_their_declaring_scope() {
    let source = "
        fn fib(n) {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        fib(15);
    ";
    assert_eq!(eval(source), num(610.0));
}

#[test]
fn function_body_value_is_implicit_result() {
    assert_eq!(eval("fn f() { 42; } f();"), num(42.0));
    assert_eq!(eval("fn f() { return; } f();"), Value::Nil);
}

// ----------------------------------------------------------------------
// Control flow
// ----------------------------------------------------------------------

#[test]
fn break_leaves_only_the_nearest_loop() {
    let source = "
        var log = [];
        var i = 0;
        while (i < 3) {
            var j = 0;
            while (true) {
                if (j == 2) { break; }
                j++;
            }
            push(log, j);
            i++;
        }
        log;
    ";
    assert_eq!(eval(source), nums(&[2.0, 2.0, 2.0]));
}

#[test]
fn return_inside_loop_ends_the_whole_call() {
    let source = "
        var after = 0;
        fn f() {
            var i = 0;
            while (true) {
                i++;
                if (i == 5) { return i * 10; }
            }
            after = 1;
            return -1;
        }
        [f(), after];
    ";
    assert_eq!(eval(source), nums(&[50.0, 0.0]));
}

#[test]
fn continue_in_for_still_runs_the_increment() {
    let source = "
        var sum = 0;
        for (var i = 0; i < 5; i++) {
            if (i % 2 == 0) { continue; }
            sum += i;
        }
        sum;
    ";
    assert_eq!(eval(source), num(4.0));
}

#[test]
fn continue_in_while_rechecks_the_condition() {
    let source = "
        var i = 0;
        var sum = 0;
        while (i < 5) {
            i++;
            if (i == 3) { continue; }
            sum += i;
        }
        sum;
    ";
    assert_eq!(eval(source), num(12.0));
}

#[test]
fn jump_statements_outside_their_context_are_errors() {
    assert_eq!(eval_err("break;").code, ErrorCode::IllegalStatement);
    assert_eq!(eval_err("continue;").code, ErrorCode::IllegalStatement);
    assert_eq!(eval_err("return 1;").code, ErrorCode::IllegalStatement);
    // A function body is not inside the caller's loop
    assert_eq!(
        eval_err("fn f() { break; } while (true) { f(); }").code,
        ErrorCode::IllegalStatement
    );
}

#[test]
fn only_nil_and_false_are_falsy() {
    assert_eq!(eval("var r = 0; if (0) { r = 1; } r;"), num(1.0));
    assert_eq!(eval("var r = 0; if (\"\") { r = 1; } r;"), num(1.0));
    assert_eq!(eval("var r = 0; if (nil) { r = 1; } else { r = 2; } r;"), num(2.0));
    assert_eq!(eval("var r = 0; if false { r = 1; } r;"), num(0.0));
}

#[test]
fn logical_operators_evaluate_both_sides() {
    let source = "
        var calls = 0;
        fn bump() { calls++; return true; }
        false and bump();
        true or bump();
        calls;
    ";
    assert_eq!(eval(source), num(2.0));
    assert_eq!(eval("1 and \"x\";"), Value::Boolean(true));
    assert_eq!(eval("nil or false;"), Value::Boolean(false));
}

// ----------------------------------------------------------------------
// Bindings
// ----------------------------------------------------------------------

#[test]
fn constants_cannot_be_reassigned() {
    let mut session = Session::new();
    session.eval("const x = 1;").expect("declaration succeeds");

    let error = session.eval("x = 2;").expect_err("reassignment fails");
    assert_eq!(error.code, ErrorCode::ConstantReassignment);
    assert_eq!(error.message, "Cannot reassign constant 'x'");

    assert_eq!(session.eval("x;").ok(), Some(num(1.0)));
}

#[test]
fn functions_are_constant_bindings() {
    assert_eq!(
        eval_err("fn f() { } f = 1;").code,
        ErrorCode::ConstantReassignment
    );
}

#[test]
fn first_redeclaration_is_the_only_reported_error() {
    let error = eval_err("var a = 1;\nvar a = 2;\nvar a = 3;\nvar a = 4;");
    assert_eq!(error.code, ErrorCode::Redeclaration);
    assert_eq!(error.line(), 2);
}

#[test]
fn natives_and_literals_are_protected() {
    assert_eq!(eval_err("print = 1;").code, ErrorCode::NativeReassignment);
    assert_eq!(eval_err("true = false;").code, ErrorCode::NativeReassignment);
    assert_eq!(eval_err("var len = 1;").code, ErrorCode::Redeclaration);
}

// ----------------------------------------------------------------------
// Arrays and objects
// ----------------------------------------------------------------------

#[test]
fn arrays_are_shared_by_reference() {
    assert_eq!(eval("var a = [1, 2]; var b = a; b[0] = 99; a[0];"), num(99.0));
    assert_eq!(eval("var a = [1, 2]; var b = [1, 2]; b[0] = 99; a[0];"), num(1.0));
    assert_eq!(eval("var a = []; fn add(xs) { push(xs, 7); } add(a); a;"), nums(&[7.0]));
}

#[test]
fn objects_are_shared_by_reference() {
    assert_eq!(eval("var a = { n: 1 }; var b = a; b.n = 5; a.n;"), num(5.0));
}

#[test]
fn array_indexing_is_range_checked() {
    assert_eq!(eval("[10, 20, 30][2];"), num(30.0));
    assert_eq!(eval_err("[1, 2][2];").code, ErrorCode::ArrayIndex);
    assert_eq!(eval_err("[1, 2][-1];").code, ErrorCode::ArrayIndex);
    assert_eq!(eval_err("[1, 2][0.5];").code, ErrorCode::ArrayIndex);
    assert_eq!(eval_err("[1, 2][\"0\"];").code, ErrorCode::ArrayIndex);
    assert_eq!(eval_err("var a = [1]; a[3] = 1;").code, ErrorCode::ArrayIndex);
}

#[test]
fn absent_object_keys_read_as_nil() {
    assert_eq!(eval("var o = { name: \"x\" }; o.missing;"), Value::Nil);
    assert_eq!(eval("var o = {}; o[\"missing\"];"), Value::Nil);
}

#[test]
fn writing_an_absent_key_creates_it() {
    assert_eq!(eval("var o = {}; o.age = 3; o[\"age\"];"), num(3.0));
    assert_eq!(eval("var o = { \"a b\": 1 }; o[\"a b\"] += 1; o[\"a b\"];"), num(2.0));
}

#[test]
fn object_keys_must_be_strings() {
    assert_eq!(eval_err("var o = {}; o[1];").code, ErrorCode::ObjectKey);
    assert_eq!(eval_err("var o = {}; o[1] = 2;").code, ErrorCode::ObjectKey);
}

#[test]
fn member_access_needs_an_object() {
    assert_eq!(eval_err("var n = 1; n.x;").code, ErrorCode::TypeMismatch);
}

// ----------------------------------------------------------------------
// Operators
// ----------------------------------------------------------------------

#[test]
fn division_and_modulo_by_zero_are_runtime_errors() {
    let error = eval_err("1 / 0;");
    assert_eq!(error.code, ErrorCode::DivisionByZero);
    assert_eq!(error.kind, ErrorKind::Runtime);
    assert_eq!(error.exit_code(), 70);

    assert_eq!(eval_err("5 % 0;").code, ErrorCode::DivisionByZero);
    assert_eq!(eval("7 % 3;"), num(1.0));
    assert_eq!(eval("7 / 2;"), num(3.5));
}

#[test]
fn mismatched_operands_are_type_errors() {
    assert_eq!(eval_err("1 + \"a\";").code, ErrorCode::TypeMismatch);
    assert_eq!(eval_err("\"a\" * 2;").code, ErrorCode::TypeMismatch);
    assert_eq!(eval_err("[1] < [2];").code, ErrorCode::TypeMismatch);
    assert_eq!(eval_err("-\"a\";").code, ErrorCode::TypeMismatch);
    assert_eq!(eval_err("not 1;").code, ErrorCode::TypeMismatch);
}

#[test]
fn strings_concatenate_and_compare() {
    assert_eq!(eval("\"ab\" + \"cd\";"), Value::string("abcd"));
    assert_eq!(eval("\"apple\" < \"banana\";"), Value::Boolean(true));
    assert_eq!(eval("\"a\" == \"a\";"), Value::Boolean(true));
}

#[test]
fn equality_across_types_is_a_type_error() {
    for source in ["1 == \"1\";", "nil != false;", "[1] == { a: 1 };", "fn f() { } f == print;"] {
        let error = eval_err(source);
        assert_eq!(error.code, ErrorCode::TypeMismatch, "{}", source);
        assert_eq!(error.kind, ErrorKind::Runtime);
    }
}

#[test]
fn equality_within_a_type_is_structural() {
    assert_eq!(eval("[1, [2]] == [1, [2]];"), Value::Boolean(true));
    assert_eq!(eval("{ a: 1 } != { a: 2 };"), Value::Boolean(true));
    assert_eq!(eval("nil == nil;"), Value::Boolean(true));
    assert_eq!(eval("\"a\" != \"a\";"), Value::Boolean(false));
}

#[test]
fn bang_is_not() {
    assert_eq!(eval("!true;"), Value::Boolean(false));
    assert_eq!(eval("!(1 > 2);"), Value::Boolean(true));
}

#[test]
fn compound_assignment_updates_every_target_kind() {
    assert_eq!(eval("var x = 10; x -= 3; x *= 2; x /= 7; x;"), num(2.0));
    assert_eq!(eval("var a = [1]; a[0] += 5; a[0];"), num(6.0));
    assert_eq!(eval("var s = \"a\"; s += \"b\"; s;"), Value::string("ab"));
}

#[test]
fn postfix_yields_the_previous_value() {
    assert_eq!(eval("var x = 5; var y = x++; [x, y];"), nums(&[6.0, 5.0]));
    assert_eq!(eval("var o = { n: 1 }; o.n--; o.n;"), num(0.0));
    assert_eq!(eval_err("var s = \"a\"; s++;").code, ErrorCode::TypeMismatch);
}

// ----------------------------------------------------------------------
// Calls
// ----------------------------------------------------------------------

#[test]
fn argument_count_must_match() {
    let error = eval_err("fn f(a) { return a; } f(1, 2);");
    assert_eq!(error.code, ErrorCode::ArgumentCount);
}

#[test]
fn calling_a_non_function_is_an_error() {
    assert_eq!(eval_err("var x = 1; x();").code, ErrorCode::NotCallable);
}

#[test]
fn arguments_are_evaluated_left_to_right() {
    let source = "
        var order = [];
        fn note(n) { push(order, n); return n; }
        fn three(a, b, c) { return a + b + c; }
        three(note(1), note(2), note(3));
        order;
    ";
    assert_eq!(eval(source), nums(&[1.0, 2.0, 3.0]));
}

#[test]
fn runaway_recursion_reports_stack_overflow() {
    // The interpreter recurses on the host stack; give it room.
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| eval_err("fn f() { return f(); } f();").code)
        .expect("spawn evaluation thread");
    assert_eq!(handle.join().expect("evaluation thread"), ErrorCode::StackOverflow);
}

// ----------------------------------------------------------------------
// Natives
// ----------------------------------------------------------------------

#[test]
fn native_catalogue() {
    assert_eq!(eval("len(\"héllo\");"), num(5.0));
    assert_eq!(eval("len([1, 2, 3]);"), num(3.0));
    assert_eq!(eval("len({ a: 1 });"), num(1.0));
    assert_eq!(eval("toUpper(\"abc\");"), Value::string("ABC"));
    assert_eq!(eval("toLower(\"ABC\");"), Value::string("abc"));
    assert_eq!(eval("str(12) + \"!\";"), Value::string("12!"));
    assert_eq!(eval("num(\"3.5\") + 1;"), num(4.5));
    assert_eq!(eval("type([]);"), Value::string("array"));
    assert_eq!(eval("type(print);"), Value::string("native_function"));
    assert_eq!(eval("var a = []; push(a, 1); push(a, 2); len(a);"), num(2.0));
    assert_eq!(eval("print(\"from test\", 1);"), Value::Nil);
}

#[test]
fn native_failures_are_runtime_errors() {
    assert_eq!(eval_err("num(\"abc\");").code, ErrorCode::NativeFunction);
    assert_eq!(eval_err("len(1);").code, ErrorCode::NativeFunction);
    assert_eq!(eval_err("len(1, 2);").code, ErrorCode::ArgumentCount);
    assert_eq!(eval_err("push(1, 2);").code, ErrorCode::NativeFunction);
}

// ----------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------

#[test]
fn values_render_for_display() {
    assert_eq!(eval("[1, \"a\", { k: 2.5 }];").to_string(), "[1, \"a\", { k: 2.5 }]");
    assert_eq!(eval("\"raw\";").to_string(), "raw");
    assert_eq!(eval("{ }").to_string(), "nil");
    assert_eq!(eval("var o = {}; o;").to_string(), "{}");
    assert_eq!(eval("fn f() { } f;").to_string(), "<fn f>");
    assert_eq!(eval("print;").to_string(), "<native fn print>");
    assert_eq!(eval("10 / 4;").to_string(), "2.5");
}

#[test]
fn self_referencing_containers_render_once() {
    assert_eq!(eval("var a = [1]; a[0] = a; str(a);"), Value::string("[[...]]"));
    assert_eq!(eval("var a = [1, 2]; push(a, a); a;").to_string(), "[1, 2, [...]]");
    assert_eq!(eval("var o = { n: 1 }; o.me = o; str(o);"), Value::string("{ n: 1, me: {...} }"));
}

#[test]
fn shared_but_acyclic_containers_render_in_full() {
    assert_eq!(eval("var a = [1]; [a, a];").to_string(), "[[1], [1]]");
}

#[test]
fn self_referencing_containers_compare_without_looping() {
    assert_eq!(eval("var a = [1]; a[0] = a; var b = [1]; b[0] = b; a == b;"), Value::Boolean(true));
    assert_eq!(eval("var a = [1]; a[0] = a; a == a;"), Value::Boolean(true));
    assert_eq!(eval("var o = {}; o.me = o; var p = {}; p.me = p; o == p;"), Value::Boolean(true));
    assert_eq!(eval("var a = [1]; push(a, a); var b = [2]; push(b, b); a == b;"), Value::Boolean(false));
}

// ----------------------------------------------------------------------
// Error sink behaviour
// ----------------------------------------------------------------------

#[test]
fn runtime_error_stops_the_remaining_statements() {
    let mut session = Session::new();
    let error = session
        .eval("var a = 1; 1 / 0; a = 2;")
        .expect_err("division fails");
    assert_eq!(error.code, ErrorCode::DivisionByZero);
    assert_eq!(session.eval("a;").ok(), Some(num(1.0)));
}

#[test]
fn session_recovers_after_a_bad_line() {
    let mut session = Session::new();
    session.eval("var total = 1;").expect("declaration succeeds");

    assert!(session.eval("total +;").is_err());
    assert!(session.eval("missing;").is_err());

    assert_eq!(session.eval("total + 1;").ok(), Some(num(2.0)));
}

#[test]
fn session_declarations_live_in_its_global_frame() {
    let mut session = Session::new();
    session.eval("var kept = 3; { var scoped = 4; }").expect("declarations succeed");

    let frame = session.environment().borrow();
    assert!(frame.is_global());
    assert!(frame.has_own("kept"));
    assert!(!frame.has_own("scoped"));
}

#[test]
fn syntax_errors_prevent_evaluation() {
    let mut session = Session::new();
    let error = session.eval("var x = 1; x = ;").expect_err("syntax error");
    assert_eq!(error.kind, ErrorKind::Syntax);
    assert_eq!(error.exit_code(), 65);

    // Nothing from the rejected line ran
    assert_eq!(session.eval("x;").map(|_| ()).map_err(|e| e.code), Err(ErrorCode::UndefinedVariable));
}
