// ABOUTME: Tests for the bundled library's derived forms and utilities

use parenvm::{Context, Logger, Val};
use pretty_assertions::assert_eq;

fn setup() -> Context {
    Context::new(true, Logger::quiet()).expect("context with stdlib")
}

fn eval(ctx: &Context, src: &str) -> Val {
    ctx.compile_and_execute(src)
        .unwrap_or_else(|e| panic!("evaluating {:?}: {}", src, e))
        .pop()
        .expect("at least one expression")
        .value
}

fn eval_str(ctx: &Context, src: &str) -> String {
    eval(ctx, src).to_string()
}

#[test]
fn test_define_variable_and_function() {
    let ctx = setup();
    eval(&ctx, "(define x 42)");
    assert_eq!(eval_str(&ctx, "x"), "42");

    eval(&ctx, "(define (square n) (* n n))");
    assert_eq!(eval_str(&ctx, "(square 7)"), "49");
    // Named through define, so the closure prints with its name.
    assert_eq!(eval_str(&ctx, "square"), "[Closure/square]");
}

#[test]
fn test_define_with_rest_parameter() {
    let ctx = setup();
    eval(&ctx, "(define (tail x . more) more)");
    assert_eq!(eval_str(&ctx, "(tail 1 2 3)"), "(2 3)");
}

#[test]
fn test_let_binds_in_parallel() {
    let ctx = setup();
    assert_eq!(eval_str(&ctx, "(let ((a 1) (b 2)) (+ a b))"), "3");
    // Bindings see the outer scope, not each other.
    eval(&ctx, "(define a 10)");
    assert_eq!(eval_str(&ctx, "(let ((a 1) (b a)) b)"), "10");
}

#[test]
fn test_when_and_unless() {
    let ctx = setup();
    assert_eq!(eval_str(&ctx, "(when #t 1 2 3)"), "3");
    assert_eq!(eval_str(&ctx, "(when #f 1 2 3)"), "()");
    assert_eq!(eval_str(&ctx, "(unless #f 'ran)"), "ran");
    assert_eq!(eval_str(&ctx, "(unless #t 'ran)"), "()");
}

#[test]
fn test_cond_picks_first_truthy_clause() {
    let ctx = setup();
    eval(&ctx, "(define (classify n) (cond ((< n 0) 'neg) ((= n 0) 'zero) (#t 'pos)))");
    assert_eq!(eval_str(&ctx, "(classify -5)"), "neg");
    assert_eq!(eval_str(&ctx, "(classify 0)"), "zero");
    assert_eq!(eval_str(&ctx, "(classify 9)"), "pos");
    assert_eq!(eval_str(&ctx, "(cond)"), "()");
}

#[test]
fn test_and_short_circuits() {
    let ctx = setup();
    assert_eq!(eval_str(&ctx, "(and)"), "#t");
    assert_eq!(eval_str(&ctx, "(and 1 2 3)"), "3");
    assert_eq!(eval_str(&ctx, "(and 1 #f 3)"), "#f");
    // The failing operand stops evaluation.
    eval(&ctx, "(define hits 0)");
    eval(&ctx, "(and #f (set! hits (+ hits 1)))");
    assert_eq!(eval_str(&ctx, "hits"), "0");
}

#[test]
fn test_or_returns_first_truthy_value() {
    let ctx = setup();
    assert_eq!(eval_str(&ctx, "(or)"), "()");
    assert_eq!(eval_str(&ctx, "(or #f 7 9)"), "7");
    assert_eq!(eval_str(&ctx, "(or #f #f)"), "#f");
    eval(&ctx, "(define hits 0)");
    eval(&ctx, "(or 1 (set! hits (+ hits 1)))");
    assert_eq!(eval_str(&ctx, "hits"), "0");
}

#[test]
fn test_list_utilities() {
    let ctx = setup();
    assert_eq!(eval_str(&ctx, "(second '(1 2 3))"), "2");
    assert_eq!(eval_str(&ctx, "(third '(1 2 3))"), "3");
    assert_eq!(eval_str(&ctx, "(nth 0 '(a b c))"), "a");
    assert_eq!(eval_str(&ctx, "(nth 2 '(a b c))"), "c");
    assert_eq!(eval_str(&ctx, "(nth 9 '(a b c))"), "()");
    assert_eq!(eval_str(&ctx, "(last '(1 2 3))"), "3");
    assert_eq!(eval_str(&ctx, "(member 2 '(1 2 3))"), "(2 3)");
    assert_eq!(eval_str(&ctx, "(member 9 '(1 2 3))"), "()");
}

#[test]
fn test_map_filter_reduce() {
    let ctx = setup();
    assert_eq!(eval_str(&ctx, "(map first '((1 2) (3 4)))"), "(1 3)");
    assert_eq!(
        eval_str(&ctx, "(filter (lambda (x) (= (% x 2) 0)) '(1 2 3 4 5 6))"),
        "(2 4 6)"
    );
    assert_eq!(eval_str(&ctx, "(reduce + 0 '(1 2 3 4))"), "10");
    assert_eq!(eval_str(&ctx, "(reduce * 1 '(1 2 3 4))"), "24");
}

#[test]
fn test_stdlib_macros_visible_from_user_packages() {
    let ctx = setup();
    eval(&ctx, "(make-package \"app\")");
    eval(&ctx, "(in-package \"app\")");
    eval(&ctx, "(define (double n) (* 2 n))");
    assert_eq!(eval_str(&ctx, "(double 21)"), "42");
    assert_eq!(eval_str(&ctx, "(let ((v 5)) (when (> v 1) (* v v)))"), "25");
}

#[test]
fn test_macros_compose_with_user_macros() {
    let ctx = setup();
    eval(
        &ctx,
        "(defmacro swap! (a b) `(let ((tmp ,a)) (set! ,a ,b) (set! ,b tmp)))",
    );
    eval(&ctx, "(define x 1)");
    eval(&ctx, "(define y 2)");
    eval(&ctx, "(swap! x y)");
    assert_eq!(eval_str(&ctx, "(list x y)"), "(2 1)");
}
