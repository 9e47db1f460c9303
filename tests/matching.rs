use std::collections::HashMap;

use arkconf::error::ArkError;
use arkconf::matcher::{Binding, NoStorage, match_obj};
use arkconf::obj::Obj;
use arkconf::parser::parse_value;

fn setup() -> HashMap<String, Obj> {
    let mut storage = HashMap::new();
    storage.insert("head".to_string(), parse_value("Head()").unwrap());
    storage.insert("str".to_string(), parse_value("String()").unwrap());
    storage.insert("sent1".to_string(), parse_value(r#"NGramSentence(n="1", noSpan="true")"#).unwrap());
    storage.insert("n".to_string(), Obj::plain("1"));
    storage
}

fn obj(text: &str) -> Obj {
    parse_value(text).unwrap_or_else(|e| panic!("{text} should parse: {e}"))
}

#[test]
fn every_term_matches_itself() {
    let storage = setup();
    for text in [
        "Head()",
        r#""plain""#,
        "${head}",
        "[n]",
        r#"["a", "b"]"#,
        "[]",
        r#"NGramInside(n="2", noHead="true")"#,
        "Positional(a, b)",
        "(${str} o ${head} o ${sent1})",
        "(A(n=[n])) -> (A(n=${n++}))",
        r#"Vocab(x="1") { array vocabulary=["a"]; }"#,
        "Pair(a=[x], b=[x])",
    ] {
        let x = obj(text);
        let binding = match_obj(&x, &x, &storage).expect("no unresolved references");
        assert!(binding.is_match(), "{text} should match itself");
        assert_eq!(binding.whole(), Some(&x), "whole binding of {text}");
    }
}

#[test]
fn no_match_is_an_empty_binding() {
    let binding = match_obj(&obj(r#"A(n="1")"#), &obj(r#"A(n="2")"#), &NoStorage).unwrap();
    assert!(binding.is_empty());
    assert!(!binding.is_match());
    assert_eq!(binding.whole(), None);
}

#[test]
fn a_match_without_captures_binds_only_the_whole() {
    let candidate = obj(r#"A(n="1")"#);
    let binding = match_obj(&obj("A(n=1)"), &candidate, &NoStorage).unwrap();
    assert_eq!(binding.len(), 1);
    assert_eq!(binding.get(Binding::WHOLE), Some(&candidate));
}

#[test]
fn captures_bind_the_matched_subterm() {
    let candidate = obj(r#"NGram(n="3", noSpan="true", extra=E())"#);
    let binding = match_obj(&obj("NGram(n=[n], noSpan=true)"), &candidate, &NoStorage).unwrap();
    assert_eq!(binding.get("n"), Some(&Obj::plain("3")));
    assert_eq!(binding.whole(), Some(&candidate));

    let binding = match_obj(&obj("NGram(extra=[e])"), &candidate, &NoStorage).unwrap();
    assert_eq!(binding.get("e"), Some(&obj("E()")));
}

#[test]
fn a_capture_bound_twice_must_agree() {
    let pattern = obj("Pair(a=[x], b=[x])");
    assert!(match_obj(&pattern, &obj("Pair(a=1, b=1)"), &NoStorage).unwrap().is_match());
    assert!(!match_obj(&pattern, &obj("Pair(a=1, b=2)"), &NoStorage).unwrap().is_match());
}

#[test]
fn assignment_lists() {
    let cases = [
        ("Filter()", "Filter(type=SUBSTRING, filter=x)", true),
        ("Filter(type=SUBSTRING)", "Filter(filter=x, type=SUBSTRING)", true),
        ("Filter(type=SUBSTRING, filter=x)", "Filter(type=SUBSTRING)", false),
        ("Filter(kind=SUBSTRING)", "Filter(type=SUBSTRING)", false),
        ("A(x)", "A(n=x)", false),
        ("A(x)", "A(x, y)", true),
        ("A(y)", "A(x, y)", false),
        ("A()", "B()", false),
        ("A()", r#""A""#, false),
    ];
    for (pattern, candidate, expected) in cases {
        let binding = match_obj(&obj(pattern), &obj(candidate), &NoStorage).unwrap();
        assert_eq!(binding.is_match(), expected, "{pattern} against {candidate}");
    }
}

#[test]
fn arrays() {
    let cases = [
        ("[a, b]", "[a, b]", true),
        ("[a, b]", "[a, b, c]", false),
        ("[a, b, c]", "[a, b]", false),
        ("[b, a]", "[a, b]", false),
        ("[[x], b]", "[a, b, c]", true),
        ("[[x], b, c, d]", "[a, b, c]", false),
        ("[]", "[]", true),
    ];
    for (pattern, candidate, expected) in cases {
        let binding = match_obj(&obj(pattern), &obj(candidate), &NoStorage).unwrap();
        assert_eq!(binding.is_match(), expected, "{pattern} against {candidate}");
    }
    let binding = match_obj(&obj("[[x], b]"), &obj("[a, b, c]"), &NoStorage).unwrap();
    assert_eq!(binding.get("x"), Some(&Obj::plain("a")));
}

#[test]
fn references_in_the_pattern_resolve_through_storage() {
    let storage = setup();
    let binding = match_obj(&obj("F(fn=${head})"), &obj("F(fn=Head())"), &storage).unwrap();
    assert!(binding.is_match());
    assert_eq!(binding.get("head"), Some(&obj("Head()")));

    let binding = match_obj(&obj("F(fn=${head})"), &obj("F(fn=Tail())"), &storage).unwrap();
    assert!(!binding.is_match());

    let binding = match_obj(&obj("F(n=${n})"), &obj("F(n=1)"), &storage).unwrap();
    assert!(binding.is_match());
}

#[test]
fn unresolved_pattern_references_are_errors() {
    let result = match_obj(&obj("F(fn=${missing})"), &obj("F(fn=Head())"), &NoStorage);
    assert_eq!(result, Err(ArkError::Unresolved("missing".to_string())));
}

#[test]
fn a_reference_matches_the_same_reference_without_storage() {
    let binding = match_obj(&obj("F(fn=${a})"), &obj("F(fn=${a})"), &NoStorage).unwrap();
    assert!(binding.is_match());
    assert_eq!(binding.get("a"), Some(&obj("${a}")));
}

#[test]
fn references_in_the_candidate_are_followed() {
    let storage = setup();
    let pattern = obj("(Filter() o ${str} o NGramSentence(n=[n], noSpan=true))");
    let candidate = obj("(Filter() o ${str} o ${sent1})");
    let binding = match_obj(&pattern, &candidate, &storage).unwrap();
    assert!(binding.is_match());
    assert_eq!(binding.get("n"), Some(&Obj::plain("1")));
    assert_eq!(binding.get("str"), Some(&obj("${str}")));

    let binding = match_obj(&obj("F(fn=Head())"), &obj("F(fn=${nothing})"), &storage).unwrap();
    assert!(!binding.is_match(), "an unknown candidate reference simply does not match");
}

#[test]
fn rules_match_source_and_target() {
    let pattern = obj("(A(n=[n])) -> (B(m=[m]))");
    let binding = match_obj(&pattern, &obj("(A(n=1)) -> (B(m=2))"), &NoStorage).unwrap();
    assert_eq!(binding.get("n"), Some(&Obj::plain("1")));
    assert_eq!(binding.get("m"), Some(&Obj::plain("2")));
    assert!(!match_obj(&pattern, &obj("(A(n=1)) -> (C())"), &NoStorage).unwrap().is_match());
}

#[test]
fn union_keeps_what_is_already_bound() {
    let mut binding: Binding = [("n", Obj::plain("1"))].into_iter().collect();
    let extra: Binding = [("n", Obj::plain("9")), ("FEATURE_STR", Obj::plain("some"))]
        .into_iter()
        .collect();
    binding.union(&extra);
    assert_eq!(binding.get("n"), Some(&Obj::plain("1")));
    assert_eq!(binding.get("FEATURE_STR"), Some(&Obj::plain("some")));
    assert_eq!(binding.len(), 2);
}
