use std::sync::Arc;

use arkconf::component::{Factories, GenericComponent, ParamKind, Parameter};
use arkconf::context::{Context, Namespace};
use arkconf::error::{ArkError, CollectingSink};
use arkconf::obj::Obj;
use arkconf::parser::parse_value;

fn setup() -> (Context, Arc<CollectingSink>) {
    let mut factories = Factories::new();
    for name in ["Head", "NGramSentence", "NGramDocument"] {
        factories.register_generic(Namespace::TokenSpanFn, name);
    }
    factories.register_schema(
        Namespace::TokenSpanFn,
        "NGramInside",
        vec![
            Parameter::new("n", ParamKind::Value).with_default(Obj::plain("1")),
            Parameter::new("noHead", ParamKind::Value),
        ],
    );
    factories.register_generic(Namespace::StrFn, "Filter");
    factories.register_generic(Namespace::TokenSpanStrFn, "String");
    factories.register_generic(Namespace::Feature, "TokenSpanFnDataVocab");
    factories.register_generic(Namespace::Model, "TokenSpanFnDataVocab");
    factories.register_schema(
        Namespace::Feature,
        "Wrapped",
        vec![Parameter::new("fn", ParamKind::Entry(Namespace::TokenSpanFn))],
    );
    factories.register_schema(
        Namespace::Feature,
        "Bundle",
        vec![
            Parameter::new("fn", ParamKind::Entry(Namespace::TokenSpanFn)),
            Parameter::new("n", ParamKind::Value),
        ],
    );
    for kind in [ParamKind::Value, ParamKind::Array] {
        factories.register_schema(
            Namespace::Feature,
            "Pair",
            vec![
                Parameter::new("fn", ParamKind::Entry(Namespace::TokenSpanFn)),
                Parameter::new("n", kind),
            ],
        );
    }
    let sink = Arc::new(CollectingSink::new());
    let context = Context::with_sink(factories, sink.clone());
    context
        .deserialize(
            r#"
            ts_fn head=Head();
            ts_fn sent1=NGramSentence(n="1", noSpan="true");
            ts_str_fn str=String(cleanFn=DefaultCleanFn);
            str_fn filter=Filter();
            value two="2";
            array labels=["pos", "neg"];
            "#,
        )
        .expect("the base declarations are valid");
    (context, sink)
}

fn obj(text: &str) -> Obj {
    parse_value(text).unwrap_or_else(|e| panic!("{text} should parse: {e}"))
}

#[test]
fn structurally_equal_definitions_share_one_entry() {
    let (context, sink) = setup();
    let first = context
        .get_or_construct(Namespace::TokenSpanFn, &obj(r#"NGramInside(n="2", noHead="true")"#))
        .expect("constructed");
    let second = context
        .get_or_construct(Namespace::TokenSpanFn, &obj("NGramInside( n = 2 , noHead = true )"))
        .expect("reused");
    assert!(first.same(&second), "textually different but equal definitions dedup");
    let third = context
        .get_or_construct(Namespace::TokenSpanFn, &obj(r#"NGramInside(n="3", noHead="true")"#))
        .expect("constructed");
    assert!(!third.same(&first));
    assert_eq!(context.names(Namespace::TokenSpanFn), ["head", "sent1", "0", "1"]);
    assert!(sink.is_empty());
}

#[test]
fn inline_definitions_reuse_declared_entries() {
    let (context, _) = setup();
    let sentence = context
        .get_or_construct(Namespace::TokenSpanFn, &obj("NGramSentence(noSpan=true, n=1)"))
        .expect("reused");
    assert_eq!(sentence.name(), "sent1");

    context
        .deserialize(r#"feature f=TokenSpanFnDataVocab(fn=(${filter} o ${str} o NGramSentence(n="1", noSpan="true")));"#)
        .expect("feature constructed");
    assert_eq!(context.names(Namespace::TokenSpanFn), ["head", "sent1"]);
    assert_eq!(context.names(Namespace::TokenSpanStrFn), ["str", "1", "0"]);
    assert_eq!(
        context.get(Namespace::TokenSpanStrFn, "1").map(|handle| handle.to_obj()),
        Some(obj(r#"(${str} o NGramSentence(n="1", noSpan="true"))"#))
    );
}

#[test]
fn ambiguous_queries_are_reported() {
    let (context, sink) = setup();
    context
        .deserialize(r#"ts_fn a=NGramInside(n="2", noHead="true"); ts_fn b=NGramInside(n="3", noHead="true");"#)
        .expect("declared");
    let pattern = obj(r#"NGramInside(noHead="true")"#);
    match context.get_or_construct(Namespace::TokenSpanFn, &pattern) {
        Err(ArkError::Ambiguous { namespace, candidates }) => {
            assert_eq!(namespace, "ts_fn");
            assert_eq!(candidates, ["a", "b"]);
        }
        other => panic!("expected an ambiguity, got {other:?}"),
    }
    assert!(context.get_match(Namespace::TokenSpanFn, &pattern).is_err());
    assert_eq!(sink.len(), 2, "each failed call is reported once");
    assert!(sink.messages()[0].contains("Ambiguous match in ts_fn: a, b"));
    assert_eq!(context.names(Namespace::TokenSpanFn).len(), 4, "nothing was constructed");
}

#[test]
fn namespaces_are_isolated() {
    let (context, _) = setup();
    let definition = obj("TokenSpanFnDataVocab(scale=NORMALIZED_TFIDF, fn=${head})");
    let feature = context
        .construct_from_parse(Namespace::Feature, Some("f"), &definition)
        .expect("feature constructed");
    assert!(context.get(Namespace::Model, "f").is_none());
    assert!(context.get_match(Namespace::Model, &definition).expect("no error").is_none());
    let model = context
        .get_or_construct(Namespace::Model, &definition)
        .expect("model constructed");
    assert_eq!(model.namespace(), Namespace::Model);
    assert!(!model.same(&feature));
    assert_eq!(
        context.get_match(Namespace::Feature, &definition).expect("no error").map(|h| h.name().to_string()),
        Some("f".to_string())
    );
}

#[test]
fn anonymous_names_increase_and_are_never_reused() {
    let (context, sink) = setup();
    let first = context
        .construct_from_parse(Namespace::TokenSpanFn, None, &obj("Head()"))
        .expect("constructed");
    let second = context
        .construct_from_parse(Namespace::TokenSpanFn, None, &obj("Head()"))
        .expect("constructed");
    let (a, b): (u64, u64) = (first.name().parse().unwrap(), second.name().parse().unwrap());
    assert!(a < b, "{a} then {b}");
    assert!(!first.same(&second), "construct never dedups");

    let failed = context.construct_from_parse(Namespace::TokenSpanFn, None, &obj("Unknown()"));
    assert!(matches!(failed, Err(ArkError::Construction(_))));
    assert_eq!(sink.len(), 1);
    let third = context
        .construct_from_parse(Namespace::TokenSpanFn, None, &obj("Head()"))
        .expect("constructed");
    assert_eq!(third.name(), (b + 2).to_string(), "the failed attempt used up a name");
    assert_eq!(context.reference_counter(), b + 3);
}

#[test]
fn declarations_keep_their_order() {
    let (context, _) = setup();
    let order: Vec<(Namespace, String)> = context.declaration_order();
    assert_eq!(
        order,
        [
            (Namespace::TokenSpanFn, "head".to_string()),
            (Namespace::TokenSpanFn, "sent1".to_string()),
            (Namespace::TokenSpanStrFn, "str".to_string()),
            (Namespace::StrFn, "filter".to_string()),
            (Namespace::Value, "two".to_string()),
            (Namespace::Array, "labels".to_string()),
        ]
    );
    assert_eq!(context.len(), 6);
    assert_eq!(
        context.to_string(),
        concat!(
            "ts_fn head=Head();\n",
            "ts_fn sent1=NGramSentence(n=\"1\", noSpan=\"true\");\n",
            "ts_str_fn str=String(cleanFn=\"DefaultCleanFn\");\n",
            "str_fn filter=Filter();\n",
            "value two=\"2\";\n",
            "array labels=[\"pos\", \"neg\"];\n",
        )
    );
}

#[test]
fn duplicate_names_stop_deserialization() {
    let (context, sink) = setup();
    let result = context.deserialize("ts_fn a=Head(); ts_fn head=Head(); ts_fn c=Head();");
    assert!(matches!(result, Err(ArkError::DuplicateName { .. })));
    assert!(context.get(Namespace::TokenSpanFn, "a").is_some());
    assert!(context.get(Namespace::TokenSpanFn, "c").is_none(), "later declarations are not reached");
    assert_eq!(sink.len(), 1);
}

#[test]
fn a_failing_declaration_halts_the_rest() {
    let (context, _) = setup();
    let result = context.deserialize("ts_fn a=Head(); ts_fn b=Unknown(); ts_fn c=Head();");
    assert!(matches!(result, Err(ArkError::Construction(_))));
    assert_eq!(context.len(), 7);
    assert!(context.get(Namespace::TokenSpanFn, "c").is_none());
}

#[test]
fn shapes_are_checked_per_namespace() {
    let (context, sink) = setup();
    for text in [
        r#"feature f="x";"#,
        "array a=Head();",
        "value v=[a];",
        "rs r=Head();",
        "array a=[A()];",
        "unknown u=Head();",
        "h=Head();",
    ] {
        let result = context.deserialize(text);
        assert!(matches!(result, Err(ArkError::Structure(_))), "{text} gave {result:?}");
    }
    assert_eq!(sink.len(), 7);
    assert_eq!(context.len(), 6);
}

#[test]
fn references_are_direct_lookups() {
    let (context, _) = setup();
    let head = context
        .get_or_construct(Namespace::TokenSpanFn, &obj("${head}"))
        .expect("found");
    assert_eq!(head.name(), "head");
    assert_eq!(
        context.get_or_construct(Namespace::TokenSpanFn, &obj("${nothing}")).err(),
        Some(ArkError::Unresolved("nothing".to_string()))
    );
    assert!(
        context.get_or_construct(Namespace::StrFn, &obj("${head}")).is_err(),
        "a reference only looks in its own namespace"
    );
}

#[test]
fn composites_must_fit_their_namespace() {
    let (context, _) = setup();
    assert!(context.deserialize("ts_str_fn headStr=(${str} o ${head});").is_ok());
    assert!(context.deserialize("str_fn filtered=(${filter} o ${filter});").is_ok());
    assert!(matches!(
        context.deserialize("ts_fn bad=(${str} o ${head});"),
        Err(ArkError::Structure(_))
    ));
    assert!(matches!(
        context.deserialize("ts_str_fn bad=(${head} o ${str});"),
        Err(ArkError::Structure(_))
    ));
    assert_eq!(
        context.infer_fn_namespace(&obj("(${filter} o ${str} o NGramSentence(n=2))")),
        Ok(Namespace::TokenSpanStrFn)
    );
}

#[test]
fn schema_components_validate_and_default() {
    let (context, _) = setup();
    context
        .deserialize(r#"ts_fn i=NGramInside("3", "true"); ts_fn j=NGramInside(noHead=${two}); ts_fn k=NGramInside(n=${two}, noHead="false");"#)
        .expect("declared");
    let i = context.get(Namespace::TokenSpanFn, "i").unwrap();
    assert_eq!(i.to_obj(), obj(r#"NGramInside(n="3", noHead="true")"#));
    let j = context.get(Namespace::TokenSpanFn, "j").unwrap();
    assert_eq!(j.to_obj(), obj(r#"NGramInside(n="1", noHead=${two})"#));
    let k = context.get(Namespace::TokenSpanFn, "k").unwrap();
    let component = k
        .component()
        .and_then(|c| c.as_any().downcast_ref::<GenericComponent>())
        .expect("a generic component");
    assert_eq!(component.parameter("n").and_then(|p| p.text()), Some("2"));

    for text in [
        r#"ts_fn x=NGramInside(size="3");"#,
        r#"ts_fn x=NGramInside("1", "true", "extra");"#,
        "ts_fn x=NGramInside(n=[a, b]);",
        "ts_fn x=NGramInside(n=${missing});",
    ] {
        assert!(context.deserialize(text).is_err(), "{text} should be rejected");
    }
    assert!(context.get(Namespace::TokenSpanFn, "x").is_none());
}

#[test]
fn entry_parameters_resolve_in_their_namespace() {
    let (context, _) = setup();
    context
        .deserialize("feature w=Wrapped(fn=Head()); feature v=Wrapped(fn=${sent1});")
        .expect("declared");
    let w = context.get(Namespace::Feature, "w").unwrap();
    let component = w
        .component()
        .and_then(|c| c.as_any().downcast_ref::<GenericComponent>())
        .expect("a generic component");
    let handle = component.parameter("fn").and_then(|p| p.handle()).expect("an entry");
    assert_eq!(handle.name(), "head");
    assert!(context.deserialize("feature bad=Wrapped(fn=${filter});").is_err());
}

#[test]
fn a_failed_construction_keeps_none_of_its_nested_entries() {
    let (context, sink) = setup();
    let before = context.declaration_order();
    let result = context.construct_from_parse(
        Namespace::Feature,
        Some("f"),
        &obj(r#"Bundle(fn=NGramSentence(n="5"), n=${missing})"#),
    );
    assert!(matches!(&result, Err(ArkError::Unresolved(name)) if name == "missing"));
    assert_eq!(context.declaration_order(), before);
    assert_eq!(context.names(Namespace::TokenSpanFn), ["head", "sent1"]);
    assert!(!context.to_string().contains(r#"n="5""#));
    assert_eq!(sink.len(), 1);

    assert!(
        context
            .deserialize(r#"feature g=Bundle(fn=NGramDocument(n="3"), n=${missing});"#)
            .is_err()
    );
    assert_eq!(context.declaration_order(), before);

    context
        .deserialize(r#"feature g=Bundle(fn=NGramDocument(n="3"), n=${two});"#)
        .expect("declared once the value exists");
    assert_eq!(context.names(Namespace::TokenSpanFn).len(), 3);
    assert!(context.get(Namespace::Feature, "g").is_some());
}

#[test]
fn a_rejected_prototype_keeps_none_of_its_nested_entries() {
    let (context, _) = setup();
    context
        .deserialize(r#"feature p=Pair(fn=NGramDocument(n="4"), n=[a, b]);"#)
        .expect("the second shape accepts an array");
    let names = context.names(Namespace::TokenSpanFn);
    assert_eq!(names.len(), 3, "one NGramDocument entry, not one per attempt: {names:?}");
    let pair = context.get(Namespace::Feature, "p").unwrap();
    let component = pair
        .component()
        .and_then(|c| c.as_any().downcast_ref::<GenericComponent>())
        .expect("a generic component");
    let handle = component.parameter("fn").and_then(|p| p.handle()).expect("an entry");
    assert!(handle.same(&context.get(Namespace::TokenSpanFn, handle.name()).unwrap()));
}

#[test]
fn an_exact_match_wins_over_broader_ones() {
    let (context, sink) = setup();
    context
        .deserialize(r#"str_fn sub=Filter(type=SUBSTRING, filter="some");"#)
        .expect("declared");
    let plain = context
        .get_or_construct(Namespace::StrFn, &obj("Filter()"))
        .expect("the parameterless filter is an exact hit");
    assert_eq!(plain.name(), "filter");
    let narrowed = context
        .get_or_construct(Namespace::StrFn, &obj("Filter(type=SUBSTRING)"))
        .expect("only one entry has that type");
    assert_eq!(narrowed.name(), "sub");
    assert_eq!(context.names(Namespace::StrFn), ["filter", "sub"]);
    assert!(sink.is_empty(), "unexpected reports: {:?}", sink.messages());
}
