use std::sync::Arc;
use std::thread;

use arkconf::component::Factories;
use arkconf::context::{Context, Handle, Namespace};
use arkconf::error::CollectingSink;
use arkconf::parser::parse_value;

const WORKERS: usize = 8;

fn setup() -> Context {
    let mut factories = Factories::new();
    factories.register_generic(Namespace::TokenSpanFn, "NGramSentence");
    factories.register_generic(Namespace::TokenSpanStrFn, "String");
    let factories = factories.with_fallback(Namespace::Feature);
    let context = Context::with_sink(factories, Arc::new(CollectingSink::new()));
    context
        .deserialize("ts_str_fn str=String();")
        .expect("declared");
    context
}

#[test]
fn concurrent_workers_share_one_instance_per_definition() {
    let context = setup();
    let definition = parse_value(r#"Vocab(fn=(${str} o NGramSentence(n="1", noSpan="true")))"#).unwrap();
    let handles: Vec<Handle> = thread::scope(|scope| {
        let workers: Vec<_> = (0..WORKERS)
            .map(|_| scope.spawn(|| context.get_or_construct(Namespace::Feature, &definition)))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("worker finished").expect("resolved"))
            .collect()
    });
    assert!(handles.iter().all(|handle| handle.same(&handles[0])));
    assert_eq!(context.names(Namespace::Feature).len(), 1);
    assert_eq!(context.names(Namespace::TokenSpanFn).len(), 1);
    assert_eq!(context.names(Namespace::TokenSpanStrFn).len(), 2);
}

#[test]
fn concurrent_anonymous_constructions_get_distinct_names() {
    let context = setup();
    let names: Vec<String> = thread::scope(|scope| {
        let workers: Vec<_> = (0..WORKERS)
            .map(|i| {
                let context = &context;
                scope.spawn(move || {
                    let definition = parse_value(&format!("NGramSentence(n={i})")).unwrap();
                    context
                        .construct_from_parse(Namespace::TokenSpanFn, None, &definition)
                        .map(|handle| handle.name().to_string())
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("worker finished").expect("constructed"))
            .collect()
    });
    let mut sorted: Vec<u64> = names.iter().map(|name| name.parse().unwrap()).collect();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), WORKERS);
    assert_eq!(context.len(), WORKERS + 1);
    assert_eq!(context.reference_counter(), WORKERS as u64);
}

#[test]
fn readers_and_writers_can_interleave() {
    let context = setup();
    thread::scope(|scope| {
        for i in 0..WORKERS {
            let context = &context;
            scope.spawn(move || {
                let text = format!(r#"value v{i}="{i}";"#);
                context.deserialize(&text).expect("declared");
                assert!(context.get(Namespace::TokenSpanStrFn, "str").is_some());
                let _ = context.to_string();
            });
        }
    });
    assert_eq!(context.names(Namespace::Value).len(), WORKERS);
}
