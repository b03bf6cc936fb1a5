use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use slirc_bot::extensions::Hello;
use slirc_bot::router::extract;
use slirc_bot::{Event, Message, Router, RouterSettings};
use std::hint::black_box;

// Per-line cost of the inbound path: parse, extract, and full router
// dispatch of an unranked command with no provider loaded.

const RAW: &str = ":alice!alice@example.org PRIVMSG #channel :!hello world";

fn parsing_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    group.throughput(Throughput::Bytes(RAW.len() as u64));

    group.bench_function("parse_privmsg", |b| {
        b.iter(|| black_box(RAW).parse::<Message>().unwrap())
    });

    group.bench_function("extract_signal", |b| {
        b.iter(|| extract(black_box("!hello world"), "#channel", "BotNick", '!'))
    });

    group.bench_function("extract_addressed", |b| {
        b.iter(|| extract(black_box("BotNick: hello world"), "#channel", "BotNick", '!'))
    });

    group.finish();
}

fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let settings = RouterSettings {
        server: "bench".into(),
        nick: "BotNick".into(),
        signal: '!',
        master: None,
        denial_message: "denied".into(),
    };
    let mut router = Router::new(settings, vec![Box::new(Hello)]);
    let message: Message = RAW.parse().unwrap();

    group.bench_function("command", |b| {
        b.iter(|| router.handle(Event::from(message.clone())))
    });

    group.bench_function("chatter", |b| {
        let chatter = Event::Message {
            sender: "alice!alice@example.org".into(),
            target: "#channel".into(),
            text: "just talking, nothing to see".into(),
        };
        b.iter(|| router.handle(chatter.clone()))
    });

    group.finish();
}

criterion_group!(benches, parsing_benchmark, dispatch_benchmark);
criterion_main!(benches);
