//! Benchmarks for IRC line parsing and engine dispatch.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slirc_engine::{Engine, RawMessage};

/// Simple PING message
const SIMPLE_MESSAGE: &str = "PING :irc.example.com";

/// Message with prefix
const PREFIX_MESSAGE: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

/// Message with IRCv3 tags
const TAGGED_MESSAGE: &str = "@time=2023-01-01T00:00:00.000Z;msgid=abc123;+example/tag=value :nick!user@host PRIVMSG #channel :Hello with tags!";

/// Numeric response
const NUMERIC_RESPONSE: &str = ":irc.server.net 001 nickname :Welcome to the IRC Network nickname!user@host";

/// RPL_ISUPPORT line with typed tokens
const ISUPPORT_LINE: &str = ":irc.server.net 005 nickname PREFIX=(ov)@+ CHANTYPES=#& CHANLIMIT=#:120 CASEMAPPING=rfc1459 NICKLEN=31 :are supported by this server";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Line Parsing");

    for (name, line) in [
        ("simple_ping", SIMPLE_MESSAGE),
        ("with_prefix", PREFIX_MESSAGE),
        ("with_tags", TAGGED_MESSAGE),
        ("numeric_response", NUMERIC_RESPONSE),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let msg = RawMessage::parse(black_box(line)).unwrap();
                black_box(msg)
            })
        });
    }

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Engine Dispatch");

    group.bench_function("privmsg", |b| {
        let mut engine = Engine::new();
        b.iter(|| {
            let dispatch = engine.feed_line(black_box(TAGGED_MESSAGE));
            black_box(dispatch)
        })
    });

    group.bench_function("isupport", |b| {
        let mut engine = Engine::new();
        b.iter(|| {
            let dispatch = engine.feed_line(black_box(ISUPPORT_LINE));
            black_box(dispatch)
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_parsing, benchmark_dispatch);
criterion_main!(benches);
