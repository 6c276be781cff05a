use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lexweave_lexer::{Lexer, Options, Registry};
use lexweave_peg::library::{number, space, to_eol, word, word_match};
use lexweave_peg::pattern::{lit, set};

const SRC: &str = include_str!("testdata/sample.c");

fn c_like(registry: &mut Registry) -> Lexer {
    registry.register("bench", |reg, name| {
        let lex = reg.new_lexer(name, Options::default());
        let ws = reg.tag(lex, "whitespace", space() ^ 1)?;
        reg.add_rule(lex, "whitespace", ws)?;
        let comment = reg.tag(lex, "comment", to_eol(lit("//"), false))?;
        reg.add_rule(lex, "comment", comment)?;
        let keyword = reg.tag(
            lex,
            "keyword",
            word_match(
                ["if", "else", "while", "for", "return", "int", "char", "void"],
                false,
            ),
        )?;
        reg.add_rule(lex, "keyword", keyword)?;
        let num = reg.tag(lex, "number", number())?;
        reg.add_rule(lex, "number", num)?;
        let identifier = reg.tag(lex, "identifier", word())?;
        reg.add_rule(lex, "identifier", identifier)?;
        let operator = reg.tag(lex, "operator", set("+-*/%<>=!&|(){}[];,"))?;
        reg.add_rule(lex, "operator", operator)?;
        Ok(lex)
    });
    registry.load("bench", None).unwrap()
}

fn bench(c: &mut Criterion) {
    let mut registry = Registry::new();
    let lexer = c_like(&mut registry);
    // Warm the grammar cache so the measurement is the tagger alone.
    registry.lex(lexer, SRC, 0).unwrap();

    let mut g = c.benchmark_group("lex");
    g.throughput(Throughput::Bytes(SRC.len() as u64))
        .bench_function("lex c-like", |b| {
            b.iter(|| registry.lex(lexer, black_box(SRC), 0).unwrap())
        });
    g.finish();
}

criterion_group!(benches, bench);
criterion_main!(benches);
