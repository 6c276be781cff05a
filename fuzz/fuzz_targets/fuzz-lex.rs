#![no_main]
use lexweave_lexer::{Options, Registry};
use lexweave_peg::library::{number, space, to_eol, word, word_match};
use lexweave_peg::pattern::lit;

#[macro_use]
extern crate libfuzzer_sys;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let mut registry = Registry::new();
        registry.register("fuzz", |reg, name| {
            let lex = reg.new_lexer(name, Options::default());
            let ws = reg.tag(lex, "whitespace", space() ^ 1)?;
            reg.add_rule(lex, "whitespace", ws)?;
            let comment = reg.tag(lex, "comment", to_eol(lit("#"), false))?;
            reg.add_rule(lex, "comment", comment)?;
            let keyword = reg.tag(lex, "keyword", word_match(["if", "then", "end"], false))?;
            reg.add_rule(lex, "keyword", keyword)?;
            let num = reg.tag(lex, "number", number())?;
            reg.add_rule(lex, "number", num)?;
            let identifier = reg.tag(lex, "identifier", word())?;
            reg.add_rule(lex, "identifier", identifier)?;
            Ok(lex)
        });
        let lexer = registry.load("fuzz", None).unwrap();
        let spans = registry.lex(lexer, s, 0).unwrap();

        // The tagger's contract: strictly increasing ends, total coverage.
        let mut last = 0;
        for &(_, end) in &spans {
            assert!(end > last);
            last = end;
        }
        if !s.is_empty() {
            assert_eq!(last, s.len() + 1);
        }
    }
});
