use lexweave_lexer::{Lexer, Options, Registry};
use lexweave_peg::library::{any, space, word};
use lexweave_peg::pattern::{lit, peek, set};

fn spans(registry: &mut Registry, lexer: Lexer, text: &str, init_style: usize) -> Vec<(String, usize)> {
    registry
        .lex(lexer, text, init_style)
        .unwrap()
        .into_iter()
        .map(|(tag, end)| (tag.to_string(), end))
        .collect()
}

fn register_css(registry: &mut Registry) {
    registry.register("css", |reg, name| {
        let lex = reg.new_lexer(name, Options::default());
        let ws = reg.tag(lex, "whitespace", space() ^ 1)?;
        reg.add_rule(lex, "whitespace", ws)?;
        let identifier = reg.tag(lex, "identifier", word())?;
        reg.add_rule(lex, "identifier", identifier)?;
        let operator = reg.tag(lex, "operator", set("{}:;"))?;
        reg.add_rule(lex, "operator", operator)?;
        Ok(lex)
    });
}

fn register_html(registry: &mut Registry) {
    register_css(registry);
    registry.register("html", |reg, name| {
        let lex = reg.new_lexer(name, Options::default());
        let ws = reg.tag(lex, "whitespace", space() ^ 1)?;
        reg.add_rule(lex, "whitespace", ws)?;
        let element = reg.tag(lex, "tag", lit("<") * ((any() - lit(">")) ^ 0) * lit(">"))?;
        reg.add_rule(lex, "element", element)?;
        let css = reg.load("css", None)?;
        let start = reg.tag(lex, "tag", lit("<style") * ((any() - lit(">")) ^ 0) * lit(">"))?;
        let end = peek(lit("</style>"));
        reg.embed(lex, css, start, end)?;
        Ok(lex)
    });
}

#[test]
fn embedded_child_tags_inside_the_transition_window() {
    let mut registry = Registry::new();
    register_html(&mut registry);
    let html = registry.load("html", None).unwrap();
    let text = "<p></p><style type=\"text/css\">a{}</style>";
    assert_eq!(
        spans(&mut registry, html, text, 0),
        [
            ("tag".into(), 4),
            ("tag".into(), 8),
            ("tag".into(), 31),
            ("identifier".into(), 32),
            ("operator".into(), 33),
            ("operator".into(), 34),
            ("tag".into(), 42),
        ]
    );
}

#[test]
fn embedding_round_trips_back_to_the_parent() {
    let mut registry = Registry::new();
    register_html(&mut registry);
    let html = registry.load("html", None).unwrap();
    let text = "<style media=\"x\">a{}</style><p></p>";
    let spans = spans(&mut registry, html, text, 0);
    // Outer tag, then inner css tags, then outer tags again.
    let tags: Vec<&str> = spans.iter().map(|(tag, _)| tag.as_str()).collect();
    assert_eq!(
        tags,
        ["tag", "identifier", "operator", "operator", "tag", "tag", "tag"]
    );
}

#[test]
fn init_style_resumes_inside_the_embedded_language() {
    let mut registry = Registry::new();
    register_html(&mut registry);
    let html = registry.load("html", None).unwrap();
    // The child's whitespace tag was mirrored into the parent on embed.
    let css_ws = registry
        .style_of(html, "whitespace.css")
        .unwrap()
        .expect("mirrored tag");
    let tags: Vec<(String, usize)> = spans(&mut registry, html, "b {}", css_ws);
    let names: Vec<&str> = tags.iter().map(|(tag, _)| tag.as_str()).collect();
    assert_eq!(
        names,
        ["identifier", "whitespace.css", "operator", "operator"]
    );
}

#[test]
fn a_plain_embedded_child_still_lexes_standalone() {
    let mut registry = Registry::new();
    register_html(&mut registry);
    registry.load("html", None).unwrap();
    // css gained a parent back-reference through the embedding, but it was
    // not the lexer being loaded, so it keeps its own grammar and start.
    let css = registry.load("css", None).unwrap();
    let tags: Vec<(String, usize)> = spans(&mut registry, css, "a{}", 0);
    let names: Vec<&str> = tags.iter().map(|(tag, _)| tag.as_str()).collect();
    assert_eq!(names, ["identifier", "operator", "operator"]);
}

#[test]
fn self_embedding_child_starts_in_its_parent() {
    let mut registry = Registry::new();
    register_html(&mut registry);
    registry.register("ph", |reg, name| {
        let lex = reg.new_lexer(name, Options::default());
        let ws = reg.tag(lex, "whitespace", space() ^ 1)?;
        reg.add_rule(lex, "whitespace", ws)?;
        let identifier = reg.tag(lex, "identifier", word())?;
        reg.add_rule(lex, "identifier", identifier)?;
        let html = reg.load("html", None)?;
        let start = reg.tag(lex, "preprocessor", lit("<?"))?;
        let end = reg.tag(lex, "preprocessor", lit("?>"))?;
        reg.embed(html, lex, start, end)?;
        Ok(lex)
    });
    let ph = registry.load("ph", None).unwrap();
    let text = "<p></p><?x?><p>";
    assert_eq!(
        spans(&mut registry, ph, text, 0),
        [
            ("tag".into(), 4),
            ("tag".into(), 8),
            ("preprocessor".into(), 10),
            ("identifier".into(), 11),
            ("preprocessor".into(), 13),
            ("tag".into(), 16),
        ]
    );
}

#[test]
fn proxy_lexers_run_their_parent_with_additions() {
    let mut registry = Registry::new();
    registry.register("base", |reg, name| {
        let lex = reg.new_lexer(name, Options::default());
        let ws = reg.tag(lex, "whitespace", space() ^ 1)?;
        reg.add_rule(lex, "whitespace", ws)?;
        let identifier = reg.tag(lex, "identifier", word())?;
        reg.add_rule(lex, "identifier", identifier)?;
        Ok(lex)
    });
    registry.register("skin", |reg, name| {
        let base = reg.load("base", None)?;
        let lex = reg.new_lexer(
            name,
            Options {
                inherit: Some(base),
                ..Options::default()
            },
        );
        let label = reg.tag(lex, "label", lit("@") * word())?;
        reg.add_rule(lex, "label", label)?;
        Ok(lex)
    });
    let skin = registry.load("skin", None).unwrap();
    assert_eq!(
        spans(&mut registry, skin, "@x y", 0),
        [
            ("label".into(), 3),
            ("whitespace.base".into(), 4),
            ("identifier".into(), 5),
        ]
    );
}

#[test]
fn embed_mirrors_child_word_lists_under_namespaced_keys() {
    let mut registry = Registry::new();
    registry.register("inner", |reg, name| {
        let lex = reg.new_lexer(name, Options::default());
        let list = reg.get_word_list(lex, "props", false)?;
        let attribute = reg.tag(lex, "attribute", list)?;
        reg.add_rule(lex, "attribute", attribute)?;
        let identifier = reg.tag(lex, "identifier", word())?;
        reg.add_rule(lex, "identifier", identifier)?;
        Ok(lex)
    });
    registry.register("outer", |reg, name| {
        let lex = reg.new_lexer(name, Options::default());
        let identifier = reg.tag(lex, "identifier", word())?;
        reg.add_rule(lex, "identifier", identifier)?;
        let inner = reg.load("inner", None)?;
        let start = reg.tag(lex, "operator", lit("["))?;
        let end = reg.tag(lex, "operator", lit("]"))?;
        reg.embed(lex, inner, start, end)?;
        Ok(lex)
    });
    let outer = registry.load("outer", None).unwrap();
    // Populating the namespaced alias flows through to the child slot and
    // invalidates the composite grammar.
    registry
        .set_word_list(outer, "inner.props", "color", false)
        .unwrap();
    let tags: Vec<(String, usize)> = spans(&mut registry, outer, "[color]", 0);
    let names: Vec<&str> = tags.iter().map(|(tag, _)| tag.as_str()).collect();
    assert_eq!(names, ["operator", "attribute", "operator"]);
}
