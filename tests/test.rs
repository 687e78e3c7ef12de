#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use abnf_packrat::element::{alt, lit, lit_regex, many, reference, some, Grammar, GrammarBuilder};
    use abnf_packrat::{AstOptions, Config, Engine};

    fn build(f: impl FnOnce(&mut GrammarBuilder)) -> Arc<Grammar> {
        let mut b = GrammarBuilder::new();
        f(&mut b);
        Arc::new(b.build().unwrap())
    }

    #[test]
    fn star_repetition_on_empty_input() {
        let grammar = build(|b| {
            b.define("s", many(lit(&["a"]).unwrap()));
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("s", "", 0).unwrap(), Some(0));
    }

    #[test]
    fn star_repetition_is_greedy_and_ast_covers_full_span() {
        let grammar = build(|b| {
            b.define("s", many(lit(&["a"]).unwrap()));
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("s", "aaaa", 0).unwrap(), Some(4));
        let ast = engine.ast(AstOptions::new()).unwrap();
        let root = ast.root().unwrap();
        assert_eq!(root.name(), "s");
        assert_eq!(root.range_len(), 4);
        assert_eq!(root.text(), "aaaa");
    }

    #[test]
    fn digit_range_and_repetition_stop_at_non_digit() {
        let grammar = build(|b| {
            b.define("digit", lit_regex("[0-9]").unwrap());
            b.define("number", some(reference("digit")));
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("number", "123xyz", 0).unwrap(), Some(3));
    }

    #[test]
    fn prioritized_choice_commits_to_the_first_match() {
        let grammar = build(|b| {
            b.define(
                "alt",
                alt(vec![lit(&["foo"]).unwrap(), lit(&["foobar"]).unwrap()]).unwrap(),
            );
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("alt", "foobar", 0).unwrap(), Some(3));
    }

    #[test]
    fn reordering_alternatives_changes_the_committed_match() {
        let grammar = build(|b| {
            b.define(
                "alt",
                alt(vec![lit(&["foobar"]).unwrap(), lit(&["foo"]).unwrap()]).unwrap(),
            );
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("alt", "foobar", 0).unwrap(), Some(6));
    }

    #[test]
    fn case_sensitive_and_case_insensitive_abnf_literals() {
        let grammar = Grammar::compile_abnf("shout = %s\"IF\"\r\n").unwrap();
        let mut engine = Engine::new(Arc::new(grammar)).unwrap();
        assert_eq!(engine.parse("shout", "If", 0).unwrap(), None);
        assert_eq!(engine.parse("shout", "IF", 0).unwrap(), Some(2));

        let grammar = Grammar::compile_abnf("word = \"IF\"\r\n").unwrap();
        let mut engine = Engine::new(Arc::new(grammar)).unwrap();
        assert_eq!(engine.parse("word", "if", 0).unwrap(), Some(2));
    }

    #[test]
    fn abnf_repetition_group_lowers_and_matches() {
        let grammar =
            Grammar::compile_abnf("repeat = 1*DIGIT / ( *DIGIT \"*\" *DIGIT )\r\n").unwrap();
        let mut engine = Engine::new(Arc::new(grammar)).unwrap();
        assert_eq!(engine.parse("repeat", "*3", 0).unwrap(), Some(2));
        assert_eq!(engine.parse("repeat", "42", 0).unwrap(), Some(2));
    }

    #[test]
    fn abnf_unsupported_repetition_bounds_error_at_compile_time() {
        let err = Grammar::compile_abnf("bounded = 2*5DIGIT\r\n").unwrap_err();
        assert!(matches!(
            err,
            abnf_packrat::AbnfError::UnsupportedRepetition { min: 2, max: Some(5) }
        ));
    }

    #[test]
    fn invalid_abnf_source_reports_farthest_index() {
        let err = Grammar::compile_abnf("start = \n").unwrap_err();
        assert!(matches!(err, abnf_packrat::AbnfError::InvalidSource(_)));
    }

    #[test]
    fn ignore_set_makes_whitespace_transparent_between_tokens() {
        let grammar = Grammar::compile_abnf("pair = \"a\" \"b\"\r\n").unwrap();
        let grammar = Arc::new(grammar);
        let config = Config {
            ignore: vec!["ws".to_string()],
            start: "pair".to_string(),
            debug: false,
        };
        let mut engine = Engine::with_config(grammar, config).unwrap();
        assert_eq!(engine.parse("pair", "ab", 0).unwrap(), Some(2));
        assert_eq!(engine.parse("pair", "a   b", 0).unwrap(), Some(5));
        assert_eq!(engine.parse("pair", "a\t\nb", 0).unwrap(), Some(4));
    }

    #[test]
    fn left_recursive_production_is_rejected_not_infinite_looped() {
        let grammar = build(|b| {
            b.define("x", alt(vec![reference("x"), lit(&["a"]).unwrap()]).unwrap());
        });
        let mut engine = Engine::new(grammar).unwrap();
        let err = engine.parse("x", "a", 0).unwrap_err();
        assert!(matches!(err, abnf_packrat::EngineError::LeftRecursion(ref name) if name == "x"));
    }

    #[test]
    fn predicates_do_not_consume_input() {
        let grammar = build(|b| {
            b.define(
                "g",
                abnf_packrat::pos(lit(&["a"]).unwrap()),
            );
            b.define(
                "h",
                abnf_packrat::neg(lit(&["a"]).unwrap()),
            );
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("g", "a", 0).unwrap(), Some(0));
        assert_eq!(engine.parse("h", "b", 0).unwrap(), Some(0));
        assert_eq!(engine.parse("h", "a", 0).unwrap(), None);
    }

    #[test]
    fn memoization_keeps_shared_sub_rule_work_bounded() {
        // `digit` is referenced from three different alternatives of `number`;
        // without memoization each position could re-run it multiple times.
        let grammar = build(|b| {
            b.define("digit", lit_regex("[0-9]").unwrap());
            b.define(
                "number",
                alt(vec![
                    seq_of_digit_digit_digit(),
                    seq_of_digit_digit(),
                    reference("digit"),
                ])
                .unwrap(),
            );
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("number", "123", 0).unwrap(), Some(3));
        // One goal per (index, production) pair: at most 3 positions * 2 productions.
        assert!(engine.production_match_count() <= 6);
    }

    fn seq_of_digit_digit_digit() -> abnf_packrat::Element {
        abnf_packrat::seq(vec![reference("digit"), reference("digit"), reference("digit")]).unwrap()
    }

    fn seq_of_digit_digit() -> abnf_packrat::Element {
        abnf_packrat::seq(vec![reference("digit"), reference("digit")]).unwrap()
    }

    #[test]
    fn ast_ignores_configured_productions_and_strips_them_from_text() {
        let grammar = Grammar::compile_abnf("pair = \"a\" \"b\"\r\n").unwrap();
        let grammar = Arc::new(grammar);
        let config = Config {
            ignore: vec!["ws".to_string()],
            start: "pair".to_string(),
            debug: false,
        };
        let mut engine = Engine::with_config(grammar, config).unwrap();
        assert_eq!(engine.parse("pair", "a   b", 0).unwrap(), Some(5));
        let ast = engine.ast(AstOptions::new().ignore(["ws"])).unwrap();
        let root = ast.root().unwrap();
        assert_eq!(root.text(), "a   b");
        assert_eq!(root.stripped_text(), "ab");
        // "ws" itself must not appear as a node since it is ignored.
        assert_eq!(root.count_named("ws"), 0);
    }

    #[test]
    fn ast_range_containment_holds_for_nested_productions() {
        let grammar = Grammar::compile_abnf("pair = \"a\" \"b\"\r\n").unwrap();
        let mut engine = Engine::new(Arc::new(grammar)).unwrap();
        assert_eq!(engine.parse("pair", "ab", 0).unwrap(), Some(2));
        let ast = engine.ast(AstOptions::new()).unwrap();
        let root = ast.root().unwrap();
        for child in root.children() {
            assert!(child.range().start >= root.range().start);
            assert!(child.range().end <= root.range().end);
        }
    }

    #[test]
    fn check_allow_disallow_agree_with_positive_negative_predicates() {
        let grammar = build(|b| {
            b.define("a", lit(&["a"]).unwrap());
        });
        let mut engine = Engine::new(grammar).unwrap();
        engine.parse("a", "ab", 0).unwrap();
        assert_eq!(engine.check("a", 0).unwrap(), Some(1));
        assert_eq!(engine.check("a", 1).unwrap(), None);
        assert_eq!(engine.allow("a", 0).unwrap(), 1);
        assert_eq!(engine.allow("a", 1).unwrap(), 1);
        assert_eq!(engine.disallow("a", 0).unwrap(), None);
        assert_eq!(engine.disallow("a", 1).unwrap(), Some(1));
    }

    #[test]
    fn one_is_an_alias_for_alt() {
        let grammar = build(|b| {
            b.define("x", abnf_packrat::one(vec![lit(&["a"]).unwrap(), lit(&["b"]).unwrap()]).unwrap());
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("x", "b", 0).unwrap(), Some(1));
    }

    #[test]
    fn builder_reports_not_yet_defined_references_without_failing() {
        let mut b = GrammarBuilder::new();
        b.define("top", reference("missing"));
        let undefined = b.undefined_references();
        assert_eq!(undefined, vec!["missing".to_string()]);
        // The same dangling reference is still a hard error once finalized.
        assert!(b.build().is_err());
    }

    fn ast_shape<'a, 'e>(node: abnf_packrat::AstNode<'a, 'e>) -> String {
        let children: Vec<String> = node.children().map(ast_shape).collect();
        format!("{}[{}]({})", node.name(), node.range_len(), children.join(","))
    }

    #[test]
    fn compiling_the_same_abnf_twice_yields_isomorphic_parse_trees() {
        let source = "pair = \"a\" *WSP \"b\"\r\n";
        let input = "a   b";

        let grammar_one = Grammar::compile_abnf(source).unwrap();
        let mut engine_one = Engine::new(Arc::new(grammar_one)).unwrap();
        assert_eq!(engine_one.parse("pair", input, 0).unwrap(), Some(5));
        let ast_one = engine_one.ast(AstOptions::new()).unwrap();

        let grammar_two = Grammar::compile_abnf(source).unwrap();
        let mut engine_two = Engine::new(Arc::new(grammar_two)).unwrap();
        assert_eq!(engine_two.parse("pair", input, 0).unwrap(), Some(5));
        let ast_two = engine_two.ast(AstOptions::new()).unwrap();

        assert_eq!(
            ast_shape(ast_one.root().unwrap()),
            ast_shape(ast_two.root().unwrap())
        );
    }

    #[test]
    fn discarded_lookahead_match_does_not_become_a_phantom_ast_child() {
        // `a` only ever matches inside the discarded `pos(...)`; `start`'s
        // real derivation is just a reference to `b`, so `a` must not show
        // up as a child of `b` even though its end index (1) falls inside
        // `b`'s range (0..2).
        let grammar = build(|b| {
            b.define("a", lit(&["x"]).unwrap());
            b.define("b", lit(&["xy"]).unwrap());
            b.define(
                "start",
                abnf_packrat::seq(vec![abnf_packrat::pos(reference("a")), reference("b")]).unwrap(),
            );
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("start", "xy", 0).unwrap(), Some(2));
        let ast = engine.ast(AstOptions::new()).unwrap();
        let root = ast.root().unwrap();
        assert_eq!(root.name(), "start");
        let b_node = root.first_named("b").unwrap();
        assert_eq!(b_node.count_named("a"), 0);
        assert!(b_node.children().next().is_none());
    }

    #[test]
    fn a_goal_reached_only_through_a_real_reference_after_a_lookahead_still_appears() {
        // `a` is probed by the lookahead first (discarded), then genuinely
        // referenced by `start` right after; it must still show up once,
        // not zero times, in the final tree.
        let grammar = build(|b| {
            b.define("a", lit(&["x"]).unwrap());
            b.define(
                "start",
                abnf_packrat::seq(vec![abnf_packrat::pos(reference("a")), reference("a")]).unwrap(),
            );
        });
        let mut engine = Engine::new(grammar).unwrap();
        assert_eq!(engine.parse("start", "x", 0).unwrap(), Some(1));
        let ast = engine.ast(AstOptions::new()).unwrap();
        let root = ast.root().unwrap();
        assert_eq!(root.count_named("a"), 1);
    }

    #[test]
    fn decimal_numeric_literal_does_not_swallow_a_following_reference() {
        // `%d10` must stop after two decimal digits; it must not greedily
        // consume the hex-digit-looking `A` that starts the `ALPHA`
        // reference right after it.
        let grammar = Grammar::compile_abnf("rule = %d10 ALPHA\r\n").unwrap();
        let mut engine = Engine::new(Arc::new(grammar)).unwrap();
        assert_eq!(engine.parse("rule", "\nQ", 0).unwrap(), Some(2));
    }

    #[test]
    fn engine_parse_default_falls_back_to_config_start() {
        let grammar = Grammar::compile_abnf("greeting = \"hi\"\r\n").unwrap();
        let config = Config {
            ignore: Vec::new(),
            start: "greeting".to_string(),
            debug: false,
        };
        let mut engine = Engine::with_config(Arc::new(grammar), config).unwrap();
        assert_eq!(engine.parse_default("hi", 0).unwrap(), Some(2));
    }
}
