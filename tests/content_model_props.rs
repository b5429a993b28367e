//! Property tests for content model parsing

use proptest::prelude::*;

use dtdanalyzer::content_model::parse_content_spec;
use dtdanalyzer::{ContentModelNode, ContentSpec, Occurrence};

fn occurrence() -> impl Strategy<Value = Occurrence> {
    prop_oneof![
        Just(Occurrence::Once),
        Just(Occurrence::Optional),
        Just(Occurrence::ZeroOrMore),
        Just(Occurrence::OneOrMore),
    ]
}

fn element_name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9._-]{0,8}"
}

fn particle() -> impl Strategy<Value = ContentModelNode> {
    let leaf = (element_name(), occurrence())
        .prop_map(|(name, occurrence)| ContentModelNode::name(name, occurrence));

    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            (prop::collection::vec(inner.clone(), 1..4), occurrence())
                .prop_map(|(children, occurrence)| ContentModelNode::sequence(children, occurrence)),
            // a single-particle group always reads back as a sequence
            (prop::collection::vec(inner, 2..4), occurrence())
                .prop_map(|(children, occurrence)| ContentModelNode::choice(children, occurrence)),
        ]
    })
}

fn group() -> impl Strategy<Value = ContentModelNode> {
    (particle(), occurrence()).prop_map(|(node, occurrence)| match node {
        ContentModelNode::Name { .. } => ContentModelNode::sequence(vec![node], occurrence),
        group => group,
    })
}

/// Insert whitespace around every punctuation character
fn spread(minified: &str) -> String {
    let mut out = String::new();
    for c in minified.chars() {
        if matches!(c, '(' | ')' | ',' | '|') {
            out.push(' ');
            out.push(c);
            out.push_str("\n\t");
        } else {
            out.push(c);
        }
    }
    out
}

proptest! {
    #[test]
    fn minified_form_parses_back(tree in group()) {
        let minified = tree.to_string();
        let parsed = parse_content_spec("e", &minified).unwrap();
        prop_assert_eq!(parsed, ContentSpec::Children(tree));
    }

    #[test]
    fn whitespace_is_insignificant(tree in group()) {
        let minified = tree.to_string();
        let spaced = spread(&minified);
        let parsed = parse_content_spec("e", &spaced).unwrap();
        prop_assert_eq!(parsed.to_string(), minified);
    }

    #[test]
    fn mixed_content_lists_its_names(names in prop::collection::vec(element_name(), 0..5)) {
        let raw = if names.is_empty() {
            "(#PCDATA)".to_string()
        } else {
            format!("(#PCDATA|{})*", names.join("|"))
        };

        let spec = parse_content_spec("e", &raw).unwrap();
        prop_assert_eq!(spec.kind(), "mixed");
        prop_assert_eq!(spec.element_names(), names.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn parser_never_panics(raw in "[()|,?*+#A-Za-z \\t]{0,40}") {
        let _ = parse_content_spec("e", &raw);
    }
}
