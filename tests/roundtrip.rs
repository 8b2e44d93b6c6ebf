//! Round-trip tests: parse -> emit -> reparse must preserve structure,
//! scalar contents, and resolved scalar types; a second emission must be
//! byte-identical to the first (the output is a fixed point).

use proptest::prelude::*;

use yamlet::resolve::{resolve_plain, Resolved};
use yamlet::{emit_to_string, parse, CollectionStyle, Event, EventKind, ScalarStyle};

/// The type-and-content identity of a scalar, independent of its
/// presentation style.
#[derive(Debug, PartialEq)]
enum ScalarType {
    Tagged(String),
    Resolved(Resolved),
}

/// An event reduced to what the round-trip contract promises to keep.
#[derive(Debug, PartialEq)]
enum Shape {
    StreamStart,
    StreamEnd,
    DocumentStart,
    DocumentEnd,
    Alias(String),
    Scalar {
        anchor: Option<String>,
        value: String,
        kind: ScalarType,
    },
    SequenceStart {
        anchor: Option<String>,
        tag: Option<String>,
    },
    SequenceEnd,
    MappingStart {
        anchor: Option<String>,
        tag: Option<String>,
    },
    MappingEnd,
}

fn shape(event: &Event) -> Shape {
    match &event.kind {
        EventKind::StreamStart => Shape::StreamStart,
        EventKind::StreamEnd => Shape::StreamEnd,
        EventKind::DocumentStart { .. } => Shape::DocumentStart,
        EventKind::DocumentEnd { .. } => Shape::DocumentEnd,
        EventKind::Alias { anchor } => Shape::Alias(anchor.clone()),
        EventKind::Scalar {
            anchor,
            tag,
            value,
            style,
            ..
        } => {
            let kind = match tag {
                Some(t) => ScalarType::Tagged(t.clone()),
                None if *style == ScalarStyle::Plain => {
                    ScalarType::Resolved(resolve_plain(value))
                }
                None => ScalarType::Resolved(Resolved::Str),
            };
            Shape::Scalar {
                anchor: anchor.clone(),
                value: value.clone(),
                kind,
            }
        }
        EventKind::SequenceStart { anchor, tag, .. } => Shape::SequenceStart {
            anchor: anchor.clone(),
            tag: tag.clone(),
        },
        EventKind::SequenceEnd => Shape::SequenceEnd,
        EventKind::MappingStart { anchor, tag, .. } => Shape::MappingStart {
            anchor: anchor.clone(),
            tag: tag.clone(),
        },
        EventKind::MappingEnd => Shape::MappingEnd,
    }
}

/// Round-trip one document and report everything wrong with it.
fn check_roundtrip(source: &str) -> Result<(), String> {
    let events = parse(source).map_err(|e| format!("initial parse failed: {}", e))?;
    let emitted =
        emit_to_string(&events).map_err(|e| format!("emission failed: {}", e))?;
    let reparsed =
        parse(&emitted).map_err(|e| format!("reparse failed on {:?}: {}", emitted, e))?;

    let before: Vec<Shape> = events.iter().map(shape).collect();
    let after: Vec<Shape> = reparsed.iter().map(shape).collect();
    if before != after {
        return Err(format!(
            "shape changed across round trip\noutput: {:?}\nbefore: {:?}\nafter:  {:?}",
            emitted, before, after
        ));
    }

    let emitted_again = emit_to_string(&reparsed)
        .map_err(|e| format!("second emission failed: {}", e))?;
    if emitted != emitted_again {
        return Err(format!(
            "emission is not a fixed point\nfirst:  {:?}\nsecond: {:?}",
            emitted, emitted_again
        ));
    }
    Ok(())
}

const CORPUS: &[&str] = &[
    "key: value\n",
    "- a\n- b\n",
    "a: 1\nb: 2\nc: 3\n",
    "outer:\n  inner:\n    - 1\n    - 2\n  other: x\n",
    "- - a\n  - b\n- c\n",
    "[a, b, c]\n",
    "{k: v, n: 1}\n",
    "mixed: [1, {two: 2}, [3]]\n",
    "[a: b]\n",
    "- &x a\n- *x\n",
    "base: &b\n  k: v\nref: *b\n",
    "quoted: 'true'\nalso: \"1.5\"\nbare: null\nnum: 0x1F\n",
    "text: \"tab\\there\\nand newline\"\n",
    "lit: |\n  line one\n  line two\n",
    "strip: |-\n  no trailing break\n",
    "keep: |+\n  kept\n\n",
    "blank: |2+\n\n",
    "trail: |+\n  a\n\n\n",
    "folded: >\n  one\n  two\n",
    "---\none\n---\n- two\n...\n",
    "%YAML 1.2\n---\nversioned\n",
    "%TAG !e! tag:example.com,2000:\n---\n!e!widget x\n",
    "!!str 1\n",
    "!local thing\n",
    "tagged: !!int 42\n",
    "empty_value:\nnext: x\n",
    "indentless:\n- a\n- b\n",
    "spread: first\n  continued\n",
    "commented: 1 # trailing note\n",
    "'weird key': [\">flow\", '#quoted']\n",
    "deep:\n  - one:\n      two:\n        - three\n",
];

#[test]
fn test_corpus_roundtrip() {
    let mut failures = Vec::new();
    for source in CORPUS {
        if let Err(reason) = check_roundtrip(source) {
            failures.push(format!("--- {:?}\n{}", source, reason));
        }
    }
    assert!(
        failures.is_empty(),
        "{} corpus round-trip failures:\n{}",
        failures.len(),
        failures.join("\n")
    );
}

#[test]
fn test_roundtrip_preserves_document_count() {
    let events = parse("---\na\n---\nb\n---\nc\n").unwrap();
    let emitted = emit_to_string(&events).unwrap();
    let reparsed = parse(&emitted).unwrap();
    let docs = |evs: &[Event]| {
        evs.iter()
            .filter(|e| matches!(e.kind, EventKind::DocumentStart { .. }))
            .count()
    };
    assert_eq!(docs(&events), 3);
    assert_eq!(docs(&reparsed), 3);
}

// ============================================================================
// Property tests
// ============================================================================

fn wrap_doc(body: Vec<Event>) -> Vec<Event> {
    let mut events = vec![
        Event::new(EventKind::StreamStart),
        Event::new(EventKind::DocumentStart {
            version: None,
            tag_directives: Vec::new(),
            implicit: true,
        }),
    ];
    events.extend(body);
    events.push(Event::new(EventKind::DocumentEnd { implicit: true }));
    events.push(Event::new(EventKind::StreamEnd));
    events
}

fn scalar_values(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::Scalar { value, .. } => Some(value.clone()),
            _ => None,
        })
        .collect()
}

proptest! {
    /// Any string survives emission as a double-quoted root scalar.
    #[test]
    fn prop_double_quoted_scalar_roundtrips(value in ".*") {
        let events = wrap_doc(vec![Event::scalar(
            value.clone(),
            ScalarStyle::DoubleQuoted,
        )]);
        let emitted = emit_to_string(&events).unwrap();
        let reparsed = parse(&emitted).unwrap();
        prop_assert_eq!(scalar_values(&reparsed), vec![value]);
    }

    /// Mapping values round-trip whatever quoting the emitter picks.
    #[test]
    fn prop_mapping_values_roundtrip(
        pairs in proptest::collection::vec(
            ("[a-z]{1,8}", "[ -~]{0,24}"),
            1..6,
        )
    ) {
        let mut body = vec![Event::new(EventKind::MappingStart {
            anchor: None,
            tag: None,
            style: CollectionStyle::Block,
        })];
        for (key, value) in &pairs {
            body.push(Event::scalar(key.clone(), ScalarStyle::Plain));
            body.push(Event::scalar(value.clone(), ScalarStyle::Plain));
        }
        body.push(Event::new(EventKind::MappingEnd));

        let emitted = emit_to_string(&wrap_doc(body)).unwrap();
        let reparsed = parse(&emitted).unwrap();
        let mut expected = Vec::new();
        for (key, value) in &pairs {
            expected.push(key.clone());
            expected.push(value.clone());
        }
        prop_assert_eq!(scalar_values(&reparsed), expected);
    }

    /// Multi-line strings round-trip through the block scalar path.
    #[test]
    fn prop_literal_scalar_roundtrips(
        value in "([ -~]{0,12}\n){0,4}[ -~]{0,12}"
    ) {
        let events = wrap_doc(vec![Event::scalar(
            value.clone(),
            ScalarStyle::Literal,
        )]);
        let emitted = emit_to_string(&events).unwrap();
        let reparsed = parse(&emitted).unwrap();
        prop_assert_eq!(scalar_values(&reparsed), vec![value]);
    }

    /// Sequences of emitter-chosen-style scalars keep order and content.
    #[test]
    fn prop_sequence_roundtrips(
        items in proptest::collection::vec("[ -~]{0,16}", 1..8)
    ) {
        let mut body = vec![Event::new(EventKind::SequenceStart {
            anchor: None,
            tag: None,
            style: CollectionStyle::Block,
        })];
        for item in &items {
            body.push(Event::scalar(item.clone(), ScalarStyle::Plain));
        }
        body.push(Event::new(EventKind::SequenceEnd));

        let emitted = emit_to_string(&wrap_doc(body)).unwrap();
        let reparsed = parse(&emitted).unwrap();
        prop_assert_eq!(scalar_values(&reparsed), items);
    }
}
