//! End-to-end parser scenarios, including fragmentation sweeps.

use crosswire_http::{Chunk, MessageHandler, MessageParser, ParseMode, ParseStatus};
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    RequestBegin(Vec<u8>, Vec<u8>, u8, u8),
    ResponseBegin(u8, u8, u16, Vec<u8>),
    MessageBegin,
    Header(Vec<u8>, Vec<u8>),
    HeaderEnd,
    Content(Vec<u8>),
    End,
}

#[derive(Debug, Default)]
struct Recorder {
    events: Vec<Event>,
}

impl MessageHandler for Recorder {
    fn on_request_begin(&mut self, method: &[u8], entity: &[u8], vmaj: u8, vmin: u8) -> bool {
        self.events.push(Event::RequestBegin(
            method.to_vec(),
            entity.to_vec(),
            vmaj,
            vmin,
        ));
        true
    }

    fn on_response_begin(&mut self, vmaj: u8, vmin: u8, code: u16, reason: &[u8]) -> bool {
        self.events
            .push(Event::ResponseBegin(vmaj, vmin, code, reason.to_vec()));
        true
    }

    fn on_message_begin(&mut self) -> bool {
        self.events.push(Event::MessageBegin);
        true
    }

    fn on_message_header(&mut self, name: &[u8], value: &[u8]) -> bool {
        self.events
            .push(Event::Header(name.to_vec(), value.to_vec()));
        true
    }

    fn on_message_header_end(&mut self) -> bool {
        self.events.push(Event::HeaderEnd);
        true
    }

    fn on_message_content(&mut self, content: &[u8]) -> bool {
        self.events.push(Event::Content(content.to_vec()));
        true
    }

    fn on_message_end(&mut self) -> bool {
        self.events.push(Event::End);
        true
    }
}

/// Content slices depend on how the input was cut; fold runs of them
/// together so event sequences compare by meaning.
fn normalized(events: &[Event]) -> Vec<Event> {
    let mut out: Vec<Event> = Vec::with_capacity(events.len());
    for event in events {
        match (out.last_mut(), event) {
            (Some(Event::Content(acc)), Event::Content(more)) => acc.extend_from_slice(more),
            _ => out.push(event.clone()),
        }
    }
    // An empty content slice carries no information once runs are merged.
    out.retain(|e| !matches!(e, Event::Content(c) if c.is_empty()));
    out
}

/// Feeds `input` in one piece.
fn parse_whole(mode: ParseMode, input: &[u8]) -> (ParseStatus, usize, Vec<Event>) {
    let mut parser = MessageParser::new(mode);
    let mut handler = Recorder::default();
    let mut cursor = 0;
    let status = parser.process(Chunk::new(input, 0), &mut cursor, &mut handler);
    (status, cursor, handler.events)
}

/// Feeds `input` cut at the given stream positions, checking cursor
/// bookkeeping along the way. Cuts must be sorted.
fn parse_fragmented(mode: ParseMode, input: &[u8], cuts: &[usize]) -> (ParseStatus, Vec<Event>) {
    let mut parser = MessageParser::new(mode);
    let mut handler = Recorder::default();
    let mut cursor = 0;
    let mut status = ParseStatus::Partial;

    let mut start = 0;
    let mut bounds: Vec<usize> = cuts.to_vec();
    bounds.push(input.len());
    for end in bounds {
        if end <= start {
            continue;
        }
        // Each piece becomes its own chunk; the piece's buffer "dies"
        // when the loop advances, exactly like a transport read buffer.
        let piece = input[start..end].to_vec();
        let chunk = Chunk::new(&piece, start);
        let before = cursor;
        status = parser.process(chunk, &mut cursor, &mut handler);
        assert!(cursor >= before, "cursor went backwards");
        assert!(cursor <= end, "cursor beyond fed bytes");
        if status == ParseStatus::SyntaxError {
            break;
        }
        start = end;
    }
    (status, handler.events)
}

// ============================================================================
// Literal scenarios
// ============================================================================

#[test]
fn scenario_simple_get() {
    let input: &[u8] = b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n";
    let (status, consumed, events) = parse_whole(ParseMode::Request, input);
    assert_eq!(status, ParseStatus::Success);
    assert_eq!(consumed, input.len());
    assert_eq!(
        events,
        vec![
            Event::RequestBegin(b"GET".to_vec(), b"/x".to_vec(), 1, 1),
            Event::Header(b"Host".to_vec(), b"a".to_vec()),
            Event::HeaderEnd,
            Event::End,
        ]
    );
}

#[test]
fn scenario_get_split_after_method() {
    let input: &[u8] = b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n";
    let (whole_status, _, whole) = parse_whole(ParseMode::Request, input);
    let (split_status, split) = parse_fragmented(ParseMode::Request, input, &[4]);
    assert_eq!(split_status, whole_status);
    assert_eq!(normalized(&split), normalized(&whole));
}

#[test]
fn scenario_fixed_length_post() {
    let input: &[u8] = b"POST /p HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
    let (status, consumed, events) = parse_whole(ParseMode::Request, input);
    assert_eq!(status, ParseStatus::Success);
    assert_eq!(consumed, input.len());
    assert_eq!(
        events,
        vec![
            Event::RequestBegin(b"POST".to_vec(), b"/p".to_vec(), 1, 1),
            Event::Header(b"Content-Length".to_vec(), b"5".to_vec()),
            Event::HeaderEnd,
            Event::Content(b"hello".to_vec()),
            Event::End,
        ]
    );
}

#[test]
fn scenario_chunked_response() {
    let input: &[u8] =
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
    let (status, consumed, events) = parse_whole(ParseMode::Response, input);
    assert_eq!(status, ParseStatus::Success);
    assert_eq!(consumed, input.len());
    assert_eq!(
        events,
        vec![
            Event::ResponseBegin(1, 1, 200, b"OK".to_vec()),
            Event::Header(b"Transfer-Encoding".to_vec(), b"chunked".to_vec()),
            Event::HeaderEnd,
            Event::Content(b"hello".to_vec()),
            Event::End,
        ]
    );
}

#[test]
fn scenario_multi_chunk_body_reassembles() {
    let input: &[u8] = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                         5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
    let (status, _, events) = parse_whole(ParseMode::Response, input);
    assert_eq!(status, ParseStatus::Success);
    let events = normalized(&events);
    assert!(events.contains(&Event::Content(b"hello world".to_vec())));
    assert_eq!(events.last(), Some(&Event::End));
}

#[test]
fn scenario_folded_header() {
    let input: &[u8] = b"GET / HTTP/1.1\r\nX: a\r\n b\r\n\r\n";
    let (status, _, events) = parse_whole(ParseMode::Request, input);
    assert_eq!(status, ParseStatus::Success);
    // The fold terminator bytes are rejoined into the value; nothing is
    // collapsed or rewritten.
    assert!(events.contains(&Event::Header(b"X".to_vec(), b"a\r\n b".to_vec())));
}

#[test]
fn scenario_syntax_error() {
    let input: &[u8] = b"GE@ / HTTP/1.1\r\n";
    let (status, consumed, events) = parse_whole(ParseMode::Request, input);
    assert_eq!(status, ParseStatus::SyntaxError);
    // Everything before the offending byte was consumed; the offender
    // itself was not.
    assert_eq!(consumed, 2);
    assert!(events.is_empty());
}

// ============================================================================
// Invariants
// ============================================================================

const CORPUS: &[(&str, ParseMode, &[u8])] = &[
    (
        "get",
        ParseMode::Request,
        b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n",
    ),
    (
        "post",
        ParseMode::Request,
        b"POST /p HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
    ),
    (
        "chunked",
        ParseMode::Response,
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
    ),
    (
        "folded",
        ParseMode::Request,
        b"GET / HTTP/1.1\r\nX: a\r\n b\r\nHost: h\r\n\r\n",
    ),
    (
        "pipelined",
        ParseMode::Request,
        b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\n",
    ),
    (
        "empty-reason",
        ParseMode::Response,
        b"HTTP/1.1 304\r\nContent-Length: 0\r\n\r\n",
    ),
];

#[test]
fn every_two_way_split_is_transparent() {
    for (label, mode, input) in CORPUS {
        let (whole_status, whole_consumed, whole) = parse_whole(*mode, input);
        assert_eq!(whole_status, ParseStatus::Success, "{label}");
        assert_eq!(whole_consumed, input.len(), "{label}");

        for cut in 1..input.len() {
            let (status, events) = parse_fragmented(*mode, input, &[cut]);
            assert_eq!(status, ParseStatus::Success, "{label} cut at {cut}");
            assert_eq!(
                normalized(&events),
                normalized(&whole),
                "{label} cut at {cut}"
            );
        }
    }
}

#[test]
fn byte_at_a_time_is_transparent() {
    for (label, mode, input) in CORPUS {
        let (_, _, whole) = parse_whole(*mode, input);
        let cuts: Vec<usize> = (1..input.len()).collect();
        let (status, events) = parse_fragmented(*mode, input, &cuts);
        assert_eq!(status, ParseStatus::Success, "{label}");
        assert_eq!(normalized(&events), normalized(&whole), "{label}");
    }
}

#[test]
fn content_accounts_for_whole_body() {
    // Framed messages deliver exactly the body, no more, no less.
    let cases: &[(ParseMode, &[u8], &[u8])] = &[
        (
            ParseMode::Request,
            b"POST /p HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world",
            b"hello world",
        ),
        (
            ParseMode::Response,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n1\r\nd\r\n0\r\n\r\n",
            b"abcd",
        ),
    ];

    for (mode, input, body) in cases {
        let (status, _, events) = parse_whole(*mode, input);
        assert_eq!(status, ParseStatus::Success);
        let total: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                Event::Content(c) => Some(c.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(&total, body);
    }
}

#[test]
fn cursor_increment_matches_consumption() {
    let input: &[u8] = b"POST /p HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
    let mut parser = MessageParser::new(ParseMode::Request);
    let mut handler = Recorder::default();
    let mut cursor = 0;

    for (start, end) in [(0usize, 10usize), (10, 25), (25, input.len())] {
        let chunk = Chunk::new(&input[start..end], start);
        let before = cursor;
        parser.process(chunk, &mut cursor, &mut handler);
        // Everything available was consumable in this stream, so the
        // cursor lands exactly on the chunk end.
        assert_eq!(cursor - before, end - start);
    }
}

#[test]
fn headers_split_across_chunks_are_stitched() {
    // The cut lands inside the header name, then inside the value.
    let input: &[u8] = b"GET / HTTP/1.1\r\nX-Long-Header-Name: some value\r\n\r\n";
    let (_, _, whole) = parse_whole(ParseMode::Request, input);
    for cuts in [&[20usize][..], &[20, 40][..], &[2, 20, 40][..]] {
        let (status, events) = parse_fragmented(ParseMode::Request, input, cuts);
        assert_eq!(status, ParseStatus::Success);
        assert_eq!(normalized(&events), normalized(&whole));
    }
}

#[test]
fn message_mode_body_runs_to_transport_end() {
    let mut parser = MessageParser::new(ParseMode::Message);
    let mut handler = Recorder::default();
    let mut cursor = 0;

    let first: &[u8] = b"Content-Type: text/plain\r\n\r\npart one ";
    let status = parser.process(Chunk::new(first, 0), &mut cursor, &mut handler);
    assert_eq!(status, ParseStatus::Partial);

    let second: &[u8] = b"part two";
    let status = parser.process(Chunk::new(second, first.len()), &mut cursor, &mut handler);
    assert_eq!(status, ParseStatus::Partial);

    let body: Vec<u8> = handler
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Content(c) => Some(c.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(body, b"part one part two");
}

// ============================================================================
// Property: fragmentation transparency over random splits
// ============================================================================

proptest! {
    #[test]
    fn random_splits_are_transparent(
        case in 0..CORPUS.len(),
        raw_cuts in prop::collection::vec(0usize..64, 0..8),
    ) {
        let (_, mode, input) = CORPUS[case];
        let mut cuts: Vec<usize> = raw_cuts
            .into_iter()
            .map(|c| c % input.len())
            .filter(|&c| c > 0)
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        let (whole_status, _, whole) = parse_whole(mode, input);
        let (status, events) = parse_fragmented(mode, input, &cuts);
        prop_assert_eq!(status, whole_status);
        prop_assert_eq!(normalized(&events), normalized(&whole));
    }
}
