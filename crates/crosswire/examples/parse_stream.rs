//! Feeds a pipelined request stream to the parser in small pieces and
//! prints the events it emits.
//!
//! ```sh
//! cargo run --example parse_stream
//! ```

use crosswire::{Chunk, MessageHandler, MessageParser, ParseMode};

struct Printer;

impl MessageHandler for Printer {
    fn on_request_begin(&mut self, method: &[u8], entity: &[u8], vmajor: u8, vminor: u8) -> bool {
        println!(
            "request  {} {} HTTP/{vmajor}.{vminor}",
            String::from_utf8_lossy(method),
            String::from_utf8_lossy(entity),
        );
        true
    }

    fn on_message_header(&mut self, name: &[u8], value: &[u8]) -> bool {
        println!(
            "header   {}: {}",
            String::from_utf8_lossy(name),
            String::from_utf8_lossy(value),
        );
        true
    }

    fn on_message_content(&mut self, content: &[u8]) -> bool {
        println!("content  {:?}", String::from_utf8_lossy(content));
        true
    }

    fn on_message_end(&mut self) -> bool {
        println!("end");
        true
    }
}

fn main() {
    let stream: &[u8] = b"POST /submit HTTP/1.1\r\n\
                          Host: example.com\r\n\
                          Content-Length: 5\r\n\
                          \r\n\
                          hello\
                          GET /next HTTP/1.1\r\n\
                          Host: example.com\r\n\
                          \r\n";

    let mut parser = MessageParser::new(ParseMode::Request);
    let mut printer = Printer;
    let mut cursor = 0;

    // Hand the stream over in 7-byte pieces, the way a socket might.
    let mut start = 0;
    while start < stream.len() {
        let end = (start + 7).min(stream.len());
        let chunk = Chunk::new(&stream[start..end], start);
        let status = parser.process(chunk, &mut cursor, &mut printer);
        println!("         ... fed {}..{} -> {status}", start, end);
        start = end;
    }
}
