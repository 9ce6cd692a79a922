//! Reverse `eval(function(p,a,c,k,e,d){...})` packed player scripts.
//!
//! Packed payloads replace every word with a base-N index into a symbol table.
//! Decoding is plain text substitution, the script is never executed.

mod unbase;

pub use unbase::Unbase;

use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

const DEFAULT_RADIX: u32 = 36;

/// Whether `text` carries the packer call signature. Whitespace is ignored.
pub fn detect(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();

    let stripped = text
        .chars()
        .filter(|x| !x.is_whitespace())
        .collect::<String>();

    RE.get_or_init(|| Regex::new(r"eval\(function\(p,a,c,k,e,(?:r|d)\)").unwrap())
        .is_match(&stripped)
}

/// Parse and decode in one step. `None` when the signature is missing or the
/// symbol table does not match its declared length.
pub fn unpack(text: &str) -> Option<String> {
    let packed = PackedScript::parse(text)?;
    let decoded = packed.decode();

    log::trace!(
        "unpacked {} bytes into {} bytes (radix {}, {} symbols)",
        packed.payload.len(),
        decoded.len(),
        packed.radix,
        packed.symbol_count
    );

    Some(decoded)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedScript {
    pub payload: String,
    pub radix: u32,
    pub symbol_count: usize,
    pub symbol_table: Vec<String>,
}

impl PackedScript {
    pub fn parse(text: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();

        let re = RE.get_or_init(|| {
            RegexBuilder::new(r"\}\s*\('(.*)',\s*(.*?),\s*(\d+),\s*'(.*?)'\.split\('\|'\)")
                .dot_matches_new_line(true)
                .build()
                .unwrap()
        });

        let caps = re.captures(text)?;
        let payload = caps.get(1)?.as_str().replace("\\'", "'");
        let radix = match caps.get(2)?.as_str().trim().parse::<u32>() {
            Ok(0) | Err(_) => DEFAULT_RADIX,
            Ok(x) => x,
        };
        let symbol_count = caps.get(3)?.as_str().parse::<usize>().ok()?;
        let symbol_table = caps
            .get(4)?
            .as_str()
            .split('|')
            .map(|x| x.to_owned())
            .collect::<Vec<_>>();

        if symbol_table.len() != symbol_count {
            log::debug!(
                "packed script declares {} symbols but carries {}",
                symbol_count,
                symbol_table.len()
            );
            return None;
        }

        Some(Self {
            payload,
            radix,
            symbol_count,
            symbol_table,
        })
    }

    /// Substitute every word token that indexes a non-empty symbol.
    pub fn decode(&self) -> String {
        static WORD: OnceLock<Regex> = OnceLock::new();

        let word = WORD.get_or_init(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());
        let unbase = Unbase::new(self.radix);
        let mut output = String::with_capacity(self.payload.len() * 2);
        let mut last = 0;

        for token in word.find_iter(&self.payload) {
            output.push_str(&self.payload[last..token.start()]);

            let symbol = unbase
                .unbase(token.as_str())
                .and_then(|x| usize::try_from(x).ok())
                .and_then(|x| self.symbol_table.get(x))
                .filter(|x| !x.is_empty());

            match symbol {
                Some(symbol) => output.push_str(symbol),
                None => output.push_str(token.as_str()),
            }

            last = token.end();
        }

        output.push_str(&self.payload[last..]);
        output
    }
}
