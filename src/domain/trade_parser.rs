//! Trade description parser.
//!
//! Grammar (action keyword is case-insensitive):
//!
//! ```text
//! [<spin-off marker>: ] <action> <quantity> <product>@<price>[ <CCY>][(<note>)]
//! action   := "compra" | "venta"
//! quantity := positive integer
//! ```
//!
//! Example: `Compra 40 United Parcel Serv.B@91,95 USD (US9113121068)`.
//! Anything else is classified as not a trade rather than treated as an error.

use std::fmt;

use super::currency::{normalize_currency_amount, normalize_currency_code};
use super::normalize::parse_amount_str;

/// Prefix that marks spin-off deliveries, e.g. `ESCISIÓN: Compra 2 ...`.
const SPIN_OFF_MARKER: &str = "escis";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    fn from_keyword(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "compra" => Some(TradeAction::Buy),
            "venta" => Some(TradeAction::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrade {
    pub action: TradeAction,
    pub quantity: u64,
    pub product: String,
    /// `None` when no price token was found; such trades are not replayed.
    pub price: Option<f64>,
    pub currency: Option<String>,
}

impl ParsedTrade {
    /// Price when the trade is usable by the ledger.
    pub fn usable_price(&self) -> Option<f64> {
        if self.quantity == 0 { None } else { self.price }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unparseable {
    Empty,
    NotATrade,
    MissingQuantity,
    MissingPriceMarker,
}

impl fmt::Display for Unparseable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Unparseable::Empty => "empty description",
            Unparseable::NotATrade => "not a buy or sell",
            Unparseable::MissingQuantity => "missing quantity",
            Unparseable::MissingPriceMarker => "missing '@' price marker",
        };
        f.write_str(reason)
    }
}

/// Outcome of parsing a description.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeParse {
    Parsed(ParsedTrade),
    Unparseable(Unparseable),
}

impl TradeParse {
    pub fn into_trade(self) -> Option<ParsedTrade> {
        match self {
            TradeParse::Parsed(trade) => Some(trade),
            TradeParse::Unparseable(_) => None,
        }
    }

    pub fn is_trade(&self) -> bool {
        matches!(self, TradeParse::Parsed(_))
    }
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Text up to the first space, consuming the space.
    fn take_word(&mut self) -> Option<&'a str> {
        let rest = self.remaining();
        let end = rest.find(' ')?;
        self.pos += end + 1;
        Some(&rest[..end])
    }

    fn take_digits(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    /// Text up to `marker`, consuming the marker.
    fn take_until(&mut self, marker: char) -> Option<&'a str> {
        let rest = self.remaining();
        let end = rest.find(marker)?;
        self.pos += end + marker.len_utf8();
        Some(&rest[..end])
    }
}

/// Parse a trade out of a free-text ledger description.
pub fn parse_trade(description: &str) -> TradeParse {
    let text = strip_spin_off_prefix(description.trim());
    if text.is_empty() {
        return TradeParse::Unparseable(Unparseable::Empty);
    }

    let mut cursor = Cursor::new(text);

    let action = match cursor.take_word().and_then(TradeAction::from_keyword) {
        Some(action) => action,
        None => return TradeParse::Unparseable(Unparseable::NotATrade),
    };

    cursor.skip_whitespace();
    let quantity = match cursor.take_digits().parse::<u64>() {
        Ok(q) if q > 0 => q,
        _ => return TradeParse::Unparseable(Unparseable::MissingQuantity),
    };

    cursor.skip_whitespace();
    let product = match cursor.take_until('@') {
        Some(p) => p.trim().to_string(),
        None => return TradeParse::Unparseable(Unparseable::MissingPriceMarker),
    };

    let after_at = cursor.remaining();
    let price_part = match after_at.find('(') {
        Some(i) => &after_at[..i],
        None => after_at,
    }
    .trim();

    let raw_price = first_number_token(price_part).map(parse_amount_str);
    let raw_currency = first_currency_token(price_part);

    let (price, currency) = match (raw_price, raw_currency) {
        (Some(p), Some(c)) => {
            let (code, scaled) = normalize_currency_amount(c, p);
            (Some(scaled), Some(code))
        }
        (price, currency) => (price, currency.map(normalize_currency_code)),
    };

    TradeParse::Parsed(ParsedTrade {
        action,
        quantity,
        product,
        price,
        currency,
    })
}

fn strip_spin_off_prefix(text: &str) -> &str {
    let starts_with_marker = text
        .get(..SPIN_OFF_MARKER.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(SPIN_OFF_MARKER));
    if !starts_with_marker {
        return text;
    }
    match text.find(':') {
        Some(i) => text[i + 1..].trim(),
        None => text,
    }
}

/// First `digits[(.|,)digits]` token.
fn first_number_token(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end + 1 < bytes.len()
        && (bytes[end] == b'.' || bytes[end] == b',')
        && bytes[end + 1].is_ascii_digit()
    {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    Some(&s[start..end])
}

/// First standalone word of exactly three uppercase ASCII letters.
fn first_currency_token(s: &str) -> Option<&str> {
    s.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .find(|word| word.len() == 3 && word.chars().all(|c| c.is_ascii_uppercase()))
}
