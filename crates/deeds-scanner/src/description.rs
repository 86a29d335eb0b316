//! Grammar for the free-text description column.
//!
//! A description reads, left to right:
//!
//! ```text
//! [LOT 12A | LOTS 1 2 & 3] [SP 45-B] [remark ...] [123 1ST ST ...] [$250.00]
//! ```
//!
//! The price is taken off the end first, then the lot and sub-plan prefixes.
//! The address is the last house number (`12`, `14-16`, `12A`) that is
//! followed by a street word or an ordinal, through to the end of the text.
//! Whatever sits between the sub-plan marker and the address is kept as a
//! remark.

use regex::Regex;
use std::sync::OnceLock;

/// Segments recognised in one description cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptionParts {
    /// `LOT 12A` or `LOTS 1 & 2`.
    pub lot: Option<String>,
    /// `SP 45-B`.
    pub sub_plan: Option<String>,
    /// Text between the sub-plan marker and the address.
    pub remark: Option<String>,
    /// House number through to the end of the text.
    pub street_address: Option<String>,
    /// Trailing `$N.NN` amount.
    pub cost: Option<f64>,
}

impl DescriptionParts {
    /// Split a description cell into its segments.
    ///
    /// Never fails: text that matches no segment ends up in `remark`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut parts = Self::default();
        if normalized.is_empty() {
            return parts;
        }

        let (cost, rest) = take_price(&normalized);
        parts.cost = cost;

        let (lot, rest) = take_lot(&rest);
        parts.lot = lot;

        let (sub_plan, rest) = take_prefix(sub_plan_regex(), &rest);
        parts.sub_plan = sub_plan;

        let (remark, street_address) = split_address(&rest);
        parts.remark = remark;
        parts.street_address = street_address;

        parts
    }

    /// Lot designator, sub-plan marker and remark joined with single spaces.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        let joined = [&self.lot, &self.sub_plan, &self.remark]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

fn sub_plan_regex() -> &'static Regex {
    static SUB_PLAN_REGEX: OnceLock<Regex> = OnceLock::new();
    SUB_PLAN_REGEX
        .get_or_init(|| Regex::new(r"^(?i:SP [0-9]+-[0-9A-Z]+)\b").expect("valid regex"))
}

fn price_regex() -> &'static Regex {
    static PRICE_REGEX: OnceLock<Regex> = OnceLock::new();
    PRICE_REGEX
        .get_or_init(|| Regex::new(r"\$ ?([0-9][0-9,]*\.[0-9]{2})\s*$").expect("valid regex"))
}

fn house_number_regex() -> &'static Regex {
    static HOUSE_NUMBER_REGEX: OnceLock<Regex> = OnceLock::new();
    HOUSE_NUMBER_REGEX
        .get_or_init(|| Regex::new(r"^(?i)[0-9][0-9-]*[A-Z]?$").expect("valid regex"))
}

fn ordinal_regex() -> &'static Regex {
    static ORDINAL_REGEX: OnceLock<Regex> = OnceLock::new();
    ORDINAL_REGEX
        .get_or_init(|| Regex::new(r"^(?i)[0-9]+(?:ST|ND|RD|TH)$").expect("valid regex"))
}

/// A token that can follow a house number: `MAIN`, `1ST`, `22ND`.
fn is_street_word(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_alphabetic()) || ordinal_regex().is_match(token)
}

/// Remove a dollar amount that ends the text.
fn take_price(text: &str) -> (Option<f64>, String) {
    let Some(caps) = price_regex().captures(text) else {
        return (None, text.to_string());
    };

    let whole = caps.get(0).expect("group 0 always present");
    let cost = caps[1].replace(',', "").parse::<f64>().ok();

    (cost, text[..whole.start()].trim().to_string())
}

/// Take `LOT <id>` or `LOTS <n> [n | & n ...]` off the front of the text.
///
/// A trailing lot number that is followed by a street word is given back as
/// the house number: `LOTS 1 2 12 ELM ST` has lots 1 and 2 at 12 Elm St.
fn take_lot(text: &str) -> (Option<String>, String) {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let Some(keyword) = tokens.first() else {
        return (None, String::new());
    };

    let taken = if keyword.eq_ignore_ascii_case("LOT") {
        usize::from(
            tokens
                .get(1)
                .is_some_and(|id| id.chars().all(|c| c.is_ascii_alphanumeric())),
        )
    } else if keyword.eq_ignore_ascii_case("LOTS") {
        let mut taken = tokens[1..]
            .iter()
            .take_while(|t| t.chars().all(|c| c.is_ascii_digit() || c == '&'))
            .count();

        let numbers = tokens[1..=taken]
            .iter()
            .filter(|t| t.chars().any(|c| c.is_ascii_digit()))
            .count();
        let last_is_bare = taken >= 2
            && tokens[taken].chars().all(|c| c.is_ascii_digit())
            && !tokens[taken - 1].ends_with('&');
        if numbers >= 2
            && last_is_bare
            && tokens.get(taken + 1).is_some_and(|t| is_street_word(t))
        {
            taken -= 1;
        }
        while taken > 0 && !tokens[taken].chars().any(|c| c.is_ascii_digit()) {
            taken -= 1;
        }
        taken
    } else {
        0
    };

    if taken == 0 {
        return (None, text.to_string());
    }

    (
        Some(tokens[..=taken].join(" ")),
        tokens[taken + 1..].join(" "),
    )
}

/// Match `regex` at the start of `text`, returning the match and the remainder.
fn take_prefix(regex: &Regex, text: &str) -> (Option<String>, String) {
    match regex.find(text) {
        Some(m) => (
            Some(m.as_str().to_string()),
            text[m.end()..].trim().to_string(),
        ),
        None => (None, text.to_string()),
    }
}

/// Split the middle text into `(remark, street_address)`.
fn split_address(text: &str) -> (Option<String>, Option<String>) {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let start = (0..tokens.len()).rev().find(|&i| {
        house_number_regex().is_match(tokens[i])
            && tokens.get(i + 1).is_some_and(|next| is_street_word(next))
    });

    let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

    match start {
        Some(i) => {
            let address = tokens[i..].join(" ");
            let address = address.trim_end_matches(&[',', ' '][..]).to_string();
            (non_empty(tokens[..i].join(" ")), non_empty(address))
        }
        None => (non_empty(tokens.join(" ")), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_description() {
        let parts = DescriptionParts::parse("LOT 12A SP 45-B 123 MAIN ST $250.00");

        assert_eq!(parts.lot.as_deref(), Some("LOT 12A"));
        assert_eq!(parts.sub_plan.as_deref(), Some("SP 45-B"));
        assert_eq!(parts.remark, None);
        assert_eq!(parts.street_address.as_deref(), Some("123 MAIN ST"));
        assert_eq!(parts.cost, Some(250.0));
        assert_eq!(parts.description().as_deref(), Some("LOT 12A SP 45-B"));
    }

    #[test]
    fn test_lots_list() {
        let parts = DescriptionParts::parse("LOTS 1 & 2 14-16 ELM AVE");

        assert_eq!(parts.lot.as_deref(), Some("LOTS 1 & 2"));
        assert_eq!(parts.street_address.as_deref(), Some("14-16 ELM AVE"));
        assert_eq!(parts.cost, None);
    }

    #[test]
    fn test_no_price_means_no_cost() {
        let parts = DescriptionParts::parse("LOT 7 SP 9-C 40 OAK ST");
        assert_eq!(parts.cost, None);
        assert_eq!(parts.street_address.as_deref(), Some("40 OAK ST"));
    }

    #[test]
    fn test_remark_between_plan_and_address_is_kept() {
        let parts = DescriptionParts::parse("LOT 3 SP 100-A UNIT 5 22 OAK AVE $1,300.00");

        assert_eq!(parts.remark.as_deref(), Some("UNIT 5"));
        assert_eq!(parts.street_address.as_deref(), Some("22 OAK AVE"));
        assert_eq!(parts.cost, Some(1300.0));
        assert_eq!(
            parts.description().as_deref(),
            Some("LOT 3 SP 100-A UNIT 5")
        );
    }

    #[test]
    fn test_address_only() {
        let parts = DescriptionParts::parse("  9   WINTHROP  ST, ");

        assert_eq!(parts.lot, None);
        assert_eq!(parts.street_address.as_deref(), Some("9 WINTHROP ST"));
        assert_eq!(parts.description(), None);
    }

    #[test]
    fn test_trailing_unit_number_stays_in_address() {
        let parts = DescriptionParts::parse("12 ELM ST 2");
        assert_eq!(parts.street_address.as_deref(), Some("12 ELM ST 2"));
    }

    #[test]
    fn test_text_without_address() {
        let parts = DescriptionParts::parse("LOT B1 CONDOMINIUM MASTER DEED");

        assert_eq!(parts.lot.as_deref(), Some("LOT B1"));
        assert_eq!(parts.street_address, None);
        assert_eq!(
            parts.description().as_deref(),
            Some("LOT B1 CONDOMINIUM MASTER DEED")
        );
    }

    #[test]
    fn test_lot_keyword_needs_word_boundary() {
        let parts = DescriptionParts::parse("LOTUS 5 PARK RD");
        assert_eq!(parts.lot, None);
        assert_eq!(parts.street_address.as_deref(), Some("5 PARK RD"));
        assert_eq!(parts.remark.as_deref(), Some("LOTUS"));
    }

    #[test]
    fn test_ordinal_street_name() {
        let parts = DescriptionParts::parse("LOT 5 SP 10-A 123 1ST ST $100.00");

        assert_eq!(parts.sub_plan.as_deref(), Some("SP 10-A"));
        assert_eq!(parts.remark, None);
        assert_eq!(parts.street_address.as_deref(), Some("123 1ST ST"));
        assert_eq!(parts.cost, Some(100.0));
    }

    #[test]
    fn test_house_number_with_letter_suffix() {
        let parts = DescriptionParts::parse("LOT 5 12A MAIN ST");

        assert_eq!(parts.lot.as_deref(), Some("LOT 5"));
        assert_eq!(parts.street_address.as_deref(), Some("12A MAIN ST"));
    }

    #[test]
    fn test_lots_list_with_spaces() {
        let parts = DescriptionParts::parse("LOTS 1 2 & 3 12 ELM ST");

        assert_eq!(parts.lot.as_deref(), Some("LOTS 1 2 & 3"));
        assert_eq!(parts.remark, None);
        assert_eq!(parts.street_address.as_deref(), Some("12 ELM ST"));

        let parts = DescriptionParts::parse("LOTS 4&5 9 PINE RD");
        assert_eq!(parts.lot.as_deref(), Some("LOTS 4&5"));
        assert_eq!(parts.street_address.as_deref(), Some("9 PINE RD"));
    }

    #[test]
    fn test_price_must_end_the_text() {
        let parts = DescriptionParts::parse("LOT 5 $1.00 12 MAIN ST");

        assert_eq!(parts.cost, None);
        assert_eq!(parts.remark.as_deref(), Some("$1.00"));
        assert_eq!(parts.street_address.as_deref(), Some("12 MAIN ST"));
    }

    #[test]
    fn test_empty_description() {
        let parts = DescriptionParts::parse("   ");
        assert_eq!(parts, DescriptionParts::default());
        assert_eq!(parts.description(), None);
    }
}
