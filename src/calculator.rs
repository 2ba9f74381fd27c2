//! Round-up computation and eligibility filtering.
//!
//! Pure functions over the raw bank transaction: no I/O, no shared state,
//! safe to call concurrently. The ledger relies on these being deterministic
//! so re-applying a batch yields the same decisions.

use rust_decimal::Decimal;

use crate::model::RawTransaction;

/// Category/name keywords that exclude a transaction from round-up.
///
/// Matched case-insensitively on word boundaries against both the category
/// list and the free-text transaction name, so "fee" rejects "Service Fee"
/// but not "Coffee Shop". Covers transfers, cash movement, payments/refunds
/// and interest/fee postings that are not purchases.
const EXCLUDED_KEYWORDS: &[&str] = &[
    "transfer",
    "atm",
    "cash withdrawal",
    "withdrawal",
    "payment",
    "refund",
    "deposit",
    "interest",
    "fee",
    "fees",
    "loan",
    "credit card",
];

/// Round-up fraction for a transaction amount: `ceil(|a|) - |a|`.
///
/// Exactly zero for whole currency units; such transactions are excluded
/// from the batch entirely rather than stored with a zero round-up.
pub fn round_up_amount(amount: Decimal) -> Decimal {
    let magnitude = amount.abs();
    magnitude.ceil() - magnitude
}

/// Whether a raw bank transaction participates in round-up accumulation.
///
/// Rejects credits (`amount >= 0`), excluded categories/names, and amounts
/// that are already a whole currency unit.
pub fn is_eligible(tx: &RawTransaction) -> bool {
    if tx.amount >= Decimal::ZERO {
        return false;
    }
    if has_excluded_keyword(tx) {
        return false;
    }
    round_up_amount(tx.amount) > Decimal::ZERO
}

fn has_excluded_keyword(tx: &RawTransaction) -> bool {
    text_has_keyword(&tx.name) || tx.categories.iter().any(|c| text_has_keyword(c))
}

/// Word-boundary keyword match: the text is tokenized on non-alphanumeric
/// characters and a keyword matches only as a whole-word sequence.
fn text_has_keyword(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    EXCLUDED_KEYWORDS.iter().any(|kw| {
        let kw_words: Vec<&str> = kw.split_whitespace().collect();
        words
            .windows(kw_words.len())
            .any(|window| window == kw_words.as_slice())
    })
}
