use crate::core::instruments::InstrumentTable;

const BASE_KEYWORDS: &[&str] = &[
    "BUY",
    "SELL",
    "LONG",
    "SHORT",
    "ENTRY",
    "SL",
    "TP",
    "STOP LOSS",
    "TAKE PROFIT",
];

/// Coarse keyword filter in front of the parser. Recall matters more than
/// precision here: the parser rejects false positives anyway.
#[derive(Debug, Clone)]
pub struct SignalClassifier {
    keywords: Vec<String>,
}

impl SignalClassifier {
    pub fn new(instruments: &InstrumentTable, extra_keywords: &[String]) -> Self {
        let mut keywords: Vec<String> = BASE_KEYWORDS.iter().map(|k| k.to_string()).collect();
        keywords.extend(instruments.vocabulary().map(str::to_string));
        keywords.extend(
            extra_keywords
                .iter()
                .map(|k| k.trim().to_uppercase())
                .filter(|k| !k.is_empty()),
        );
        keywords.sort();
        keywords.dedup();
        Self { keywords }
    }

    pub fn is_signal(&self, text: &str) -> bool {
        let upper = text.to_uppercase();
        self.keywords.iter().any(|k| upper.contains(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> SignalClassifier {
        SignalClassifier::new(&InstrumentTable::default(), &[])
    }

    #[test]
    fn plain_chatter_is_not_a_signal() {
        assert!(!classifier().is_signal("hello world"));
        assert!(!classifier().is_signal(""));
    }

    #[test]
    fn keywords_match_case_insensitively() {
        let c = classifier();
        assert!(c.is_signal("buy eurusd now"));
        assert!(c.is_signal("Gold looking heavy"));
        assert!(c.is_signal("take profit reached"));
    }

    #[test]
    fn extra_keywords_extend_the_set() {
        let c = SignalClassifier::new(&InstrumentTable::default(), &["scalp".to_string()]);
        assert!(c.is_signal("quick SCALP idea"));
    }
}
