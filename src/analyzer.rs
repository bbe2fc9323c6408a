//! Linguistic analysis: tokens, lemmas, stop-words, and sentence boundaries.
//!
//! [`LinguisticAnalyzer`] is the seam the rest of the pipeline talks to.
//! [`EnglishAnalyzer`] implements it with Unicode text segmentation (UAX #29
//! word and sentence boundaries), an English stop-word list, and a rule-based
//! lemmatizer.

use unicode_segmentation::UnicodeSegmentation;

/// One word-level token of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// The token exactly as it appears in the input.
    pub text: &'a str,
    /// Lowercased dictionary form.
    pub lemma: String,
    /// True when the token has no alphanumeric characters.
    pub is_punct: bool,
    pub is_stop: bool,
}

pub trait LinguisticAnalyzer: Send + Sync {
    /// Splits `text` into tokens in input order. Whitespace is not a token.
    fn tokenize<'a>(&self, text: &'a str) -> Vec<Token<'a>>;

    /// Yields sentence spans in document order, trimmed of surrounding
    /// whitespace. Spans without alphanumeric content are skipped.
    fn sentences<'a>(&self, text: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishAnalyzer;

impl LinguisticAnalyzer for EnglishAnalyzer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<Token<'a>> {
        text.split_word_bounds()
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| {
                let lower = segment.to_lowercase().replace('\u{2019}', "'");
                Token {
                    text: segment,
                    is_punct: !segment.chars().any(char::is_alphanumeric),
                    is_stop: is_stop_word(&lower),
                    lemma: lemmatize(&lower),
                }
            })
            .collect()
    }

    fn sentences<'a>(&self, text: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        Box::new(
            sentence_spans(text)
                .into_iter()
                .map(str::trim)
                .filter(|s| s.chars().any(char::is_alphanumeric)),
        )
    }
}

/// Sentence spans of `text`.
///
/// UAX #29 breaks after every line feed, which cuts hard-wrapped lines (as
/// PDF extraction produces) into fragments. Segments are merged until one
/// ends in terminal punctuation or a blank line separates paragraphs, so a
/// single line break behaves like a space.
fn sentence_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;

    for (offset, segment) in text.split_sentence_bound_indices() {
        if segment.trim().is_empty() {
            // A line break on a line of its own closes the paragraph.
            if segment.contains('\n') {
                if let Some(s) = start.take() {
                    spans.push(&text[s..end]);
                }
            }
            continue;
        }

        let s = *start.get_or_insert(offset);
        end = offset + segment.len();
        if ends_with_terminal(segment) {
            spans.push(&text[s..end]);
            start = None;
        }
    }
    if let Some(s) = start {
        spans.push(&text[s..end]);
    }
    spans
}

fn ends_with_terminal(segment: &str) -> bool {
    segment
        .trim_end()
        .trim_end_matches(['"', '\'', ')', ']', '\u{201D}', '\u{2019}'])
        .ends_with(['.', '!', '?', '\u{2026}'])
}

/// English stop-words, lowercase.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
    "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
    "amongst", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "been", "before", "beforehand", "behind", "being", "below", "beside", "besides",
    "between", "beyond", "both", "but", "by", "ca", "can", "cannot", "could", "did", "do",
    "does", "doing", "done", "down", "due", "during", "each", "either", "else", "elsewhere",
    "enough", "even", "ever", "every", "everyone", "everything", "everywhere", "except", "few",
    "for", "former", "from", "further", "get", "give", "go", "had", "has", "have", "having",
    "he", "hence", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however",
    "i", "if", "in", "indeed", "into", "is", "it", "its", "itself", "just", "keep", "last",
    "least", "less", "made", "make", "many", "may", "me", "meanwhile", "might", "mine", "more",
    "moreover", "most", "mostly", "much", "must", "my", "myself", "namely", "neither", "never",
    "nevertheless", "next", "no", "nobody", "none", "nor", "not", "nothing", "now", "nowhere",
    "n't", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other", "others",
    "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part", "per", "perhaps",
    "please", "put", "quite", "rather", "re", "really", "regarding", "same", "say", "see",
    "seem", "seemed", "seeming", "seems", "several", "she", "should", "show", "side", "since",
    "so", "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
    "still", "such", "take", "than", "that", "the", "their", "theirs", "them", "themselves",
    "then", "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon",
    "these", "they", "this", "those", "though", "through", "throughout", "thru", "thus", "to",
    "together", "too", "top", "toward", "towards", "under", "unless", "until", "up", "upon",
    "us", "used", "using", "various", "very", "via", "was", "we", "well", "were", "what",
    "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
    "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would",
    "yet", "you", "your", "yours", "yourself", "yourselves", "'s", "'m", "'re", "'ve", "'d",
    "'ll", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't", "weren't", "can't",
    "won't", "it's", "i'm", "that's", "there's",
];

pub fn is_stop_word(lower: &str) -> bool {
    STOP_WORDS.contains(&lower)
}

/// Dictionary form of a lowercase word.
///
/// Irregular forms are looked up first; regular inflections (plural `-s`,
/// `-es`, `-ies`, and verbal `-ing` / `-ed`) are then stripped. Words with
/// non-alphabetic characters are returned unchanged.
pub fn lemmatize(lower: &str) -> String {
    if let Some(lemma) = irregular_lemma(lower) {
        return lemma.to_string();
    }
    if lower.is_empty() || !lower.chars().all(|c| c.is_ascii_alphabetic()) {
        return lower.to_string();
    }

    let len = lower.len();
    if len > 4 && lower.ends_with("ies") {
        return format!("{}y", &lower[..len - 3]);
    }
    if lower.ends_with("sses")
        || (len > 4
            && (lower.ends_with("xes") || lower.ends_with("ches") || lower.ends_with("shes")))
    {
        return lower[..len - 2].to_string();
    }
    if len > 5 && lower.ends_with("ing") {
        if let Some(stem) = verbal_stem(&lower[..len - 3]) {
            return stem;
        }
    }
    if len > 4 && lower.ends_with("ed") && !lower.ends_with("eed") {
        if let Some(stem) = verbal_stem(&lower[..len - 2]) {
            return stem;
        }
    }
    if len > 3
        && lower.ends_with('s')
        && !(lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is"))
    {
        return lower[..len - 1].to_string();
    }

    lower.to_string()
}

/// Stem left after removing `-ing` / `-ed`, with a doubled final consonant
/// undone (`runn` → `run`). `None` when the stem has no vowel.
fn verbal_stem(stem: &str) -> Option<String> {
    if !stem.chars().any(|c| "aeiouy".contains(c)) {
        return None;
    }
    let bytes = stem.as_bytes();
    let n = bytes.len();
    if n >= 3 && bytes[n - 1] == bytes[n - 2] && !b"aeiouylsz".contains(&bytes[n - 1]) {
        return Some(stem[..n - 1].to_string());
    }
    Some(stem.to_string())
}

fn irregular_lemma(word: &str) -> Option<&'static str> {
    let lemma = match word {
        "am" | "is" | "are" | "was" | "were" | "been" | "being" | "'m" | "'re" => "be",
        "has" | "had" | "having" | "'ve" => "have",
        "does" | "did" | "done" | "doing" => "do",
        "sat" | "sitting" => "sit",
        "ran" | "running" => "run",
        "went" | "gone" => "go",
        "saw" | "seen" => "see",
        "ate" | "eaten" => "eat",
        "made" | "making" => "make",
        "took" | "taken" | "taking" => "take",
        "gave" | "given" | "giving" => "give",
        "came" | "coming" => "come",
        "got" | "gotten" => "get",
        "knew" | "known" => "know",
        "thought" => "think",
        "told" => "tell",
        "found" => "find",
        "said" => "say",
        "left" => "leave",
        "felt" => "feel",
        "brought" => "bring",
        "bought" => "buy",
        "began" | "begun" => "begin",
        "wrote" | "written" | "writing" => "write",
        "spoke" | "spoken" => "speak",
        "drove" | "driven" | "driving" => "drive",
        "flew" | "flown" => "fly",
        "grew" | "grown" => "grow",
        "held" => "hold",
        "kept" => "keep",
        "lay" | "lain" => "lie",
        "led" => "lead",
        "met" => "meet",
        "paid" => "pay",
        "sold" => "sell",
        "sent" => "send",
        "stood" => "stand",
        "taught" => "teach",
        "understood" => "understand",
        "won" => "win",
        "children" => "child",
        "men" => "man",
        "women" => "woman",
        "mice" => "mouse",
        "feet" => "foot",
        "teeth" => "tooth",
        "geese" => "goose",
        _ => return None,
    };
    Some(lemma)
}
