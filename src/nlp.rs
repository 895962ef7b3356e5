//! Language detection and text normalization.
//!
//! [`WhatlangDetector`] reports ISO 639-3 codes (`"eng"`, `"slk"`, ...).
//! [`TextPreprocessor`] takes the same codes to pick a stop-word list and a
//! stemmer; languages without one skip that step.

use std::collections::{HashMap, HashSet};

use antiplag_core::collaborators::{
    CollabResult, CollaboratorError, LanguageDetector, Preprocessor,
};
use antiplag_core::models::PreprocessOptions;
use anyhow::Result;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use stop_words::LANGUAGE;
use unicode_normalization::UnicodeNormalization;
use whatlang::Lang;

/// Language detection backed by `whatlang`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> CollabResult<String> {
        whatlang::detect(text)
            .map(|info| info.lang().code().to_string())
            .ok_or_else(|| CollaboratorError::Unsupported("language could not be detected".into()))
    }
}

const STOPWORD_LANGS: [Lang; 11] = [
    Lang::Eng,
    Lang::Slk,
    Lang::Ces,
    Lang::Deu,
    Lang::Fra,
    Lang::Spa,
    Lang::Ita,
    Lang::Por,
    Lang::Rus,
    Lang::Pol,
    Lang::Hun,
];

fn stop_word_language(lang: Lang) -> Option<LANGUAGE> {
    Some(match lang {
        Lang::Eng => LANGUAGE::English,
        Lang::Slk => LANGUAGE::Slovak,
        Lang::Ces => LANGUAGE::Czech,
        Lang::Deu => LANGUAGE::German,
        Lang::Fra => LANGUAGE::French,
        Lang::Spa => LANGUAGE::Spanish,
        Lang::Ita => LANGUAGE::Italian,
        Lang::Por => LANGUAGE::Portuguese,
        Lang::Rus => LANGUAGE::Russian,
        Lang::Pol => LANGUAGE::Polish,
        Lang::Hun => LANGUAGE::Hungarian,
        _ => return None,
    })
}

fn stemmer_algorithm(lang: Lang) -> Option<Algorithm> {
    Some(match lang {
        Lang::Eng => Algorithm::English,
        Lang::Deu => Algorithm::German,
        Lang::Fra => Algorithm::French,
        Lang::Spa => Algorithm::Spanish,
        Lang::Ita => Algorithm::Italian,
        Lang::Por => Algorithm::Portuguese,
        Lang::Rus => Algorithm::Russian,
        Lang::Hun => Algorithm::Hungarian,
        _ => return None,
    })
}

/// Default [`Preprocessor`].
///
/// Steps, in order: NFC normalization, lowercasing, URL and punctuation
/// removal, English number words to digits, number removal, stop-word
/// removal, stemming. Output tokens are joined by a space, or by a newline
/// when `tokenize_words` is set.
pub struct TextPreprocessor {
    url_regex: Regex,
    punct_regex: Regex,
    stopwords: HashMap<Lang, HashSet<String>>,
}

impl TextPreprocessor {
    pub fn new() -> Result<Self> {
        let url_regex = Regex::new(r"https?://\S+|www\.\S+")
            .map_err(|e| anyhow::anyhow!("Failed to compile URL regex: {e}"))?;
        let punct_regex = Regex::new(r"[^\w\s]|_")
            .map_err(|e| anyhow::anyhow!("Failed to compile punctuation regex: {e}"))?;
        Ok(Self {
            url_regex,
            punct_regex,
            stopwords: HashMap::new(),
        })
    }

    /// Loads stop-word lists for every supported language up front.
    pub fn with_all_stopwords() -> Result<Self> {
        let mut pre = Self::new()?;
        for lang in STOPWORD_LANGS {
            if let Some(list) = stop_word_language(lang) {
                let words: HashSet<String> =
                    stop_words::get(list).iter().map(ToString::to_string).collect();
                pre.stopwords.insert(lang, words);
            }
        }
        Ok(pre)
    }

    fn clean(&self, text: &str) -> String {
        let normalized: String = text.nfc().collect::<String>().to_lowercase();
        let no_urls = self.url_regex.replace_all(&normalized, " ");
        self.punct_regex.replace_all(&no_urls, " ").into_owned()
    }

    fn tokens(&self, text: &str, lang: Option<Lang>, options: &PreprocessOptions) -> Vec<String> {
        let cleaned = self.clean(text);
        let mut tokens: Vec<String> = cleaned.split_whitespace().map(str::to_string).collect();

        if options.words_to_numbers && lang == Some(Lang::Eng) {
            tokens = words_to_numbers(&tokens);
        }
        if options.remove_numbers {
            tokens.retain(|t| !t.chars().all(|c| c.is_ascii_digit()));
        }
        if options.remove_stopwords {
            if let Some(stop) = lang.and_then(|l| self.stopwords.get(&l)) {
                tokens.retain(|t| !stop.contains(t));
            }
        }
        if options.lemmatize {
            if let Some(algorithm) = lang.and_then(stemmer_algorithm) {
                let stemmer = Stemmer::create(algorithm);
                tokens = tokens.iter().map(|t| stemmer.stem(t).into_owned()).collect();
            }
        }
        tokens
    }
}

impl Preprocessor for TextPreprocessor {
    fn normalize(
        &self,
        text: &str,
        language: &str,
        options: &PreprocessOptions,
    ) -> CollabResult<String> {
        let lang = Lang::from_code(language);
        let sep = if options.tokenize_words { "\n" } else { " " };
        Ok(self.tokens(text, lang, options).join(sep))
    }
}

fn unit_value(word: &str) -> Option<u64> {
    let n = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(n)
}

fn scale_value(word: &str) -> Option<u64> {
    match word {
        "hundred" => Some(100),
        "thousand" => Some(1_000),
        "million" => Some(1_000_000),
        "billion" => Some(1_000_000_000),
        _ => None,
    }
}

fn is_number_word(word: &str) -> bool {
    unit_value(word).is_some() || scale_value(word).is_some()
}

/// Folds one word into a run's `(total, current)` pair. `None` means the
/// word would push the run's value past `u64::MAX`.
fn fold_number_word(total: u64, current: u64, word: &str) -> Option<(u64, u64)> {
    let (total, current) = if let Some(n) = unit_value(word) {
        (total, current.checked_add(n)?)
    } else {
        match scale_value(word)? {
            100 => (total, current.max(1).checked_mul(100)?),
            scale => (total.checked_add(current.max(1).checked_mul(scale)?)?, 0),
        }
    };
    total.checked_add(current)?;
    Some((total, current))
}

/// Replaces runs of English number words with their value:
/// `["two", "hundred", "and", "five", "apples"]` becomes `["205", "apples"]`.
/// An `and` only joins a run when number words follow it. A run whose value
/// would overflow is cut there and the next run starts at that word.
fn words_to_numbers(tokens: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if !is_number_word(&tokens[i]) {
            out.push(tokens[i].clone());
            i += 1;
            continue;
        }

        let mut total: u64 = 0;
        let mut current: u64 = 0;
        while i < tokens.len() {
            let word = tokens[i].as_str();
            if word == "and" {
                // "two hundred and five"
                if !tokens.get(i + 1).is_some_and(|w| is_number_word(w)) {
                    break;
                }
            } else {
                match fold_number_word(total, current, word) {
                    Some((t, c)) => {
                        total = t;
                        current = c;
                    }
                    None => break,
                }
            }
            i += 1;
        }
        out.push((total + current).to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn detects_english() {
        let code = WhatlangDetector
            .detect("The quick brown fox jumps over the lazy dog while the farmer watches.")
            .unwrap();
        assert_eq!(code, "eng");
    }

    #[test]
    fn detection_of_empty_text_fails() {
        assert!(WhatlangDetector.detect("").is_err());
    }

    #[test]
    fn number_words_become_digits() {
        assert_eq!(
            words_to_numbers(&toks("two hundred and five apples")),
            toks("205 apples")
        );
        assert_eq!(
            words_to_numbers(&toks("three thousand twenty one")),
            toks("3021")
        );
        assert_eq!(words_to_numbers(&toks("rock and roll")), toks("rock and roll"));
        assert_eq!(words_to_numbers(&toks("one and only")), toks("1 and only"));
    }

    #[test]
    fn long_number_word_runs_are_split_instead_of_overflowing() {
        let chain = vec!["hundred"; 12].join(" ");
        assert_eq!(
            words_to_numbers(&toks(&chain)),
            toks("1000000000000000000 1000000")
        );
        assert_eq!(
            words_to_numbers(&toks("billion billion billion")),
            toks("3000000000")
        );

        let pre = TextPreprocessor::with_all_stopwords().unwrap();
        let out = pre
            .normalize(&chain, "eng", &PreprocessOptions::default())
            .unwrap();
        assert_eq!(out, "1000000000000000000 1000000");
    }

    #[test]
    fn default_options_strip_stopwords_and_punctuation() {
        let pre = TextPreprocessor::with_all_stopwords().unwrap();
        let out = pre
            .normalize(
                "The CAT, sat on the mat! See https://example.com now.",
                "eng",
                &PreprocessOptions::default(),
            )
            .unwrap();
        let words = toks(&out);
        assert!(words.contains(&"cat".to_string()));
        assert!(words.contains(&"mat".to_string()));
        assert!(!words.contains(&"the".to_string()));
        assert!(!out.contains(',') && !out.contains('!'));
        assert!(!out.contains("example"));
    }

    #[test]
    fn english_numbers_are_converted_with_default_options() {
        let pre = TextPreprocessor::with_all_stopwords().unwrap();
        let out = pre
            .normalize("Twenty five students", "eng", &PreprocessOptions::default())
            .unwrap();
        assert_eq!(out, "25 students");
    }

    #[test]
    fn unknown_language_keeps_every_token() {
        let pre = TextPreprocessor::with_all_stopwords().unwrap();
        let out = pre
            .normalize("the one the two", "xx", &PreprocessOptions::default())
            .unwrap();
        assert_eq!(out, "the one the two");
    }

    #[test]
    fn remove_numbers_and_tokenize() {
        let pre = TextPreprocessor::new().unwrap();
        let opts = PreprocessOptions {
            words_to_numbers: false,
            remove_numbers: true,
            tokenize_words: true,
            lemmatize: false,
            remove_stopwords: false,
        };
        let out = pre.normalize("chapter 12 begins", "eng", &opts).unwrap();
        assert_eq!(out, "chapter\nbegins");
    }

    #[test]
    fn lemmatize_stems_english() {
        let pre = TextPreprocessor::new().unwrap();
        let opts = PreprocessOptions {
            lemmatize: true,
            remove_stopwords: false,
            ..PreprocessOptions::default()
        };
        let out = pre.normalize("running quickly", "eng", &opts).unwrap();
        assert_eq!(out, "run quick");
    }
}
